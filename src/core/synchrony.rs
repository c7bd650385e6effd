//! Cross-subject synchrony spectrum.
//!
//! For one metric, the histories of all active subjects form the rows of a
//! matrix. We compute a covariance matrix across subjects with pairwise
//! deletion of missing cells, take its singular values and normalize them to
//! sum to one. A spectrum dominated by its first entry means the subjects move
//! together; a flat spectrum means they vary independently.

use nalgebra::{DMatrix, SymmetricEigen};
use statrs::statistics::Statistics;

/// Fewest shared columns a pair of rows needs for a covariance estimate.
const MIN_SHARED_SAMPLES: usize = 2;

/// Errors from the synchrony computation.
#[derive(Debug, Clone, PartialEq)]
pub enum SynchronyError {
    /// Rows of differing lengths were supplied.
    RaggedInput { expected: usize, found: usize },
    /// Non-finite covariance entries or singular values.
    NumericalFailure(String),
}

impl std::fmt::Display for SynchronyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynchronyError::RaggedInput { expected, found } => {
                write!(f, "Ragged input: expected rows of {expected} samples, found {found}")
            }
            SynchronyError::NumericalFailure(e) => write!(f, "Numerical failure: {e}"),
        }
    }
}

impl std::error::Error for SynchronyError {}

/// Compute the normalized synchrony spectrum for a set of subject histories.
///
/// Returns `Ok(None)` when there are no rows. Otherwise the result has one
/// entry per row, sorted descending and summing to one:
/// - a single row yields `[1.0]`
/// - a covariance matrix with no variance at the scale of the input (too few
///   shared samples, or flat histories) yields equal weights
pub fn compute_spectrum(rows: &[Vec<Option<f64>>]) -> Result<Option<Vec<f64>>, SynchronyError> {
    match rows.len() {
        0 => return Ok(None),
        1 => return Ok(Some(vec![1.0])),
        _ => {}
    }

    let covariance = masked_covariance(rows)?;
    let singular = singular_values(covariance)?;
    normalize(singular, input_scale(rows)).map(Some)
}

/// Pairwise-deletion covariance between rows.
///
/// Entry `(i, j)` is the unbiased sample covariance over the columns where
/// both row `i` and row `j` hold a value. Pairs with fewer than two shared
/// columns contribute zero.
pub fn masked_covariance(rows: &[Vec<Option<f64>>]) -> Result<DMatrix<f64>, SynchronyError> {
    let n = rows.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().find(|row| row.len() != width) {
        return Err(SynchronyError::RaggedInput {
            expected: width,
            found: bad.len(),
        });
    }

    let mut cov = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let value = pairwise_covariance(&rows[i], &rows[j]);
            if !value.is_finite() {
                return Err(SynchronyError::NumericalFailure(format!(
                    "non-finite covariance between rows {i} and {j}"
                )));
            }
            cov[(i, j)] = value;
            cov[(j, i)] = value;
        }
    }
    Ok(cov)
}

fn pairwise_covariance(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();

    if xs.len() < MIN_SHARED_SAMPLES {
        return 0.0;
    }
    xs.iter().covariance(ys.iter())
}

/// Singular values of a symmetric matrix, sorted descending.
///
/// For a symmetric matrix these are the absolute eigenvalues.
pub fn singular_values(matrix: DMatrix<f64>) -> Result<Vec<f64>, SynchronyError> {
    let eigen = SymmetricEigen::new(matrix);
    let mut values: Vec<f64> = eigen.eigenvalues.iter().map(|v| v.abs()).collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SynchronyError::NumericalFailure(
            "non-finite singular values".to_string(),
        ));
    }
    values.sort_by(|a, b| b.total_cmp(a));
    Ok(values)
}

/// Largest magnitude among the present cells.
fn input_scale(rows: &[Vec<Option<f64>>]) -> f64 {
    rows.iter()
        .flatten()
        .flatten()
        .fold(0.0_f64, |max, v| max.max(v.abs()))
}

/// Scale values to sum to one.
///
/// A sum that is zero relative to `scale²` (the magnitude a covariance of the
/// input can reach) becomes equal weights.
fn normalize(values: Vec<f64>, scale: f64) -> Result<Vec<f64>, SynchronyError> {
    let n = values.len();
    let sum: f64 = values.iter().sum();

    if !sum.is_finite() {
        return Err(SynchronyError::NumericalFailure(
            "non-finite singular value sum".to_string(),
        ));
    }
    if sum <= f64::EPSILON * n as f64 * scale * scale {
        return Ok(vec![1.0 / n as f64; n]);
    }
    Ok(values.into_iter().map(|v| v / sum).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn full(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len(), "{a:?} vs {b:?}");
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_empty_input_has_no_result() {
        assert_eq!(compute_spectrum(&[]), Ok(None));
    }

    #[test]
    fn test_single_subject_fallback() {
        let rows = vec![full(&[-1.0, 0.0, 1.0])];
        assert_eq!(compute_spectrum(&rows), Ok(Some(vec![1.0])));

        let rows = vec![vec![None, None, None]];
        assert_eq!(compute_spectrum(&rows), Ok(Some(vec![1.0])));
    }

    #[test]
    fn test_identical_histories_are_rank_one() {
        let history = [1.0, -2.0, 0.5, 3.0, -1.5, 0.0];
        let rows = vec![full(&history), full(&history)];
        let spectrum = compute_spectrum(&rows).unwrap().unwrap();
        assert_close(&spectrum, &[1.0, 0.0], 1e-9);
    }

    #[test]
    fn test_uncorrelated_histories_are_flat() {
        let n = 32;
        let sin: Vec<f64> = (0..n).map(|k| (TAU * k as f64 / n as f64).sin()).collect();
        let cos: Vec<f64> = (0..n).map(|k| (TAU * k as f64 / n as f64).cos()).collect();
        let rows = vec![full(&sin), full(&cos)];
        let spectrum = compute_spectrum(&rows).unwrap().unwrap();
        assert_close(&spectrum, &[0.5, 0.5], 1e-9);
    }

    #[test]
    fn test_spectrum_sums_to_one() {
        let rows = vec![
            full(&[1.0, 2.0, 3.0, 2.0, 1.0, 0.0]),
            full(&[0.5, 1.0, 0.0, -1.0, 2.0, 1.0]),
            full(&[3.0, -1.0, 2.0, 0.0, 1.0, 4.0]),
            vec![Some(1.0), None, Some(2.0), Some(-2.0), None, Some(0.5)],
        ];
        let spectrum = compute_spectrum(&rows).unwrap().unwrap();
        assert_eq!(spectrum.len(), 4);
        assert!((spectrum.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(spectrum.windows(2).all(|w| w[0] >= w[1]));
        assert!(spectrum.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_masking_uses_shared_columns_only() {
        let a = vec![Some(1.0), Some(2.0), None, Some(4.0), Some(3.0)];
        let b = vec![Some(2.0), Some(1.0), Some(9.0), None, Some(5.0)];
        let cov = masked_covariance(&[a.clone(), b]).unwrap();

        // Shared columns 0, 1, 4
        let expected = [1.0, 2.0, 3.0]
            .iter()
            .covariance([2.0, 1.0, 5.0].iter());
        assert!((cov[(0, 1)] - expected).abs() < 1e-12);

        // Diagonal uses all of a row's own values
        let own = [1.0, 2.0, 4.0, 3.0].iter().variance();
        assert!((cov[(0, 0)] - own).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_shared_samples_contribute_zero() {
        let a = vec![Some(1.0), None, Some(3.0)];
        let b = vec![None, Some(2.0), Some(4.0)];
        let cov = masked_covariance(&[a, b]).unwrap();
        assert_eq!(cov[(0, 1)], 0.0);
        // Each row still pairs with itself over its own two samples
        assert!((cov[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((cov[(1, 1)] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_yields_equal_weights() {
        let rows = vec![vec![None; 5], vec![None; 5], vec![None; 5]];
        let spectrum = compute_spectrum(&rows).unwrap().unwrap();
        assert_close(&spectrum, &[1.0 / 3.0; 3], 1e-12);
    }

    #[test]
    fn test_flat_histories_yield_equal_weights() {
        let rows = vec![full(&[2.0; 6]), full(&[5.0; 6])];
        let spectrum = compute_spectrum(&rows).unwrap().unwrap();
        assert_close(&spectrum, &[0.5, 0.5], 1e-12);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let rows = vec![full(&[1.0, 2.0, 3.0]), full(&[1.0, 2.0])];
        assert_eq!(
            compute_spectrum(&rows),
            Err(SynchronyError::RaggedInput {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn test_overflow_is_a_numerical_failure() {
        let rows = vec![full(&[1e300, -1e300, 1e300]), full(&[-1e300, 1e300, 1e300])];
        assert!(matches!(
            compute_spectrum(&rows),
            Err(SynchronyError::NumericalFailure(_))
        ));
    }

    #[test]
    fn test_eigenvalues_of_known_matrix() {
        // Eigenvalues 3 and 1
        let values = singular_values(DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0])).unwrap();
        assert_close(&values, &[3.0, 1.0], 1e-12);

        // Indefinite matrix: singular values are absolute eigenvalues
        let values = singular_values(DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 2.0, 0.0])).unwrap();
        assert_close(&values, &[2.0, 2.0], 1e-12);

        let values = singular_values(DMatrix::from_row_slice(
            3,
            3,
            &[4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0],
        ))
        .unwrap();
        assert!((values.iter().sum::<f64>() - 9.0).abs() < 1e-9);
        assert!((values.iter().product::<f64>() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_scale_histories_keep_their_shape() {
        let history = [1.0, -2.0, 0.5, 3.0, -1.5, 0.0];
        for scale in [1e-6, 1e-9, 1e-12] {
            let scaled: Vec<f64> = history.iter().map(|v| v * scale).collect();
            let rows = vec![full(&scaled), full(&scaled)];
            let spectrum = compute_spectrum(&rows).unwrap().unwrap();
            assert_close(&spectrum, &[1.0, 0.0], 1e-9);
        }
    }

    #[test]
    fn test_rounding_noise_on_flat_histories_is_degenerate() {
        let rows = vec![full(&[0.1; 6]), full(&[0.3; 6]), full(&[0.7; 6])];
        let spectrum = compute_spectrum(&rows).unwrap().unwrap();
        assert_close(&spectrum, &[1.0 / 3.0; 3], 1e-12);
    }
}
