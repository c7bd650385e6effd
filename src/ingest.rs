//! Parsing of inbound sample messages.
//!
//! Sensor adapters publish one message per sample at
//! `/<namespace>/<subject>/<metric>` with a single numeric argument, where
//! `<subject>` is a one-based integer and `<metric>` one of `hr`, `ibi` or
//! `hrv`. Anything else is rejected here and dropped by the engine.
//!
//! Datagrams are decoded with `rosc`; bundles are flattened so that every
//! message they carry is handled in order.

use crate::core::{Metric, RegistryError};
use rosc::{OscMessage, OscPacket, OscType};

/// A validated inbound sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// One-based subject tag as sent by the adapter
    pub subject: u32,
    pub metric: Metric,
    pub value: f64,
}

/// Reasons an inbound message was not applied.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Address or payload does not have the expected shape.
    Malformed(String),
    /// The subject could not be placed in the registry.
    Registry(RegistryError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Malformed(e) => write!(f, "Malformed message: {e}"),
            IngestError::Registry(e) => write!(f, "Rejected sample: {e}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<RegistryError> for IngestError {
    fn from(e: RegistryError) -> Self {
        IngestError::Registry(e)
    }
}

impl IngestError {
    /// Whether this rejection was caused by the subject capacity limit.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(
            self,
            IngestError::Registry(RegistryError::CapacityExceeded { .. })
        )
    }
}

/// Decode a datagram into its messages, flattening (nested) bundles.
pub fn decode_messages(packet: &[u8]) -> Result<Vec<OscMessage>, rosc::OscError> {
    let (_, packet) = rosc::decoder::decode_udp(packet)?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            // Time tags are ignored; elements apply on arrival
            for element in bundle.content {
                flatten(element, out);
            }
        }
    }
}

/// Numeric value of an argument, if it is numeric.
pub fn numeric_value(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Int(v) => Some(*v as f64),
        OscType::Float(v) => Some(*v as f64),
        OscType::Double(v) => Some(*v),
        OscType::Long(v) => Some(*v as f64),
        _ => None,
    }
}

/// Validate a message against the expected address shape and payload.
pub fn parse_sample(namespace: &str, message: &OscMessage) -> Result<Sample, IngestError> {
    let path = message.addr.strip_prefix('/').unwrap_or(&message.addr);

    let segments: Vec<&str> = path.split('/').collect();
    let [ns, subject, metric] = segments.as_slice() else {
        return Err(IngestError::Malformed(format!(
            "expected 3 address segments in '{}'",
            message.addr
        )));
    };

    if *ns != namespace {
        return Err(IngestError::Malformed(format!("unknown namespace '{ns}'")));
    }

    let metric: Metric = metric
        .parse()
        .map_err(|e| IngestError::Malformed(format!("{e}")))?;

    let subject: u32 = match subject.parse() {
        Ok(tag) if tag > 0 => tag,
        _ => {
            return Err(IngestError::Malformed(format!(
                "subject '{subject}' is not a positive integer"
            )))
        }
    };

    let value = match message.args.as_slice() {
        [arg] => numeric_value(arg)
            .ok_or_else(|| IngestError::Malformed("payload is not numeric".to_string()))?,
        args => {
            return Err(IngestError::Malformed(format!(
                "expected exactly one argument, got {}",
                args.len()
            )))
        }
    };

    if !value.is_finite() {
        return Err(IngestError::Malformed(format!("non-finite value {value}")));
    }

    Ok(Sample {
        subject,
        metric,
        value,
    })
}
