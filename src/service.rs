//! UDP service running the synchrony engine.
//!
//! This module provides a service that:
//! - Receives sample messages over OSC/UDP and applies them to the engine
//! - Runs the fixed-interval scheduler that updates windows and computes
//!   synchrony spectra
//! - Sends one similarity message per metric per tick to every destination
//!
//! # Architecture
//!
//! ```text
//! Sensor adapters ──→ UDP :8001 ──→ [receive] ──┐
//!                                               ▼
//!                                    Mutex<SynchronyEngine>
//!                                               ▲
//!                  timer (1s) ──→ [scheduler] ──┘──→ /polar/similarity/* ──→ destinations
//! ```

use crate::config::Config;
use crate::engine::SynchronyEngine;
use crate::ingest::decode_messages;
use crate::stats::SharedStats;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Largest datagram accepted.
const MAX_PACKET_SIZE: usize = 65_536;

/// Engine shared between the receive task and the scheduler.
pub type SharedEngine = Arc<Mutex<SynchronyEngine>>;

/// Handle to a running service.
pub struct ServiceHandle {
    local_addr: SocketAddr,
    engine: SharedEngine,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Address the inbound socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared engine state, for inspection.
    pub fn engine(&self) -> SharedEngine {
        self.engine.clone()
    }

    /// Stop both tasks and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Service task failed: {}", e);
        }
    }
}

/// Start the service.
///
/// Configuration errors, bind failures and unresolvable destinations are
/// reported here, before any task is spawned.
pub async fn run(config: Config, stats: SharedStats) -> anyhow::Result<ServiceHandle> {
    config.validate()?;

    let socket = UdpSocket::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;
    let local_addr = socket.local_addr()?;

    let mut destinations = Vec::with_capacity(config.destinations.len());
    for destination in &config.destinations {
        destinations.push(destination.resolve().await?);
    }

    let out_bind = if destinations.iter().all(SocketAddr::is_ipv4) {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let out_socket = UdpSocket::bind(out_bind)
        .await
        .context("Failed to bind outbound socket")?;

    let engine: SharedEngine = Arc::new(Mutex::new(SynchronyEngine::new(&config)));

    tracing::info!("Synchrony engine listening on udp://{}", local_addr);
    for destination in &destinations {
        tracing::info!("Sending similarity results to udp://{}", destination);
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let receiver = receive_loop(socket, engine.clone(), stats.clone());
    let scheduler = scheduler_loop(
        engine.clone(),
        out_socket,
        destinations,
        config.namespace.clone(),
        config.tick_interval,
        stats,
    );

    let task = tokio::spawn(async move {
        tokio::select! {
            _ = receiver => {}
            _ = scheduler => {}
            _ = shutdown_rx => {
                tracing::info!("Service shutdown signal received");
            }
        }
    });

    Ok(ServiceHandle {
        local_addr,
        engine,
        shutdown_tx,
        task,
    })
}

/// Receive datagrams and apply every message they carry.
async fn receive_loop(socket: UdpSocket, engine: SharedEngine, stats: SharedStats) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];

    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!("Receive failed: {}", e);
                continue;
            }
        };

        let messages = match decode_messages(&buf[..len]) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::debug!(%peer, "Dropping undecodable packet: {:?}", e);
                stats.record_dropped();
                continue;
            }
        };

        let mut guard = engine.lock().await;
        for message in &messages {
            stats.record_received();
            match guard.ingest(message) {
                Ok(sample) => {
                    stats.record_applied();
                    tracing::debug!(
                        subject = sample.subject,
                        metric = %sample.metric,
                        value = sample.value,
                        "{}",
                        message.addr
                    );
                }
                Err(e) if e.is_capacity_exceeded() => {
                    stats.record_capacity_rejection();
                    tracing::warn!("{}", e);
                }
                Err(e) => {
                    stats.record_dropped();
                    tracing::debug!(%peer, "{}", e);
                }
            }
        }
    }
}

/// Tick at a fixed interval, compute and emit results.
async fn scheduler_loop(
    engine: SharedEngine,
    socket: UdpSocket,
    destinations: Vec<SocketAddr>,
    namespace: String,
    interval: Duration,
    stats: SharedStats,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // Lock only for the tick body; sending happens after release
        let report = engine.lock().await.tick();
        stats.record_tick();
        tracing::debug!(tick = report.tick, active = report.active_subjects, "Tick");

        for (metric, e) in &report.failures {
            stats.record_computation_failure();
            tracing::warn!(%metric, "Skipping synchrony result this tick: {}", e);
        }

        for result in &report.results {
            let packet = match result.encode(&namespace) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::warn!(metric = %result.metric, "Failed to encode result: {:?}", e);
                    continue;
                }
            };
            for destination in &destinations {
                if let Err(e) = socket.send_to(&packet, *destination).await {
                    tracing::warn!(%destination, "Failed to send result: {}", e);
                }
            }
            stats.record_emitted();
        }
    }
}
