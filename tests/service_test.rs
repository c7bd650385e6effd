//! Integration tests for the UDP synchrony service

use std::time::Duration;
use synheart_synchrony::config::{Config, Destination};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use synheart_synchrony::ingest::{decode_messages, numeric_value};
use synheart_synchrony::{create_shared_stats, service};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

async fn bind_receiver() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind receiver")
}

fn test_config(destinations: &[&UdpSocket]) -> Config {
    Config {
        listen_host: "127.0.0.1".to_string(),
        listen_port: 0,
        destinations: destinations
            .iter()
            .map(|s| {
                let addr = s.local_addr().unwrap();
                Destination::new(addr.ip().to_string(), addr.port())
            })
            .collect(),
        max_subjects: 4,
        window_depth: 5,
        tick_interval: Duration::from_millis(50),
        ..Config::default()
    }
}

async fn send(socket: &UdpSocket, target: std::net::SocketAddr, address: &str, value: f64) {
    let message = OscMessage {
        addr: address.to_string(),
        args: vec![OscType::Double(value)],
    };
    let packet = encoder::encode(&OscPacket::Message(message)).expect("Failed to encode sample");
    socket
        .send_to(&packet, target)
        .await
        .expect("Failed to send sample");
}

async fn recv_message(socket: &UdpSocket, wait: Duration) -> Option<OscMessage> {
    let mut buf = vec![0u8; 4096];
    let (len, _) = timeout(wait, socket.recv_from(&mut buf)).await.ok()?.ok()?;
    decode_messages(&buf[..len]).ok()?.into_iter().next()
}

fn spectrum(message: &OscMessage) -> Vec<f64> {
    message.args.iter().filter_map(numeric_value).collect()
}

#[tokio::test]
async fn test_emits_spectrum_for_active_subjects() {
    let receiver = bind_receiver().await;
    let stats = create_shared_stats();
    let handle = service::run(test_config(&[&receiver]), stats.clone())
        .await
        .expect("Failed to start service");
    let target = handle.local_addr();

    let sender = bind_receiver().await;
    send(&sender, target, "/polar/1/hr", 62.0).await;
    send(&sender, target, "/polar/2/hr", 75.0).await;

    // Wait for an hr result that covers both subjects
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut found = None;
    while Instant::now() < deadline {
        if let Some(message) = recv_message(&receiver, Duration::from_millis(500)).await {
            if message.addr == "/polar/similarity/hr" && message.args.len() == 2 {
                found = Some(message);
                break;
            }
        }
    }

    let message = found.expect("No two-subject hr result received");
    let values = spectrum(&message);
    assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-6);

    let engine = handle.engine();
    {
        let engine = engine.lock().await;
        assert!(engine.registry().is_active(0));
        assert!(engine.registry().is_active(1));
    }

    handle.shutdown().await;
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.samples_applied, 2);
    assert!(snapshot.ticks >= 1);
    assert!(snapshot.results_emitted >= 1);
}

#[tokio::test]
async fn test_results_follow_metric_order() {
    let receiver = bind_receiver().await;
    let handle = service::run(test_config(&[&receiver]), create_shared_stats())
        .await
        .expect("Failed to start service");

    let sender = bind_receiver().await;
    send(&sender, handle.local_addr(), "/polar/1/ibi", 820.0).await;

    // Skip to the start of a tick, then read one full tick
    let mut first = None;
    for _ in 0..20 {
        match recv_message(&receiver, Duration::from_secs(1)).await {
            Some(m) if m.addr == "/polar/similarity/hr" => {
                first = Some(m);
                break;
            }
            Some(_) => continue,
            None => break,
        }
    }
    assert!(first.is_some(), "No hr result received");

    let second = recv_message(&receiver, Duration::from_secs(1)).await.unwrap();
    let third = recv_message(&receiver, Duration::from_secs(1)).await.unwrap();
    assert_eq!(second.addr, "/polar/similarity/ibi");
    assert_eq!(third.addr, "/polar/similarity/hrv");
    assert_eq!(spectrum(&second), vec![1.0]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_fan_out_to_all_destinations() {
    let first = bind_receiver().await;
    let second = bind_receiver().await;
    let handle = service::run(test_config(&[&first, &second]), create_shared_stats())
        .await
        .expect("Failed to start service");

    let sender = bind_receiver().await;
    send(&sender, handle.local_addr(), "/polar/3/hrv", 21.0).await;

    for receiver in [&first, &second] {
        let message = recv_message(receiver, Duration::from_secs(2))
            .await
            .expect("Destination received nothing");
        assert!(message.addr.starts_with("/polar/similarity/"));
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_nothing_emitted_without_subjects() {
    let receiver = bind_receiver().await;
    let stats = create_shared_stats();
    let handle = service::run(test_config(&[&receiver]), stats.clone())
        .await
        .expect("Failed to start service");

    assert!(recv_message(&receiver, Duration::from_millis(300))
        .await
        .is_none());
    assert!(stats.snapshot().ticks >= 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_bad_input_is_dropped() {
    let receiver = bind_receiver().await;
    let stats = create_shared_stats();
    let handle = service::run(test_config(&[&receiver]), stats.clone())
        .await
        .expect("Failed to start service");
    let target = handle.local_addr();

    let sender = bind_receiver().await;
    send(&sender, target, "/polar/9/hr", 60.0).await;
    send(&sender, target, "/polar/1/ecg", 60.0).await;
    send(&sender, target, "/other/1/hr", 60.0).await;
    sender.send_to(b"not osc", target).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let snapshot = stats.snapshot();
        if snapshot.capacity_rejections + snapshot.messages_dropped >= 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.capacity_rejections, 1);
    assert_eq!(snapshot.messages_dropped, 3);
    assert_eq!(snapshot.samples_applied, 0);
    assert!(handle.engine().lock().await.registry().is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_startup_errors_surface() {
    let receiver = bind_receiver().await;

    let invalid = Config {
        alpha: 0.0,
        ..test_config(&[&receiver])
    };
    assert!(service::run(invalid, create_shared_stats()).await.is_err());

    // Port already taken
    let taken = bind_receiver().await;
    let busy = Config {
        listen_port: taken.local_addr().unwrap().port(),
        ..test_config(&[&receiver])
    };
    assert!(service::run(busy, create_shared_stats()).await.is_err());
}
