//! # Live Client Connect/Subscribe Test
//!
//! Connects to a running OfficeStream backend, joins an organization's scene
//! room, and prints every canonical event received for a short window.
//!
//! Requires a backend at `OFFICESTREAM_API_BASE` (default
//! `http://localhost:3000`); pass an organization id as the first CLI
//! argument (default `org-001`).

use std::sync::Arc;
use std::time::Duration;

use lib_client::{ClientConfig, EventKind, OfficeClient, Vec3};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let organization = std::env::args().nth(1).unwrap_or_else(|| "org-001".to_string());
    let config = ClientConfig::load(None);
    let client = Arc::new(OfficeClient::new(config)?);

    println!("--- OfficeStream Live Client Test ---");
    println!("[*] Connecting and joining scene room for '{}'...", organization);

    // // Statement: Subscribe to every canonical kind before connecting so
    // // the connection-status event itself is observed.
    for kind in [
        EventKind::ConnectionStatus,
        EventKind::StatusUpdate,
        EventKind::TaskFlowUpdate,
        EventKind::NetworkUpdate,
        EventKind::MeetingUpdate,
        EventKind::PipelineEvent,
        EventKind::InterventionRequired,
        EventKind::Error,
    ] {
        client.on(kind, move |event| {
            println!("[EVENT] {:?}: {}", event.kind, event.payload);
        });
    }

    client.connect(Some(&organization));

    // // Statement: Give the transport a moment, then verify the lifecycle.
    tokio::time::sleep(Duration::from_secs(3)).await;
    if client.is_connected() {
        println!("[SUCCESS] Connected (transport {:?})", client.transport_id());
    } else {
        eprintln!("[ERROR] Not connected after 3s; check the backend and retry budget.");
        eprintln!(">>> state: {:?}", client.connection_state());
        std::process::exit(1);
    }

    // // Statement: Exercise the push subscriptions and position broadcast.
    client.subscribe_task_flow(None);
    client.subscribe_collaboration_network();
    client.update_agent_position("live-test-avatar", Vec3 { x: 1.0, y: 0.0, z: 2.0 }, None);

    println!("[*] Listening for events for 30s...");
    tokio::time::sleep(Duration::from_secs(30)).await;

    // // Statement: Second connect must be a no-op while connected.
    let transport_before = client.transport_id();
    client.connect(Some(&organization));
    assert_eq!(client.transport_id(), transport_before);
    println!("[SUCCESS] Repeated connect left the session untouched.");

    client.disconnect();
    assert!(!client.is_connected());
    println!("[SUCCESS] Disconnected cleanly.");

    Ok(())
}
