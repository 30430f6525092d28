//! Optional consumer that logs every audit payload seen on a bus destination.

use tokio::task::JoinHandle;

use audit_facade::AuditBus;

/// Subscribe now, log in the background. The task ends when the bus is dropped.
pub fn spawn_log_consumer(bus: &AuditBus, destination: &str) -> JoinHandle<()> {
    let mut sub = bus.subscribe(destination);
    tracing::info!(%destination, "audit log consumer subscribed");
    tokio::spawn(async move {
        while let Some(msg) = sub.recv().await {
            let kind = msg.properties.get("kind").map(String::as_str).unwrap_or("-");
            tracing::info!(
                target: "audit_consumer",
                destination = %sub.destination(),
                kind,
                priority = msg.priority,
                "audit payload: {}",
                msg.body
            );
        }
    })
}
