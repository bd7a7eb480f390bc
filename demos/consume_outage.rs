//! Wires the full pipeline and consumes a few outage events.
//!
//! Run with `cargo run --example consume_outage [config.toml]`; environment overrides such as
//! `OUTAGE_RETRY_MAX_RETRIES=5` apply on top of the file.
use outage_router::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(true).init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    let config = config.with_overrides(|key| std::env::var(key).ok())?;

    let store = InMemoryStore::new();
    let listeners = ListenerRegistry::builder()
        .listener(StandardOutageListener)
        .listener(CriticalOutageListener)
        .build();
    let collaborators = Collaborators::new(listeners, Arc::new(store.clone()));

    let registry = DecoratorFactory::new(&config.retry)?
        .with_sink(LogSink)
        .build_registry(collaborators)?;
    install_global(registry)?;

    let consumer = OutageEventConsumer::from_global()?.with_config(&config.consumer);

    let now = chrono::Utc::now();
    let events = vec![
        OutageEvent::new("1001", SourceSystem::Scada, now)
            .with_description("Feeder 12 breaker trip")
            .with_severity(6),
        OutageEvent::new("1002", SourceSystem::Ems, now).with_severity(9),
        OutageEvent::new("1003", SourceSystem::Dms, now + chrono::Duration::hours(2)),
    ];
    for event in events {
        consumer.consume(event).await;
    }

    println!(
        "processed={} failed={} saved={}",
        consumer.stats().processed(),
        consumer.stats().failed(),
        store.len()
    );
    Ok(())
}
