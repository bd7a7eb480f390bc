#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use outage_router::prelude::*;
use tower::BoxError;

/// Records the ids of every event it sees.
#[derive(Clone, Default)]
pub struct RecordingListener {
    pub name: &'static str,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    pub fn named(name: &'static str) -> Self {
        Self { name, seen: Arc::default() }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutageEventListener for RecordingListener {
    async fn on_event(&self, event: &OutageEvent) -> Result<(), BoxError> {
        self.seen.lock().unwrap().push(event.event_id().to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Always fails.
pub struct FailingListener;

#[async_trait]
impl OutageEventListener for FailingListener {
    async fn on_event(&self, _event: &OutageEvent) -> Result<(), BoxError> {
        Err("pager gateway unreachable".into())
    }

    fn name(&self) -> &str {
        "pager"
    }
}

/// Fails its first `failures` saves, then delegates to an in-memory store.
#[derive(Clone)]
pub struct FlakyStore {
    pub attempts: Arc<AtomicUsize>,
    pub failures: usize,
    pub saved: InMemoryStore,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self { attempts: Arc::default(), failures, saved: InMemoryStore::new() }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutageStore for FlakyStore {
    async fn save_event(&self, event: &OutageEvent) -> Result<(), BoxError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(format!("database unavailable (attempt {})", n + 1).into());
        }
        self.saved.save_event(event).await
    }
}

/// Never finishes a save.
pub struct StalledStore;

#[async_trait]
impl OutageStore for StalledStore {
    async fn save_event(&self, _event: &OutageEvent) -> Result<(), BoxError> {
        std::future::pending().await
    }
}

pub fn retry(max_retries: u32, enabled: bool) -> RetryConfig {
    RetryConfig { max_retries, enabled }
}
