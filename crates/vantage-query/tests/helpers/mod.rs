//! Shared fixtures for query cache integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

use vantage_core::{Error, Result};
use vantage_query::Fetcher;

/// Fetcher whose responses are released by the test, one request at a time.
#[derive(Default)]
pub struct GatedFetcher {
    pending: Mutex<Vec<(String, oneshot::Sender<Result<JsonValue>>)>>,
    calls: Mutex<Vec<String>>,
    registered: Notify,
}

impl GatedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }

    pub fn pending_for(&self, key: &str) -> usize {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .count()
    }

    /// Wait until at least `n` requests for `key` are blocked on a release.
    pub async fn wait_pending(&self, key: &str, n: usize) {
        loop {
            let notified = self.registered.notified();
            if self.pending_for(key) >= n {
                return;
            }
            notified.await;
        }
    }

    /// Answer the oldest pending request for `key`.
    pub fn release(&self, key: &str, result: Result<JsonValue>) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match pending.iter().position(|(k, _)| k == key) {
            Some(i) => pending.remove(i).1.send(result).is_ok(),
            None => false,
        }
    }

    /// Answer the newest pending request for `key`.
    pub fn release_newest(&self, key: &str, result: Result<JsonValue>) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match pending.iter().rposition(|(k, _)| k == key) {
            Some(i) => pending.remove(i).1.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, key: &str) -> Result<JsonValue> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(key.to_string());
        self.pending.lock().unwrap().push((key.to_string(), tx));
        self.registered.notify_waiters();
        rx.await
            .unwrap_or_else(|_| Err(Error::Internal("gate dropped".to_string())))
    }
}

pub fn server_error() -> Error {
    Error::Status {
        status: 500,
        reason: "Internal Server Error".to_string(),
    }
}

/// Give spawned fetch tasks a chance to run to completion.
pub async fn drain_tasks() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
