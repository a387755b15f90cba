//! In-memory queue backend.
//!
//! Records every connect, send and stop in a shared journal, and can be told
//! to fail or hold operations on a given queue.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::client::{QueueClient, QueueConnector, QueueError};
use crate::config::QueueSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOp {
    Connect(String),
    Send { queue: String, body: String },
    Stop(String),
}

#[derive(Default)]
struct Behaviour {
    fail_connect: HashSet<String>,
    fail_send: HashSet<String>,
    fail_stop: HashSet<String>,
    held: HashMap<String, CancellationToken>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MemoryConnector {
    journal: Arc<Mutex<Vec<QueueOp>>>,
    behaviour: Arc<Mutex<Behaviour>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, queue: &str) {
        lock(&self.behaviour).fail_connect.insert(queue.to_string());
    }

    pub fn fail_send(&self, queue: &str) {
        lock(&self.behaviour).fail_send.insert(queue.to_string());
    }

    pub fn fail_stop(&self, queue: &str) {
        lock(&self.behaviour).fail_stop.insert(queue.to_string());
    }

    /// Hold every send on `queue` until the returned token is cancelled.
    pub fn hold_sends(&self, queue: &str) -> CancellationToken {
        let gate = CancellationToken::new();
        lock(&self.behaviour)
            .held
            .insert(queue.to_string(), gate.clone());
        gate
    }

    /// All operations in the order they were issued.
    pub fn ops(&self) -> Vec<QueueOp> {
        lock(&self.journal).clone()
    }

    /// Bodies of every send attempted on `queue`.
    pub fn sent(&self, queue: &str) -> Vec<String> {
        lock(&self.journal)
            .iter()
            .filter_map(|op| match op {
                QueueOp::Send { queue: q, body } if q == queue => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn stopped(&self) -> Vec<String> {
        lock(&self.journal)
            .iter()
            .filter_map(|op| match op {
                QueueOp::Stop(q) => Some(q.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl QueueConnector for MemoryConnector {
    type Client = MemoryQueue;

    async fn connect(
        &self,
        _settings: &QueueSettings,
        queue_name: &str,
    ) -> Result<MemoryQueue, QueueError> {
        lock(&self.journal).push(QueueOp::Connect(queue_name.to_string()));

        if lock(&self.behaviour).fail_connect.contains(queue_name) {
            return Err(QueueError::Unavailable(format!(
                "connection refused for {}",
                queue_name
            )));
        }

        Ok(MemoryQueue {
            name: queue_name.to_string(),
            journal: self.journal.clone(),
            behaviour: self.behaviour.clone(),
        })
    }
}

pub struct MemoryQueue {
    name: String,
    journal: Arc<Mutex<Vec<QueueOp>>>,
    behaviour: Arc<Mutex<Behaviour>>,
}

#[async_trait]
impl QueueClient for MemoryQueue {
    fn queue_name(&self) -> &str {
        &self.name
    }

    async fn send_message(&self, cancel: &CancellationToken, body: &str) -> Result<(), QueueError> {
        lock(&self.journal).push(QueueOp::Send {
            queue: self.name.clone(),
            body: body.to_string(),
        });

        let (fail, gate) = {
            let behaviour = lock(&self.behaviour);
            (
                behaviour.fail_send.contains(&self.name),
                behaviour.held.get(&self.name).cloned(),
            )
        };

        if let Some(gate) = gate {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = gate.cancelled() => {},
            }
        }

        if cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }

        if fail {
            return Err(QueueError::Unavailable("connection refused".to_string()));
        }

        Ok(())
    }

    async fn stop(self) -> Result<(), QueueError> {
        lock(&self.journal).push(QueueOp::Stop(self.name.clone()));

        if lock(&self.behaviour).fail_stop.contains(&self.name) {
            return Err(QueueError::Unavailable(format!("failed to close {}", self.name)));
        }

        Ok(())
    }
}
