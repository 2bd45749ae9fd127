#![allow(dead_code)]

use async_trait::async_trait;
use docker_registry_resolver::registry::{RegistryPolicy, ResolvedEndpoint, Resolver, Transfer, TransferOutcome};
use docker_registry_resolver::{LocalImages, PolicyConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const R1: &str = "localhost:5000";
pub const R2: &str = "registry.example.com";

pub fn resolver(additional: &[&str], blocked: &[&str]) -> Resolver {
    let config = PolicyConfig::new(
        additional.iter().map(|s| s.to_string()).collect(),
        blocked.iter().map(|s| s.to_string()).collect(),
    );
    Resolver::new(Arc::new(RegistryPolicy::from_config(&config).unwrap()))
}

/// Transfer answering from a fixed per-host table and recording every attempt
#[derive(Default)]
pub struct ScriptedTransfer {
    outcomes: HashMap<String, TransferOutcome>,
    pub attempts: Mutex<Vec<String>>,
}

impl ScriptedTransfer {
    pub fn new(outcomes: &[(&str, TransferOutcome)]) -> Self {
        Self {
            outcomes: outcomes
                .iter()
                .map(|(host, outcome)| (host.to_string(), outcome.clone()))
                .collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    fn answer(&self, endpoint: &ResolvedEndpoint) -> TransferOutcome {
        self.attempts.lock().unwrap().push(endpoint.to_string());
        self.outcomes
            .get(&endpoint.host)
            .cloned()
            .unwrap_or(TransferOutcome::NotFound)
    }
}

#[async_trait]
impl Transfer for ScriptedTransfer {
    async fn pull(&self, endpoint: &ResolvedEndpoint) -> TransferOutcome {
        self.answer(endpoint)
    }

    async fn push(&self, endpoint: &ResolvedEndpoint) -> TransferOutcome {
        self.answer(endpoint)
    }
}

/// Transfer whose pushes park until the test opens the gate
pub struct GatedTransfer {
    gate: Semaphore,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl GatedTransfer {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn open(&self, pushes: usize) {
        self.gate.add_permits(pushes);
    }
}

#[async_trait]
impl Transfer for GatedTransfer {
    async fn pull(&self, _endpoint: &ResolvedEndpoint) -> TransferOutcome {
        TransferOutcome::Found
    }

    async fn push(&self, _endpoint: &ResolvedEndpoint) -> TransferOutcome {
        self.started.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        permit.unwrap().forget();

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        TransferOutcome::Found
    }
}

/// Local image store backed by a map of repository name to tags
#[derive(Default)]
pub struct MemoryImages {
    repositories: HashMap<String, Vec<String>>,
}

impl MemoryImages {
    pub fn with(mut self, name: &str, tags: &[&str]) -> Self {
        self.repositories
            .insert(name.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }
}

#[async_trait]
impl LocalImages for MemoryImages {
    async fn tags(&self, name: &str) -> Option<Vec<String>> {
        self.repositories.get(name).cloned()
    }
}

pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
