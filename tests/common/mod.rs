#![allow(dead_code)]

use async_trait::async_trait;
use port_forward_sync::{Feature, PortRecord, RouterFeatureStore, SyncError};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    live: Value,
    not_ready_fetches: usize,
    transient_failures: usize,
    malformed: bool,
    fail_commits: bool,
    hang_fetches: bool,
    fetch_count: usize,
    commit_attempts: usize,
    commits: Vec<Feature>,
}

/// In-memory router: serves `rules-config` and records every commit.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeStore {
    pub fn with_rules(rules: Value) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().live = rules;
        store
    }

    pub fn empty() -> Self {
        Self::with_rules(json!([]))
    }

    pub fn not_ready_for(self, fetches: usize) -> Self {
        self.state.lock().unwrap().not_ready_fetches = fetches;
        self
    }

    pub fn never_ready(self) -> Self {
        self.not_ready_for(usize::MAX)
    }

    pub fn transient_failures(self, count: usize) -> Self {
        self.state.lock().unwrap().transient_failures = count;
        self
    }

    pub fn malformed(self) -> Self {
        self.state.lock().unwrap().malformed = true;
        self
    }

    pub fn failing_commits(self) -> Self {
        self.state.lock().unwrap().fail_commits = true;
        self
    }

    /// Every fetch stays pending forever, like a router that stopped answering.
    pub fn hanging(self) -> Self {
        self.state.lock().unwrap().hang_fetches = true;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetch_count
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits.len()
    }

    /// Commit calls including rejected ones.
    pub fn commit_attempts(&self) -> usize {
        self.state.lock().unwrap().commit_attempts
    }

    pub fn last_commit(&self) -> Option<Feature> {
        self.state.lock().unwrap().commits.last().cloned()
    }

    pub fn live_rules(&self) -> Vec<Value> {
        match &self.state.lock().unwrap().live {
            Value::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl RouterFeatureStore for FakeStore {
    async fn fetch_rule_feature(&self) -> port_forward_sync::Result<Feature> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.fetch_count += 1;
            state.hang_fetches
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();

        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(SyncError::TransportError {
                message: "connection reset by peer".to_string(),
            });
        }

        if state.malformed {
            return Err(SyncError::MalformedResponseError {
                message: "data is not an object".to_string(),
            });
        }

        let mut data = Map::new();
        data.insert("wan-interface".to_string(), json!("eth0"));

        if state.not_ready_fetches > 0 {
            state.not_ready_fetches -= 1;
            data.insert("rules-config".to_string(), Value::Null);
        } else {
            data.insert("rules-config".to_string(), state.live.clone());
        }

        Ok(Feature::new(data))
    }

    async fn commit_rule_feature(&self, feature: &Feature) -> port_forward_sync::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commit_attempts += 1;

        if state.fail_commits {
            return Err(SyncError::TransportError {
                message: "router closed the connection".to_string(),
            });
        }

        state.live = feature
            .data
            .get("rules-config")
            .cloned()
            .unwrap_or(Value::Null);
        state.commits.push(feature.clone());
        Ok(())
    }
}

pub fn web() -> PortRecord {
    PortRecord::new("80", "10.0.0.5", "8080", "tcp", "web")
}

pub fn ssh() -> PortRecord {
    PortRecord::new("2222", "10.0.0.2", "22", "tcp", "ssh")
}

pub fn dns() -> PortRecord {
    PortRecord::new("53", "10.0.0.53", "53", "udp", "dns")
}

/// Router-side JSON for a rule, string-valued as the router usually sends it.
pub fn remote_rule(port: &PortRecord) -> Value {
    json!({
        "original-port": port.port,
        "forward-to-address": port.forward_to_address,
        "forward-to-port": port.forward_to_port,
        "protocol": port.protocol,
        "description": port.description,
    })
}
