//! In-memory cluster used by the desirer tests
//!
//! Mimics the API server behaviour the desirer relies on: label selector
//! filtering, name collisions on create, resourceVersion preconditions on
//! replace, and NotFound on deleting missing objects. Individual operations
//! can be made to fail to exercise error propagation.

use super::{ClusterClient, ClusterError};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

pub const LIST_STATEFUL_SETS: &str = "list statefulsets";
pub const CREATE_STATEFUL_SET: &str = "create statefulset";
pub const REPLACE_STATEFUL_SET: &str = "replace statefulset";
pub const DELETE_STATEFUL_SET: &str = "delete statefulset";
pub const LIST_PODS: &str = "list pods";
pub const DELETE_POD: &str = "delete pod";
pub const LIST_EVENTS: &str = "list events";

#[derive(Default)]
struct State {
    stateful_sets: BTreeMap<String, StatefulSet>,
    pods: Vec<Pod>,
    events: Vec<Event>,
    next_resource_version: u64,
    failing: HashMap<&'static str, ClusterError>,
    write_calls: usize,
}

impl State {
    fn bump_resource_version(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }

    fn check(&self, operation: &'static str) -> Result<(), ClusterError> {
        match self.failing.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail with a transport error
    pub fn fail(&self, operation: &'static str) {
        self.fail_with(operation, ClusterError::Transport(format!("boom: {}", operation)));
    }

    /// Make every call of `operation` fail with `err`
    pub fn fail_with(&self, operation: &'static str, err: ClusterError) {
        self.state.lock().unwrap().failing.insert(operation, err);
    }

    /// Store a StatefulSet directly, bypassing create semantics
    pub fn insert_stateful_set(&self, mut stateful_set: StatefulSet) {
        let mut state = self.state.lock().unwrap();
        stateful_set.metadata.resource_version = Some(state.bump_resource_version());
        let name = stateful_set.metadata.name.clone().unwrap_or_default();
        state.stateful_sets.insert(name, stateful_set);
    }

    pub fn insert_pod(&self, pod: Pod) {
        self.state.lock().unwrap().pods.push(pod);
    }

    pub fn insert_event(&self, event: Event) {
        self.state.lock().unwrap().events.push(event);
    }

    pub fn stateful_sets(&self) -> Vec<StatefulSet> {
        self.state
            .lock()
            .unwrap()
            .stateful_sets
            .values()
            .cloned()
            .collect()
    }

    pub fn stateful_set(&self, name: &str) -> Option<StatefulSet> {
        self.state.lock().unwrap().stateful_sets.get(name).cloned()
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .pods
            .iter()
            .filter_map(|pod| pod.metadata.name.clone())
            .collect()
    }

    /// Number of create/replace/delete calls received
    pub fn write_calls(&self) -> usize {
        self.state.lock().unwrap().write_calls
    }
}

/// Match `k=v,k=v` selectors against object labels
fn matches_selector(metadata: &ObjectMeta, selector: &str) -> bool {
    let empty = BTreeMap::new();
    let labels = metadata.labels.as_ref().unwrap_or(&empty);

    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(term),
        })
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_stateful_sets(
        &self,
        label_selector: &str,
    ) -> Result<Vec<StatefulSet>, ClusterError> {
        let state = self.state.lock().unwrap();
        state.check(LIST_STATEFUL_SETS)?;
        Ok(state
            .stateful_sets
            .values()
            .filter(|s| matches_selector(&s.metadata, label_selector))
            .cloned()
            .collect())
    }

    async fn create_stateful_set(
        &self,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.check(CREATE_STATEFUL_SET)?;

        let name = stateful_set.metadata.name.clone().unwrap_or_default();
        if state.stateful_sets.contains_key(&name) {
            return Err(ClusterError::AlreadyExists(format!("statefulset {}", name)));
        }

        let mut created = stateful_set.clone();
        created.metadata.resource_version = Some(state.bump_resource_version());
        state.stateful_sets.insert(name, created.clone());
        Ok(created)
    }

    async fn replace_stateful_set(
        &self,
        name: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.check(REPLACE_STATEFUL_SET)?;

        let current = state
            .stateful_sets
            .get(name)
            .ok_or_else(|| ClusterError::NotFound(format!("statefulset {}", name)))?;
        if stateful_set.metadata.resource_version.is_some()
            && stateful_set.metadata.resource_version != current.metadata.resource_version
        {
            return Err(ClusterError::Conflict(format!("statefulset {}", name)));
        }

        let mut replaced = stateful_set.clone();
        replaced.metadata.resource_version = Some(state.bump_resource_version());
        state.stateful_sets.insert(name.to_string(), replaced.clone());
        Ok(replaced)
    }

    async fn delete_stateful_set(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.check(DELETE_STATEFUL_SET)?;
        state
            .stateful_sets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(format!("statefulset {}", name)))
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, ClusterError> {
        let state = self.state.lock().unwrap();
        state.check(LIST_PODS)?;
        Ok(state
            .pods
            .iter()
            .filter(|p| matches_selector(&p.metadata, label_selector))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.check(DELETE_POD)?;
        let before = state.pods.len();
        state
            .pods
            .retain(|pod| pod.metadata.name.as_deref() != Some(name));
        if state.pods.len() == before {
            Err(ClusterError::NotFound(format!("pod {}", name)))
        } else {
            Ok(())
        }
    }

    async fn list_events(&self) -> Result<Vec<Event>, ClusterError> {
        let state = self.state.lock().unwrap();
        state.check(LIST_EVENTS)?;
        Ok(state.events.clone())
    }
}
