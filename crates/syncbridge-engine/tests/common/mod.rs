//! Common test utilities for engine tests.
//!
//! In-memory fakes for every client trait. Each fake counts its calls and can
//! be scripted to fail, so tests never need a network or database.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use syncbridge_connector::{
    ChildMappingBatch, ComparisonKey, ConnectorError, ConnectorResult, CountClient, CountRecord,
    DetailClient, EntityMapping, MappingStoreClient, PopulationClient, SourceClient,
    SubjectDetail, TargetClient,
};
use syncbridge_engine::{DeadLetter, DeadLetterQueue, SyncError, SyncResult};
use uuid::Uuid;

pub fn transient() -> ConnectorError {
    ConnectorError::server(503, "service unavailable")
}

pub fn rejected() -> ConnectorError {
    ConnectorError::Rejected {
        status: 400,
        detail: "bad request".to_string(),
    }
}

// ============================================================================
// Sync fakes
// ============================================================================

/// Dead-letter queue whose store is down: every push fails.
#[derive(Debug, Default)]
pub struct FailingDeadLetterQueue {
    pushes: AtomicUsize,
}

impl FailingDeadLetterQueue {
    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeadLetterQueue for FailingDeadLetterQueue {
    async fn push(&self, _entry: DeadLetter) -> SyncResult<Uuid> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Err(SyncError::DeadLetter("dead-letter store unavailable".to_string()))
    }

    async fn list(&self) -> SyncResult<Vec<DeadLetter>> {
        Ok(Vec::new())
    }

    async fn get(&self, _id: Uuid) -> SyncResult<Option<DeadLetter>> {
        Ok(None)
    }

    async fn take(&self, _id: Uuid) -> SyncResult<Option<DeadLetter>> {
        Ok(None)
    }
}

/// Source system returning `{ "id": .., "category": "EDU" }` for any id.
#[derive(Default)]
pub struct FakeSource {
    pub fetch_calls: AtomicUsize,
    pub failures: Mutex<VecDeque<ConnectorError>>,
}

impl FakeSource {
    pub fn calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn fetch(&self, _family: &str, source_id: &str) -> ConnectorResult<Value> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(json!({ "id": source_id, "category": "EDU" }))
    }
}

/// Target system handing out ids `T1`, `T2`, ...
#[derive(Default)]
pub struct FakeTarget {
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub create_failures: Mutex<VecDeque<ConnectorError>>,
    pub payloads: Mutex<Vec<Value>>,
    pub updated: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl FakeTarget {
    pub fn fail_creates(&self, errors: impl IntoIterator<Item = ConnectorError>) {
        self.create_failures.lock().unwrap().extend(errors);
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetClient for FakeTarget {
    async fn create(&self, _family: &str, payload: Value) -> ConnectorResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.create_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.payloads.lock().unwrap().push(payload);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("T{id}"))
    }

    async fn update(&self, _family: &str, target_id: &str, payload: Value) -> ConnectorResult<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload);
        self.updated.lock().unwrap().push(target_id.to_string());
        Ok(())
    }

    async fn delete(&self, _family: &str, target_id: &str) -> ConnectorResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.deleted.lock().unwrap().push(target_id.to_string());
        Ok(())
    }
}

/// Mapping store enforcing one mapping per source id and per target id.
#[derive(Default)]
pub struct FakeMappingStore {
    pub find_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub create_failures: Mutex<VecDeque<ConnectorError>>,
    mappings: Mutex<Vec<EntityMapping>>,
}

impl FakeMappingStore {
    pub fn with_mapping(mapping: EntityMapping) -> Self {
        let store = Self::default();
        store.mappings.lock().unwrap().push(mapping);
        store
    }

    pub fn fail_creates(&self, errors: impl IntoIterator<Item = ConnectorError>) {
        self.create_failures.lock().unwrap().extend(errors);
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn mapping_for(&self, source_id: &str) -> Option<EntityMapping> {
        self.mappings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.source_id == source_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.mappings.lock().unwrap().len()
    }
}

#[async_trait]
impl MappingStoreClient for FakeMappingStore {
    async fn find_mapping(
        &self,
        _family: &str,
        key_type: &str,
        id: &str,
    ) -> ConnectorResult<Option<EntityMapping>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let mappings = self.mappings.lock().unwrap();
        Ok(mappings
            .iter()
            .find(|m| match key_type {
                "target-id" => m.target_id == id,
                _ => m.source_id == id,
            })
            .cloned())
    }

    async fn create_mapping(&self, _family: &str, mapping: &EntityMapping) -> ConnectorResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.create_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let mut mappings = self.mappings.lock().unwrap();
        if let Some(existing) = mappings
            .iter()
            .find(|m| m.source_id == mapping.source_id || m.target_id == mapping.target_id)
        {
            return Err(ConnectorError::mapping_conflict(
                existing.clone(),
                mapping.clone(),
            ));
        }
        mappings.push(mapping.clone());
        Ok(())
    }

    async fn update_child_mappings(
        &self,
        _family: &str,
        _batch: &ChildMappingBatch,
    ) -> ConnectorResult<()> {
        Ok(())
    }
}

// ============================================================================
// Reconciliation fakes
// ============================================================================

/// Population of keys per partition, with scripted page failures.
#[derive(Default)]
pub struct FakePopulation {
    pub partitions: HashMap<String, Vec<ComparisonKey>>,
    pub failing_pages: HashSet<(String, u64)>,
    pub fail_size: bool,
    pub fail_partitions: bool,
    pub page_calls: AtomicUsize,
}

impl FakePopulation {
    pub fn new(partition: &str, keys: Vec<ComparisonKey>) -> Self {
        let mut population = Self::default();
        population.partitions.insert(partition.to_string(), keys);
        population
    }

    #[must_use]
    pub fn with_partition(mut self, partition: &str, keys: Vec<ComparisonKey>) -> Self {
        self.partitions.insert(partition.to_string(), keys);
        self
    }

    #[must_use]
    pub fn failing_page(mut self, partition: &str, page: u64) -> Self {
        self.failing_pages.insert((partition.to_string(), page));
        self
    }
}

#[async_trait]
impl PopulationClient for FakePopulation {
    async fn active_partitions(&self) -> ConnectorResult<Vec<String>> {
        if self.fail_partitions {
            return Err(transient());
        }
        let mut partitions: Vec<String> = self.partitions.keys().cloned().collect();
        partitions.sort();
        Ok(partitions)
    }

    async fn population_size(&self, partition: &str) -> ConnectorResult<u64> {
        if self.fail_size {
            return Err(transient());
        }
        Ok(self
            .partitions
            .get(partition)
            .map_or(0, |keys| keys.len() as u64))
    }

    async fn population_page(
        &self,
        partition: &str,
        page: u64,
        page_size: u64,
    ) -> ConnectorResult<Vec<ComparisonKey>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_pages.contains(&(partition.to_string(), page)) {
            return Err(transient());
        }
        let keys = self.partitions.get(partition).cloned().unwrap_or_default();
        Ok(keys
            .into_iter()
            .skip((page * page_size) as usize)
            .take(page_size as usize)
            .collect())
    }
}

/// Per-key counts. Keys in `failing_keys` fail both batch and single calls;
/// `reversed` returns batch results in descending key order.
#[derive(Default)]
pub struct FakeCounts {
    pub counts: HashMap<ComparisonKey, u64>,
    pub failing_keys: HashSet<ComparisonKey>,
    pub reversed: bool,
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
}

impl FakeCounts {
    pub fn new(counts: &[(ComparisonKey, u64)]) -> Self {
        Self {
            counts: counts.iter().copied().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_key(mut self, key: ComparisonKey) -> Self {
        self.failing_keys.insert(key);
        self
    }

    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }
}

#[async_trait]
impl CountClient for FakeCounts {
    async fn counts(
        &self,
        _partition: &str,
        keys: &[ComparisonKey],
    ) -> ConnectorResult<Vec<CountRecord>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if keys.iter().any(|key| self.failing_keys.contains(key)) {
            return Err(transient());
        }
        let mut records: Vec<CountRecord> = keys
            .iter()
            .filter_map(|key| self.counts.get(key).map(|count| CountRecord::new(*key, *count)))
            .collect();
        if self.reversed {
            records.reverse();
        }
        Ok(records)
    }

    async fn count(
        &self,
        _partition: &str,
        key: ComparisonKey,
    ) -> ConnectorResult<Option<CountRecord>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.contains(&key) {
            return Err(transient());
        }
        Ok(self.counts.get(&key).map(|count| CountRecord::new(key, *count)))
    }
}

/// Subject details keyed by comparison key.
#[derive(Default)]
pub struct FakeDetails {
    pub locations: HashMap<ComparisonKey, String>,
    pub calls: Mutex<Vec<ComparisonKey>>,
}

impl FakeDetails {
    pub fn new(locations: &[(ComparisonKey, &str)]) -> Self {
        Self {
            locations: locations
                .iter()
                .map(|(key, location)| (*key, (*location).to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<ComparisonKey> {
        let mut keys = self.calls.lock().unwrap().clone();
        keys.sort_unstable();
        keys
    }
}

#[async_trait]
impl DetailClient for FakeDetails {
    async fn subject_detail(&self, key: ComparisonKey) -> ConnectorResult<SubjectDetail> {
        self.calls.lock().unwrap().push(key);
        match self.locations.get(&key) {
            Some(location) => Ok(SubjectDetail {
                key,
                subject_ref: format!("A{key:04}BC"),
                location: Some(location.clone()),
                active: true,
            }),
            None => Err(ConnectorError::not_found("subject", key.to_string())),
        }
    }
}
