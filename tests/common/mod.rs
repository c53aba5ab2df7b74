#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docstore::backend::{
    BackendError, BatchGetRequest, BatchGetResponse, BatchWriteRequest, BatchWriteResponse,
    StorageBackend, TransactItem, TransactWriteRequest, WriteRequest,
};
use docstore::core::{Item, Key};

type WriteResult = Result<BatchWriteResponse, BackendError>;
type GetResult = Result<BatchGetResponse, BackendError>;
type TxResult = Result<(), BackendError>;

/// Backend double replaying scripted responses in order. When a script runs
/// out, the happy-path default is returned. Every request is captured for
/// assertions.
#[derive(Default)]
pub struct ScriptedBackend {
    write_script: Mutex<VecDeque<WriteResult>>,
    get_script: Mutex<VecDeque<GetResult>>,
    tx_script: Mutex<VecDeque<TxResult>>,
    pub write_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub tx_calls: AtomicUsize,
    pub write_requests: Mutex<Vec<BatchWriteRequest>>,
    pub get_requests: Mutex<Vec<BatchGetRequest>>,
    pub tx_requests: Mutex<Vec<TransactWriteRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_write(&self, result: WriteResult) {
        self.write_script.lock().unwrap().push_back(result);
    }

    pub fn script_get(&self, result: GetResult) {
        self.get_script.lock().unwrap().push_back(result);
    }

    pub fn script_tx(&self, result: TxResult) {
        self.tx_script.lock().unwrap().push_back(result);
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn tx_calls(&self) -> usize {
        self.tx_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for ScriptedBackend {
    async fn batch_write(
        &self,
        request: BatchWriteRequest,
    ) -> Result<BatchWriteResponse, BackendError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.write_requests.lock().unwrap().push(request);
        self.write_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(BatchWriteResponse::default()))
    }

    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetResponse, BackendError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.get_requests.lock().unwrap().push(request);
        self.get_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(BatchGetResponse::default()))
    }

    async fn transact_write(&self, request: TransactWriteRequest) -> Result<(), BackendError> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        self.tx_requests.lock().unwrap().push(request);
        self.tx_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(()))
    }
}

/// Minimal in-memory backend for round-trip coverage. Records are matched
/// by the requested key attributes; expressions are not evaluated.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Item>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(item: &Item, key: &Key) -> bool {
        !key.is_empty()
            && key
                .iter()
                .all(|(name, value)| item.get(name) == Some(value))
    }

    fn apply_put(rows: &mut Vec<Item>, item: Item) {
        // A put replaces any record sharing all of the new record's
        // attributes' key subset; without schema knowledge, replace records
        // the new item fully shadows.
        rows.retain(|existing| !existing.iter().all(|(k, v)| item.get(k) == Some(v)));
        rows.push(item);
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn batch_write(
        &self,
        request: BatchWriteRequest,
    ) -> Result<BatchWriteResponse, BackendError> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(request.table).or_default();
        for member in request.requests {
            match member {
                WriteRequest::Put(item) => Self::apply_put(rows, item),
                WriteRequest::Delete(key) => rows.retain(|item| !Self::matches(item, &key)),
            }
        }
        Ok(BatchWriteResponse::default())
    }

    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetResponse, BackendError> {
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(&request.table).cloned().unwrap_or_default();
        let items = request
            .keys
            .iter()
            .filter_map(|key| rows.iter().find(|item| Self::matches(item, key)).cloned())
            .collect();
        Ok(BatchGetResponse {
            items,
            unprocessed: Vec::new(),
        })
    }

    async fn transact_write(&self, request: TransactWriteRequest) -> Result<(), BackendError> {
        let mut tables = self.tables.lock().unwrap();
        for member in request.items {
            match member {
                TransactItem::Put { table, item, .. } => {
                    Self::apply_put(tables.entry(table).or_default(), item);
                }
                TransactItem::Delete { table, key, .. } => {
                    tables
                        .entry(table)
                        .or_default()
                        .retain(|item| !Self::matches(item, &key));
                }
                // Updates and condition checks are not modeled here;
                // coordinator tests for those run against ScriptedBackend.
                TransactItem::Update { .. } | TransactItem::ConditionCheck { .. } => {}
            }
        }
        Ok(())
    }
}
