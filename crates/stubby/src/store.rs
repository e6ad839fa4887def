//! Endpoint registry shared by the stub and admin servers.
//!
//! All state sits behind one `parking_lot::RwLock`. CRUD writes take the
//! write lock; lookups and the stub read path take the read lock. Response
//! cursors advance atomically under the read lock, and only a write (which
//! replaces or drops the endpoint) can reset them, so cycling never
//! interleaves with a replacement.

use crate::contract::{validate, ContractViolation, EndpointContract, EndpointRecord};
use crate::matcher::{first_match, RequestDescriptor, RequestMatcher};
use crate::selector::{select, ResponseCursor, Selection};
use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error("Endpoint {0} not found")]
    NotFound(String),
}

/// A response picked for a stub request, with the endpoint that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedResponse {
    pub endpoint_id: String,
    pub selection: Selection,
}

struct StoredEndpoint {
    record: EndpointRecord,
    matcher: RequestMatcher,
    cursor: ResponseCursor,
}

impl StoredEndpoint {
    fn new(record: EndpointRecord, matcher: RequestMatcher) -> Self {
        Self {
            record,
            matcher,
            cursor: ResponseCursor::new(),
        }
    }
}

#[derive(Default)]
struct Registry {
    /// Creation order; the matcher scans front to back.
    endpoints: Vec<StoredEndpoint>,
    /// Last id handed out. Never decreases, so ids are not reused.
    last_id: u64,
}

impl Registry {
    fn position(&self, id: &str) -> Option<usize> {
        self.endpoints.iter().position(|e| e.record.id == id)
    }

    fn insert(&mut self, contract: EndpointContract, matcher: RequestMatcher) -> String {
        self.last_id += 1;
        let id = self.last_id.to_string();
        let now = Utc::now();
        let record = EndpointRecord {
            id: id.clone(),
            request: contract.request,
            response: contract.response,
            created_at: now,
            last_modified: now,
        };
        self.endpoints.push(StoredEndpoint::new(record, matcher));
        id
    }
}

/// Concurrency-safe registry of endpoint records.
#[derive(Default)]
pub struct EndpointStore {
    registry: RwLock<Registry>,
}

impl EndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert a new endpoint, returning its id.
    pub fn create(&self, contract: EndpointContract) -> Result<String, StoreError> {
        let matcher = compile(&contract)?;
        let url = contract.request.url.clone();
        let id = self.registry.write().insert(contract, matcher);
        info!(id = %id, url = %url, "Endpoint created");
        Ok(id)
    }

    /// Replace the endpoint `id` wholesale, returning the stored record.
    ///
    /// Validation runs first, so a rejected candidate never touches the
    /// existing record. The id and creation time survive; the cursor restarts.
    pub fn update(
        &self,
        id: &str,
        contract: EndpointContract,
    ) -> Result<EndpointRecord, StoreError> {
        let matcher = compile(&contract)?;

        let mut registry = self.registry.write();
        let index = registry
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let created_at = registry.endpoints[index].record.created_at;
        let record = EndpointRecord {
            id: id.to_string(),
            request: contract.request,
            response: contract.response,
            created_at,
            last_modified: Utc::now(),
        };
        registry.endpoints[index] = StoredEndpoint::new(record.clone(), matcher);
        drop(registry);

        info!(id = %id, "Endpoint replaced");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<EndpointRecord, StoreError> {
        let registry = self.registry.read();
        registry
            .position(id)
            .map(|index| registry.endpoints[index].record.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Snapshot of every record in creation order.
    pub fn get_all(&self) -> Vec<EndpointRecord> {
        let registry = self.registry.read();
        registry.endpoints.iter().map(|e| e.record.clone()).collect()
    }

    /// Remove the endpoint `id`, returning the record it held.
    pub fn delete(&self, id: &str) -> Result<EndpointRecord, StoreError> {
        let removed = {
            let mut registry = self.registry.write();
            let index = registry
                .position(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            registry.endpoints.remove(index)
        };
        info!(id = %id, "Endpoint deleted");
        Ok(removed.record)
    }

    /// Remove every endpoint. Ids handed out so far stay retired.
    pub fn delete_all(&self) {
        let removed = {
            let mut registry = self.registry.write();
            std::mem::take(&mut registry.endpoints).len()
        };
        info!(count = removed, "All endpoints deleted");
    }

    /// Insert a batch of endpoints in order.
    ///
    /// Every contract is validated before any is inserted; one bad entry
    /// rejects the whole batch and leaves the registry unchanged.
    pub fn seed(&self, contracts: Vec<EndpointContract>) -> Result<Vec<String>, StoreError> {
        let compiled = contracts
            .into_iter()
            .map(|contract| compile(&contract).map(|matcher| (contract, matcher)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut registry = self.registry.write();
        let ids: Vec<String> = compiled
            .into_iter()
            .map(|(contract, matcher)| registry.insert(contract, matcher))
            .collect();
        info!(count = ids.len(), "Endpoints loaded");
        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.registry.read().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First endpoint matching `request`, without side effects.
    pub fn find_match(&self, request: &RequestDescriptor) -> Option<EndpointRecord> {
        let registry = self.registry.read();
        let index = first_match(request, registry.endpoints.iter().map(|e| &e.matcher))?;
        Some(registry.endpoints[index].record.clone())
    }

    /// Match `request` and pick the response to send, advancing the matched
    /// endpoint's cursor.
    ///
    /// The lock is released on return; callers apply the delay afterwards.
    pub fn serve(&self, request: &RequestDescriptor) -> Option<ServedResponse> {
        let registry = self.registry.read();
        let Some(index) = first_match(request, registry.endpoints.iter().map(|e| &e.matcher))
        else {
            debug!(method = %request.method, path = %request.path, "No endpoint matched");
            return None;
        };

        let endpoint = &registry.endpoints[index];
        let selection = select(&endpoint.record.response, &endpoint.cursor)?;
        debug!(
            id = %endpoint.record.id,
            status = selection.response.status,
            "Endpoint matched"
        );
        Some(ServedResponse {
            endpoint_id: endpoint.record.id.clone(),
            selection,
        })
    }
}

fn compile(contract: &EndpointContract) -> Result<RequestMatcher, ContractViolation> {
    validate(contract)?;
    RequestMatcher::compile(&contract.request).map_err(|_| ContractViolation)
}
