use std::collections::HashMap;
use std::sync::Arc;

use nova_jdwp::{ClassInfo, EventModifier, JdwpClient, RequestHandle, SuspendPolicy};
use parking_lot::{Mutex, RwLock};

use super::{RequestArgs, RequestId, RequestOptions};
use crate::error::{DebuggerError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryDefaults {
    pub suspend_policy: SuspendPolicy,
    pub pending_enabled: bool,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            suspend_policy: SuspendPolicy::EventThread,
            pending_enabled: true,
        }
    }
}

#[derive(Debug)]
struct Record<K> {
    key: Option<K>,
    options: RequestOptions,
    /// Empty while the request is pending.
    handles: Vec<RequestHandle>,
}

#[derive(Debug)]
struct Maps<K> {
    by_key: HashMap<K, RequestId>,
    by_id: HashMap<RequestId, Record<K>>,
    by_handle: HashMap<i32, RequestId>,
}

impl<K> Default for Maps<K> {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            by_id: HashMap::new(),
            by_handle: HashMap::new(),
        }
    }
}

impl<K: RequestArgs> Maps<K> {
    fn insert(&mut self, id: RequestId, record: Record<K>) {
        if let Some(key) = &record.key {
            self.by_key.insert(key.clone(), id);
        }
        for handle in &record.handles {
            self.by_handle.insert(handle.request_id, id);
        }
        self.by_id.insert(id, record);
    }

    fn take(&mut self, id: &RequestId) -> Option<Record<K>> {
        let record = self.by_id.remove(id)?;
        if let Some(key) = &record.key {
            self.by_key.remove(key);
        }
        for handle in &record.handles {
            self.by_handle.remove(&handle.request_id);
        }
        Some(record)
    }
}

/// Concurrent store of the requests of one kind.
///
/// `key -> id`, `id -> record` and `physical request id -> id` live behind a
/// single lock so readers never observe them out of sync. Mutations that talk
/// to the VM are serialized per registry, which is what makes creation
/// idempotent under concurrent callers.
pub struct RequestRegistry<K: RequestArgs> {
    client: Arc<dyn JdwpClient>,
    defaults: RegistryDefaults,
    maps: RwLock<Maps<K>>,
    mutation: Mutex<()>,
}

impl<K: RequestArgs> RequestRegistry<K> {
    pub fn new(client: Arc<dyn JdwpClient>, defaults: RegistryDefaults) -> Self {
        Self {
            client,
            defaults,
            maps: RwLock::new(Maps::default()),
            mutation: Mutex::new(()),
        }
    }

    /// Install a request for `key` under a fresh id.
    ///
    /// Creating a key that is already registered returns the existing id
    /// without touching the VM.
    pub fn create(&self, key: K, options: RequestOptions) -> Result<RequestId> {
        self.create_with_id(RequestId::new(), key, options)
    }

    pub fn create_with_id(
        &self,
        id: RequestId,
        key: K,
        options: RequestOptions,
    ) -> Result<RequestId> {
        let _guard = self.mutation.lock();

        let existing = self.maps.read().by_key.get(&key).copied();
        if let Some(existing) = existing {
            if self.is_pending(&existing) {
                return Err(self.unresolved(&key, Some(existing)));
            }
            return Ok(existing);
        }
        if self.has_id(&id) {
            return Err(DebuggerError::InvalidState {
                expected: "an unused request id",
                actual: "an id registered for another key",
            });
        }

        let targets = key.targets(self.client.as_ref())?;
        if targets.is_empty() {
            if !(K::PENDING_CAPABLE && self.defaults.pending_enabled) {
                return Err(self.unresolved(&key, None));
            }
            tracing::debug!(target = "nova.debugger", kind = %K::KIND, request = %id, key = ?key, "request pending until a matching class is prepared");
            self.maps.write().insert(
                id,
                Record {
                    key: Some(key.clone()),
                    options,
                    handles: Vec::new(),
                },
            );
            return Err(self.unresolved(&key, Some(id)));
        }

        let handles = self.install(&targets, &options)?;
        tracing::debug!(target = "nova.debugger", kind = %K::KIND, request = %id, key = ?key, handles = handles.len(), "request installed");
        self.maps.write().insert(
            id,
            Record {
                key: Some(key),
                options,
                handles,
            },
        );
        Ok(id)
    }

    /// Install raw modifiers under `id` without a key.
    ///
    /// Used for requests created from persisted state where only the id is
    /// known. Such requests can only be looked up and removed by id.
    pub fn create_unkeyed(&self, id: RequestId, options: RequestOptions) -> Result<RequestId> {
        let _guard = self.mutation.lock();
        if self.maps.read().by_id.contains_key(&id) {
            return Ok(id);
        }
        let handles = self.install(&[Vec::new()], &options)?;
        self.maps.write().insert(
            id,
            Record {
                key: None,
                options,
                handles,
            },
        );
        Ok(id)
    }

    fn unresolved(&self, key: &K, pending: Option<RequestId>) -> DebuggerError {
        DebuggerError::NoResolvableTarget {
            target: format!("{} {key:?}", K::KIND),
            pending,
        }
    }

    /// Install every target or none of them.
    fn install(
        &self,
        targets: &[Vec<EventModifier>],
        options: &RequestOptions,
    ) -> Result<Vec<RequestHandle>> {
        let suspend_policy = options
            .suspend_policy
            .unwrap_or(self.defaults.suspend_policy);
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let mut modifiers = target.clone();
            modifiers.extend(options.modifiers.iter().cloned());
            match self
                .client
                .event_request_set(K::KIND, suspend_policy, modifiers)
            {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::debug!(target = "nova.debugger", kind = %K::KIND, installed = handles.len(), error = %err, "rolling back partial request install");
                    self.uninstall(&handles);
                    return Err(err.into());
                }
            }
        }
        Ok(handles)
    }

    fn uninstall(&self, handles: &[RequestHandle]) {
        for handle in handles {
            if let Err(err) = self.client.event_request_clear(*handle) {
                tracing::warn!(target = "nova.debugger", handle = %handle, error = %err, "failed to clear event request");
            }
        }
    }

    pub fn has(&self, key: &K) -> bool {
        self.maps.read().by_key.contains_key(key)
    }

    pub fn has_id(&self, id: &RequestId) -> bool {
        self.maps.read().by_id.contains_key(id)
    }

    /// Physical handles of the request for `key`; empty while pending.
    pub fn get(&self, key: &K) -> Option<Vec<RequestHandle>> {
        let maps = self.maps.read();
        let id = maps.by_key.get(key)?;
        maps.by_id.get(id).map(|record| record.handles.clone())
    }

    pub fn get_by_id(&self, id: &RequestId) -> Option<Vec<RequestHandle>> {
        self.maps
            .read()
            .by_id
            .get(id)
            .map(|record| record.handles.clone())
    }

    pub fn id_of(&self, key: &K) -> Option<RequestId> {
        self.maps.read().by_key.get(key).copied()
    }

    pub fn key_of(&self, id: &RequestId) -> Option<K> {
        self.maps.read().by_id.get(id)?.key.clone()
    }

    pub fn options(&self, id: &RequestId) -> Option<RequestOptions> {
        self.maps
            .read()
            .by_id
            .get(id)
            .map(|record| record.options.clone())
    }

    /// Logical request that owns the physical request `request_id`.
    pub fn id_for_handle(&self, request_id: i32) -> Option<RequestId> {
        self.maps.read().by_handle.get(&request_id).copied()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.maps
            .read()
            .by_id
            .get(id)
            .is_some_and(|record| record.handles.is_empty() && record.key.is_some())
    }

    pub fn remove(&self, key: &K) -> bool {
        let _guard = self.mutation.lock();
        let Some(id) = self.maps.read().by_key.get(key).copied() else {
            return false;
        };
        self.remove_locked(&id)
    }

    pub fn remove_by_id(&self, id: &RequestId) -> bool {
        let _guard = self.mutation.lock();
        self.remove_locked(id)
    }

    fn remove_locked(&self, id: &RequestId) -> bool {
        let handles = match self.maps.read().by_id.get(id) {
            Some(record) => record.handles.clone(),
            None => return false,
        };
        self.uninstall(&handles);
        let removed = self.maps.write().take(id).is_some();
        if removed {
            tracing::debug!(target = "nova.debugger", kind = %K::KIND, request = %id, handles = handles.len(), "request removed");
        }
        removed
    }

    /// Keys of every registered request, pending ones included.
    pub fn list(&self) -> Vec<K> {
        self.maps.read().by_key.keys().cloned().collect()
    }

    pub fn list_ids(&self) -> Vec<RequestId> {
        self.maps.read().by_id.keys().copied().collect()
    }

    pub fn list_pending(&self) -> Vec<(RequestId, K)> {
        self.maps
            .read()
            .by_id
            .iter()
            .filter(|(_, record)| record.handles.is_empty())
            .filter_map(|(id, record)| Some((*id, record.key.clone()?)))
            .collect()
    }

    /// Try to install every pending request that `class` could satisfy.
    ///
    /// Returns the ids that are now live.
    pub fn retry_pending(&self, class: &ClassInfo) -> Vec<RequestId> {
        if !K::PENDING_CAPABLE {
            return Vec::new();
        }
        let _guard = self.mutation.lock();
        let candidates: Vec<(RequestId, K, RequestOptions)> = self
            .maps
            .read()
            .by_id
            .iter()
            .filter(|(_, record)| record.handles.is_empty())
            .filter_map(|(id, record)| {
                let key = record.key.as_ref()?;
                key.may_resolve_in(class)
                    .then(|| (*id, key.clone(), record.options.clone()))
            })
            .collect();

        let mut installed = Vec::new();
        for (id, key, options) in candidates {
            let targets = match key.targets(self.client.as_ref()) {
                Ok(targets) if !targets.is_empty() => targets,
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(target = "nova.debugger", kind = %K::KIND, request = %id, error = %err, "failed to resolve pending request");
                    continue;
                }
            };
            match self.install(&targets, &options) {
                Ok(handles) => {
                    tracing::debug!(target = "nova.debugger", kind = %K::KIND, request = %id, class = %class.name(), handles = handles.len(), "pending request installed");
                    let mut maps = self.maps.write();
                    maps.take(&id);
                    maps.insert(
                        id,
                        Record {
                            key: Some(key),
                            options,
                            handles,
                        },
                    );
                    installed.push(id);
                }
                Err(err) => {
                    tracing::warn!(target = "nova.debugger", kind = %K::KIND, request = %id, error = %err, "failed to install pending request");
                }
            }
        }
        installed
    }

    pub fn len(&self) -> usize {
        self.maps.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
