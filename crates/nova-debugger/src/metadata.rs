use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use nova_jdwp::{
    ClassInfo, FieldInfo, JdwpClient, JdwpError, MethodId, MethodInfo, ReferenceTypeId,
};
use parking_lot::RwLock;

/// What the engine knows about one loaded type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeMetadata {
    pub info: ClassInfo,
    pub name: String,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    /// Cache generation that produced this entry.
    pub generation: u64,
}

impl TypeMetadata {
    pub fn type_id(&self) -> ReferenceTypeId {
        self.info.type_id
    }

    pub fn method(&self, method_id: MethodId) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.method_id == method_id)
    }
}

#[derive(Default)]
struct Types {
    by_name: HashMap<String, TypeMetadata>,
    names: HashMap<ReferenceTypeId, String>,
}

impl Types {
    fn insert(&mut self, meta: TypeMetadata) {
        if let Some(previous) = self.names.insert(meta.type_id(), meta.name.clone()) {
            if previous != meta.name {
                self.by_name.remove(&previous);
            }
        }
        // A reloaded class gets a new type id; drop the stale one.
        if let Some(stale) = self.by_name.insert(meta.name.clone(), meta) {
            let current = self.by_name.get(&stale.name).map(TypeMetadata::type_id);
            if current != Some(stale.type_id()) {
                self.names.remove(&stale.type_id());
            }
        }
    }
}

/// Type metadata keyed by binary class name.
///
/// Every refresh bumps the cache generation, so entries can be compared for
/// staleness.
#[derive(Default)]
pub struct TypeMetadataCache {
    types: RwLock<Types>,
    generation: AtomicU64,
}

impl TypeMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(
        client: &dyn JdwpClient,
        info: ClassInfo,
        generation: u64,
    ) -> Result<TypeMetadata, JdwpError> {
        let methods = client.methods(info.type_id)?;
        let fields = client.fields(info.type_id)?;
        Ok(TypeMetadata {
            name: info.name(),
            info,
            methods,
            fields,
            generation,
        })
    }

    /// Replace the whole cache with the classes currently loaded in the VM.
    ///
    /// Types that fail to load are skipped. Returns the number of cached types.
    pub fn refresh_all(&self, client: &dyn JdwpClient) -> Result<usize, JdwpError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut fresh = Types::default();
        for info in client.all_classes()? {
            let type_id = info.type_id;
            match Self::load(client, info, generation) {
                Ok(meta) => fresh.insert(meta),
                Err(err) if err.is_disconnect() => return Err(err),
                Err(err) => {
                    tracing::debug!(target = "nova.debugger", type_id, error = %err, "skipping type metadata");
                }
            }
        }
        let count = fresh.by_name.len();
        *self.types.write() = fresh;
        tracing::debug!(target = "nova.debugger", generation, types = count, "type metadata refreshed");
        Ok(count)
    }

    pub fn refresh_type(
        &self,
        client: &dyn JdwpClient,
        type_id: ReferenceTypeId,
    ) -> Result<TypeMetadata, JdwpError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let meta = Self::load(client, client.class_info(type_id)?, generation)?;
        tracing::trace!(target = "nova.debugger", generation, class = %meta.name, "type metadata updated");
        self.types.write().insert(meta.clone());
        Ok(meta)
    }

    pub fn remove(&self, name: &str) -> Option<TypeMetadata> {
        let mut types = self.types.write();
        let meta = types.by_name.remove(name)?;
        types.names.remove(&meta.type_id());
        Some(meta)
    }

    pub fn get(&self, name: &str) -> Option<TypeMetadata> {
        self.types.read().by_name.get(name).cloned()
    }

    pub fn get_by_id(&self, type_id: ReferenceTypeId) -> Option<TypeMetadata> {
        let types = self.types.read();
        let name = types.names.get(&type_id)?;
        types.by_name.get(name).cloned()
    }

    pub fn by_source_file(&self, source_file: &str) -> Vec<TypeMetadata> {
        let mut found: Vec<TypeMetadata> = self
            .types
            .read()
            .by_name
            .values()
            .filter(|meta| meta.info.source_file.as_deref() == Some(source_file))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    pub fn method_name(&self, type_id: ReferenceTypeId, method_id: MethodId) -> Option<String> {
        let types = self.types.read();
        let name = types.names.get(&type_id)?;
        types
            .by_name
            .get(name)?
            .method(method_id)
            .map(|m| m.name.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
