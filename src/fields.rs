//! Per-entity field registry.
//!
//! Every field a client may reference is registered once at startup with a
//! declared type, a capability set and an accessor closure. Lookups are
//! case-insensitive: keys are lowercased on insert and on lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::value::{Value, ValueType};

/// Reads one field from an entity.
pub type Accessor<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;

pub(crate) fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Filterable,
    Sortable,
    Projectable,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Filterable => "filterable",
            Capability::Sortable => "sortable",
            Capability::Projectable => "projectable",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Capability::Filterable => 0b001,
            Capability::Sortable => 0b010,
            Capability::Projectable => 0b100,
        }
    }
}

/// Set of [`Capability`] flags.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const ALL: Capabilities = Capabilities(0b111);

    pub fn with(self, capability: Capability) -> Self {
        Capabilities(self.0 | capability.bit())
    }

    pub fn without(self, capability: Capability) -> Self {
        Capabilities(self.0 & !capability.bit())
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Capabilities::NONE, Capabilities::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            Capability::Filterable,
            Capability::Sortable,
            Capability::Projectable,
        ]
        .into_iter()
        .filter(|c| self.contains(*c))
        .map(|c| c.name());
        f.debug_set().entries(names).finish()
    }
}

/// Type, capabilities and accessor for one registered field.
pub struct FieldDescriptor<E> {
    key: String,
    name: String,
    value_type: ValueType,
    capabilities: Capabilities,
    column: String,
    accessor: Accessor<E>,
}

impl<E> FieldDescriptor<E> {
    /// A field with every capability. The storage column defaults to `name`.
    pub fn new<F>(name: impl Into<String>, value_type: ValueType, accessor: F) -> Self
    where
        F: Fn(&E) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            key: normalize_key(&name),
            column: name.clone(),
            name,
            value_type,
            capabilities: Capabilities::ALL,
            accessor: Arc::new(accessor),
        }
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Normalized lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name as registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn column_name(&self) -> &str {
        &self.column
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn read(&self, entity: &E) -> Value {
        (self.accessor)(entity)
    }
}

impl<E> Clone for FieldDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            name: self.name.clone(),
            value_type: self.value_type,
            capabilities: self.capabilities,
            column: self.column.clone(),
            accessor: Arc::clone(&self.accessor),
        }
    }
}

impl<E> fmt::Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("key", &self.key)
            .field("value_type", &self.value_type)
            .field("capabilities", &self.capabilities)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Collects field descriptors during startup.
pub struct FieldRegistryBuilder<E> {
    fields: HashMap<String, FieldDescriptor<E>>,
}

impl<E> FieldRegistryBuilder<E> {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Registers a field with every capability.
    pub fn field<F>(self, name: &str, value_type: ValueType, accessor: F) -> Self
    where
        F: Fn(&E) -> Value + Send + Sync + 'static,
    {
        self.add(FieldDescriptor::new(name, value_type, accessor))
    }

    /// Registers a descriptor. A later registration under the same key replaces
    /// the earlier one.
    pub fn add(mut self, descriptor: FieldDescriptor<E>) -> Self {
        if let Some(previous) = self.fields.insert(descriptor.key.clone(), descriptor) {
            tracing::warn!(field = %previous.name, "field registered twice, keeping the last registration");
        }
        self
    }

    pub fn build(self) -> FieldRegistry<E> {
        tracing::debug!(fields = self.fields.len(), "field registry built");
        FieldRegistry {
            fields: self.fields,
        }
    }
}

impl<E> Default for FieldRegistryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable field table for entity type `E`.
pub struct FieldRegistry<E> {
    fields: HashMap<String, FieldDescriptor<E>>,
}

impl<E> FieldRegistry<E> {
    pub fn builder() -> FieldRegistryBuilder<E> {
        FieldRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<E>> {
        self.fields.get(&normalize_key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.fields.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up `field` and checks that it carries `capability`.
    pub fn resolve(&self, field: &str, capability: Capability) -> QueryResult<&FieldDescriptor<E>> {
        let descriptor = self.get(field).ok_or_else(|| QueryError::UnknownField {
            field: field.to_string(),
            available: self.keys(),
        })?;

        if !descriptor.has(capability) {
            return Err(QueryError::Capability {
                field: field.to_string(),
                required: capability.name(),
            });
        }

        Ok(descriptor)
    }
}

impl<E> fmt::Debug for FieldRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
