//! Named views: allow-lists of projectable fields per entity/output shape.
//!
//! A view lists output-facing field names. Each name either is a field
//! registry key or is aliased to one, so an output name may read from a
//! differently named field (e.g. `permissionsSummary` reading `permissions`).
//! Field names are only checked against the registry when a view is resolved.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{QueryError, QueryResult};
use crate::fields::{normalize_key, Capability, FieldDescriptor, FieldRegistry};

/// Navigation hint handed to persistence, e.g. `roles.permissions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Include(pub String);

impl Include {
    pub fn path(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Include {
    fn from(path: &str) -> Self {
        Include(path.to_string())
    }
}

impl From<String> for Include {
    fn from(path: String) -> Self {
        Include(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    name: String,
    fields: Vec<String>,
    /// Normalized output name → field registry key
    aliases: HashMap<String, String>,
    includes: Vec<Include>,
}

impl ViewDefinition {
    /// Duplicate field names (ignoring case) keep their first position.
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut view = Self {
            name: name.into(),
            fields: Vec::new(),
            aliases: HashMap::new(),
            includes: Vec::new(),
        };
        for field in fields {
            view.push_field(field.into());
        }
        view
    }

    fn push_field(&mut self, field: String) {
        let key = normalize_key(&field);
        if !self.fields.iter().any(|f| normalize_key(f) == key) {
            self.fields.push(field);
        }
    }

    pub fn with_aliases<I, A, K>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (A, K)>,
        A: AsRef<str>,
        K: Into<String>,
    {
        for (dto, key) in aliases {
            self.aliases.insert(normalize_key(dto.as_ref()), key.into());
        }
        self
    }

    pub fn with_includes<I, H>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Include>,
    {
        self.includes.extend(includes.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    pub fn has_field(&self, dto_field: &str) -> bool {
        let key = normalize_key(dto_field);
        self.fields.iter().any(|f| normalize_key(f) == key)
    }

    /// Field registry key read for an output field: the alias target if one
    /// exists, otherwise the name itself.
    pub fn resolve_key<'s>(&'s self, dto_field: &'s str) -> &'s str {
        self.aliases
            .get(&normalize_key(dto_field))
            .map(String::as_str)
            .unwrap_or(dto_field)
    }

    /// Checks every field of the view against `registry` and binds it to its
    /// descriptor.
    pub fn resolve<'r, E>(&'r self, registry: &'r FieldRegistry<E>) -> QueryResult<Projection<'r, E>> {
        let columns = self
            .fields
            .iter()
            .map(|output| {
                let key = self.resolve_key(output);
                registry
                    .resolve(key, Capability::Projectable)
                    .map(|descriptor| ProjectedField {
                        output: output.as_str(),
                        descriptor,
                    })
            })
            .collect::<QueryResult<Vec<_>>>()?;

        tracing::trace!(view = %self.name, columns = columns.len(), "view resolved");
        Ok(Projection {
            view: self,
            columns,
        })
    }
}

/// One output column of a resolved view.
pub struct ProjectedField<'r, E> {
    pub output: &'r str,
    pub descriptor: &'r FieldDescriptor<E>,
}

/// A view whose fields have been bound to field descriptors.
pub struct Projection<'r, E> {
    view: &'r ViewDefinition,
    columns: Vec<ProjectedField<'r, E>>,
}

impl<'r, E> Projection<'r, E> {
    pub fn view(&self) -> &'r ViewDefinition {
        self.view
    }

    pub fn columns(&self) -> &[ProjectedField<'r, E>] {
        &self.columns
    }

    /// Shapes `entity` into a JSON object keyed by output name, in view order.
    pub fn project(&self, entity: &E) -> serde_json::Value {
        let object = self
            .columns
            .iter()
            .map(|c| (c.output.to_string(), c.descriptor.read(entity).to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }
}

impl<E> fmt::Debug for Projection<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.columns.iter().map(|c| (c.output, c.descriptor.key())))
            .finish()
    }
}

/// Views registered for entity `E` and output shape `D`.
pub struct ViewRegistry<E, D> {
    views: Vec<ViewDefinition>,
    /// Normalized view name → index into `views`
    index: HashMap<String, usize>,
    default: Option<usize>,
    _marker: PhantomData<fn() -> (E, D)>,
}

impl<E, D> ViewRegistry<E, D> {
    pub fn new() -> Self {
        Self {
            views: Vec::new(),
            index: HashMap::new(),
            default: None,
            _marker: PhantomData,
        }
    }

    /// Registers a view with plain fields.
    pub fn register<I, S>(&mut self, name: &str, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_definition(ViewDefinition::new(name, fields))
    }

    /// Registers a view. Re-registering a name replaces the earlier definition.
    pub fn register_definition(&mut self, definition: ViewDefinition) -> &mut Self {
        let key = normalize_key(definition.name());
        match self.index.get(&key) {
            Some(&slot) => {
                tracing::debug!(view = %definition.name(), "view re-registered");
                self.views[slot] = definition;
            }
            None => {
                self.index.insert(key, self.views.len());
                self.views.push(definition);
            }
        }
        self
    }

    /// Starts a fluent view definition; `build()` registers it.
    pub fn view(&mut self, name: &str) -> ViewBuilder<'_, E, D> {
        ViewBuilder {
            registry: self,
            name: name.to_string(),
            fields: Vec::new(),
            aliases: Vec::new(),
            includes: Vec::new(),
        }
    }

    pub fn set_default(&mut self, name: &str) -> QueryResult<&mut Self> {
        let slot = self.slot(name)?;
        self.default = Some(slot);
        Ok(self)
    }

    fn slot(&self, name: &str) -> QueryResult<usize> {
        self.index
            .get(&normalize_key(name))
            .copied()
            .ok_or_else(|| QueryError::UnknownView {
                name: name.to_string(),
                available: self.view_names(),
            })
    }

    /// Looks up a view by name; a missing or blank name selects the default.
    pub fn get_view(&self, name: Option<&str>) -> QueryResult<&ViewDefinition> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => self.default_view(),
            Some(name) => Ok(&self.views[self.slot(name)?]),
        }
    }

    pub fn default_view(&self) -> QueryResult<&ViewDefinition> {
        self.default
            .map(|slot| &self.views[slot])
            .ok_or(QueryError::NoDefaultView)
    }

    pub fn has_view(&self, name: &str) -> bool {
        self.index.contains_key(&normalize_key(name))
    }

    /// Registered view names in registration order.
    pub fn view_names(&self) -> Vec<String> {
        self.views.iter().map(|v| v.name().to_string()).collect()
    }

    /// Selects a view and binds it to `fields`.
    pub fn resolve<'r>(
        &'r self,
        name: Option<&str>,
        fields: &'r FieldRegistry<E>,
    ) -> QueryResult<Projection<'r, E>> {
        self.get_view(name)?.resolve(fields)
    }

    /// Resolves every registered view, so configuration mistakes surface at
    /// startup instead of on the first request that selects the view.
    pub fn validate(&self, fields: &FieldRegistry<E>) -> QueryResult<()> {
        for view in &self.views {
            view.resolve(fields)?;
        }
        Ok(())
    }
}

impl<E, D> Default for ViewRegistry<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, D> fmt::Debug for ViewRegistry<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("views", &self.view_names())
            .field("default", &self.default.map(|slot| self.views[slot].name()))
            .finish()
    }
}

/// Fluent builder over [`ViewRegistry::register_definition`].
pub struct ViewBuilder<'a, E, D> {
    registry: &'a mut ViewRegistry<E, D>,
    name: String,
    fields: Vec<String>,
    aliases: Vec<(String, String)>,
    includes: Vec<Include>,
}

impl<'a, E, D> ViewBuilder<'a, E, D> {
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Adds `dto_field` to the view, reading it from the registry field `key`.
    pub fn select_as(mut self, dto_field: &str, key: &str) -> Self {
        self.fields.push(dto_field.to_string());
        self.aliases.push((dto_field.to_string(), key.to_string()));
        self
    }

    pub fn include(mut self, hint: impl Into<Include>) -> Self {
        self.includes.push(hint.into());
        self
    }

    pub fn build(self) -> &'a mut ViewRegistry<E, D> {
        let definition = ViewDefinition::new(self.name, self.fields)
            .with_aliases(self.aliases)
            .with_includes(self.includes);
        self.registry.register_definition(definition)
    }
}
