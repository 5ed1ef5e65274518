//! Assembles filter, sort and view selection into a single query intent.

use std::fmt;

use serde::Deserialize;

use crate::compiler::{compile, compile_sort, CompiledComparator, CompiledPredicate};
use crate::error::QueryResult;
use crate::fields::FieldRegistry;
use crate::parser::{parse_sort, ParseLimits, Parser};
use crate::views::{Include, Projection, ViewDefinition, ViewRegistry};

/// Raw query arguments as received at the API boundary.
///
/// `None` means the argument was omitted. An omitted filter matches every
/// entity, while `Some("")` is rejected by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub view: Option<String>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }
}

/// Predicate, ordering and projection for one request, ready for persistence.
pub struct QueryIntent<'r, E> {
    predicate: CompiledPredicate<'r, E>,
    comparator: CompiledComparator<'r, E>,
    projection: Projection<'r, E>,
}

impl<'r, E> QueryIntent<'r, E> {
    pub fn new(
        predicate: CompiledPredicate<'r, E>,
        comparator: CompiledComparator<'r, E>,
        projection: Projection<'r, E>,
    ) -> Self {
        Self {
            predicate,
            comparator,
            projection,
        }
    }

    pub fn predicate(&self) -> &CompiledPredicate<'r, E> {
        &self.predicate
    }

    pub fn comparator(&self) -> &CompiledComparator<'r, E> {
        &self.comparator
    }

    pub fn projection(&self) -> &Projection<'r, E> {
        &self.projection
    }

    pub fn view(&self) -> &'r ViewDefinition {
        self.projection.view()
    }

    pub fn includes(&self) -> &'r [Include] {
        self.projection.view().includes()
    }

    pub fn matches(&self, entity: &E) -> bool {
        self.predicate.matches(entity)
    }

    pub fn compare(&self, a: &E, b: &E) -> std::cmp::Ordering {
        self.comparator.compare(a, b)
    }

    /// Filters and sorts an in-memory slice. The sort is stable.
    pub fn apply<'a>(&self, entities: &'a [E]) -> Vec<&'a E> {
        let mut selected: Vec<&E> = entities.iter().filter(|e| self.matches(e)).collect();
        selected.sort_by(|a, b| self.compare(a, b));
        selected
    }

    /// [`apply`](Self::apply), then shapes each entity through the view.
    pub fn project_all(&self, entities: &[E]) -> Vec<serde_json::Value> {
        self.apply(entities)
            .into_iter()
            .map(|e| self.projection.project(e))
            .collect()
    }
}

impl<E> fmt::Debug for QueryIntent<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryIntent")
            .field("predicate", &self.predicate)
            .field("comparator", &self.comparator)
            .field("view", &self.view().name())
            .field("projection", &self.projection)
            .finish()
    }
}

/// Builds query intents for one entity type from its process-wide registries.
pub struct QueryAssembler<'r, E, D> {
    fields: &'r FieldRegistry<E>,
    views: &'r ViewRegistry<E, D>,
    limits: ParseLimits,
}

impl<'r, E, D> QueryAssembler<'r, E, D> {
    pub fn new(fields: &'r FieldRegistry<E>, views: &'r ViewRegistry<E, D>) -> Self {
        Self {
            fields,
            views,
            limits: ParseLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Parses and resolves every part of `request`. Errors are reported for
    /// the filter first, then the sort, then the view.
    pub fn assemble(&self, request: &QueryRequest) -> QueryResult<QueryIntent<'r, E>> {
        let predicate = match request.filter.as_deref() {
            None => CompiledPredicate::match_all(),
            Some(filter) => {
                let ast = Parser::with_limits(filter, self.limits).parse()?;
                compile(&ast, self.fields)?
            }
        };

        let comparator = match request.sort.as_deref() {
            None => CompiledComparator::unordered(),
            Some(sort) => compile_sort(&parse_sort(sort)?, self.fields)?,
        };

        let projection = self.views.resolve(request.view.as_deref(), self.fields)?;

        tracing::debug!(
            view = %projection.view().name(),
            filtered = !predicate.is_match_all(),
            sorted = !comparator.is_unordered(),
            "query intent assembled"
        );

        Ok(QueryIntent::new(predicate, comparator, projection))
    }
}
