//! Resolves filter trees and sort specs against a field registry.
//!
//! Compilation either returns a fully resolved predicate/comparator or the
//! first error met in a depth-first, left-to-right walk. Resolved trees borrow
//! descriptors from the registry, which outlives the request.

use std::cmp::Ordering;
use std::fmt;

use crate::ast::{CompOp, FilterNode, LogicalOp, Operand, SortDirection, SortSpec};
use crate::error::{QueryError, QueryResult};
use crate::fields::{Capability, FieldDescriptor, FieldRegistry};
use crate::value::{Value, ValueType};

/// Comparison right-hand side after coercion to the field's type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    Single(Value),
    List(Vec<Value>),
}

pub(crate) enum Node<'r, E> {
    /// No filter was supplied.
    Always,
    Compare {
        field: &'r FieldDescriptor<E>,
        op: CompOp,
        operand: Resolved,
    },
    And(Box<Node<'r, E>>, Box<Node<'r, E>>),
    Or(Box<Node<'r, E>>, Box<Node<'r, E>>),
    Not(Box<Node<'r, E>>),
}

impl<E> Node<'_, E> {
    fn eval(&self, entity: &E) -> bool {
        match self {
            Node::Always => true,
            Node::Compare { field, op, operand } => apply(*op, &field.read(entity), operand),
            Node::And(left, right) => left.eval(entity) && right.eval(entity),
            Node::Or(left, right) => left.eval(entity) || right.eval(entity),
            Node::Not(child) => !child.eval(entity),
        }
    }
}

fn apply(op: CompOp, actual: &Value, operand: &Resolved) -> bool {
    let expected = match operand {
        Resolved::Single(value) => value,
        Resolved::List(values) => {
            return values
                .iter()
                .any(|v| actual.compare(v) == Some(Ordering::Equal))
        }
    };

    let ordering = actual.compare(expected);
    match op {
        CompOp::Eq | CompOp::In => ordering == Some(Ordering::Equal),
        CompOp::NotEq => ordering != Some(Ordering::Equal),
        CompOp::Gt => ordering == Some(Ordering::Greater),
        CompOp::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CompOp::Lt => ordering == Some(Ordering::Less),
        CompOp::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompOp::Contains | CompOp::StartsWith | CompOp::EndsWith => {
            match (actual.as_str(), expected.as_str()) {
                (Some(haystack), Some(needle)) => match op {
                    CompOp::Contains => haystack.contains(needle),
                    CompOp::StartsWith => haystack.starts_with(needle),
                    _ => haystack.ends_with(needle),
                },
                _ => false,
            }
        }
    }
}

/// An executable filter over entities of type `E`.
pub struct CompiledPredicate<'r, E> {
    root: Node<'r, E>,
}

impl<'r, E> CompiledPredicate<'r, E> {
    /// Predicate used when no filter was supplied.
    pub fn match_all() -> Self {
        Self { root: Node::Always }
    }

    pub fn matches(&self, entity: &E) -> bool {
        self.root.eval(entity)
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self.root, Node::Always)
    }

    pub(crate) fn root(&self) -> &Node<'r, E> {
        &self.root
    }
}

impl<E> fmt::Debug for CompiledPredicate<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPredicate")
            .field("match_all", &self.is_match_all())
            .finish_non_exhaustive()
    }
}

/// Resolves `node` against `registry` into an executable predicate.
pub fn compile<'r, E>(
    node: &FilterNode,
    registry: &'r FieldRegistry<E>,
) -> QueryResult<CompiledPredicate<'r, E>> {
    let root = compile_node(node, registry)?;
    tracing::debug!("filter compiled");
    Ok(CompiledPredicate { root })
}

fn compile_node<'r, E>(node: &FilterNode, registry: &'r FieldRegistry<E>) -> QueryResult<Node<'r, E>> {
    match node {
        FilterNode::Comparison { field, op, value } => {
            let descriptor = registry.resolve(field.as_str(), Capability::Filterable)?;
            let operand = resolve_operand(field.as_str(), descriptor.value_type(), *op, value)?;
            tracing::trace!(field = %descriptor.key(), op = op.as_str(), "comparison resolved");
            Ok(Node::Compare {
                field: descriptor,
                op: *op,
                operand,
            })
        }
        FilterNode::Logical { op, left, right } => {
            let left = Box::new(compile_node(left, registry)?);
            let right = Box::new(compile_node(right, registry)?);
            Ok(match op {
                LogicalOp::And => Node::And(left, right),
                LogicalOp::Or => Node::Or(left, right),
            })
        }
        FilterNode::Not { child } => Ok(Node::Not(Box::new(compile_node(child, registry)?))),
    }
}

fn resolve_operand(field: &str, value_type: ValueType, op: CompOp, value: &Operand) -> QueryResult<Resolved> {
    if op.is_text_match() && value_type != ValueType::String {
        return Err(QueryError::type_mismatch(
            field,
            format!("string field for '{}'", op.as_str()),
            format!("{} field", value_type.name()),
        ));
    }
    if op.is_ordering() && !value_type.is_ordered() {
        return Err(QueryError::type_mismatch(
            field,
            format!("string, number or date field for '{}'", op.as_str()),
            format!("{} field", value_type.name()),
        ));
    }

    match (op, value) {
        (CompOp::In, Operand::List(items)) => items
            .iter()
            .map(|item| value_type.coerce(field, item))
            .collect::<QueryResult<Vec<_>>>()
            .map(Resolved::List),
        (CompOp::In, Operand::Single(literal)) => {
            Err(QueryError::type_mismatch(field, "list", literal.describe()))
        }
        (_, Operand::List(_)) => Err(QueryError::type_mismatch(field, value_type, "list")),
        (_, Operand::Single(literal)) => {
            let coerced = value_type.coerce(field, literal)?;
            if coerced.is_null() && !matches!(op, CompOp::Eq | CompOp::NotEq) {
                return Err(QueryError::type_mismatch(field, value_type, "null"));
            }
            Ok(Resolved::Single(coerced))
        }
    }
}

/// Multi-key ordering over entities of type `E`.
pub struct CompiledComparator<'r, E> {
    keys: Vec<(&'r FieldDescriptor<E>, SortDirection)>,
}

impl<'r, E> CompiledComparator<'r, E> {
    /// Comparator that treats every pair as equal.
    pub fn unordered() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn is_unordered(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &E, b: &E) -> Ordering {
        for (field, direction) in &self.keys {
            let ordering = field.read(a).sort_cmp(&field.read(b));
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    pub(crate) fn keys(&self) -> &[(&'r FieldDescriptor<E>, SortDirection)] {
        &self.keys
    }
}

impl<E> fmt::Debug for CompiledComparator<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.keys.iter().map(|(field, direction)| (field.key(), direction)))
            .finish()
    }
}

/// Resolves sort specs into a comparator. A field listed more than once keeps
/// the direction of its first occurrence; later entries are dropped.
pub fn compile_sort<'r, E>(
    specs: &[SortSpec],
    registry: &'r FieldRegistry<E>,
) -> QueryResult<CompiledComparator<'r, E>> {
    let mut keys: Vec<(&'r FieldDescriptor<E>, SortDirection)> = Vec::with_capacity(specs.len());

    for spec in specs {
        let descriptor = registry.resolve(spec.field.as_str(), Capability::Sortable)?;
        if keys.iter().any(|(seen, _)| seen.key() == descriptor.key()) {
            tracing::debug!(field = %spec.field, "duplicate sort field ignored");
            continue;
        }
        keys.push((descriptor, spec.direction));
    }

    Ok(CompiledComparator { keys })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::parser::{parse, parse_sort};
    use crate::testing::{user, user_fields, users, User, STATUSES};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn compile_str<'r>(filter: &str, fields: &'r FieldRegistry<User>) -> QueryResult<CompiledPredicate<'r, User>> {
        compile(&parse(filter).unwrap(), fields)
    }

    fn matching_ids(filter: &str) -> Vec<u32> {
        let fields = user_fields();
        let predicate = compile_str(filter, &fields).unwrap();
        users()
            .iter()
            .filter(|u| predicate.matches(u))
            .map(|u| u.id)
            .collect()
    }

    fn small_registry() -> FieldRegistry<User> {
        FieldRegistry::builder()
            .field("name", ValueType::String, |u: &User| Value::from(u.name.clone()))
            .field("age", ValueType::Number, |u: &User| Value::from(u.age))
            .field("status", ValueType::String, |u: &User| Value::from(u.status))
            .build()
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(matching_ids("age = 34"), vec![1, 3]);
        assert_eq!(matching_ids("age != 34"), vec![2, 4]);
        assert_eq!(matching_ids("age > 34"), vec![4]);
        assert_eq!(matching_ids("age >= 34"), vec![1, 3, 4]);
        assert_eq!(matching_ids("age < 34"), vec![2]);
        assert_eq!(matching_ids("age <= 17"), vec![2]);
        assert_eq!(matching_ids("id in (2, 4, 9)"), vec![2, 4]);
    }

    #[test]
    fn test_text_operators() {
        assert_eq!(matching_ids("name contains 'a'"), vec![3, 4]);
        assert_eq!(matching_ids("name startswith 'A'"), vec![1]);
        assert_eq!(matching_ids("email endswith '@example.com'"), vec![1, 2, 3]);
    }

    #[test]
    fn test_field_names_are_case_insensitive() {
        assert_eq!(matching_ids("NAME = 'bob'"), vec![2]);
        assert_eq!(matching_ids("Name = 'bob' or name = 'Dave'"), vec![2, 4]);
    }

    fn ids_with(registry: &FieldRegistry<User>, filter: &str) -> Vec<u32> {
        let predicate = compile_str(filter, registry).unwrap();
        users()
            .iter()
            .filter(|u| predicate.matches(u))
            .map(|u| u.id)
            .collect()
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        let registry = FieldRegistry::builder()
            .field("balance", ValueType::Number, |u: &User| Value::from(u.age as f64 - 34.0))
            .build();

        assert_eq!(ids_with(&registry, "balance = 0"), vec![1, 3]);
        assert_eq!(ids_with(&registry, "balance = -0"), vec![1, 3]);
        assert_eq!(ids_with(&registry, "balance <= -0"), vec![1, 2, 3]);
        assert_eq!(ids_with(&registry, "balance > -0"), vec![4]);
        assert_eq!(ids_with(&registry, "balance in (-0)"), vec![1, 3]);
    }

    #[test]
    fn test_enum_field_read_as_string() {
        let registry = FieldRegistry::builder()
            .field("status", ValueType::Enum(STATUSES), |u: &User| Value::from(u.status))
            .build();

        assert_eq!(ids_with(&registry, "status = 'ACTIVE'"), vec![1, 4]);
        assert_eq!(ids_with(&registry, "status in ('pending', 'disabled')"), vec![2, 3]);
        assert_eq!(ids_with(&registry, "status != 'active'"), vec![2, 3]);
    }

    #[test]
    fn test_boolean_logic() {
        assert_eq!(matching_ids("age >= 18 and (status = 'active' or status = 'pending')"), vec![1, 4]);
        assert_eq!(matching_ids("not active = true"), vec![2, 3]);
        assert_eq!(matching_ids("not (age > 30 and not name = 'Carol')"), vec![2, 3]);
    }

    #[test]
    fn test_typed_literals() {
        assert_eq!(matching_ids("status = 'ACTIVE'"), vec![1, 4]);
        assert_eq!(matching_ids("active = 'false'"), vec![2, 3]);
        assert_eq!(matching_ids("age = '17'"), vec![2]);
        assert_eq!(matching_ids("createdAt >= '2024-01-03'"), vec![3, 4]);
        assert_eq!(matching_ids("createdAt < '2024-01-02T00:00:00Z'"), vec![1]);
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(matching_ids("email = null"), vec![4]);
        assert_eq!(matching_ids("email != null"), vec![1, 2, 3]);
        assert_eq!(matching_ids("email contains 'example'"), vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_field_lists_sorted_keys() {
        let fields = small_registry();
        let err = compile_str("unknownField=5", &fields).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                field: "unknownField".to_string(),
                available: vec!["age".to_string(), "name".to_string(), "status".to_string()],
            }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let fields = small_registry();
        let err = compile_str("age='old'", &fields).unwrap_err();
        assert_eq!(
            err,
            QueryError::TypeMismatch {
                field: "age".to_string(),
                expected: "number".to_string(),
                got: "string 'old'".to_string(),
            }
        );
        assert!(matches!(
            compile_str("name = 5", &fields),
            Err(QueryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_operator_type_rules() {
        let fields = user_fields();
        for filter in [
            "age contains '3'",
            "active > false",
            "status < 'active'",
            "age > null",
            "status = 'archived'",
            "createdAt = 'last week'",
        ] {
            let err = compile_str(filter, &fields).unwrap_err();
            assert_eq!(err.kind(), "type_mismatch", "filter {:?}", filter);
        }
    }

    #[test]
    fn test_in_requires_list() {
        let fields = user_fields();
        let node = FilterNode::comparison("id", CompOp::In, Literal::Number(1.0));
        assert_eq!(
            compile(&node, &fields).unwrap_err(),
            QueryError::TypeMismatch {
                field: "id".to_string(),
                expected: "list".to_string(),
                got: "number 1".to_string(),
            }
        );

        let node = FilterNode::comparison("id", CompOp::Eq, vec![Literal::Number(1.0)]);
        assert!(compile(&node, &fields).is_err());
    }

    #[test]
    fn test_capability_required() {
        let fields = user_fields();
        assert_eq!(
            compile_str("permissions = 'read'", &fields).unwrap_err(),
            QueryError::Capability {
                field: "permissions".to_string(),
                required: "filterable",
            }
        );
    }

    #[test]
    fn test_first_error_wins() {
        let fields = user_fields();
        let err = compile_str("(age = 'x' or nope = 1) and other = 2", &fields).unwrap_err();
        assert_eq!(err.kind(), "type_mismatch");
        let again = compile_str("(age = 'x' or nope = 1) and other = 2", &fields).unwrap_err();
        assert_eq!(err, again);

        let err = compile_str("not nope = 1 and age = 'x'", &fields).unwrap_err();
        assert_eq!(err.kind(), "unknown_field");
    }

    #[test]
    fn test_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fields = FieldRegistry::<User>::builder()
            .field("age", ValueType::Number, |u: &User| Value::from(u.age))
            .field("costly", ValueType::Number, move |_: &User| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Value::from(1)
            })
            .build();

        let entity = user(1, "Alice", 34, "active");
        let and = compile_str("age < 0 and costly = 1", &fields).unwrap();
        assert!(!and.matches(&entity));
        let or = compile_str("age > 0 or costly = 1", &fields).unwrap();
        assert!(or.matches(&entity));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);

        let both = compile_str("age > 0 and costly = 1", &fields).unwrap();
        assert!(both.matches(&entity));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_compile_is_repeatable() {
        let fields = user_fields();
        let ast = parse("age >= 18 and name != 'Dave'").unwrap();
        let first = compile(&ast, &fields).unwrap();
        let second = compile(&ast, &fields).unwrap();
        for u in users() {
            assert_eq!(first.matches(&u), second.matches(&u));
        }
        assert!(CompiledPredicate::<User>::match_all().matches(&users()[0]));
    }

    fn sorted_ids(sort: &str) -> Vec<u32> {
        let fields = user_fields();
        let comparator = compile_sort(&parse_sort(sort).unwrap(), &fields).unwrap();
        let mut all = users();
        all.sort_by(|a, b| comparator.compare(a, b));
        all.iter().map(|u| u.id).collect()
    }

    #[test]
    fn test_sort_directions() {
        assert_eq!(sorted_ids("age"), vec![2, 1, 3, 4]);
        assert_eq!(sorted_ids("age:desc"), vec![4, 1, 3, 2]);
        assert_eq!(sorted_ids("age:desc,name:desc"), vec![4, 3, 1, 2]);
        assert_eq!(sorted_ids("createdAt:desc"), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_sort_first_duplicate_wins() {
        let fields = user_fields();
        let specs = vec![SortSpec::asc("name"), SortSpec::desc("name")];
        let comparator = compile_sort(&specs, &fields).unwrap();
        assert_eq!(comparator.keys().len(), 1);
        assert_eq!(comparator.keys()[0].1, SortDirection::Asc);

        let alice = user(1, "Alice", 34, "active");
        let bob = user(2, "Bob", 17, "pending");
        assert_eq!(comparator.compare(&alice, &bob), Ordering::Less);

        assert_eq!(sorted_ids("age:desc,AGE:asc,id"), vec![4, 1, 3, 2]);
    }

    #[test]
    fn test_sort_requires_sortable() {
        let fields = user_fields();
        let err = compile_sort(&[SortSpec::asc("email")], &fields).unwrap_err();
        assert_eq!(
            err,
            QueryError::Capability {
                field: "email".to_string(),
                required: "sortable",
            }
        );
        assert!(matches!(
            compile_sort(&[SortSpec::asc("missing")], &fields),
            Err(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_unordered_comparator() {
        let comparator = CompiledComparator::<User>::unordered();
        let all = users();
        assert!(comparator.is_unordered());
        assert_eq!(comparator.compare(&all[0], &all[3]), Ordering::Equal);
    }
}
