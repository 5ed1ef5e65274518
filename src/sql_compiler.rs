//! SQL compiler that renders a query intent as a SELECT statement using sea-query.
//!
//! This is the hand-off format for SQL persistence layers: the resolved filter
//! becomes the WHERE clause, the comparator becomes ORDER BY and the view's
//! projection becomes the column list. Field descriptors supply column names.
//!
//! A comparison against a NULL column is UNKNOWN in SQL but has a definite
//! result in memory (`!=` is true, everything else false). Comparisons get an
//! `IS NULL` / `IS NOT NULL` guard wherever UNKNOWN would change the outcome,
//! so the WHERE clause selects the same rows as [`QueryIntent::apply`].

use sea_query::{
    Alias, Expr, LikeExpr, NullOrdering, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr, Value as SqlValue,
};

use crate::ast::{CompOp, SortDirection};
use crate::compiler::{Node, Resolved};
use crate::intent::QueryIntent;
use crate::value::Value;

/// SQL Compiler that converts query intents to SQL queries
#[derive(Debug, Clone)]
pub struct SqlCompiler {
    table: String,
}

impl SqlCompiler {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Compile a query intent into PostgreSQL text
    pub fn compile<E>(&self, intent: &QueryIntent<'_, E>) -> String {
        self.select(intent).to_string(PostgresQueryBuilder)
    }

    /// Build the SELECT statement for a query intent
    pub fn select<E>(&self, intent: &QueryIntent<'_, E>) -> SelectStatement {
        let mut select = Query::select();
        select.from(Alias::new(self.table.as_str()));

        for column in intent.projection().columns() {
            select.expr_as(
                Expr::col(Alias::new(column.descriptor.column_name())),
                Alias::new(column.output),
            );
        }

        if !intent.predicate().is_match_all() {
            select.and_where(self.compile_condition(intent.predicate().root(), false));
        }

        // Nulls first ascending, last descending
        for (field, direction) in intent.comparator().keys() {
            let (order, nulls) = match direction {
                SortDirection::Asc => (Order::Asc, NullOrdering::First),
                SortDirection::Desc => (Order::Desc, NullOrdering::Last),
            };
            select.order_by_with_nulls(Alias::new(field.column_name()), order, nulls);
        }

        select
    }

    /// `negated` is true under an odd number of NOTs.
    fn compile_condition<E>(&self, node: &Node<'_, E>, negated: bool) -> SimpleExpr {
        match node {
            Node::Always => Expr::val(true).into(),
            Node::Compare { field, op, operand } => {
                self.compile_comparison(field.column_name(), *op, operand, negated)
            }
            Node::And(left, right) => self
                .compile_condition(left, negated)
                .and(self.compile_condition(right, negated)),
            Node::Or(left, right) => self
                .compile_condition(left, negated)
                .or(self.compile_condition(right, negated)),
            Node::Not(inner) => self.compile_condition(inner, !negated).not(),
        }
    }

    /// Compile a comparison operation
    fn compile_comparison(
        &self,
        column: &str,
        op: CompOp,
        operand: &Resolved,
        negated: bool,
    ) -> SimpleExpr {
        let col = || Expr::col(Alias::new(column));

        // null_matches: in-memory result when the column is NULL
        let (expr, null_matches) = match operand {
            Resolved::Single(Value::Null) => {
                return match op {
                    CompOp::NotEq => col().is_not_null(),
                    _ => col().is_null(),
                }
            }
            Resolved::List(values) => {
                let present: Vec<SqlValue> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(to_sql_value)
                    .collect();
                if present.is_empty() {
                    return col().is_null();
                }
                let has_null = present.len() < values.len();
                (col().is_in(present), has_null)
            }
            Resolved::Single(value) => (compare_value(col(), op, value), op == CompOp::NotEq),
        };

        match (null_matches, negated) {
            (true, false) => expr.or(col().is_null()),
            (false, true) => expr.and(col().is_not_null()),
            _ => expr,
        }
    }
}

fn compare_value(col: Expr, op: CompOp, value: &Value) -> SimpleExpr {
    match op {
        CompOp::Eq => col.eq(to_sql_value(value)),
        CompOp::NotEq => col.ne(to_sql_value(value)),
        CompOp::Gt => col.gt(to_sql_value(value)),
        CompOp::Gte => col.gte(to_sql_value(value)),
        CompOp::Lt => col.lt(to_sql_value(value)),
        CompOp::Lte => col.lte(to_sql_value(value)),
        CompOp::In => col.is_in([to_sql_value(value)]),
        CompOp::Contains | CompOp::StartsWith | CompOp::EndsWith => {
            let needle = escape_like(value.as_str().unwrap_or_default());
            let pattern = match op {
                CompOp::Contains => format!("%{}%", needle),
                CompOp::StartsWith => format!("{}%", needle),
                _ => format!("%{}", needle),
            };
            col.like(LikeExpr::new(pattern).escape('\\'))
        }
    }
}

/// Convert a resolved value to sea-query Value
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::String(None),
        Value::String(s) | Value::Enum(s) => SqlValue::String(Some(Box::new(s.clone()))),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            SqlValue::BigInt(Some(*n as i64))
        }
        Value::Number(n) => SqlValue::Double(Some(*n)),
        Value::Bool(b) => SqlValue::Bool(Some(*b)),
        Value::Date(d) => SqlValue::String(Some(Box::new(d.to_rfc3339()))),
    }
}

/// LIKE wildcards in user input match literally
fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
