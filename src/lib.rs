//! A small, safe query language for filtering, sorting and shaping entities.
//!
//! Clients send a filter string, a sort list and a view name. The filter is
//! tokenized and parsed into a [`FilterNode`] tree without looking at any
//! schema, then compiled against a per-entity [`FieldRegistry`] that lists the
//! only fields a client may touch. Views limit which fields may be projected.
//!
//! ```
//! use entity_query::{FieldRegistry, QueryAssembler, QueryRequest, Value, ValueType, ViewRegistry};
//!
//! struct User { name: String, age: u32 }
//! struct UserDto;
//!
//! let fields = FieldRegistry::<User>::builder()
//!     .field("name", ValueType::String, |u: &User| Value::from(u.name.clone()))
//!     .field("age", ValueType::Number, |u: &User| Value::from(u.age))
//!     .build();
//!
//! let mut views = ViewRegistry::<User, UserDto>::new();
//! views.register("list", ["name"]);
//! views.set_default("list").unwrap();
//!
//! let users = vec![
//!     User { name: "Ann".into(), age: 31 },
//!     User { name: "Ben".into(), age: 12 },
//! ];
//! let request = QueryRequest::new().filter("age >= 18").sort("name:desc");
//! let intent = QueryAssembler::new(&fields, &views).assemble(&request).unwrap();
//! assert_eq!(intent.project_all(&users), vec![serde_json::json!({"name": "Ann"})]);
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fields;
pub mod intent;
pub mod lexer;
pub mod parser;
pub mod sql_compiler;
pub mod token;
pub mod value;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use ast::{CompOp, FilterNode, Identifier, Literal, LogicalOp, Operand, SortDirection, SortSpec};
pub use compiler::{compile, compile_sort, CompiledComparator, CompiledPredicate};
pub use config::{ConfigError, QueryConfig};
pub use error::{LexError, ParseError, QueryError, QueryResult};
pub use fields::{Capabilities, Capability, FieldDescriptor, FieldRegistry, FieldRegistryBuilder};
pub use intent::{QueryAssembler, QueryIntent, QueryRequest};
pub use lexer::Lexer;
pub use parser::{parse, parse_sort, ParseLimits, Parser};
pub use sql_compiler::SqlCompiler;
pub use value::{Value, ValueType};
pub use views::{Include, Projection, ViewBuilder, ViewDefinition, ViewRegistry};
