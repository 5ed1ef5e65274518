//! Shared fixtures for unit tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::fields::{Capabilities, Capability, FieldDescriptor, FieldRegistry};
use crate::value::{Value, ValueType};
use crate::views::ViewRegistry;

pub const STATUSES: &[&str] = &["active", "pending", "disabled"];

#[derive(Debug, Clone)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub age: u32,
    pub status: &'static str,
    pub email: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Default)]
pub struct UserDto;

pub fn user(id: u32, name: &str, age: u32, status: &'static str) -> User {
    User {
        id,
        name: name.to_string(),
        age,
        status,
        email: Some(format!("{}@example.com", name.to_lowercase())),
        active: status == "active",
        created_at: Utc.with_ymd_and_hms(2024, 1, id, 12, 0, 0).unwrap(),
        permissions: vec!["read".to_string()],
    }
}

pub fn users() -> Vec<User> {
    vec![
        user(1, "Alice", 34, "active"),
        user(2, "bob", 17, "pending"),
        user(3, "Carol", 34, "disabled"),
        User {
            email: None,
            ..user(4, "Dave", 51, "active")
        },
    ]
}

/// `email` is not sortable, `permissions` is projection-only.
pub fn user_fields() -> FieldRegistry<User> {
    FieldRegistry::builder()
        .field("id", ValueType::Number, |u: &User| Value::from(u.id))
        .field("name", ValueType::String, |u: &User| Value::from(u.name.clone()))
        .field("age", ValueType::Number, |u: &User| Value::from(u.age))
        .add(
            FieldDescriptor::new("status", ValueType::Enum(STATUSES), |u: &User| {
                Value::Enum(u.status.to_string())
            })
            .column("status_code"),
        )
        .add(
            FieldDescriptor::new("email", ValueType::String, |u: &User| {
                Value::from(u.email.clone())
            })
            .capabilities(Capabilities::ALL.without(Capability::Sortable)),
        )
        .field("active", ValueType::Bool, |u: &User| Value::from(u.active))
        .add(
            FieldDescriptor::new("createdAt", ValueType::Date, |u: &User| {
                Value::from(u.created_at)
            })
            .column("created_at"),
        )
        .add(
            FieldDescriptor::new("permissions", ValueType::String, |u: &User| {
                Value::from(u.permissions.join(","))
            })
            .capabilities(Capabilities::NONE.with(Capability::Projectable)),
        )
        .build()
}

pub fn user_views() -> ViewRegistry<User, UserDto> {
    let mut views = ViewRegistry::new();
    views
        .register("list", ["id", "name"])
        .register("detail", ["id", "name", "status", "email", "createdAt"]);
    views
        .view("admin")
        .select(["id", "name"])
        .select_as("permissionsSummary", "permissions")
        .include("roles.permissions")
        .build();
    views
        .set_default("list")
        .expect("list view is registered");
    views
}
