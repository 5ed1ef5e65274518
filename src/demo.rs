//! 演示用的示例实体、字段注册表和视图

use chrono::{DateTime, TimeZone, Utc};

use entity_query::{
    Capabilities, Capability, FieldDescriptor, FieldRegistry, QueryResult, Value, ValueType,
    ViewRegistry,
};

const STATUSES: &[&str] = &["active", "pending", "suspended"];

#[derive(Debug, Clone)]
pub struct User {
    pub id: u32,
    pub name: &'static str,
    pub email: Option<&'static str>,
    pub age: u32,
    pub status: &'static str,
    pub created_at: Option<DateTime<Utc>>,
    pub permissions: Vec<&'static str>,
}

/// 输出形状标记
pub struct UserDto;

fn date(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).single()
}

pub fn users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "Alice Martin",
            email: Some("alice@example.com"),
            age: 34,
            status: "active",
            created_at: date(2023, 2, 14),
            permissions: vec!["users.read", "users.write"],
        },
        User {
            id: 2,
            name: "Bob Stone",
            email: Some("bob@example.org"),
            age: 17,
            status: "pending",
            created_at: date(2024, 6, 1),
            permissions: vec![],
        },
        User {
            id: 3,
            name: "Carol Diaz",
            email: None,
            age: 45,
            status: "suspended",
            created_at: date(2022, 11, 30),
            permissions: vec!["users.read"],
        },
        User {
            id: 4,
            name: "Dan O'Neil",
            email: Some("dan@example.com"),
            age: 29,
            status: "active",
            created_at: date(2024, 1, 9),
            permissions: vec!["reports.read"],
        },
        User {
            id: 5,
            name: "Erin_Wu",
            email: Some("erin@example.net"),
            age: 52,
            status: "active",
            created_at: date(2021, 7, 22),
            permissions: vec!["users.read", "users.write", "admin"],
        },
    ]
}

pub fn user_fields() -> FieldRegistry<User> {
    FieldRegistry::builder()
        .field("id", ValueType::Number, |u: &User| Value::from(u.id))
        .field("name", ValueType::String, |u: &User| Value::from(u.name))
        .add(
            FieldDescriptor::new("email", ValueType::String, |u: &User| Value::from(u.email))
                .capabilities(Capabilities::ALL.without(Capability::Sortable)),
        )
        .field("age", ValueType::Number, |u: &User| Value::from(u.age))
        .field("status", ValueType::Enum(STATUSES), |u: &User| {
            Value::Enum(u.status.to_string())
        })
        .add(
            FieldDescriptor::new("createdAt", ValueType::Date, |u: &User| {
                Value::from(u.created_at)
            })
            .column("created_at"),
        )
        .add(
            FieldDescriptor::new("permissionCount", ValueType::Number, |u: &User| {
                Value::from(u.permissions.len() as i64)
            })
            .column("permission_count"),
        )
        .add(
            FieldDescriptor::new("permissions", ValueType::String, |u: &User| {
                Value::from(u.permissions.join(", "))
            })
            .capabilities(Capabilities::NONE.with(Capability::Projectable)),
        )
        .build()
}

pub fn user_views() -> QueryResult<ViewRegistry<User, UserDto>> {
    let mut views = ViewRegistry::new();
    views
        .register("list", ["id", "name", "status"])
        .register("detail", ["id", "name", "email", "age", "status", "createdAt"]);
    views
        .view("admin")
        .select(["id", "name", "permissionCount"])
        .select_as("permissionsSummary", "permissions")
        .include("roles.permissions")
        .build();
    views.set_default("list")?;
    Ok(views)
}
