//! 过滤表达式的抽象语法树
//!
//! AST 只描述文本的结构, 不做字段校验; 字段是否存在由编译阶段决定。

use std::fmt;

/// 过滤表达式树的节点
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// 基础比较运算, 这是树的叶子节点, 例如：`age >= 18`
    Comparison {
        field: Identifier,
        op: CompOp,
        value: Operand,
    },
    /// 逻辑与/或运算
    Logical {
        op: LogicalOp,
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
    /// 逻辑非运算 (NOT)
    Not { child: Box<FilterNode> },
}

impl FilterNode {
    pub fn comparison(field: impl Into<String>, op: CompOp, value: impl Into<Operand>) -> Self {
        FilterNode::Comparison {
            field: Identifier(field.into()),
            op,
            value: value.into(),
        }
    }

    pub fn and(left: FilterNode, right: FilterNode) -> Self {
        FilterNode::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: FilterNode, right: FilterNode) -> Self {
        FilterNode::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(child: FilterNode) -> Self {
        FilterNode::Not {
            child: Box::new(child),
        }
    }
}

/// 字段引用, 保留用户输入的原始大小写
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,         // =
    NotEq,      // !=
    Gt,         // >
    Gte,        // >=
    Lt,         // <
    Lte,        // <=
    Contains,   // contains
    StartsWith, // startswith
    EndsWith,   // endswith
    In,         // in (...)
}

impl CompOp {
    /// 仅适用于字符串字段的运算符
    pub fn is_text_match(&self) -> bool {
        matches!(self, CompOp::Contains | CompOp::StartsWith | CompOp::EndsWith)
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, CompOp::Gt | CompOp::Gte | CompOp::Lt | CompOp::Lte)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::NotEq => "!=",
            CompOp::Gt => ">",
            CompOp::Gte => ">=",
            CompOp::Lt => "<",
            CompOp::Lte => "<=",
            CompOp::Contains => "contains",
            CompOp::StartsWith => "startswith",
            CompOp::EndsWith => "endswith",
            CompOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// 比较运算的右侧: 单个字面量, 或 `in (...)` 的值列表
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Literal),
    List(Vec<Literal>),
}

impl Operand {
    pub fn describe(&self) -> String {
        match self {
            Operand::Single(literal) => literal.describe(),
            Operand::List(_) => "list".to_string(),
        }
    }
}

impl From<Literal> for Operand {
    fn from(literal: Literal) -> Self {
        Operand::Single(literal)
    }
}

impl From<Vec<Literal>> for Operand {
    fn from(values: Vec<Literal>) -> Self {
        Operand::List(values)
    }
}

/// 字面量值
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Number(_) => "number",
            Literal::Bool(_) => "bool",
            Literal::Null => "null",
        }
    }

    /// 用于错误信息, 例如 `string 'old'`
    pub fn describe(&self) -> String {
        match self {
            Literal::String(s) => format!("string '{}'", s),
            Literal::Number(n) => format!("number {}", n),
            Literal::Bool(b) => format!("bool {}", b),
            Literal::Null => "null".to_string(),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Number(n as f64)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// 单个排序项, 例如 `name:desc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: Identifier,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: Identifier(field.into()),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}
