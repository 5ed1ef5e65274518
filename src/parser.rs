//! 过滤表达式的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 检查输入长度 / 空输入
//!   ├─ parse_expression()
//!   │    └─ parse_or_expression()
//!   │         ├─ parse_and_expression()
//!   │         │    ├─ parse_not_expression()
//!   │         │    │    ├─ "not" → 递归调用 parse_not_expression()
//!   │         │    │    └─ parse_primary_expression()
//!   │         │    │         ├─ "(" → 分组表达式 (递归调用 parse_expression)
//!   │         │    │         └─ 标识符 → parse_comparison()
//!   │         │    │              ├─ "in" → "(" 值 ("," 值)* ")"
//!   │         │    │              └─ 比较运算符 → 字面值
//!   │         │    │
//!   │         │    └─ 遇到 and 时，继续解析右侧 not 表达式
//!   │         │
//!   │         └─ 遇到 or 时，继续解析右侧 and 表达式
//!   │
//!   └─ 剩余 token → 错误
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **NOT操作** `not expression`
//! 3. **比较操作** `field = value`, `field in (...)`, `field contains 'x'`
//! 4. **AND操作** `expr1 and expr2`
//! 5. **OR操作** `expr1 or expr2`
//!
//! `and` / `or` 都是左结合。关键字不区分大小写。
//!
//! ## 解析示例
//!
//! ```text
//! status = 'active'
//! age >= 18 and (status = 'active' or status = 'pending')
//! not name startswith "test" and id in (1, 2, 3)
//! ```
//!
//! 解析器不查询字段注册表: 同一个 AST 可以针对不同的注册表编译。

use crate::ast::{CompOp, FilterNode, Identifier, Literal, Operand, SortDirection, SortSpec};
use crate::error::{ParseError, QueryError, QueryResult};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

const COMPARISON_OPERATORS: [&str; 10] = [
    "=", "!=", ">", ">=", "<", "<=", "contains", "startswith", "endswith", "in",
];

/// 解析器的输入限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// 过滤字符串的最大字节数
    pub max_length: usize,
    /// `not` 与括号的最大嵌套层数
    pub max_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_length: 4096,
            max_depth: 32,
        }
    }
}

/// 使用默认限制解析过滤表达式
pub fn parse(input: &str) -> QueryResult<FilterNode> {
    Parser::new(input).parse()
}

pub struct Parser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    /// 当前（尚未消费的）token
    current: Option<Token<'a>>,
    limits: ParseLimits,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_limits(input, ParseLimits::default())
    }

    pub fn with_limits(input: &'a str, limits: ParseLimits) -> Self {
        Self {
            input,
            lexer: Lexer::new(input),
            current: None,
            limits,
            depth: 0,
        }
    }

    /// 消费当前 token 并从词法分析器读取下一个
    fn advance(&mut self) -> QueryResult<Option<Token<'a>>> {
        let next = self.lexer.next().transpose()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        self.current
            .as_ref()
            .is_some_and(|token| std::mem::discriminant(&token.kind) == std::mem::discriminant(kind))
    }

    fn end_of_input(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.input.len(), message)
    }

    fn enter(&mut self, position: usize) -> QueryResult<()> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(ParseError::new(
                position,
                format!("Expression nested deeper than {} levels", self.limits.max_depth),
            )
            .into());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    pub fn parse(mut self) -> QueryResult<FilterNode> {
        if self.input.len() > self.limits.max_length {
            return Err(ParseError::new(
                self.limits.max_length,
                format!("Filter exceeds {} bytes", self.limits.max_length),
            )
            .into());
        }
        if self.input.trim().is_empty() {
            return Err(ParseError::new(0, "Empty filter expression")
                .expecting(["expression"])
                .into());
        }

        self.advance()?; // 读取第一个 token
        let expr = self.parse_expression()?;

        if let Some(token) = &self.current {
            let message = if token.kind == TokenKind::RParen {
                "Unmatched closing parenthesis".to_string()
            } else {
                format!("Unexpected {} after complete expression", token.kind.describe())
            };
            return Err(ParseError::new(token.span.start, message)
                .expecting(["'and'", "'or'", "end of input"])
                .into());
        }

        Ok(expr)
    }

    /// 解析表达式的入口点
    ///
    /// 按照优先级从低到高依次处理：OR → AND → NOT → PRIMARY
    fn parse_expression(&mut self) -> QueryResult<FilterNode> {
        self.parse_or_expression()
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (or and_expr)*`
    fn parse_or_expression(&mut self) -> QueryResult<FilterNode> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance()?; // 消费 or
            let right = self.parse_and_expression()?;
            left = FilterNode::or(left, right);
        }

        Ok(left)
    }

    /// 解析AND表达式 (中等优先级)
    ///
    /// 语法: `not_expr (and not_expr)*`
    fn parse_and_expression(&mut self) -> QueryResult<FilterNode> {
        let mut left = self.parse_not_expression()?;

        while self.match_token(&TokenKind::And) {
            self.advance()?; // 消费 and
            let right = self.parse_not_expression()?;
            left = FilterNode::and(left, right);
        }

        Ok(left)
    }

    /// 解析NOT表达式 (较高优先级)
    ///
    /// 语法: `not* primary_expr`
    fn parse_not_expression(&mut self) -> QueryResult<FilterNode> {
        if let Some(token) = &self.current {
            if token.kind == TokenKind::Not {
                let position = token.span.start;
                self.advance()?; // 消费 not
                self.enter(position)?;
                let child = self.parse_not_expression()?; // 允许 not 链式调用
                self.leave();
                return Ok(FilterNode::negate(child));
            }
        }
        self.parse_primary_expression()
    }

    /// 解析基础表达式 (最高优先级)
    ///
    /// - `(expression)` - 分组表达式
    /// - `field op value` - 比较
    fn parse_primary_expression(&mut self) -> QueryResult<FilterNode> {
        let Some(token) = &self.current else {
            return Err(self
                .end_of_input("Unexpected end of input, missing operand")
                .expecting(["field", "'not'", "'('"])
                .into());
        };

        match &token.kind {
            TokenKind::LParen => {
                let open = token.span.start;
                self.advance()?; // 消费 (
                self.enter(open)?;
                let expr = self.parse_expression()?;
                self.leave();

                match &self.current {
                    Some(token) if token.kind == TokenKind::RParen => {
                        self.advance()?; // 消费 )
                        Ok(expr)
                    }
                    Some(token) => Err(ParseError::new(
                        token.span.start,
                        format!("Expected ')' to close '(' at {}, found {}", open, token.kind.describe()),
                    )
                    .expecting(["')'", "'and'", "'or'"])
                    .into()),
                    None => Err(ParseError::new(open, "Unmatched opening parenthesis")
                        .expecting(["')'"])
                        .into()),
                }
            }
            TokenKind::Identifier(name) => {
                let field = Identifier(name.to_string());
                self.advance()?; // 消费字段名
                self.parse_comparison(field)
            }
            other => Err(ParseError::new(
                token.span.start,
                format!("Expected field name, found {}", other.describe()),
            )
            .expecting(["field", "'not'", "'('"])
            .into()),
        }
    }

    /// 语法: `field op value` 或 `field in (value, ...)`
    fn parse_comparison(&mut self, field: Identifier) -> QueryResult<FilterNode> {
        let Some(token) = self.advance()? else {
            return Err(self
                .end_of_input(format!("Missing operator after field '{}'", field))
                .expecting(COMPARISON_OPERATORS)
                .into());
        };

        let op = match token.kind {
            TokenKind::Eq => CompOp::Eq,
            TokenKind::NotEq => CompOp::NotEq,
            TokenKind::Gt => CompOp::Gt,
            TokenKind::Gte => CompOp::Gte,
            TokenKind::Lt => CompOp::Lt,
            TokenKind::Lte => CompOp::Lte,
            TokenKind::Contains => CompOp::Contains,
            TokenKind::StartsWith => CompOp::StartsWith,
            TokenKind::EndsWith => CompOp::EndsWith,
            TokenKind::In => {
                let values = self.parse_value_list(token.span.start)?;
                return Ok(FilterNode::Comparison {
                    field,
                    op: CompOp::In,
                    value: Operand::List(values),
                });
            }
            other => {
                return Err(ParseError::new(
                    token.span.start,
                    format!("Expected comparison operator, found {}", other.describe()),
                )
                .expecting(COMPARISON_OPERATORS)
                .into())
            }
        };

        let value = self.parse_value()?;
        Ok(FilterNode::Comparison {
            field,
            op,
            value: Operand::Single(value),
        })
    }

    /// 解析 `in` 之后的 `(value, value, ...)`, 至少一个值, 不允许尾随逗号
    fn parse_value_list(&mut self, in_position: usize) -> QueryResult<Vec<Literal>> {
        match self.advance()? {
            Some(token) if token.kind == TokenKind::LParen => {}
            Some(token) => {
                return Err(ParseError::new(
                    token.span.start,
                    format!("Expected '(' after 'in', found {}", token.kind.describe()),
                )
                .expecting(["'('"])
                .into())
            }
            None => {
                return Err(self
                    .end_of_input("Expected '(' after 'in'")
                    .expecting(["'('"])
                    .into())
            }
        }

        let mut values = vec![self.parse_value()?];
        loop {
            match self.advance()? {
                Some(token) if token.kind == TokenKind::Comma => values.push(self.parse_value()?),
                Some(token) if token.kind == TokenKind::RParen => return Ok(values),
                Some(token) => {
                    return Err(ParseError::new(
                        token.span.start,
                        format!("Expected ',' or ')' in value list, found {}", token.kind.describe()),
                    )
                    .expecting(["','", "')'"])
                    .into())
                }
                None => {
                    return Err(ParseError::new(in_position, "Unclosed value list after 'in'")
                        .expecting(["','", "')'"])
                        .into())
                }
            }
        }
    }

    fn parse_value(&mut self) -> QueryResult<Literal> {
        let Some(token) = self.advance()? else {
            return Err(self
                .end_of_input("Unexpected end of input, missing value")
                .expecting(["value"])
                .into());
        };

        match token.kind {
            TokenKind::String(s) => Ok(Literal::String(s.into_owned())),
            TokenKind::Number(n) => Ok(Literal::Number(n)),
            TokenKind::True => Ok(Literal::Bool(true)),
            TokenKind::False => Ok(Literal::Bool(false)),
            TokenKind::Null => Ok(Literal::Null),
            other => Err(ParseError::new(
                token.span.start,
                format!("Expected literal value, found {}", other.describe()),
            )
            .expecting(["string", "number", "'true'", "'false'", "'null'"])
            .into()),
        }
    }
}

/// 解析排序参数, 例如 `name:asc, age:desc, id`
///
/// 省略方向时默认升序。空白输入返回空列表。
pub fn parse_sort(input: &str) -> QueryResult<Vec<SortSpec>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut specs = Vec::new();
    let mut offset = 0;
    for item in input.split(',') {
        specs.push(parse_sort_item(item, offset)?);
        offset += item.len() + 1;
    }
    Ok(specs)
}

fn parse_sort_item(item: &str, offset: usize) -> QueryResult<SortSpec> {
    let leading = item.len() - item.trim_start().len();
    let position = offset + leading;
    let item = item.trim();

    if item.is_empty() {
        return Err(sort_error(position, "Empty sort item", ["field"]));
    }

    let (field, direction) = match item.split_once(':') {
        Some((field, direction)) => (field.trim(), Some(direction.trim())),
        None => (item, None),
    };

    if !is_identifier(field) {
        return Err(sort_error(
            position,
            format!("Invalid sort field '{}'", field),
            ["field"],
        ));
    }

    let direction = match direction {
        None => SortDirection::Asc,
        Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
        Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
        Some(d) => {
            return Err(sort_error(
                position,
                format!("Invalid sort direction '{}' for field '{}'", d, field),
                ["asc", "desc"],
            ))
        }
    };

    Ok(SortSpec::new(field, direction))
}

fn sort_error<const N: usize>(
    position: usize,
    message: impl Into<String>,
    expected: [&str; N],
) -> QueryError {
    ParseError::new(position, message).expecting(expected).into()
}

/// `[A-Za-z_][A-Za-z0-9_.]*`
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
