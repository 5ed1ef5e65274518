//! 过滤表达式的词法分析器
//!
//! `Lexer` 是一个惰性迭代器: 每次 `next()` 只读取一个 token。
//! 遇到第一个错误后迭代结束, 不可恢复。

use std::borrow::Cow;

use crate::error::LexError;
use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    /// 出错后不再产生 token
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            done: false,
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// 读取数字字面量: 整数或小数, 可带前导 `-`
    /// 注意：第一个字符（数字或 `-`）已经被调用者消费
    fn read_number(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        self.read_digits();
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.bump(); // 消费 '.'
            self.read_digits();
        }

        let text = &self.input[start..self.position];
        let value = text
            .parse::<f64>()
            .map_err(|_| LexError::new(start, format!("Invalid number '{}'", text)))?;
        Ok(self.token(TokenKind::Number(value), start))
    }

    fn read_digits(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取单引号或双引号包围的字符串字面量
    /// 注意：开始的引号已经被调用者消费。`\` 转义引号本身和 `\`
    fn read_string(&mut self, start: usize, quote: char) -> Result<Token<'a>, LexError> {
        let content_start = self.position;
        // 只有出现转义时才分配新字符串
        let mut owned: Option<String> = None;

        loop {
            let Some(c) = self.bump() else {
                return Err(LexError::new(start, "Unterminated string literal"));
            };

            if c == quote {
                let content = match owned {
                    Some(s) => Cow::Owned(s),
                    None => Cow::Borrowed(&self.input[content_start..self.position - 1]),
                };
                return Ok(self.token(TokenKind::String(content), start));
            }

            if c == '\\' {
                let escape_at = self.position - 1;
                let buf = owned
                    .get_or_insert_with(|| self.input[content_start..escape_at].to_string());
                match self.bump() {
                    Some(next) if next == quote || next == '\\' => buf.push(next),
                    Some(next) => {
                        buf.push('\\');
                        buf.push(next);
                    }
                    None => return Err(LexError::new(start, "Unterminated string literal")),
                }
            } else if let Some(buf) = owned.as_mut() {
                buf.push(c);
            }
        }
    }

    /// 读取标识符或关键字
    /// 标识符可以包含字母、数字、下划线和点（嵌套字段路径）
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        self.token(match_keyword(literal), start)
    }

    fn scan(&mut self) -> Option<Result<Token<'a>, LexError>> {
        self.skip_whitespace();
        let start = self.position;

        let c = self.bump()?; // 到达输入末尾

        let token = match c {
            '=' => self.token(TokenKind::Eq, start),
            '(' => self.token(TokenKind::LParen, start),
            ')' => self.token(TokenKind::RParen, start),
            ',' => self.token(TokenKind::Comma, start),
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Lte, start)
                } else {
                    self.token(TokenKind::Lt, start)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Gte, start)
                } else {
                    self.token(TokenKind::Gt, start)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::NotEq, start)
                } else {
                    return Some(Err(LexError::new(start, "Expected '=' after '!'")));
                }
            }
            '"' | '\'' => return Some(self.read_string(start, c)),
            '-' if self.peek().is_some_and(|n| n.is_ascii_digit()) => {
                return Some(self.read_number(start))
            }
            c if c.is_ascii_digit() => return Some(self.read_number(start)),
            c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(start),
            other => {
                return Some(Err(LexError::new(
                    start,
                    format!("Unrecognized character '{}'", other),
                )))
            }
        };
        Some(Ok(token))
    }
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "contains" => TokenKind::Contains,
        "startswith" => TokenKind::StartsWith,
        "endswith" => TokenKind::EndsWith,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.scan();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}
