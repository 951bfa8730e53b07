//! EQL 的语法分析器：将 token 序列转换为未翻译的查询树
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   └─ parse_query(in_group = false)
//!        ├─ "(" → parse_query(in_group = true)   (嵌套查询，直到匹配的 ")")
//!        ├─ "and" / "or" → 同一层级只能使用一种组合方式
//!        ├─ "order" "by" → parse_order()          (field direction, ...)
//!        └─ 其他 → parse_condition()
//!                    ├─ read_field()               字段名，不能是保留 token
//!                    ├─ read_operator()            合并连续的关键字，例如 "is not"
//!                    └─ read_value(allow_group)
//!                         ├─ "(" → read_values()   值列表，不允许嵌套
//!                         ├─ '...' / "..." → 字符串字面量
//!                         ├─ name "(" → 函数调用 (参数递归调用 read_value)
//!                         └─ 其他 → 占位符 (null 不区分大小写)
//! ```
//!
//! ## 语法
//!
//! ```text
//! query     := predicate (combinator predicate)* ["order by" order ("," order)*]
//! predicate := property operator value | "(" query ")"
//! value     := literal | placeholder | function | group
//! function  := name "(" (value ("," value)*)? ")"
//! group     := "(" value ("," value)* ")"
//! order     := property ("asc" | "desc")
//! ```
//!
//! ## 错误定位
//!
//! 每个错误都带有出错位置（字符偏移）以及上下文：条件内部的错误以条件的字段名为起点，
//! 上下文表达式是从起点到最后消费的 token，以单个空格连接。

use crate::ast::{
    Combinator, Condition, Direction, EqType, Expression, Operator, Order, Query, RawQuery, Sort,
    MAX_NESTING_DEPTH,
};
use crate::lexer::tokenize;
use crate::token::Token;
use thiserror::Error;
use tracing::debug;

/// 解析错误的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    IllegalToken,
    IllegalKeyword,
    IllegalField,
    IllegalOperator,
    IllegalValue,
    IllegalOrderDirection,
    MissingField,
    MissingOperator,
    MissingValue,
    MissingKeyword,
    MissingToken,
    MissingOrderDirection,
    NestingTooDeep,
}

/// 词法或语法错误，带有可用于标记输入的位置信息
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 出错的表达式
    pub error_expression: String,
    /// 出错位置（字符偏移）
    pub error_position: usize,
    /// 上下文起始位置
    pub context_start: usize,
    /// 从上下文起点到出错处的 token，以空格连接
    pub context_expression: String,
}

impl ParseError {
    fn new(kind: ParseErrorKind, message: String, expression: impl Into<String>, position: usize) -> Self {
        let expression = expression.into();
        Self {
            kind,
            message,
            context_expression: expression.clone(),
            error_expression: expression,
            error_position: position,
            context_start: position,
        }
    }

    fn with_context(self, context_start: usize, context_expression: String) -> Self {
        Self {
            context_start,
            context_expression,
            ..self
        }
    }

    fn illegal_token(token: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::IllegalToken,
            format!("Illegal token: {}", token.text),
            token.text,
            token.position,
        )
    }

    fn illegal_keyword(token: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::IllegalKeyword,
            format!(
                "Illegal keyword {} - cannot combine and/or on the same level without explicit grouping",
                token.text
            ),
            token.text,
            token.position,
        )
    }

    fn illegal_field(token: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::IllegalField,
            format!("Illegal field: {}", token.text),
            token.text,
            token.position,
        )
    }

    fn illegal_operator(operator: String, position: usize) -> Self {
        Self::new(
            ParseErrorKind::IllegalOperator,
            format!("Illegal operator: {}", operator),
            operator,
            position,
        )
    }

    fn illegal_is_value(field: &str, position: usize) -> Self {
        Self::new(
            ParseErrorKind::IllegalValue,
            format!(
                "Illegal value for {}: IS and IS NOT can only be combined with NULL or EMPTY",
                field
            ),
            field,
            position,
        )
    }

    fn illegal_order_direction(field: &str, direction: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::IllegalOrderDirection,
            format!(
                "Illegal order direction for {}: {} (only ASC and DESC are allowed)",
                field, direction.text
            ),
            direction.text,
            direction.position,
        )
    }

    fn missing_field(position: usize) -> Self {
        Self::new(
            ParseErrorKind::MissingField,
            format!("Missing expected field at position {}", position),
            "",
            position,
        )
    }

    fn missing_operator(field: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::MissingOperator,
            format!("Missing operator for: {}", field.text),
            field.text,
            field.next_position(),
        )
    }

    fn missing_value(after: String, position: usize) -> Self {
        Self::new(
            ParseErrorKind::MissingValue,
            format!("Missing value after: {}", after),
            after,
            position,
        )
    }

    fn missing_keyword(token: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::MissingKeyword,
            format!("Missing keyword and/or before: {}", token.text),
            token.text,
            token.position,
        )
    }

    fn missing_token(expected: char, after: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::MissingToken,
            format!("Missing token {} after: {}", expected, after.text),
            after.text,
            after.next_position(),
        )
    }

    fn nesting_too_deep(token: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::NestingTooDeep,
            format!(
                "Nesting deeper than {} levels at position {}",
                MAX_NESTING_DEPTH, token.position
            ),
            token.text,
            token.position,
        )
    }

    fn missing_order_direction(field: Token<'_>) -> Self {
        Self::new(
            ParseErrorKind::MissingOrderDirection,
            format!("Missing order direction after: {}", field.text),
            field.text,
            field.next_position(),
        )
    }
}

/// 对输入做词法分析并解析为未翻译的查询
pub fn parse(input: &str) -> Result<RawQuery, ParseError> {
    let tokens = tokenize(input);
    Parser::new(&tokens).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// 最近一次消费的 token 下标
    last: Option<usize>,
    /// 当前嵌套层数，分组与函数调用都计入
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            last: None,
            depth: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    /// 返回之后第 n 个 token，不推进位置
    fn peek_at(&self, n: usize) -> Option<Token<'a>> {
        self.tokens.get(self.position + n).copied()
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.last = Some(self.position);
        self.position += 1;
        Some(token)
    }

    fn last_token(&self) -> Option<Token<'a>> {
        self.last.and_then(|index| self.tokens.get(index).copied())
    }

    /// 从 `start` 到最近消费的 token，以空格连接
    fn processed_since(&self, start: usize) -> String {
        let Some(last) = self.last else {
            return String::new();
        };
        self.tokens
            .get(start..=last)
            .unwrap_or_default()
            .iter()
            .map(|token| token.text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 在最后消费的 token 之后缺少字段
    fn missing_field(&self) -> ParseError {
        match self.last_token() {
            Some(last) => ParseError::missing_field(last.next_position())
                .with_context(last.position, last.text.to_string()),
            None => ParseError::missing_field(0),
        }
    }

    /// 进入一层嵌套，超过上限时报错
    fn descend(&mut self, token: Token<'a>) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::nesting_too_deep(token));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn parse(&mut self) -> Result<RawQuery, ParseError> {
        let query = self.parse_query(false)?;
        debug!(query = %query, "converted tokens to query");
        Ok(query)
    }

    fn parse_query(&mut self, in_group: bool) -> Result<RawQuery, ParseError> {
        let mut expressions: Vec<Expression> = Vec::new();
        let mut combinator: Option<Combinator> = None;
        let mut orders: Vec<Order> = Vec::new();

        let mut expecting_combinator = false;
        let mut expecting_next = in_group;
        let mut in_order_by = false;

        while let Some(token) = self.peek() {
            if in_order_by {
                if expecting_next {
                    orders.push(self.parse_order()?);
                    expecting_next = false;
                } else if token.text == "," {
                    self.advance();
                    expecting_next = true;
                } else {
                    return Err(ParseError::illegal_token(token));
                }
            } else if !expecting_combinator && token.text == "(" {
                self.descend(token)?;
                self.advance();
                let nested = self.parse_query(true)?;
                self.depth -= 1;
                expressions.push(nested.into());
                expecting_combinator = true;
                expecting_next = false;
            } else if token.text == ")" {
                if !in_group {
                    return Err(ParseError::illegal_token(token));
                }
                if expecting_next {
                    return Err(self.missing_field());
                }
                self.advance();
                return Ok(Self::finish(combinator, expressions, orders));
            } else if expecting_combinator && (token.is("and") || token.is("or")) {
                let keyword = if token.is("and") {
                    Combinator::And
                } else {
                    Combinator::Or
                };
                if combinator.is_some_and(|current| current != keyword) {
                    return Err(ParseError::illegal_keyword(token));
                }
                combinator = Some(keyword);
                self.advance();
                expecting_combinator = false;
                expecting_next = true;
            } else if token.is("order") && self.peek_at(1).is_some_and(|next| next.is("by")) {
                self.advance();
                self.advance();
                in_order_by = true;
                expecting_next = true;
            } else {
                if expecting_combinator {
                    return Err(ParseError::missing_keyword(token));
                }
                expressions.push(self.parse_condition()?.into());
                expecting_combinator = true;
                expecting_next = false;
            }
        }

        if expecting_next {
            return Err(self.missing_field());
        }
        if in_group {
            // 分组未闭合
            if let Some(last) = self.last_token() {
                return Err(ParseError::missing_token(')', last));
            }
        }

        Ok(Self::finish(combinator, expressions, orders))
    }

    fn finish(combinator: Option<Combinator>, expressions: Vec<Expression>, orders: Vec<Order>) -> RawQuery {
        let query = Query::create(combinator.unwrap_or(Combinator::And), expressions);
        if orders.is_empty() {
            query
        } else {
            query.with_sort(Some(Sort::new(orders)))
        }
    }

    fn parse_order(&mut self) -> Result<Order, ParseError> {
        let Some(field) = self.advance() else {
            return Err(self.missing_field());
        };
        let Some(direction) = self.advance() else {
            return Err(ParseError::missing_order_direction(field));
        };
        Direction::parse(direction.text)
            .map(|parsed| Order::new(field.text, parsed))
            .ok_or_else(|| ParseError::illegal_order_direction(field.text, direction))
    }

    /// 解析单个条件，失败时附加以条件起点开始的上下文
    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        let mut start = self.last;
        self.read_condition(&mut start).map_err(|error| match start {
            Some(index) => {
                let context_start = self.tokens.get(index).map_or(0, |token| token.position);
                let context = self.processed_since(index);
                error.with_context(context_start, context)
            }
            None => {
                let context = error.error_expression.clone();
                error.with_context(0, context)
            }
        })
    }

    fn read_condition(&mut self, start: &mut Option<usize>) -> Result<Condition, ParseError> {
        let field = self.read_field()?;
        *start = self.last;

        let operator = self.read_operator(field)?;
        let expected_position = self.last_token().map_or(0, |token| token.next_position());

        let Some(value) = self.read_value(true)? else {
            return Err(ParseError::missing_value(
                operator.describe_missing(field.text),
                expected_position,
            ));
        };

        if operator.is_null_check() {
            let operator = match &value {
                EqType::Placeholder(raw) if raw.eq_ignore_ascii_case("null") => operator,
                EqType::Placeholder(raw) if raw.eq_ignore_ascii_case("empty") => match operator {
                    Operator::IsNull => Operator::IsEmpty,
                    Operator::IsNotNull => Operator::IsNotEmpty,
                    other => other,
                },
                _ => return Err(ParseError::illegal_is_value(field.text, expected_position)),
            };
            return Ok(Condition::unary(field.text, operator));
        }

        Ok(Condition::new(field.text, operator, [value]))
    }

    fn read_field(&mut self) -> Result<Token<'a>, ParseError> {
        let Some(token) = self.advance() else {
            return Err(self.missing_field());
        };
        if token.is_reserved(false) {
            return Err(ParseError::illegal_field(token));
        }
        Ok(token)
    }

    /// 读取运算符，连续的关键字合并为一个运算符，例如 `not contains`
    fn read_operator(&mut self, field: Token<'a>) -> Result<Operator, ParseError> {
        let Some(first) = self.advance() else {
            return Err(ParseError::missing_operator(field));
        };

        let mut text = first.text.to_string();
        while let Some(next) = self.peek() {
            if !next.is_keyword() {
                break;
            }
            text.push(' ');
            text.push_str(next.text);
            self.advance();
        }

        Operator::for_token(&text).ok_or_else(|| ParseError::illegal_operator(text, first.position))
    }

    fn read_value(&mut self, allow_group: bool) -> Result<Option<EqType>, ParseError> {
        let Some(token) = self.advance() else {
            return Ok(None);
        };

        if token.is_reserved(allow_group) {
            return Err(ParseError::illegal_token(token));
        }
        if token.text == "(" {
            return self.read_values().map(|values| Some(EqType::Group(values)));
        }
        if let Some(quote) = token.quote() {
            return Self::read_literal(token, quote).map(Some);
        }
        if self.peek().is_some_and(|next| next.text == "(") {
            return self.read_function(token).map(Some);
        }
        if token.is("null") {
            return Ok(Some(EqType::null()));
        }
        Ok(Some(EqType::placeholder(token.text)))
    }

    /// 去掉引号并处理转义；未闭合时报告缺少的引号
    fn read_literal(token: Token<'a>, quote: char) -> Result<EqType, ParseError> {
        let mut chars = token.text.chars();
        chars.next();

        let mut value = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            } else if c == quote {
                closed = true;
                break;
            } else {
                value.push(c);
            }
        }

        if !closed {
            return Err(ParseError::missing_token(quote, token));
        }
        Ok(EqType::Literal(value))
    }

    fn read_function(&mut self, name: Token<'a>) -> Result<EqType, ParseError> {
        // 消费 "("
        let Some(open) = self.advance() else {
            return Ok(EqType::function(name.text, []));
        };
        self.descend(open)?;

        let arguments = if self.peek().is_some_and(|next| next.text == ")") {
            self.advance();
            Vec::new()
        } else {
            self.read_values()?
        };
        self.depth -= 1;
        Ok(EqType::function(name.text, arguments))
    }

    /// 读取 "(" 之后的值列表直到 ")"，不允许嵌套分组
    fn read_values(&mut self) -> Result<Vec<EqType>, ParseError> {
        let mut values = Vec::new();
        let mut expecting_next = true;

        while let Some(token) = self.peek() {
            if !expecting_next && token.text == ")" {
                self.advance();
                return Ok(values);
            } else if !expecting_next && token.text == "," {
                self.advance();
                expecting_next = true;
            } else {
                if !expecting_next {
                    return Err(ParseError::illegal_token(token));
                }
                if let Some(value) = self.read_value(false)? {
                    values.push(value);
                }
                expecting_next = false;
            }
        }

        let Some(last) = self.last_token() else {
            return Err(ParseError::missing_field(0));
        };
        if expecting_next {
            Err(ParseError::missing_value(last.text.to_string(), last.next_position()))
        } else {
            Err(ParseError::missing_token(')', last))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NullHandling;

    /// 第 i 个 token 位于位置 i * 10
    fn spaced(items: &[&'static str]) -> Vec<Token<'static>> {
        items
            .iter()
            .enumerate()
            .map(|(i, text)| Token::new(text, i * 10))
            .collect()
    }

    fn convert(items: &[&'static str]) -> Result<RawQuery, ParseError> {
        let tokens = spaced(items);
        Parser::new(&tokens).parse()
    }

    fn parse_error(items: &[&'static str]) -> ParseError {
        match convert(items) {
            Ok(query) => panic!("Expected parse error, got: {}", query),
            Err(error) => error,
        }
    }

    fn eq(property: &str, value: EqType) -> Condition {
        Condition::new(property, Operator::Eq, [value])
    }

    #[test]
    fn test_empty_tokens() {
        assert_eq!(convert(&[]).unwrap(), Query::all());
    }

    #[test]
    fn test_single_condition() {
        let query = convert(&["name", "=", "'john'"]).unwrap();
        assert_eq!(query, Query::and([eq("name", EqType::literal("john"))]));
    }

    #[test]
    fn test_placeholders_and_null() {
        let query = convert(&["id", "=", "123", "and", "value", "!=", "NuLL"]).unwrap();
        assert_eq!(
            query,
            Query::and([
                eq("id", EqType::placeholder("123")),
                Condition::new("value", Operator::Neq, [EqType::null()]),
            ])
        );
    }

    #[test]
    fn test_or_combinator() {
        let query = convert(&["a", "=", "1", "OR", "b", "=", "2"]).unwrap();
        assert_eq!(query.combinator(), Combinator::Or);
        assert_eq!(query.expressions().len(), 2);
    }

    #[test]
    fn test_mixed_combinators_require_grouping() {
        let error = parse_error(&["a", "=", "1", "and", "b", "=", "2", "or", "c", "=", "3"]);
        assert_eq!(error.kind, ParseErrorKind::IllegalKeyword);
        assert_eq!(
            error.message,
            "Illegal keyword or - cannot combine and/or on the same level without explicit grouping"
        );
        assert_eq!(error.error_position, 70);
    }

    #[test]
    fn test_nested_groups() {
        let query = convert(&[
            "a", "=", "1", "and", "(", "b", "=", "2", "or", "c", "=", "3", ")",
        ])
        .unwrap();
        assert_eq!(
            query,
            Query::and([
                Expression::from(eq("a", EqType::placeholder("1"))),
                Expression::from(Query::or([
                    eq("b", EqType::placeholder("2")),
                    eq("c", EqType::placeholder("3")),
                ])),
            ])
        );
    }

    #[test]
    fn test_multi_keyword_operators() {
        let query = convert(&[
            "a", "not", "contains", "x", "and", "b", "NOT", "IN", "(", "1", ",", "2", ")", "and",
            "c", "not", "ilike", "'%x'",
        ])
        .unwrap();
        let operators: Vec<Operator> = query
            .expressions()
            .iter()
            .map(|expression| match expression {
                Expression::Condition(condition) => condition.operator(),
                Expression::Query(_) => panic!("Expected condition"),
            })
            .collect();
        assert_eq!(
            operators,
            vec![Operator::NotContains, Operator::NotIn, Operator::NotLikeIc]
        );
    }

    #[test]
    fn test_is_null_and_is_empty() {
        let query = convert(&[
            "a", "is", "null", "and", "b", "is", "not", "NULL", "and", "c", "IS", "empty", "and",
            "d", "is", "not", "Empty",
        ])
        .unwrap();
        assert_eq!(
            query,
            Query::and([
                Condition::unary("a", Operator::IsNull),
                Condition::unary("b", Operator::IsNotNull),
                Condition::unary("c", Operator::IsEmpty),
                Condition::unary("d", Operator::IsNotEmpty),
            ])
        );
    }

    #[test]
    fn test_is_requires_null_or_empty() {
        let error = parse_error(&["a", "is", "bla"]);
        assert_eq!(error.kind, ParseErrorKind::IllegalValue);
        assert_eq!(
            error.message,
            "Illegal value for a: IS and IS NOT can only be combined with NULL or EMPTY"
        );
        assert_eq!(error.error_position, 12);
    }

    #[test]
    fn test_groups_and_functions() {
        let query = convert(&[
            "city", "in", "(", "A", ",", "'B'", ",", "null", ")", "and", "user", "=",
            "currentUser", "(", "'456'", ",", "timestamp", "(", "today", ")", ")", "and", "d",
            "<", "now", "(", ")",
        ])
        .unwrap();
        assert_eq!(
            query,
            Query::and([
                Condition::new(
                    "city",
                    Operator::In,
                    [EqType::group([
                        EqType::placeholder("A"),
                        EqType::literal("B"),
                        EqType::null(),
                    ])],
                ),
                eq(
                    "user",
                    EqType::function(
                        "currentUser",
                        [
                            EqType::literal("456"),
                            EqType::function("timestamp", [EqType::placeholder("today")]),
                        ],
                    ),
                ),
                Condition::new("d", Operator::Lt, [EqType::function("now", [])]),
            ])
        );
    }

    #[test]
    fn test_empty_literal_and_escapes() {
        let tokens = tokenize(r#"a = '' and b = 'it\'s' and c = "say \"hi\"""#);
        let query = Parser::new(&tokens).parse().unwrap();
        assert_eq!(
            query,
            Query::and([
                eq("a", EqType::literal("")),
                eq("b", EqType::literal("it's")),
                eq("c", EqType::literal("say \"hi\"")),
            ])
        );
    }

    #[test]
    fn test_order_by() {
        let query = convert(&[
            "a", "=", "1", "order", "by", "name", "asc", ",", "city", "DESC",
        ])
        .unwrap();
        let sort = query.sort().unwrap();
        assert_eq!(sort.orders(), &[Order::asc("name"), Order::desc("city")]);
        assert_eq!(sort.orders()[0].null_handling(), NullHandling::Native);

        let only_sort = convert(&["order", "by", "name", "desc"]).unwrap();
        assert!(!only_sort.has_expressions());
        assert_eq!(only_sort.to_string(), "order by name DESC");
    }

    #[test]
    fn test_order_as_field_name() {
        let query = convert(&["order", "=", "1"]).unwrap();
        assert_eq!(query, Query::and([eq("order", EqType::placeholder("1"))]));
    }

    #[test]
    fn test_illegal_order_direction() {
        let error = parse_error(&["order", "by", "city", "ascc"]);
        assert_eq!(error.kind, ParseErrorKind::IllegalOrderDirection);
        assert_eq!(
            error.message,
            "Illegal order direction for city: ascc (only ASC and DESC are allowed)"
        );
        assert_eq!(error.error_position, 30);
    }

    #[test]
    fn test_missing_order_direction() {
        let error = parse_error(&["order", "by", "city"]);
        assert_eq!(error.kind, ParseErrorKind::MissingOrderDirection);
        assert_eq!(error.message, "Missing order direction after: city");
        assert_eq!(error.error_position, 24);
    }

    #[test]
    fn test_missing_order_field() {
        let error = parse_error(&["order", "by"]);
        assert_eq!(error.kind, ParseErrorKind::MissingField);
        assert_eq!(error.error_position, 12);

        let error = parse_error(&["order", "by", "city", "asc", ","]);
        assert_eq!(error.kind, ParseErrorKind::MissingField);
        assert_eq!(error.error_position, 41);
    }

    #[test]
    fn test_missing_value_context() {
        let error = parse_error(&["a", "=", "b", "and", "c", "="]);
        assert_eq!(error.kind, ParseErrorKind::MissingValue);
        assert_eq!(error.message, "Missing value after: c = ");
        assert_eq!(error.error_position, 51);
        assert_eq!(error.context_start, 40);
        assert_eq!(error.context_expression, "c =");
    }

    #[test]
    fn test_missing_value_at_start() {
        let error = parse_error(&["a", "="]);
        assert_eq!(error.context_start, 0);
        assert_eq!(error.context_expression, "a =");
        assert_eq!(error.error_position, 11);
    }

    #[test]
    fn test_unclosed_literal_context() {
        let error = parse_error(&["a", "=", "b", "and", "c", "contains", "(", "'test"]);
        assert_eq!(error.kind, ParseErrorKind::MissingToken);
        assert_eq!(error.message, "Missing token ' after: 'test");
        assert_eq!(error.error_position, 75);
        assert_eq!(error.context_start, 40);
        assert_eq!(error.context_expression, "c contains ( 'test");
    }

    #[test]
    fn test_unclosed_double_quoted_literal() {
        let error = parse_error(&["value", "=", "\"123"]);
        assert_eq!(error.message, "Missing token \" after: \"123");
        assert_eq!(error.error_position, 24);
    }

    #[test]
    fn test_escaped_closing_quote_is_not_terminating() {
        let error = parse_error(&["value", "=", r"'123\'"]);
        assert_eq!(error.kind, ParseErrorKind::MissingToken);
    }

    #[test]
    fn test_missing_field_after_keyword() {
        let error = parse_error(&["a", "=", "b", "and"]);
        assert_eq!(error.kind, ParseErrorKind::MissingField);
        assert_eq!(error.message, "Missing expected field at position 33");
        assert_eq!(error.context_start, 30);
        assert_eq!(error.context_expression, "and");

        let error = parse_error(&["a", "=", "b", "and", "("]);
        assert_eq!(error.kind, ParseErrorKind::MissingField);
        assert_eq!(error.error_position, 41);
    }

    #[test]
    fn test_missing_operator() {
        let error = parse_error(&["value"]);
        assert_eq!(error.kind, ParseErrorKind::MissingOperator);
        assert_eq!(error.message, "Missing operator for: value");
        assert_eq!(error.error_position, 5);
    }

    #[test]
    fn test_illegal_operator() {
        let error = parse_error(&["value", "==", "1"]);
        assert_eq!(error.kind, ParseErrorKind::IllegalOperator);
        assert_eq!(error.message, "Illegal operator: ==");
        assert_eq!(error.error_position, 10);
    }

    #[test]
    fn test_illegal_field() {
        let error = parse_error(&["a", "=", "1", "and", "!=", "2"]);
        assert_eq!(error.kind, ParseErrorKind::IllegalField);
        assert_eq!(error.message, "Illegal field: !=");
        assert_eq!(error.error_position, 40);
        assert_eq!(error.context_start, 30);
        assert_eq!(error.context_expression, "and !=");
    }

    #[test]
    fn test_missing_keyword() {
        let error = parse_error(&["value", "=", "123", "456"]);
        assert_eq!(error.kind, ParseErrorKind::MissingKeyword);
        assert_eq!(error.message, "Missing keyword and/or before: 456");
        assert_eq!(error.error_position, 30);
    }

    #[test]
    fn test_empty_group_is_illegal() {
        let error = parse_error(&["value", "contains", "(", ")"]);
        assert_eq!(error.kind, ParseErrorKind::IllegalToken);
        assert_eq!(error.message, "Illegal token: )");
        assert_eq!(error.error_position, 30);
    }

    #[test]
    fn test_group_errors() {
        let error = parse_error(&["value", "contains", "("]);
        assert_eq!(error.kind, ParseErrorKind::MissingValue);
        assert_eq!(error.message, "Missing value after: (");
        assert_eq!(error.error_position, 21);

        let error = parse_error(&["value", "in", "(", ",", "123", ")"]);
        assert_eq!(error.message, "Illegal token: ,");
        assert_eq!(error.error_position, 30);

        let error = parse_error(&["value", "in", "(", "123", "456", ")"]);
        assert_eq!(error.message, "Illegal token: 456");
        assert_eq!(error.error_position, 40);

        let error = parse_error(&["value", "in", "(", "123", ",", ")"]);
        assert_eq!(error.message, "Illegal token: )");
        assert_eq!(error.error_position, 50);

        let error = parse_error(&["value", "in", "(", "123"]);
        assert_eq!(error.message, "Missing token ) after: 123");
        assert_eq!(error.error_position, 33);

        let error = parse_error(&["value", "in", "(", "(", "1", ")", ")"]);
        assert_eq!(error.message, "Illegal token: (");
        assert_eq!(error.error_position, 30);
    }

    #[test]
    fn test_unclosed_function() {
        let error = parse_error(&["user", "=", "currentUser", "("]);
        assert_eq!(error.kind, ParseErrorKind::MissingValue);
        assert_eq!(error.message, "Missing value after: (");
        assert_eq!(error.error_position, 31);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let error = parse_error(&["a", "=", "1", ")"]);
        assert_eq!(error.kind, ParseErrorKind::IllegalToken);
        assert_eq!(error.error_position, 30);

        let error = parse_error(&["(", "a", "=", "1"]);
        assert_eq!(error.kind, ParseErrorKind::MissingToken);
        assert_eq!(error.message, "Missing token ) after: 1");
    }

    #[test]
    fn test_grouped_sample_drops_redundant_parentheses() {
        let query = parse(
            "(name = 'someName' and city != 217 and (email contains 'emailOne' or email = 'emailTwo'))",
        )
        .unwrap();
        assert_eq!(query.combinator(), Combinator::And);
        assert_eq!(query.expressions().len(), 3);
        assert_eq!(
            query.to_string(),
            "name = 'someName' and city != 217 and (email contains 'emailOne' or email = 'emailTwo')"
        );
    }

    #[test]
    fn test_render_and_reparse() {
        let text = "name = 'john' and id > 10 and value is NULL and groups not in (A,B,'C') \
                    and date < tomorrow(+1) and year = years(2017,currentYear())";
        let query = parse(text).unwrap();
        assert_eq!(query.to_string(), text);
        assert_eq!(parse(&query.to_string()).unwrap(), query);
    }

    #[test]
    fn test_nesting_limit() {
        let deepest = format!(
            "{}a = 1{}",
            "(".repeat(MAX_NESTING_DEPTH),
            ")".repeat(MAX_NESTING_DEPTH)
        );
        assert_eq!(
            parse(&deepest).unwrap(),
            Query::and([eq("a", EqType::placeholder("1"))])
        );

        let error = parse(&format!("{}a = 1{}", "(".repeat(20_000), ")".repeat(20_000))).unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::NestingTooDeep);
        assert_eq!(error.error_position, MAX_NESTING_DEPTH);
        assert_eq!(error.context_expression, "(");

        let calls = format!("a = {}1{}", "f(".repeat(20_000), ")".repeat(20_000));
        assert_eq!(parse(&calls).unwrap_err().kind, ParseErrorKind::NestingTooDeep);
    }
}
