//! 查询树：叶子值、运算符、条件、组合查询与排序

use serde::{Deserialize, Serialize};
use std::fmt;

/// 分组与函数调用允许的最大嵌套层数
pub const MAX_NESTING_DEPTH: usize = 256;

/// 解析得到的原始叶子值
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqType {
    /// 未解析的裸值，例如数字、标识符
    Placeholder(String),
    /// 引号包围的字符串字面量（不含引号，已反转义）
    Literal(String),
    /// 括号包围的值列表
    Group(Vec<EqType>),
    /// 函数调用，例如 `currentUser()`
    FunctionCall { name: String, arguments: Vec<EqType> },
}

impl EqType {
    pub fn placeholder(raw: impl Into<String>) -> Self {
        EqType::Placeholder(raw.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        EqType::Literal(value.into())
    }

    pub fn group(values: impl IntoIterator<Item = EqType>) -> Self {
        EqType::Group(values.into_iter().collect())
    }

    pub fn function(name: impl Into<String>, arguments: impl IntoIterator<Item = EqType>) -> Self {
        EqType::FunctionCall {
            name: name.into(),
            arguments: arguments.into_iter().collect(),
        }
    }

    /// 代表 NULL 的占位符
    pub fn null() -> Self {
        EqType::Placeholder("NULL".to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EqType::Placeholder(raw) if raw.eq_ignore_ascii_case("null"))
    }

    /// 占位符与字面量的纯文本形式
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EqType::Placeholder(raw) | EqType::Literal(raw) => Some(raw),
            EqType::Group(_) | EqType::FunctionCall { .. } => None,
        }
    }
}

/// 条件参数需要的能力：渲染、比较、识别分组
pub trait Argument: Clone + PartialEq + fmt::Display {
    fn is_group(&self) -> bool;
}

impl Argument for EqType {
    fn is_group(&self) -> bool {
        matches!(self, EqType::Group(_))
    }
}

impl fmt::Display for EqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EqType::Placeholder(raw) => f.write_str(raw),
            EqType::Literal(value) => f.write_str(&quote(value)),
            EqType::Group(values) => write!(f, "({})", join(values, ",")),
            EqType::FunctionCall { name, arguments } => {
                write!(f, "{}({})", name, join(arguments, ","))
            }
        }
    }
}

/// 渲染为单引号字面量，转义 `\` 与 `'`
pub(crate) fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

/// 条件运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Neq,
    Contains,
    NotContains,
    In,
    NotIn,
    Like,
    LikeIc,
    NotLike,
    NotLikeIc,
    Gt,
    Ge,
    Lt,
    Le,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    /// 按解析时的匹配优先级排列
    pub const ALL: [Operator; 18] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Contains,
        Operator::NotContains,
        Operator::In,
        Operator::NotIn,
        Operator::Like,
        Operator::LikeIc,
        Operator::NotLike,
        Operator::NotLikeIc,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
    ];

    /// 该运算符可接受的文本形式，第一个为规范形式
    pub fn tokens(&self) -> &'static [&'static str] {
        match self {
            Operator::Eq => &["="],
            Operator::Neq => &["!=", "<>"],
            Operator::Contains => &["contains"],
            Operator::NotContains => &["not contains"],
            Operator::In => &["in"],
            Operator::NotIn => &["not in"],
            Operator::Like => &["like"],
            Operator::LikeIc => &["ilike"],
            Operator::NotLike => &["not like"],
            Operator::NotLikeIc => &["not ilike"],
            Operator::Gt => &[">"],
            Operator::Ge => &[">="],
            Operator::Lt => &["<"],
            Operator::Le => &["<="],
            Operator::IsNull | Operator::IsEmpty => &["is"],
            Operator::IsNotNull | Operator::IsNotEmpty => &["is not"],
        }
    }

    pub fn token(&self) -> &'static str {
        self.tokens()[0]
    }

    /// 根据文本查找运算符（大小写不敏感），多个候选时取第一个
    pub fn for_token(token: &str) -> Option<Operator> {
        let token = token.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.tokens().contains(&token.as_str()))
    }

    /// IS [NOT] NULL / IS [NOT] EMPTY 不带参数
    pub fn is_null_check(&self) -> bool {
        matches!(
            self,
            Operator::IsNull | Operator::IsNotNull | Operator::IsEmpty | Operator::IsNotEmpty
        )
    }

    pub fn is_multi_value(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// 取反的运算符：`=` 与 `!=`、`in` 与 `not in`、`is NULL` 与 `is not NULL`。
    /// 比较运算符取镜像，`>` 与 `<`、`>=` 与 `<=`
    pub fn reverse(&self) -> Operator {
        match self {
            Operator::Eq => Operator::Neq,
            Operator::Neq => Operator::Eq,
            Operator::Contains => Operator::NotContains,
            Operator::NotContains => Operator::Contains,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::Like => Operator::NotLike,
            Operator::NotLike => Operator::Like,
            Operator::LikeIc => Operator::NotLikeIc,
            Operator::NotLikeIc => Operator::LikeIc,
            Operator::Gt => Operator::Lt,
            Operator::Lt => Operator::Gt,
            Operator::Ge => Operator::Le,
            Operator::Le => Operator::Ge,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
            Operator::IsEmpty => Operator::IsNotEmpty,
            Operator::IsNotEmpty => Operator::IsEmpty,
        }
    }

    pub fn is_negation(&self) -> bool {
        matches!(
            self,
            Operator::Neq
                | Operator::NotContains
                | Operator::NotIn
                | Operator::NotLike
                | Operator::NotLikeIc
                | Operator::IsNotNull
                | Operator::IsNotEmpty
        )
    }

    /// 接受多个值时对应的运算符，例如 `=` 对应 `in`
    pub fn resolve_multi_value(&self) -> Option<Operator> {
        match self {
            Operator::Eq => Some(Operator::In),
            Operator::Neq => Some(Operator::NotIn),
            Operator::Contains | Operator::NotContains | Operator::In | Operator::NotIn => Some(*self),
            _ => None,
        }
    }

    /// 缺少值时用于错误提示的渲染，例如 `name = `
    pub fn describe_missing(&self, property: &str) -> String {
        format!("{} {} ", property, self.token())
    }
}

/// 组合运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn keyword(&self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }

    pub fn reverse(&self) -> Combinator {
        match self {
            Combinator::And => Combinator::Or,
            Combinator::Or => Combinator::And,
        }
    }

    fn separator(&self) -> &'static str {
        match self {
            Combinator::And => " and ",
            Combinator::Or => " or ",
        }
    }
}

/// 查询树的叶子：`property operator arguments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition<A = EqType> {
    property: String,
    operator: Operator,
    arguments: Vec<A>,
}

impl<A> Condition<A> {
    pub fn new(
        property: impl Into<String>,
        operator: Operator,
        arguments: impl IntoIterator<Item = A>,
    ) -> Self {
        Self {
            property: property.into(),
            operator,
            arguments: arguments.into_iter().collect(),
        }
    }

    /// 不带参数的条件，例如 `name is NULL`
    pub fn unary(property: impl Into<String>, operator: Operator) -> Self {
        Self::new(property, operator, Vec::new())
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn arguments(&self) -> &[A] {
        &self.arguments
    }

    pub fn first_argument(&self) -> Option<&A> {
        self.arguments.first()
    }

    pub fn has_arguments(&self) -> bool {
        !self.arguments.is_empty()
    }

    pub fn into_arguments(self) -> Vec<A> {
        self.arguments
    }
}

impl<A: Clone> Condition<A> {
    pub fn with_property(&self, property: impl Into<String>) -> Self {
        Self::new(property, self.operator, self.arguments.iter().cloned())
    }

    pub fn with_operator(&self, operator: Operator) -> Self {
        Self::new(self.property.clone(), operator, self.arguments.iter().cloned())
    }
}

impl<A: Argument> fmt::Display for Condition<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let property = &self.property;
        match self.operator {
            Operator::IsNull => write!(f, "{} is NULL", property),
            Operator::IsNotNull => write!(f, "{} is not NULL", property),
            Operator::IsEmpty => write!(f, "{} is EMPTY", property),
            Operator::IsNotEmpty => write!(f, "{} is not EMPTY", property),
            Operator::In | Operator::NotIn => match self.arguments.as_slice() {
                [single] if single.is_group() => {
                    write!(f, "{} {} {}", property, self.operator.token(), single)
                }
                arguments => write!(
                    f,
                    "{} {} ({})",
                    property,
                    self.operator.token(),
                    join(arguments, ",")
                ),
            },
            operator => match self.arguments.first() {
                Some(argument) => write!(f, "{} {} {}", property, operator.token(), argument),
                None => write!(f, "{} {} NULL", property, operator.token()),
            },
        }
    }
}

/// 查询树节点：条件或嵌套查询
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression<A = EqType> {
    Condition(Condition<A>),
    Query(Query<A>),
}

impl<A> From<Condition<A>> for Expression<A> {
    fn from(condition: Condition<A>) -> Self {
        Expression::Condition(condition)
    }
}

impl<A> From<Query<A>> for Expression<A> {
    fn from(query: Query<A>) -> Self {
        Expression::Query(query)
    }
}

impl<A: Argument> fmt::Display for Expression<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Condition(condition) => condition.fmt(f),
            Expression::Query(query) => query.render(f, true),
        }
    }
}

/// AND/OR 组合查询，带可选排序。没有子节点也没有排序时匹配所有记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query<A = EqType> {
    combinator: Combinator,
    expressions: Vec<Expression<A>>,
    sort: Option<Sort>,
}

/// 解析器产出的未翻译查询
pub type RawQuery = Query<EqType>;

impl<A> Query<A> {
    /// 匹配所有记录的查询
    pub fn all() -> Self {
        QueryBuilder::new(Combinator::And).build()
    }

    /// 匹配所有记录，仅排序
    pub fn all_sorted(sort: Sort) -> Self {
        let mut builder = QueryBuilder::new(Combinator::And);
        builder.sort(sort);
        builder.build()
    }

    pub fn and<I>(expressions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expression<A>>,
    {
        Self::create(Combinator::And, expressions)
    }

    pub fn or<I>(expressions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expression<A>>,
    {
        Self::create(Combinator::Or, expressions)
    }

    /// 与 `and` 相同，但忽略 `None`
    pub fn and_all(expressions: impl IntoIterator<Item = Option<Expression<A>>>) -> Self {
        Self::create(Combinator::And, expressions.into_iter().flatten())
    }

    /// 与 `or` 相同，但忽略 `None`
    pub fn or_all(expressions: impl IntoIterator<Item = Option<Expression<A>>>) -> Self {
        Self::create(Combinator::Or, expressions.into_iter().flatten())
    }

    pub fn create<I>(combinator: Combinator, expressions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expression<A>>,
    {
        let mut builder = QueryBuilder::new(combinator);
        for expression in expressions {
            builder.add(expression);
        }
        builder.build()
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn expressions(&self) -> &[Expression<A>] {
        &self.expressions
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn has_expressions(&self) -> bool {
        !self.expressions.is_empty()
    }

    /// 没有任何过滤条件与排序
    pub fn matches_all(&self) -> bool {
        self.expressions.is_empty() && self.sort.is_none()
    }

    /// 返回替换了排序的新查询
    pub fn with_sort(self, sort: Option<Sort>) -> Self {
        Self { sort, ..self }
    }

    /// 取出子节点，丢弃组合方式与排序
    pub fn into_expressions(self) -> Vec<Expression<A>> {
        self.expressions
    }

    /// 拆分为可继续追加的构建器
    pub fn into_builder(self) -> QueryBuilder<A> {
        QueryBuilder {
            combinator: self.combinator,
            expressions: self.expressions,
            sort: self.sort,
        }
    }
}

impl<A: Argument> fmt::Display for Query<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, false)
    }
}

/// 渲染时待输出的片段
enum Piece<'q, A> {
    Text(&'static str),
    Sort(&'q Sort),
    Condition(&'q Condition<A>),
    Query(&'q Query<A>, bool),
}

impl<A: Argument> Query<A> {
    /// 使用显式栈渲染，嵌套层数不受调用栈限制
    fn render(&self, f: &mut fmt::Formatter<'_>, nested: bool) -> fmt::Result {
        let mut stack = vec![Piece::Query(self, nested)];
        while let Some(piece) = stack.pop() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Sort(sort) => fmt::Display::fmt(sort, f)?,
                Piece::Condition(condition) => fmt::Display::fmt(condition, f)?,
                Piece::Query(query, nested) => query.push_pieces(&mut stack, nested),
            }
        }
        Ok(())
    }

    /// 按输出的逆序压栈
    fn push_pieces<'q>(&'q self, stack: &mut Vec<Piece<'q, A>>, nested: bool) {
        if nested {
            stack.push(Piece::Text(")"));
        }
        if let Some(sort) = self.sort.as_ref().filter(|sort| !sort.is_empty()) {
            stack.push(Piece::Sort(sort));
            if !self.expressions.is_empty() {
                stack.push(Piece::Text(" "));
            }
        }
        for (index, expression) in self.expressions.iter().enumerate().rev() {
            stack.push(match expression {
                Expression::Condition(condition) => Piece::Condition(condition),
                Expression::Query(query) => Piece::Query(query, true),
            });
            if index > 0 {
                stack.push(Piece::Text(self.combinator.separator()));
            }
        }
        if nested {
            stack.push(Piece::Text("("));
        }
    }
}

/// 查询构建阶段，`build` 之后得到不可变的 [`Query`]
#[derive(Debug, Clone)]
pub struct QueryBuilder<A = EqType> {
    combinator: Combinator,
    expressions: Vec<Expression<A>>,
    sort: Option<Sort>,
}

impl<A> QueryBuilder<A> {
    pub fn new(combinator: Combinator) -> Self {
        Self {
            combinator,
            expressions: Vec::new(),
            sort: None,
        }
    }

    /// 追加子节点：
    /// 嵌套查询的排序在构建器尚无排序时上移；空查询被丢弃；只有一个子节点的查询被展开。
    pub fn add(&mut self, expression: impl Into<Expression<A>>) -> &mut Self {
        match expression.into() {
            Expression::Query(mut query) => {
                if let Some(sort) = query.sort.take() {
                    if self.sort.is_none() {
                        self.sort = Some(sort);
                    }
                }
                if query.expressions.len() == 1 {
                    self.expressions.append(&mut query.expressions);
                } else if !query.expressions.is_empty() {
                    self.expressions.push(Expression::Query(query));
                }
            }
            condition => self.expressions.push(condition),
        }
        self
    }

    pub fn sort(&mut self, sort: Sort) -> &mut Self {
        self.sort = Some(sort);
        self
    }

    pub fn has_sort(&self) -> bool {
        self.sort.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// 唯一的子节点是嵌套查询时，直接采用该查询的组合方式
    pub fn build(mut self) -> Query<A> {
        if let [Expression::Query(_)] = self.expressions.as_slice() {
            if let Some(Expression::Query(inner)) = self.expressions.pop() {
                return Query {
                    combinator: inner.combinator,
                    expressions: inner.expressions,
                    sort: self.sort,
                };
            }
        }
        Query {
            combinator: self.combinator,
            expressions: self.expressions,
            sort: self.sort,
        }
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// `asc` / `desc`，大小写不敏感
    pub fn parse(text: &str) -> Option<Direction> {
        if text.eq_ignore_ascii_case("asc") {
            Some(Direction::Asc)
        } else if text.eq_ignore_ascii_case("desc") {
            Some(Direction::Desc)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

/// 空值的排序位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullHandling {
    /// 由数据存储决定
    #[default]
    Native,
    NullsFirst,
    NullsLast,
}

/// 单个排序键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    property: String,
    direction: Direction,
    #[serde(default)]
    null_handling: NullHandling,
    #[serde(default)]
    ignore_case: bool,
}

impl Order {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
            null_handling: NullHandling::Native,
            ignore_case: false,
        }
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Asc)
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Desc)
    }

    pub fn with_null_handling(self, null_handling: NullHandling) -> Self {
        Self {
            null_handling,
            ..self
        }
    }

    pub fn ignoring_case(self) -> Self {
        Self {
            ignore_case: true,
            ..self
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn null_handling(&self) -> NullHandling {
        self.null_handling
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.property, self.direction)
    }
}

/// 排序规则，按顺序应用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn new(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order by {}", join(&self.orders, ", "))
    }
}
