//! SQL compiler that turns translated query trees into PostgreSQL using sea-query.
//!
//! Property names of the typed tree are used as column names as they are; renaming happens in
//! the translator. Collection properties are expected to be PostgreSQL arrays.

use crate::ast::{Combinator, Condition, Direction, Expression, NullHandling, Operator, Sort};
use crate::config::SchemaConfig;
use crate::value::{TypedQuery, Value};
use sea_query::{
    Asterisk, Condition as SqlCondition, Expr, Func, Iden, NullOrdering, Order as SqlOrder,
    PostgresQueryBuilder, SelectStatement, SimpleExpr, Value as SqlValue,
};
use thiserror::Error;
use tracing::debug;

/// Configuration for SQL optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Minimum number of OR-ed equality checks on one column before converting to an IN clause
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_or_conditions_for_in: 5,
        }
    }
}

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot compile {condition}: {reason}")]
pub struct CompileError {
    pub condition: String,
    pub reason: String,
}

impl CompileError {
    fn new(condition: &Condition<Value>, reason: impl Into<String>) -> Self {
        Self {
            condition: condition.to_string(),
            reason: reason.into(),
        }
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler for the typed query trees of one table
pub struct SqlCompiler {
    table: String,
    config: OptimizationConfig,
}

impl SqlCompiler {
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_config(table, OptimizationConfig::default())
    }

    pub fn with_config(table: impl Into<String>, config: OptimizationConfig) -> Self {
        Self {
            table: table.into(),
            config,
        }
    }

    /// Compiler for the table of a schema configuration
    pub fn for_schema(schema: &SchemaConfig) -> Self {
        Self::new(schema.table.clone())
    }

    /// Compile a typed query into SQL
    pub fn compile(&self, query: &TypedQuery) -> Result<CompileResult, CompileError> {
        let (select, optimizations) = self.select(query)?;
        let sql = select.to_string(PostgresQueryBuilder);
        debug!(sql = %sql, optimizations = optimizations.len(), "compiled query");
        Ok(CompileResult { sql, optimizations })
    }

    /// Build the SELECT statement without rendering it
    pub fn select(
        &self,
        query: &TypedQuery,
    ) -> Result<(SelectStatement, Vec<Optimization>), CompileError> {
        let mut optimizations = Vec::new();

        let mut select = SelectStatement::new();
        select.from(TableName(self.table.clone()));
        select.column(Asterisk);

        if query.has_expressions() {
            let condition = self.compile_query(query, &mut optimizations)?;
            select.cond_where(condition);
        }
        if let Some(sort) = query.sort() {
            self.compile_sort(&mut select, sort);
        }

        Ok((select, optimizations))
    }

    fn compile_query(
        &self,
        query: &TypedQuery,
        optimizations: &mut Vec<Optimization>,
    ) -> Result<SqlCondition, CompileError> {
        if query.combinator() == Combinator::Or {
            if let Some((field, values)) = self.equality_values(query) {
                optimizations.push(Optimization::OrToIn {
                    field: field.to_string(),
                    value_count: values.len(),
                });
                let mut in_values = Vec::with_capacity(values.len());
                for (condition, value) in values {
                    in_values.push(sql_value(condition, value)?);
                }
                let in_expr = Expr::col(ColumnName(field.to_string())).is_in(in_values);
                return Ok(SqlCondition::all().add(in_expr));
            }
        }

        let mut condition = match query.combinator() {
            Combinator::And => SqlCondition::all(),
            Combinator::Or => SqlCondition::any(),
        };
        for expression in query.expressions() {
            condition = match expression {
                Expression::Condition(leaf) => condition.add(self.compile_condition(leaf)?),
                Expression::Query(nested) => condition.add(self.compile_query(nested, optimizations)?),
            };
        }
        Ok(condition)
    }

    /// `a = 1 or a = 2 or ...` on a single column, when long enough to become `a in (1, 2, ...)`.
    fn equality_values<'q>(
        &self,
        query: &'q TypedQuery,
    ) -> Option<(&'q str, Vec<(&'q Condition<Value>, &'q Value)>)> {
        let mut field = None;
        let mut values = Vec::new();
        for expression in query.expressions() {
            let Expression::Condition(condition) = expression else {
                return None;
            };
            let (Operator::Eq, [value]) = (condition.operator(), condition.arguments()) else {
                return None;
            };
            if value.is_null() || matches!(value, Value::List(_)) {
                return None;
            }
            match field {
                None => field = Some(condition.property()),
                Some(existing) if existing != condition.property() => return None,
                Some(_) => {}
            }
            values.push((condition, value));
        }
        let field = field?;
        (values.len() >= self.config.max_or_conditions_for_in).then_some((field, values))
    }

    /// Compile a single condition
    fn compile_condition(&self, condition: &Condition<Value>) -> Result<SimpleExpr, CompileError> {
        let property = condition.property();
        let column = || Expr::col(ColumnName(property.to_string()));

        let expr = match condition.operator() {
            Operator::IsNull => column().is_null(),
            Operator::IsNotNull => column().is_not_null(),
            Operator::IsEmpty => column()
                .is_null()
                .or(Expr::cust_with_expr("cardinality($1) = 0", column())),
            Operator::IsNotEmpty => Expr::cust_with_expr("cardinality($1) > 0", column()),
            Operator::In => column().is_in(list_values(condition)?),
            Operator::NotIn => column().is_not_in(list_values(condition)?),
            Operator::Contains => Expr::cust_with_exprs(
                "$1 = ANY($2)",
                [Expr::val(scalar_value(condition)?).into(), column().into()],
            ),
            Operator::NotContains => Expr::cust_with_exprs(
                "NOT ($1 = ANY($2))",
                [Expr::val(scalar_value(condition)?).into(), column().into()],
            ),
            Operator::Like => column().like(pattern(condition)?),
            Operator::NotLike => column().not_like(pattern(condition)?),
            Operator::LikeIc => {
                Expr::expr(Func::lower(column())).like(pattern(condition)?.to_lowercase())
            }
            Operator::NotLikeIc => {
                Expr::expr(Func::lower(column())).not_like(pattern(condition)?.to_lowercase())
            }
            Operator::Eq if first_is_null(condition) => column().is_null(),
            Operator::Neq if first_is_null(condition) => column().is_not_null(),
            Operator::Eq => column().eq(scalar_value(condition)?),
            Operator::Neq => column().ne(scalar_value(condition)?),
            Operator::Gt => column().gt(scalar_value(condition)?),
            Operator::Ge => column().gte(scalar_value(condition)?),
            Operator::Lt => column().lt(scalar_value(condition)?),
            Operator::Le => column().lte(scalar_value(condition)?),
        };

        Ok(expr)
    }

    fn compile_sort(&self, select: &mut SelectStatement, sort: &Sort) {
        for order in sort.orders() {
            let direction = match order.direction() {
                Direction::Asc => SqlOrder::Asc,
                Direction::Desc => SqlOrder::Desc,
            };
            let column = Expr::col(ColumnName(order.property().to_string()));
            let expr: SimpleExpr = if order.is_ignore_case() {
                Func::lower(column).into()
            } else {
                column.into()
            };
            match order.null_handling() {
                NullHandling::Native => select.order_by_expr(expr, direction),
                NullHandling::NullsFirst => {
                    select.order_by_expr_with_nulls(expr, direction, NullOrdering::First)
                }
                NullHandling::NullsLast => {
                    select.order_by_expr_with_nulls(expr, direction, NullOrdering::Last)
                }
            };
        }
    }
}

fn first_is_null(condition: &Condition<Value>) -> bool {
    condition.first_argument().is_some_and(Value::is_null)
}

/// Convert a typed value to a sea-query Value
fn sql_value(condition: &Condition<Value>, value: &Value) -> Result<SqlValue, CompileError> {
    let converted = match value {
        Value::Null => SqlValue::String(None),
        Value::Text(text) => text.clone().into(),
        Value::Integer(number) => (*number).into(),
        Value::Decimal(number) => (*number).into(),
        Value::Boolean(flag) => (*flag).into(),
        Value::Date(date) => date.format("%Y-%m-%d").to_string().into(),
        Value::DateTime(date_time) => date_time.format("%Y-%m-%d %H:%M:%S%.f").to_string().into(),
        Value::List(_) => return Err(CompileError::new(condition, "nested lists are not supported")),
    };
    Ok(converted)
}

fn scalar_value(condition: &Condition<Value>) -> Result<SqlValue, CompileError> {
    match condition.arguments() {
        [value] => sql_value(condition, value),
        [] => Err(CompileError::new(condition, "missing value")),
        _ => Err(CompileError::new(condition, "expected a single value")),
    }
}

fn list_values(condition: &Condition<Value>) -> Result<Vec<SqlValue>, CompileError> {
    let mut values = Vec::new();
    for argument in condition.arguments() {
        match argument {
            Value::List(members) => {
                for member in members {
                    values.push(sql_value(condition, member)?);
                }
            }
            other => values.push(sql_value(condition, other)?),
        }
    }
    if values.is_empty() {
        return Err(CompileError::new(condition, "missing values"));
    }
    Ok(values)
}

fn pattern(condition: &Condition<Value>) -> Result<String, CompileError> {
    match condition.arguments() {
        [Value::Text(text)] => Ok(text.clone()),
        _ => Err(CompileError::new(condition, "expected a text pattern")),
    }
}
