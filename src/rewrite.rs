//! Built-in semantic rewrites of single conditions.
//!
//! The raw rewrites return the replacement expression, or `None` when the condition is left as
//! it is. Replacements are translated again, so each rewrite must leave its own output alone.

use crate::ast::{Combinator, Condition, EqType, Expression, Operator, Query};
use crate::value::Value;

/// Arguments with top-level groups flattened, and whether any group was present.
fn members(condition: &Condition) -> (Vec<EqType>, bool) {
    let mut members = Vec::new();
    let mut grouped = false;
    for argument in condition.arguments() {
        match argument {
            EqType::Group(values) => {
                grouped = true;
                members.extend(values.iter().cloned());
            }
            other => members.push(other.clone()),
        }
    }
    (members, grouped)
}

fn combine(combinator: Combinator, mut conditions: Vec<Condition>) -> Expression {
    if conditions.len() == 1 {
        if let Some(condition) = conditions.pop() {
            return Expression::Condition(condition);
        }
    }
    Expression::Query(Query::create(combinator, conditions))
}

/// `tags contains (a, NULL)` becomes `tags contains a or tags is EMPTY`.
/// `NOT_CONTAINS` combines with `and` and `is not EMPTY`.
pub fn expand_contains(condition: &Condition) -> Option<Expression> {
    let (empty, combinator) = match condition.operator() {
        Operator::Contains => (Operator::IsEmpty, Combinator::Or),
        Operator::NotContains => (Operator::IsNotEmpty, Combinator::And),
        _ => return None,
    };

    let (members, grouped) = members(condition);
    match members.as_slice() {
        [] => None,
        [single] if !single.is_null() => grouped.then(|| {
            Expression::Condition(Condition::new(
                condition.property(),
                condition.operator(),
                [single.clone()],
            ))
        }),
        _ => {
            let conditions = members
                .into_iter()
                .map(|member| {
                    if member.is_null() {
                        Condition::unary(condition.property(), empty)
                    } else {
                        Condition::new(condition.property(), condition.operator(), [member])
                    }
                })
                .collect();
            Some(combine(combinator, conditions))
        }
    }
}

/// `city in (a, NULL, b)` becomes `city in (a,b) or city is NULL`.
/// `NOT_IN` combines with `and` and `is not NULL`.
pub fn expand_in_null(condition: &Condition) -> Option<Expression> {
    let (null_check, combinator) = match condition.operator() {
        Operator::In => (Operator::IsNull, Combinator::Or),
        Operator::NotIn => (Operator::IsNotNull, Combinator::And),
        _ => return None,
    };

    let (members, _) = members(condition);
    if !members.iter().any(EqType::is_null) {
        return None;
    }

    let values: Vec<EqType> = members.into_iter().filter(|member| !member.is_null()).collect();
    let mut conditions = Vec::with_capacity(2);
    if !values.is_empty() {
        conditions.push(Condition::new(
            condition.property(),
            condition.operator(),
            [EqType::Group(values)],
        ));
    }
    conditions.push(Condition::unary(condition.property(), null_check));
    Some(combine(combinator, conditions))
}

/// For text properties an empty value is either null or the empty string.
pub fn text_emptiness(condition: &Condition) -> Option<Expression> {
    let property = condition.property();
    let empty = EqType::literal("");
    match condition.operator() {
        Operator::IsEmpty => Some(combine(
            Combinator::Or,
            vec![
                Condition::unary(property, Operator::IsNull),
                Condition::new(property, Operator::Eq, [empty]),
            ],
        )),
        Operator::IsNotEmpty => Some(combine(
            Combinator::And,
            vec![
                Condition::unary(property, Operator::IsNotNull),
                Condition::new(property, Operator::Neq, [empty]),
            ],
        )),
        _ => None,
    }
}

/// `name contains 'x'` on a text property becomes `name like '%x%'`.
pub fn text_contains_to_like(condition: Condition<Value>) -> Condition<Value> {
    let operator = match condition.operator() {
        Operator::Contains => Operator::Like,
        Operator::NotContains => Operator::NotLike,
        _ => return condition,
    };
    match condition.arguments() {
        [Value::Text(text)] => {
            let pattern = format!("%{}%", text.replace('%', "\\%"));
            Condition::new(condition.property(), operator, [Value::Text(pattern)])
        }
        _ => condition,
    }
}
