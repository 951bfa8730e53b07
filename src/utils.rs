//! Helpers for combining and rewriting query trees.

use crate::ast::{Combinator, Condition, Expression, Query, QueryBuilder, RawQuery};
use crate::parser::{parse, ParseError};

/// Anything that can be appended to a query. `None` leaves the query untouched.
pub trait Operand<A> {
    fn into_operand(self) -> Option<Expression<A>>;
}

impl<A> Operand<A> for Condition<A> {
    fn into_operand(self) -> Option<Expression<A>> {
        Some(self.into())
    }
}

impl<A> Operand<A> for Query<A> {
    fn into_operand(self) -> Option<Expression<A>> {
        Some(self.into())
    }
}

impl<A> Operand<A> for Expression<A> {
    fn into_operand(self) -> Option<Expression<A>> {
        Some(self)
    }
}

impl<A, T: Operand<A>> Operand<A> for Option<T> {
    fn into_operand(self) -> Option<Expression<A>> {
        self.and_then(Operand::into_operand)
    }
}

/// `query and other`. A nested query on the right is kept in parentheses.
pub fn and<A>(query: Query<A>, other: impl Operand<A>) -> Query<A> {
    merge(Combinator::And, query, other.into_operand())
}

/// `query or other`. A nested query on the right is kept in parentheses.
pub fn or<A>(query: Query<A>, other: impl Operand<A>) -> Query<A> {
    merge(Combinator::Or, query, other.into_operand())
}

/// Parses `eql` and appends it with `and`.
pub fn and_eql(query: RawQuery, eql: &str) -> Result<RawQuery, ParseError> {
    Ok(and(query, parse(eql)?))
}

/// Parses `eql` and appends it with `or`.
pub fn or_eql(query: RawQuery, eql: &str) -> Result<RawQuery, ParseError> {
    Ok(or(query, parse(eql)?))
}

fn merge<A>(combinator: Combinator, query: Query<A>, other: Option<Expression<A>>) -> Query<A> {
    let Some(other) = other else {
        return query;
    };

    let mut builder = QueryBuilder::new(combinator);
    if let Some(sort) = query.sort() {
        builder.sort(sort.clone());
    }

    if let Expression::Query(right) = &other {
        if !right.has_expressions() {
            // matches everything, at most the sort is taken over
            return match (builder.has_sort(), right.sort()) {
                (false, Some(sort)) => query.with_sort(Some(sort.clone())),
                _ => query,
            };
        }
    }

    if query.combinator() == combinator || query.expressions().len() <= 1 {
        for expression in query.into_expressions() {
            builder.add(expression);
        }
    } else {
        builder.add(query.with_sort(None));
    }
    builder.add(other);
    builder.build()
}

/// Removes parentheses that do not change the meaning of the query.
pub fn simplify<A>(query: Query<A>) -> Query<A> {
    let combinator = query.combinator();
    let mut builder = QueryBuilder::new(combinator);
    if let Some(sort) = query.sort() {
        builder.sort(sort.clone());
    }

    for expression in query.into_expressions() {
        match expression {
            Expression::Query(nested) => {
                let nested = simplify(nested);
                if nested.combinator() == combinator || nested.expressions().len() <= 1 {
                    if let (false, Some(sort)) = (builder.has_sort(), nested.sort()) {
                        builder.sort(sort.clone());
                    }
                    for child in nested.into_expressions() {
                        builder.add(child);
                    }
                } else {
                    builder.add(nested);
                }
            }
            condition => {
                builder.add(condition);
            }
        }
    }
    builder.build()
}

/// Maps the conditions on the given properties, or every condition when `properties` is empty.
/// Conditions mapped to `None` are removed; emptied sub-queries disappear with them.
pub fn translate_conditions<A, F>(query: &Query<A>, mapping: F, properties: &[&str]) -> Query<A>
where
    A: Clone,
    F: Fn(&Condition<A>) -> Option<Expression<A>>,
{
    translate_with(query, &mapping, properties)
}

fn translate_with<A, F>(query: &Query<A>, mapping: &F, properties: &[&str]) -> Query<A>
where
    A: Clone,
    F: Fn(&Condition<A>) -> Option<Expression<A>>,
{
    let mut builder = QueryBuilder::new(query.combinator());
    if let Some(sort) = query.sort() {
        builder.sort(sort.clone());
    }
    for expression in query.expressions() {
        match expression {
            Expression::Condition(condition)
                if properties.is_empty() || properties.iter().any(|p| *p == condition.property()) =>
            {
                if let Some(mapped) = mapping(condition) {
                    builder.add(mapped);
                }
            }
            Expression::Condition(condition) => {
                builder.add(condition.clone());
            }
            Expression::Query(nested) => {
                builder.add(translate_with(nested, mapping, properties));
            }
        }
    }
    builder.build()
}

/// All conditions on `property`, depth first.
pub fn find_conditions_for_property<'q, A>(query: &'q Query<A>, property: &str) -> Vec<&'q Condition<A>> {
    let mut found = Vec::new();
    collect_conditions(query, property, &mut found);
    found
}

fn collect_conditions<'q, A>(query: &'q Query<A>, property: &str, found: &mut Vec<&'q Condition<A>>) {
    for expression in query.expressions() {
        match expression {
            Expression::Condition(condition) if condition.property() == property => {
                found.push(condition)
            }
            Expression::Condition(_) => {}
            Expression::Query(nested) => collect_conditions(nested, property, found),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EqType, Operator, Order, Sort};

    fn query() -> RawQuery {
        parse("id = 1").unwrap()
    }

    fn name_ilike() -> Condition {
        Condition::new("name", Operator::LikeIc, [EqType::literal("john")])
    }

    #[test]
    fn test_append_condition() {
        assert_eq!(and(query(), name_ilike()).to_string(), "id = 1 and name ilike 'john'");
        assert_eq!(or(query(), name_ilike()).to_string(), "id = 1 or name ilike 'john'");
    }

    #[test]
    fn test_append_query() {
        let other = || parse("name ilike 'john' or number <= 3").unwrap();
        assert_eq!(
            and(query(), other()).to_string(),
            "id = 1 and (name ilike 'john' or number <= 3)"
        );
        assert_eq!(
            or(query(), other()).to_string(),
            "id = 1 or (name ilike 'john' or number <= 3)"
        );
    }

    #[test]
    fn test_left_query_is_nested_for_other_combinator() {
        let left = parse("a = 1 and b = 2").unwrap();
        assert_eq!(or(left, name_ilike()).to_string(), "(a = 1 and b = 2) or name ilike 'john'");
    }

    #[test]
    fn test_append_none_leaves_query_untouched() {
        let nothing: Option<Condition> = None;
        assert_eq!(and(query(), nothing.clone()), query());
        assert_eq!(or(query(), nothing), query());
    }

    #[test]
    fn test_match_everything_is_identity() {
        assert_eq!(and(query(), Query::all()), query());
        assert_eq!(or(query(), Query::all()), query());
        assert_eq!(and(Query::all(), query()), query());
    }

    #[test]
    fn test_first_sort_is_kept() {
        let left = parse("a = 1 order by a desc").unwrap();
        let right = parse("b = 2 order by b asc").unwrap();
        let merged = and(left, right);
        assert_eq!(merged.to_string(), "a = 1 and b = 2 order by a DESC");

        let sorted_all: RawQuery = Query::all_sorted(Sort::new([Order::asc("x")]));
        assert_eq!(
            and(query(), sorted_all).to_string(),
            "id = 1 order by x ASC"
        );
    }

    #[test]
    fn test_append_eql() {
        assert_eq!(
            and_eql(query(), "name ilike 'john' or number <= 3").unwrap().to_string(),
            "id = 1 and (name ilike 'john' or number <= 3)"
        );
        assert_eq!(
            or_eql(query(), "name ilike 'john' or number <= 3").unwrap().to_string(),
            "id = 1 or (name ilike 'john' or number <= 3)"
        );
        assert_eq!(and_eql(query(), "").unwrap(), query());
        assert!(or_eql(query(), "name ilike 'john' or number <= ").is_err());
    }

    #[test]
    fn test_simplify() {
        let cases = [
            ("id = 1 and name like 'test'", "id = 1 and name like 'test'"),
            ("id = 1 and (name like 'test')", "id = 1 and name like 'test'"),
            ("(id = 1 and name like 'test')", "id = 1 and name like 'test'"),
            ("(id = 1 or name like 'test')", "id = 1 or name like 'test'"),
            ("(id = 1 and (name like 'test'))", "id = 1 and name like 'test'"),
            (
                "((id = 1 and ((name like 'test')))) order by x asc, y desc",
                "id = 1 and name like 'test' order by x ASC, y DESC",
            ),
            (
                "(id = 1 and (name like 'test' and (city contains X)))",
                "id = 1 and name like 'test' and city contains X",
            ),
            (
                "(id = 1 and (name like 'test' or (city contains X)))",
                "id = 1 and (name like 'test' or city contains X)",
            ),
            (
                "(id = 1 or (name like 'test' and (city contains X or (y = z))))",
                "id = 1 or (name like 'test' and (city contains X or y = z))",
            ),
            (
                "(id = 1 or name like 'test') and (city contains X or y = z)",
                "(id = 1 or name like 'test') and (city contains X or y = z)",
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(simplify(parse(input).unwrap()).to_string(), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_translate_conditions() {
        let query = parse("id = 1 and x = y and (x = z or name contains 'test' or 1 = 2) order by name ASC")
            .unwrap();

        let negated = translate_conditions(
            &query,
            |c| Some(Condition::new(c.property(), Operator::Neq, c.arguments().to_vec()).into()),
            &[],
        );
        assert_eq!(
            negated.to_string(),
            "id != 1 and x != y and (x != z or name != 'test' or 1 != 2) order by name ASC"
        );

        let without_x = translate_conditions(&query, |_| None, &["x"]);
        assert_eq!(
            without_x.to_string(),
            "id = 1 and (name contains 'test' or 1 = 2) order by name ASC"
        );

        let renamed = translate_conditions(
            &query,
            |c| (c.property() != "x").then(|| c.with_property("one").into()),
            &["x", "1"],
        );
        assert_eq!(
            renamed.to_string(),
            "id = 1 and (name contains 'test' or one = 2) order by name ASC"
        );
    }

    #[test]
    fn test_find_conditions_for_property() {
        let query: RawQuery = Query::or([
            Expression::from(Query::and([
                Condition::new("name", Operator::Eq, [EqType::literal("john")]),
                Condition::new("name", Operator::Eq, [EqType::literal("jane")]),
                Condition::new("age", Operator::Eq, [EqType::literal("19")]),
            ])),
            Condition::new("name", Operator::Like, [EqType::literal("jean-pierre")]).into(),
        ]);

        let found: Vec<_> = find_conditions_for_property(&query, "name")
            .into_iter()
            .filter_map(|condition| condition.first_argument().and_then(EqType::as_text))
            .collect();
        assert_eq!(found, vec!["john", "jane", "jean-pierre"]);
        assert!(find_conditions_for_property(&query, "milk").is_empty());
    }
}
