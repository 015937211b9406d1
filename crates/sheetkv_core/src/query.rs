//! Query evaluation.
//!
//! A [`Query`] is an AND of [`Condition`]s plus offset/limit pagination.
//! Evaluation is a linear scan; there are no indexes.
//!
//! Comparison rules:
//! - a missing column is null; only `==`/`!=` against [`Operand::Null`]
//!   can match it
//! - equality is numeric when both sides are numeric, otherwise it compares
//!   the string forms
//! - ordering operators and `between` need numeric operands and are false
//!   otherwise

use crate::error::{SheetKvError, SheetKvResult};
use crate::record::Record;
use crate::value::Value;
use std::fmt;

/// Comparison operator of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `in`: the operand is a list of candidates.
    In,
    /// `between`: the operand is an inclusive `[min, max]` pair.
    Between,
    /// Anything else. Never matches and fails validation.
    Unknown(String),
}

impl Operator {
    /// Parses an operator token.
    pub fn parse(token: &str) -> Self {
        match token {
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "in" => Operator::In,
            "between" => Operator::Between,
            other => Operator::Unknown(other.to_string()),
        }
    }

    /// Token form of the operator.
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::In => "in",
            Operator::Between => "between",
            Operator::Unknown(token) => token,
        }
    }
}

impl From<&str> for Operator {
    fn from(token: &str) -> Self {
        Operator::parse(token)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Matches a missing column under `==`.
    Null,
    /// A single value.
    Scalar(Value),
    /// Candidates for `in`, or bounds for `between`.
    List(Vec<Operand>),
}

impl Operand {
    /// Builds a list operand from anything convertible to values.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Operand::List(
            items
                .into_iter()
                .map(|v| Operand::Scalar(v.into()))
                .collect(),
        )
    }

    /// Builds a `[min, max]` bound for `between`.
    pub fn range(min: impl Into<Value>, max: impl Into<Value>) -> Self {
        Operand::List(vec![
            Operand::Scalar(min.into()),
            Operand::Scalar(max.into()),
        ])
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Scalar(v) => v.as_f64(),
            _ => None,
        }
    }
}

macro_rules! scalar_operand_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_operand_from!(Value, &str, String, i64, i32, f64, bool);

/// A single `column operator operand` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name.
    pub column: String,
    /// Operator.
    pub operator: Operator,
    /// Comparison value.
    pub value: Operand,
}

impl Condition {
    /// Creates a condition.
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<Operator>,
        value: impl Into<Operand>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Evaluates the condition against a record.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.column);
        match &self.operator {
            Operator::Eq => equals(actual, &self.value),
            Operator::Ne => !equals(actual, &self.value),
            Operator::Gt => ordered(actual, &self.value, |a, b| a > b),
            Operator::Ge => ordered(actual, &self.value, |a, b| a >= b),
            Operator::Lt => ordered(actual, &self.value, |a, b| a < b),
            Operator::Le => ordered(actual, &self.value, |a, b| a <= b),
            Operator::In => match &self.value {
                Operand::List(items) => items.iter().any(|item| equals(actual, item)),
                _ => false,
            },
            Operator::Between => match &self.value {
                Operand::List(bounds) if bounds.len() == 2 => {
                    match (
                        actual.and_then(Value::as_f64),
                        bounds[0].as_number(),
                        bounds[1].as_number(),
                    ) {
                        (Some(v), Some(min), Some(max)) => v >= min && v <= max,
                        _ => false,
                    }
                }
                _ => false,
            },
            Operator::Unknown(_) => false,
        }
    }
}

/// Conditions combined with AND, plus pagination.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// Conditions, all of which must match.
    pub conditions: Vec<Condition>,
    /// Maximum number of results; `<= 0` means unlimited.
    pub limit: i64,
    /// Number of matching records to skip before `limit` applies.
    pub offset: i64,
}

impl Query {
    /// Creates a query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn filter(
        mut self,
        column: impl Into<String>,
        operator: impl Into<Operator>,
        value: impl Into<Operand>,
    ) -> Self {
        self.conditions.push(Condition::new(column, operator, value));
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

fn equals(actual: Option<&Value>, expected: &Operand) -> bool {
    match (actual, expected) {
        (None, Operand::Null) => true,
        (None, _) | (Some(_), Operand::Null) => false,
        (Some(_), Operand::List(_)) => false,
        (Some(a), Operand::Scalar(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.to_text() == b.to_text(),
        },
    }
}

fn ordered(actual: Option<&Value>, expected: &Operand, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.and_then(Value::as_f64), expected.as_number()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Returns true if the record satisfies every condition of the query.
pub fn matches_query(record: &Record, query: &Query) -> bool {
    query.conditions.iter().all(|c| c.matches(record))
}

/// Filters and paginates records, preserving their order.
pub fn apply_query(records: Vec<Record>, query: &Query) -> Vec<Record> {
    let offset = usize::try_from(query.offset.max(0)).unwrap_or(usize::MAX);
    let matching = records
        .into_iter()
        .filter(|r| matches_query(r, query))
        .skip(offset);

    match usize::try_from(query.limit) {
        Ok(limit) if limit > 0 => matching.take(limit).collect(),
        _ => matching.collect(),
    }
}

/// Checks the query structure before evaluation.
pub fn validate_query(query: &Query) -> SheetKvResult<()> {
    for (i, cond) in query.conditions.iter().enumerate() {
        match (&cond.operator, &cond.value) {
            (Operator::Unknown(token), _) => {
                return Err(SheetKvError::invalid_query(format!(
                    "invalid operator '{token}' in condition {i}"
                )));
            }
            (Operator::In, Operand::List(_)) => {}
            (Operator::In, _) => {
                return Err(SheetKvError::invalid_query(format!(
                    "operator 'in' requires a list value in condition {i}"
                )));
            }
            (Operator::Between, Operand::List(bounds)) if bounds.len() == 2 => {}
            (Operator::Between, _) => {
                return Err(SheetKvError::invalid_query(format!(
                    "operator 'between' requires a list with 2 elements in condition {i}"
                )));
            }
            _ => {}
        }

        if cond.column.is_empty() {
            return Err(SheetKvError::invalid_query(format!(
                "empty column name in condition {i}"
            )));
        }
    }

    if query.limit < 0 {
        return Err(SheetKvError::invalid_query("limit must be non-negative"));
    }
    if query.offset < 0 {
        return Err(SheetKvError::invalid_query("offset must be non-negative"));
    }

    Ok(())
}
