//! Filter and ordering DSL compiled into parameterized SQL fragments.
//!
//! A [`Where`] is read from JSON shaped like
//! `{ "field": { "operator": value, ... }, ... }`:
//!
//! ```ignore
//! let filter = Where::try_from(json!({
//!     "title": { "like": "%foo%" },
//!     "ownerId": { "in": [1, 2] },
//!     "deletedAt": { "eq": null }
//! }))?;
//! ```
//!
//! Every entry becomes one predicate; predicates are combined with `AND`.

use crate::error::{MapperError, MapperResult};
use crate::ident::Ident;
use crate::model::{Field, FieldModel};
use crate::naming::NameTranslator;
use crate::sql::{Sql, TrustedLiteral};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    In,
    Nin,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::In,
        Operator::Nin,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Like,
    ];

    /// Name used in filter documents.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Like => "like",
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::In => "IN",
            Operator::Nin => "NOT IN",
            Operator::Neq => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
        }
    }
}

impl From<Operator> for TrustedLiteral {
    fn from(op: Operator) -> Self {
        TrustedLiteral::new(op.sql())
    }
}

impl FromStr for Operator {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| MapperError::UnsupportedOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl From<Direction> for TrustedLiteral {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => TrustedLiteral::new("ASC"),
            Direction::Desc => TrustedLiteral::new("DESC"),
        }
    }
}

impl FromStr for Direction {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Desc)
        } else {
            Err(MapperError::validation(format!(
                "invalid sort direction `{s}`, expected asc or desc"
            )))
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One `field operator value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

/// An ordered list of predicates, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    predicates: Vec<Predicate>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate.
    pub fn and(mut self, field: impl Into<String>, operator: Operator, value: Value) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            operator,
            value,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.and(field, Operator::Eq, value)
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

impl TryFrom<Value> for Where {
    type Error = MapperError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let object = match value {
            Value::Null => return Ok(Where::new()),
            Value::Object(object) => object,
            other => {
                return Err(MapperError::validation(format!(
                    "`where` must be an object, got {other}"
                )));
            }
        };

        let mut filter = Where::new();
        for (field, conditions) in object {
            let Value::Object(conditions) = conditions else {
                return Err(MapperError::validation(format!(
                    "conditions for `{field}` must be an object of operators"
                )));
            };
            for (operator, value) in conditions {
                filter = filter.and(field.clone(), operator.parse()?, value);
            }
        }
        Ok(filter)
    }
}

impl<'de> Deserialize<'de> for Where {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Where::try_from(value).map_err(de::Error::custom)
    }
}

/// One ordering entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Compiled predicates and ordering entries for one call.
#[derive(Debug, Default)]
pub struct Criteria {
    pub predicates: Vec<Sql>,
    pub order_by: Vec<Sql>,
}

impl Criteria {
    /// Compile a filter and an ordering against a table's fields.
    pub fn compile(
        naming: &NameTranslator,
        model: &FieldModel,
        filter: &Where,
        order_by: &[OrderBy],
    ) -> MapperResult<Self> {
        Ok(Self {
            predicates: compile_where(naming, model, filter)?,
            order_by: compile_order_by(naming, order_by)?,
        })
    }
}

/// Compile each predicate into a fragment. Names are resolved strictly.
pub fn compile_where(
    naming: &NameTranslator,
    model: &FieldModel,
    filter: &Where,
) -> MapperResult<Vec<Sql>> {
    filter
        .predicates()
        .iter()
        .map(|p| {
            let storage = naming.resolve(&p.field)?;
            let field = model
                .get(storage)
                .ok_or_else(|| MapperError::UnknownField(p.field.clone()))?;
            compile_predicate(field, p.operator, &p.value)
        })
        .collect()
}

pub fn compile_order_by(naming: &NameTranslator, order_by: &[OrderBy]) -> MapperResult<Vec<Sql>> {
    order_by
        .iter()
        .map(|o| {
            let column = Ident::column(naming.resolve(&o.field)?)?;
            let mut sql = Sql::empty();
            sql.push_ident_ref(&column)
                .push(" ")
                .push_trusted(o.direction);
            Ok(sql)
        })
        .collect()
}

fn compile_predicate(field: &Field, operator: Operator, value: &Value) -> MapperResult<Sql> {
    let column = Ident::column(field.name())?;
    let mut sql = Sql::empty();
    match (operator, value) {
        (Operator::Eq, Value::Null) => {
            sql.push_ident_ref(&column).push(" IS NULL");
        }
        (Operator::Neq, Value::Null) => {
            sql.push_ident_ref(&column).push(" IS NOT NULL");
        }
        // An empty list matches nothing, so excluding it matches everything.
        (Operator::In, Value::Array(items)) if items.is_empty() => {
            sql.push("FALSE");
        }
        (Operator::Nin, Value::Array(items)) if items.is_empty() => {
            sql.push("TRUE");
        }
        (Operator::Like, value) => {
            if field.is_text() {
                sql.push_ident_ref(&column);
            } else {
                sql.push("TRIM(CAST(")
                    .push_ident_ref(&column)
                    .push(" AS CHAR(64)))");
            }
            sql.push(" ")
                .push_trusted(Operator::Like)
                .push(" ")
                .push_value(value.clone());
        }
        (operator, value) => {
            sql.push_ident_ref(&column)
                .push(" ")
                .push_trusted(operator)
                .push(" ")
                .push_sql(compile_value(field, value)?);
        }
    }
    Ok(sql)
}

fn compile_value(field: &Field, value: &Value) -> MapperResult<Sql> {
    let mut sql = Sql::empty();
    match value {
        Value::Array(items) if items.is_empty() => {
            sql.push("(NULL)");
        }
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| compile_value(field, item))
                .collect::<MapperResult<Vec<_>>>()?;
            sql.push("(").push_sql(Sql::join(items, ", ")).push(")");
        }
        value if field.is_fixed_numeric() => {
            sql.push_value(coerce_number(field, value)?);
        }
        value => {
            sql.push_value(value.clone());
        }
    }
    Ok(sql)
}

fn coerce_number(field: &Field, value: &Value) -> MapperResult<Value> {
    match value {
        Value::Null | Value::Number(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Value::from(n));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| {
                    MapperError::validation(format!(
                        "`{s}` is not a number (field {})",
                        field.external_name()
                    ))
                })
        }
        other => Err(MapperError::validation(format!(
            "cannot compare {} with {other}",
            field.external_name()
        ))),
    }
}
