//! Parameter-safe statement builder.
//!
//! [`Sql`] stores SQL text and bound values separately and numbers the
//! `$1, $2, ...` placeholders when the statement is rendered, so fragments can be
//! built independently (a predicate, an ORDER BY entry) and composed later
//! without tracking indices.
//!
//! Text reaches a statement in three ways only:
//! - static SQL written in code ([`Sql::push`]),
//! - validated identifiers ([`Sql::push_ident_ref`]),
//! - [`TrustedLiteral`]s, which can only be produced from closed enumerations
//!   such as [`Operator`](crate::criteria::Operator) and
//!   [`Direction`](crate::criteria::Direction).
//!
//! Everything a caller supplies is bound as a parameter.
//!
//! # Example
//!
//! ```ignore
//! use pgmapper::{Ident, Sql};
//!
//! let mut q = Sql::new("SELECT ");
//! q.push_ident_ref(&Ident::column("title")?)
//!     .push(" FROM ")
//!     .push_ident_ref(&Ident::table(None, "pages")?)
//!     .push(" WHERE ")
//!     .push_ident_ref(&Ident::column("id")?)
//!     .push(" = ")
//!     .push_bind(1_i64);
//! assert_eq!(q.to_sql(), r#"SELECT "title" FROM "pages" WHERE "id" = $1"#);
//! ```

use crate::error::{MapperError, MapperResult};
use crate::ident::Ident;
use crate::value::JsonParam;
use serde_json::Value;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

#[derive(Debug)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A SQL keyword or operator that is allowed into statement text verbatim.
///
/// There is no public constructor: values come from closed enumerations through
/// their `From` impls, never from caller-controlled strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedLiteral(&'static str);

impl TrustedLiteral {
    pub(crate) const fn new(literal: &'static str) -> Self {
        Self(literal)
    }

    /// The literal text.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// A parameter-safe dynamic SQL builder.
#[must_use]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<Arc<dyn ToSql + Sync + Send>>,
}

impl std::fmt::Debug for Sql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sql")
            .field("sql", &self.to_sql())
            .field("params", &self.params.len())
            .finish()
    }
}

impl Sql {
    /// Create a new builder with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            params: Vec::new(),
        }
    }

    /// Create an empty builder.
    pub fn empty() -> Self {
        Self {
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Whether nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, SqlPart::Raw(s) if s.is_empty()))
    }

    /// Append raw SQL (no parameters).
    ///
    /// Intended for statement skeletons written in code. Caller-supplied text
    /// belongs in [`Sql::push_bind`] / [`Sql::push_value`].
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a trusted keyword/operator.
    pub fn push_trusted(&mut self, literal: impl Into<TrustedLiteral>) -> &mut Self {
        self.push(literal.into().as_str())
    }

    /// Append a parameter placeholder and bind its value.
    pub fn push_bind<T>(&mut self, value: T) -> &mut Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.parts.push(SqlPart::Param);
        self.params.push(Arc::new(value));
        self
    }

    /// Append a placeholder bound to a dynamic JSON value.
    ///
    /// The value is encoded according to the parameter type Postgres infers for
    /// the placeholder (see [`JsonParam`]).
    pub fn push_value(&mut self, value: Value) -> &mut Self {
        self.push_bind(JsonParam(value))
    }

    /// Append another `Sql` fragment, consuming it.
    pub fn push_sql(&mut self, mut other: Sql) -> &mut Self {
        self.parts.append(&mut other.parts);
        self.params.append(&mut other.params);
        self
    }

    /// Append a pre-validated [`Ident`].
    pub fn push_ident_ref(&mut self, ident: &Ident) -> &mut Self {
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => ident.write_sql(last),
            _ => {
                let mut s = String::new();
                ident.write_sql(&mut s);
                self.parts.push(SqlPart::Raw(s));
            }
        }
        self
    }

    /// Append identifiers separated by `, `.
    pub fn push_ident_list(&mut self, idents: &[Ident]) -> &mut Self {
        for (i, ident) in idents.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_ident_ref(ident);
        }
        self
    }

    /// Join fragments with a static separator.
    pub fn join(fragments: impl IntoIterator<Item = Sql>, separator: &str) -> Sql {
        let mut out = Sql::empty();
        for (i, fragment) in fragments.into_iter().enumerate() {
            if i > 0 {
                out.push(separator);
            }
            out.push_sql(fragment);
        }
        out
    }

    /// Append ` WHERE p1 AND p2 ...`; nothing when `predicates` is empty.
    pub fn push_where_and(&mut self, predicates: Vec<Sql>) -> &mut Self {
        if predicates.is_empty() {
            return self;
        }
        self.push(" WHERE ");
        self.push_sql(Sql::join(predicates, " AND "))
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        use std::fmt::Write;

        let cap = self
            .parts
            .iter()
            .map(|p| match p {
                SqlPart::Raw(s) => s.len(),
                SqlPart::Param => 3,
            })
            .sum();
        let mut out = String::with_capacity(cap);
        let mut idx: usize = 0;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    let _ = write!(&mut out, "${idx}");
                }
            }
        }
        out
    }

    /// Number of bound parameters.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }

    /// Check that every placeholder has exactly one bound value.
    pub fn validate(&self) -> MapperResult<()> {
        let placeholder_count = self
            .parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Param))
            .count();

        if placeholder_count != self.params.len() {
            let params_len = self.params.len();
            return Err(MapperError::Validation(format!(
                "Sql: placeholders({placeholder_count}) != params({params_len})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
