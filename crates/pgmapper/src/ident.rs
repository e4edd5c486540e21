//! Safe SQL identifier handling.
//!
//! Column and table names reach the mapper from schema introspection, so they
//! can contain anything Postgres accepts. [`Ident`] always renders them quoted,
//! escaping embedded `"` as `""`.
//!
//! # Example
//! ```ignore
//! use pgmapper::Ident;
//!
//! let col = Ident::column("updated_at")?;
//! assert_eq!(col.to_sql(), r#""updated_at""#);
//!
//! let table = Ident::table(Some("public"), "pages")?;
//! assert_eq!(table.to_sql(), r#""public"."pages""#);
//! # Ok::<(), pgmapper::MapperError>(())
//! ```

use crate::error::{MapperError, MapperResult};

/// A SQL identifier (column, table, or schema-qualified table).
///
/// Every part is emitted as a quoted identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<String>,
}

fn check_part(name: &str) -> MapperResult<()> {
    if name.is_empty() {
        return Err(MapperError::validation("Identifier cannot be empty"));
    }
    if name.contains('\0') {
        return Err(MapperError::validation(
            "Identifier cannot contain NUL character",
        ));
    }
    Ok(())
}

impl Ident {
    /// A single column identifier.
    pub fn column(name: &str) -> MapperResult<Self> {
        check_part(name)?;
        Ok(Self {
            parts: vec![name.to_string()],
        })
    }

    /// A table identifier, schema-qualified when `schema` is given.
    pub fn table(schema: Option<&str>, name: &str) -> MapperResult<Self> {
        check_part(name)?;
        let mut parts = Vec::with_capacity(2);
        if let Some(schema) = schema {
            check_part(schema)?;
            parts.push(schema.to_string());
        }
        parts.push(name.to_string());
        Ok(Self { parts })
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let cap = self.parts.iter().map(|p| p.len() + 3).sum();
        let mut out = String::with_capacity(cap);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push('"');
            for ch in part.chars() {
                if ch == '"' {
                    out.push_str("\"\"");
                } else {
                    out.push(ch);
                }
            }
            out.push('"');
        }
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}
