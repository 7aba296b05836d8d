//! Tabular result model.
//!
//! A [`Table`] is the materialized result of one SQL execution: ordered
//! [`Row`]s sharing one set of [`Column`]s. Values are owned and hashable,
//! which also lets parameter sets key the result cache.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Named query parameters, ordered by name so hashing is stable.
pub type Params = BTreeMap<String, Value>;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// BIT.
    Bool(bool),
    /// Integer types, widened to 64 bits.
    Int(i64),
    /// Floating point types.
    Float(f64),
    /// Character types.
    Text(String),
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Self::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Self::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Result set column metadata.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// 0-based position in the row.
    pub index: usize,
}

impl Column {
    /// Create a column at the given position.
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// One result row; a mapping of column name to value, in column order.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

impl Row {
    /// Look up a value by column name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        let column = self.columns.iter().find(|c| c.name == name)?;
        self.values.get(column.index)
    }

    /// Look up a value by position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// The values in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// A fully materialized query result.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Arc<[Column]>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from column names and row values.
    ///
    /// Rows shorter than the column list are padded with NULL so lookups by
    /// name stay total.
    #[must_use]
    pub fn new(column_names: &[&str], row_values: Vec<Vec<Value>>) -> Self {
        let columns: Arc<[Column]> = column_names
            .iter()
            .enumerate()
            .map(|(index, name)| Column::new(*name, index))
            .collect();
        let rows = row_values
            .into_iter()
            .map(|mut values| {
                values.resize(columns.len(), Value::Null);
                Row {
                    columns: Arc::clone(&columns),
                    values,
                }
            })
            .collect();
        Self { columns, rows }
    }

    /// An empty result with no columns.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(&[], Vec::new())
    }

    /// Column metadata, in result order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The rows, in result order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the result has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_lookup_by_name_and_index() {
        let table = Table::new(
            &["categoria", "qtd_alunos"],
            vec![vec![Value::from("6º ano"), Value::from(42i64)]],
        );
        let row = &table.rows()[0];
        assert_eq!(row.get("qtd_alunos"), Some(&Value::Int(42)));
        assert_eq!(row.get_index(0), Some(&Value::Text("6º ano".into())));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_short_rows_pad_with_null() {
        let table = Table::new(&["a", "b"], vec![vec![Value::from(1i64)]]);
        assert_eq!(table.rows()[0].get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_value_hash_distinguishes_variants() {
        assert_ne!(hash_of(&Value::Int(1)), hash_of(&Value::Bool(true)));
        assert_ne!(hash_of(&Value::Null), hash_of(&Value::Int(0)));
        assert_eq!(hash_of(&Value::Float(1.5)), hash_of(&Value::Float(1.5)));
    }

    #[test]
    fn test_empty_table() {
        let table = Table::empty();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.columns().is_empty());
    }
}
