//! Table metadata: columns, indexes, and the table descriptor handed to the
//! splitter. Pure data plus the ordering helpers the splitter relies on.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::id::IndexId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    UnsignedInt,
    Float,
    Decimal,
    Utf8,
    Binary,
    Date,
    Datetime,
    Timestamp,
    Time,
}

impl DataType {
    /// Temporal types whose histogram bounds are stored in packed form.
    pub fn is_packed_time(self) -> bool {
        matches!(self, DataType::Date | DataType::Datetime | DataType::Timestamp)
    }

    /// Compare two textual values of this type.
    ///
    /// Numeric types compare numerically; everything else compares bytewise,
    /// which matches the canonical `YYYY-MM-DD hh:mm:ss` rendering of temporal
    /// values. Values that fail to parse fall back to bytewise comparison.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            DataType::Int | DataType::UnsignedInt => {
                match (a.trim().parse::<i128>(), b.trim().parse::<i128>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => a.cmp(b),
                }
            }
            DataType::Float | DataType::Decimal => {
                match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                    (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or_else(|| a.cmp(b)),
                    _ => a.cmp(b),
                }
            }
            _ => a.cmp(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub id: IndexId,
    pub name: String,
    /// Indexed column names, in key order.
    pub columns: Vec<String>,
    pub primary: bool,
    pub unique: bool,
}

impl IndexInfo {
    pub fn new(id: i64, name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            id: IndexId::new(id),
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            primary: false,
            unique: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.unique = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub columns: Vec<ColumnInfo>,
    /// May contain `None` holes for indexes that are unusable (dropped,
    /// invisible, still being built).
    pub indexes: Vec<Option<IndexInfo>>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Indexes in candidate order: primary key, then unique indexes, then the
    /// rest. Declaration order is kept inside each group; `None` holes stay in
    /// place at the end of the list so callers can skip them.
    pub fn candidate_indexes(&self) -> Vec<Option<&IndexInfo>> {
        let mut out: Vec<Option<&IndexInfo>> = Vec::with_capacity(self.indexes.len());
        let present = || self.indexes.iter().flatten();
        out.extend(present().filter(|idx| idx.primary).map(Some));
        out.extend(present().filter(|idx| !idx.primary && idx.unique).map(Some));
        out.extend(present().filter(|idx| !idx.primary && !idx.unique).map(Some));
        out.extend(self.indexes.iter().filter(|idx| idx.is_none()).map(|_| None));
        out
    }

    /// Resolve an index's column names against the table columns. Names that
    /// do not resolve (e.g. expression indexes) are skipped.
    pub fn columns_for_index(&self, index: &IndexInfo) -> Vec<ColumnInfo> {
        index
            .columns
            .iter()
            .filter_map(|name| self.column(name).cloned())
            .collect()
    }
}

/// Table handed to the splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    pub schema: String,
    pub table: String,
    pub info: TableInfo,
    /// Collation applied to every range predicate.
    pub collation: Option<String>,
    /// Extra condition bounding the table's key space (`TRUE` when absent).
    pub range: Option<String>,
}

impl TableDiff {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, info: TableInfo) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            info,
            collation: None,
            range: None,
        }
    }

    pub fn limits(&self) -> &str {
        self.range.as_deref().unwrap_or("TRUE")
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Lexicographic comparison of two key tuples over `columns`.
///
/// Only the common prefix is compared; a shorter tuple equal on that prefix
/// compares equal.
pub fn compare_keys(columns: &[ColumnInfo], a: &[String], b: &[String]) -> Ordering {
    for ((col, x), y) in columns.iter().zip(a).zip(b) {
        match col.data_type.compare(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
