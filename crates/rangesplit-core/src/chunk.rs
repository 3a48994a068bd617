//! Chunk ranges: per-column bounds over an index, and their SQL predicates.
//!
//! A range is the lexicographic tuple interval `(lower, upper]` over the
//! indexed columns. A column without a lower (upper) value is unbounded on
//! that side. Ranges are built by the producer, finalized with
//! [`init_chunks`], and never mutated after they are handed to a consumer.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ChunkId;
use crate::schema::{quote_ident, ColumnInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub column: String,
    pub lower: String,
    pub upper: String,
    pub has_lower: bool,
    pub has_upper: bool,
}

/// How a chunk was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkType {
    Bucket,
    #[default]
    Others,
}

/// Position of a chunk inside the batch it was emitted with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub bucket_left: usize,
    pub bucket_right: usize,
    pub chunk_index: usize,
    pub chunk_count: usize,
}

/// Parameterized SQL condition; `args` bind the `?` placeholders in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub sql: String,
    pub args: Vec<String>,
}

impl Predicate {
    fn literal(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    pub id: ChunkId,
    pub bucket_id: usize,
    pub index: ChunkIndex,
    pub chunk_type: ChunkType,
    pub bounds: Vec<Bound>,
    pub collation: Option<String>,
    /// Range predicate AND the table's key-space bound. Set by [`init_chunks`].
    pub where_clause: String,
    pub args: Vec<String>,
}

impl Default for ChunkRange {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkRange {
    pub fn new() -> Self {
        Self {
            id: ChunkId::new(0),
            bucket_id: 0,
            index: ChunkIndex::default(),
            chunk_type: ChunkType::Others,
            bounds: Vec::new(),
            collation: None,
            where_clause: "TRUE".to_string(),
            args: Vec::new(),
        }
    }

    /// Set the lower and/or upper value of `column`, adding the bound if the
    /// column is new. Flags that are `false` leave the existing side untouched.
    pub fn update(
        &mut self,
        column: &str,
        lower: &str,
        upper: &str,
        update_lower: bool,
        update_upper: bool,
    ) {
        match self.bounds.iter_mut().find(|b| b.column == column) {
            Some(bound) => {
                if update_lower {
                    bound.lower = lower.to_string();
                    bound.has_lower = true;
                }
                if update_upper {
                    bound.upper = upper.to_string();
                    bound.has_upper = true;
                }
            }
            None => self.bounds.push(Bound {
                column: column.to_string(),
                lower: lower.to_string(),
                upper: upper.to_string(),
                has_lower: update_lower,
                has_upper: update_upper,
            }),
        }
    }

    pub fn bound(&self, column: &str) -> Option<&Bound> {
        self.bounds.iter().find(|b| b.column == column)
    }

    /// Render the range as a parameterized condition.
    ///
    /// For columns `a, b` with lower `(x1, y1)` and upper `(x2, y2)` this is
    /// `((a > x1) OR (a = x1 AND b > y1)) AND ((a < x2) OR (a = x2 AND b <= y2))`.
    /// A leading run of columns whose lower and upper are equal collapses into
    /// plain equalities; a range equal on every column is empty (`FALSE`).
    pub fn to_predicate(&self, collation: Option<&str>) -> Predicate {
        let collate = collation
            .filter(|c| !c.is_empty())
            .map(|c| format!(" COLLATE '{c}'"))
            .unwrap_or_default();
        let column = |b: &Bound| format!("{}{}", quote_ident(&b.column), collate);

        let mut same = Vec::new();
        let mut same_args = Vec::new();
        let mut first_open = 0;
        for b in &self.bounds {
            if !(b.has_lower && b.has_upper) || b.lower != b.upper {
                break;
            }
            same.push(format!("{} = ?", column(b)));
            same_args.push(b.lower.clone());
            first_open += 1;
        }
        if first_open == self.bounds.len() && first_open > 0 {
            return Predicate::literal("FALSE");
        }

        let last = self.bounds.len().saturating_sub(1);
        let (mut lower, mut lower_args) = (Vec::new(), Vec::new());
        let (mut upper, mut upper_args) = (Vec::new(), Vec::new());
        let (mut pre_lower, mut pre_lower_args) = (Vec::<String>::new(), Vec::new());
        let (mut pre_upper, mut pre_upper_args) = (Vec::<String>::new(), Vec::new());

        for (pos, b) in self.bounds.iter().enumerate().skip(first_open) {
            let col = column(b);
            let upper_op = if pos == last { "<=" } else { "<" };

            if b.has_lower {
                if pre_lower.is_empty() {
                    lower.push(format!("({col} > ?)"));
                } else {
                    lower.push(format!("({} AND {col} > ?)", pre_lower.join(" AND ")));
                    lower_args.extend(pre_lower_args.iter().cloned());
                }
                lower_args.push(b.lower.clone());
                pre_lower.push(format!("{col} = ?"));
                pre_lower_args.push(b.lower.clone());
            }

            if b.has_upper {
                if pre_upper.is_empty() {
                    upper.push(format!("({col} {upper_op} ?)"));
                } else {
                    upper.push(format!("({} AND {col} {upper_op} ?)", pre_upper.join(" AND ")));
                    upper_args.extend(pre_upper_args.iter().cloned());
                }
                upper_args.push(b.upper.clone());
                pre_upper.push(format!("{col} = ?"));
                pre_upper_args.push(b.upper.clone());
            }
        }

        let mut parts = Vec::new();
        let mut args = Vec::new();
        if !same.is_empty() {
            parts.push(same.join(" AND "));
            args.extend(same_args);
        }
        if !lower.is_empty() {
            parts.push(lower.join(" OR "));
            args.extend(lower_args);
        }
        if !upper.is_empty() {
            parts.push(upper.join(" OR "));
            args.extend(upper_args);
        }

        match parts.len() {
            0 => Predicate::literal("TRUE"),
            1 => Predicate {
                sql: parts.remove(0),
                args,
            },
            _ => Predicate {
                sql: parts
                    .iter()
                    .map(|p| format!("({p})"))
                    .collect::<Vec<_>>()
                    .join(" AND "),
                args,
            },
        }
    }

    /// Whether the key tuple (one value per entry of `columns`) falls inside
    /// this range. Evaluated with each column's type ordering; the in-memory
    /// counterpart of [`ChunkRange::to_predicate`].
    pub fn contains(&self, columns: &[ColumnInfo], key: &[String]) -> bool {
        let mut lower_cols = Vec::new();
        let mut lower_key = Vec::new();
        let mut lower_vals = Vec::new();
        let mut upper_cols = Vec::new();
        let mut upper_key = Vec::new();
        let mut upper_vals = Vec::new();

        for b in &self.bounds {
            let Some(pos) = columns.iter().position(|c| c.name == b.column) else {
                continue;
            };
            let Some(value) = key.get(pos) else {
                continue;
            };
            if b.has_lower {
                lower_cols.push(columns[pos].clone());
                lower_key.push(value.clone());
                lower_vals.push(b.lower.clone());
            }
            if b.has_upper {
                upper_cols.push(columns[pos].clone());
                upper_key.push(value.clone());
                upper_vals.push(b.upper.clone());
            }
        }

        if !lower_cols.is_empty()
            && crate::schema::compare_keys(&lower_cols, &lower_key, &lower_vals) != Ordering::Greater
        {
            return false;
        }
        if !upper_cols.is_empty() {
            let upper_inclusive = self.bounds.last().map(|b| b.has_upper).unwrap_or(false);
            match crate::schema::compare_keys(&upper_cols, &upper_key, &upper_vals) {
                Ordering::Less => {}
                Ordering::Equal if upper_inclusive => {}
                _ => return false,
            }
        }
        true
    }

    /// Cut this range at each pivot tuple (sorted ascending, one value per
    /// entry of `columns`). `n` pivots give `n + 1` ranges that tile `self`:
    /// the first keeps this range's lower side, the last keeps its upper side.
    pub fn tile_by_pivots(&self, columns: &[ColumnInfo], pivots: &[Vec<String>]) -> Vec<ChunkRange> {
        if pivots.is_empty() {
            return vec![self.clone()];
        }
        let n = pivots.len();
        let mut out = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let mut sub = self.clone();
            for (j, col) in columns.iter().enumerate() {
                if i == 0 {
                    sub.update(&col.name, "", &pivots[i][j], false, true);
                } else if i == n {
                    sub.update(&col.name, &pivots[i - 1][j], "", true, false);
                } else {
                    sub.update(&col.name, &pivots[i - 1][j], &pivots[i][j], true, true);
                }
            }
            out.push(sub);
        }
        out
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bucket={} [", self.id, self.bucket_id)?;
        for (i, b) in self.bounds.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let lo = if b.has_lower { b.lower.as_str() } else { "-inf" };
            let hi = if b.has_upper { b.upper.as_str() } else { "+inf" };
            write!(f, "{}: ({lo}, {hi}]", b.column)?;
        }
        write!(f, "]")
    }
}

/// Finalize a freshly split batch: assign IDs from `first_id`, tag every chunk
/// with `bucket_id`, `chunk_type`, and the collation, and render its `WHERE`
/// clause combined with the table `limits`. Returns the next free chunk ID.
pub fn init_chunks(
    chunks: &mut [ChunkRange],
    chunk_type: ChunkType,
    first_id: ChunkId,
    bucket_id: usize,
    collation: Option<&str>,
    limits: &str,
) -> ChunkId {
    let count = chunks.len();
    let mut id = first_id;
    for (i, chunk) in chunks.iter_mut().enumerate() {
        let predicate = chunk.to_predicate(collation);
        chunk.id = id;
        chunk.bucket_id = bucket_id;
        chunk.chunk_type = chunk_type;
        chunk.collation = collation.map(str::to_string);
        chunk.where_clause = format!("(({}) AND ({}))", predicate.sql, limits);
        chunk.args = predicate.args;
        chunk.index = ChunkIndex {
            bucket_left: bucket_id,
            bucket_right: bucket_id,
            chunk_index: i,
            chunk_count: count,
        };
        id = id.next();
    }
    id
}
