use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FieldName, InputError};

/// A packed bitmask value (n-gram encoding, hashed string, or raw integer
/// bit pattern), stored byte-wise.
pub type Bitmask = Vec<u8>;

/// A field value for one record, or `None` if the field is missing. A
/// missing value forces `delta = 0` for that field during scoring, which
/// zeroes its contribution regardless of any residual bits.
pub type FieldEntry = Option<Bitmask>;

/// A single client record: field name to optional value.
pub type Record = BTreeMap<FieldName, FieldEntry>;

/// The server's database: one column (ordered sequence of [`FieldEntry`])
/// per field name. All columns must have identical length (`database_size`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Database {
    columns: BTreeMap<FieldName, Vec<FieldEntry>>,
}

impl Database {
    /// Builds a database from named columns, checking that every column has
    /// the same length.
    pub fn new(columns: BTreeMap<FieldName, Vec<FieldEntry>>) -> Result<Self, InputError> {
        let mut lens = columns.values().map(Vec::len);
        if let Some(first) = lens.next()
            && let Some(mismatched) = lens.find(|&l| l != first)
        {
            return Err(InputError::ColumnLengthMismatch {
                expected: first,
                actual: mismatched,
            });
        }
        Ok(Self { columns })
    }

    /// Number of rows (`database_size`), 0 if there are no columns.
    pub fn size(&self) -> usize {
        self.columns.values().next().map_or(0, Vec::len)
    }

    /// The column for `name`, if present.
    pub fn column(&self, name: &str) -> Option<&[FieldEntry]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Iterates over `(field name, column)` pairs in deterministic,
    /// lexicographic field-name order.
    pub fn columns(&self) -> impl Iterator<Item = (&FieldName, &[FieldEntry])> {
        self.columns.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// Key into the per-record field-weight memoisation map used by the
/// circuit builder: `left` and `right` may differ only when both fall
/// within the same exchange group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComparisonIndex {
    /// Index of the client record within the batch being linked.
    pub record_index: usize,
    /// Field name on the client side.
    pub left: FieldName,
    /// Field name on the server side.
    pub right: FieldName,
}
