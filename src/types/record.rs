//! Raw evaluation records and normalized column lookup

use std::collections::HashMap;
use std::sync::Arc;

/// Normalize a column name for lookup: trim, strip any `ns::` namespace
/// prefixes, and case-fold. Configuration-declared names match record headers
/// regardless of source casing or namespacing.
pub fn normalize_column_name(name: &str) -> String {
    let trimmed = name.trim();
    let base = match trimmed.rfind("::") {
        Some(pos) => &trimmed[pos + 2..],
        None => trimmed,
    };
    base.to_lowercase()
}

/// Parsed column headers, shared across all records of one stream.
#[derive(Debug)]
pub struct RecordHeader {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl RecordHeader {
    pub fn new(names: &[String]) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First declaration wins on duplicate normalized names.
            index.entry(normalize_column_name(name)).or_insert(i);
        }
        Self {
            names: names.to_vec(),
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.index.get(&normalize_column_name(column)).copied()
    }
}

/// One raw record: an ordered mapping from column name to raw string value.
/// Immutable per invocation.
#[derive(Debug, Clone)]
pub struct Record {
    header: Arc<RecordHeader>,
    values: Vec<String>,
}

impl Record {
    pub fn new(header: Arc<RecordHeader>, values: Vec<String>) -> Self {
        Self { header, values }
    }

    /// Parse one delimited line against the shared header. Short lines are
    /// padded with empty values so positional lookup stays in range.
    pub fn parse_delimited(header: Arc<RecordHeader>, line: &str, delimiter: &str) -> Self {
        let mut values: Vec<String> = line.split(delimiter).map(|v| v.to_string()).collect();
        while values.len() < header.len() {
            values.push(String::new());
        }
        Self { header, values }
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Resolve a column to its raw value. Absence means "skip"/"use default",
    /// never an error.
    pub fn resolve(&self, column: &str) -> Option<&str> {
        self.header
            .position(column)
            .and_then(|i| self.values.get(i))
            .map(|v| v.as_str())
    }

    /// Resolve a column, treating blank values as absent.
    pub fn resolve_non_blank(&self, column: &str) -> Option<&str> {
        self.resolve(column)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// A headerless CSV export replays the column names as the first data
    /// line. Such a row must be skipped, not scored.
    pub fn is_header_replay(&self) -> bool {
        match (self.values.first(), self.header.names().first()) {
            (Some(first_value), Some(first_header)) => {
                normalize_column_name(first_value) == normalize_column_name(first_header)
            }
            _ => false,
        }
    }
}
