//! In-memory tabular data parsed from CSV downloads

use super::FetchError;

/// A header row plus string records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parses a CSV payload
    ///
    /// A blank payload or one with a header but no records yields
    /// `FetchError::EmptyPayload`. Ragged records are a parse error.
    pub fn from_csv(text: &str) -> Result<Self, FetchError> {
        if text.trim().is_empty() {
            return Err(FetchError::EmptyPayload);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| FetchError::Parse(format!("invalid CSV header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| FetchError::Parse(format!("invalid CSV record: {}", e)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        if rows.is_empty() {
            return Err(FetchError::EmptyPayload);
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}
