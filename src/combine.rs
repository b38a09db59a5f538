//! Merging of per-query tables into one CSV output

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::data::{Dimension, Query, Table};
use crate::fs_util::write_atomic;

/// Prefix of the columns that identify the query a row came from
pub const QUERY_COLUMN_PREFIX: &str = "query_";

/// Prepended to dataset columns that would otherwise look like query columns
pub const SOURCE_COLUMN_PREFIX: &str = "source_";

/// Errors that can occur when writing the combined output
#[derive(Debug, Error)]
pub enum OutputError {
    /// A record could not be encoded as CSV
    #[error("Failed to encode CSV output: {0}")]
    Csv(#[from] csv::Error),

    /// The output file could not be written
    #[error("Failed to write output file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Names of the leading query columns, in dimension order
pub fn query_columns() -> Vec<String> {
    Dimension::ALL
        .iter()
        .map(|dim| format!("{}{}", QUERY_COLUMN_PREFIX, dim))
        .collect()
}

/// Output names for the columns of one dataset, by position
///
/// A column whose name starts with `QUERY_COLUMN_PREFIX` gets
/// `SOURCE_COLUMN_PREFIX` prepended. A name already used earlier in the same
/// dataset gets the first free `_2`, `_3`, ... suffix.
pub fn native_names(columns: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        let base = if column.starts_with(QUERY_COLUMN_PREFIX) {
            format!("{}{}", SOURCE_COLUMN_PREFIX, column)
        } else {
            column.clone()
        };

        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Concatenates per-query tables into one table
///
/// Every output row starts with the display names of the query that produced
/// it (`query_model`, `query_measure`, `query_year`, `query_age`,
/// `query_sex`), followed by the dataset's own columns under the names given
/// by `native_names`. Dataset columns are the union over all fragments in
/// first-seen order; a fragment without a column gets empty cells for it.
pub fn combine(fragments: &[(Query, Table)]) -> Table {
    let fragment_names: Vec<Vec<String>> = fragments
        .iter()
        .map(|(query, table)| {
            let names = native_names(&table.columns);
            if names != table.columns {
                warn!("Renamed repeated or reserved columns of {} to {:?}", query, names);
            }
            names
        })
        .collect();

    let mut native: Vec<String> = Vec::new();
    for names in &fragment_names {
        for name in names {
            if !native.contains(name) {
                native.push(name.clone());
            }
        }
    }

    let mut columns = query_columns();
    columns.extend(native.iter().cloned());

    let total_rows = fragments.iter().map(|(_, t)| t.row_count()).sum();
    let mut rows = Vec::with_capacity(total_rows);

    for ((query, table), names) in fragments.iter().zip(&fragment_names) {
        // Position of each combined column within this fragment
        let positions: Vec<Option<usize>> = native
            .iter()
            .map(|c| names.iter().position(|n| n == c))
            .collect();
        let tags = query.names();

        for record in &table.rows {
            let mut row: Vec<String> = tags.iter().map(|n| n.to_string()).collect();
            row.extend(positions.iter().map(|pos| {
                pos.and_then(|i| record.get(i))
                    .cloned()
                    .unwrap_or_default()
            }));
            rows.push(row);
        }
    }

    Table { columns, rows }
}

/// Writes a table as CSV, replacing `path` atomically
pub fn write_csv(table: &Table, path: &Path) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e.into_error(),
    })?;

    info!("Saving data to {}", path.display());
    write_atomic(path, &bytes).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}
