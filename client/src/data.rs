use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Error as IoError, Read};
use std::path::Path;

use tracing::{debug, trace};

/// Cells holding this value mark a row with missing data, which is skipped.
const MISSING_VALUE: &str = "?";
const BLANK_COLUMN_NAME: &str = "<blank>";

/// A table of comma separated values.
///
/// Cells are kept as text. Numeric columns are read with [`DataTable::numeric_column`], which
/// gives every distinct non-numeric cell in a column its own numeric alias: the first gets 0,
/// the next 1, and so on. Aliases can also be assigned up front with [`DataTable::set_alias`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataTable {
    column_names: Vec<String>,
    rows: Vec<Vec<String>>,
    aliases: HashMap<(usize, String), f64>,
    next_alias: Vec<f64>,
}

impl DataTable {
    pub fn from_file(filename: impl AsRef<Path>, header: bool) -> Result<Self, DataError> {
        let mut contents = String::new();
        File::open(filename.as_ref())?.read_to_string(&mut contents)?;

        Self::parse(&contents, header)
    }

    /// Parses comma separated text. If `header` is set, the first line names the columns.
    pub fn parse(text: &str, header: bool) -> Result<Self, DataError> {
        let mut lines = text.lines().enumerate();

        let mut column_names = Vec::new();
        if header {
            if let Some((_, line)) = lines.next() {
                column_names = split_line(line)
                    .map(|name| {
                        if name.is_empty() {
                            BLANK_COLUMN_NAME.to_owned()
                        } else {
                            name
                        }
                    })
                    .collect();
            }
        }

        let mut num_columns = (!column_names.is_empty()).then_some(column_names.len());
        let mut rows = Vec::new();

        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }

            let row: Vec<String> = split_line(line).collect();
            if row.iter().any(|cell| cell == MISSING_VALUE) {
                trace!(line = index + 1, "Skipping row with missing data.");
                continue;
            }

            let expected = *num_columns.get_or_insert(row.len());
            if row.len() != expected {
                return Err(DataError::ColumnCount {
                    line: index + 1,
                    expected,
                    actual: row.len(),
                });
            }

            rows.push(row);
        }

        let num_columns = num_columns.unwrap_or_default();
        debug!(rows = rows.len(), columns = num_columns, "Read data table.");

        Ok(Self {
            column_names,
            rows,
            aliases: HashMap::new(),
            next_alias: vec![0.0; num_columns],
        })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.next_alias.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|column| column == name)
    }

    /// Resolves a column given either by header name or by zero-based index. Names take
    /// precedence, so a header literally named "1" is found by name.
    pub fn resolve_column(&self, column: &str) -> Result<usize, DataError> {
        if let Some(index) = self.column_index(column) {
            return Ok(index);
        }

        match column.parse::<usize>() {
            Ok(index) if index < self.num_columns() => Ok(index),
            Ok(index) => Err(DataError::ColumnIndex(index)),
            Err(_) => Err(DataError::ColumnName(column.to_owned())),
        }
    }

    /// Reads a column as numbers, aliasing any non-numeric cells.
    pub fn numeric_column(&mut self, column: usize) -> Result<Vec<f64>, DataError> {
        self.check_column(column)?;

        let mut values = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let cell = &row[column];
            let key = (column, cell.clone());

            let value = match self.aliases.get(&key) {
                Some(&alias) => alias,
                None => match cell.parse::<f64>() {
                    Ok(value) => value,
                    Err(_) => {
                        let alias = self.next_alias[column];
                        self.next_alias[column] += 1.0;
                        trace!(column, value = %cell, alias, "Aliased non-numeric value.");
                        self.aliases.insert(key, alias);
                        alias
                    }
                },
            };

            values.push(value);
        }

        Ok(values)
    }

    /// Assigns the numeric value used for `value` wherever it appears in `column`, replacing
    /// any alias it already had.
    pub fn set_alias(&mut self, value: &str, alias: f64, column: usize) {
        self.aliases.insert((column, value.to_owned()), alias);
    }

    fn check_column(&self, column: usize) -> Result<(), DataError> {
        if column < self.num_columns() {
            Ok(())
        } else {
            Err(DataError::ColumnIndex(column))
        }
    }
}

/// Splits a line on commas, dropping quotes and surrounding whitespace from each cell.
fn split_line(line: &str) -> impl Iterator<Item = String> + '_ {
    line.split(',')
        .map(|cell| cell.replace('"', "").trim().to_owned())
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataError {
    ColumnCount {
        line: usize,
        expected: usize,
        actual: usize,
    },
    ColumnIndex(usize),
    ColumnName(String),
    Io(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnCount {
                line,
                expected,
                actual,
            } => write!(
                f,
                "line {line} has {actual} columns, expected {expected}"
            ),
            Self::ColumnIndex(index) => write!(f, "column index out of bounds: {index}"),
            Self::ColumnName(name) => write!(f, "no column named: {name}"),
            Self::Io(message) => write!(f, "i/o error: {message}"),
        }
    }
}

impl std::error::Error for DataError {}

impl From<IoError> for DataError {
    fn from(error: IoError) -> Self {
        DataError::Io(error.to_string())
    }
}
