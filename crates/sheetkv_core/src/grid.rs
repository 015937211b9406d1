//! Grid layout of a table and an in-memory grid adapter.
//!
//! A grid is a list of rows of cell strings. Row index 0 is the header
//! (spreadsheet row 1); row index `n` is spreadsheet row `n + 1`, so the
//! record with key `k` lives at index `k - 1`.

use crate::adapter::{Adapter, CancelToken, Operation, OperationKind, SyncStrategy};
use crate::cache::merge_schemas;
use crate::error::{AdapterError, AdapterResult};
use crate::record::{Key, Record};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// One row of cell strings.
pub type Row = Vec<String>;

fn render_record(record: &Record, schema: &[String]) -> Row {
    schema
        .iter()
        .map(|column| {
            record
                .get(column)
                .map(Value::to_cell_string)
                .unwrap_or_default()
        })
        .collect()
}

/// Lays out a full table rewrite: the header followed by the data rows.
///
/// Records are written in ascending key order. With
/// [`SyncStrategy::RowPreserving`] a blank row is emitted for every missing
/// key so that each record lands on the row equal to its key. With
/// [`SyncStrategy::Compacting`] records are written back to back from row 2.
pub fn render_rows(records: &[Record], schema: &[String], strategy: SyncStrategy) -> Vec<Row> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by_key(|r| r.key);

    let mut rows = Vec::with_capacity(sorted.len() + 1);
    rows.push(schema.to_vec());

    match strategy {
        SyncStrategy::RowPreserving => {
            let blank = vec![String::new(); schema.len()];
            for record in sorted {
                while rows.len() + 1 < record.key as usize {
                    rows.push(blank.clone());
                }
                rows.push(render_record(record, schema));
            }
        }
        SyncStrategy::Compacting => {
            rows.extend(sorted.into_iter().map(|r| render_record(r, schema)));
        }
    }

    rows
}

/// Returns true if every cell of the row is empty.
pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(String::is_empty)
}

/// Parses a grid back into records and schema.
///
/// Blank rows are skipped and keep their row number unused; empty cells
/// leave the column absent from the record.
pub fn parse_rows(rows: &[Row]) -> (Vec<Record>, Vec<String>) {
    let Some(header) = rows.first() else {
        return (Vec::new(), Vec::new());
    };
    let schema: Vec<String> = header.iter().filter(|c| !c.is_empty()).cloned().collect();

    let records = rows
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| !is_blank(row))
        .map(|(index, row)| {
            let mut record = Record::new(index as Key + 1);
            for (column, cell) in header.iter().zip(row) {
                if !column.is_empty() && !cell.is_empty() {
                    record.insert(column.clone(), Value::parse_cell(cell));
                }
            }
            record
        })
        .collect();

    (records, schema)
}

/// An in-process spreadsheet implementing [`Adapter`].
///
/// Every save replaces the whole grid, so rows beyond the new data extent
/// disappear. The header of a save is the incoming schema merged with the
/// current header (see [`merge_schemas`]), which keeps a hand-arranged
/// column order stable.
///
/// # Example
///
/// ```rust
/// use sheetkv_core::{Adapter, CancelToken, MemoryAdapter, Record, SyncStrategy};
///
/// let sheet = MemoryAdapter::new();
/// let records = vec![Record::new(2).with_value("name", "Alice")];
/// sheet
///     .save(&CancelToken::new(), &records, &["name".to_string()], SyncStrategy::Compacting)
///     .unwrap();
/// assert_eq!(sheet.rows()[1], vec!["Alice".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    rows: RwLock<Vec<Row>>,
}

impl MemoryAdapter {
    /// Creates an empty sheet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sheet with pre-existing rows (row 0 is the header).
    #[must_use]
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Returns a copy of all rows, header included.
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.rows.read().clone()
    }

    /// Returns spreadsheet row `row` (1-based), if present.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<Row> {
        row.checked_sub(1)
            .and_then(|index| self.rows.read().get(index).cloned())
    }

    /// Returns the number of rows, header included.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    fn write_table(
        rows: &mut Vec<Row>,
        records: &[Record],
        schema: &[String],
        strategy: SyncStrategy,
    ) {
        let existing = rows.first().cloned().unwrap_or_default();
        let header = merge_schemas(schema, &existing);
        *rows = render_rows(records, &header, strategy);
    }
}

fn extend_schema(schema: &mut Vec<String>, record: &Record) {
    for column in record.columns() {
        if !schema.iter().any(|c| c == column) {
            schema.push(column.to_string());
        }
    }
}

impl Adapter for MemoryAdapter {
    fn load(&self, cancel: &CancelToken) -> AdapterResult<(Vec<Record>, Vec<String>)> {
        cancel.check()?;
        Ok(parse_rows(&self.rows.read()))
    }

    fn save(
        &self,
        cancel: &CancelToken,
        records: &[Record],
        schema: &[String],
        strategy: SyncStrategy,
    ) -> AdapterResult<()> {
        cancel.check()?;
        let mut rows = self.rows.write();
        Self::write_table(&mut rows, records, schema, strategy);
        Ok(())
    }

    fn batch_apply(&self, cancel: &CancelToken, operations: &[Operation]) -> AdapterResult<()> {
        cancel.check()?;
        let mut rows = self.rows.write();
        let (records, mut schema) = parse_rows(&rows);
        let mut table: BTreeMap<Key, Record> = records.into_iter().map(|r| (r.key, r)).collect();

        for op in operations {
            cancel.check()?;
            let key = op.record.key;
            match op.kind {
                OperationKind::Add => {
                    if table.contains_key(&key) {
                        return Err(AdapterError::DuplicateKey { key });
                    }
                    extend_schema(&mut schema, &op.record);
                    table.insert(key, op.record.clone());
                }
                OperationKind::Update => {
                    let existing = table
                        .get_mut(&key)
                        .ok_or(AdapterError::KeyNotFound { key })?;
                    for (column, value) in &op.record.values {
                        existing.values.insert(column.clone(), value.clone());
                    }
                    extend_schema(&mut schema, &op.record);
                }
                OperationKind::Delete => {
                    table
                        .remove(&key)
                        .ok_or(AdapterError::KeyNotFound { key })?;
                }
            }
        }

        let records: Vec<Record> = table.into_values().collect();
        Self::write_table(&mut rows, &records, &schema, SyncStrategy::RowPreserving);
        Ok(())
    }
}
