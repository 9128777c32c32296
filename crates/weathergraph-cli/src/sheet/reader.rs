use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::SheetError;
use super::workbook::{CellValue, Sheet, Workbook};

/// One data row keyed by header name, in header order.
pub type RowRecord = IndexMap<String, CellValue>;

const FIRST_DATA_ROW: usize = 2;

/// Read-only view over an xlsx workbook.
///
/// The workbook is loaded by `open` and released by `close` or on drop.
/// Every read before `open` fails with `SheetError::NotLoaded`.
#[derive(Debug)]
pub struct SheetReader {
    path: PathBuf,
    workbook: Option<Workbook>,
}

impl SheetReader {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SheetError> {
        let path = path.into();
        if !path.is_file() {
            return Err(SheetError::MissingFile(path));
        }

        Ok(Self {
            path,
            workbook: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the workbook. Calling it again while loaded is a no-op.
    pub fn open(&mut self) -> Result<(), SheetError> {
        if self.workbook.is_none() {
            self.workbook = Some(Workbook::load(&self.path)?);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.workbook.is_some()
    }

    pub fn close(&mut self) {
        if self.workbook.take().is_some() {
            tracing::debug!(path = %self.path.display(), "workbook released");
        }
    }

    pub fn sheet_names(&self) -> Result<Vec<String>, SheetError> {
        Ok(self
            .loaded()?
            .sheet_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    pub fn headers(&self, sheet: Option<&str>) -> Result<Vec<String>, SheetError> {
        Ok(self.sheet(sheet)?.header())
    }

    /// First or last `n_rows` data rows depending on `from_top`.
    pub fn get(
        &self,
        n_rows: usize,
        from_top: bool,
        sheet: Option<&str>,
    ) -> Result<Vec<RowRecord>, SheetError> {
        if from_top {
            self.get_top(n_rows, sheet)
        } else {
            self.get_bottom(n_rows, sheet)
        }
    }

    /// Rows `2..=min(n_rows + 1, last_row)`.
    pub fn get_top(
        &self,
        n_rows: usize,
        sheet: Option<&str>,
    ) -> Result<Vec<RowRecord>, SheetError> {
        let sheet = self.sheet(sheet)?;
        validate_row_count(n_rows)?;

        let last = n_rows.saturating_add(1).min(sheet.last_row());
        records_between(sheet, FIRST_DATA_ROW, last)
    }

    /// Rows `max(2, last_row - n_rows + 1)..=last_row`.
    pub fn get_bottom(
        &self,
        n_rows: usize,
        sheet: Option<&str>,
    ) -> Result<Vec<RowRecord>, SheetError> {
        let sheet = self.sheet(sheet)?;
        validate_row_count(n_rows)?;

        let last = sheet.last_row();
        let first = (last.saturating_sub(n_rows) + 1).max(FIRST_DATA_ROW);
        records_between(sheet, first, last)
    }

    /// Every data row. A sheet holding only a header yields no records.
    pub fn get_all(&self, sheet: Option<&str>) -> Result<Vec<RowRecord>, SheetError> {
        let sheet = self.sheet(sheet)?;
        records_between(sheet, FIRST_DATA_ROW, sheet.last_row())
    }

    fn loaded(&self) -> Result<&Workbook, SheetError> {
        self.workbook.as_ref().ok_or(SheetError::NotLoaded)
    }

    fn sheet(&self, name: Option<&str>) -> Result<&Sheet, SheetError> {
        self.loaded()?.sheet(name)
    }
}

impl Drop for SheetReader {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_row_count(n_rows: usize) -> Result<(), SheetError> {
    if n_rows < 1 {
        return Err(SheetError::InvalidArgument(
            "row count must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn records_between(
    sheet: &Sheet,
    first: usize,
    last: usize,
) -> Result<Vec<RowRecord>, SheetError> {
    rows_to_records(sheet.row_range(first, last), first, &sheet.header())
}

/// Zips each row with the header. `first_row` is the 1-based number of
/// `rows[0]` and only feeds error messages.
pub(crate) fn rows_to_records(
    rows: &[Vec<CellValue>],
    first_row: usize,
    header: &[String],
) -> Result<Vec<RowRecord>, SheetError> {
    rows.iter()
        .enumerate()
        .map(|(offset, row)| {
            if row.len() != header.len() {
                return Err(SheetError::SchemaMismatch {
                    row: first_row + offset,
                    expected: header.len(),
                    found: row.len(),
                });
            }
            Ok(header.iter().cloned().zip(row.iter().cloned()).collect())
        })
        .collect()
}
