use std::path::{Path, PathBuf};

use super::SheetError;
use super::workbook::{CellValue, Workbook, ensure_file_exists};
use crate::model::DATASET_HEADER;

/// Appends rows to one sheet of an xlsx workbook, saving after every call.
///
/// Rows must match the width of the sheet's header row. A sheet created by
/// `open` starts with the header; one opened with an empty header accepts any
/// width for its first row, which then acts as the header.
#[derive(Debug)]
pub struct SheetWriter {
    path: PathBuf,
    sheet_index: usize,
    workbook: Option<Workbook>,
}

impl SheetWriter {
    /// Opens `path`, creating it with the dataset header when absent.
    pub fn open(path: impl Into<PathBuf>, sheet: Option<&str>) -> Result<Self, SheetError> {
        Self::open_with_header(path, sheet, &DATASET_HEADER)
    }

    pub fn open_with_header(
        path: impl Into<PathBuf>,
        sheet: Option<&str>,
        header: &[&str],
    ) -> Result<Self, SheetError> {
        let path = path.into();
        ensure_file_exists(&path, header)?;

        let mut workbook = Workbook::load(&path)?;
        let sheet_index = workbook.sheet_index_or_create(sheet);
        if let Some(target) = workbook.sheet_at_mut(sheet_index) {
            if target.rows().is_empty() && !header.is_empty() {
                target.push_row(header.iter().map(|name| CellValue::from(*name)).collect());
            }
        }

        Ok(Self {
            path,
            sheet_index,
            workbook: Some(workbook),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, row: Vec<CellValue>) -> Result<(), SheetError> {
        self.append_many(std::iter::once(row))
    }

    /// Validates every row first, so a bad row leaves the sheet untouched. A
    /// failed save drops the rows again.
    pub fn append_many<I>(&mut self, rows: I) -> Result<(), SheetError>
    where
        I: IntoIterator<Item = Vec<CellValue>>,
    {
        let workbook = self.workbook.as_mut().ok_or(SheetError::NotLoaded)?;
        let sheet = workbook
            .sheet_at_mut(self.sheet_index)
            .ok_or(SheetError::NotLoaded)?;

        let mut expected = sheet.rows().first().map(Vec::len);
        let mut pending = Vec::new();
        for row in rows {
            validate_row(&row, expected)?;
            expected.get_or_insert(row.len());
            pending.push(row);
        }

        let appended = pending.len();
        let kept = sheet.rows().len();
        for row in pending {
            sheet.push_row(row);
        }
        let sheet_name = sheet.name().to_string();

        if let Err(error) = workbook.save(&self.path) {
            if let Some(sheet) = workbook.sheet_at_mut(self.sheet_index) {
                sheet.truncate_rows(kept);
            }
            return Err(error);
        }
        tracing::info!(
            path = %self.path.display(),
            sheet = %sheet_name,
            rows = appended,
            "rows appended"
        );
        Ok(())
    }

    /// Releases the workbook. Further appends fail with `NotLoaded`.
    pub fn close(&mut self) {
        if self.workbook.take().is_some() {
            tracing::debug!(path = %self.path.display(), "workbook released");
        }
    }
}

impl Drop for SheetWriter {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_row(row: &[CellValue], expected: Option<usize>) -> Result<(), SheetError> {
    if row.is_empty() {
        return Err(SheetError::InvalidRow(
            "row must contain at least one cell".to_string(),
        ));
    }

    match expected {
        Some(width) if width != row.len() => Err(SheetError::InvalidRow(format!(
            "row has {} cells but the header has {width}",
            row.len()
        ))),
        _ => Ok(()),
    }
}
