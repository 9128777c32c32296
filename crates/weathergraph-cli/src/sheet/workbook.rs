use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Xlsx, XlsxError, open_workbook};
use rust_xlsxwriter::Format;
use serde::Serialize;

use super::SheetError;

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

const DATE_NUM_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Excel date serial (1900 system). Kept apart from `Number` so a
    /// re-save writes it back with a date format.
    DateTime(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text used when the cell sits in a header row. Blank cells yield `""`.
    pub fn header_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(value) => value.to_string(),
            CellValue::Text(value) => value.clone(),
            CellValue::Bool(value) => value.to_string(),
            CellValue::DateTime(value) => value.to_string(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rows(name, Vec::new())
    }

    pub fn with_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// 1-based number of the last populated row, 0 for an empty sheet.
    pub fn last_row(&self) -> usize {
        self.rows.len()
    }

    pub fn header(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.iter().map(CellValue::header_text).collect())
            .unwrap_or_default()
    }

    /// Rows `first..=last`, both 1-based and clamped to the populated range.
    pub fn row_range(&self, first: usize, last: usize) -> &[Vec<CellValue>] {
        let start = first.max(1) - 1;
        let end = last.min(self.rows.len());
        if start >= end {
            return &[];
        }
        &self.rows[start..end]
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    pub(crate) fn truncate_rows(&mut self, len: usize) {
        self.rows.truncate(len);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Single default sheet whose first row is `header`.
    pub fn with_header(header: &[&str]) -> Self {
        let mut sheet = Sheet::new(DEFAULT_SHEET_NAME);
        if !header.is_empty() {
            sheet.push_row(header.iter().map(|name| CellValue::from(*name)).collect());
        }
        Self::new(vec![sheet])
    }

    pub fn load(path: &Path) -> Result<Self, SheetError> {
        let open_error = |message: String| SheetError::Open {
            path: path.to_path_buf(),
            message,
        };

        let mut source = open_workbook::<Xlsx<_>, _>(path)
            .map_err(|error: XlsxError| open_error(error.to_string()))?;

        let mut sheets = Vec::new();
        for name in source.sheet_names() {
            let rows = read_sheet_rows(&mut source, &name)
                .map_err(|error| open_error(format!("sheet '{name}': {error}")))?;
            sheets.push(Sheet::with_rows(name, rows));
        }

        tracing::debug!(path = %path.display(), sheets = sheets.len(), "workbook loaded");
        Ok(Self { sheets })
    }

    pub fn save(&self, path: &Path) -> Result<(), SheetError> {
        let persistence_error = |message: String| SheetError::Persistence {
            path: path.to_path_buf(),
            message,
        };

        // Blank cells only reach the file when they carry a non-default
        // format, which keeps all-empty rows in place across a reload.
        let blank_format = Format::new().set_num_format("General");
        let date_format = Format::new().set_num_format(DATE_NUM_FORMAT);
        let datetime_format = Format::new().set_num_format(DATETIME_NUM_FORMAT);

        let mut book = rust_xlsxwriter::Workbook::new();
        for sheet in &self.sheets {
            let worksheet = book.add_worksheet();
            worksheet
                .set_name(sheet.name())
                .map_err(|error| persistence_error(error.to_string()))?;

            for (row_index, row) in sheet.rows().iter().enumerate() {
                let row_number = u32::try_from(row_index)
                    .map_err(|_| persistence_error(format!("row {row_index} out of range")))?;
                for (col_index, cell) in row.iter().enumerate() {
                    let col_number = u16::try_from(col_index).map_err(|_| {
                        persistence_error(format!("column {col_index} out of range"))
                    })?;
                    let written = match cell {
                        CellValue::Empty => {
                            worksheet.write_blank(row_number, col_number, &blank_format)
                        }
                        CellValue::Number(value) => {
                            worksheet.write_number(row_number, col_number, *value)
                        }
                        CellValue::Text(value) => {
                            worksheet.write_string(row_number, col_number, value)
                        }
                        CellValue::Bool(value) => {
                            worksheet.write_boolean(row_number, col_number, *value)
                        }
                        CellValue::DateTime(serial) => {
                            let format = if serial.fract() == 0.0 {
                                &date_format
                            } else {
                                &datetime_format
                            };
                            worksheet.write_number_with_format(row_number, col_number, *serial, format)
                        }
                    };
                    written.map_err(|error| persistence_error(error.to_string()))?;
                }
            }
        }

        let bytes = book
            .save_to_buffer()
            .map_err(|error| persistence_error(error.to_string()))?;
        write_atomic(path, &bytes).map_err(|error| persistence_error(error.to_string()))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "workbook saved");
        Ok(())
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    /// Named sheet, or the default (first) sheet when `name` is `None`.
    pub fn sheet(&self, name: Option<&str>) -> Result<&Sheet, SheetError> {
        let index = self.sheet_index(name)?;
        Ok(&self.sheets[index])
    }

    pub fn sheet_mut(&mut self, name: Option<&str>) -> Result<&mut Sheet, SheetError> {
        let index = self.sheet_index(name)?;
        Ok(&mut self.sheets[index])
    }

    /// Like `sheet_index`, but adds an empty sheet when the lookup misses.
    pub fn sheet_index_or_create(&mut self, name: Option<&str>) -> usize {
        if let Ok(index) = self.sheet_index(name) {
            return index;
        }

        let name = name.unwrap_or(DEFAULT_SHEET_NAME);
        tracing::info!(sheet = name, "creating missing sheet");
        self.sheets.push(Sheet::new(name));
        self.sheets.len() - 1
    }

    pub(crate) fn sheet_at_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    fn sheet_index(&self, name: Option<&str>) -> Result<usize, SheetError> {
        match name {
            Some(name) => self
                .sheets
                .iter()
                .position(|sheet| sheet.name() == name)
                .ok_or_else(|| SheetError::SheetNotFound(name.to_string())),
            None if self.sheets.is_empty() => {
                Err(SheetError::SheetNotFound(DEFAULT_SHEET_NAME.to_string()))
            }
            None => Ok(0),
        }
    }
}

/// Creates `path` holding a single sheet with `header` when nothing exists
/// there yet. Returns whether a file was created.
pub fn ensure_file_exists(path: &Path, header: &[&str]) -> Result<bool, SheetError> {
    if path.exists() {
        return Ok(false);
    }

    Workbook::with_header(header).save(path)?;
    tracing::info!(path = %path.display(), "created dataset workbook");
    Ok(true)
}

/// Reads every `<c>` element of a worksheet, blank ones included, into a
/// rectangular grid anchored at A1. `worksheet_range` drops blank cells, which
/// would lose rows whose cells are all empty.
fn read_sheet_rows<RS>(
    source: &mut Xlsx<RS>,
    name: &str,
) -> Result<Vec<Vec<CellValue>>, XlsxError>
where
    RS: std::io::Read + std::io::Seek,
{
    let mut reader = match source.worksheet_cells_reader(name) {
        Ok(reader) => reader,
        Err(XlsxError::NotAWorksheet(kind)) => {
            tracing::warn!(sheet = name, kind = %kind, "non-worksheet sheet loaded empty");
            return Ok(Vec::new());
        }
        Err(error) => return Err(error),
    };

    let mut cells = Vec::new();
    while let Some(cell) = reader.next_cell()? {
        let (row, col) = cell.get_position();
        let value = cell_from_data(&Data::from(cell.get_value().clone()));
        cells.push((row as usize, col as usize, value));
    }

    let Some(height) = cells.iter().map(|(row, _, _)| row + 1).max() else {
        return Ok(Vec::new());
    };
    let width = cells.iter().map(|(_, col, _)| col + 1).max().unwrap_or(0);

    let mut rows = vec![vec![CellValue::Empty; width]; height];
    for (row, col, value) in cells {
        rows[row][col] = value;
    }
    Ok(rows)
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Float(value) => CellValue::Number(*value),
        Data::String(value) => CellValue::Text(value.clone()),
        Data::Bool(value) => CellValue::Bool(*value),
        Data::DateTime(value) => CellValue::DateTime(value.as_f64()),
        other => CellValue::Text(other.to_string()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));
    fs::write(&tmp_path, bytes)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}
