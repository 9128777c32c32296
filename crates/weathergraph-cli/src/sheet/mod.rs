//! xlsx-backed tabular storage.
//!
//! Row 1 of every sheet is the header; data starts at row 2. Row numbers in
//! errors and range math are 1-based to match what a spreadsheet user sees.

use std::path::PathBuf;

use thiserror::Error;

pub mod reader;
pub mod workbook;
pub mod writer;

pub use reader::{RowRecord, SheetReader};
pub use workbook::{CellValue, DEFAULT_SHEET_NAME, Sheet, Workbook, ensure_file_exists};
pub use writer::SheetWriter;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("workbook file does not exist: {0}")]
    MissingFile(PathBuf),
    #[error("cannot open workbook {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("workbook is not loaded")]
    NotLoaded,
    #[error("sheet '{0}' not found in workbook")]
    SheetNotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid row: {0}")]
    InvalidRow(String),
    #[error("row {row} has {found} cells but the header has {expected}")]
    SchemaMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("failed to save workbook {path}: {message}")]
    Persistence { path: PathBuf, message: String },
}
