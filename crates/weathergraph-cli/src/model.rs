use serde::Serialize;

use crate::sheet::CellValue;

/// Header row written to a freshly created dataset.
pub const DATASET_HEADER: [&str; 4] = ["current_temp", "min_temp", "max_temp", "date"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One fetch worth of weather data. Every field is optional because the
/// upstream payload may be partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub current_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub date: Option<String>,
}

impl WeatherRecord {
    /// Cells in `DATASET_HEADER` order; absent fields become empty cells.
    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::from(self.current_temp),
            CellValue::from(self.min_temp),
            CellValue::from(self.max_temp),
            CellValue::from(self.date.clone()),
        ]
    }

    pub fn summary(&self) -> String {
        format!(
            "date={} current={} min={} max={}",
            self.date.as_deref().unwrap_or("-"),
            format_temp(self.current_temp),
            format_temp(self.min_temp),
            format_temp(self.max_temp),
        )
    }
}

fn format_temp(value: Option<f64>) -> String {
    value
        .map(|temp| format!("{temp:.1}°C"))
        .unwrap_or_else(|| "-".to_string())
}
