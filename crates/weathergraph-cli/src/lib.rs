//! Weather dataset builder.
//!
//! - `geocoding`: place name to coordinates via Nominatim.
//! - `providers`: blocking JSON fetcher and the Open-Meteo request/response helpers.
//! - `service`: the fetch pipeline tying the pieces together.
//! - `sheet`: xlsx-backed tabular reader and writer.
//! - `config`: environment and TOML preferences.

pub mod config;
pub mod error;
pub mod geocoding;
pub mod logging;
pub mod model;
pub mod providers;
pub mod service;
pub mod sheet;

pub use error::{AppError, ErrorKind};
pub use model::{Coordinates, DATASET_HEADER, WeatherRecord};
pub use service::WeatherConnector;
