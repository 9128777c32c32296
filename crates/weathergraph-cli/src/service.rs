use crate::config::DatasetTarget;
use crate::error::AppError;
use crate::geocoding::CoordinateResolver;
use crate::model::WeatherRecord;
use crate::providers::open_meteo::{build_forecast_url, parse_weather};
use crate::providers::{JsonFetcher, ProviderError};
use crate::sheet::SheetWriter;

/// Runs resolve -> build URL -> GET -> parse for one location. The first
/// failing stage ends the run and its error is returned unchanged.
#[derive(Debug, Clone)]
pub struct WeatherConnector<R, F> {
    resolver: R,
    fetcher: F,
}

impl<R, F> WeatherConnector<R, F>
where
    R: CoordinateResolver,
    F: JsonFetcher,
{
    pub fn new(resolver: R, fetcher: F) -> Self {
        Self { resolver, fetcher }
    }

    pub fn fetch(&self, location: &str) -> Result<WeatherRecord, ProviderError> {
        let coordinates = self.resolver.resolve(location)?;
        tracing::debug!(
            location,
            latitude = coordinates.latitude,
            longitude = coordinates.longitude,
            "coordinates resolved"
        );

        let url = build_forecast_url(coordinates);
        let body = self.fetcher.get_json(&url)?;
        let record = parse_weather(&body);
        tracing::debug!(?record, "forecast parsed");

        Ok(record)
    }
}

/// One run of the tool: fetch weather for `location` and append it as a row
/// of the dataset described by `target`.
pub fn record_weather<R, F>(
    connector: &WeatherConnector<R, F>,
    location: &str,
    target: &DatasetTarget,
) -> Result<WeatherRecord, AppError>
where
    R: CoordinateResolver,
    F: JsonFetcher,
{
    let record = connector.fetch(location)?;
    if record == WeatherRecord::default() {
        tracing::warn!(location, "forecast payload carried no usable fields");
    }

    let mut writer = SheetWriter::open(&target.path, target.sheet.as_deref())?;
    writer.append(record.to_row())?;
    writer.close();

    Ok(record)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::{Value, json};

    use super::*;
    use crate::model::{Coordinates, DATASET_HEADER};
    use crate::sheet::{CellValue, SheetReader};

    struct FixedResolver(Result<Coordinates, ProviderError>);

    impl CoordinateResolver for FixedResolver {
        fn resolve(&self, _location: &str) -> Result<Coordinates, ProviderError> {
            self.0.clone()
        }
    }

    struct RecordingFetcher {
        response: Result<Value, ProviderError>,
        urls: RefCell<Vec<String>>,
    }

    impl RecordingFetcher {
        fn new(response: Result<Value, ProviderError>) -> Self {
            Self {
                response,
                urls: RefCell::new(Vec::new()),
            }
        }
    }

    impl JsonFetcher for RecordingFetcher {
        fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
            self.urls.borrow_mut().push(url.to_string());
            self.response.clone()
        }
    }

    fn forecast_body() -> Value {
        json!({
            "current_weather": {"temperature": 30.1},
            "daily": {
                "temperature_2m_min": [22.4],
                "temperature_2m_max": [33.0],
                "time": ["2025-11-02"]
            }
        })
    }

    #[test]
    fn connector_fetch_runs_full_pipeline() {
        let coordinates = Coordinates::new(-25.5167, -54.6167);
        let fetcher = RecordingFetcher::new(Ok(forecast_body()));
        let connector = WeatherConnector::new(FixedResolver(Ok(coordinates)), &fetcher);

        let record = connector.fetch("Ciudad del Este, Paraguay").expect("record");

        assert_eq!(
            record,
            WeatherRecord {
                current_temp: Some(30.1),
                min_temp: Some(22.4),
                max_temp: Some(33.0),
                date: Some("2025-11-02".to_string()),
            }
        );
        assert_eq!(*fetcher.urls.borrow(), vec![build_forecast_url(coordinates)]);
    }

    #[test]
    fn connector_geocoding_failure_skips_forecast_request() {
        let fetcher = RecordingFetcher::new(Ok(forecast_body()));
        let connector = WeatherConnector::new(
            FixedResolver(Err(ProviderError::NotFound("Atlantis".to_string()))),
            &fetcher,
        );

        let error = connector.fetch("Atlantis").expect_err("must fail");

        assert_eq!(error, ProviderError::NotFound("Atlantis".to_string()));
        assert!(fetcher.urls.borrow().is_empty());
    }

    #[test]
    fn connector_propagates_request_errors_unchanged() {
        let failure = ProviderError::Http {
            status: 429,
            message: "Too Many Requests".to_string(),
        };
        let fetcher = RecordingFetcher::new(Err(failure.clone()));
        let connector =
            WeatherConnector::new(FixedResolver(Ok(Coordinates::new(1.0, 2.0))), &fetcher);

        assert_eq!(connector.fetch("Somewhere"), Err(failure));
    }

    #[test]
    fn connector_returns_partial_record_for_partial_payload() {
        let fetcher = RecordingFetcher::new(Ok(json!({"daily": {"time": ["2025-01-01"]}})));
        let connector =
            WeatherConnector::new(FixedResolver(Ok(Coordinates::new(1.0, 2.0))), &fetcher);

        let record = connector.fetch("Somewhere").expect("record");

        assert_eq!(record.date.as_deref(), Some("2025-01-01"));
        assert_eq!(record.current_temp, None);
    }

    #[test]
    fn record_weather_appends_fetched_row() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = DatasetTarget {
            path: dir.path().join("data").join("data.xlsx"),
            sheet: None,
        };
        let fetcher = RecordingFetcher::new(Ok(forecast_body()));
        let connector =
            WeatherConnector::new(FixedResolver(Ok(Coordinates::new(1.0, 2.0))), &fetcher);

        record_weather(&connector, "Somewhere", &target).expect("first run");
        let record = record_weather(&connector, "Somewhere", &target).expect("second run");

        let mut reader = SheetReader::new(&target.path).expect("reader");
        reader.open().expect("open");
        assert_eq!(reader.headers(None).expect("headers"), DATASET_HEADER);
        let rows = reader.get_all(None).expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["current_temp"], CellValue::Number(30.1));
        assert_eq!(rows[1]["date"], CellValue::from(record.date));
    }

    #[test]
    fn record_weather_leaves_dataset_untouched_on_fetch_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = DatasetTarget {
            path: dir.path().join("data.xlsx"),
            sheet: None,
        };
        let fetcher = RecordingFetcher::new(Ok(forecast_body()));
        let connector = WeatherConnector::new(
            FixedResolver(Err(ProviderError::NotFound("Atlantis".to_string()))),
            &fetcher,
        );

        let error = record_weather(&connector, "Atlantis", &target).expect_err("must fail");

        assert_eq!(
            error,
            AppError::Provider(ProviderError::NotFound("Atlantis".to_string()))
        );
        assert!(!target.path.exists());
    }

    #[test]
    fn record_weather_writes_into_named_sheet() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = DatasetTarget {
            path: dir.path().join("data.xlsx"),
            sheet: Some("Asuncion".to_string()),
        };
        let fetcher = RecordingFetcher::new(Ok(forecast_body()));
        let connector =
            WeatherConnector::new(FixedResolver(Ok(Coordinates::new(1.0, 2.0))), &fetcher);

        record_weather(&connector, "Asunción", &target).expect("run");

        let mut reader = SheetReader::new(&target.path).expect("reader");
        reader.open().expect("open");
        assert!(reader.get_all(None).expect("default sheet").is_empty());
        let rows = reader.get_all(Some("Asuncion")).expect("named sheet");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 4);
    }
}
