use serde_json::Value;
use url::form_urlencoded;

use crate::model::{Coordinates, WeatherRecord};

const FORECAST_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";
const FORECAST_DAILY_FIELDS: &str = "temperature_2m_min,temperature_2m_max";

/// Forecast URL for `coordinates`. Parameter order is fixed so equal inputs
/// always produce byte-identical URLs.
pub fn build_forecast_url(coordinates: Coordinates) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("latitude", &coordinates.latitude.to_string())
        .append_pair("longitude", &coordinates.longitude.to_string())
        .append_pair("current_weather", "true")
        .append_pair("daily", FORECAST_DAILY_FIELDS)
        .append_pair("timezone", "auto")
        .finish();

    format!("{FORECAST_ENDPOINT}?{query}")
}

/// Missing, null or mistyped fields come back as `None`; this never fails.
pub fn parse_weather(doc: &Value) -> WeatherRecord {
    WeatherRecord {
        current_temp: doc
            .pointer("/current_weather/temperature")
            .and_then(Value::as_f64),
        min_temp: first_daily(doc, "temperature_2m_min").and_then(Value::as_f64),
        max_temp: first_daily(doc, "temperature_2m_max").and_then(Value::as_f64),
        date: first_daily(doc, "time")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    }
}

fn first_daily<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    doc.get("daily")?.get(field)?.get(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use url::Url;

    use super::*;

    fn query_map(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .expect("valid url")
            .query_pairs()
            .into_owned()
            .collect()
    }

    #[test]
    fn open_meteo_url_query_decodes_to_expected_params() {
        for (lat, lon) in [(-25.5167, -54.6167), (52.52, 13.405), (0.0, 180.0)] {
            let url = build_forecast_url(Coordinates::new(lat, lon));
            let params = query_map(&url);

            assert_eq!(params.len(), 5);
            assert_eq!(params["latitude"].parse::<f64>().expect("lat"), lat);
            assert_eq!(params["longitude"].parse::<f64>().expect("lon"), lon);
            assert_eq!(params["current_weather"], "true");
            assert_eq!(params["daily"], "temperature_2m_min,temperature_2m_max");
            assert_eq!(params["timezone"], "auto");
        }
    }

    #[test]
    fn open_meteo_url_is_deterministic_and_encodes_commas() {
        let url = build_forecast_url(Coordinates::new(-25.5167, -54.6167));

        assert_eq!(
            url,
            "https://api.open-meteo.com/v1/forecast?latitude=-25.5167&longitude=-54.6167\
             &current_weather=true&daily=temperature_2m_min%2Ctemperature_2m_max&timezone=auto"
        );
        assert_eq!(url, build_forecast_url(Coordinates::new(-25.5167, -54.6167)));
    }

    #[test]
    fn open_meteo_parse_extracts_all_fields() {
        let doc = json!({
            "current_weather": {"temperature": 21.5},
            "daily": {
                "temperature_2m_min": [15.0],
                "temperature_2m_max": [25.0],
                "time": ["2025-01-01"]
            }
        });

        assert_eq!(
            parse_weather(&doc),
            WeatherRecord {
                current_temp: Some(21.5),
                min_temp: Some(15.0),
                max_temp: Some(25.0),
                date: Some("2025-01-01".to_string()),
            }
        );
    }

    #[test]
    fn open_meteo_parse_empty_document_yields_absent_fields() {
        assert_eq!(parse_weather(&json!({})), WeatherRecord::default());
        assert_eq!(parse_weather(&json!([1, 2, 3])), WeatherRecord::default());
    }

    #[test]
    fn open_meteo_parse_tolerates_partial_and_mistyped_payloads() {
        let doc = json!({
            "current_weather": {"temperature": null},
            "daily": {
                "temperature_2m_min": [],
                "temperature_2m_max": ["hot"],
                "time": ["2025-07-14", "2025-07-15"]
            }
        });

        assert_eq!(
            parse_weather(&doc),
            WeatherRecord {
                date: Some("2025-07-14".to_string()),
                ..WeatherRecord::default()
            }
        );
    }

    #[test]
    fn open_meteo_parse_reads_integer_temperatures() {
        let doc = json!({"current_weather": {"temperature": 18}});

        assert_eq!(parse_weather(&doc).current_temp, Some(18.0));
    }
}
