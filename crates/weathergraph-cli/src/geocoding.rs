use serde::Deserialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::model::Coordinates;
use crate::providers::{JsonFetcher, ProviderError};

const SEARCH_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

pub trait CoordinateResolver {
    fn resolve(&self, location: &str) -> Result<Coordinates, ProviderError>;
}

/// Forward geocoding through OpenStreetMap Nominatim. Every call is a fresh
/// lookup; the fetcher is expected to send `CLIENT_USER_AGENT`, which the
/// Nominatim usage policy requires.
#[derive(Debug, Clone)]
pub struct NominatimResolver<F> {
    fetcher: F,
}

impl<F: JsonFetcher> NominatimResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

impl<F: JsonFetcher> CoordinateResolver for NominatimResolver<F> {
    fn resolve(&self, location: &str) -> Result<Coordinates, ProviderError> {
        let query = location.trim();
        if query.is_empty() {
            return Err(ProviderError::NotFound(location.to_string()));
        }

        let body = self.fetcher.get_json(&search_url(query))?;
        parse_search_response(body, query)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

pub fn search_url(query: &str) -> String {
    let params = form_urlencoded::Serializer::new(String::new())
        .append_pair("q", query)
        .append_pair("format", "json")
        .append_pair("limit", "1")
        .finish();

    format!("{SEARCH_ENDPOINT}?{params}")
}

fn parse_search_response(body: Value, query: &str) -> Result<Coordinates, ProviderError> {
    let results: Vec<SearchResult> = serde_json::from_value(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("geocode payload: {error}")))?;

    let Some(first) = results.into_iter().next() else {
        return Err(ProviderError::NotFound(query.to_string()));
    };

    let latitude = parse_degrees(&first.lat, "lat")?;
    let longitude = parse_degrees(&first.lon, "lon")?;
    tracing::debug!(query, latitude, longitude, "location resolved");

    Ok(Coordinates::new(latitude, longitude))
}

fn parse_degrees(raw: &str, field: &str) -> Result<f64, ProviderError> {
    raw.trim().parse::<f64>().map_err(|_| {
        ProviderError::InvalidResponse(format!("geocode payload: bad {field} value '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;

    struct StubFetcher {
        response: Result<Value, ProviderError>,
        requested: RefCell<Vec<String>>,
    }

    impl StubFetcher {
        fn returning(response: Result<Value, ProviderError>) -> Self {
            Self {
                response,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl JsonFetcher for StubFetcher {
        fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
            self.requested.borrow_mut().push(url.to_string());
            self.response.clone()
        }
    }

    #[test]
    fn geocoding_uses_first_match() {
        let fetcher = StubFetcher::returning(Ok(json!([
            {"lat": "-25.5097", "lon": "-54.6111", "display_name": "Ciudad del Este"},
            {"lat": "1.0", "lon": "2.0", "display_name": "Elsewhere"}
        ])));

        let coordinates = NominatimResolver::new(&fetcher)
            .resolve("Ciudad del Este, Paraguay")
            .expect("coordinates");

        assert_eq!(coordinates, Coordinates::new(-25.5097, -54.6111));
        assert_eq!(fetcher.requested.borrow().len(), 1);
    }

    #[test]
    fn geocoding_empty_result_is_not_found() {
        let fetcher = StubFetcher::returning(Ok(json!([])));

        let error = NominatimResolver::new(&fetcher)
            .resolve("Qwzxv Nowhere")
            .expect_err("must fail");

        assert_eq!(error, ProviderError::NotFound("Qwzxv Nowhere".to_string()));
    }

    #[test]
    fn geocoding_blank_location_fails_without_request() {
        let fetcher = StubFetcher::returning(Ok(json!([{"lat": "0", "lon": "0"}])));

        let error = NominatimResolver::new(&fetcher)
            .resolve("   ")
            .expect_err("must fail");

        assert!(matches!(error, ProviderError::NotFound(_)));
        assert!(fetcher.requested.borrow().is_empty());
    }

    #[test]
    fn geocoding_rejects_unparseable_coordinates() {
        let fetcher = StubFetcher::returning(Ok(json!([{"lat": "north", "lon": "0"}])));

        let error = NominatimResolver::new(&fetcher)
            .resolve("Berlin")
            .expect_err("must fail");

        assert!(matches!(error, ProviderError::InvalidResponse(message) if message.contains("lat")));
    }

    #[test]
    fn geocoding_propagates_fetch_errors() {
        let failure = ProviderError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        let fetcher = StubFetcher::returning(Err(failure.clone()));

        let error = NominatimResolver::new(&fetcher)
            .resolve("Berlin")
            .expect_err("must fail");

        assert_eq!(error, failure);
    }

    #[test]
    fn geocoding_search_url_encodes_non_ascii_queries() {
        let url = search_url("Москва, Россия");
        let parsed = url::Url::parse(&url).expect("valid url");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "Москва, Россия".to_string()),
                ("format".to_string(), "json".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
        assert!(url.is_ascii());
    }
}
