//! Address resolution boundary.
//!
//! Failures never propagate: a lookup that cannot be served degrades to an
//! empty suggestion list.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::coordinate::Coordinate;

pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_SUGGESTIONS: usize = 5;

const USER_AGENT: &str = "porter-dispatch/0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    pub display_name: String,
    pub latitude: String,
    pub longitude: String,
}

impl AddressSuggestion {
    /// Parsed coordinate, if the resolver returned a usable one.
    pub fn coordinate(&self) -> Option<Coordinate> {
        let latitude = self.latitude.trim().parse().ok()?;
        let longitude = self.longitude.trim().parse().ok()?;
        Coordinate::new(latitude, longitude).ok()
    }
}

pub trait AddressResolver: Send + Sync {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Vec<AddressSuggestion>>;
}

/// Looks up `query`, skipping the resolver entirely for queries shorter than
/// two characters. Suggestions that cannot be placed on the map are dropped.
pub async fn suggest(resolver: &dyn AddressResolver, query: &str) -> Vec<AddressSuggestion> {
    if query.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }

    let mut suggestions = resolver.search(query).await;
    let found = suggestions.len();
    suggestions.retain(|suggestion| suggestion.coordinate().is_some());
    if suggestions.len() < found {
        debug!(query, dropped = found - suggestions.len(), "unplaceable suggestions dropped");
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NominatimResolver {
    config: NominatimConfig,
    client: reqwest::Client,
}

impl NominatimResolver {
    pub fn new(config: NominatimConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { config, client })
    }

    async fn fetch(&self, query: &str) -> Result<Vec<NominatimPlace>, reqwest::Error> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));

        self.client
            .get(url)
            .query(&[("format", "json"), ("q", query)])
            .header(reqwest::header::ACCEPT_LANGUAGE, "en")
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<NominatimPlace>>()
            .await
    }
}

impl AddressResolver for NominatimResolver {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Vec<AddressSuggestion>> {
        async move {
            match self.fetch(query).await {
                Ok(places) => {
                    debug!(query, results = places.len(), "address lookup succeeded");
                    places
                        .into_iter()
                        .take(MAX_SUGGESTIONS)
                        .map(AddressSuggestion::from)
                        .collect()
                }
                Err(err) => {
                    warn!(query, error = %err, "address lookup failed");
                    Vec::new()
                }
            }
        }
        .boxed()
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

impl From<NominatimPlace> for AddressSuggestion {
    fn from(place: NominatimPlace) -> Self {
        Self {
            display_name: place.display_name,
            latitude: place.lat,
            longitude: place.lon,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;
    use futures::FutureExt;

    use super::{suggest, AddressResolver, AddressSuggestion, NominatimConfig, NominatimResolver};

    #[derive(Default)]
    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl AddressResolver for CountingResolver {
        fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Vec<AddressSuggestion>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let results = (0..8)
                .map(|i| AddressSuggestion {
                    display_name: format!("{query} {i}"),
                    latitude: "19.07".to_string(),
                    longitude: "72.87".to_string(),
                })
                .collect();
            futures::future::ready(results).boxed()
        }
    }

    #[tokio::test]
    async fn short_queries_never_reach_the_resolver() {
        let resolver = CountingResolver::default();

        assert!(suggest(&resolver, "").await.is_empty());
        assert!(suggest(&resolver, "M").await.is_empty());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn results_are_capped_at_five() {
        let resolver = CountingResolver::default();

        let results = suggest(&resolver, "CST").await;
        assert_eq!(results.len(), 5);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    struct MixedResolver;

    impl AddressResolver for MixedResolver {
        fn search<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, Vec<AddressSuggestion>> {
            let place = |name: &str, lat: &str, lon: &str| AddressSuggestion {
                display_name: name.to_string(),
                latitude: lat.to_string(),
                longitude: lon.to_string(),
            };
            futures::future::ready(vec![
                place("Churchgate", "18.9322", "72.8264"),
                place("Nowhere", "", "72.8"),
                place("Off the globe", "123.0", "72.8"),
                place("Marine Lines", "18.9457", "72.8236"),
            ])
            .boxed()
        }
    }

    #[tokio::test]
    async fn suggestions_without_usable_coordinates_are_dropped() {
        let results = suggest(&MixedResolver, "Station").await;

        let names: Vec<_> = results.iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(names, ["Churchgate", "Marine Lines"]);
    }

    #[tokio::test]
    async fn unreachable_service_degrades_to_empty() {
        let resolver = NominatimResolver::new(NominatimConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        assert!(suggest(&resolver, "Mumbai Central").await.is_empty());
    }

    #[test]
    fn suggestion_coordinates_are_parsed_and_validated() {
        let good = AddressSuggestion {
            display_name: "Mumbai Central".to_string(),
            latitude: "18.9690".to_string(),
            longitude: "72.8205".to_string(),
        };
        let bad = AddressSuggestion {
            latitude: "north".to_string(),
            ..good.clone()
        };

        let coordinate = good.coordinate().unwrap();
        assert_eq!(coordinate.latitude, 18.969);
        assert!(bad.coordinate().is_none());
    }
}
