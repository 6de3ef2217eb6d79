use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::external::geocode::{suggest, AddressSuggestion};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/geocode", get(search_address))
}

#[derive(Deserialize)]
pub struct GeocodeParams {
    #[serde(default)]
    pub q: String,
}

async fn search_address(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeParams>,
) -> Json<Vec<AddressSuggestion>> {
    let suggestions = suggest(state.geocoder.as_ref(), &params.q).await;

    let outcome = if suggestions.is_empty() { "empty" } else { "found" };
    state
        .metrics
        .geocode_requests_total
        .with_label_values(&[outcome])
        .inc();

    Json(suggestions)
}
