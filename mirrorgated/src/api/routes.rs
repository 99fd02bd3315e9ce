use std::sync::Arc;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Router,
};
use rand::seq::SliceRandom;
use tokio::sync::watch;
use shared::protocol::NO_SERVER_BODY;
use shared::types::AvailabilityRecord;
use crate::api::status_page;
use crate::catalog::Catalog;
use crate::state_manager::StateHandle;

#[derive(Clone)]
pub struct AppState {
    pub state: StateHandle,
    pub catalog_rx: watch::Receiver<Arc<Catalog>>,
}

/// Outcome of routing one request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Redirect to this absolute URL
    Redirect(String),
    /// Known service, nothing available
    NoServer,
    /// Unknown or missing service type
    StatusPage,
}

/// Every path is routed by its first segment, so the whole surface is one fallback
pub fn router(state: AppState) -> Router {
    Router::new().fallback(route_request).with_state(state)
}

async fn route_request(State(app): State<AppState>, uri: Uri) -> Response {
    let catalog = app.catalog_rx.borrow().clone();

    match decide(&uri, &catalog, &app.state) {
        Decision::Redirect(target) => {
            tracing::debug!(path = uri.path(), %target, "Redirecting");
            (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
        }
        Decision::NoServer => {
            tracing::debug!(path = uri.path(), "No server available");
            (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "application/json")],
                NO_SERVER_BODY,
            )
                .into_response()
        }
        Decision::StatusPage => {
            Html(status_page::render(&catalog, &app.state.read_all())).into_response()
        }
    }
}

/// Pick where a request goes, choosing uniformly among available groups
pub fn decide(uri: &Uri, catalog: &Catalog, state: &StateHandle) -> Decision {
    let (requested, rest) = split_path(uri.path());

    if requested.is_empty() || catalog.get(requested).is_none() {
        return Decision::StatusPage;
    }

    let records = state.read(requested);
    let available: Vec<&AvailabilityRecord> = records
        .iter()
        .flat_map(|records| records.iter())
        .filter(|record| record.available)
        .collect();

    match available.choose(&mut rand::thread_rng()) {
        Some(record) => Decision::Redirect(redirect_target(record.base_url(), rest, uri.query())),
        None => Decision::NoServer,
    }
}

/// Split `/type/rest...` into `("type", "/rest...")`
pub fn split_path(path: &str) -> (&str, &str) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.find('/') {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    }
}

/// Instance base, then the remaining path, then the raw query if non-empty
pub fn redirect_target(base: &str, rest: &str, query: Option<&str>) -> String {
    let mut target = format!("{}{}", base.trim_end_matches('/'), rest);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }
    target
}
