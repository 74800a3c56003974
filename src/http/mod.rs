mod routes;
mod types;

use crate::http::routes::*;
use crate::relay::RelayManager;
use axum::http::{HeaderName, HeaderValue};
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

#[derive(Clone)]
pub struct HttpState {
    pub relay: RelayManager,
    pub verify_token: String,
}

pub fn create_app(relay: RelayManager, verify_token: String) -> axum::Router {
    let state = HttpState {
        relay,
        verify_token,
    };

    axum::Router::new()
        .route("/", get(status))
        .route("/webhook", get(webhook_verify).post(webhook_receive))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-version"),
            HeaderValue::from_static(crate::VERSION),
        ))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}
