//! HTTP/JSON server for PDSC.
//!
//! Wraps a shared [`PdsClient`] and exposes the four query operations:
//!
//! - `POST /query` — metadata records matching predicates
//! - `POST /queryByObservationId` — metadata records by id(s)
//! - `GET /queryByLatLon` — observation ids covering a point
//! - `GET /queryByOverlap` — observation ids overlapping an observation
//!
//! Responses are JSON; errors carry a stable `code` alongside the
//! message and map onto HTTP statuses (unknown instrument/observation →
//! 404, bad query → 400, corrupt index → 500).

mod handlers;

use actix_web::{web, App, HttpServer};
use pdsc::PdsClient;
use std::net::TcpListener;
use std::sync::Arc;
use tracing::info;

/// Default PDSC server port (7372 is P-D-S-C on a numeric keypad).
pub const DEFAULT_SERVER_PORT: u16 = 7372;

/// Default listen interface.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Environment variable naming the server host.
pub const SERVER_VAR: &str = "PDSC_SERVER_HOST";

/// Environment variable naming the server port.
pub const PORT_VAR: &str = "PDSC_SERVER_PORT";

/// Shared application state.
pub struct AppState {
    pub client: Arc<PdsClient>,
}

/// Register the query routes on an actix `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/query", web::post().to(handlers::query))
        .route(
            "/queryByObservationId",
            web::post().to(handlers::query_by_observation_id),
        )
        .route("/queryByLatLon", web::get().to(handlers::query_by_latlon))
        .route("/queryByOverlap", web::get().to(handlers::query_by_overlap));
}

/// Run the server until the process is interrupted.
pub async fn run_server(listener: TcpListener, client: Arc<PdsClient>) -> std::io::Result<()> {
    info!(
        "PDSC server listening on {}",
        listener.local_addr().map_or_else(
            |_| "unknown".to_string(),
            |a| a.to_string()
        )
    );
    let state = web::Data::new(AppState { client });
    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .listen(listener)?
        .run()
        .await
}
