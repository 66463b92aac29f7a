//! HTTP client for a remote PDSC server.
//!
//! Mirrors the local `PdsClient` query surface over the JSON protocol.
//!
//! # Example
//!
//! ```ignore
//! use pdsc_client::PdsHttpClient;
//!
//! let client = PdsHttpClient::new(Some("localhost"), Some(7372))?;
//! let ids = client
//!     .find_observations_of_latlon("hirise_rdr", -4.5, 137.4, 0.0)
//!     .await?;
//! ```

use pdsc_types::{Metadata, Predicate};
use serde::Deserialize;

/// Environment variable naming the PDSC server host.
pub const SERVER_VAR: &str = "PDSC_SERVER_HOST";

/// Environment variable naming the PDSC server port.
pub const PORT_VAR: &str = "PDSC_SERVER_PORT";

pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for remote query operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server error {code}: {message}")]
    Server { code: String, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    error: String,
}

/// Client for a remote PDSC server; the interface matches the local
/// `PdsClient`.
#[derive(Debug, Clone)]
pub struct PdsHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl PdsHttpClient {
    /// Connect to `host:port`. Either argument falls back to its
    /// environment variable; the port may also be omitted entirely.
    pub fn new(host: Option<&str>, port: Option<u16>) -> Result<PdsHttpClient> {
        let host = match host {
            Some(h) => h.to_string(),
            None => std::env::var(SERVER_VAR).map_err(|_| {
                ClientError::Config(format!(
                    "must specify server hostname or set {SERVER_VAR}"
                ))
            })?,
        };
        let port = match port {
            Some(p) => Some(p),
            None => match std::env::var(PORT_VAR) {
                Ok(v) => Some(v.parse().map_err(|_| {
                    ClientError::Config(format!("port must be an integer (got \"{v}\")"))
                })?),
                Err(_) => None,
            },
        };

        let base_url = match port {
            Some(p) => format!("http://{host}:{p}"),
            None => format!("http://{host}"),
        };
        Ok(PdsHttpClient {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            match response.json::<ErrorBody>().await {
                Ok(body) => Err(ClientError::Server {
                    code: body.code,
                    message: body.error,
                }),
                Err(e) => Err(ClientError::Request(e)),
            }
        }
    }

    /// Metadata records matching the conjunction of `conditions`.
    pub async fn query(
        &self,
        instrument: &str,
        conditions: &[Predicate],
    ) -> Result<Vec<Metadata>> {
        let response = self
            .http
            .post(format!("{}/query", self.base_url))
            .json(&serde_json::json!({
                "instrument": instrument,
                "conditions": conditions,
            }))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// All metadata records for one observation id.
    pub async fn query_by_observation_id(
        &self,
        instrument: &str,
        observation_id: &str,
    ) -> Result<Vec<Metadata>> {
        self.query_by_observation_ids(instrument, &[observation_id])
            .await
    }

    /// All metadata records for any of the given observation ids.
    pub async fn query_by_observation_ids(
        &self,
        instrument: &str,
        observation_ids: &[&str],
    ) -> Result<Vec<Metadata>> {
        let response = self
            .http
            .post(format!("{}/queryByObservationId", self.base_url))
            .json(&serde_json::json!({
                "instrument": instrument,
                "observation_ids": observation_ids,
            }))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Observations whose footprint contains, or lies within
    /// `radius_m` of, the given location.
    pub async fn find_observations_of_latlon(
        &self,
        instrument: &str,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/queryByLatLon", self.base_url))
            .query(&[
                ("instrument", instrument.to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("radius", radius_m.to_string()),
            ])
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Observations of `other_instrument` overlapping the footprint of
    /// `observation_id` from `instrument`.
    pub async fn find_overlapping_observations(
        &self,
        instrument: &str,
        observation_id: &str,
        other_instrument: &str,
    ) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/queryByOverlap", self.base_url))
            .query(&[
                ("instrument", instrument),
                ("observation_id", observation_id),
                ("other_instrument", other_instrument),
            ])
            .send()
            .await?;
        Self::decode(response).await
    }
}
