//! HTTP handler functions for the PDSC query API.

use crate::AppState;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use pdsc_types::{Metadata, Predicate};
use serde::Deserialize;
use std::fmt;

/// Wrapper mapping engine errors onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pdsc::Error);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<pdsc::Error> for ApiError {
    fn from(e: pdsc::Error) -> ApiError {
        ApiError(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            pdsc::Error::UnknownInstrument { .. } | pdsc::Error::UnknownObservation { .. } => {
                StatusCode::NOT_FOUND
            }
            pdsc::Error::BadQuery { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("query failed: {}", self.0);
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "code": self.0.code(),
            "error": self.0.to_string(),
        }))
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub instrument: String,
    #[serde(default)]
    pub conditions: Vec<Predicate>,
}

/// `POST /query`
pub async fn query(
    state: web::Data<AppState>,
    body: web::Json<QueryBody>,
) -> Result<HttpResponse, ApiError> {
    let records = state.client.query(&body.instrument, &body.conditions)?;
    Ok(HttpResponse::Ok().json(records))
}

/// One observation id or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ObservationIds {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct ByObservationIdBody {
    pub instrument: String,
    pub observation_ids: ObservationIds,
}

/// `POST /queryByObservationId`
pub async fn query_by_observation_id(
    state: web::Data<AppState>,
    body: web::Json<ByObservationIdBody>,
) -> Result<HttpResponse, ApiError> {
    let ids: Vec<&str> = match &body.observation_ids {
        ObservationIds::One(id) => vec![id.as_str()],
        ObservationIds::Many(ids) => ids.iter().map(String::as_str).collect(),
    };

    let mut records: Vec<Metadata> = Vec::new();
    for id in ids {
        for record in state.client.query_by_observation_id(&body.instrument, id)? {
            if !records.contains(&record) {
                records.push(record);
            }
        }
    }
    Ok(HttpResponse::Ok().json(records))
}

#[derive(Debug, Deserialize)]
pub struct LatLonParams {
    pub instrument: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub radius: f64,
}

/// `GET /queryByLatLon`
pub async fn query_by_latlon(
    state: web::Data<AppState>,
    params: web::Query<LatLonParams>,
) -> Result<HttpResponse, ApiError> {
    let ids = state.client.find_observations_of_latlon(
        &params.instrument,
        params.lat,
        params.lon,
        params.radius,
    )?;
    Ok(HttpResponse::Ok().json(ids))
}

#[derive(Debug, Deserialize)]
pub struct OverlapParams {
    pub instrument: String,
    pub observation_id: String,
    pub other_instrument: String,
}

/// `GET /queryByOverlap`
pub async fn query_by_overlap(
    state: web::Data<AppState>,
    params: web::Query<OverlapParams>,
) -> Result<HttpResponse, ApiError> {
    let ids = state.client.find_overlapping_observations(
        &params.instrument,
        &params.observation_id,
        &params.other_instrument,
    )?;
    Ok(HttpResponse::Ok().json(ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_ids_accepts_one_or_many() {
        let body: ByObservationIdBody = serde_json::from_str(
            r#"{"instrument": "hirise_rdr", "observation_ids": "PSP_005423_1780"}"#,
        )
        .unwrap();
        assert!(matches!(body.observation_ids, ObservationIds::One(_)));

        let body: ByObservationIdBody = serde_json::from_str(
            r#"{"instrument": "hirise_rdr", "observation_ids": ["A", "B"]}"#,
        )
        .unwrap();
        match body.observation_ids {
            ObservationIds::Many(ids) => assert_eq!(ids, ["A", "B"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn query_body_conditions_are_predicate_triples() {
        let body: QueryBody = serde_json::from_str(
            r#"{"instrument": "hirise_rdr",
                "conditions": [["corner1_latitude", ">", -0.5],
                               ["corner1_latitude", "<", 0.5]]}"#,
        )
        .unwrap();
        assert_eq!(body.conditions.len(), 2);
        assert_eq!(body.conditions[0].column(), "corner1_latitude");
    }

    #[test]
    fn error_statuses() {
        let e = ApiError(pdsc::Error::UnknownInstrument {
            instrument: "x".into(),
        });
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        let e = ApiError(pdsc::Error::bad_query("nope"));
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        let e = ApiError(pdsc::Error::corrupt("/tmp/x", "truncated"));
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
