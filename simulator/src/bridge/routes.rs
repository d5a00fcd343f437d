use crate::bridge::model::LocationsResponse;
use chrono::Utc;
use potholecore::detection::Severity;
use potholecore::pipeline::DetectionPipeline;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

const DEFAULT_LOCATION_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub severity: Option<String>,
    pub limit: Option<usize>,
}

fn json_reply<T: serde::Serialize>(body: &T) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(body), StatusCode::OK)
}

fn error_reply(status: StatusCode, message: String) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
}

/// `GET /stats`, `GET /locations?severity=&limit=`, `GET /metrics`.
pub fn routes(
    pipeline: Arc<DetectionPipeline>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let pipeline_filter = warp::any().map(move || pipeline.clone());

    let stats = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(pipeline_filter.clone())
        .map(
            |pipeline: Arc<DetectionPipeline>| match pipeline.statistics(Utc::now()) {
                Ok(stats) => json_reply(&stats),
                Err(err) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            },
        );

    let locations = warp::path("locations")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<LocationQuery>())
        .and(pipeline_filter.clone())
        .map(|query: LocationQuery, pipeline: Arc<DetectionPipeline>| {
            let severity = match query
                .severity
                .as_deref()
                .map(str::parse::<Severity>)
                .transpose()
            {
                Ok(severity) => severity,
                Err(err) => return error_reply(StatusCode::BAD_REQUEST, err.to_string()),
            };
            let limit = query.limit.unwrap_or(DEFAULT_LOCATION_LIMIT);
            match pipeline.locations(severity, limit) {
                Ok(records) => json_reply(&LocationsResponse::from_records(&records)),
                Err(err) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            }
        });

    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(pipeline_filter)
        .map(|pipeline: Arc<DetectionPipeline>| json_reply(&pipeline.metrics()));

    stats.or(locations).unify().or(metrics).unify()
}
