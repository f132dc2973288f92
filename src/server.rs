// src/server.rs

use serde::Serialize;
use std::{convert::Infallible, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{error, info};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use crate::{
    pipeline::{PageError, PageOutcome, Pipeline},
    sink::TargetTable,
};

/// Query string of an ETL invocation: `a`=project, `b`=dataset, `c`=table.
#[derive(Debug, Default)]
pub struct EtlQuery {
    a: Option<String>,
    b: Option<String>,
    c: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing required query parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("query parameter `{0}` given more than once")]
    DuplicateParameter(&'static str),
}

impl EtlQuery {
    /// Collect `a`, `b` and `c` from raw query pairs. Other keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, RequestError> {
        let mut query = Self::default();
        for (key, value) in pairs {
            let (slot, name) = match key.as_str() {
                "a" => (&mut query.a, "a"),
                "b" => (&mut query.b, "b"),
                "c" => (&mut query.c, "c"),
                _ => continue,
            };
            if slot.replace(value).is_some() {
                return Err(RequestError::DuplicateParameter(name));
            }
        }
        Ok(query)
    }

    pub fn into_target(self) -> Result<TargetTable, RequestError> {
        fn required(value: Option<String>, name: &'static str) -> Result<String, RequestError> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(RequestError::MissingParameter(name))
        }

        Ok(TargetTable::new(
            required(self.a, "a")?,
            required(self.b, "b")?,
            required(self.c, "c")?,
        ))
    }
}

#[derive(Serialize)]
struct EtlResponse {
    project: String,
    dataset: String,
    table: String,
    outcome: PageOutcome,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: Option<String>,
}

/// Escape text echoed back to the caller.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            _ => out.push(c),
        }
    }
    out
}

fn error_reply(status: StatusCode, error: &str, details: Option<String>) -> reply::Response {
    reply::with_status(
        reply::json(&ErrorResponse {
            error: error.to_string(),
            details,
        }),
        status,
    )
    .into_response()
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "etlpipeline"
    })))
}

async fn run_etl(
    pairs: Vec<(String, String)>,
    pipeline: Arc<Pipeline>,
) -> Result<reply::Response, Rejection> {
    let target = match EtlQuery::from_pairs(pairs).and_then(EtlQuery::into_target) {
        Ok(target) => target,
        Err(e) => {
            info!("rejected request: {}", e);
            return Ok(error_reply(
                StatusCode::BAD_REQUEST,
                "Invalid request",
                Some(e.to_string()),
            ));
        }
    };

    let start = Instant::now();
    match pipeline.process_next_page(&target).await {
        Ok(outcome) => {
            info!(
                %target,
                elapsed = ?start.elapsed(),
                inserted = outcome.inserted,
                failed = outcome.failed,
                "invocation finished"
            );
            Ok(reply::json(&EtlResponse {
                project: escape_html(&target.project),
                dataset: escape_html(&target.dataset),
                table: escape_html(&target.table),
                outcome,
            })
            .into_response())
        }
        Err(e) => {
            error!(%target, elapsed = ?start.elapsed(), "invocation failed: {}", e);
            let status = match e {
                PageError::Source(_) => StatusCode::BAD_GATEWAY,
                PageError::Cursor(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Ok(error_reply(status, "Processing failed", Some(e.to_string())))
        }
    }
}

fn with_pipeline(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = (Arc<Pipeline>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&pipeline))
}

/// `GET /health` plus the ETL trigger on `/` (GET or POST).
pub fn routes(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let etl = warp::path::end()
        .and(warp::get().or(warp::post()).unify())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_pipeline(pipeline))
        .and_then(run_etl);

    health.or(etl)
}
