//! HTTP serving interface: `GET /{card}?year=YYYY&month=MM`.
//!
//! Lookups go through the month cache on a blocking worker, since the portal
//! client and the disk tier are synchronous.

use crate::cache::{MonthCache, UsageFetcher};
use crate::service_log::ServiceLog;
use crate::usage::{MonthKey, UsageRecord};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared state for the usage handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<MonthCache>,
    pub fetcher: Arc<dyn UsageFetcher>,
    pub log: ServiceLog,
}

/// Body of a successful usage lookup.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    #[serde(rename = "CCSN")]
    pub ccsn: String,
    #[serde(rename = "Lines")]
    pub lines: Vec<UsageRecord>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{card}", get(handle_usage))
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn run(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local = listener.local_addr().context("Failed to read bound address")?;
    state.log.log("server", &format!("Listening on {}", local));

    axum::serve(listener, router(state))
        .await
        .context("Server terminated")
}

async fn handle_usage(
    State(state): State<AppState>,
    Path(card): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let month = match month_from_query(&params) {
        Ok(month) => month,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    let worker_state = state.clone();
    let worker_card = card.clone();
    let lookup = tokio::task::spawn_blocking(move || {
        worker_state
            .cache
            .get(&worker_card, month, worker_state.fetcher.as_ref())
    })
    .await;

    match lookup {
        Ok(Ok(lines)) => {
            state.log.log(
                "server",
                &format!("{} {}: {} lines", card, month, lines.len()),
            );
            Json(UsageResponse { ccsn: card, lines }).into_response()
        }
        Ok(Err(e)) => {
            state.log.log("server", &format!("{} {}: {}", card, month, e));
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            state
                .log
                .log("server", &format!("{} {}: worker failed: {}", card, month, e));
            (StatusCode::INTERNAL_SERVER_ERROR, "lookup worker failed").into_response()
        }
    }
}

fn month_from_query(params: &HashMap<String, String>) -> std::result::Result<MonthKey, String> {
    let year = query_number(params, "year")?;
    let month = query_number(params, "month")?;
    if !(1..=12).contains(&month) {
        return Err("month out of range [1, 12]".to_string());
    }
    let month = u32::try_from(month).map_err(|e| e.to_string())?;
    MonthKey::new(year, month).map_err(|e| e.to_string())
}

fn query_number(params: &HashMap<String, String>, name: &str) -> std::result::Result<i32, String> {
    let raw = params.get(name).map(String::as_str).unwrap_or("");
    raw.parse()
        .map_err(|e| format!("invalid {} {:?}: {}", name, raw, e))
}

#[cfg(test)]
#[path = "tests/server_tests.rs"]
mod tests;
