//! Shared HTTP plumbing for the REST-backed providers.

use std::time::Duration;

use anyhow::{Context, Result};

use quizforge_core::error::ProviderError;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

/// Classify a transport-level failure.
pub(crate) fn send_error(err: reqwest::Error, timeout_secs: u64, base_url: &str) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else if err.is_connect() {
        ProviderError::NetworkError(format!("{base_url} not reachable: {err}"))
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

/// Turn non-2xx responses into typed errors. `not_found` supplies the
/// message for a 404.
pub(crate) async fn check_status(
    response: reqwest::Response,
    not_found: impl FnOnce() -> String,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(response),
        429 => {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            Err(ProviderError::RateLimited { retry_after_ms })
        }
        401 | 403 => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::AuthenticationFailed(body))
        }
        404 => Err(ProviderError::ModelNotFound(not_found())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::ApiError {
                status,
                message: body,
            })
        }
    }
}

pub(crate) fn parse_error(what: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::ApiError {
        status: 0,
        message: format!("failed to parse {what}: {err}"),
    }
}
