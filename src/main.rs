use std::{collections::HashSet, sync::Arc};

use axum::http::{HeaderValue, Method};
use tokio::{net::TcpListener, time::Duration};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use url::Url;

use vidlink::error::ApiError;
use vidlink::handlers::{AppState, router};
use vidlink::poll::PollPolicy;
use vidlink::providers::provider_from_env;

const UPSTREAM_TIMEOUT_SECONDS: u64 = 20;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "vidlink=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECONDS))
        .build()
        .map_err(|error| ApiError::internal(format!("Could not build HTTP client: {error}")))?;

    let state = AppState {
        provider: provider_from_env(http_client),
        poll_policy: poll_policy_from_env(),
    };

    let app = router(state)
        .layer(build_cors_layer()?)
        .layer(TraceLayer::new_for_http());

    let addr = resolve_bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|error| ApiError::internal(format!("Could not bind {addr}: {error}")))?;

    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|error| ApiError::internal(format!("HTTP server error: {error}")))
}

fn poll_policy_from_env() -> PollPolicy {
    let defaults = PollPolicy::default();
    let max_attempts = read_usize_env("POLL_MAX_ATTEMPTS")
        .filter(|value| *value > 0)
        .map(|value| value as u32)
        .unwrap_or(defaults.max_attempts);
    let interval = read_usize_env("POLL_INTERVAL_MS")
        .map(|ms| Duration::from_millis(ms as u64))
        .unwrap_or(defaults.interval);
    PollPolicy::new(max_attempts, interval)
}

fn read_usize_env(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
}

fn resolve_bind_addr() -> String {
    if let Some(configured) = std::env::var("APP_ADDR")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        return configured;
    }

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(3000);
    format!("0.0.0.0:{port}")
}

fn build_cors_layer() -> Result<CorsLayer, ApiError> {
    let configured = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    // Unset means a public API open to any origin, like the sites it fronts.
    if configured.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET]));
    }

    let normalized = configured
        .iter()
        .map(|origin| {
            normalize_origin(origin).ok_or_else(|| {
                ApiError::internal(format!(
                    "Invalid origin in ALLOWED_ORIGINS: {origin}. Use values like https://example.com"
                ))
            })
        })
        .collect::<Result<HashSet<_>, _>>()?;

    let allowed = Arc::new(normalized);
    info!(origins = allowed.len(), "CORS allow-list loaded");

    let predicate = AllowOrigin::predicate({
        let allowed = Arc::clone(&allowed);
        move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .ok()
                .and_then(normalize_origin)
                .is_some_and(|value| allowed.contains(&value))
        }
    });

    Ok(CorsLayer::new()
        .allow_origin(predicate)
        .allow_methods([Method::GET]))
}

fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };

    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    match parsed.port() {
        Some(port) if port != default_port => Some(format!("{scheme}://{host}:{port}")),
        _ => Some(format!("{scheme}://{host}")),
    }
}
