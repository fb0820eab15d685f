use crate::{
    api::handlers::{health, root},
    attendance::{Attendance, device::DEVICE_ID_HEADER},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
mod openapi;

pub use handlers::auth::AuthConfig;
pub use openapi::openapi;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, `/`, `OPTIONS /health`
/// and the request-id, tracing and CORS layers.
///
/// # Errors
/// Returns an error if the frontend base URL cannot be turned into a CORS origin.
pub fn app(attendance: Attendance, auth_config: AuthConfig) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_config.frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(DEVICE_ID_HEADER),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let (router, _openapi) = router().split_for_parts();
    Ok(router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(Arc::new(auth_config)))
                .layer(Extension(attendance)),
        ))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, attendance: Attendance, auth_config: AuthConfig) -> Result<()> {
    let app = app(attendance, auth_config)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://rollcall.dev/app/")?;
        assert_eq!(origin.to_str()?, "https://rollcall.dev");
        Ok(())
    }

    #[test]
    fn frontend_origin_keeps_port() -> Result<()> {
        let origin = frontend_origin("http://localhost:8080")?;
        assert_eq!(origin.to_str()?, "http://localhost:8080");
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
