use std::net::SocketAddr;

use axum::{
    http::{
        header::{ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
        HeaderName, HeaderValue, Method,
    },
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::auth;
use crate::config::ServerConfig;
use crate::state::AppState;

const ALLOWED_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization";

/// Answers every OPTIONS request itself and stamps `*` as the allowed
/// origin on all other responses.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
            CONTENT_TYPE,
            ACCEPT,
            AUTHORIZATION,
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(cors())
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{
            header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN},
            Request, StatusCode,
        },
    };
    use crate::auth::jwt::TokenIssuer;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn get_with_auth(uri: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn test_app() -> (Router, AppState) {
        let state = AppState::fake();
        (build_app(state.clone()), state)
    }

    #[tokio::test]
    async fn register_login_and_wrong_password_flow() {
        let (app, state) = test_app();

        let (status, _, body) = send(
            &app,
            post_json(
                "/user",
                json!({"displayName": "user1", "password": "user1Pass", "email": "user1@example.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["token"].as_str().expect("token in body");
        let claims = state.tokens.verify(&format!("Bearer {token}")).unwrap();
        assert_eq!(claims.display_name, "user1");

        let (status, _, body) = send(
            &app,
            post_json(
                "/login",
                json!({"email": "user1@example.com", "password": "user1Pass"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();
        assert!(state.tokens.verify(&format!("Bearer {token}")).is_ok());

        let (status, _, body) = send(
            &app,
            post_json(
                "/login",
                json!({"email": "user1@example.com", "password": "wrong"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({"error": "Email and password not found or incorrect"})
        );
    }

    #[tokio::test]
    async fn duplicate_registration_is_bad_request() {
        let (app, _) = test_app();
        let payload = json!({"displayName": "a", "password": "pw", "email": "dup@example.com"});
        let (status, _, _) = send(&app, post_json("/user", payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, body) = send(&app, post_json("/user", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"error": "Email dup@example.com is already registered"})
        );
    }

    #[tokio::test]
    async fn registration_reports_missing_fields() {
        let (app, _) = test_app();
        let (status, _, body) = send(&app, post_json("/user", json!({"password": "pw"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"error": "Missing fields for new user: displayName, email"})
        );
    }

    #[tokio::test]
    async fn login_reports_missing_fields() {
        let (app, _) = test_app();
        let (status, _, body) = send(&app, post_json("/login", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Email and password not present"}));

        let (_, _, body) = send(&app, post_json("/login", json!({"password": "x"}))).await;
        assert_eq!(body, json!({"error": "Email not present"}));

        let (_, _, body) = send(&app, post_json("/login", json!({"email": "a@b.io"}))).await;
        assert_eq!(body, json!({"error": "Password not present"}));
    }

    #[tokio::test]
    async fn undecodable_body_uses_error_envelope() {
        let (app, _) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Unable to decode request"));
    }

    #[tokio::test]
    async fn homepage_requires_valid_token() {
        let (app, _) = test_app();

        let (status, _, body) = send(&app, get_with_auth("/homepage", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _, _) = send(&app, get_with_auth("/homepage", Some("Token abc"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) =
            send(&app, get_with_auth("/homepage", Some("Bearer abc.def.ghi"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn homepage_serves_authenticated_user() {
        let (app, _) = test_app();
        let (_, _, body) = send(
            &app,
            post_json(
                "/user",
                json!({"displayName": "user1", "password": "user1Pass", "email": "user1@example.com"}),
            ),
        )
        .await;
        let token = body["token"].as_str().unwrap().to_string();

        let (status, _, body) = send(
            &app,
            get_with_auth("/homepage", Some(&format!("Bearer {token}"))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["displayName"], "user1");
    }

    #[tokio::test]
    async fn options_routes_return_cors_headers() {
        let (app, _) = test_app();
        for (uri, methods) in [("/login", "POST"), ("/user", "POST"), ("/homepage", "GET")] {
            let req = Request::builder()
                .method("OPTIONS")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, headers, _) = send(&app, req).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert!(headers[ACCESS_CONTROL_ALLOW_HEADERS]
                .to_str()
                .unwrap()
                .to_ascii_lowercase()
                .contains("authorization"));
            assert!(headers[ACCESS_CONTROL_ALLOW_METHODS]
                .to_str()
                .unwrap()
                .contains(methods));
        }
    }

    #[tokio::test]
    async fn every_response_is_cors_permissive() {
        let (app, _) = test_app();
        let (status, headers, _) = send(&app, get_with_auth("/homepage", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.contains_key(ACCESS_CONTROL_ALLOW_HEADERS));
    }
}
