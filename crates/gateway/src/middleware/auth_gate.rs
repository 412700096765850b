//! Authentication gate
//!
//! Validates an `Authorization: Bearer` token on every request outside the
//! bypass list and binds the resulting `Principal` to the request. Requests
//! without a usable token continue unauthenticated; handlers that need a
//! caller refuse them.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use docvault_common::auth::{
    extract_bearer_token, is_public_path, token_fingerprint, JwtManager, Principal,
};
use std::sync::Arc;
use tracing::debug;

/// State of the gate layer
#[derive(Clone)]
pub struct AuthGate {
    pub jwt: Arc<JwtManager>,

    /// Answer 401 for a present but invalid token instead of continuing
    pub reject_invalid_tokens: bool,
}

pub async fn auth_gate(State(gate): State<AuthGate>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();

    if is_public_path(&path) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_owned);

    let Some(token) = token else {
        debug!(path = %path, "No bearer token");
        return next.run(request).await;
    };

    let fingerprint = token_fingerprint(&token);

    match gate.jwt.validate_token(&token) {
        Ok(claims) => {
            let principal = Principal::from(claims);
            debug!(
                path = %path,
                token = %fingerprint,
                subject = %principal.subject,
                role = %principal.role,
                "Token validated"
            );
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => {
            debug!(path = %path, token = %fingerprint, error = %e, "Token rejected");
            if gate.reject_invalid_tokens {
                return e.into_response();
            }
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use docvault_common::auth::Role;
    use tower::ServiceExt;

    /// Echoes the bound principal, or "anonymous"
    async fn whoami(principal: Option<Principal>) -> String {
        principal
            .map(|p| format!("{}:{}", p.subject, p.role))
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(reject_invalid_tokens: bool) -> (Router, Arc<JwtManager>) {
        let jwt = Arc::new(JwtManager::new("gate_secret", 3600));
        let gate = AuthGate {
            jwt: jwt.clone(),
            reject_invalid_tokens,
        };
        let router = Router::new()
            .route("/api/auth/me", get(whoami))
            .route("/api/auth/login", get(whoami))
            .route("/api/test/ping", get(whoami))
            .layer(from_fn_with_state(gate, auth_gate));
        (router, jwt)
    }

    async fn call(router: Router, path: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri(path);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_binds_principal() {
        let (router, jwt) = app(false);
        let token = jwt.generate_token("asha", Role::Finance).unwrap();

        let (status, body) = call(router, "/api/auth/me", Some(&format!("Bearer {}", token))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "asha:FINANCE");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header_continues() {
        let (router, _) = app(true);

        let (_, body) = call(router.clone(), "/api/auth/me", None).await;
        assert_eq!(body, "anonymous");

        let (status, body) = call(router, "/api/auth/me", Some("Token abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_invalid_token_default_policy_continues() {
        let (router, _) = app(false);

        let (status, body) = call(router, "/api/auth/me", Some("Bearer not.a.jwt")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_invalid_token_strict_policy_rejects() {
        let (router, _) = app(true);

        let (status, body) = call(router, "/api/auth/me", Some("Bearer not.a.jwt")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("INVALID_TOKEN"));
    }

    #[tokio::test]
    async fn test_bypass_paths_skip_validation() {
        let (router, jwt) = app(true);
        let token = jwt.generate_token("asha", Role::Hr).unwrap();
        let header = format!("Bearer {}", token);

        // even a valid token is not bound on bypassed paths
        let (_, body) = call(router.clone(), "/api/auth/login", Some(&header)).await;
        assert_eq!(body, "anonymous");

        let (status, body) = call(router, "/api/test/ping", Some("Bearer garbage")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }
}
