//! Basic-auth gate in front of the API routes.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;
use tracing::{debug, warn};

/// Static credential pair the gate compares against.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow { principal: String },
    Deny,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Decide on a raw `Authorization` header value. Anything malformed is a denial.
    pub fn authorize(&self, header: Option<&str>) -> AuthDecision {
        let Some(header) = header else {
            return AuthDecision::Deny;
        };
        let Some((scheme, encoded)) = header.trim().split_once(' ') else {
            return AuthDecision::Deny;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return AuthDecision::Deny;
        }

        let decoded = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return AuthDecision::Deny,
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return AuthDecision::Deny;
        };
        let Some((username, password)) = decoded.split_once(':') else {
            return AuthDecision::Deny;
        };

        if username == self.username && password == self.password {
            AuthDecision::Allow {
                principal: username.to_string(),
            }
        } else {
            AuthDecision::Deny
        }
    }

    /// `Authorization` header value for these credentials.
    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

/// Axum middleware rejecting requests that fail [`BasicCredentials::authorize`] with 401.
pub async fn require_basic_auth(
    State(credentials): State<Arc<BasicCredentials>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match credentials.authorize(header) {
        AuthDecision::Allow { principal } => {
            debug!(%principal, path = %request.uri().path(), "request authorized");
            next.run(request).await
        }
        AuthDecision::Deny => {
            warn!(path = %request.uri().path(), "request denied by basic auth gate");
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"enrollments\"")],
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response()
        }
    }
}
