use serde_json::{json, Value};

/// Canonical error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code and error-type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    UpstreamFailure,
    UpstreamTimeout,
    ServerError,
}

impl ProxyError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProxyError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            ProxyError::Auth(_) => ErrorCategory::Authentication,
            ProxyError::Upstream { .. } | ProxyError::Transport(_) => {
                ErrorCategory::UpstreamFailure
            }
            ProxyError::UpstreamTimeout(_) => ErrorCategory::UpstreamTimeout,
            ProxyError::Config(_) | ProxyError::Internal(_) => ErrorCategory::ServerError,
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::UpstreamFailure => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::UpstreamTimeout => http::StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_type_for_category(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::UpstreamFailure | ErrorCategory::UpstreamTimeout => "upstream_error",
        ErrorCategory::ServerError => "server_error",
    }
}

/// Format an error as an OpenAI-shaped body, returning (`status_code`, JSON body).
///
/// Upstream transport causes are logged by the caller, never exposed; the
/// client sees a generic message for those categories.
#[must_use]
pub fn format_error(err: &ProxyError) -> (http::StatusCode, Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    let message = match cat {
        ErrorCategory::UpstreamFailure => "Upstream request failed".to_string(),
        ErrorCategory::UpstreamTimeout => "Upstream request timed out".to_string(),
        _ => err.to_string(),
    };

    let body = json!({
        "error": {
            "type": error_type_for_category(cat),
            "message": message,
            "code": status.as_u16(),
        }
    });

    (status, body)
}

/// Convert a `ProxyError` into an axum response.
#[must_use]
pub fn into_axum_response(err: &ProxyError) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err);
    (status, axum::Json(body)).into_response()
}

impl axum::response::IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_expected_statuses() {
        let cases = [
            (
                ProxyError::InvalidRequest("bad json".into()),
                http::StatusCode::BAD_REQUEST,
            ),
            (
                ProxyError::Auth("bad key".into()),
                http::StatusCode::UNAUTHORIZED,
            ),
            (
                ProxyError::Upstream {
                    status: 500,
                    message: "boom".into(),
                },
                http::StatusCode::BAD_GATEWAY,
            ),
            (
                ProxyError::Transport("refused".into()),
                http::StatusCode::BAD_GATEWAY,
            ),
            (
                ProxyError::UpstreamTimeout("deadline".into()),
                http::StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ProxyError::Internal("oops".into()),
                http::StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let (status, body) = format_error(&err);
            assert_eq!(status, expected);
            assert_eq!(body["error"]["code"], expected.as_u16());
        }
    }

    #[test]
    fn upstream_cause_is_not_exposed() {
        let err = ProxyError::Transport("connect到 10.0.0.1:443 refused".into());
        let (_, body) = format_error(&err);
        let message = body["error"]["message"].as_str().unwrap();
        assert_eq!(message, "Upstream request failed");
    }

    #[test]
    fn auth_error_shape() {
        let (status, body) = format_error(&ProxyError::Auth("Invalid API key".into()));
        assert_eq!(status, http::StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "authentication_error");
    }
}
