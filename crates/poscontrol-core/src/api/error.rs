use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing failed: Circular reference detected")]
    CircularReference,

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Internal(String),
}

/// Maximum length for raw response bodies used as error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl GatewayError {
    /// Truncate a response body to avoid carrying excessive data around
    fn truncate_body(body: &str) -> String {
        match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
            None => body.to_string(),
            Some((cut, _)) => format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            ),
        }
    }

    /// Error for a non-2xx response with a decoded JSON body.
    ///
    /// Uses the payload's `message` field, then `error`, then `HTTP <status>`.
    pub fn from_json_status(status: u16, payload: &Value) -> Self {
        let message = ["message", "error"]
            .iter()
            .find_map(|field| {
                payload
                    .get(field)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        GatewayError::Http { status, message }
    }

    /// Error for a non-2xx response with a non-JSON body.
    pub fn from_text_status(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let message = if trimmed.is_empty() {
            format!("HTTP {}", status)
        } else {
            Self::truncate_body(trimmed)
        };
        GatewayError::Http { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            GatewayError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_field_preferred() {
        let err = GatewayError::from_json_status(401, &json!({"message": "Invalid credentials", "error": "Unauthorized"}));
        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_error_field_then_status_fallback() {
        let err = GatewayError::from_json_status(403, &json!({"error": "Forbidden"}));
        assert_eq!(err.to_string(), "Forbidden");

        let err = GatewayError::from_json_status(500, &json!({"message": ""}));
        assert_eq!(err.to_string(), "HTTP 500");

        let err = GatewayError::from_json_status(502, &json!(["not", "an", "object"]));
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn test_text_status() {
        assert_eq!(GatewayError::from_text_status(503, "Service Unavailable").to_string(), "Service Unavailable");
        assert_eq!(GatewayError::from_text_status(404, "  ").to_string(), "HTTP 404");
    }

    #[test]
    fn test_long_text_body_truncated_on_char_boundary() {
        let body = "é".repeat(600);
        let msg = GatewayError::from_text_status(500, &body).to_string();
        assert!(msg.starts_with(&"é".repeat(500)));
        assert!(msg.contains("truncated, 1200 total bytes"));
    }

    #[test]
    fn test_circular_reference_message() {
        assert_eq!(
            GatewayError::CircularReference.to_string(),
            "JSON parsing failed: Circular reference detected"
        );
    }
}
