use serde::{Deserialize, Serialize};

use super::GatewayError;

/// Outcome of every gateway call.
///
/// `success` is true exactly when `data` is present. Failures carry a human
/// readable `error` for the view layer to show as it sees fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success && self.data.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiEnvelope<U> {
        self.and_then(|data| Ok(f(data)))
    }

    /// Chain a fallible conversion; its error becomes the envelope's error.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, GatewayError>) -> ApiEnvelope<U> {
        match (self.success, self.data) {
            (true, Some(data)) => f(data).into(),
            (true, None) => ApiEnvelope::err(GatewayError::InvalidResponse("missing data".to_string()).to_string()),
            (false, _) => ApiEnvelope::err(self.error.unwrap_or_else(|| "Unknown error".to_string())),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(self.error.unwrap_or_else(|| "Unknown error".to_string())),
        }
    }
}

impl<T> From<Result<T, GatewayError>> for ApiEnvelope<T> {
    fn from(result: Result<T, GatewayError>) -> Self {
        match result {
            Ok(data) => ApiEnvelope::ok(data),
            Err(e) => ApiEnvelope::err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let ok = serde_json::to_value(ApiEnvelope::ok(json!({"id": 1}))).unwrap();
        assert_eq!(ok, json!({"success": true, "data": {"id": 1}}));

        let err = serde_json::to_value(ApiEnvelope::<()>::err("HTTP 500")).unwrap();
        assert_eq!(err, json!({"success": false, "error": "HTTP 500"}));
    }

    #[test]
    fn test_and_then_propagates_failures() {
        let failed: ApiEnvelope<i32> = ApiEnvelope::err("offline");
        let mapped = failed.and_then(|n| Ok(n + 1));
        assert_eq!(mapped.error.as_deref(), Some("offline"));

        let bad = ApiEnvelope::ok(1).and_then(|_| -> Result<i32, GatewayError> {
            Err(GatewayError::InvalidResponse("nope".to_string()))
        });
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("Invalid response: nope"));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ApiEnvelope::ok(5).into_result(), Ok(5));
        assert_eq!(ApiEnvelope::<i32>::err("x").into_result(), Err("x".to_string()));
    }
}
