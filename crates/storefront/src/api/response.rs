//! Response classification and payload shapes shared by every endpoint.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Longest body excerpt carried in errors and logs.
const BODY_EXCERPT_LEN: usize = 500;

/// Keys whose value is a general (non-field) message.
const MESSAGE_KEYS: [&str; 4] = ["error", "detail", "message", "non_field_errors"];

/// Read a response body, turning any non-success status into an [`ApiError`].
///
/// 401 is not special here: the client retries it before reaching this point.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(ApiError::RateLimited(retry_after));
    }

    let body = response.text().await?;

    if status.is_success() {
        return Ok(body);
    }

    tracing::debug!(
        status = %status,
        body = %excerpt(&body),
        "API request returned an error status"
    );
    Err(classify(status, &body))
}

/// Decode a response body, treating an empty body (204) as JSON `null`.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let trimmed = body.trim();
    let json = if trimmed.is_empty() { "null" } else { trimmed };
    serde_json::from_str(json).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %excerpt(body),
            "Failed to parse API response"
        );
        ApiError::Parse(e)
    })
}

/// Map an error status and body to an [`ApiError`].
pub(crate) fn classify(status: StatusCode, body: &str) -> ApiError {
    let parsed = ErrorBody::parse(body);

    match status {
        StatusCode::BAD_REQUEST => ApiError::Validation {
            message: parsed
                .combined()
                .unwrap_or_else(|| "The request was rejected.".to_string()),
            fields: parsed.fields,
        },
        StatusCode::UNAUTHORIZED => ApiError::SessionExpired,
        StatusCode::FORBIDDEN => ApiError::Permission(parsed.message.unwrap_or_default()),
        StatusCode::NOT_FOUND => ApiError::NotFound(
            parsed
                .message
                .unwrap_or_else(|| "the requested resource".to_string()),
        ),
        s if s.is_server_error() => ApiError::Server {
            status: s.as_u16(),
            message: excerpt(body),
        },
        s => ApiError::Unexpected {
            status: s.as_u16(),
            message: parsed.combined().unwrap_or_else(|| excerpt(body)),
        },
    }
}

/// Truncate a body for logs and error messages.
pub(crate) fn excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_LEN {
        body.to_string()
    } else {
        let cut: String = body.chars().take(BODY_EXCERPT_LEN).collect();
        format!("{cut}...")
    }
}

/// Messages pulled out of an error response body.
#[derive(Debug, Default)]
struct ErrorBody {
    message: Option<String>,
    fields: BTreeMap<String, Vec<String>>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body)
        else {
            return Self::default();
        };

        let mut parsed = Self::default();
        let mut general = Vec::new();

        for (key, value) in map {
            let messages = messages_of(&value);
            if messages.is_empty() {
                continue;
            }
            if MESSAGE_KEYS.contains(&key.as_str()) {
                general.extend(messages);
            } else {
                parsed.fields.insert(key, messages);
            }
        }

        if !general.is_empty() {
            parsed.message = Some(general.join(" "));
        }
        parsed
    }

    /// General message if present, otherwise every field message joined.
    fn combined(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(message.clone());
        }
        let joined = self
            .fields
            .values()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }
}

/// A string, or the strings in an array; anything else yields nothing.
fn messages_of(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        serde_json::Value::Array(values) => values
            .iter()
            .filter_map(|v| v.as_str().map(str::trim))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// A list endpoint's payload: paginated, wrapped, or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListPayload<T> {
    Paginated { results: Vec<T> },
    OrderItems { order_items: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListPayload<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::Paginated { results } => results,
            Self::OrderItems { order_items } => order_items,
            Self::Bare(items) => items,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_validation_error_field() {
        let err = classify(StatusCode::BAD_REQUEST, r#"{"error": "insufficient stock"}"#);
        assert_eq!(err.user_message(), "insufficient stock");
    }

    #[test]
    fn test_classify_validation_field_map() {
        let err = classify(
            StatusCode::BAD_REQUEST,
            r#"{"phone": ["Enter a valid phone number."], "quantity": "Too many"}"#,
        );
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["phone"], vec!["Enter a valid phone number."]);
        assert_eq!(fields["quantity"], vec!["Too many"]);
        assert_eq!(err.user_message(), "Enter a valid phone number. Too many");
    }

    #[test]
    fn test_classify_non_field_errors() {
        let err = classify(
            StatusCode::BAD_REQUEST,
            r#"{"non_field_errors": ["Cart is empty"]}"#,
        );
        assert_eq!(err.user_message(), "Cart is empty");
        assert!(err.field_errors().unwrap().is_empty());
    }

    #[test]
    fn test_classify_validation_without_body() {
        let err = classify(StatusCode::BAD_REQUEST, "");
        assert_eq!(err.user_message(), "The request was rejected.");
    }

    #[test]
    fn test_classify_forbidden_uses_detail() {
        let err = classify(
            StatusCode::FORBIDDEN,
            r#"{"detail": "You do not have permission to view this order"}"#,
        );
        assert!(
            matches!(err, ApiError::Permission(ref m) if m == "You do not have permission to view this order")
        );
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify(StatusCode::BAD_GATEWAY, "<html>upstream</html>");
        assert!(matches!(err, ApiError::Server { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_other_status() {
        let err = classify(StatusCode::CONFLICT, r#"{"error": "Order already cancelled"}"#);
        assert!(matches!(
            err,
            ApiError::Unexpected { status: 409, ref message } if message == "Order already cancelled"
        ));
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(BODY_EXCERPT_LEN + 10);
        let cut = excerpt(&long);
        assert_eq!(cut.len(), BODY_EXCERPT_LEN + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn test_decode_empty_body_as_null() {
        let value: Option<u32> = decode("").unwrap();
        assert_eq!(value, None);
        let _: serde::de::IgnoredAny = decode("  ").unwrap();
    }

    #[test]
    fn test_list_payload_shapes() {
        let paginated: ListPayload<u32> =
            serde_json::from_str(r#"{"count": 2, "results": [1, 2]}"#).unwrap();
        assert_eq!(paginated.into_vec(), vec![1, 2]);

        let wrapped: ListPayload<u32> = serde_json::from_str(r#"{"order_items": [3]}"#).unwrap();
        assert_eq!(wrapped.into_vec(), vec![3]);

        let bare: ListPayload<u32> = serde_json::from_str("[4, 5, 6]").unwrap();
        assert_eq!(bare.into_vec(), vec![4, 5, 6]);
    }
}
