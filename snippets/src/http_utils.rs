//! HTTP utility functions for consistent error handling across service clients

use reqwest::{Response, StatusCode};
use tracing::warn;

use crate::errors::{OpError, OpResult};

/// Handle service response errors with consistent logging and error mapping
pub async fn handle_api_response(response: Response, service: &str) -> OpResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let url = response.url().path().to_string();
        let error_text = response.text().await.unwrap_or_default();
        warn!("{} API error: {} {} - {}", service, status, url, error_text);
        return Err(status_to_error(status, service, &url, error_text));
    }
    Ok(response)
}

/// Map a non-success status to the operation error taxonomy
pub fn status_to_error(status: StatusCode, service: &str, resource: &str, body: String) -> OpError {
    match status.as_u16() {
        401 | 403 => OpError::unauthorized(service, format!("{} - {}", status, body)),
        404 => OpError::not_found(resource),
        408 | 429 | 500..=599 => OpError::transient(service, format!("{} - {}", status, body)),
        _ => OpError::invalid(format!("{} {} - {}", service, status, body)),
    }
}

/// Parse JSON response with consistent error handling
pub async fn parse_json_response<T>(response: Response, context: &str) -> OpResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| OpError::invalid(format!("Failed to parse {}: {}", context, e)))
}

/// Quote a string literal for an OData `$filter` expression
pub fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unauthorized = status_to_error(StatusCode::UNAUTHORIZED, "Mail", "/me", String::new());
        assert!(matches!(unauthorized, OpError::Unauthorized { .. }));

        let missing = status_to_error(StatusCode::NOT_FOUND, "Mail", "/me/messages/1", String::new());
        assert_eq!(missing, OpError::not_found("/me/messages/1"));

        let throttled = status_to_error(StatusCode::TOO_MANY_REQUESTS, "Files", "/files", String::new());
        assert!(throttled.is_retryable());

        let outage = status_to_error(StatusCode::SERVICE_UNAVAILABLE, "Files", "/files", String::new());
        assert!(outage.is_retryable());

        let bad = status_to_error(StatusCode::BAD_REQUEST, "Contacts", "/me/contacts", "oops".into());
        assert!(matches!(bad, OpError::Invalid { .. }));
    }

    #[test]
    fn test_odata_string_escapes_quotes() {
        assert_eq!(odata_string("plain"), "'plain'");
        assert_eq!(odata_string("O'Brien"), "'O''Brien'");
    }
}
