//! Conversions from external infrastructure errors into the shared taxonomy.

use std::time::Duration;

use mdmlink_common::error::CommonError;
use mdmlink_domain::constants::DEFAULT_RATE_LIMIT_RETRY_AFTER_SECS;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Error as HttpError, StatusCode};
use url::ParseError as UrlError;

/// Delay used for a 429 without a usable `Retry-After` header
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(DEFAULT_RATE_LIMIT_RETRY_AFTER_SECS);

const BODY_SNIPPET_LEN: usize = 200;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the shared error.
#[derive(Debug)]
pub struct InfraError(pub CommonError);

impl From<InfraError> for CommonError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CommonError> for InfraError {
    fn from(value: CommonError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCommonError {
    fn into_common(self) -> CommonError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CommonError */
/* -------------------------------------------------------------------------- */

impl IntoCommonError for HttpError {
    fn into_common(self) -> CommonError {
        if self.is_timeout() {
            return CommonError::network(format!("HTTP request timed out: {self}"));
        }

        if self.is_connect() {
            return CommonError::network(format!("HTTP connection failure: {self}"));
        }

        if self.is_builder() {
            return CommonError::config_field("transport", format!("invalid HTTP request: {self}"));
        }

        if self.is_decode() {
            return CommonError::serialization_format("json", self.to_string());
        }

        if let Some(status) = self.status() {
            let resource = self.url().map(|url| url.path().to_owned()).unwrap_or_default();
            return classify_status(status, &HeaderMap::new(), &resource, "");
        }

        CommonError::network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_common())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → CommonError */
/* -------------------------------------------------------------------------- */

impl IntoCommonError for UrlError {
    fn into_common(self) -> CommonError {
        CommonError::config_field("transport.base_url", format!("invalid URL: {self}"))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(value.into_common())
    }
}

/* -------------------------------------------------------------------------- */
/* HTTP status → CommonError */
/* -------------------------------------------------------------------------- */

/// Map a non-success response onto an error kind.
///
/// `resource` names the requested path and `body` is the raw response body,
/// of which a short prefix is kept in the message.
pub fn classify_status(
    status: StatusCode,
    headers: &HeaderMap,
    resource: &str,
    body: &str,
) -> CommonError {
    let code = status.as_u16();
    let message = status_message(status, body);

    match code {
        400 | 422 => CommonError::validation("request", message),
        401 => CommonError::authentication(message),
        403 => CommonError::permission_denied_with_message(resource, message),
        404 => CommonError::not_found_with_id("resource", resource),
        429 => CommonError::rate_limited_with_message(retry_after(headers), message),
        500..=599 => CommonError::server(code, message),
        400..=499 => CommonError::validation("request", message),
        _ => CommonError::internal_with_context(format!("unexpected {message}"), resource),
    }
}

/// `Retry-After` in whole seconds; absent or unparsable values use
/// [`DEFAULT_RETRY_AFTER`].
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs)
}

fn status_message(status: StatusCode, body: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {} {reason}", status.as_u16());
    }
    let snippet: String = body.chars().take(BODY_SNIPPET_LEN).collect();
    format!("HTTP {} {reason}: {snippet}", status.as_u16())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use mdmlink_common::error::{ErrorClassification, ErrorKind};
    use reqwest::header::HeaderValue;
    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn headers_with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_status_matrix_maps_to_error_kinds() {
        let cases = [
            (400, ErrorKind::Validation),
            (401, ErrorKind::Authentication),
            (403, ErrorKind::PermissionDenied),
            (404, ErrorKind::NotFound),
            (409, ErrorKind::Validation),
            (422, ErrorKind::Validation),
            (429, ErrorKind::RateLimited),
            (500, ErrorKind::Server),
            (503, ErrorKind::Server),
        ];

        for (code, kind) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_status(status, &HeaderMap::new(), "/api/v1/computers-inventory", "");
            assert_eq!(err.kind(), kind, "status {code}");
        }
    }

    #[test]
    fn test_rate_limit_uses_retry_after_seconds() {
        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            &headers_with_retry_after("7"),
            "/JSSResource/computers",
            "slow down",
        );
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_rate_limit_defaults_when_header_missing_or_unparsable() {
        assert_eq!(retry_after(&HeaderMap::new()), DEFAULT_RETRY_AFTER);
        assert_eq!(
            retry_after(&headers_with_retry_after("Wed, 21 Oct 2015 07:28:00 GMT")),
            DEFAULT_RETRY_AFTER
        );
        assert_eq!(DEFAULT_RETRY_AFTER, Duration::from_secs(1));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let err = classify_status(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "/", &body);
        assert!(err.to_string().len() < 400);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_url_parse_error_maps_to_config() {
        let err: CommonError = InfraError::from(url::Url::parse("not a url").unwrap_err()).into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_http_status_error_maps_through_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::FORBIDDEN))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: CommonError = InfraError::from(error).into();
        assert_eq!(mapped.kind(), ErrorKind::PermissionDenied);
        assert!(mapped.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_network() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped: CommonError = InfraError::from(error).into();
        assert_eq!(mapped.kind(), ErrorKind::Network);
        assert!(mapped.is_retryable());
    }
}
