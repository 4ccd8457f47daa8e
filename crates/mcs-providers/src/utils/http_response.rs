//! HTTP response handling shared by remote providers
//!
//! Maps upstream status codes onto the error taxonomy: quota statuses to
//! `budget_exhausted`, server-side failures to `upstream_unavailable`, the
//! rest of the 4xx range to `invalid_argument`.

use reqwest::{Response, StatusCode};

use mcs_domain::error::{Error, Result};

/// Response checking and parsing helpers
pub struct HttpResponseUtils;

impl HttpResponseUtils {
    /// Check the status and parse the JSON body
    ///
    /// # Arguments
    /// * `response` - The upstream response
    /// * `provider` - Provider label used in error messages
    pub async fn check_and_parse(response: Response, provider: &str) -> Result<serde_json::Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, provider, &body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::upstream_with_source(format!("{provider} returned unparseable JSON"), e))
    }

    /// Map a non-success status onto the error taxonomy
    pub fn status_error(status: StatusCode, provider: &str, body: &str) -> Error {
        let detail = if body.is_empty() {
            String::new()
        } else {
            format!(": {}", body.chars().take(200).collect::<String>())
        };

        match status {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => Error::budget_exhausted(
                format!("{provider} quota exhausted ({status}){detail}"),
            ),
            StatusCode::NOT_FOUND => Error::not_found(format!("{provider} endpoint{detail}")),
            status if status.is_server_error() => {
                Error::upstream(format!("{provider} unavailable ({status}){detail}"))
            }
            status => Error::invalid_argument(format!(
                "{provider} rejected the request ({status}){detail}"
            )),
        }
    }

    /// Map a reqwest transport error onto the taxonomy
    pub fn transport_error(e: reqwest::Error, provider: &str, timeout_hint: &str) -> Error {
        if e.is_timeout() {
            Error::timed_out(format!(
                "{} {timeout_hint} calling {provider}",
                crate::constants::ERROR_MSG_REQUEST_TIMEOUT
            ))
        } else {
            Error::upstream_with_source(format!("{provider} request failed"), e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_domain::ErrorKind;

    #[test]
    fn quota_statuses_are_budget_exhausted() {
        let e = HttpResponseUtils::status_error(StatusCode::TOO_MANY_REQUESTS, "embedding", "");
        assert_eq!(e.kind(), ErrorKind::BudgetExhausted);
        let e = HttpResponseUtils::status_error(StatusCode::PAYMENT_REQUIRED, "embedding", "");
        assert_eq!(e.kind(), ErrorKind::BudgetExhausted);
    }

    #[test]
    fn server_errors_are_upstream_unavailable() {
        let e = HttpResponseUtils::status_error(StatusCode::BAD_GATEWAY, "vector index", "busy");
        assert_eq!(e.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn client_errors_are_invalid_argument() {
        let e = HttpResponseUtils::status_error(StatusCode::UNPROCESSABLE_ENTITY, "embedding", "");
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }
}
