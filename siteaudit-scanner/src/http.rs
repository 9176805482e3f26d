use crate::error::{Result, ScanError};
use crate::retry::RetryPolicy;
use reqwest::{Client, Method, Response};
use std::time::Duration;

pub const USER_AGENT: &str = "Siteaudit/0.1 (+https://github.com/siteaudit/siteaudit)";

/// Build the shared HTTP client. Every request carries an explicit timeout;
/// `follow_redirects = false` is used for manual redirect-chain probing.
pub fn build_client(timeout: Duration, follow_redirects: bool) -> Result<Client> {
    let redirect = if follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(redirect)
        .build()
        .map_err(|e| ScanError::Other(format!("Failed to create HTTP client: {}", e)))
}

/// Errors worth another attempt: timeouts and connection failures.
pub fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Send a request under a retry policy, retrying only transient failures.
pub async fn send_with_retry(
    client: &Client,
    method: Method,
    url: &str,
    retry: &RetryPolicy,
) -> std::result::Result<Response, reqwest::Error> {
    retry
        .run(
            |_| client.request(method.clone(), url).send(),
            is_transient,
            |attempt, err, delay| {
                tracing::debug!(
                    "{} {} failed on attempt {} ({}), retrying in {:?}",
                    method,
                    url,
                    attempt,
                    err,
                    delay
                )
            },
        )
        .await
}
