use reqwest::{Client, Response};
use serde::Serialize;
use tracing::error;

use crate::utils::retry::{RetryPolicy, retry_with_backoff};

/// Connection failures and timeouts; anything else is returned at once.
pub fn is_transient_transport(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// POSTs `payload` as JSON, retrying transient transport failures.
///
/// Returns the response whatever its status, or `None` when no response was
/// obtained. Never fails.
pub async fn post_json_with_retry<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    payload: &T,
    policy: &RetryPolicy,
) -> Option<Response> {
    // Webhook URLs carry credentials, keep them out of logged errors
    let result = retry_with_backoff(policy, is_transient_transport, || async move {
        client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
    })
    .await;

    match result {
        Ok(response) => Some(response),
        Err(e) => {
            error!("HTTP POST failed: {}", e);
            None
        }
    }
}
