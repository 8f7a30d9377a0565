use ferry_core::error::UpstreamError;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_ATTEMPTS: u32 = 3;
const MAX_ERROR_BODY: usize = 200;

pub(crate) async fn send_with_retry<F>(build: F) -> Result<Response, UpstreamError>
where
    F: FnMut() -> Result<RequestBuilder, UpstreamError>,
{
    send_with_retry_allow_statuses(build, &[]).await
}

/// Send a request with bounded retries on rate-limit/unavailable
/// responses, honoring Retry-After and X-RateLimit-Reset. Statuses in
/// `allowed` are returned to the caller instead of becoming errors.
pub(crate) async fn send_with_retry_allow_statuses<F>(
    mut build: F,
    allowed: &[StatusCode],
) -> Result<Response, UpstreamError>
where
    F: FnMut() -> Result<RequestBuilder, UpstreamError>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let response = build()?
            .send()
            .await
            .map_err(|err| UpstreamError::Request(err.to_string()))?;
        let status = response.status();
        if status.is_success() || allowed.contains(&status) {
            return Ok(response);
        }
        if is_retryable(status) && attempt < MAX_ATTEMPTS {
            let delay =
                retry_delay_from_headers(response.headers()).unwrap_or(Duration::from_secs(1));
            let _ = response.bytes().await;
            tokio::time::sleep(delay).await;
            continue;
        }
        let message = response.text().await.unwrap_or_default();
        return Err(UpstreamError::status(status.as_u16(), truncate(&message)));
    }
    Err(UpstreamError::Request(
        "request failed after retries".to_string(),
    ))
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn retry_delay_from_headers(headers: &HeaderMap) -> Option<Duration> {
    if let Some(delay) = retry_after_seconds(headers) {
        return Some(Duration::from_secs(delay));
    }
    if let Some(delay) = ratelimit_reset_seconds(headers) {
        return Some(Duration::from_secs(delay));
    }
    None
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

fn ratelimit_reset_seconds(headers: &HeaderMap) -> Option<u64> {
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if reset <= now { None } else { Some(reset - now) }
}

fn truncate(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.len() <= MAX_ERROR_BODY {
        trimmed.to_string()
    } else {
        let mut end = MAX_ERROR_BODY;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_parses_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("5"));
        assert_eq!(retry_after_seconds(&headers), Some(5));
    }

    #[test]
    fn ratelimit_reset_uses_future_time() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&(now + 10).to_string()).unwrap(),
        );
        let delay = ratelimit_reset_seconds(&headers).unwrap();
        assert!(delay > 0);
    }

    #[test]
    fn ratelimit_reset_in_the_past_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1"));
        assert_eq!(ratelimit_reset_seconds(&headers), None);
    }

    #[test]
    fn only_rate_limit_statuses_retry() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn truncate_caps_long_bodies() {
        let long = "x".repeat(500);
        let truncated = truncate(&long);
        assert!(truncated.len() <= MAX_ERROR_BODY + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
