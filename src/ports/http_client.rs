use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Method, Request, Response};
use thiserror::Error;

/// Custom error type for HTTP client operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Error when connection to the origin fails
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error when request times out
    #[error("Timeout error after {0} seconds")]
    Timeout(u64),

    /// Error when request is invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) for making HTTP requests to the
/// origin API and the frontend asset store.
///
/// Transport-level failures (connect, timeout) surface as errors; HTTP error
/// statuses come back as regular responses so callers can apply their own
/// fallback policy per status class.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send an HTTP request to an origin server
    ///
    /// # Arguments
    /// * `req` - The HTTP request to send to the origin
    ///
    /// # Returns
    /// A future that resolves to the origin's response or an error
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>>;

    /// Convenience GET against an absolute URL.
    async fn get(&self, url: &str) -> HttpClientResult<Response<AxumBody>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(url)
            .body(AxumBody::empty())
            .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?;

        self.send_request(request).await
    }
}
