use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, StatusCode};
use thiserror::Error;

/// Error type for HTTP handler operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// Origin is unreachable and no cached copy exists
    #[error("Origin unavailable: {0}")]
    OriginUnavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad gateway: {0}")]
    BadGateway(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::OriginUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            HandlerError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for HandlerError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        tracing::warn!("Request failed with {}: {}", status, self);
        (status, self.to_string()).into_response()
    }
}

/// HttpHandler defines the port for handling HTTP requests
pub trait HttpHandler: Send + Sync + 'static {
    /// Handle an incoming HTTP request
    ///
    /// # Arguments
    /// * `req` - The HTTP request to handle
    ///
    /// # Returns
    /// A future that resolves to an HTTP response or an error
    fn handle_request(
        &self,
        req: Request<AxumBody>,
    ) -> impl std::future::Future<Output = Result<Response<AxumBody>, HandlerError>> + Send;
}
