use thiserror::Error;

/// Rejections at the control boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input the boundary refuses to act on: empty fields, unparseable
    /// identifiers, unknown state strings.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("no such task: {0}")]
    NotFound(String),
}

impl ApiError {
    /// HTTP status an outer transport should answer with.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::MalformedRequest(_) => 400,
            ApiError::NotFound(_) => 404,
        }
    }
}
