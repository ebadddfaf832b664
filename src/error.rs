use thiserror::Error;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Errors a request handler reports back to the caller.
///
/// Anything that is not the caller's fault ends up in `Internal`; the RPC layer
/// maps each variant to a transport status code.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn insufficient_privileges() -> Self {
        ServiceError::Forbidden("Insufficient privileges".to_string())
    }

    pub fn missing_param(name: &str) -> Self {
        ServiceError::BadRequest(format!("The '{name}' parameter is missing"))
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::Forbidden(_) => 403,
            ServiceError::BadRequest(_) => 400,
            ServiceError::Internal(_) => 500,
        }
    }
}
