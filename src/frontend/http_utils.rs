// Error handling for warp handlers.
//
// Handlers return `Result<impl Reply, ApiError>` rather than rejecting:
// a rejection means "some other filter may handle this", while our errors are
// final. ApiError knows its status code and JSON body, and `into_response`
// flattens the Result, since Reply can't be implemented for Result directly:
//
//   .then(my_handler_func)
//   .map(into_response)

use serde_json::json;
use tracing::error;
use warp::hyper::{Body, Response, StatusCode};
use warp::Reply;

use crate::auth::AuthError;
use crate::data_types::UploadId;
use crate::uploads::UploadError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Country not supported")]
    CountryNotSupported,

    #[error("Data only available for United States")]
    EconomicDataUnavailable,

    #[error("Invalid scenario")]
    InvalidScenario,

    #[error("Unknown upload kind {0:?}")]
    UnknownUploadKind(String),

    #[error("Upload {0} not found")]
    UploadNotFound(UploadId),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("{0}")]
    Repository(#[from] crate::repository::interface::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::CountryNotSupported
            | ApiError::EconomicDataUnavailable
            | ApiError::InvalidScenario
            | ApiError::UnknownUploadKind(_)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UploadNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::TokenNotNeeded) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::WriteDisabled) => StatusCode::FORBIDDEN,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upload(
                UploadError::InvalidName { .. } | UploadError::InvalidGeometry { .. },
            ) => StatusCode::BAD_REQUEST,
            ApiError::Upload(_) | ApiError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response<Body> {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Error handling request: {self:?}");
        }

        warp::reply::with_status(
            warp::reply::json(&json!({ "error": self.to_string() })),
            status,
        )
        .into_response()
    }
}

pub fn into_response<S: Reply, E: Reply>(reply_res: Result<S, E>) -> Response<Body> {
    match reply_res {
        Ok(resp) => resp.into_response(),
        Err(err) => err.into_response(),
    }
}
