use std::convert::Infallible;

use log::error;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::models::{Message, Outcome};
use crate::validation::FieldError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    UnknownUser,
    #[error("post not found")]
    UnknownPost,
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors a request handler can end in. Each maps to a status code and the
/// `{ success: false, message }` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("Login required")]
    Unauthorized,
    #[error("You are not allowed to do that")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl warp::reject::Reject for ApiError {}

impl From<FieldError> for ApiError {
    fn from(value: FieldError) -> Self {
        ApiError::Validation(vec![value])
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::UnknownUser) | ApiError::Store(StoreError::UnknownPost) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> Message {
        match self {
            ApiError::Validation(fields) => Message::Fields(fields.clone()),
            ApiError::Store(StoreError::UnknownUser) => Message::Text("User not found".into()),
            ApiError::Store(StoreError::UnknownPost) => Message::Text("Post not found".into()),
            ApiError::Store(_) => Message::Text("Internal Server Error".into()),
            other => Message::Text(other.to_string()),
        }
    }
}

pub(crate) async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api_error) = rejection.find::<ApiError>() {
        if api_error.status().is_server_error() {
            error!("Request failed: {api_error}");
        }
        (api_error.status(), api_error.message())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, Message::Text("Not Found".into()))
    } else if let Some(body) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, Message::Text(body.to_string()))
    } else if let Some(query) = rejection.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, Message::Text(query.to_string()))
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Message::Text("Expected a JSON body".into()),
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            Message::Text("Content-Length required".into()),
        )
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            Message::Text("Payload too large".into()),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            Message::Text("Method not allowed".into()),
        )
    } else {
        error!("Unhandled rejection: {rejection:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Message::Text("Internal Server Error".into()),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&Outcome::failure(message)),
        status,
    ))
}
