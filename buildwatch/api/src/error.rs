use actix_web::{http::StatusCode, HttpResponse};
use buildwatch_model::data::ErrorInfo;
use kube::runtime::watcher;
use serde::{Deserialize, Serialize};

/// Failure to establish or maintain a subscription to a collection.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// The HTTP status code reported by the cluster API, if any.
    pub code: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(code: impl Into<Option<u16>>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A human-readable message for the status code.
    pub fn http_message(&self) -> &'static str {
        http_message(self.code)
    }

    /// Convert into the presentation form, using the given title.
    pub fn to_info(&self, title: impl Into<String>) -> ErrorInfo {
        ErrorInfo {
            code: self.code,
            title: title.into(),
            message: self.http_message().to_string(),
        }
    }
}

pub fn http_message(code: Option<u16>) -> &'static str {
    match code {
        Some(400) => "Bad Request",
        Some(401) => "Unauthorized",
        Some(403) => "Forbidden",
        Some(404) => "Not Found",
        Some(409) => "Conflict",
        Some(410) => "Gone",
        Some(429) => "Too Many Requests",
        Some(500) => "Internal Server Error",
        Some(502) => "Bad Gateway",
        Some(503) => "Service Unavailable",
        Some(504) => "Gateway Timeout",
        _ => "Something went wrong",
    }
}

impl From<&kube::Error> for TransportError {
    fn from(err: &kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => Self::new(response.code, response.message.clone()),
            err => Self::new(None, err.to_string()),
        }
    }
}

impl From<&watcher::Error> for TransportError {
    fn from(err: &watcher::Error) -> Self {
        match err {
            watcher::Error::InitialListFailed(err)
            | watcher::Error::WatchStartFailed(err)
            | watcher::Error::WatchFailed(err) => err.into(),
            watcher::Error::WatchError(response) => Self::new(response.code, response.message.clone()),
            #[allow(unreachable_patterns)]
            err => Self::new(None, err.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInformation {
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

/// Errors of the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("selector error: {0}")]
    Selector(#[from] crate::selector::SelectorError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Websocket(#[from] actix_web::Error),
}

impl actix_web::error::ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Selector(_) => StatusCode::BAD_REQUEST,
            Self::Websocket(err) => err.error_response().status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());
        match self {
            Self::BadRequest(details) => res.json(ErrorInformation {
                error: format!("{}", self.status_code()),
                message: "Invalid request".to_string(),
                details: details.clone(),
            }),
            Self::Selector(err) => res.json(ErrorInformation {
                error: format!("{}", self.status_code()),
                message: "Invalid selector".to_string(),
                details: err.to_string(),
            }),
            Self::Serde(err) => res.json(ErrorInformation {
                error: "Serialization".to_string(),
                message: "Serialization error".to_string(),
                details: err.to_string(),
            }),
            Self::Websocket(err) => res.json(ErrorInformation {
                error: format!("{}", self.status_code()),
                message: "Unable to open the stream".to_string(),
                details: err.to_string(),
            }),
        }
    }
}
