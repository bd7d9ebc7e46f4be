use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

/// boxed error type used at the transport plugin seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString)]
pub enum ErrorKind {
    Configuration,
    UnknownService,
    UnknownMethod,
    Serialization,
    Deserialization,
    Transport,
    Cancelled,
    Shutdown,
}

/// the error taxonomy of the invocation core.
///
/// every failure surfaces to the caller of `invoke`/`shutdown`; nothing is
/// swallowed inside the core. `Transport` and the codec variants keep the
/// original cause in their source chain.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no service registered for app id `{0}`")]
    UnknownService(String),

    #[error("no method `{method}` registered for app id `{app_id}`")]
    UnknownMethod { app_id: String, method: String },

    #[error("failed to serialize request body as {content_type}")]
    Serialization {
        content_type: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to deserialize response body as {content_type}")]
    Deserialization {
        content_type: String,
        #[source]
        source: BoxError,
    },

    #[error("transport invocation failed for app id `{app_id}`")]
    Transport {
        app_id: String,
        #[source]
        source: BoxError,
    },

    #[error("call cancelled before completion")]
    Cancelled,

    #[error("shutdown finished with {} release failure(s)", .0.len())]
    Shutdown(Vec<Error>),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::UnknownService(_) => ErrorKind::UnknownService,
            Error::UnknownMethod { .. } => ErrorKind::UnknownMethod,
            Error::Serialization { .. } => ErrorKind::Serialization,
            Error::Deserialization { .. } => ErrorKind::Deserialization,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Shutdown(_) => ErrorKind::Shutdown,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Error {
        Error::Configuration(msg.into())
    }

    pub fn serialization(content_type: &str, source: impl Into<BoxError>) -> Error {
        Error::Serialization {
            content_type: content_type.to_owned(),
            source: source.into(),
        }
    }

    pub fn deserialization(content_type: &str, source: impl Into<BoxError>) -> Error {
        Error::Deserialization {
            content_type: content_type.to_owned(),
            source: source.into(),
        }
    }

    pub fn transport(app_id: &str, source: impl Into<BoxError>) -> Error {
        Error::Transport {
            app_id: app_id.to_owned(),
            source: source.into(),
        }
    }
}
