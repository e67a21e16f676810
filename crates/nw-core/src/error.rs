use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

/// Diagnostic for a `create window` statement that declares no data window.
pub const ERROR_MSG_DATAWINDOWS: &str =
    "Named windows require one or more child views that are data window views";

/// Diagnostic for a consuming statement that declares its own data window
/// onto a named window.
pub const ERROR_MSG_NO_DATAWINDOW_ALLOWED: &str =
    "Consuming statements to a named window cannot declare a data window view onto the named window";

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("named window already exists")]
    WindowExists,
    #[error("{}", ERROR_MSG_DATAWINDOWS)]
    MissingDataWindow,
    #[error("{}", ERROR_MSG_NO_DATAWINDOW_ALLOWED)]
    DisallowedDataWindow,
    #[error("index build error")]
    IndexBuild,
    #[error("data format error")]
    DataFormat,
    #[error("named window dispatch error")]
    Dispatch,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::WindowExists => 1001,
            Self::MissingDataWindow => 1002,
            Self::DisallowedDataWindow => 1003,
            Self::IndexBuild => 1004,
            Self::DataFormat => 1005,
            Self::Dispatch => 1006,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
