use thiserror::Error;

use crate::config::ConfigError;
use crate::providers::ProviderError;
use crate::sheet::SheetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    Runtime,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) => ErrorKind::User,
            AppError::Sheet(SheetError::InvalidArgument(_) | SheetError::SheetNotFound(_)) => {
                ErrorKind::User
            }
            AppError::Provider(_) | AppError::Sheet(_) => ErrorKind::Runtime,
        }
    }

    /// Stable machine-readable code printed next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "user.config",
            AppError::Sheet(SheetError::InvalidArgument(_) | SheetError::SheetNotFound(_)) => {
                "user.invalid_input"
            }
            AppError::Provider(ProviderError::NotFound(_)) => "runtime.location_not_found",
            AppError::Provider(ProviderError::Http { .. }) => "runtime.request_failed",
            AppError::Provider(_) => "runtime.provider",
            AppError::Sheet(_) => "runtime.storage",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::User => 2,
            ErrorKind::Runtime => 1,
        }
    }
}
