use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Credential error: {message}")]
    CredentialError { message: String },

    #[error("Not found: {resource}")]
    NotFoundError { resource: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Failed to connect to database '{path}': {source}")]
    DatabaseConnectionError {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Validation mismatch: {message}")]
    ValidationMismatch { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Remote,
    Storage,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn credential(message: impl Into<String>) -> Self {
        Self::CredentialError {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFoundError {
            resource: resource.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::CredentialError { .. } => ErrorCategory::Authentication,
            EtlError::NotFoundError { .. } | EtlError::ApiError(_) => ErrorCategory::Remote,
            EtlError::DatabaseConnectionError { .. } | EtlError::DatabaseError(_) => {
                ErrorCategory::Storage
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ValidationMismatch { .. }
            | EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 抽查不一致只回報，不阻擋寫入
            EtlError::ValidationMismatch { .. } => ErrorSeverity::Low,
            // 網路暫時性錯誤，重跑可能成功
            EtlError::ApiError(_) => ErrorSeverity::Medium,
            EtlError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::CredentialError { .. } => {
                "Check that the credential file exists and is a valid service account key"
            }
            EtlError::NotFoundError { .. } => {
                "Check the sheet key, the worksheet name, and that the sheet is shared with the service account"
            }
            EtlError::ApiError(_) => "Check network connectivity and retry",
            EtlError::DatabaseConnectionError { .. } => {
                "Check that the output directory exists, is writable, and that the sheet title is a valid file name"
            }
            EtlError::DatabaseError(_) => {
                "Check that the existing table columns match the worksheet headers"
            }
            EtlError::ValidationMismatch { .. } => {
                "Compare the worksheet contents with the configured spot checks"
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix the configuration and run again",
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => {
                "Check the worksheet header row for empty or duplicate column names"
            }
            EtlError::IoError(_) => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::DatabaseConnectionError { .. } => "Failed to connect to database.".to_string(),
            EtlError::CredentialError { message } => {
                format!("Could not load credentials: {}", message)
            }
            EtlError::NotFoundError { resource } => format!("Not found: {}", resource),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
