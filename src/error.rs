use thiserror::Error;

/// Unified application error type to simplify bubbling errors through async flows.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Error communicating with the AI. {0}")]
    AIClient(#[from] async_openai::error::OpenAIError),
    #[error("The AI provider failed. {0}")]
    Provider(String),
    #[error("The AI response did not match the `{schema}` schema. {reason}")]
    SchemaValidation { schema: String, reason: String },
    #[error("Invalid input. {0}")]
    Validation(String),
    #[error("A {0} is already in progress.")]
    InFlight(&'static str),
    #[error("Errored while handling a file. {0}")]
    Io(#[from] std::io::Error),
    #[error("Error serializing json. {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Unable to decode a prompt template. {0}")]
    Utf8Parse(#[from] std::string::FromUtf8Error),
    #[error("Error building the HTTP client. {0}")]
    Http(#[from] reqwest::Error),
    #[error("Error parsing the duration string. {0}")]
    DurationParse(#[from] humantime::DurationError),
    #[error("Directory not found error. {0}")]
    Dir(#[from] testi_ai_dirs::DirError),
    #[error("Invalid configuration. {0}")]
    Config(String),
}

/// Coarse classification of [`AppError`], used at the HTTP and CLI boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, authentication or model failure.
    Provider,
    /// The model answered, but not in the expected shape.
    SchemaValidation,
    /// The caller sent malformed input.
    Validation,
    /// The operation collides with one still running.
    InFlight,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Provider => "provider_error",
            ErrorKind::SchemaValidation => "schema_validation_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::InFlight => "in_flight",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::AIClient(_) | AppError::Provider(_) => ErrorKind::Provider,
            AppError::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::InFlight(_) => ErrorKind::InFlight,
            _ => ErrorKind::Internal,
        }
    }
}

/// Convenience alias for results that bubble `AppError`.
pub type AppResult<T> = Result<T, AppError>;
