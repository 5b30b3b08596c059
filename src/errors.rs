use serde::Serialize;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Invalid or missing configuration.
    Config(String),
    /// Database-related errors.
    Database(sqlx::Error),
    /// The schema catalog is inconsistent (unknown reference, FK cycle).
    Schema(String),
    /// Resource not found error.
    NotFound(String),
    /// A statement was refused before reaching the server.
    Rejected(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Schema(msg) => write!(f, "Schema error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl AppError {
    /// Walks the context chain down to the underlying sqlx error, if any.
    pub fn sql_error(&self) -> Option<&sqlx::Error> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::WithContext { source, .. } => source.sql_error(),
            _ => None,
        }
    }

    pub fn sql_kind(&self) -> SqlErrorKind {
        self.sql_error()
            .map(classify)
            .unwrap_or(SqlErrorKind::Other)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Database(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Database(e)),
            context: f(),
        })
    }
}

/// MySQL server error numbers that schema repair cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlErrorKind {
    /// ER_DUP_KEY (1022)
    DuplicateKey,
    /// ER_TABLE_EXISTS_ERROR (1050)
    TableExists,
    /// ER_DUP_FIELDNAME (1060)
    DuplicateColumn,
    /// ER_DUP_KEYNAME (1061)
    DuplicateKeyName,
    /// ER_CANT_DROP_FIELD_OR_KEY (1091)
    CantDropMissing,
    /// ER_NO_SUCH_TABLE (1146)
    NoSuchTable,
    /// ER_FK_DUP_NAME (1826)
    DuplicateForeignKey,
    Other,
}

impl SqlErrorKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            1022 => SqlErrorKind::DuplicateKey,
            1050 => SqlErrorKind::TableExists,
            1060 => SqlErrorKind::DuplicateColumn,
            1061 => SqlErrorKind::DuplicateKeyName,
            1091 => SqlErrorKind::CantDropMissing,
            1146 => SqlErrorKind::NoSuchTable,
            1826 => SqlErrorKind::DuplicateForeignKey,
            _ => SqlErrorKind::Other,
        }
    }

    /// The change a statement tried to make is already in place.
    pub fn is_already_applied(self) -> bool {
        matches!(
            self,
            SqlErrorKind::DuplicateKey
                | SqlErrorKind::TableExists
                | SqlErrorKind::DuplicateColumn
                | SqlErrorKind::DuplicateKeyName
                | SqlErrorKind::DuplicateForeignKey
        )
    }
}

/// Classifies a sqlx error by its MySQL error number.
pub fn classify(err: &sqlx::Error) -> SqlErrorKind {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
            .map(|e| SqlErrorKind::from_code(e.number()))
            .unwrap_or(SqlErrorKind::Other),
        _ => SqlErrorKind::Other,
    }
}
