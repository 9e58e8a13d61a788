//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad env values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source row could not be converted into the typed record for its table.
    #[error("Malformed row in table {table}: {message}")]
    MalformedRow { table: String, message: String },

    /// Reading from the SQLite source failed mid-stream.
    #[error("Source read failed for table {table}: {source}")]
    SourceRead {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// PostgreSQL rejected a write (constraint violation, type mismatch, lost connection).
    #[error("Target write failed for table {table}: {source}")]
    TargetWrite {
        table: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// No column/conflict mapping exists for the requested table name.
    #[error("Unknown table '{0}': no column mapping configured")]
    UnknownTable(String),

    /// A record does not match the column list configured for its table.
    #[error("Column count mismatch for table {table}: expected {expected} values, got {actual}")]
    ColumnCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// Connection or pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a MalformedRow error
    pub fn malformed(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::MalformedRow {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Wrap a sqlx error raised while streaming `table`.
    pub fn source_read(table: impl Into<String>, source: sqlx::Error) -> Self {
        MigrateError::SourceRead {
            table: table.into(),
            source,
        }
    }

    /// Wrap a PostgreSQL error raised while writing `table`.
    pub fn target_write(table: impl Into<String>, source: tokio_postgres::Error) -> Self {
        MigrateError::TargetWrite {
            table: table.into(),
            source,
        }
    }

    /// Whether this error must stop the whole migration rather than one table.
    ///
    /// A failed source read leaves the cursor position unknown, so nothing
    /// after it can be trusted.
    pub fn is_abort(&self) -> bool {
        matches!(self, MigrateError::SourceRead { .. })
    }

    /// Process exit code for errors that end the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::SourceRead { .. } => 3,
            MigrateError::TargetWrite { .. }
            | MigrateError::MalformedRow { .. }
            | MigrateError::ColumnCountMismatch { .. } => 2,
            _ => 1,
        }
    }

    /// Message followed by every underlying cause, on one line.
    ///
    /// A driver error's own `Display` can be as terse as "db error"; the
    /// server's message and detail only appear further down the chain.
    pub fn with_causes(&self) -> String {
        let mut output = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let cause = err.to_string().replace('\n', " ");
            if !output.contains(&cause) {
                output.push_str(": ");
                output.push_str(&cause);
            }
            source = err.source();
        }
        output
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
