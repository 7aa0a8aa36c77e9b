use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification callers branch on without inspecting messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
    Configuration,
    SchemaVersion,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid query options: {0}")]
    InvalidOptions(String),
    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("{context}: {source}")]
    Encoding {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("graph store error: {0}")]
    Graph(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("db version {found} is newer than the expected {expected}")]
    SchemaVersion { found: u32, expected: u32 },
}

impl StoreError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        StoreError::NotFound(msg.into())
    }

    pub fn invalid_options<T: Into<String>>(msg: T) -> Self {
        StoreError::InvalidOptions(msg.into())
    }

    pub fn graph<T: Into<String>>(msg: T) -> Self {
        StoreError::Graph(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        StoreError::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) | StoreError::InvalidOptions(_) => ErrorKind::Validation,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Persistence { .. } | StoreError::Encoding { .. } | StoreError::Graph(_) => {
                ErrorKind::Persistence
            }
            StoreError::Configuration(_) => ErrorKind::Configuration,
            StoreError::SchemaVersion { .. } => ErrorKind::SchemaVersion,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// SQLite refused a row whose referenced parent row does not exist.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Persistence {
                source: rusqlite::Error::SqliteFailure(err, _),
                ..
            } if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        )
    }

    /// Reports a missing parent row as not-found, leaving other errors as is.
    pub fn missing_parent<T: Into<String>>(self, what: T) -> Self {
        if self.is_foreign_key_violation() {
            StoreError::not_found(what)
        } else {
            self
        }
    }

    /// Prefixes persistence-class errors with operation context. Validation,
    /// not-found, configuration and version errors pass through untouched.
    pub fn with_context<T: Into<String>>(self, ctx: T) -> Self {
        match self {
            StoreError::Persistence { context, source } => StoreError::Persistence {
                context: format!("{}: {context}", ctx.into()),
                source,
            },
            StoreError::Encoding { context, source } => StoreError::Encoding {
                context: format!("{}: {context}", ctx.into()),
                source,
            },
            StoreError::Graph(msg) => StoreError::Graph(format!("{}: {msg}", ctx.into())),
            other => other,
        }
    }
}

/// Attaches operation context while converting foreign errors.
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, ctx: C) -> StoreResult<T>;
}

impl<T> ResultExt<T> for Result<T, rusqlite::Error> {
    fn context<C: Into<String>>(self, ctx: C) -> StoreResult<T> {
        self.map_err(|source| StoreError::Persistence {
            context: ctx.into(),
            source,
        })
    }
}

impl<T> ResultExt<T> for Result<T, serde_json::Error> {
    fn context<C: Into<String>>(self, ctx: C) -> StoreResult<T> {
        self.map_err(|source| StoreError::Encoding {
            context: ctx.into(),
            source,
        })
    }
}

impl<T> ResultExt<T> for StoreResult<T> {
    fn context<C: Into<String>>(self, ctx: C) -> StoreResult<T> {
        self.map_err(|err| err.with_context(ctx))
    }
}
