//! Command routing and handler errors

/// Boxed error raised inside a handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument <{argument}> for `{command}`")]
    MissingArgument { command: String, argument: String },

    #[error("command `{0}` is already registered")]
    DuplicateCommand(String),

    #[error("could not parse command: {0}")]
    Parse(String),

    /// The bridge is not set up for what the command needs. `message` is
    /// shown to the user verbatim.
    #[error("{message}")]
    Configuration { code: &'static str, message: String },

    #[error("command failed: {0}")]
    Handler(#[source] BoxError),
}

impl Error {
    pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        Error::Configuration {
            code,
            message: message.into(),
        }
    }

    pub fn handler(err: impl Into<BoxError>) -> Self {
        Error::Handler(err.into())
    }
}

/// Result alias for command operations.
pub type Result<T> = std::result::Result<T, Error>;
