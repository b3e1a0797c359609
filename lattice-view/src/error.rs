//! Error types for binding, compilation and change propagation.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a dotted path could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFault {
    /// The expression (or one of its segments) is empty.
    Empty,
    /// A segment contains characters that are not part of an identifier.
    Invalid,
    /// An intermediate segment resolved to nothing.
    Missing,
    /// A segment resolved to a primitive while more segments remain.
    NotAnObject,
}

impl fmt::Display for PathFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PathFault::Empty => "is empty",
            PathFault::Invalid => "is not a valid identifier",
            PathFault::Missing => "does not exist",
            PathFault::NotAnObject => "is not an object",
        };
        f.write_str(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dotted path could not be resolved on read or write.
    #[error("cannot resolve `{expression}`: segment `{segment}` {fault}")]
    Path {
        expression: String,
        segment: String,
        fault: PathFault,
    },

    /// A directive attribute names no known binding category.
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),

    /// A directive that needs an argument (`v-on:<event>`) was given none.
    #[error("directive `{directive}` requires an argument")]
    MissingArgument { directive: String },

    /// An interpolation opener without a matching closer.
    #[error("unterminated interpolation at byte {offset} in `{text}`")]
    MalformedTemplate { text: String, offset: usize },

    /// Write through a getter-only accessor.
    #[error("property `{0}` is read-only")]
    ReadOnly(String),

    /// An event binding names something that is not a method.
    #[error("`{0}` is not a method")]
    NotCallable(String),

    #[error("no node matches selector `{0}`")]
    TargetNotFound(String),

    /// The owning view model was dropped.
    #[error("view model is no longer alive")]
    Detached,

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Config(#[from] serde_json::Error),

    /// A binding failed; names the offending node and expression.
    #[error("binding `{expression}` on {node}: {source}")]
    Binding {
        node: String,
        expression: String,
        #[source]
        source: Box<Error>,
    },

    /// Every failure of one compilation pass.
    #[error("compilation failed with {} error(s): {}", .0.len(), join(.0))]
    Compile(Vec<Error>),

    /// Every subscriber failure of one notification, collected after all ran.
    #[error("{} subscriber(s) failed during notify: {}", .0.len(), join(.0))]
    Notify(Vec<Error>),
}

impl Error {
    pub(crate) fn path(expression: &str, segment: &str, fault: PathFault) -> Self {
        Error::Path {
            expression: expression.to_string(),
            segment: segment.to_string(),
            fault,
        }
    }

    /// Flatten a list of failures: nothing is `Ok`, one is itself, more are
    /// wrapped by `wrap`.
    pub(crate) fn collect(mut errors: Vec<Error>, wrap: fn(Vec<Error>) -> Error) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(wrap(errors)),
        }
    }
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
