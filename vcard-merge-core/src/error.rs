//! Error kinds for the pipeline, one variant per fatal condition the
//! fixer/parser/grouper/merger can raise. Most callers should fall back through
//! candidate sources before letting one of these surface; the grouper
//! and serializer raise only on internal invariant violations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The parser adapter refused the text produced by the fixer.
    #[error("malformed vCard input: {0}")]
    MalformedInput(String),

    /// Tried to build a name from a `@nowhere.invalid` placeholder
    /// address; callers should fall back to another candidate source.
    #[error("cannot build a name from a placeholder address: {0}")]
    InvalidPlaceholderEmail(String),

    /// Name selection was invoked with no candidates at all.
    #[error("no candidate names available to select from")]
    EmptyCandidateList,

    /// The selected name contains `=`, suggesting un-decoded
    /// quoted-printable content leaked through.
    #[error("selected name '{0}' looks like undecoded quoted-printable (contains '=')")]
    UndecodedValue(String),

    /// Attempted to create a new group whose key already exists.
    #[error("group key collision: a group named '{0}' already exists")]
    GroupKeyCollision(String),

    /// The requested output path already exists.
    #[error("output path already exists: {0}")]
    OutputExists(String),

    /// An internal contract was violated (e.g. an `ORG` value that
    /// isn't a list where one was expected).
    #[error("internal type mismatch: {0}")]
    TypeMismatch(String),

    /// The parser adapter itself rejected the text (unterminated
    /// `BEGIN:VCARD`, a header line with no `:`).
    #[error(transparent)]
    Parser(#[from] crate::parser::ParserError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
