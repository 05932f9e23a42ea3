use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    io,
};

/// Error type for templates
#[derive(Debug)]
pub enum Error {
    /// The template source could not be read, or the output not written
    Io(io::Error),
    /// Syntax error in the template source
    Parse(ParseError),
    /// Failure while rendering the template against data
    Exec(ExecError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "template i/o: {e}"),
            Error::Parse(e) => write!(f, "template parse: {e}"),
            Error::Exec(e) => write!(f, "template execute: {e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Parse(e) => Some(e),
            Error::Exec(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<ExecError> for Error {
    fn from(err: ExecError) -> Error {
        Error::Exec(err)
    }
}

/// Syntax error, with the line of the template it was found on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    line: usize,
    message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// Line number, starting at 1
    pub fn line(&self) -> usize {
        self.line
    }

    /// Description of the problem
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn shifted(mut self, lines: usize) -> Self {
        self.line += lines;
        self
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl StdError for ParseError {}

/// Rendering failure: strict missing key, bad index, wrong arity...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecError {
    message: String,
}

impl ExecError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Description of the problem
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ExecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ExecError {}
