//! Error type returned by the high level operations

use std::{
    error::Error as StdError,
    fmt,
    path::{Path, PathBuf},
};

use crate::{transport::smtp, BoxError};

/// Stage of the SMTP session a delivery error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Phase {
    /// Opening the TCP connection to the relay
    Dial,
    /// Reading the server banner
    Greeting,
    /// `MAIL FROM`
    MailFrom,
    /// `RCPT TO`
    RcptTo,
    /// `DATA`, the message content and its final reply
    Data,
}

impl Phase {
    /// Whether a failure in this phase is worth retrying later
    ///
    /// Sender and recipient rejections are answers about the message itself,
    /// every other phase fails because of the relay or the network.
    pub fn is_retryable(self) -> bool {
        matches!(self, Phase::Dial | Phase::Greeting | Phase::Data)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Dial => "dial",
            Phase::Greeting => "greeting",
            Phase::MailFrom => "MAIL FROM",
            Phase::RcptTo => "RCPT TO",
            Phase::Data => "DATA",
        })
    }
}

/// The errors that may occur while rendering or delivering a message
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Parsing or executing a template failed
    Template,
    /// The rendered or raw message has no sender
    MissingFrom,
    /// The rendered or raw message has no recipient
    MissingTo,
    /// An attachment could not be read
    Attachment(PathBuf),
    /// Configuration is unusable
    Config,
    /// A pre-built message could not be understood
    Message,
    /// The SMTP session failed
    Delivery {
        phase: Phase,
        recipient: Option<String>,
    },
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if sending the same message again later may succeed
    ///
    /// Failures reaching the relay or talking to it over a broken connection
    /// are retryable, and so are cancellations and expired deadlines. Everything
    /// about the message itself (bad template, missing sender, rejected
    /// recipient) is permanent.
    pub fn is_retryable(&self) -> bool {
        match self.inner.kind {
            Kind::Delivery { phase, .. } => {
                phase.is_retryable() || self.smtp().is_some_and(smtp::Error::is_network_failure)
            }
            _ => false,
        }
    }

    /// Returns true if retrying cannot succeed without changing the input
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }

    /// Returns true if the error comes from the template engine
    pub fn is_template(&self) -> bool {
        matches!(self.inner.kind, Kind::Template)
    }

    /// Returns true if the error is caused by a missing or invalid configuration
    pub fn is_config(&self) -> bool {
        matches!(self.inner.kind, Kind::Config)
    }

    /// Returns true if the message has no sender
    pub fn is_missing_from(&self) -> bool {
        matches!(self.inner.kind, Kind::MissingFrom)
    }

    /// Returns true if the message has no recipient
    pub fn is_missing_to(&self) -> bool {
        matches!(self.inner.kind, Kind::MissingTo)
    }

    /// Returns true if an attachment could not be read
    pub fn is_attachment(&self) -> bool {
        matches!(self.inner.kind, Kind::Attachment(_))
    }

    /// The SMTP phase the error happened in, if it comes from a delivery
    pub fn phase(&self) -> Option<Phase> {
        match self.inner.kind {
            Kind::Delivery { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// The recipient refused by the relay, for `RCPT TO` failures
    pub fn recipient(&self) -> Option<&str> {
        match self.inner.kind {
            Kind::Delivery {
                recipient: Some(ref recipient),
                ..
            } => Some(recipient),
            _ => None,
        }
    }

    /// The underlying SMTP error, if the error comes from a delivery
    pub fn smtp(&self) -> Option<&smtp::Error> {
        self.inner.source.as_ref()?.downcast_ref::<smtp::Error>()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("courier::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Template => f.write_str("template error")?,
            Kind::MissingFrom => f.write_str("missing sender address")?,
            Kind::MissingTo => f.write_str("missing recipient address")?,
            Kind::Attachment(ref path) => {
                write!(f, "failed to read attachment {}", path.display())?
            }
            Kind::Config => f.write_str("invalid configuration")?,
            Kind::Message => f.write_str("malformed message")?,
            Kind::Delivery {
                phase,
                recipient: Some(ref recipient),
            } => write!(f, "{phase} <{recipient}> failed")?,
            Kind::Delivery { phase, .. } => write!(f, "{phase} failed")?,
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn StdError + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn template<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Template, Some(e))
}

pub(crate) fn missing_from() -> Error {
    Error::new(Kind::MissingFrom, None::<BoxError>)
}

pub(crate) fn missing_to() -> Error {
    Error::new(Kind::MissingTo, None::<BoxError>)
}

pub(crate) fn attachment<E: Into<BoxError>>(path: &Path, e: E) -> Error {
    Error::new(Kind::Attachment(path.to_owned()), Some(e))
}

pub(crate) fn config<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Config, Some(e))
}

pub(crate) fn message<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Message, Some(e))
}

pub(crate) fn delivery(phase: Phase, e: smtp::Error) -> Error {
    Error::new(
        Kind::Delivery {
            phase,
            recipient: None,
        },
        Some(e),
    )
}

pub(crate) fn rejected_recipient(recipient: &str, e: smtp::Error) -> Error {
    Error::new(
        Kind::Delivery {
            phase: Phase::RcptTo,
            recipient: Some(recipient.to_owned()),
        },
        Some(e),
    )
}
