//! The SMTP transport sends emails using the SMTP protocol.
//!
//! A delivery is one session on a fresh connection: greeting, `EHLO` (or
//! `HELO`), `MAIL FROM`, one `RCPT TO` per recipient, `DATA`, then `QUIT`.
//! There is no TLS and no authentication, the relay is expected to accept
//! mail from the local network.
//!
//! Failures are reported with the [`Phase`] they happened in, which decides
//! whether the delivery is worth retrying:
//!
//! | Phase        | Outcome   |
//! |--------------|-----------|
//! | dial         | retryable |
//! | greeting     | retryable |
//! | `MAIL FROM`  | permanent |
//! | `RCPT TO`    | permanent |
//! | `DATA`       | retryable |
//!
//! A refused `EHLO` falls back to `HELO`, and a refused `HELO` is ignored.
//! Broken connections, timeouts and cancellations are retryable whatever
//! the phase.
//!
//! ```rust,no_run
//! use courier::{
//!     transport::smtp::{ClientId, SmtpRelay},
//!     Context, Envelope, Transport,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let envelope = Envelope::new("alerts@example.com", vec!["ops@example.com".into()])?;
//! let relay = SmtpRelay::new("mx.example.com:25").hello_name(ClientId::from_hello("monitor"));
//! relay.send_raw(&Context::background(), &envelope, b"Subject: test\r\n\r\nhello\r\n")?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub use self::{
    client::{ClientCodec, SmtpConnection},
    error::Error,
    extension::{ClientId, Extension, MailBodyParameter, MailParameter, ServerInfo},
    response::{Code, Response, Severity},
};
use crate::{
    error::{self as courier_error, Phase},
    transport::Transport,
    Context, Envelope,
};

pub mod client;
pub mod commands;
pub(crate) mod error;
pub mod extension;
pub mod response;

use self::commands::{Data, Mail, Rcpt};

/// Default smtp port
pub const SMTP_PORT: u16 = 25;

/// Default timeout for a session, when the context has no deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends messages to an SMTP relay, one session per message
#[derive(Debug, Clone)]
pub struct SmtpRelay {
    server: String,
    hello_name: ClientId,
    timeout: Duration,
}

impl SmtpRelay {
    /// Creates a transport for the relay at `server` (`host:port`)
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            hello_name: ClientId::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Name to send during `EHLO`
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.hello_name = name;
        self
    }

    /// Bounds every network operation when the context has no deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The relay address
    pub fn server(&self) -> &str {
        &self.server
    }

    fn transaction(
        &self,
        conn: &mut SmtpConnection,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Response, courier_error::Error> {
        conn.greeting()
            .map_err(|e| courier_error::delivery(Phase::Greeting, e))?;

        // Some relays refuse both greetings and still take mail
        if let Err(e) = conn.hello(&self.hello_name) {
            if e.status().is_none() {
                return Err(courier_error::delivery(Phase::Greeting, e));
            }
            #[cfg(feature = "tracing")]
            tracing::warn!("HELO refused, continuing: {}", e);
        }

        let mut mail_options = vec![];
        if envelope.has_non_ascii_addresses()
            && conn.server_info().supports_feature(Extension::SmtpUtfEight)
        {
            mail_options.push(MailParameter::SmtpUtfEight);
        }
        if !email.is_ascii() && conn.server_info().supports_feature(Extension::EightBitMime) {
            mail_options.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }

        conn.command(Mail::new(envelope.from(), mail_options))
            .map_err(|e| courier_error::delivery(Phase::MailFrom, e))?;

        for to_address in envelope.to() {
            conn.command(Rcpt::new(to_address.as_str()))
                .map_err(|e| courier_error::rejected_recipient(to_address, e))?;
        }

        conn.command(Data)
            .map_err(|e| courier_error::delivery(Phase::Data, e))?;
        conn.message(email)
            .map_err(|e| courier_error::delivery(Phase::Data, e))
    }
}

impl Transport for SmtpRelay {
    type Ok = Response;
    type Error = courier_error::Error;

    fn send_raw(
        &self,
        ctx: &Context,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error> {
        let mut conn = SmtpConnection::connect(ctx, &self.server, self.timeout)
            .map_err(|e| courier_error::delivery(Phase::Dial, e))?;

        let result = self.transaction(&mut conn, envelope, email);

        match result {
            Ok(ref _response) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    server = %self.server,
                    recipients = envelope.to().len(),
                    "message accepted: {}",
                    _response.code()
                );
                // The message is queued, a failing QUIT changes nothing
                if let Err(_e) = conn.quit() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("QUIT failed after delivery: {}", _e);
                }
                conn.close();
            }
            Err(ref _e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("aborting session with {}: {}", self.server, _e);
                conn.abort();
            }
        }

        result
    }
}

/// Runs one SMTP session delivering `message` to `envelope`'s recipients
///
/// This is a shortcut for [`SmtpRelay::send_raw`] with the default timeout.
pub fn deliver(
    ctx: &Context,
    relay: &str,
    hello_name: &ClientId,
    envelope: &Envelope,
    message: &[u8],
) -> Result<Response, courier_error::Error> {
    SmtpRelay::new(relay)
        .hello_name(hello_name.clone())
        .send_raw(ctx, envelope, message)
}
