//! Delivery of pre-built messages
//!
//! The envelope is read from the message's own `From`, `To`, `Cc` and `Bcc`
//! headers and the input is streamed to the relay byte for byte.

use std::{io::Read, time::Duration};

use crate::{
    address::address_list,
    error::{self, Error},
    transport::{
        smtp::{ClientId, Response, SmtpRelay},
        Transport,
    },
    Context, Envelope,
};

/// Sends pre-built messages through an [`SmtpRelay`]
#[derive(Debug, Clone)]
pub struct RawInjector {
    relay: SmtpRelay,
}

impl RawInjector {
    /// Injector for the relay at `server` (`host:port`)
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            relay: SmtpRelay::new(server),
        }
    }

    /// Name to send during `EHLO`
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.relay = self.relay.hello_name(name);
        self
    }

    /// Bounds every network operation when the context has no deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.relay = self.relay.timeout(timeout);
        self
    }

    /// Reads the whole message from `reader` and delivers it
    ///
    /// Nothing touches the network when the headers yield no sender or no
    /// recipient.
    pub fn send<R: Read>(&self, ctx: &Context, mut reader: R) -> Result<Response, Error> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(error::message)?;

        let envelope = envelope_from_raw(&raw)?;
        self.relay.send_raw(ctx, &envelope, &raw)
    }
}

/// Delivers the message read from `reader` through the relay at `relay`
pub fn deliver_raw<R: Read>(ctx: &Context, reader: R, relay: &str) -> Result<Response, Error> {
    RawInjector::new(relay).send(ctx, reader)
}

/// Unfolded header fields, up to the first empty line
fn header_fields(raw: &[u8]) -> Result<Vec<(String, String)>, Error> {
    let text = String::from_utf8_lossy(raw);
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }

        if line.starts_with([' ', '\t']) {
            match fields.last_mut() {
                Some((_, value)) => value.push_str(line),
                None => {
                    return Err(error::message(format!(
                        "continuation line before any header: {line:?}"
                    )))
                }
            }
            continue;
        }

        match line.split_once(':') {
            Some((name, value)) => {
                fields.push((name.trim().to_owned(), value.trim().to_owned()))
            }
            None => return Err(error::message(format!("malformed header line: {line:?}"))),
        }
    }

    Ok(fields)
}

fn values<'a>(fields: &'a [(String, String)], name: &'a str) -> impl Iterator<Item = &'a str> {
    fields
        .iter()
        .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Reads the envelope out of a formatted message
///
/// The sender is the first address of `From`. Recipients come from `To`,
/// then `Cc`, then `Bcc`, deduplicated case-insensitively.
///
/// ```
/// # use courier::transport::raw::envelope_from_raw;
/// let envelope = envelope_from_raw(b"From: Ops <ops@example.com>\r\nTo: a@example.com\r\n\r\nhi")?;
/// assert_eq!(envelope.from(), "ops@example.com");
/// assert_eq!(envelope.to(), ["a@example.com"]);
/// # Ok::<(), courier::Error>(())
/// ```
pub fn envelope_from_raw(raw: &[u8]) -> Result<Envelope, Error> {
    let fields = header_fields(raw)?;

    let from = values(&fields, "From")
        .flat_map(address_list)
        .next()
        .ok_or_else(error::missing_from)?;

    let mut recipients: Vec<String> = Vec::new();
    for address in ["To", "Cc", "Bcc"]
        .into_iter()
        .flat_map(|name| values(&fields, name))
        .flat_map(address_list)
    {
        if !recipients
            .iter()
            .any(|known| known.eq_ignore_ascii_case(&address))
        {
            recipients.push(address);
        }
    }

    Envelope::new(from, recipients)
}
