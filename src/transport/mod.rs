//! ## Transports for sending emails
//!
//! * The [`smtp`] transport runs an SMTP session against a relay and
//!   classifies failures as retryable or permanent
//! * The [`raw`] injector sends a pre-built message through the same session,
//!   reading its envelope from the message headers
//!
//! Both work synchronously and are bounded by a [`Context`].

use crate::{Context, Envelope, Message};

pub mod raw;
pub mod smtp;

/// Blocking Transport method for emails
pub trait Transport {
    /// Response produced by the Transport
    type Ok;
    /// Error produced by the Transport
    type Error;

    /// Sends the email
    fn send(&self, ctx: &Context, message: &Message) -> Result<Self::Ok, Self::Error> {
        let raw = message.formatted();
        self.send_raw(ctx, message.envelope(), &raw)
    }

    /// Sends already formatted message bytes to the envelope recipients
    fn send_raw(
        &self,
        ctx: &Context,
        envelope: &Envelope,
        email: &[u8],
    ) -> Result<Self::Ok, Self::Error>;
}
