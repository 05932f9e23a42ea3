//! Courier renders message templates into RFC 5322 messages and hands them
//! to an SMTP relay.
//!
//! A delivery goes through three stages:
//!
//! * a [`Template`] is parsed from a file whose leading lines are headers
//!   (`From:`, `To:`, `Subject:`, ...) and whose remainder is the body,
//! * a [`MessageBuilder`] renders the template against caller data and an
//!   [`EmailConfig`], producing a MIME [`Message`] and its [`Envelope`],
//! * [`transport::smtp`] runs the SMTP session against the configured
//!   smarthost and classifies failures as retryable or permanent.
//!
//! Pre-built messages can bypass rendering entirely through
//! [`transport::raw`], which reads the envelope out of the message headers
//! and streams the bytes unchanged.
//!
//! ```rust,no_run
//! use courier::{Context, EmailConfig};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EmailConfig::load_file("alerts.yml")?;
//! let data = json!({ "Status": "firing", "Alerts": [{ "Name": "disk full" }] });
//!
//! match courier::send(&Context::background(), &config, &data) {
//!     Ok(response) => println!("queued: {}", response.message().collect::<Vec<_>>().join(" ")),
//!     Err(err) if err.is_retryable() => eprintln!("will retry: {err}"),
//!     Err(err) => eprintln!("giving up: {err}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * **hostname** (default): use the local host name as the default `EHLO` argument
//! * **tracing** (default): log the SMTP conversation through the `tracing` crate

#![doc(html_root_url = "https://docs.rs/crate/courier/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_import_braces, trivial_casts)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod address;
pub mod config;
pub mod context;
mod error;
pub mod message;
mod send;
pub mod template;
pub mod transport;

pub use crate::{
    address::Envelope,
    config::{EmailConfig, Secret, SmartHost},
    context::{CancelHandle, Context},
    error::{Error, Phase},
    message::{Message, MessageBuilder},
    send::send,
    template::Template,
    transport::{raw::deliver_raw, smtp::deliver, Transport},
};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
