//! Renders a [`Template`] into a MIME message
//!
//! The builder merges template and configuration fields (the template wins
//! for `From`, `To`, `Cc` and `Bcc`, `Subject` only comes from the
//! template), renders them against the caller data and assembles either a
//! single `text/plain` part or a `multipart/mixed` container holding the
//! text and one base64 part per attachment.
//!
//! ```rust
//! use courier::{message::header::FixedClock, EmailConfig, MessageBuilder, Template};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = Template::parse("From: a@x.com\nTo: b@x.com\nSub: Hi\n\nHello {{.Name}}")?;
//! let config = EmailConfig::default();
//! let message = MessageBuilder::new(&template, &config)
//!     .clock(FixedClock(chrono::DateTime::from_timestamp(0, 0).ok_or("epoch")?))
//!     .build(&json!({ "Name": "Bob" }))?;
//!
//! assert_eq!(message.envelope().to(), ["b@x.com"]);
//! assert_eq!(
//!     String::from_utf8(message.formatted())?,
//!     concat!(
//!         "From: a@x.com\r\n",
//!         "To: b@x.com\r\n",
//!         "Subject: Hi\r\n",
//!         "Date: Thu, 1 Jan 1970 00:00:00 +0000\r\n",
//!         "MIME-Version: 1.0\r\n",
//!         "Content-Type: text/plain; charset=UTF-8\r\n",
//!         "Content-Transfer-Encoding: 7bit\r\n",
//!         "\r\n",
//!         "Hello Bob",
//!     )
//! );
//! # Ok(())
//! # }
//! ```

use std::io::Write;

use serde::Serialize;
use serde_json::Value;

pub use self::{
    attachment::{AttachmentSource, FsAttachmentSource},
    body::Body,
    mimebody::{MultiPart, SinglePart},
};
use self::{
    attachment::attachment_part,
    header::{
        encode_words, single_line, Clock, ContentType, Date, HeaderName, Headers, MimeVersion,
        Subject, SystemClock,
    },
};
use crate::{
    address::{extract_address, recipient_list},
    config::EmailConfig,
    error::{self, Error},
    template::{self, MissingKey, Template},
    Envelope,
};

mod attachment;
mod body;
pub mod header;
mod mimebody;

/// Subject used when the template declares none
pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// Header names configuration can not override
const RESERVED_HEADERS: &[&str] = &[
    "From",
    "To",
    "Cc",
    "Bcc",
    "Subject",
    "Date",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
];

/// Builds a [`Message`] out of a template and a configuration
pub struct MessageBuilder<'a> {
    template: &'a Template,
    config: &'a EmailConfig,
    clock: Box<dyn Clock + 'a>,
    attachments: Box<dyn AttachmentSource + 'a>,
    boundary: Option<String>,
    missing_key: MissingKey,
}

impl<'a> MessageBuilder<'a> {
    /// Creates a builder reading the system clock and the file system
    pub fn new(template: &'a Template, config: &'a EmailConfig) -> Self {
        Self {
            template,
            config,
            clock: Box::new(SystemClock),
            attachments: Box::new(FsAttachmentSource),
            boundary: None,
            missing_key: template.missing_key_mode(),
        }
    }

    /// Time source of the `Date` header
    pub fn clock(mut self, clock: impl Clock + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Where attachment contents are read from
    pub fn attachment_source(mut self, source: impl AttachmentSource + 'a) -> Self {
        self.attachments = Box::new(source);
        self
    }

    /// Fixed multipart boundary instead of a random one
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Missing field handling, defaults to the template's
    pub fn missing_key(mut self, missing_key: MissingKey) -> Self {
        self.missing_key = missing_key;
        self
    }

    /// Renders everything against `data`
    pub fn build<T: Serialize + ?Sized>(&self, data: &T) -> Result<Message, Error> {
        let data = template::context(data).map_err(error::template)?;

        let from = self.address_field("From", &self.config.from, &data)?;
        if from.is_empty() {
            return Err(error::missing_from());
        }
        let to = self.address_field("To", &self.config.to, &data)?;
        if to.is_empty() {
            return Err(error::missing_to());
        }
        let cc = self.address_field("Cc", &self.config.cc, &data)?;
        let bcc = self.address_field("Bcc", &self.config.bcc, &data)?;

        let subject = self
            .template
            .render_field("Subject", &data, self.missing_key)
            .map_err(error::template)?;
        let subject = match single_line(subject).trim() {
            "" => DEFAULT_SUBJECT.to_owned(),
            subject => subject.to_owned(),
        };

        let sender = extract_address(&from).unwrap_or_else(|| from.clone());
        let recipients = [&to, &cc, &bcc]
            .into_iter()
            .flat_map(|list| recipient_list(list))
            .collect();
        let envelope = Envelope::new(sender, recipients)?;

        let mut headers = Headers::new();
        headers.set(header::From::from(from));
        headers.set(header::To::from(to));
        if !cc.is_empty() {
            headers.set(header::Cc::from(cc));
        }
        if !bcc.is_empty() {
            headers.set(header::Bcc::from(bcc));
        }
        headers.set(Subject::from(subject));
        headers.set(Date::in_zone(self.clock.now(), &self.config.timezone));
        headers.set(MimeVersion);
        self.custom_headers(&mut headers, &data)?;

        let text = self.body_text(&data)?;
        let body = if self.config.attachments.is_empty() {
            let body = Body::text(text);
            headers.set(ContentType::text_plain());
            headers.set(body.encoding());
            MessageBody::Single(body)
        } else {
            let mut multipart = MultiPart::mixed(self.boundary.clone())
                .singlepart(SinglePart::new(ContentType::text_plain(), Body::text(text)));
            for path in &self.config.attachments {
                let content = self
                    .attachments
                    .read(path)
                    .map_err(|e| error::attachment(path, e))?;
                multipart = multipart.singlepart(attachment_part(path, &content));
            }
            headers.set(multipart.content_type());
            MessageBody::Multi(multipart)
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            from = envelope.from(),
            recipients = envelope.to().len(),
            attachments = self.config.attachments.len(),
            "message built"
        );

        Ok(Message {
            headers,
            body,
            envelope,
        })
    }

    /// Template value when declared, configuration value otherwise
    fn address_field(&self, name: &str, fallback: &str, data: &Value) -> Result<String, Error> {
        let rendered = match self.template.header(name) {
            Some(value) if !value.trim().is_empty() => self
                .template
                .render_field(name, data, self.missing_key)
                .map_err(error::template)?,
            _ if !fallback.trim().is_empty() => {
                template::render_str(fallback, data, self.missing_key).map_err(error::template)?
            }
            _ => String::new(),
        };
        Ok(single_line(rendered).trim().to_owned())
    }

    fn custom_headers(&self, headers: &mut Headers, data: &Value) -> Result<(), Error> {
        for (name, value) in &self.config.headers {
            let name = name.trim();
            if value.trim().is_empty()
                || RESERVED_HEADERS
                    .iter()
                    .any(|reserved| reserved.eq_ignore_ascii_case(name))
            {
                continue;
            }

            let name = HeaderName::new_from_ascii(name.to_owned()).map_err(error::config)?;
            let value =
                template::render_str(value, data, self.missing_key).map_err(error::template)?;
            let value = single_line(value);
            let value = value.trim();
            if !value.is_empty() {
                headers.set_raw(name, encode_words(value));
            }
        }
        Ok(())
    }

    fn body_text(&self, data: &Value) -> Result<String, Error> {
        if self.template.has_body() {
            self.template
                .render_body_string(data, self.missing_key)
                .map_err(error::template)
        } else if !self.config.text.trim().is_empty() {
            template::render_str(&self.config.text, data, self.missing_key).map_err(error::template)
        } else {
            Ok(String::new())
        }
    }
}

/// Email message which can be formatted
#[derive(Clone, Debug)]
pub struct Message {
    headers: Headers,
    body: MessageBody,
    envelope: Envelope,
}

#[derive(Clone, Debug)]
enum MessageBody {
    Single(Body),
    Multi(MultiPart),
}

impl Message {
    /// Get the headers from the Message
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get `Message` envelope
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Get message content formatted for SMTP
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // writing into a `Vec` cannot fail
        let _ = write!(out, "{}", self.headers);
        out.extend_from_slice(b"\r\n");

        match &self.body {
            MessageBody::Single(body) => out.extend_from_slice(body.as_ref()),
            MessageBody::Multi(multipart) => multipart.format_body(&mut out),
        }
        out
    }
}

#[cfg(test)]
mod test {
    use std::{io, path::Path};

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{header::FixedClock, *};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
    }

    fn build(template: &str, config: &EmailConfig, data: &Value) -> Result<Message, Error> {
        let template = Template::parse(template).unwrap();
        let result = MessageBuilder::new(&template, config)
            .clock(clock())
            .build(data);
        result
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8(message.formatted()).unwrap()
    }

    #[test]
    fn template_values_win() {
        let config = EmailConfig {
            from: "config@example.com".into(),
            to: "config-to@example.com".into(),
            cc: "config-cc@example.com".into(),
            ..Default::default()
        };
        let message = build(
            "From: {{.Team}} <template@example.com>\n\nbody",
            &config,
            &json!({ "Team": "Ops" }),
        )
        .unwrap();

        assert_eq!(message.headers().get_raw("From"), Some("Ops <template@example.com>"));
        assert_eq!(message.headers().get_raw("To"), Some("config-to@example.com"));
        assert_eq!(message.envelope().from(), "template@example.com");
        assert_eq!(
            message.envelope().to(),
            ["config-to@example.com", "config-cc@example.com"]
        );
    }

    #[test]
    fn missing_from_and_to() {
        let config = EmailConfig::default();
        let err = build("To: a@example.com\n\n", &config, &json!({})).unwrap_err();
        assert!(err.is_missing_from());
        assert!(err.is_permanent());

        let err = build("From: a@example.com\n\n", &config, &json!({})).unwrap_err();
        assert!(err.is_missing_to());

        // renders to nothing
        let err = build("From: {{.Nobody}}\nTo: a@example.com\n\n", &config, &json!({}))
            .unwrap_err();
        assert!(err.is_missing_from());
    }

    #[test]
    fn plain_message() {
        let config = EmailConfig {
            timezone: "Europe/Paris".into(),
            headers: vec![
                ("X-Team".into(), "{{.Team}}".into()),
                ("subject".into(), "ignored".into()),
                ("X-Empty".into(), "".into()),
            ],
            ..Default::default()
        };
        let message = build(
            "From: a@x.com\nTo: b@x.com, c@x.com\nBcc: d@x.com\nSub: [{{.Status}}]\n\nHello\n",
            &config,
            &json!({ "Team": "db", "Status": "firing" }),
        )
        .unwrap();

        assert_eq!(
            formatted(&message),
            concat!(
                "From: a@x.com\r\n",
                "To: b@x.com, c@x.com\r\n",
                "Bcc: d@x.com\r\n",
                "Subject: [firing]\r\n",
                "Date: Fri, 1 Mar 2024 13:30:00 +0100\r\n",
                "MIME-Version: 1.0\r\n",
                "X-Team: db\r\n",
                "Content-Type: text/plain; charset=UTF-8\r\n",
                "Content-Transfer-Encoding: 7bit\r\n",
                "\r\n",
                "Hello\r\n",
            )
        );
        assert_eq!(message.envelope().to(), ["b@x.com", "c@x.com", "d@x.com"]);
    }

    #[test]
    fn subject_defaults_and_encoding() {
        let config = EmailConfig::default();
        let message = build("From: a@x.com\nTo: b@x.com\n\n", &config, &json!({})).unwrap();
        assert_eq!(message.headers().get_raw("Subject"), Some(DEFAULT_SUBJECT));

        let message =
            build("From: a@x.com\nTo: b@x.com\nSubject: Größe = 3\n\n", &config, &json!({}))
                .unwrap();
        let subject = message.headers().get_raw("Subject").unwrap();
        assert_eq!(subject, "=?UTF-8?Q?Gr=C3=B6=C3=9Fe=20=3D=203?=");
    }

    #[test]
    fn config_text_is_the_fallback_body() {
        let config = EmailConfig {
            text: "Status: {{.Status}}".into(),
            ..Default::default()
        };
        let message = build(
            "From: a@x.com\nTo: b@x.com\n",
            &config,
            &json!({ "Status": "ok" }),
        )
        .unwrap();
        assert!(formatted(&message).ends_with("\r\n\r\nStatus: ok"));

        let message = build(
            "From: a@x.com\nTo: b@x.com\n\ntemplate body",
            &config,
            &json!({ "Status": "ok" }),
        )
        .unwrap();
        assert!(formatted(&message).ends_with("\r\n\r\ntemplate body"));
    }

    #[test]
    fn long_body_lines_are_quoted_printable() {
        let config = EmailConfig::default();
        let message = build(
            "From: a@x.com\nTo: b@x.com\n\n{{.Line}}",
            &config,
            &json!({ "Line": "word ".repeat(40) }),
        )
        .unwrap();
        let out = formatted(&message);
        assert!(out.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(out.split("\r\n").all(|line| line.len() <= 78));
    }

    #[test]
    fn attachments_make_a_multipart() {
        let config = EmailConfig {
            attachments: vec!["/data/graph.png".into(), "/data/notes.txt".into()],
            ..Default::default()
        };
        let template = Template::parse("From: a@x.com\nTo: b@x.com\n\nsee attached").unwrap();
        let source = |path: &Path| -> io::Result<Vec<u8>> {
            Ok(format!("content of {}", path.display()).into_bytes())
        };
        let message = MessageBuilder::new(&template, &config)
            .clock(clock())
            .boundary("BOUNDARY")
            .attachment_source(source)
            .build(&json!({}))
            .unwrap();

        let out = formatted(&message);
        assert!(out.contains("Content-Type: multipart/mixed; boundary=\"BOUNDARY\"\r\n"));
        assert_eq!(out.matches("--BOUNDARY\r\n").count(), 3);
        assert!(out.ends_with("--BOUNDARY--\r\n"));
        assert!(out.contains("Content-Type: image/png; name=\"graph.png\"\r\n"));
        assert!(out.contains("Content-Disposition: attachment; filename=\"notes.txt\"\r\n"));
        assert!(!message.headers().contains("Content-Transfer-Encoding"));
    }

    #[test]
    fn unreadable_attachment_aborts() {
        let config = EmailConfig {
            attachments: vec!["/nonexistent/report.pdf".into()],
            ..Default::default()
        };
        let err = build("From: a@x.com\nTo: b@x.com\n\n", &config, &json!({})).unwrap_err();
        assert!(err.is_attachment());
        assert!(err.is_permanent());
    }

    #[test]
    fn strict_missing_keys() {
        let config = EmailConfig::default();
        let template = Template::parse("From: a@x.com\nTo: b@x.com\n\n{{.Name}}").unwrap();
        let err = MessageBuilder::new(&template, &config)
            .missing_key(MissingKey::Error)
            .build(&json!({}))
            .unwrap_err();
        assert!(err.is_template());
    }

    #[test]
    fn rendered_values_stay_in_their_field() {
        let config = EmailConfig {
            headers: vec![("X-Team".into(), "{{.Team}}".into())],
            ..Default::default()
        };
        let message = build(
            "From: a@x.com\nTo: b@x.com\nSubject: {{.T}}\n\nbody",
            &config,
            &json!({
                "T": "hi\r\nBcc: evil@attacker.example",
                "Team": "ops\r\n\r\nfake body",
            }),
        )
        .unwrap();

        let out = formatted(&message);
        assert!(out.contains("Subject: hi Bcc: evil@attacker.example\r\n"));
        assert!(out.contains("X-Team: ops  fake body\r\n"));
        assert!(!out.contains("\r\nBcc:"));
        assert!(!message.headers().contains("Bcc"));
        assert_eq!(message.envelope().to(), ["b@x.com"]);
    }

    #[test]
    fn invalid_custom_header_name() {
        let config = EmailConfig {
            headers: vec![("X Bad".into(), "v".into())],
            ..Default::default()
        };
        let err = build("From: a@x.com\nTo: b@x.com\n\n", &config, &json!({})).unwrap_err();
        assert!(err.is_config());
    }
}
