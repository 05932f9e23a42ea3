use std::fmt::{self, Display, Formatter};

use email_encoding::headers::{rfc2231, writer::EmailWriter};
use mime::Mime;

use super::{Header, HeaderName};

/// Quotes a parameter value, escaping `\` and `"`
fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `key=value` as an RFC 2231 parameter, unfolded
///
/// Printable ASCII is quoted, anything else is percent-encoded as UTF-8, so
/// the header stays 7-bit.
fn parameter(key: &str, value: &str) -> String {
    let mut encoded = String::new();
    {
        let mut writer = EmailWriter::new(&mut encoded, 0, 0, false);
        // writing into a `String` cannot fail
        let _ = rfc2231::encode(key, value, &mut writer);
    }
    encoded.replace("\r\n", "").trim_start().to_owned()
}

/// `Content-Type` of a message or part
#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    essence: String,
    params: Vec<String>,
}

impl ContentType {
    /// `text/plain; charset=UTF-8`
    pub fn text_plain() -> Self {
        Self::from_mime(mime::TEXT_PLAIN).param("charset=UTF-8".to_owned())
    }

    /// `multipart/mixed; boundary="..."`
    pub fn multipart_mixed(boundary: &str) -> Self {
        Self {
            essence: "multipart/mixed".to_owned(),
            params: Vec::new(),
        }
        .param(format!("boundary={}", quoted(boundary)))
    }

    /// Type of an attachment, carrying its file name
    pub fn attachment(mime: Mime, filename: &str) -> Self {
        Self::from_mime(mime).param(parameter("name", filename))
    }

    pub(crate) fn from_mime(mime: Mime) -> Self {
        Self {
            essence: mime.essence_str().to_owned(),
            params: Vec::new(),
        }
    }

    fn param(mut self, param: String) -> Self {
        self.params.push(param);
        self
    }

    /// The `type/subtype` part
    pub fn essence(&self) -> &str {
        &self.essence
    }
}

impl Header for ContentType {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_static("Content-Type")
    }

    fn display(&self) -> String {
        let mut out = self.essence.clone();
        for param in &self.params {
            out.push_str("; ");
            out.push_str(param);
        }
        out
    }
}

/// `Content-Transfer-Encoding` of a body
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    /// ASCII text with short lines
    SevenBit,
    /// Text needing escapes or soft line breaks
    QuotedPrintable,
    /// Attachments
    Base64,
}

impl Display for ContentTransferEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::SevenBit => "7bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
        })
    }
}

impl Header for ContentTransferEncoding {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_static("Content-Transfer-Encoding")
    }

    fn display(&self) -> String {
        self.to_string()
    }
}

/// `Content-Disposition` of an attachment part
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDisposition(String);

impl ContentDisposition {
    /// `attachment; filename="..."`
    pub fn attachment(filename: &str) -> Self {
        Self(format!("attachment; {}", parameter("filename", filename)))
    }
}

impl Header for ContentDisposition {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_static("Content-Disposition")
    }

    fn display(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::message::header::Headers;

    #[test]
    fn format_content_types() {
        let mut headers = Headers::new();
        headers.set(ContentType::text_plain());
        assert_eq!(
            headers.to_string(),
            "Content-Type: text/plain; charset=UTF-8\r\n"
        );

        headers.set(ContentType::multipart_mixed("0123abc"));
        assert_eq!(
            headers.to_string(),
            "Content-Type: multipart/mixed; boundary=\"0123abc\"\r\n"
        );

        headers.set(ContentType::attachment(mime::IMAGE_PNG, "my \"graph\".png"));
        assert_eq!(
            headers.to_string(),
            "Content-Type: image/png; name=\"my \\\"graph\\\".png\"\r\n"
        );
    }

    #[test]
    fn format_transfer_encoding_and_disposition() {
        let mut headers = Headers::new();
        headers.set(ContentTransferEncoding::QuotedPrintable);
        headers.set(ContentDisposition::attachment("report.pdf"));
        assert_eq!(
            headers.to_string(),
            concat!(
                "Content-Transfer-Encoding: quoted-printable\r\n",
                "Content-Disposition: attachment; filename=\"report.pdf\"\r\n"
            )
        );
    }

    #[test]
    fn non_ascii_file_names_are_encoded() {
        let mut headers = Headers::new();
        headers.set(ContentType::attachment(mime::APPLICATION_PDF, "faktúra.pdf"));
        headers.set(ContentDisposition::attachment("faktúra.pdf"));

        let out = headers.to_string();
        assert!(out.is_ascii());
        assert_eq!(
            out,
            concat!(
                "Content-Type: application/pdf; name*0*=utf-8''fakt%C3%BAra.pdf\r\n",
                "Content-Disposition: attachment; filename*0*=utf-8''fakt%C3%BAra.pdf\r\n"
            )
        );
    }

    #[test]
    fn long_file_names_use_continuations() {
        let name = format!("{}.csv", "quarterly_report_".repeat(5));
        let disposition = ContentDisposition::attachment(&name);
        let value = disposition.display();
        assert!(value.starts_with("attachment; filename*0=\"quarterly_report_"));
        assert!(value.contains("; filename*1=\""));

        let mut headers = Headers::new();
        headers.set(disposition);
        for line in headers.to_string().split("\r\n") {
            assert!(line.len() <= 78, "{line:?} is too long");
        }
    }
}
