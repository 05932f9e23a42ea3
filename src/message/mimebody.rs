use std::io::Write;

use crate::message::{
    body::Body,
    header::{ContentType, Header, Headers},
};

/// Single part with its own headers
#[derive(Debug, Clone)]
pub struct SinglePart {
    headers: Headers,
    body: Body,
}

impl SinglePart {
    /// Creates a part, setting `Content-Transfer-Encoding` from the body
    pub fn new(content_type: ContentType, body: Body) -> Self {
        let mut headers = Headers::new();
        headers.set(content_type);
        headers.set(body.encoding());
        Self { headers, body }
    }

    /// Adds a header to the part
    pub fn header<H: Header>(mut self, header: H) -> Self {
        self.headers.set(header);
        self
    }

    /// Get the headers from the part
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get the encoded body
    pub fn body(&self) -> &Body {
        &self.body
    }

    fn format(&self, out: &mut Vec<u8>) {
        // writing into a `Vec` cannot fail
        let _ = write!(out, "{}", self.headers);
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.body.as_ref());
        out.extend_from_slice(b"\r\n");
    }
}

/// Create a random MIME boundary.
pub(crate) fn make_boundary() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(40)
        .collect()
}

/// `multipart/mixed` container
#[derive(Debug, Clone)]
pub struct MultiPart {
    boundary: String,
    parts: Vec<SinglePart>,
}

impl MultiPart {
    /// Creates an empty container, with a random boundary unless one is given
    pub fn mixed(boundary: Option<String>) -> Self {
        Self {
            boundary: boundary.unwrap_or_else(make_boundary),
            parts: Vec::new(),
        }
    }

    /// Appends a part
    pub fn singlepart(mut self, part: SinglePart) -> Self {
        self.parts.push(part);
        self
    }

    /// Get the boundary of multipart contents
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Get the parts
    pub fn parts(&self) -> &[SinglePart] {
        &self.parts
    }

    /// The `Content-Type` header announcing this container
    pub fn content_type(&self) -> ContentType {
        ContentType::multipart_mixed(&self.boundary)
    }

    /// Writes the parts, each preceded by the boundary delimiter
    pub(crate) fn format_body(&self, out: &mut Vec<u8>) {
        for part in &self.parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            part.format(out);
        }

        out.extend_from_slice(b"--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
    }
}
