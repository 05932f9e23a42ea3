use std::mem;

use crate::message::header::ContentTransferEncoding;

/// Longest body line allowed for `7bit`
pub(crate) const MAX_BODY_LINE_LEN: usize = 76;

/// A body that has already been encoded
#[derive(Debug, Clone)]
pub struct Body {
    buf: Vec<u8>,
    encoding: ContentTransferEncoding,
}

impl Body {
    /// Encodes rendered text
    ///
    /// Line endings are converted to `CRLF`. The result is `7bit` when the
    /// text is ASCII with lines of at most 76 octets, `quoted-printable`
    /// otherwise.
    pub fn text(mut text: String) -> Self {
        in_place_crlf_line_endings(&mut text);

        if is_seven_bit(&text) {
            Self {
                buf: text.into_bytes(),
                encoding: ContentTransferEncoding::SevenBit,
            }
        } else {
            Self {
                buf: quoted_printable::encode(text.as_bytes()),
                encoding: ContentTransferEncoding::QuotedPrintable,
            }
        }
    }

    /// Encodes binary content as base64 with 76 octet lines
    pub fn base64(content: &[u8]) -> Self {
        let len = email_encoding::body::base64::encoded_len(content.len());
        let mut out = String::with_capacity(len);
        // writing into a `String` cannot fail
        let _ = email_encoding::body::base64::encode(content, &mut out);

        Self {
            buf: out.into_bytes(),
            encoding: ContentTransferEncoding::Base64,
        }
    }

    /// Returns the `Content-Transfer-Encoding` of this `Body`.
    #[inline]
    pub fn encoding(&self) -> ContentTransferEncoding {
        self.encoding
    }

    /// Returns the length of this `Body` in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if this `Body` has a length of zero, `false` otherwise.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl AsRef<[u8]> for Body {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.buf.as_ref()
    }
}

fn is_seven_bit(text: &str) -> bool {
    text.is_ascii()
        && text
            .split('\n')
            .all(|line| line.trim_end_matches('\r').len() <= MAX_BODY_LINE_LEN)
}

/// In place conversion to CRLF line endings
fn in_place_crlf_line_endings(string: &mut String) {
    let indices = find_all_lf_char_indices(string);

    for i in indices {
        // this relies on `indices` being in reverse order
        string.insert(i, '\r');
    }
}

/// Find indices to all places where `\r` should be inserted
/// in order to make `s` have CRLF line endings
///
/// The list is reversed, which is more efficient.
fn find_all_lf_char_indices(s: &str) -> Vec<usize> {
    let mut indices = Vec::new();

    let mut found_lf = false;
    for (i, c) in s.char_indices().rev() {
        if mem::take(&mut found_lf) && c != '\r' {
            // the previous character was `\n`, but this isn't a `\r`
            indices.push(i + c.len_utf8());
        }

        found_lf = c == '\n';
    }

    if found_lf {
        // the first character is `\n`
        indices.push(0);
    }

    indices
}
