//! SMTP client
//!
//! [`SmtpConnection`] drives a single session over a blocking socket. The
//! session logic (which command runs when, what a failure means) lives in
//! the parent module.

pub use self::connection::SmtpConnection;

mod connection;
mod net;

/// The codec used for transparency
///
/// Normalizes line endings to CRLF and doubles any dot starting a line, as
/// required for the content of the `DATA` command. The state carries over
/// between calls to [`ClientCodec::encode`] so a message can be encoded in
/// chunks.
#[derive(Clone, Copy, Debug)]
pub struct ClientCodec {
    line_start: bool,
    prev_cr: bool,
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self {
            line_start: true,
            prev_cr: false,
        }
    }
}

impl ClientCodec {
    /// Creates a new client codec
    pub fn new() -> Self {
        ClientCodec::default()
    }

    /// Adds transparency
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        buf.reserve(frame.len() + frame.len() / 64);
        for &byte in frame {
            match byte {
                b'\n' => {
                    if !self.prev_cr {
                        buf.push(b'\r');
                    }
                    buf.push(b'\n');
                    self.line_start = true;
                    self.prev_cr = false;
                }
                _ => {
                    if self.line_start && byte == b'.' {
                        buf.push(b'.');
                    }
                    buf.push(byte);
                    self.line_start = false;
                    self.prev_cr = byte == b'\r';
                }
            }
        }
    }

    /// Terminates the data with `<CRLF>.<CRLF>`, completing the last line if needed
    pub fn finish(&mut self, buf: &mut Vec<u8>) {
        if !self.line_start {
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b".\r\n");
        *self = Self::default();
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
///
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(chunks: &[&[u8]]) -> String {
        let mut codec = ClientCodec::new();
        let mut buf = Vec::new();
        for chunk in chunks {
            codec.encode(chunk, &mut buf);
        }
        codec.finish(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_codec() {
        assert_eq!(encode(&[b"test"]), "test\r\n.\r\n");
        assert_eq!(encode(&[b"test\r\n"]), "test\r\n.\r\n");
        assert_eq!(encode(&[b"test\n\n.test\n"]), "test\r\n\r\n..test\r\n.\r\n");
        assert_eq!(encode(&[b".leading\r\n..two\r\n"]), "..leading\r\n...two\r\n.\r\n");
        assert_eq!(encode(&[b"a.b\r\n.\r\n"]), "a.b\r\n..\r\n.\r\n");
        assert_eq!(encode(&[]), ".\r\n");
    }

    #[test]
    fn test_codec_across_chunks() {
        assert_eq!(encode(&[b"line\r", b"\n.dot", b"\n"]), "line\r\n..dot\r\n.\r\n");
        assert_eq!(encode(&[b"line\n", b".", b"dot"]), "line\r\n..dot\r\n.\r\n");
    }

    #[test]
    fn test_escape_crlf() {
        #[cfg(feature = "tracing")]
        assert_eq!(escape_crlf("EHLO my_name\r\n"), "EHLO my_name<CRLF>");
    }
}
