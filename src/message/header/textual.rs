use super::{Header, HeaderName};

macro_rules! text_header {
    ($(#[$attr:meta])* Header($type: ident, $name: expr )) => {
        #[derive(Debug, Clone, PartialEq)]
        $(#[$attr])*
        pub struct $type(String);

        impl Header for $type {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_static($name)
            }

            fn display(&self) -> String {
                self.0.clone()
            }
        }

        impl ::std::convert::From<String> for $type {
            #[inline]
            fn from(text: String) -> Self {
                Self(text)
            }
        }

        impl AsRef<str> for $type {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

text_header!(
    /// `From` of the message, as rendered from the template or configuration
    Header(From, "From")
);
text_header!(
    /// `To` of the message, a comma separated list
    Header(To, "To")
);
text_header!(
    /// `Cc` of the message, a comma separated list
    Header(Cc, "Cc")
);
text_header!(
    /// `Bcc` of the message, a comma separated list
    Header(Bcc, "Bcc")
);

/// `MIME-Version`, always `1.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MimeVersion;

impl Header for MimeVersion {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_static("MIME-Version")
    }

    fn display(&self) -> String {
        "1.0".to_owned()
    }
}

/// `Subject` of the message
///
/// Non-ASCII subjects are written as `Q` encoded-words.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject(String);

impl Header for Subject {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_static("Subject")
    }

    fn display(&self) -> String {
        encode_words(&self.0)
    }
}

impl std::convert::From<String> for Subject {
    #[inline]
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl AsRef<str> for Subject {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

const WORD_PREFIX: &str = "=?UTF-8?Q?";
const WORD_SUFFIX: &str = "?=";
/// Longest encoded-word allowed by RFC 2047 section 2
const MAX_WORD_LEN: usize = 75;

/// `Q` encoding of a single character
fn encode_char(c: char, out: &mut String) {
    let mut buf = [0; 4];
    let encoded = quoted_printable::encode_to_str(c.encode_utf8(&mut buf).as_bytes());
    for ch in encoded.replace("=\r\n", "").chars() {
        match ch {
            ' ' => out.push_str("=20"),
            '\t' => out.push_str("=09"),
            '?' => out.push_str("=3F"),
            '_' => out.push_str("=5F"),
            ch => out.push(ch),
        }
    }
}

/// Encodes `text` as space separated `=?UTF-8?Q?...?=` words when it is not ASCII
///
/// Each word is at most 75 octets and never splits a character.
pub(crate) fn encode_words(text: &str) -> String {
    if text.is_ascii() {
        return text.to_owned();
    }

    let budget = MAX_WORD_LEN - WORD_PREFIX.len() - WORD_SUFFIX.len();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut piece = String::new();

    for c in text.chars() {
        piece.clear();
        encode_char(c, &mut piece);
        if current.len() + piece.len() > budget {
            words.push(std::mem::take(&mut current));
        }
        current.push_str(&piece);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| [WORD_PREFIX, word.as_str(), WORD_SUFFIX].concat())
        .collect::<Vec<_>>()
        .join(" ")
}
