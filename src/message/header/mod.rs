//! Headers of the produced messages
// https://tools.ietf.org/html/rfc5322#section-2.2

use std::{
    borrow::Cow,
    error::Error as StdError,
    fmt::{self, Display},
    ops::Deref,
};

mod content;
mod date;
mod textual;

pub use self::{content::*, date::*, textual::*};

/// A typed header
pub trait Header: Clone {
    /// Name the header is written under
    fn name() -> HeaderName;

    /// Value as written on the wire, before folding
    fn display(&self) -> String;
}

/// Ordered list of headers, names compared case-insensitively
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: Vec<(HeaderName, String)>,
}

/// Name of a header field
#[derive(Debug, Clone)]
pub struct HeaderName(Cow<'static, str>);

impl Headers {
    /// Creates an empty list
    #[inline]
    pub const fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Sets a typed header, replacing any previous value
    pub fn set<H: Header>(&mut self, header: H) {
        self.set_raw(H::name(), header.display());
    }

    /// Raw value of the header called `name`
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name_, _)| name.eq_ignore_ascii_case(name_))
            .map(|(_, value)| value.as_str())
    }

    /// Whether a header called `name` is present
    pub fn contains(&self, name: &str) -> bool {
        self.get_raw(name).is_some()
    }

    /// Sets a raw value, replacing any previous one in place
    ///
    /// Line breaks in `value` become spaces, a value always stays one field.
    pub fn set_raw(&mut self, name: HeaderName, value: String) {
        let value = single_line(value);
        match self
            .headers
            .iter_mut()
            .find(|(name_, _)| name.eq_ignore_ascii_case(name_))
        {
            Some((_, current_value)) => *current_value = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Removes the header called `name`, returning its value
    pub fn remove_raw(&mut self, name: &str) -> Option<String> {
        let idx = self
            .headers
            .iter()
            .position(|(name_, _)| name.eq_ignore_ascii_case(name_))?;
        Some(self.headers.remove(idx).1)
    }

    /// Headers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (&**name, value.as_str()))
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut line = String::new();
        for (name, value) in &self.headers {
            line.clear();
            line.push_str(name);
            line.push_str(": ");
            line.push_str(value);
            fold(&line, f)?;
            f.write_str("\r\n")?;
        }

        Ok(())
    }
}

/// Replaces CR, LF and CRLF with a single space
pub(crate) fn single_line(value: String) -> String {
    if !value.contains(['\r', '\n']) {
        return value;
    }
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Maximum length of a header line, excluding the CRLF
pub const MAX_LINE_LEN: usize = 78;

fn is_fold_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Largest char boundary not above `max`
fn floor_boundary(s: &str, max: usize) -> usize {
    let mut idx = max.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Writes `line` folded so that no physical line exceeds [`MAX_LINE_LEN`]
///
/// Lines are broken before the right-most blank, or after the right-most
/// `;`, found in the upper half of the line. Failing that, before a blank in
/// the lower half, and as a last resort at the width itself. Continuation
/// lines always start with a blank.
fn fold<W: fmt::Write>(line: &str, out: &mut W) -> fmt::Result {
    let mut continuation: String;
    let mut rest = line;

    loop {
        if rest.len() <= MAX_LINE_LEN {
            return out.write_str(rest);
        }

        let window = floor_boundary(rest, MAX_LINE_LEN);
        let candidates = || rest[..window].char_indices().rev();
        let upper = candidates()
            .take_while(|&(i, _)| i > MAX_LINE_LEN / 2)
            .find(|&(_, c)| is_fold_space(c) || c == ';');
        let lower = || candidates().find(|&(i, c)| i > 0 && is_fold_space(c));

        let (head, tail) = match upper {
            Some((i, ';')) => (&rest[..=i], &rest[i + 1..]),
            Some((i, _)) => rest.split_at(i),
            None => match lower() {
                Some((i, _)) => rest.split_at(i),
                None => rest.split_at(window),
            },
        };

        out.write_str(head)?;
        out.write_str("\r\n")?;

        continuation = if tail.starts_with(is_fold_space) {
            tail.to_owned()
        } else {
            format!(" {tail}")
        };
        rest = &continuation;
    }
}

/// Header name rejected by [`HeaderName::new_from_ascii`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidHeaderName(String);

impl Display for InvalidHeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid header name {:?}", self.0)
    }
}

impl StdError for InvalidHeaderName {}

fn valid_name_byte(b: u8) -> bool {
    b.is_ascii_graphic() && b != b':'
}

impl HeaderName {
    /// Validates a header name coming from configuration
    pub fn new_from_ascii(ascii: String) -> Result<Self, InvalidHeaderName> {
        if ascii.is_empty()
            || ascii.len() > MAX_LINE_LEN - 2
            || !ascii.bytes().all(valid_name_byte)
        {
            return Err(InvalidHeaderName(ascii));
        }
        Ok(Self(Cow::Owned(ascii)))
    }

    /// Header name known at compile time
    ///
    /// Panics (at compile time in const contexts) on an invalid name.
    pub const fn new_from_ascii_static(ascii: &'static str) -> Self {
        let bytes = ascii.as_bytes();
        assert!(!bytes.is_empty() && bytes.len() <= MAX_LINE_LEN - 2);
        let mut i = 0;
        while i < bytes.len() {
            assert!(bytes[i].is_ascii_graphic() && bytes[i] != b':');
            i += 1;
        }

        Self(Cow::Borrowed(ascii))
    }
}

impl Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self)
    }
}

impl Deref for HeaderName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for HeaderName {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for HeaderName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn folded(line: &str) -> String {
        let mut out = String::new();
        fold(line, &mut out).unwrap();
        out
    }

    fn assert_well_folded(out: &str) {
        for (n, physical) in out.split("\r\n").enumerate() {
            assert!(physical.len() <= MAX_LINE_LEN, "{physical:?} is too long");
            if n > 0 {
                assert!(physical.starts_with([' ', '\t']), "{physical:?} is not a continuation");
            }
        }
    }

    #[test]
    fn valid_headername() {
        assert_eq!(HeaderName::new_from_ascii("X-Duck".into()).unwrap(), "X-Duck");
        assert_eq!(HeaderName::new_from_ascii_static("From"), "From");
    }

    #[test]
    fn invalid_headername() {
        assert!(HeaderName::new_from_ascii("From:".into()).is_err());
        assert!(HeaderName::new_from_ascii("Date ".into()).is_err());
        assert!(HeaderName::new_from_ascii("✉️".into()).is_err());
        assert!(HeaderName::new_from_ascii(String::new()).is_err());
    }

    #[should_panic]
    #[test]
    fn invalid_headername_static() {
        HeaderName::new_from_ascii_static("From:");
    }

    #[test]
    fn short_lines_are_untouched() {
        assert_eq!(folded("Subject: hello world"), "Subject: hello world");
    }

    #[test]
    fn fold_before_spaces() {
        let line = format!("X-Labels: {}", "alpha beta gamma delta ".repeat(8).trim_end());
        let out = folded(&line);
        assert_well_folded(&out);
        assert_eq!(out.replace("\r\n", ""), line);
    }

    #[test]
    fn fold_after_semicolons() {
        let line = format!("X-Params: {}", "key=value;".repeat(12));
        let out = folded(&line);
        assert_well_folded(&out);
        assert!(out.split("\r\n").next().unwrap().ends_with(';'));
    }

    #[test]
    fn hard_break_without_blanks() {
        let line = format!("X-Token:{}", "é".repeat(80));
        let out = folded(&line);
        assert_well_folded(&out);
        assert_eq!(out.replace("\r\n ", ""), line);
    }

    #[test]
    fn long_leading_word_moves_to_next_line() {
        let word = format!("=?UTF-8?Q?{}?=", "=C3=A9".repeat(10));
        let line = format!("Subject: {word} {word}");
        let out = folded(&line);
        assert_well_folded(&out);
        assert_eq!(out, format!("Subject:\r\n {word}\r\n {word}"));
    }

    #[test]
    fn line_breaks_cannot_start_new_fields() {
        let mut headers = Headers::new();
        headers.set_raw(
            HeaderName::new_from_ascii_static("Subject"),
            "hi\r\nBcc: evil@attacker.example\nX-A: b\rc".into(),
        );

        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.to_string(),
            "Subject: hi Bcc: evil@attacker.example X-A: b c\r\n"
        );
    }

    #[test]
    fn display_keeps_order() {
        let mut headers = Headers::new();
        headers.set_raw(HeaderName::new_from_ascii_static("To"), "a@example.com".into());
        headers.set_raw(HeaderName::new_from_ascii_static("From"), "b@example.com".into());
        headers.set_raw(HeaderName::new_from_ascii_static("to"), "c@example.com".into());

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_raw("TO"), Some("c@example.com"));
        assert_eq!(
            headers.to_string(),
            "To: c@example.com\r\nFrom: b@example.com\r\n"
        );
    }
}
