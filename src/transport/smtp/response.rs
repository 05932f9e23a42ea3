//! SMTP response, containing a mandatory return code and an optional text
//! message

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use nom::{
    bytes::streaming::{tag, take_until},
    character::streaming::one_of,
    combinator::{complete, map_opt},
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};

use crate::transport::smtp::{error, Error};

/// First digit of the reply code
///
/// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Severity {
    /// 2yx
    PositiveCompletion = 2,
    /// 3yz
    PositiveIntermediate = 3,
    /// 4yz
    TransientNegativeCompletion = 4,
    /// 5yz
    PermanentNegativeCompletion = 5,
}

impl Severity {
    fn from_digit(c: char) -> Option<Severity> {
        match c {
            '2' => Some(Severity::PositiveCompletion),
            '3' => Some(Severity::PositiveIntermediate),
            '4' => Some(Severity::TransientNegativeCompletion),
            '5' => Some(Severity::PermanentNegativeCompletion),
            _ => None,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Three digit reply code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Code {
    /// Severity (first digit)
    pub severity: Severity,
    /// Category (second digit)
    pub category: u8,
    /// Detail (third digit)
    pub detail: u8,
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.severity, self.category, self.detail)
    }
}

impl FromStr for Code {
    type Err = Error;

    fn from_str(s: &str) -> Result<Code, Error> {
        match complete(parse_code).parse(s) {
            Ok(("", code)) => Ok(code),
            _ => Err(error::response(format!("invalid reply code {s:?}"))),
        }
    }
}

impl Code {
    /// Tells if the code is 2yz or 3yz
    pub fn is_positive(self) -> bool {
        matches!(
            self.severity,
            Severity::PositiveCompletion | Severity::PositiveIntermediate
        )
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        u16::from(code.detail) + 10 * u16::from(code.category) + 100 * code.severity as u16
    }
}

/// Contains an SMTP reply, with separated code and message
///
/// The text message is optional, only the code is mandatory
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Response {
    code: Code,
    message: Vec<String>,
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> Result<Response, Error> {
        parse_response(s)
            .map(|(_, r)| r)
            .map_err(|e| error::response(e.to_string()))
    }
}

impl Response {
    /// Creates a new `Response`
    pub fn new(code: Code, message: Vec<String>) -> Response {
        Response { code, message }
    }

    /// Tells if the response is positive
    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    /// Tests code equality
    pub fn has_code(&self, code: u16) -> bool {
        u16::from(self.code) == code
    }

    /// Returns only the first word of the message if possible
    pub fn first_word(&self) -> Option<&str> {
        self.message
            .first()
            .and_then(|line| line.split_whitespace().next())
    }

    /// Response code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Lines of the reply text
    pub fn message(&self) -> impl Iterator<Item = &str> {
        self.message.iter().map(String::as_str)
    }
}

fn parse_code(i: &str) -> IResult<&str, Code> {
    let (i, severity) = map_opt(one_of("2345"), Severity::from_digit).parse(i)?;
    let (i, category) = one_of("0123456789").parse(i)?;
    let (i, detail) = one_of("0123456789").parse(i)?;
    Ok((
        i,
        Code {
            severity,
            category: category as u8 - b'0',
            detail: detail as u8 - b'0',
        },
    ))
}

/// Parses one complete reply, multi-line replies included
///
/// Returns `nom::Err::Incomplete` while the last line has not been received.
pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (i, lines) =
        many0((parse_code, preceded(tag("-"), take_until("\r\n")), tag("\r\n"))).parse(i)?;
    let (i, (last_code, last_line)) = (parse_code, last_line_text).parse(i)?;
    let (i, _) = complete(tag("\r\n")).parse(i)?;

    // Check that all codes are equal.
    if !lines.iter().all(|&(code, _, _)| code == last_code) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            "",
            nom::error::ErrorKind::Not,
        )));
    }

    let mut lines: Vec<String> = lines.into_iter().map(|(_, text, _)| text.into()).collect();
    lines.push(last_line.into());

    Ok((
        i,
        Response {
            code: last_code,
            message: lines,
        },
    ))
}

// Some relays answer with a bare code, "250\r\n"
fn last_line_text(i: &str) -> IResult<&str, &str> {
    if i.starts_with("\r\n") {
        return Ok((i, ""));
    }
    preceded(tag(" "), take_until("\r\n")).parse(i)
}
