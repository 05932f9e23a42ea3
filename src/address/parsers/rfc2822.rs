//! Partial parsers implementation of [RFC2822]: Internet Message
//! Format.
//!
//! Only what is needed to pull addresses out of `From`, `To` and `Cc`
//! values is covered. Comments are not supported.
//!
//! [RFC2822]: https://datatracker.ietf.org/doc/html/rfc2822

use chumsky::{error::Cheap, prelude::*};

use super::rfc2234;

/// Display name, then local part and domain
pub(crate) type Mailbox = (Option<String>, (String, String));

// RFC 5336 lifts the ASCII restriction on atoms and quoted strings
fn utf8_non_ascii() -> impl Parser<char, char, Error = Cheap<char>> {
    filter(|c: &char| !c.is_ascii())
}

// 3.2.1. Primitive Tokens
// https://datatracker.ietf.org/doc/html/rfc2822#section-3.2.1

// NO-WS-CTL       =       %d1-8 /         ; US-ASCII control characters
//                         %d11 /          ;  that do not include the
//                         %d12 /          ;  carriage return, line feed,
//                         %d14-31 /       ;  and white space characters
//                         %d127
fn no_ws_ctl() -> impl Parser<char, char, Error = Cheap<char>> {
    filter(|c: &char| matches!(u32::from(*c), 1..=8 | 11 | 12 | 14..=31 | 127))
}

// text            =       %d1-9 /         ; Characters excluding CR and LF
//                         %d11 /
//                         %d12 /
//                         %d14-127 /
//                         obs-text
fn text_char() -> impl Parser<char, char, Error = Cheap<char>> {
    filter(|c: &char| matches!(u32::from(*c), 1..=9 | 11 | 12 | 14..=127))
}

// 3.2.2. Quoted characters

// quoted-pair     =       ("\" text) / obs-qp
fn quoted_pair() -> impl Parser<char, char, Error = Cheap<char>> {
    just('\\').ignore_then(text_char())
}

// 3.2.3. Folding white space and comments

// FWS             =       ([*WSP CRLF] 1*WSP) /   ; Folding white space
//                         obs-FWS
//
// Unfolded values only, a run of blanks keeps its first character.
fn fws() -> impl Parser<char, Option<char>, Error = Cheap<char>> {
    rfc2234::wsp()
        .or_not()
        .then_ignore(rfc2234::wsp().ignored().repeated())
}

// 3.2.4. Atom

// atext           =       ALPHA / DIGIT / ; Any character except controls,
//                         "!" / "#" /     ;  SP, and specials.
//                         ...
fn atext() -> impl Parser<char, char, Error = Cheap<char>> {
    choice((
        rfc2234::alpha(),
        rfc2234::digit(),
        one_of("!#$%&'*+-/=?^_`{|}~"),
        utf8_non_ascii(),
    ))
}

// atom            =       [CFWS] 1*atext [CFWS]
fn atom() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    fws().chain(atext().repeated().at_least(1))
}

// dot-atom        =       [CFWS] dot-atom-text [CFWS]
// dot-atom-text   =       1*atext *("." 1*atext)
fn dot_atom() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    fws().ignore_then(
        atext().repeated().at_least(1).chain(
            just('.')
                .chain(atext().repeated().at_least(1))
                .repeated()
                .flatten(),
        ),
    )
}

// 3.2.5. Quoted strings

// qtext           =       NO-WS-CTL /     ; Non white space controls
//                         %d33 /          ; The rest of the US-ASCII
//                         %d35-91 /       ;  characters not including "\"
//                         %d93-126        ;  or the quote character
fn qtext() -> impl Parser<char, char, Error = Cheap<char>> {
    choice((
        filter(|c: &char| matches!(u32::from(*c), 33 | 35..=91 | 93..=126)),
        no_ws_ctl(),
    ))
}

// qcontent        =       qtext / quoted-pair
fn qcontent() -> impl Parser<char, char, Error = Cheap<char>> {
    choice((qtext(), quoted_pair(), utf8_non_ascii()))
}

// quoted-string   =       [CFWS]
//                         DQUOTE *([FWS] qcontent) [FWS] DQUOTE
//                         [CFWS]
fn quoted_string() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    fws().ignore_then(
        rfc2234::dquote()
            .ignore_then(fws().chain(qcontent()).repeated().flatten())
            .then_ignore(text::whitespace())
            .then_ignore(rfc2234::dquote()),
    )
}

// 3.2.6. Miscellaneous tokens

// word            =       atom / quoted-string
fn word() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    choice((quoted_string(), atom()))
}

// phrase          =       1*word / obs-phrase
// obs-phrase      =       word *(word / "." / CFWS)
fn phrase() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    word().chain(
        choice((word(), just('.').repeated().exactly(1)))
            .repeated()
            .flatten(),
    )
}

// 3.4. Address Specification

// mailbox         =       name-addr / addr-spec
fn any_mailbox() -> impl Parser<char, Mailbox, Error = Cheap<char>> {
    choice((name_addr(), addr_spec().map(|addr| (None, addr)))).padded()
}

/// A single mailbox spanning the whole input
pub(crate) fn mailbox() -> impl Parser<char, Mailbox, Error = Cheap<char>> {
    any_mailbox().then_ignore(end())
}

// name-addr       =       [display-name] angle-addr
// display-name    =       phrase
fn name_addr() -> impl Parser<char, Mailbox, Error = Cheap<char>> {
    phrase()
        .collect::<String>()
        .map(|name| name.trim().to_owned())
        .or_not()
        .then(angle_addr())
}

// angle-addr      =       [CFWS] "<" addr-spec ">" [CFWS] / obs-angle-addr
fn angle_addr() -> impl Parser<char, (String, String), Error = Cheap<char>> {
    addr_spec()
        .padded()
        .delimited_by(just('<'), just('>'))
        .padded()
}

// mailbox-list    =       (mailbox *("," mailbox)) / obs-mbox-list
/// A comma separated list of mailboxes spanning the whole input
pub(crate) fn mailbox_list() -> impl Parser<char, Vec<Mailbox>, Error = Cheap<char>> {
    any_mailbox()
        .separated_by(just(',').padded())
        .allow_trailing()
        .at_least(1)
        .then_ignore(end())
}

// 3.4.1. Addr-spec specification

// addr-spec       =       local-part "@" domain
fn addr_spec() -> impl Parser<char, (String, String), Error = Cheap<char>> {
    local_part()
        .collect()
        .then_ignore(just('@'))
        .then(domain().collect())
}

// local-part      =       dot-atom / quoted-string / obs-local-part
fn local_part() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    choice((dot_atom(), quoted_string()))
}

// domain          =       dot-atom / domain-literal / obs-domain
// domain-literal  =       [CFWS] "[" *([FWS] dcontent) [FWS] "]" [CFWS]
fn domain() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    let domain_literal = just('[')
        .chain(filter(|c: &char| !matches!(*c, '[' | ']' | '\\' | ' ')).repeated())
        .chain(just(']'));
    choice((dot_atom(), domain_literal))
}
