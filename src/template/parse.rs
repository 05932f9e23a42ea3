//! Template syntax
//!
//! The source is split into literal text and `{{ ... }}` actions, then the
//! actions are nested into a tree of [`Node`]s. Actions are parsed with nom.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{map, map_opt, opt, recognize, rest, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, preceded},
    IResult, Parser,
};
use serde_json::{Number, Value};

use super::error::ParseError;

type Res<'a, T> = IResult<&'a str, T>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    With {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Commands separated by `|`, each result feeding the next call
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline(pub(crate) Vec<Command>);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Operand(Operand),
    Call(Func, Vec<Operand>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Field { root: Root, path: Vec<String> },
    Literal(Value),
    Sub(Box<Pipeline>),
}

/// What a field path starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Root {
    /// `.`, the current value
    Dot,
    /// `$`, the data passed to the template
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Not,
    And,
    Or,
    Eq,
    Ne,
    Len,
    Index,
}

impl Func {
    fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "not" => Func::Not,
            "and" => Func::And,
            "or" => Func::Or,
            "eq" => Func::Eq,
            "ne" => Func::Ne,
            "len" => Func::Len,
            "index" => Func::Index,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Func::Not => "not",
            Func::And => "and",
            Func::Or => "or",
            Func::Eq => "eq",
            Func::Ne => "ne",
            Func::Len => "len",
            Func::Index => "index",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Output(Pipeline),
    If(Pipeline),
    ElseIf(Pipeline),
    Else,
    End,
    Range(Pipeline),
    With(Pipeline),
    Comment,
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Action { action: Action, line: usize },
}

/// Parses a template source into its node tree
pub(crate) fn parse(src: &str) -> Result<Vec<Node>, ParseError> {
    let tokens = lex(src)?;
    let mut tree = TreeBuilder {
        tokens: tokens.into_iter(),
    };
    let (nodes, stop) = tree.list()?;
    match stop {
        Stop::Eof => Ok(nodes),
        Stop::End(line) => Err(ParseError::new(line, "unexpected {{end}}")),
        Stop::Else(line) | Stop::ElseIf(_, line) => {
            Err(ParseError::new(line, "unexpected {{else}}"))
        }
    }
}

// Lexing

fn line_at(src: &str, remaining: &str) -> usize {
    let offset = src.len() - remaining.len();
    src[..offset].matches('\n').count() + 1
}

fn is_trim_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn lex(src: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut input = src;
    let mut trim_next = false;

    while !input.is_empty() {
        if !input.starts_with("{{") {
            let (remaining, mut text) = literal_text(input).map_err(|_| {
                ParseError::new(line_at(src, input), "unreadable text")
            })?;
            if trim_next {
                text = text.trim_start_matches(is_trim_space);
                trim_next = false;
            }
            tokens.push(Token::Text(text));
            input = remaining;
            continue;
        }

        let line = line_at(src, input);
        let (remaining, (trim_left, action, trim_right)) = delimited_action(input)
            .map_err(|_| ParseError::new(line, format!("malformed action {}", snippet(input))))?;

        if trim_left {
            if let Some(Token::Text(text)) = tokens.last_mut() {
                *text = (*text).trim_end_matches(is_trim_space);
            }
        }
        trim_next = trim_right;
        tokens.push(Token::Action { action, line });
        input = remaining;
    }

    Ok(tokens)
}

fn snippet(input: &str) -> &str {
    let end = input
        .char_indices()
        .nth(40)
        .map_or(input.len(), |(idx, _)| idx);
    let end = input[..end].find('\n').unwrap_or(end);
    &input[..end]
}

fn literal_text(i: &str) -> Res<'_, &str> {
    alt((take_until("{{"), rest)).parse(i)
}

// Actions

fn ws(i: &str) -> Res<'_, &str> {
    multispace0(i)
}

fn delimited_action(i: &str) -> Res<'_, (bool, Action, bool)> {
    let (i, _) = tag("{{").parse(i)?;
    let (i, trim_left) = map(opt((char('-'), multispace1)), |m: Option<_>| m.is_some()).parse(i)?;
    let (i, _) = ws(i)?;
    let (i, action) = action(i)?;
    let (i, space) = ws(i)?;
    // a trim marker needs the space before it, "{{.A-}}" is not one
    let (i, trim_right) = if space.is_empty() {
        (i, false)
    } else {
        map(opt(char('-')), |m: Option<char>| m.is_some()).parse(i)?
    };
    let (i, _) = tag("}}").parse(i)?;
    Ok((i, (trim_left, action, trim_right)))
}

fn action(i: &str) -> Res<'_, Action> {
    alt((
        value(Action::Comment, (tag("/*"), take_until("*/"), tag("*/"))),
        keyword_action,
        map(pipeline, Action::Output),
    ))
    .parse(i)
}

fn keyword_action(i: &str) -> Res<'_, Action> {
    let (rest, word) = identifier(i)?;
    match word {
        "if" => map(preceded(multispace1, pipeline), Action::If).parse(rest),
        "range" => map(preceded(multispace1, pipeline), Action::Range).parse(rest),
        "with" => map(preceded(multispace1, pipeline), Action::With).parse(rest),
        "end" => Ok((rest, Action::End)),
        "else" => {
            let (rest, cond) =
                opt(preceded((multispace1, tag("if"), multispace1), pipeline)).parse(rest)?;
            Ok((rest, cond.map_or(Action::Else, Action::ElseIf)))
        }
        _ => Err(nom::Err::Error(NomError::new(i, ErrorKind::Tag))),
    }
}

fn pipeline(i: &str) -> Res<'_, Pipeline> {
    map(
        separated_list1(delimited(multispace0, char('|'), multispace0), command),
        Pipeline,
    )
    .parse(i)
}

fn command(i: &str) -> Res<'_, Command> {
    alt((call, map(operand, Command::Operand))).parse(i)
}

fn call(i: &str) -> Res<'_, Command> {
    let (rest, name) = identifier(i)?;
    let Some(func) = Func::from_name(name) else {
        return Err(nom::Err::Error(NomError::new(i, ErrorKind::Tag)));
    };
    let (rest, args) = many0(preceded(multispace1, operand)).parse(rest)?;
    Ok((rest, Command::Call(func, args)))
}

fn operand(i: &str) -> Res<'_, Operand> {
    alt((
        field,
        map(string_literal, |s| Operand::Literal(Value::String(s))),
        map(raw_string, |s: &str| Operand::Literal(Value::String(s.to_owned()))),
        map(number, Operand::Literal),
        map(keyword_literal, Operand::Literal),
        map(
            delimited((char('('), multispace0), pipeline, (multispace0, char(')'))),
            |p| Operand::Sub(Box::new(p)),
        ),
    ))
    .parse(i)
}

fn identifier(i: &str) -> Res<'_, &str> {
    recognize((
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(i)
}

fn owned(path: Vec<&str>) -> Vec<String> {
    path.into_iter().map(str::to_owned).collect()
}

fn field(i: &str) -> Res<'_, Operand> {
    alt((
        map(
            preceded(char('$'), many0(preceded(char('.'), identifier))),
            |path| Operand::Field {
                root: Root::Top,
                path: owned(path),
            },
        ),
        map(
            preceded(char('.'), separated_list0(char('.'), identifier)),
            |path| Operand::Field {
                root: Root::Dot,
                path: owned(path),
            },
        ),
    ))
    .parse(i)
}

fn string_literal(i: &str) -> Res<'_, String> {
    let (body, _) = char('"').parse(i)?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    loop {
        match chars.next() {
            Some((idx, '"')) => return Ok((&body[idx + 1..], out)),
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, c @ ('"' | '\\'))) => out.push(c),
                _ => return Err(nom::Err::Failure(NomError::new(i, ErrorKind::Escaped))),
            },
            Some((_, '\n')) | None => {
                return Err(nom::Err::Failure(NomError::new(i, ErrorKind::Char)))
            }
            Some((_, c)) => out.push(c),
        }
    }
}

fn raw_string(i: &str) -> Res<'_, &str> {
    delimited(char('`'), take_until("`"), char('`')).parse(i)
}

fn number(i: &str) -> Res<'_, Value> {
    map_opt(
        recognize((opt(char('-')), digit1, opt((char('.'), digit1)))),
        |s: &str| {
            if s.contains('.') {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            } else {
                s.parse::<i64>().ok().map(Value::from)
            }
        },
    )
    .parse(i)
}

fn keyword_literal(i: &str) -> Res<'_, Value> {
    let (rest, word) = identifier(i)?;
    match word {
        "true" => Ok((rest, Value::Bool(true))),
        "false" => Ok((rest, Value::Bool(false))),
        "nil" => Ok((rest, Value::Null)),
        _ => Err(nom::Err::Error(NomError::new(i, ErrorKind::Tag))),
    }
}

// Tree building

enum Stop {
    Eof,
    End(usize),
    Else(usize),
    ElseIf(Pipeline, usize),
}

struct TreeBuilder<'a> {
    tokens: std::vec::IntoIter<Token<'a>>,
}

fn unclosed(keyword: &str, line: usize) -> ParseError {
    ParseError::new(line, ["unclosed {{", keyword, "}}, missing {{end}}"].concat())
}

impl TreeBuilder<'_> {
    fn list(&mut self) -> Result<(Vec<Node>, Stop), ParseError> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.next() {
            let (action, line) = match token {
                Token::Text("") => continue,
                Token::Text(text) => {
                    nodes.push(Node::Text(text.to_owned()));
                    continue;
                }
                Token::Action { action, line } => (action, line),
            };
            match action {
                Action::Comment => {}
                Action::Output(pipeline) => nodes.push(Node::Action(pipeline)),
                Action::If(cond) => nodes.push(self.if_chain(cond, line)?),
                Action::Range(pipeline) => {
                    let (body, otherwise) = self.block("range", line)?;
                    nodes.push(Node::Range {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                Action::With(pipeline) => {
                    let (body, otherwise) = self.block("with", line)?;
                    nodes.push(Node::With {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                Action::End => return Ok((nodes, Stop::End(line))),
                Action::Else => return Ok((nodes, Stop::Else(line))),
                Action::ElseIf(cond) => return Ok((nodes, Stop::ElseIf(cond, line))),
            }
        }
        Ok((nodes, Stop::Eof))
    }

    /// Body and `else` branch of `range` and `with`
    fn block(&mut self, keyword: &str, line: usize) -> Result<(Vec<Node>, Vec<Node>), ParseError> {
        let (body, stop) = self.list()?;
        match stop {
            Stop::End(_) => Ok((body, Vec::new())),
            Stop::Else(_) => {
                let otherwise = self.else_branch(keyword, line)?;
                Ok((body, otherwise))
            }
            Stop::ElseIf(_, at) => Err(ParseError::new(
                at,
                ["{{else if}} is not allowed in {{", keyword, "}}"].concat(),
            )),
            Stop::Eof => Err(unclosed(keyword, line)),
        }
    }

    fn if_chain(&mut self, first: Pipeline, line: usize) -> Result<Node, ParseError> {
        let mut branches = Vec::new();
        let mut cond = first;
        loop {
            let (body, stop) = self.list()?;
            branches.push((cond, body));
            match stop {
                Stop::End(_) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    })
                }
                Stop::ElseIf(next, _) => cond = next,
                Stop::Else(_) => {
                    let otherwise = self.else_branch("if", line)?;
                    return Ok(Node::If {
                        branches,
                        otherwise,
                    });
                }
                Stop::Eof => return Err(unclosed("if", line)),
            }
        }
    }

    fn else_branch(&mut self, keyword: &str, line: usize) -> Result<Vec<Node>, ParseError> {
        let (otherwise, stop) = self.list()?;
        match stop {
            Stop::End(_) => Ok(otherwise),
            Stop::Else(at) | Stop::ElseIf(_, at) => {
                Err(ParseError::new(at, "{{else}} after {{else}}"))
            }
            Stop::Eof => Err(unclosed(keyword, line)),
        }
    }
}
