//! Message templates
//!
//! A template source is a block of `Name: value` header lines, a blank line,
//! then the body:
//!
//! ```text
//! From: alerts@example.com
//! To: {{.Team}}@example.com
//! Sub: [{{.Status}}] {{len .Alerts}} alerts
//!
//! {{range .Alerts}}- {{.Name}}
//! {{end}}
//! ```
//!
//! Header values and the body use the same expression language:
//! `{{.Field}}` and `{{$.Field}}` lookups, `if`/`else if`/`else`, `range`,
//! `with`, `{{/* comments */}}`, `-` trim markers, pipelines and the
//! functions `not`, `and`, `or`, `eq`, `ne`, `len` and `index`.
//!
//! Rendering data is anything implementing [`Serialize`]; it is converted to
//! a JSON value once per render.

use std::{fs, io::Write, path::Path};

use serde::Serialize;
use serde_json::Value;

pub use self::error::{Error, ExecError, ParseError};
use self::parse::Node;

mod error;
mod exec;
mod parse;

/// What happens when a field lookup finds no value
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MissingKey {
    /// Render nothing, and count as false in conditions
    #[default]
    Empty,
    /// Fail the render with an [`ExecError`]
    Error,
}

#[derive(Debug, Clone)]
struct HeaderField {
    name: String,
    value: String,
    nodes: Vec<Node>,
}

/// A parsed template: header fields plus a body
#[derive(Debug, Clone)]
pub struct Template {
    headers: Vec<HeaderField>,
    body: Vec<Node>,
    body_is_empty: bool,
    missing_key: MissingKey,
}

fn canonical_name(name: &str) -> &str {
    if name.eq_ignore_ascii_case("sub") {
        "Subject"
    } else {
        name
    }
}

impl Template {
    /// Parses a template source
    ///
    /// ```
    /// # use courier::Template;
    /// let template = Template::parse("From: a@example.com\nSub: Hi\n\nHello {{.Name}}")?;
    /// assert_eq!(template.from(), "a@example.com");
    /// assert_eq!(template.subject(), "Hi");
    /// # Ok::<(), courier::template::ParseError>(())
    /// ```
    pub fn parse(source: &str) -> Result<Template, ParseError> {
        let mut headers: Vec<HeaderField> = Vec::new();
        let mut offset = 0;
        let mut consumed_lines = 0;

        for line in source.split_inclusive('\n') {
            offset += line.len();
            consumed_lines += 1;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = canonical_name(name.trim()).to_owned();
            let value = value.trim().to_owned();
            let nodes = parse::parse(&value).map_err(|e| e.shifted(consumed_lines - 1))?;

            let field = HeaderField { name, value, nodes };
            match headers
                .iter_mut()
                .find(|h| h.name.eq_ignore_ascii_case(&field.name))
            {
                Some(existing) => *existing = field,
                None => headers.push(field),
            }
        }

        let body_source = &source[offset..];
        let body = parse::parse(body_source).map_err(|e| e.shifted(consumed_lines))?;

        Ok(Template {
            headers,
            body,
            body_is_empty: body_source.trim().is_empty(),
            missing_key: MissingKey::default(),
        })
    }

    /// Reads and parses a template file
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Template, Error> {
        let source = fs::read_to_string(path)?;
        Ok(Template::parse(&source)?)
    }

    /// Sets how lookups of absent fields are handled
    pub fn missing_key(mut self, missing_key: MissingKey) -> Self {
        self.missing_key = missing_key;
        self
    }

    /// Raw value of a header field, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = canonical_name(name);
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// All header fields in declaration order
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    /// Raw `From` value, empty when absent
    pub fn from(&self) -> &str {
        self.header("From").unwrap_or_default()
    }

    /// Raw `To` value, empty when absent
    pub fn to(&self) -> &str {
        self.header("To").unwrap_or_default()
    }

    /// Raw `Cc` value, empty when absent
    pub fn cc(&self) -> &str {
        self.header("Cc").unwrap_or_default()
    }

    /// Raw `Bcc` value, empty when absent
    pub fn bcc(&self) -> &str {
        self.header("Bcc").unwrap_or_default()
    }

    /// Raw `Subject` (or `Sub`) value, empty when absent
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    /// Whether anything but blanks follows the header block
    pub fn has_body(&self) -> bool {
        !self.body_is_empty
    }

    /// Renders one header field against `data`
    ///
    /// An absent field renders as the empty string.
    pub fn render<T: Serialize + ?Sized>(&self, field: &str, data: &T) -> Result<String, Error> {
        self.render_field(field, &context(data)?, self.missing_key)
    }

    /// Renders the body against `data` into `writer`
    pub fn render_body<W: Write, T: Serialize + ?Sized>(
        &self,
        writer: &mut W,
        data: &T,
    ) -> Result<(), Error> {
        let body = self.render_body_string(&context(data)?, self.missing_key)?;
        writer.write_all(body.as_bytes())?;
        Ok(())
    }

    pub(crate) fn render_field(
        &self,
        field: &str,
        data: &Value,
        missing: MissingKey,
    ) -> Result<String, Error> {
        let field = canonical_name(field);
        match self
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(field))
        {
            Some(header) => Ok(exec::execute(&header.nodes, data, missing)?),
            None => Ok(String::new()),
        }
    }

    pub(crate) fn render_body_string(
        &self,
        data: &Value,
        missing: MissingKey,
    ) -> Result<String, Error> {
        Ok(exec::execute(&self.body, data, missing)?)
    }

    pub(crate) fn missing_key_mode(&self) -> MissingKey {
        self.missing_key
    }
}

/// Parses and renders a standalone template string
pub(crate) fn render_str(source: &str, data: &Value, missing: MissingKey) -> Result<String, Error> {
    let nodes = parse::parse(source)?;
    Ok(exec::execute(&nodes, data, missing)?)
}

/// Converts caller data into the rendering context
pub(crate) fn context<T: Serialize + ?Sized>(data: &T) -> Result<Value, Error> {
    serde_json::to_value(data).map_err(|e| Error::Exec(ExecError::new(format!("data: {e}"))))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn header_block_and_body() {
        let template =
            Template::parse("From: a@x.com\nTo: b@x.com\nSub: Hi\n\nHello {{.Name}}").unwrap();
        assert_eq!(template.from(), "a@x.com");
        assert_eq!(template.to(), "b@x.com");
        assert_eq!(template.subject(), "Hi");
        assert_eq!(template.header("subject"), Some("Hi"));
        assert_eq!(template.cc(), "");

        let mut body = Vec::new();
        template
            .render_body(&mut body, &json!({ "Name": "Bob" }))
            .unwrap();
        assert_eq!(body, b"Hello Bob");
    }

    #[test]
    fn crlf_headers_and_duplicates() {
        let template =
            Template::parse("TO: first@x.com\r\nnot a header\r\nto :  second@x.com \r\n\r\nbody\r\n")
                .unwrap();
        assert_eq!(template.to(), "second@x.com");
        assert_eq!(template.headers().count(), 1);
        assert_eq!(template.headers().next(), Some(("TO", "second@x.com")));

        let mut body = Vec::new();
        template.render_body(&mut body, &json!({})).unwrap();
        assert_eq!(body, b"body\r\n");
    }

    #[test]
    fn headers_only() {
        let template = Template::parse("From: a@x.com\nSubject: s").unwrap();
        assert!(!template.has_body());
        assert_eq!(template.subject(), "s");

        let template = Template::parse("From: a@x.com\n\n").unwrap();
        assert!(!template.has_body());
    }

    #[test]
    fn render_fields() {
        let template = Template::parse("To: {{.Team}}@example.com\n\n").unwrap();
        let data = json!({ "Team": "ops" });
        assert_eq!(template.render("to", &data).unwrap(), "ops@example.com");
        assert_eq!(template.render("Cc", &data).unwrap(), "");
    }

    #[test]
    fn strict_missing_key() {
        let template = Template::parse("\nHi {{.Name}}").unwrap();
        let mut body = Vec::new();
        template.render_body(&mut body, &json!({})).unwrap();
        assert_eq!(body, b"Hi ");

        let template = template.missing_key(MissingKey::Error);
        let err = template.render_body(&mut Vec::new(), &json!({})).unwrap_err();
        assert!(matches!(err, Error::Exec(_)));
    }

    #[test]
    fn parse_errors_report_source_lines() {
        let err = Template::parse("From: a@x.com\nTo: {{.To\n\nbody").unwrap_err();
        assert_eq!(err.line(), 2);

        let err = Template::parse("From: a@x.com\n\nline one\n{{if .X}}").unwrap_err();
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn parse_file_reports_io() {
        let err = Template::parse_file("/nonexistent/template.tmpl").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
