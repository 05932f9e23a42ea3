//! Template evaluation against a JSON value

use serde_json::Value;

use super::{
    error::ExecError,
    parse::{Command, Func, Node, Operand, Pipeline, Root},
    MissingKey,
};

/// Renders `nodes` with `root` as both `.` and `$`
pub(crate) fn execute(nodes: &[Node], root: &Value, missing: MissingKey) -> Result<String, ExecError> {
    let mut state = State {
        root,
        missing,
        out: String::new(),
    };
    state.walk(nodes, root)?;
    Ok(state.out)
}

struct State<'a> {
    root: &'a Value,
    missing: MissingKey,
    out: String,
}

impl State<'_> {
    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<(), ExecError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Action(pipeline) => {
                    let value = self.pipeline(pipeline, dot)?;
                    print(&value, &mut self.out);
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for (cond, body) in branches {
                        if truthy(&self.pipeline(cond, dot)?) {
                            taken = Some(body);
                            break;
                        }
                    }
                    self.walk(taken.unwrap_or(otherwise), dot)?;
                }
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.pipeline(pipeline, dot)?;
                    if truthy(&value) {
                        self.walk(body, &value)?;
                    } else {
                        self.walk(otherwise, dot)?;
                    }
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => match self.pipeline(pipeline, dot)? {
                    Value::Array(items) if !items.is_empty() => {
                        for item in &items {
                            self.walk(body, item)?;
                        }
                    }
                    Value::Object(map) if !map.is_empty() => {
                        for item in map.values() {
                            self.walk(body, item)?;
                        }
                    }
                    Value::Array(_) | Value::Object(_) | Value::Null => {
                        self.walk(otherwise, dot)?;
                    }
                    other => {
                        return Err(ExecError::new(format!(
                            "range can't iterate over {}",
                            type_name(&other)
                        )))
                    }
                },
            }
        }
        Ok(())
    }

    fn pipeline(&self, pipeline: &Pipeline, dot: &Value) -> Result<Value, ExecError> {
        let mut piped = None;
        for command in &pipeline.0 {
            piped = Some(self.command(command, dot, piped.take())?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn command(&self, command: &Command, dot: &Value, piped: Option<Value>) -> Result<Value, ExecError> {
        match command {
            Command::Operand(operand) => {
                if piped.is_some() {
                    return Err(ExecError::new("can't give argument to non-function"));
                }
                self.operand(operand, dot)
            }
            Command::Call(func, args) => {
                let mut values = args
                    .iter()
                    .map(|arg| self.operand(arg, dot))
                    .collect::<Result<Vec<_>, _>>()?;
                values.extend(piped);
                call(*func, values)
            }
        }
    }

    fn operand(&self, operand: &Operand, dot: &Value) -> Result<Value, ExecError> {
        match operand {
            Operand::Field { root, path } => {
                let base = match root {
                    Root::Dot => dot,
                    Root::Top => self.root,
                };
                self.lookup(base, path)
            }
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Sub(pipeline) => self.pipeline(pipeline, dot),
        }
    }

    fn lookup(&self, base: &Value, path: &[String]) -> Result<Value, ExecError> {
        let mut current = base;
        for (depth, name) in path.iter().enumerate() {
            current = match current {
                Value::Object(map) => match map.get(name) {
                    Some(value) => value,
                    None => return self.missing(&path[..=depth]),
                },
                Value::Null => return self.missing(&path[..=depth]),
                other => {
                    return Err(ExecError::new(format!(
                        "can't evaluate field {name} in type {}",
                        type_name(other)
                    )))
                }
            };
        }
        Ok(current.clone())
    }

    fn missing(&self, path: &[String]) -> Result<Value, ExecError> {
        match self.missing {
            MissingKey::Empty => Ok(Value::Null),
            MissingKey::Error => Err(ExecError::new(format!(
                "map has no entry for key \"{}\"",
                path.join(".")
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// `false`, zero, null and empty collections are false
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn print(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        // collections print as JSON
        other => out.push_str(&other.to_string()),
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn arity(func: Func, args: &[Value], min: usize, max: Option<usize>) -> Result<(), ExecError> {
    let count = args.len();
    if count < min || max.is_some_and(|max| count > max) {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        return Err(ExecError::new(format!(
            "wrong number of args for {}: want {expected} got {count}",
            func.name()
        )));
    }
    Ok(())
}

fn call(func: Func, mut args: Vec<Value>) -> Result<Value, ExecError> {
    match func {
        Func::Not => {
            arity(func, &args, 1, Some(1))?;
            Ok(Value::Bool(!truthy(&args[0])))
        }
        Func::And => {
            arity(func, &args, 1, None)?;
            let pos = args.iter().position(|v| !truthy(v)).unwrap_or(args.len() - 1);
            Ok(args.swap_remove(pos))
        }
        Func::Or => {
            arity(func, &args, 1, None)?;
            let pos = args.iter().position(truthy).unwrap_or(args.len() - 1);
            Ok(args.swap_remove(pos))
        }
        Func::Eq => {
            arity(func, &args, 2, None)?;
            Ok(Value::Bool(args[1..].iter().any(|v| equal(&args[0], v))))
        }
        Func::Ne => {
            arity(func, &args, 2, Some(2))?;
            Ok(Value::Bool(!equal(&args[0], &args[1])))
        }
        Func::Len => {
            arity(func, &args, 1, Some(1))?;
            let len = match &args[0] {
                Value::Null => 0,
                Value::String(s) => s.len(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(ExecError::new(format!(
                        "len of type {}",
                        type_name(other)
                    )))
                }
            };
            Ok(Value::from(len))
        }
        Func::Index => {
            arity(func, &args, 1, None)?;
            let mut item = args.remove(0);
            for key in args {
                item = index(item, &key)?;
            }
            Ok(item)
        }
    }
}

fn index(item: Value, key: &Value) -> Result<Value, ExecError> {
    match (item, key) {
        (Value::Array(mut items), Value::Number(n)) => {
            let len = items.len();
            match n.as_u64().and_then(|i| usize::try_from(i).ok()) {
                Some(i) if i < len => Ok(items.swap_remove(i)),
                _ => Err(ExecError::new(format!("index out of range: {n}"))),
            }
        }
        (Value::Object(mut map), Value::String(name)) => {
            Ok(map.remove(name).unwrap_or(Value::Null))
        }
        (Value::Null, _) => Ok(Value::Null),
        (item, key) => Err(ExecError::new(format!(
            "can't index item of type {} with {}",
            type_name(&item),
            type_name(key)
        ))),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::template::parse::parse;

    fn render(src: &str, data: &Value) -> Result<String, ExecError> {
        execute(&parse(src).unwrap(), data, MissingKey::Empty)
    }

    #[test]
    fn interpolation() {
        let data = json!({ "Name": "Ada", "Org": { "Team": "ops" }, "N": 3, "F": 1.5, "Ok": true });
        assert_eq!(
            render("{{.Name}}/{{.Org.Team}}/{{$.N}}/{{.F}}/{{.Ok}}", &data).unwrap(),
            "Ada/ops/3/1.5/true"
        );
        assert_eq!(render("{{.Missing}}|{{.Org.Missing.Deeper}}", &data).unwrap(), "|");
    }

    #[test]
    fn strict_missing_keys() {
        let nodes = parse("{{.Org.Missing}}").unwrap();
        let err = execute(&nodes, &json!({ "Org": {} }), MissingKey::Error).unwrap_err();
        assert_eq!(err.message(), "map has no entry for key \"Org.Missing\"");
    }

    #[test]
    fn conditionals() {
        let src = "{{if .A}}a{{else if .B}}b{{else}}c{{end}}";
        assert_eq!(render(src, &json!({ "A": 1 })).unwrap(), "a");
        assert_eq!(render(src, &json!({ "A": 0, "B": "x" })).unwrap(), "b");
        assert_eq!(render(src, &json!({ "A": [], "B": {} })).unwrap(), "c");
        assert_eq!(
            render("{{if not .A}}none{{end}}", &json!({})).unwrap(),
            "none"
        );
    }

    #[test]
    fn range_and_with() {
        let data = json!({
            "Alerts": [{ "Name": "disk" }, { "Name": "cpu" }],
            "Labels": { "b": "2", "a": "1" },
            "Empty": [],
            "Who": { "Name": "Ada" }
        });
        assert_eq!(
            render("{{range .Alerts}}[{{.Name}} of {{len $.Alerts}}]{{end}}", &data).unwrap(),
            "[disk of 2][cpu of 2]"
        );
        assert_eq!(render("{{range .Labels}}{{.}}{{end}}", &data).unwrap(), "12");
        assert_eq!(
            render("{{range .Empty}}x{{else}}none{{end}}", &data).unwrap(),
            "none"
        );
        assert_eq!(
            render("{{with .Who}}{{.Name}}{{else}}?{{end}}{{with .Nobody}}x{{else}}?{{end}}", &data)
                .unwrap(),
            "Ada?"
        );
        assert!(render("{{range .Who.Name}}{{end}}", &data).is_err());
    }

    #[test]
    fn functions() {
        let data = json!({ "L": ["a", "b", "c"], "M": { "k": "v" }, "S": "héllo" });
        assert_eq!(render("{{index .L 1}}{{index .M \"k\"}}", &data).unwrap(), "bv");
        assert_eq!(render("{{len .S}} {{.L | len}}", &data).unwrap(), "6 3");
        assert_eq!(render("{{eq 1 2 1.0}} {{ne .S \"x\"}}", &data).unwrap(), "true true");
        assert_eq!(render("{{and 1 0 2}} {{or 0 \"\" \"z\"}}", &data).unwrap(), "0 z");
        assert_eq!(render("{{if and (eq (len .L) 3) .M}}ok{{end}}", &data).unwrap(), "ok");
    }

    #[test]
    fn exec_errors() {
        let data = json!({ "L": [1], "S": "x" });
        assert!(render("{{index .L 5}}", &data).is_err());
        assert!(render("{{index .S 0}}", &data).is_err());
        assert!(render("{{not}}", &data).is_err());
        assert!(render("{{.S.Field}}", &data).is_err());
        assert!(render("{{1 | 2}}", &data).is_err());
    }

    #[test]
    fn collections_print_as_json() {
        assert_eq!(
            render("{{.}}", &json!({ "a": [1, "x"] })).unwrap(),
            r#"{"a":[1,"x"]}"#
        );
    }
}
