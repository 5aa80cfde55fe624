/*!
param.rs - command parameters.

Parameters are derived from the fields of a method's input schema, so
local and schema-described commands declare them the same way.

Token grammar accepted by `ParameterSet::parse`:
    --long VALUE | --long=VALUE | -s VALUE | -s=VALUE
    --flag                  (bool parameters; presence = true)
    --tags a,b --tags c     (repeated parameters accumulate)

Parsing is all-or-nothing: values are collected into a scratch copy and
only committed once every token was accepted and every required
parameter has a value.
*/

use crate::error::{Error, Result};
use crate::payload::{FieldSchema, FieldType, MessageSchema, Payload, Value};

/// A declared parameter plus its per-invocation value.
#[derive(Debug, Clone)]
pub struct Parameter {
    field: FieldSchema,
    values: Vec<Value>,
}

impl Parameter {
    pub fn from_field(field: FieldSchema) -> Self {
        Self {
            field,
            values: Vec::new(),
        }
    }

    pub fn long_key(&self) -> &str {
        &self.field.name
    }

    pub fn short_key(&self) -> Option<&str> {
        self.field.short_key.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.field.description
    }

    pub fn field_type(&self) -> FieldType {
        self.field.field_type
    }

    pub fn is_required(&self) -> bool {
        self.field.required
    }

    pub fn is_repeated(&self) -> bool {
        self.field.repeated
    }

    pub fn is_hidden(&self) -> bool {
        self.field.hidden
    }

    pub fn is_value_set(&self) -> bool {
        !self.values.is_empty()
    }

    /// Current value; lists for repeated parameters.
    pub fn value(&self) -> Option<Value> {
        if self.values.is_empty() {
            None
        } else if self.field.repeated {
            Some(Value::List(self.values.clone()))
        } else {
            self.values.first().cloned()
        }
    }

    fn matches(&self, key: &str, long_form: bool) -> bool {
        if long_form {
            self.field.name == key
        } else {
            self.short_key() == Some(key) || self.field.name == key
        }
    }

    fn accept(&mut self, raw: &str) -> Result<()> {
        if self.field.repeated {
            for part in raw.split(',') {
                let v = self.field.field_type.parse(part.trim())?;
                self.values.push(v);
            }
            return Ok(());
        }
        if self.is_value_set() {
            return Err(Error::MalformedInput(format!(
                "parameter '{}' given more than once",
                self.field.name
            )));
        }
        let v = self.field.field_type.parse(raw)?;
        self.values.push(v);
        Ok(())
    }

    /// Serialize the value into its payload field. Unset parameters leave
    /// the field at its zero value.
    pub fn write_into(&self, payload: &mut Payload) -> Result<()> {
        match self.value() {
            Some(v) => payload.set(&self.field.name, v),
            None => Ok(()),
        }
    }
}

/// Ordered parameter declarations of one command.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn from_schema(schema: &MessageSchema) -> Self {
        Self {
            params: schema
                .fields
                .iter()
                .cloned()
                .map(Parameter::from_field)
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn get(&self, long_key: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.long_key() == long_key)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Drop all values (declarations stay).
    pub fn reset(&mut self) {
        for p in &mut self.params {
            p.values.clear();
        }
    }

    /// Parse tokens into fresh values; on error `self` is untouched.
    pub fn parse(&mut self, tokens: &[String]) -> Result<()> {
        let mut scratch = self.params.clone();
        for p in &mut scratch {
            p.values.clear();
        }

        let mut i = 0;
        while i < tokens.len() {
            let tok = tokens[i].as_str();

            let (body, long_form) = if let Some(rest) = tok.strip_prefix("--") {
                (rest, true)
            } else if let Some(rest) = tok.strip_prefix('-')
                && !rest.is_empty()
            {
                (rest, false)
            } else {
                return Err(Error::MalformedInput(format!(
                    "unexpected positional token '{tok}'"
                )));
            };

            let (key, inline) = match body.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (body, None),
            };
            if key.is_empty() {
                return Err(Error::MalformedInput(format!("invalid key '{tok}'")));
            }

            // `-h`/`--help` only mean "show help" when no parameter claims them.
            let Some(param) = scratch.iter_mut().find(|p| p.matches(key, long_form)) else {
                if tok == "-h" || tok == "--help" {
                    return Err(Error::MalformedInput("help requested".into()));
                }
                return Err(Error::MalformedInput(format!("unknown parameter '{tok}'")));
            };

            match inline {
                Some(raw) => param.accept(raw)?,
                None if param.field_type() == FieldType::Bool => param.accept("true")?,
                None => {
                    i += 1;
                    let raw = tokens.get(i).ok_or_else(|| {
                        Error::MalformedInput(format!("missing value for '{tok}'"))
                    })?;
                    param.accept(raw)?;
                }
            }
            i += 1;
        }

        if let Some(missing) = scratch
            .iter()
            .find(|p| p.is_required() && !p.is_value_set())
        {
            return Err(Error::MalformedInput(format!(
                "missing required parameter '{}'",
                missing.long_key()
            )));
        }

        self.params = scratch;
        Ok(())
    }

    /// Marshal every parameter into `payload`, field by field.
    pub fn write_into(&self, payload: &mut Payload) -> Result<()> {
        for p in &self.params {
            p.write_into(payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn set() -> ParameterSet {
        ParameterSet::from_schema(&MessageSchema::new(
            "In",
            vec![
                FieldSchema::new("path", FieldType::String).required().short("p"),
                FieldSchema::new("count", FieldType::Uint64),
                FieldSchema::new("force", FieldType::Bool),
                FieldSchema::new("tag", FieldType::String).repeated(),
                FieldSchema::new("debug-level", FieldType::Int64).hidden(),
            ],
        ))
    }

    #[test]
    fn parses_long_short_inline_and_flags() {
        let mut s = set();
        s.parse(&toks(&[
            "-p", "/dev/sda", "--count=3", "--force", "--tag", "a,b", "--tag", "c",
        ]))
        .unwrap();
        assert_eq!(
            s.get("path").unwrap().value(),
            Some(Value::String("/dev/sda".into()))
        );
        assert_eq!(s.get("count").unwrap().value(), Some(Value::Uint64(3)));
        assert_eq!(s.get("force").unwrap().value(), Some(Value::Bool(true)));
        assert_eq!(
            s.get("tag").unwrap().value(),
            Some(Value::List(vec![
                Value::String("a".into()),
                Value::String("b".into()),
                Value::String("c".into()),
            ]))
        );
    }

    #[test]
    fn hidden_parameters_are_still_accepted() {
        let mut s = set();
        s.parse(&toks(&["--path", "x", "--debug-level", "-2"])).unwrap();
        assert_eq!(s.get("debug-level").unwrap().value(), Some(Value::Int64(-2)));
    }

    #[test]
    fn failure_leaves_previous_values_untouched() {
        let mut s = set();
        s.parse(&toks(&["--path", "first"])).unwrap();

        for bad in [
            vec!["--path", "second", "--count", "nope"],
            vec!["--path", "second", "--bogus", "1"],
            vec!["--path"],
            vec!["positional"],
            vec!["--count", "1"],
            vec!["--path", "a", "--path", "b"],
            vec!["--help"],
        ] {
            assert!(s.parse(&toks(&bad)).is_err(), "{bad:?} should fail");
            assert_eq!(
                s.get("path").unwrap().value(),
                Some(Value::String("first".into()))
            );
        }
    }

    #[test]
    fn declared_help_parameters_take_precedence() {
        let mut s = ParameterSet::from_schema(&MessageSchema::new(
            "In",
            vec![
                FieldSchema::new("help", FieldType::String),
                FieldSchema::new("human", FieldType::Bool).short("h"),
            ],
        ));
        s.parse(&toks(&["--help", "topic", "-h"])).unwrap();
        assert_eq!(
            s.get("help").unwrap().value(),
            Some(Value::String("topic".into()))
        );
        assert_eq!(s.get("human").unwrap().value(), Some(Value::Bool(true)));

        let err = set().parse(&toks(&["-h"])).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(msg) if msg == "help requested"));
    }

    #[test]
    fn write_into_leaves_unset_fields_at_zero() {
        let schema = MessageSchema::new(
            "In",
            vec![
                FieldSchema::new("path", FieldType::String),
                FieldSchema::new("count", FieldType::Uint64),
            ],
        );
        let mut s = ParameterSet::from_schema(&schema);
        s.parse(&toks(&["--path", "x"])).unwrap();
        let mut payload = Payload::new(schema);
        s.write_into(&mut payload).unwrap();
        assert!(payload.is_set("path"));
        assert!(!payload.is_set("count"));
        assert_eq!(payload.get("count"), Some(Value::Uint64(0)));
    }

    #[test]
    fn parameter_without_schema_field_is_mismatch() {
        let mut s = ParameterSet::from_schema(&MessageSchema::new(
            "In",
            vec![FieldSchema::new("extra", FieldType::String)],
        ));
        s.parse(&toks(&["--extra", "v"])).unwrap();
        let mut payload = Payload::new(MessageSchema::new("Other", vec![]));
        assert!(matches!(
            s.write_into(&mut payload),
            Err(Error::SchemaMismatch(_))
        ));
    }
}
