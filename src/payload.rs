/*!
payload.rs - schema-typed generic payloads.

A node describes each method's input and output as a `MessageSchema`
(ordered list of `FieldSchema`). Payloads are built at runtime against
such a schema: a map of field name -> tagged `Value`, checked on every
write. No compiled message types are involved.

Wire form is a JSON object (`to_json` / `from_json`), which is what the
MCP transport carries in `tools/call` arguments and `structuredContent`.

Rules:
  - Writing a field that is not in the schema is a schema mismatch.
  - Writing a value of the wrong type (or a list into a scalar field) is
    a schema mismatch.
  - Reading an unset field yields its zero value (empty list if repeated).
  - Only set fields are emitted on the wire.
*/

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/* ---- Field Types ---- */

/// Primitive field type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    #[serde(alias = "integer")]
    Int64,
    Uint64,
    #[serde(alias = "number")]
    Double,
    #[serde(alias = "boolean")]
    Bool,
}

impl FieldType {
    /// Map a JSON-schema `type` keyword to a field type.
    /// Unknown / composite types fall back to `String`.
    pub fn from_json_schema(type_name: &str) -> Self {
        match type_name {
            "integer" => FieldType::Int64,
            "number" => FieldType::Double,
            "boolean" => FieldType::Bool,
            _ => FieldType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Double => "double",
            FieldType::Bool => "bool",
        }
    }

    /// Zero value for a scalar of this type.
    pub fn zero(&self) -> Value {
        match self {
            FieldType::String => Value::String(String::new()),
            FieldType::Int64 => Value::Int64(0),
            FieldType::Uint64 => Value::Uint64(0),
            FieldType::Double => Value::Double(0.0),
            FieldType::Bool => Value::Bool(false),
        }
    }

    /// Parse a raw CLI string into a scalar value of this type.
    pub fn parse(&self, raw: &str) -> Result<Value> {
        let bad = || Error::MalformedInput(format!("'{raw}' is not a valid {}", self.as_str()));
        match self {
            FieldType::String => Ok(Value::String(raw.to_string())),
            FieldType::Int64 => raw.trim().parse::<i64>().map(Value::Int64).map_err(|_| bad()),
            FieldType::Uint64 => raw
                .trim()
                .parse::<u64>()
                .map(Value::Uint64)
                .map_err(|_| bad()),
            FieldType::Double => match raw.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Double(f)),
                _ => Err(bad()),
            },
            FieldType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "n" => Ok(Value::Bool(false)),
                _ => Err(bad()),
            },
        }
    }

    /// Whether a scalar value carries this type tag.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::String, Value::String(_))
                | (FieldType::Int64, Value::Int64(_))
                | (FieldType::Uint64, Value::Uint64(_))
                | (FieldType::Double, Value::Double(_))
                | (FieldType::Bool, Value::Bool(_))
        )
    }

    fn decode(&self, raw: &serde_json::Value) -> Option<Value> {
        match self {
            FieldType::String => raw.as_str().map(|s| Value::String(s.to_string())),
            FieldType::Int64 => raw.as_i64().map(Value::Int64),
            FieldType::Uint64 => raw.as_u64().map(Value::Uint64),
            FieldType::Double => raw.as_f64().map(Value::Double),
            FieldType::Bool => raw.as_bool().map(Value::Bool),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ---- Values ---- */

/// Tagged field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int64(n) => serde_json::Value::from(*n),
            Value::Uint64(n) => serde_json::Value::from(*n),
            Value::Double(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Int64(n) => write!(f, "{n}"),
            Value::Uint64(n) => write!(f, "{n}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/* ---- Schemas ---- */

/// One field of a message schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_key: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            repeated: false,
            hidden: false,
            description: String::new(),
            short_key: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn short(mut self, key: impl Into<String>) -> Self {
        self.short_key = Some(key.into());
        self
    }

    /// Zero value honoring repeatability.
    pub fn zero(&self) -> Value {
        if self.repeated {
            Value::List(Vec::new())
        } else {
            self.field_type.zero()
        }
    }
}

/// Ordered set of fields describing one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl MessageSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names are non-empty and unique.
    pub fn is_well_formed(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .iter()
            .all(|f| !f.name.is_empty() && seen.insert(f.name.as_str()))
    }
}

/* ---- Payload ---- */

/// Generic message built against a `MessageSchema`.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    schema: MessageSchema,
    values: BTreeMap<String, Value>,
}

impl Payload {
    pub fn new(schema: MessageSchema) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &MessageSchema {
        &self.schema
    }

    /// Set a field, validating name and type against the schema.
    /// A scalar written into a repeated field is wrapped into a one-item list.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let field = self.schema.field(name).ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "message '{}' has no field '{name}'",
                self.schema.name
            ))
        })?;

        let value = match (field.repeated, value) {
            (true, Value::List(items)) => Value::List(items),
            (true, scalar) => Value::List(vec![scalar]),
            (false, Value::List(_)) => {
                return Err(Error::SchemaMismatch(format!(
                    "field '{name}' is not repeated"
                )));
            }
            (false, scalar) => scalar,
        };

        let ok = match &value {
            Value::List(items) => items.iter().all(|v| field.field_type.accepts(v)),
            scalar => field.field_type.accepts(scalar),
        };
        if !ok {
            return Err(Error::SchemaMismatch(format!(
                "field '{name}' expects {}",
                field.field_type
            )));
        }
        if let Value::Double(f) = &value
            && !f.is_finite()
        {
            return Err(Error::SchemaMismatch(format!(
                "field '{name}' holds a non-finite double"
            )));
        }

        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Read a field; unset fields yield their zero value. `None` if the
    /// schema has no such field.
    pub fn get(&self, name: &str) -> Option<Value> {
        let field = self.schema.field(name)?;
        Some(self.values.get(name).cloned().unwrap_or_else(|| field.zero()))
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fields in schema order with their effective values.
    pub fn entries(&self) -> impl Iterator<Item = (&FieldSchema, Value)> + '_ {
        self.schema.fields.iter().map(move |f| {
            let v = self.values.get(&f.name).cloned().unwrap_or_else(|| f.zero());
            (f, v)
        })
    }

    /// Wire encoding: JSON object of the set fields.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    /// Decode a JSON object into a payload. Unknown keys and ill-typed
    /// values are schema mismatches; `null` leaves the field unset.
    pub fn from_json(schema: MessageSchema, raw: &serde_json::Value) -> Result<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            Error::SchemaMismatch(format!("message '{}' is not a JSON object", schema.name))
        })?;

        let mut payload = Payload::new(schema);
        for (key, raw_v) in obj {
            if raw_v.is_null() {
                continue;
            }
            let field = payload.schema.field(key).cloned().ok_or_else(|| {
                Error::SchemaMismatch(format!(
                    "message '{}' has no field '{key}'",
                    payload.schema.name
                ))
            })?;
            let mismatch =
                || Error::SchemaMismatch(format!("field '{key}' expects {}", field.field_type));

            let value = if field.repeated {
                let arr = raw_v.as_array().ok_or_else(mismatch)?;
                let items = arr
                    .iter()
                    .map(|item| field.field_type.decode(item).ok_or_else(mismatch))
                    .collect::<Result<Vec<_>>>()?;
                Value::List(items)
            } else {
                field.field_type.decode(raw_v).ok_or_else(mismatch)?
            };
            payload.set(key, value)?;
        }
        Ok(payload)
    }
}
