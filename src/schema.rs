//! Record schemas: one description drives both the output schema we declare
//! to the model and the normalization of whatever comes back.
//!
//! Normalization never trusts field presence. The container shape decides
//! whether a batch is usable at all; inside a usable batch, bad records are
//! dropped and missing optional fields get defaults.

use serde_json::{json, Map, Value};

#[derive(Clone, Debug)]
pub enum FieldKind {
  String,
  Integer,
  Boolean,
  StringList,
  Enum(&'static [&'static str]),
  Object(RecordSchema),
  ObjectList(RecordSchema),
}

#[derive(Clone, Debug)]
pub enum Presence {
  Required,
  /// Filled with this value when missing or null.
  Optional(Value),
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
  pub name: &'static str,
  pub kind: FieldKind,
  pub presence: Presence,
}

impl FieldSpec {
  pub fn required(name: &'static str, kind: FieldKind) -> Self {
    Self { name, kind, presence: Presence::Required }
  }

  pub fn optional(name: &'static str, kind: FieldKind, default: Value) -> Self {
    Self { name, kind, presence: Presence::Optional(default) }
  }
}

#[derive(Clone, Debug)]
pub struct RecordSchema {
  pub name: &'static str,
  /// Object fields that may wrap the record array, tried in order.
  pub wrappers: &'static [&'static str],
  pub fields: Vec<FieldSpec>,
}

/// Outcome of the container shape rules.
#[derive(Debug, PartialEq)]
pub enum Shape<'a> {
  Sequence(&'a [Value]),
  Invalid(&'static str),
}

/// Outcome of normalizing a batch or record.
#[derive(Debug, PartialEq)]
pub enum Validated<T> {
  Valid(T),
  Invalid(String),
}

/// Ordered shape rules: a bare array, then an object holding an array under
/// one of the wrapper fields. First match wins.
pub fn unwrap_sequence<'a>(value: &'a Value, wrappers: &[&str]) -> Shape<'a> {
  if let Value::Array(items) = value {
    return Shape::Sequence(items);
  }
  if let Value::Object(obj) = value {
    for w in wrappers {
      if let Some(Value::Array(items)) = obj.get(*w) {
        return Shape::Sequence(items);
      }
    }
    return Shape::Invalid("object without a known array field");
  }
  match value {
    Value::Null => Shape::Invalid("null payload"),
    _ => Shape::Invalid("scalar payload"),
  }
}

impl RecordSchema {
  /// Normalize a batch. Elements that are not objects or miss a required
  /// field are dropped; if nothing survives from a non-empty batch the whole
  /// batch is invalid.
  pub fn normalize_batch(&self, value: &Value) -> Validated<Vec<Map<String, Value>>> {
    let items = match unwrap_sequence(value, self.wrappers) {
      Shape::Sequence(items) => items,
      Shape::Invalid(reason) => return Validated::Invalid(format!("{}: {}", self.name, reason)),
    };
    let records: Vec<_> = items.iter().filter_map(|item| self.conform(item)).collect();
    if records.is_empty() && !items.is_empty() {
      return Validated::Invalid(format!("{}: no element matched the record shape", self.name));
    }
    Validated::Valid(records)
  }

  /// Normalize a single object record.
  pub fn normalize_record(&self, value: &Value) -> Validated<Map<String, Value>> {
    match self.conform(value) {
      Some(rec) => Validated::Valid(rec),
      None => Validated::Invalid(format!("{}: payload is not a well-formed record", self.name)),
    }
  }

  fn conform(&self, value: &Value) -> Option<Map<String, Value>> {
    let obj = value.as_object()?;
    let mut out = obj.clone();
    for field in &self.fields {
      let present = obj.get(field.name).filter(|v| !v.is_null());
      let normalized = match present {
        Some(v) => conform_field(&field.kind, v),
        None => None,
      };
      match (normalized, &field.presence) {
        (Some(v), _) => {
          out.insert(field.name.to_string(), v);
        }
        (None, Presence::Optional(default)) => {
          out.insert(field.name.to_string(), default.clone());
        }
        (None, Presence::Required) => return None,
      }
    }
    Some(out)
  }

  /// JSON Schema for an array of these records.
  pub fn to_json_schema(&self) -> Value {
    json!({ "type": "array", "items": self.object_schema() })
  }

  /// JSON Schema for a single record.
  pub fn object_schema(&self) -> Value {
    let mut props = Map::new();
    let mut required = Vec::new();
    for f in &self.fields {
      props.insert(f.name.to_string(), kind_schema(&f.kind));
      if matches!(f.presence, Presence::Required) {
        required.push(Value::String(f.name.to_string()));
      }
    }
    json!({ "type": "object", "properties": props, "required": required })
  }
}

/// Coerce a present value to the field kind, or `None` if it cannot be.
fn conform_field(kind: &FieldKind, v: &Value) -> Option<Value> {
  match kind {
    FieldKind::String => match v {
      Value::String(s) => Some(Value::String(s.clone())),
      Value::Number(n) => Some(Value::String(n.to_string())),
      _ => None,
    },
    FieldKind::Integer => match v {
      Value::Number(n) if n.is_u64() || n.is_i64() => Some(v.clone()),
      Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
      _ => None,
    },
    FieldKind::Boolean => v.as_bool().map(Value::Bool),
    FieldKind::StringList => v.as_array().map(|a| {
      Value::Array(a.iter().filter_map(|x| x.as_str()).map(|s| Value::String(s.to_string())).collect())
    }),
    FieldKind::Enum(allowed) => {
      let s = v.as_str()?;
      allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(s.trim()))
        .map(|a| Value::String(a.to_string()))
    }
    FieldKind::Object(schema) => schema.conform(v).map(Value::Object),
    FieldKind::ObjectList(schema) => v
      .as_array()
      .map(|a| Value::Array(a.iter().filter_map(|x| schema.conform(x)).map(Value::Object).collect())),
  }
}

fn kind_schema(kind: &FieldKind) -> Value {
  match kind {
    FieldKind::String => json!({ "type": "string" }),
    FieldKind::Integer => json!({ "type": "integer" }),
    FieldKind::Boolean => json!({ "type": "boolean" }),
    FieldKind::StringList => json!({ "type": "array", "items": { "type": "string" } }),
    FieldKind::Enum(allowed) => json!({ "type": "string", "enum": allowed }),
    FieldKind::Object(schema) => schema.object_schema(),
    FieldKind::ObjectList(schema) => schema.to_json_schema(),
  }
}

/// Four placeholder choices used when a multiple-choice record has none.
pub const PLACEHOLDER_OPTIONS: [&str; 4] = ["Option A", "Option B", "Option C", "Option D"];

pub fn placeholder_options() -> Value {
  json!(PLACEHOLDER_OPTIONS)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> RecordSchema {
    RecordSchema {
      name: "sample",
      wrappers: &["items", "data"],
      fields: vec![
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("options", FieldKind::StringList, placeholder_options()),
        FieldSpec::optional("kind", FieldKind::Enum(&["Reading", "Writing"]), json!("Reading")),
      ],
    }
  }

  #[test]
  fn shape_rules_in_order() {
    let arr = json!([1]);
    assert_eq!(unwrap_sequence(&arr, &["items"]), Shape::Sequence(&[json!(1)]));
    let wrapped = json!({ "data": [2], "items": "nope" });
    assert_eq!(unwrap_sequence(&wrapped, &["items", "data"]), Shape::Sequence(&[json!(2)]));
    assert!(matches!(unwrap_sequence(&json!({}), &["items"]), Shape::Invalid(_)));
    assert!(matches!(unwrap_sequence(&Value::Null, &["items"]), Shape::Invalid(_)));
    assert!(matches!(unwrap_sequence(&json!("x"), &["items"]), Shape::Invalid(_)));
  }

  #[test]
  fn optional_fields_get_defaults() {
    let out = sample().normalize_batch(&json!({ "items": [{ "name": "a" }] }));
    let Validated::Valid(recs) = out else { panic!("expected valid") };
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["options"], placeholder_options());
    assert_eq!(recs[0]["kind"], json!("Reading"));
  }

  #[test]
  fn records_missing_required_fields_are_dropped() {
    let out = sample().normalize_batch(&json!([{ "name": "a" }, { "options": [] }, 5]));
    let Validated::Valid(recs) = out else { panic!("expected valid") };
    assert_eq!(recs.len(), 1);
  }

  #[test]
  fn wrong_element_shape_invalidates_batch() {
    assert!(matches!(sample().normalize_batch(&json!([1, 2, 3])), Validated::Invalid(_)));
    assert_eq!(sample().normalize_batch(&json!([])), Validated::Valid(vec![]));
  }

  #[test]
  fn enum_values_are_canonicalized() {
    let out = sample().normalize_batch(&json!([{ "name": "a", "kind": "writing" }, { "name": "b", "kind": "Singing" }]));
    let Validated::Valid(recs) = out else { panic!("expected valid") };
    assert_eq!(recs[0]["kind"], json!("Writing"));
    assert_eq!(recs[1]["kind"], json!("Reading"));
  }

  #[test]
  fn json_schema_lists_required_and_enum() {
    let s = sample().to_json_schema();
    assert_eq!(s["type"], "array");
    assert_eq!(s["items"]["required"], json!(["name"]));
    assert_eq!(s["items"]["properties"]["kind"]["enum"], json!(["Reading", "Writing"]));
  }
}
