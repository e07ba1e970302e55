//! Parameter schemas, resolution and validation.
//!
//! Each scheduler declares an ordered list of [`ParameterSpec`]s plus a set of
//! [`CrossFieldRule`]s. User-supplied values are overlaid on the schema
//! defaults to produce [`ResolvedParameters`], which are then validated
//! before any external command runs.

use std::fmt;

use regex::Regex;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{SchedError, SchedResult};

/// A parameter value: either an integer or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Text(String),
}

impl ParamValue {
    /// Text form used for format matching and script rendering.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Convert a JSON value supplied by a user.
    fn from_json(name: &str, value: &Value) -> SchedResult<Self> {
        match value {
            Value::String(s) => Ok(ParamValue::Text(s.clone())),
            Value::Number(n) => Ok(n
                .as_i64()
                .map_or_else(|| ParamValue::Text(n.to_string()), ParamValue::Int)),
            Value::Bool(b) => Ok(ParamValue::Text(b.to_string())),
            other => Err(SchedError::Validation(format!(
                "parameter '{name}' must be a string or a number, got {other}"
            ))),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// An anchored regular-expression format rule.
#[derive(Debug, Clone)]
pub struct FormatRule {
    pattern: String,
    regex: Regex,
}

impl FormatRule {
    /// Compile a format rule. The pattern must match the whole value.
    pub fn new(pattern: &str) -> SchedResult<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| SchedError::Config(format!("bad format pattern '{pattern}': {e}")))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as declared.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `value` satisfies this rule.
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Declaration of one scheduler parameter.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub default: ParamValue,
    /// `None` means the value is passed through unchecked.
    pub format: Option<FormatRule>,
}

impl ParameterSpec {
    /// Create a spec without a format rule.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<ParamValue>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: default.into(),
            format: None,
        }
    }

    /// Attach a format rule.
    pub fn with_format(mut self, pattern: &str) -> SchedResult<Self> {
        self.format = Some(FormatRule::new(pattern)?);
        Ok(self)
    }

    fn check(&self, value: &ParamValue) -> SchedResult<()> {
        let Some(format) = &self.format else {
            return Ok(());
        };
        let text = value.to_text();
        if format.is_match(&text) {
            Ok(())
        } else {
            Err(SchedError::Validation(format!(
                "parameter '{}' = '{}' does not match format ^{}$",
                self.name,
                text,
                format.pattern()
            )))
        }
    }
}

impl Serialize for ParameterSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ParameterSpec", 3)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("default", &self.default)?;
        s.serialize_field("format", &self.format.as_ref().map(FormatRule::pattern))?;
        s.end()
    }
}

type RuleCheck = dyn Fn(&ResolvedParameters) -> Result<(), String> + Send + Sync;

/// A scheduler-specific predicate spanning several parameters.
pub struct CrossFieldRule {
    name: &'static str,
    check: Box<RuleCheck>,
}

impl CrossFieldRule {
    /// Create a rule. `check` returns a message naming the conflict on failure.
    pub fn new(
        name: &'static str,
        check: impl Fn(&ResolvedParameters) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            check: Box::new(check),
        }
    }

    /// Short rule identifier.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for CrossFieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossFieldRule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered parameter declarations and cross-field rules of one scheduler.
#[derive(Debug, Default)]
pub struct ParameterSchema {
    specs: Vec<ParameterSpec>,
    rules: Vec<CrossFieldRule>,
}

impl ParameterSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter declaration.
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Append a cross-field rule.
    pub fn rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Declarations in order.
    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    /// Look up a declaration by name.
    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Schema defaults with nothing overlaid.
    pub fn defaults(&self) -> ResolvedParameters {
        ResolvedParameters {
            values: self
                .specs
                .iter()
                .map(|s| (s.name.clone(), s.default.clone()))
                .collect(),
        }
    }

    /// Overlay user-supplied values onto the defaults.
    ///
    /// Names not declared by the schema are rejected.
    pub fn resolve(&self, supplied: &serde_json::Map<String, Value>) -> SchedResult<ResolvedParameters> {
        if let Some(unknown) = supplied.keys().find(|k| self.get(k).is_none()) {
            let known: Vec<&str> = self.specs.iter().map(|s| s.name.as_str()).collect();
            return Err(SchedError::Validation(format!(
                "unknown parameter '{unknown}' (known: {})",
                known.join(", ")
            )));
        }

        let mut resolved = self.defaults();
        for (name, value) in &mut resolved.values {
            if let Some(given) = supplied.get(name.as_str()) {
                *value = ParamValue::from_json(name, given)?;
            }
        }
        Ok(resolved)
    }

    /// Check every format rule, then every cross-field rule.
    pub fn validate(&self, resolved: &ResolvedParameters) -> SchedResult<()> {
        for spec in &self.specs {
            let value = resolved.get(&spec.name).ok_or_else(|| {
                SchedError::Validation(format!("missing parameter '{}'", spec.name))
            })?;
            spec.check(value)?;
        }

        for rule in &self.rules {
            (rule.check)(resolved).map_err(|msg| {
                SchedError::Validation(format!("rule '{}' violated: {msg}", rule.name))
            })?;
        }
        Ok(())
    }
}

impl Serialize for ParameterSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.specs.len()))?;
        for spec in &self.specs {
            map.serialize_entry(&spec.name, spec)?;
        }
        map.end()
    }
}

/// Concrete parameter values in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedParameters {
    values: Vec<(String, ParamValue)>,
}

impl ResolvedParameters {
    /// Value of a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Text of a parameter, or a validation error if it is missing.
    pub fn text(&self, name: &str) -> SchedResult<String> {
        self.get(name)
            .map(ParamValue::to_text)
            .ok_or_else(|| SchedError::Validation(format!("missing parameter '{name}'")))
    }

    /// Parameter parsed as an integer.
    pub fn int(&self, name: &str) -> SchedResult<i64> {
        let text = self.text(name)?;
        text.trim().parse().map_err(|_| {
            SchedError::Validation(format!("parameter '{name}' = '{text}' is not an integer"))
        })
    }

    /// Name/value pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for ResolvedParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ParameterSchema {
        ParameterSchema::new()
            .param(ParameterSpec::new("label", "free text", "job"))
            .param(
                ParameterSpec::new("procs", "process count", 1)
                    .with_format(r"[1-9]\d*")
                    .unwrap(),
            )
            .param(
                ParameterSpec::new("threads", "thread count", 1)
                    .with_format(r"[1-9]\d*")
                    .unwrap(),
            )
            .rule(CrossFieldRule::new("core-budget", |p| {
                let procs = p.int("procs").map_err(|e| e.to_string())?;
                let threads = p.int("threads").map_err(|e| e.to_string())?;
                if procs * threads <= 8 {
                    Ok(())
                } else {
                    Err(format!("procs ({procs}) times threads ({threads}) exceeds 8"))
                }
            }))
    }

    fn supplied(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_resolve_overlays_defaults_in_order() {
        let schema = schema();
        let resolved = schema.resolve(&supplied(json!({"threads": 2}))).unwrap();
        let pairs: Vec<(&str, String)> = resolved.iter().map(|(n, v)| (n, v.to_text())).collect();
        assert_eq!(
            pairs,
            vec![
                ("label", "job".to_string()),
                ("procs", "1".to_string()),
                ("threads", "2".to_string()),
            ]
        );
        assert!(schema.validate(&resolved).is_ok());
    }

    #[test]
    fn test_resolve_rejects_unknown_parameter() {
        let err = schema()
            .resolve(&supplied(json!({"gpus": 4})))
            .unwrap_err();
        assert!(err.to_string().contains("unknown parameter 'gpus'"));
    }

    #[test]
    fn test_resolve_rejects_structured_values() {
        let err = schema()
            .resolve(&supplied(json!({"label": ["a", "b"]})))
            .unwrap_err();
        assert!(matches!(err, SchedError::Validation(_)));
    }

    #[test]
    fn test_format_is_anchored() {
        let schema = schema();
        for bad in ["0", "x3", "3x", " 3", "-1"] {
            let resolved = schema.resolve(&supplied(json!({"procs": bad}))).unwrap();
            let err = schema.validate(&resolved).unwrap_err();
            assert!(
                err.to_string().contains("parameter 'procs'"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn test_no_format_is_pass_through() {
        let schema = schema();
        let resolved = schema
            .resolve(&supplied(json!({"label": "anything at all; even $weird"})))
            .unwrap();
        assert!(schema.validate(&resolved).is_ok());
    }

    #[test]
    fn test_cross_field_rule_names_values() {
        let schema = schema();
        let resolved = schema
            .resolve(&supplied(json!({"procs": 4, "threads": 3})))
            .unwrap();
        let msg = schema.validate(&resolved).unwrap_err().to_string();
        assert!(msg.contains("core-budget"));
        assert!(msg.contains("procs (4) times threads (3)"));
    }

    #[test]
    fn test_schema_serializes_in_order() {
        let json = serde_json::to_string(&schema()).unwrap();
        assert!(json.starts_with(r#"{"label":{"description":"free text","default":"job","format":null}"#));
        assert!(json.contains(r#""procs":{"description":"process count","default":1,"format":"[1-9]\\d*"}"#));
    }

    #[test]
    fn test_int_values_keep_their_type() {
        let resolved = schema().resolve(&supplied(json!({"procs": 3}))).unwrap();
        assert_eq!(resolved.get("procs"), Some(&ParamValue::Int(3)));
        assert_eq!(
            serde_json::to_value(&resolved).unwrap(),
            json!({"label": "job", "procs": 3, "threads": 1})
        );
    }
}
