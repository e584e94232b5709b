//! Parameter model for inbound payloads.
//!
//! Payloads are self-describing key/value documents (JSON). Each value is
//! held as a [`ParamValue`], and the typed accessors below coerce it with a
//! fixed, total set of rules: they never fail and fall back to the zero value
//! of the requested type.
//!
//! | accessor | `Number` | `String` | anything else |
//! |----------|----------|----------|---------------|
//! | `f64`    | as-is    | parsed, `0.0` on failure | `0.0` |
//! | `i64`    | `f64` truncated toward zero | same | `0` |
//! | `byte`   | low byte of the little-endian IEEE-754 bits of `f64` | same | `0` |
//! | `string` | shortest round-trip decimal | as-is | `""` |
//! | `bool`   | `false`  | `false`  | the boolean itself, else `false` |

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

/// A dynamically typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// Any number; the document format only carries doubles.
    Number(f64),
    /// A string.
    String(String),
    /// An array.
    List(Vec<ParamValue>),
    /// A nested object.
    Map(HashMap<String, ParamValue>),
}

impl ParamValue {
    /// Boolean view: only an actual boolean yields `true`.
    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Floating-point view.
    ///
    /// Numbers are returned directly and strings are parsed as a float
    /// literal. Parse failures and every other type yield `0.0`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::String(s) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Integer view: [`as_f64`](Self::as_f64) truncated toward zero.
    pub fn as_i64(&self) -> i64 {
        self.as_f64().trunc() as i64
    }

    /// Byte view.
    ///
    /// This is a bit-level decoding, not a numeric cast: the IEEE-754 bit
    /// pattern of [`as_f64`](Self::as_f64) is laid out little-endian and its
    /// first (least significant) byte is returned.
    pub fn as_byte(&self) -> u8 {
        self.as_f64().to_bits().to_le_bytes()[0]
    }

    /// String view.
    ///
    /// Strings are returned as-is, numbers use [`format_number`],
    /// everything else is empty.
    pub fn as_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            _ => String::new(),
        }
    }
}

/// Formats `n` with the shortest digits that round-trip, in `%g` layout.
///
/// Decimal exponents below -4 or from 6 up switch to exponent form with a
/// signed two-digit minimum exponent: `1e+06`, `1.23456789e+08`, `1e-05`.
/// Everything in between is plain: `123456`, `0.0001`, `3.5`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }

    let sci = format!("{n:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return n.to_string();
    };
    let exp: i32 = exp.parse().unwrap_or_default();
    if exp < -4 || exp >= 6 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
    } else {
        n.to_string()
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Decoded payload parameters, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params {
    values: HashMap<String, ParamValue>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a payload that must be a JSON object at the top level.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let map: HashMap<String, Value> = serde_json::from_slice(payload)?;
        Ok(map.into_iter().map(|(k, v)| (k, ParamValue::from(v))).collect())
    }

    /// Decodes a payload, yielding an empty set when it is not a JSON object.
    pub fn decode_lossy(payload: &[u8]) -> Self {
        Self::decode(payload).unwrap_or_else(|e| {
            trace!(error = %e, len = payload.len(), "Payload is not a key/value document");
            Self::default()
        })
    }

    /// Returns the raw value, if present.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// See [`ParamValue::as_bool`]; absent yields `false`.
    pub fn bool(&self, name: &str) -> bool {
        self.get(name).is_some_and(ParamValue::as_bool)
    }

    /// See [`ParamValue::as_f64`]; absent yields `0.0`.
    pub fn f64(&self, name: &str) -> f64 {
        self.get(name).map_or(0.0, ParamValue::as_f64)
    }

    /// See [`ParamValue::as_i64`]; absent yields `0`.
    pub fn i64(&self, name: &str) -> i64 {
        self.get(name).map_or(0, ParamValue::as_i64)
    }

    /// See [`ParamValue::as_byte`]; absent yields `0`.
    pub fn byte(&self, name: &str) -> u8 {
        self.get(name).map_or(0, ParamValue::as_byte)
    }

    /// See [`ParamValue::as_string`]; absent yields `""`.
    pub fn string(&self, name: &str) -> String {
        self.get(name).map(ParamValue::as_string).unwrap_or_default()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no parameters were decoded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
