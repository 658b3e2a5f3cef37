//! Sound events.
//!
//! An [`Event`] is the flat control dictionary one trigger carries: a source
//! selector plus any number of named numbers, strings and nested modulator
//! blocks. It is read-only while a voice is compiled from it.
//!
//! ```rust
//! use dough_engine::Event;
//!
//! let event = Event::from_json(r#"{"s": "saw", "note": "a4", "cutoff": 800}"#).unwrap();
//! assert_eq!(event.text("s").unwrap(), Some("saw"));
//! assert_eq!(event.note().unwrap(), Some(69.0));
//! assert_eq!(event.number("cutoff").unwrap(), Some(800.0));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SynthError;

/// One control value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    /// Flag.
    Bool(bool),
    /// Any number.
    Number(f64),
    /// A name (source, vowel, note name, ...).
    Text(String),
    /// List of values (channel lists, modulator blocks).
    List(Vec<ControlValue>),
    /// Nested record (modulator blocks and their params).
    Map(BTreeMap<String, ControlValue>),
}

impl ControlValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String value, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Nested record, if this is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, ControlValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "record",
        }
    }
}

impl From<f64> for ControlValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<f32> for ControlValue {
    fn from(v: f32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<i32> for ControlValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<bool> for ControlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ControlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ControlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<ControlValue>> for ControlValue {
    fn from(v: Vec<ControlValue>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, ControlValue>> for ControlValue {
    fn from(v: BTreeMap<String, ControlValue>) -> Self {
        Self::Map(v)
    }
}

impl From<Event> for ControlValue {
    fn from(event: Event) -> Self {
        Self::Map(event.controls)
    }
}

/// The control dictionary of one trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    controls: BTreeMap<String, ControlValue>,
}

impl Event {
    /// Empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<ControlValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a control.
    pub fn insert(&mut self, key: &str, value: impl Into<ControlValue>) {
        self.controls.insert(key.to_string(), value.into());
    }

    /// Parse a JSON object.
    pub fn from_json(json: &str) -> Result<Self, SynthError> {
        let value: ControlValue = serde_json::from_str(json)
            .map_err(|e| SynthError::MalformedEvent(format!("invalid JSON: {e}")))?;
        Self::try_from(value)
    }

    /// Raw control value.
    pub fn get(&self, key: &str) -> Option<&ControlValue> {
        self.controls.get(key)
    }

    /// True if the control is present.
    pub fn has(&self, key: &str) -> bool {
        self.controls.contains_key(key)
    }

    /// Control names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.controls.keys().map(String::as_str)
    }

    /// All controls.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ControlValue)> {
        self.controls.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Numeric control. Present but non-numeric is malformed; numeric strings are accepted.
    pub fn number(&self, key: &str) -> Result<Option<f64>, SynthError> {
        match self.controls.get(key) {
            None => Ok(None),
            Some(ControlValue::Number(n)) if n.is_finite() => Ok(Some(*n)),
            Some(ControlValue::Bool(b)) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Some(ControlValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Some)
                .ok_or_else(|| mistyped(key, "number", self.controls.get(key))),
            other => Err(mistyped(key, "number", other)),
        }
    }

    /// Numeric control as `f32`.
    pub fn number_f32(&self, key: &str) -> Result<Option<f32>, SynthError> {
        Ok(self.number(key)?.map(|n| n as f32))
    }

    /// First present numeric control among `keys` (aliases).
    pub fn first_number(&self, keys: &[&str]) -> Result<Option<f64>, SynthError> {
        for key in keys {
            if let Some(n) = self.number(key)? {
                return Ok(Some(n));
            }
        }
        Ok(None)
    }

    /// Numeric control with a default.
    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, SynthError> {
        Ok(self.number(key)?.unwrap_or(default))
    }

    /// Text control. Present but not a string is malformed.
    pub fn text(&self, key: &str) -> Result<Option<&str>, SynthError> {
        match self.controls.get(key) {
            None => Ok(None),
            Some(ControlValue::Text(s)) => Ok(Some(s)),
            other => Err(mistyped(key, "string", other)),
        }
    }

    /// Boolean control; numbers count as true when non-zero.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, SynthError> {
        match self.controls.get(key) {
            None => Ok(None),
            Some(ControlValue::Bool(b)) => Ok(Some(*b)),
            Some(ControlValue::Number(n)) => Ok(Some(*n != 0.0)),
            other => Err(mistyped(key, "bool", other)),
        }
    }

    /// The `note` control as a MIDI number, accepting names like `"c3"` or `"eb4"`.
    pub fn note(&self) -> Result<Option<f64>, SynthError> {
        match self.controls.get("note") {
            None => Ok(None),
            Some(ControlValue::Number(n)) => Ok(Some(*n)),
            Some(ControlValue::Text(name)) => note_to_midi(name)
                .map(Some)
                .ok_or_else(|| SynthError::MalformedEvent(format!("'{name}' is not a note name"))),
            other => Err(mistyped("note", "number or note name", other)),
        }
    }
}

impl TryFrom<ControlValue> for Event {
    type Error = SynthError;

    fn try_from(value: ControlValue) -> Result<Self, Self::Error> {
        match value {
            ControlValue::Map(controls) => Ok(Self { controls }),
            other => Err(SynthError::MalformedEvent(format!(
                "expected a record of controls, got a {}",
                other.type_name()
            ))),
        }
    }
}

impl FromIterator<(String, ControlValue)> for Event {
    fn from_iter<I: IntoIterator<Item = (String, ControlValue)>>(iter: I) -> Self {
        Self {
            controls: iter.into_iter().collect(),
        }
    }
}

fn mistyped(key: &str, expected: &str, found: Option<&ControlValue>) -> SynthError {
    let found = found.map_or("nothing", ControlValue::type_name);
    SynthError::MalformedEvent(format!("control '{key}' should be a {expected}, got a {found}"))
}

/// Convert a note name (`c3`, `a#4`, `eb`, `fs2`) to a MIDI number.
///
/// Octave defaults to 3; `c3` is 48.
///
/// ```rust
/// use dough_engine::note_to_midi;
///
/// assert_eq!(note_to_midi("c3"), Some(48.0));
/// assert_eq!(note_to_midi("a4"), Some(69.0));
/// assert_eq!(note_to_midi("Eb"), Some(51.0));
/// assert_eq!(note_to_midi("h2"), None);
/// ```
pub fn note_to_midi(name: &str) -> Option<f64> {
    let lower = name.trim().to_ascii_lowercase();
    let mut chars = lower.chars().peekable();
    let chroma = match chars.next()? {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let mut accidental = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '#' | 's' => accidental += 1,
            'b' | 'f' => accidental -= 1,
            _ => break,
        }
        chars.next();
    }
    let rest: String = chars.collect();
    let octave = if rest.is_empty() {
        3
    } else {
        rest.parse::<i32>().ok()?
    };
    Some(f64::from((octave + 1) * 12 + chroma + accidental))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_record_is_malformed() {
        assert!(matches!(
            Event::try_from(ControlValue::Number(3.0)),
            Err(SynthError::MalformedEvent(_))
        ));
        assert!(Event::from_json("[1, 2]").is_err());
        assert!(Event::from_json("{\"s\": \"sine\"}").is_ok());
    }

    #[test]
    fn test_number_type_checks() {
        let event = Event::new()
            .with("gain", 0.5)
            .with("pan", "0.25")
            .with("cutoff", "bright");
        assert_eq!(event.number("gain").unwrap(), Some(0.5));
        assert_eq!(event.number("pan").unwrap(), Some(0.25));
        assert_eq!(event.number("missing").unwrap(), None);
        assert!(event.number("cutoff").is_err());
        assert!(event.text("gain").is_err());
    }

    #[test]
    fn test_aliases_take_first_present() {
        let event = Event::new().with("lpf", 300.0);
        assert_eq!(event.first_number(&["cutoff", "lpf"]).unwrap(), Some(300.0));
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_to_midi("c3"), Some(48.0));
        assert_eq!(note_to_midi("C#3"), Some(49.0));
        assert_eq!(note_to_midi("cs3"), Some(49.0));
        assert_eq!(note_to_midi("bb2"), Some(46.0));
        assert_eq!(note_to_midi("c-1"), Some(0.0));
        assert_eq!(note_to_midi(""), None);
        assert_eq!(note_to_midi("c3x"), None);
        let event = Event::new().with("note", "zz");
        assert!(event.note().is_err());
    }

    #[test]
    fn test_json_nested_blocks() {
        let event = Event::from_json(
            r#"{"s": "saw", "lfo": [{"id": "a", "params": {"control": "cutoff", "rate": 2}}]}"#,
        )
        .unwrap();
        let Some(ControlValue::List(blocks)) = event.get("lfo") else {
            panic!("lfo should be a list");
        };
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].as_map().is_some());
    }
}
