//! Loosely typed field values and ordered documents.
//!
//! On the wire every field is just text after `key: `. Decoding is tolerant:
//! a value is reinterpreted as a number or a nested document only when it
//! unambiguously is one, otherwise it stays text. The exact rule lives on
//! [`Value::parse`] because a string that looks numeric is indistinguishable
//! from a numeric field, so the rule must be the same on every peer.
//!
//! Reinterpretation never loses the original text: an `Int` is canonical by
//! construction, and a parsed `Document` remembers the exact bytes it came
//! from, so a text field that happens to look like JSON reads back unchanged.

use serde_json::{Map, Number, Value as Json};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A signed integer in canonical decimal form.
    Int(i64),
    /// Anything that is not an integer or a document.
    Text(String),
    /// A nested sub-document, written on the wire as a one-line JSON object.
    Document(Document),
}

impl Value {
    /// Reinterprets a raw wire value.
    ///
    /// The rule, applied in order:
    ///
    /// 1. `Int` if the text parses as an `i64` **and** formatting that
    ///    number gives back exactly the same text. `"42"` and `"-3"` become
    ///    numbers; `"007"`, `"+5"` and `" 5"` stay text.
    /// 2. `Document` if the text starts with `{` and parses as a JSON
    ///    object. Inside it, integer numbers become `Int`, strings become
    ///    `Text`, objects become `Document`, and anything else (floats,
    ///    booleans, arrays, null) becomes `Text` holding its JSON rendering.
    /// 3. `Text` otherwise, byte-for-byte.
    ///
    /// A document produced by rule 2 keeps `raw`, so [`as_text`](Self::as_text)
    /// and [`render`](Self::render) give back exactly what was received.
    pub fn parse(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            if n.to_string() == raw {
                return Self::Int(n);
            }
        }
        if raw.starts_with('{') {
            if let Ok(Json::Object(map)) = serde_json::from_str::<Json>(raw) {
                let mut doc = Document::from_json(map);
                doc.source = Some(raw.to_string());
                return Self::Document(doc);
            }
        }
        Self::Text(raw.to_string())
    }

    /// Renders the value as it appears after `key: ` on the wire.
    ///
    /// Line breaks inside text would split the field, so they are written
    /// as spaces.
    pub fn render(&self) -> Result<String, ProtocolError> {
        match self {
            Self::Int(n) => Ok(n.to_string()),
            Self::Text(s) => Ok(s.replace(['\r', '\n'], " ")),
            Self::Document(doc) => match &doc.source {
                Some(raw) => Ok(raw.clone()),
                None => serde_json::to_string(&doc.to_json())
                    .map_err(|e| ProtocolError::Encode(e.to_string())),
            },
        }
    }

    /// Returns the value as text. Numbers render in canonical form and
    /// documents read from the wire give back their original text, so a
    /// string that looks like a number or a JSON object survives a round
    /// trip. A document built in code renders as compact JSON.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Int(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Document(doc) => match &doc.source {
                Some(raw) => Some(raw.clone()),
                None => serde_json::to_string(&doc.to_json()).ok(),
            },
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the nested document, if this is one.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    fn from_json(json: Json) -> Self {
        match json {
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Text(n.to_string()),
            },
            Json::String(s) => Self::Text(s),
            Json::Object(map) => Self::Document(Document::from_json(map)),
            other => Self::Text(other.to_string()),
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Self::Int(n) => Json::Number(Number::from(*n)),
            Self::Text(s) => Json::String(s.clone()),
            Self::Document(doc) => doc.to_json(),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An ordered list of `key: value` fields.
///
/// Order matters only for presentation (it is preserved from the wire and
/// used when encoding); lookups are by key. Inserting an existing key
/// replaces its value in place, so a key appears at most once.
///
/// Equality compares fields only, not the wire text a document was read from.
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: Vec<(String, Value)>,
    /// Wire text this document was parsed from; cleared by any mutation.
    source: Option<String>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Document {}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.source = None;
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a field by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Removes a field and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        self.source = None;
        Some(self.fields.remove(idx).1)
    }

    /// Iterates over fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Appends every field of `other`, replacing duplicates.
    pub fn extend(&mut self, other: Document) {
        for (k, v) in other.fields {
            self.insert(k, v);
        }
    }

    // -- Typed extraction used by the message layer -----------------------

    pub(crate) fn take_text(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let value = self.remove(field).ok_or(ProtocolError::missing(field))?;
        value
            .as_text()
            .ok_or_else(|| ProtocolError::invalid(field, "document is not representable as text"))
    }

    pub(crate) fn take_text_opt(
        &mut self,
        field: &'static str,
    ) -> Result<Option<String>, ProtocolError> {
        match self.get(field) {
            None => Ok(None),
            Some(_) => self.take_text(field).map(Some),
        }
    }

    pub(crate) fn take_u64(&mut self, field: &'static str) -> Result<u64, ProtocolError> {
        let value = self.remove(field).ok_or(ProtocolError::missing(field))?;
        value
            .as_int()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| ProtocolError::invalid(field, "expected a non-negative integer"))
    }

    pub(crate) fn take_u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        let n = self.take_u64(field)?;
        u32::try_from(n).map_err(|_| ProtocolError::invalid(field, "out of range"))
    }

    pub(crate) fn take_u32_opt(
        &mut self,
        field: &'static str,
    ) -> Result<Option<u32>, ProtocolError> {
        match self.get(field) {
            None => Ok(None),
            Some(_) => self.take_u32(field).map(Some),
        }
    }

    pub(crate) fn take_document(
        &mut self,
        field: &'static str,
    ) -> Result<Document, ProtocolError> {
        match self.remove(field) {
            Some(Value::Document(doc)) => Ok(doc),
            Some(_) => Err(ProtocolError::invalid(field, "expected a nested document")),
            None => Err(ProtocolError::missing(field)),
        }
    }

    // -- JSON bridge for nested documents ---------------------------------

    fn from_json(map: Map<String, Json>) -> Self {
        let fields = map
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect();
        Self {
            fields,
            source: None,
        }
    }

    fn to_json(&self) -> Json {
        let map: Map<String, Json> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Json::Object(map)
    }
}
