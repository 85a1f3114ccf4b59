//! Report data values.
//!
//! [`Value`] is the sum of everything a template expression can produce or a
//! caller can feed the engine: scalars, nested mappings, sequences, and the
//! opaque artifact descriptors consumed by the `IMAGE` and `LINK` commands.

use std::collections::HashMap;
use std::fmt;

use hashlink::LinkedHashMap;

/// Image file extensions accepted by the `IMAGE` command.
pub const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".gif", ".jpg", ".jpeg", ".svg"];

/// A value in the report data or produced by expression evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / null.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered sequence.
    List(Vec<Value>),
    /// A nested mapping.
    Map(HashMap<String, Value>),
    /// Parameters for an `IMAGE` command.
    Image(ImagePars),
    /// Parameters for a `LINK` command.
    Link(LinkPars),
}

impl Value {
    /// Truthiness used by `IF`: null, `false`, the empty string and the
    /// empty sequence are falsy; everything else (including `0`) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Numeric coercion used by the comparison operators: integers, floats
    /// and parseable strings are numbers, nothing else is.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Default stringification, used by `INS` and `${...}` interpolation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            // Mappings and artifact descriptors have no sensible inline text.
            Value::Map(_) | Value::Image(_) | Value::Link(_) => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// The data a report is generated from: a mapping of top-level keys to
/// (possibly nested) values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportData(pub HashMap<String, Value>);

impl ReportData {
    /// Create empty report data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a top-level value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Build report data from a JSON object. Returns `None` if the JSON
    /// value is not an object.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match Value::from(json) {
            Value::Map(map) => Some(ReportData(map)),
            _ => None,
        }
    }
}

/// Parameters for an inline image, supplied by the caller via the data.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePars {
    /// File extension, one of [`IMAGE_EXTENSIONS`] (with the leading dot).
    pub extension: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Width in inches.
    pub width: f64,
    /// Height in inches.
    pub height: f64,
    /// Clockwise rotation in degrees.
    pub rotation: i64,
    /// Alternative text; defaults to "desc" when empty.
    pub alt: String,
    /// Caption appended below the image when non-empty.
    pub caption: String,
    /// Fallback raster rendition; only consulted for `.svg` images.
    pub thumbnail: Option<Image>,
}

impl ImagePars {
    /// Image parameters with the fields every image needs; the rest default
    /// to "absent".
    pub fn new(extension: impl Into<String>, data: Vec<u8>, width: f64, height: f64) -> Self {
        ImagePars {
            extension: extension.into(),
            data,
            width,
            height,
            rotation: 0,
            alt: String::new(),
            caption: String::new(),
            thumbnail: None,
        }
    }
}

/// An image registered in the sidecar table: extension plus bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub extension: String,
    pub data: Vec<u8>,
}

/// Parameters for a hyperlink, supplied by the caller via the data.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPars {
    /// Link target.
    pub url: String,
    /// Visible label; defaults to the url when empty.
    pub label: String,
}

/// A hyperlink registered in the sidecar table.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub url: String,
}

/// Sidecar table of generated images, keyed by relationship id.
pub type Images = LinkedHashMap<String, Image>;

/// Sidecar table of generated hyperlinks, keyed by relationship id.
pub type Links = LinkedHashMap<String, Link>;

/// Sidecar table of generated HTML chunks, keyed by relationship id.
pub type Htmls = LinkedHashMap<String, String>;
