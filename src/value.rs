//! The PackStream value model.

/// Map entries as encoded on the wire.
///
/// A `Vec` of pairs rather than a hash map so that the producer's iteration
/// order is what gets encoded, and decoding preserves wire order end-to-end.
pub type Map = Vec<(String, Value)>;

/// A single PackStream value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    /// Signed 64-bit integer; narrower wire representations widen on decode.
    Integer(i64),
    /// IEEE-754 double, always 8 bytes on the wire.
    Float(f64),
    /// UTF-8 string.
    String(String),
    List(Vec<Value>),
    /// String-keyed map preserving insertion order.
    Map(Map),
    /// Tagged tuple with an 8-bit signature, e.g. the graph types.
    Structure(Structure),
}

/// A tagged tuple: 8-bit signature plus fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub signature: u8,
    pub fields: Vec<Value>,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

/// Look up a key in wire-ordered map entries.
pub fn map_get<'a>(entries: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    entries.iter().find_map(|(k, v)| (k == key).then_some(v))
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Map(v)
    }
}

impl From<Structure> for Value {
    fn from(v: Structure) -> Self {
        Self::Structure(v)
    }
}
