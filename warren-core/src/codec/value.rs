//! AMQP field values, field tables and declared argument domains.
//!
//! Method arguments carry a declared [`Domain`] from the revision's
//! method table; field tables carry a one-octet type tag per value.
//! There is no implicit coercion between the two: a value must match
//! its declared domain exactly.

use std::fmt;

use bytes::Bytes;

// ── Domain ───────────────────────────────────────────────────────

/// Declared type of a method argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Unsigned 8-bit integer.
    Octet,
    /// Unsigned 16-bit integer.
    Short,
    /// Unsigned 32-bit integer.
    Long,
    /// Unsigned 64-bit integer.
    LongLong,
    /// Boolean packed into a shared octet with its neighbours.
    Bit,
    /// UTF-8 string with an 8-bit length prefix (≤ 255 bytes).
    ShortStr,
    /// Opaque bytes with a 32-bit length prefix.
    LongStr,
    /// 64-bit seconds since the epoch.
    Timestamp,
    /// Size-prefixed field table.
    Table,
}

impl Domain {
    /// The value used when an optional argument is omitted.
    pub fn zero(self) -> FieldValue {
        match self {
            Domain::Octet => FieldValue::ShortShortUInt(0),
            Domain::Short => FieldValue::ShortUInt(0),
            Domain::Long => FieldValue::LongUInt(0),
            Domain::LongLong => FieldValue::LongLongUInt(0),
            Domain::Bit => FieldValue::Boolean(false),
            Domain::ShortStr => FieldValue::ShortString(String::new()),
            Domain::LongStr => FieldValue::LongString(Bytes::new()),
            Domain::Timestamp => FieldValue::Timestamp(0),
            Domain::Table => FieldValue::Table(FieldTable::new()),
        }
    }

    /// Whether `value` is the variant this domain is encoded from.
    pub fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Domain::Octet, FieldValue::ShortShortUInt(_))
                | (Domain::Short, FieldValue::ShortUInt(_))
                | (Domain::Long, FieldValue::LongUInt(_))
                | (Domain::LongLong, FieldValue::LongLongUInt(_))
                | (Domain::Bit, FieldValue::Boolean(_))
                | (Domain::ShortStr, FieldValue::ShortString(_))
                | (Domain::LongStr, FieldValue::LongString(_))
                | (Domain::Timestamp, FieldValue::Timestamp(_))
                | (Domain::Table, FieldValue::Table(_))
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Octet => "octet",
            Domain::Short => "short",
            Domain::Long => "long",
            Domain::LongLong => "longlong",
            Domain::Bit => "bit",
            Domain::ShortStr => "shortstr",
            Domain::LongStr => "longstr",
            Domain::Timestamp => "timestamp",
            Domain::Table => "table",
        };
        f.write_str(name)
    }
}

// ── Decimal ──────────────────────────────────────────────────────

/// Signed decimal: `value * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub scale: u8,
    pub value: i32,
}

impl Decimal {
    pub fn new(scale: u8, value: i32) -> Self {
        Self { scale, value }
    }
}

// ── FieldValue ───────────────────────────────────────────────────

/// A typed AMQP value.
///
/// Table tags follow the 0-9-1 errata used by RabbitMQ. `ShortString`
/// only appears as a method argument; it has no table tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Boolean(bool),
    ShortShortInt(i8),
    ShortShortUInt(u8),
    ShortInt(i16),
    ShortUInt(u16),
    LongInt(i32),
    LongUInt(u32),
    LongLongInt(i64),
    LongLongUInt(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    ShortString(String),
    LongString(Bytes),
    Array(Vec<FieldValue>),
    Timestamp(u64),
    Table(FieldTable),
    ByteArray(Bytes),
    Void,
}

impl FieldValue {
    /// Table type tag for this value, if it may appear inside a table.
    pub fn tag(&self) -> Option<u8> {
        let tag = match self {
            FieldValue::Boolean(_) => b't',
            FieldValue::ShortShortInt(_) => b'b',
            FieldValue::ShortShortUInt(_) => b'B',
            FieldValue::ShortInt(_) => b's',
            FieldValue::ShortUInt(_) => b'u',
            FieldValue::LongInt(_) => b'I',
            FieldValue::LongUInt(_) => b'i',
            FieldValue::LongLongInt(_) => b'l',
            FieldValue::LongLongUInt(_) => b'L',
            FieldValue::Float(_) => b'f',
            FieldValue::Double(_) => b'd',
            FieldValue::Decimal(_) => b'D',
            FieldValue::LongString(_) => b'S',
            FieldValue::Array(_) => b'A',
            FieldValue::Timestamp(_) => b'T',
            FieldValue::Table(_) => b'F',
            FieldValue::ByteArray(_) => b'x',
            FieldValue::Void => b'V',
            FieldValue::ShortString(_) => return None,
        };
        Some(tag)
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Boolean(_) => "boolean",
            FieldValue::ShortShortInt(_) => "short-short-int",
            FieldValue::ShortShortUInt(_) => "octet",
            FieldValue::ShortInt(_) => "short-int",
            FieldValue::ShortUInt(_) => "short",
            FieldValue::LongInt(_) => "long-int",
            FieldValue::LongUInt(_) => "long",
            FieldValue::LongLongInt(_) => "longlong-int",
            FieldValue::LongLongUInt(_) => "longlong",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::ShortString(_) => "shortstr",
            FieldValue::LongString(_) => "longstr",
            FieldValue::Array(_) => "array",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Table(_) => "table",
            FieldValue::ByteArray(_) => "byte-array",
            FieldValue::Void => "void",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Any unsigned integer variant, widened.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::ShortShortUInt(v) => Some(u64::from(*v)),
            FieldValue::ShortUInt(v) => Some(u64::from(*v)),
            FieldValue::LongUInt(v) => Some(u64::from(*v)),
            FieldValue::LongLongUInt(v) | FieldValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::ShortString(s) => Some(s),
            FieldValue::LongString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::LongString(b) | FieldValue::ByteArray(b) => Some(b),
            FieldValue::ShortString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            FieldValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// A long string from UTF-8 text.
    pub fn long_string(s: impl Into<String>) -> Self {
        FieldValue::LongString(Bytes::from(s.into()))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::ShortShortUInt(v)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::ShortUInt(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::LongUInt(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::LongLongUInt(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::ShortString(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::ShortString(v)
    }
}

impl From<FieldTable> for FieldValue {
    fn from(v: FieldTable) -> Self {
        FieldValue::Table(v)
    }
}

// ── FieldTable ───────────────────────────────────────────────────

/// Ordered mapping from short-string keys to typed values.
///
/// Insertion order is the wire order. Inserting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTable {
    entries: Vec<(String, FieldValue)>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, FieldValue)> for FieldTable {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut table = FieldTable::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}
