//! Byte buffer with independent read and write cursors.
//!
//! Writes append big-endian encodings to the end; reads consume from
//! the read cursor. Consecutive bits share one octet (up to eight, in
//! declaration order); any non-bit access closes the current bit octet.
//!
//! ## Encodings
//!
//! ```text
//! octet / short / long / longlong   u8 / u16 / u32 / u64, big-endian
//! shortstr                          len:u8  bytes
//! longstr                           len:u32 bytes
//! timestamp                         u64 seconds
//! decimal                           scale:u8 value:i32
//! table                             size:u32 (name:shortstr tag:u8 value)*
//! array                             size:u32 (tag:u8 value)*
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::value::{Decimal, Domain, FieldTable, FieldValue};
use crate::error::{AmqpError, Result};

/// Encoding/decoding buffer for AMQP values.
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    data: BytesMut,
    read_pos: usize,
    /// Octet being consumed bit by bit, and the next bit index.
    read_bits: Option<(u8, u8)>,
    /// Position of the octet being filled bit by bit, and the next bit index.
    write_bits: Option<(usize, u8)>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Total bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed by reads.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    // ── Declared-type entry points ───────────────────────────────

    /// Append `value` encoded as `domain`.
    ///
    /// Fails with `InvalidType` when the value is not the variant the
    /// domain is encoded from.
    pub fn write(&mut self, value: &FieldValue, domain: Domain) -> Result<()> {
        match (domain, value) {
            (Domain::Bit, FieldValue::Boolean(b)) => {
                self.write_bit(*b);
                Ok(())
            }
            (Domain::Octet, FieldValue::ShortShortUInt(v)) => {
                self.write_octet(*v);
                Ok(())
            }
            (Domain::Short, FieldValue::ShortUInt(v)) => {
                self.write_short(*v);
                Ok(())
            }
            (Domain::Long, FieldValue::LongUInt(v)) => {
                self.write_long(*v);
                Ok(())
            }
            (Domain::LongLong, FieldValue::LongLongUInt(v)) => {
                self.write_longlong(*v);
                Ok(())
            }
            (Domain::Timestamp, FieldValue::Timestamp(v)) => {
                self.write_timestamp(*v);
                Ok(())
            }
            (Domain::ShortStr, FieldValue::ShortString(s)) => self.write_shortstr(s),
            (Domain::LongStr, FieldValue::LongString(b)) => self.write_longstr(b),
            (Domain::Table, FieldValue::Table(t)) => self.write_table(t),
            (domain, value) => Err(AmqpError::InvalidType(format!(
                "cannot encode {} as {domain}",
                value.kind()
            ))),
        }
    }

    /// Consume one value of the declared `domain`.
    pub fn read(&mut self, domain: Domain) -> Result<FieldValue> {
        Ok(match domain {
            Domain::Bit => FieldValue::Boolean(self.read_bit()?),
            Domain::Octet => FieldValue::ShortShortUInt(self.read_octet()?),
            Domain::Short => FieldValue::ShortUInt(self.read_short()?),
            Domain::Long => FieldValue::LongUInt(self.read_long()?),
            Domain::LongLong => FieldValue::LongLongUInt(self.read_longlong()?),
            Domain::Timestamp => FieldValue::Timestamp(self.read_timestamp()?),
            Domain::ShortStr => FieldValue::ShortString(self.read_shortstr()?),
            Domain::LongStr => FieldValue::LongString(self.read_longstr()?),
            Domain::Table => FieldValue::Table(self.read_table()?),
        })
    }

    // ── Writers ──────────────────────────────────────────────────

    pub fn write_bit(&mut self, bit: bool) {
        match self.write_bits {
            Some((pos, idx)) if idx < 8 => {
                if bit {
                    self.data[pos] |= 1 << idx;
                }
                self.write_bits = Some((pos, idx + 1));
            }
            _ => {
                self.data.put_u8(u8::from(bit));
                self.write_bits = Some((self.data.len() - 1, 1));
            }
        }
    }

    pub fn write_octet(&mut self, v: u8) {
        self.write_bits = None;
        self.data.put_u8(v);
    }

    pub fn write_short(&mut self, v: u16) {
        self.write_bits = None;
        self.data.put_u16(v);
    }

    pub fn write_long(&mut self, v: u32) {
        self.write_bits = None;
        self.data.put_u32(v);
    }

    pub fn write_longlong(&mut self, v: u64) {
        self.write_bits = None;
        self.data.put_u64(v);
    }

    pub fn write_timestamp(&mut self, secs: u64) {
        self.write_longlong(secs);
    }

    pub fn write_decimal(&mut self, d: Decimal) {
        self.write_octet(d.scale);
        self.data.put_i32(d.value);
    }

    pub fn write_shortstr(&mut self, s: &str) -> Result<()> {
        let len = u8::try_from(s.len()).map_err(|_| {
            AmqpError::InvalidType(format!("shortstr of {} bytes exceeds 255", s.len()))
        })?;
        self.write_octet(len);
        self.data.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_longstr(&mut self, b: &[u8]) -> Result<()> {
        let len = u32::try_from(b.len())
            .map_err(|_| AmqpError::InvalidType(format!("longstr of {} bytes", b.len())))?;
        self.write_long(len);
        self.data.put_slice(b);
        Ok(())
    }

    pub fn write_table(&mut self, table: &FieldTable) -> Result<()> {
        let mut body = Buffer::new();
        for (key, value) in table.iter() {
            body.write_shortstr(key)?;
            body.write_field_value(value)?;
        }
        self.write_longstr(body.as_slice())
    }

    pub fn write_array(&mut self, values: &[FieldValue]) -> Result<()> {
        let mut body = Buffer::new();
        for value in values {
            body.write_field_value(value)?;
        }
        self.write_longstr(body.as_slice())
    }

    /// Tagged value as it appears inside tables and arrays.
    pub fn write_field_value(&mut self, value: &FieldValue) -> Result<()> {
        let tag = value.tag().ok_or_else(|| {
            AmqpError::InvalidType(format!("{} cannot appear in a field table", value.kind()))
        })?;
        self.write_octet(tag);
        match value {
            FieldValue::Boolean(b) => self.write_octet(u8::from(*b)),
            FieldValue::ShortShortInt(v) => self.data.put_i8(*v),
            FieldValue::ShortShortUInt(v) => self.data.put_u8(*v),
            FieldValue::ShortInt(v) => self.data.put_i16(*v),
            FieldValue::ShortUInt(v) => self.data.put_u16(*v),
            FieldValue::LongInt(v) => self.data.put_i32(*v),
            FieldValue::LongUInt(v) => self.data.put_u32(*v),
            FieldValue::LongLongInt(v) => self.data.put_i64(*v),
            FieldValue::LongLongUInt(v) => self.data.put_u64(*v),
            FieldValue::Float(v) => self.data.put_f32(*v),
            FieldValue::Double(v) => self.data.put_f64(*v),
            FieldValue::Decimal(d) => self.write_decimal(*d),
            FieldValue::LongString(b) | FieldValue::ByteArray(b) => self.write_longstr(b)?,
            FieldValue::Array(values) => self.write_array(values)?,
            FieldValue::Timestamp(v) => self.write_timestamp(*v),
            FieldValue::Table(t) => self.write_table(t)?,
            // shortstr has no tag and was rejected above
            FieldValue::Void | FieldValue::ShortString(_) => {}
        }
        Ok(())
    }

    /// Raw bytes, no length prefix.
    pub fn write_bytes(&mut self, b: &[u8]) {
        self.write_bits = None;
        self.data.put_slice(b);
    }

    // ── Readers ──────────────────────────────────────────────────

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.read_bits = None;
        let available = self.remaining();
        if n > available {
            return Err(AmqpError::BufferOverflow {
                needed: n,
                available,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..start + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        match self.read_bits {
            Some((octet, idx)) if idx < 8 => {
                self.read_bits = Some((octet, idx + 1));
                Ok(octet & (1 << idx) != 0)
            }
            _ => {
                let octet = self.read_octet()?;
                self.read_bits = Some((octet, 1));
                Ok(octet & 1 != 0)
            }
        }
    }

    pub fn read_octet(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_short(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_long(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_longlong(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_timestamp(&mut self) -> Result<u64> {
        self.read_longlong()
    }

    pub fn read_decimal(&mut self) -> Result<Decimal> {
        let scale = self.read_octet()?;
        let value = i32::from_be_bytes(self.take_array()?);
        Ok(Decimal { scale, value })
    }

    pub fn read_shortstr(&mut self) -> Result<String> {
        let len = self.read_octet()? as usize;
        let bytes = self.take(len)?.to_vec();
        Ok(String::from_utf8(bytes)?)
    }

    pub fn read_longstr(&mut self) -> Result<Bytes> {
        let len = self.read_long()? as usize;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    pub fn read_table(&mut self) -> Result<FieldTable> {
        let mut body = Buffer::from(self.read_longstr()?);
        let mut table = FieldTable::new();
        while body.remaining() > 0 {
            let key = body.read_shortstr()?;
            let value = body.read_field_value()?;
            table.insert(key, value);
        }
        Ok(table)
    }

    pub fn read_array(&mut self) -> Result<Vec<FieldValue>> {
        let mut body = Buffer::from(self.read_longstr()?);
        let mut values = Vec::new();
        while body.remaining() > 0 {
            values.push(body.read_field_value()?);
        }
        Ok(values)
    }

    pub fn read_field_value(&mut self) -> Result<FieldValue> {
        let tag = self.read_octet()?;
        Ok(match tag {
            b't' => FieldValue::Boolean(self.read_octet()? != 0),
            b'b' => FieldValue::ShortShortInt(i8::from_be_bytes(self.take_array()?)),
            b'B' => FieldValue::ShortShortUInt(self.read_octet()?),
            b's' => FieldValue::ShortInt(i16::from_be_bytes(self.take_array()?)),
            b'u' => FieldValue::ShortUInt(self.read_short()?),
            b'I' => FieldValue::LongInt(i32::from_be_bytes(self.take_array()?)),
            b'i' => FieldValue::LongUInt(self.read_long()?),
            b'l' => FieldValue::LongLongInt(i64::from_be_bytes(self.take_array()?)),
            b'L' => FieldValue::LongLongUInt(self.read_longlong()?),
            b'f' => FieldValue::Float(f32::from_be_bytes(self.take_array()?)),
            b'd' => FieldValue::Double(f64::from_be_bytes(self.take_array()?)),
            b'D' => FieldValue::Decimal(self.read_decimal()?),
            b'S' => FieldValue::LongString(self.read_longstr()?),
            b'x' => FieldValue::ByteArray(self.read_longstr()?),
            b'A' => FieldValue::Array(self.read_array()?),
            b'T' => FieldValue::Timestamp(self.read_timestamp()?),
            b'F' => FieldValue::Table(self.read_table()?),
            b'V' => FieldValue::Void,
            other => {
                return Err(AmqpError::InvalidType(format!(
                    "unknown field type tag {:?}",
                    other as char
                )));
            }
        })
    }

    /// Everything from the read cursor to the end.
    pub fn read_rest(&mut self) -> Bytes {
        let rest = Bytes::copy_from_slice(&self.data[self.read_pos..]);
        self.read_pos = self.data.len();
        self.read_bits = None;
        rest
    }
}

impl From<Bytes> for Buffer {
    fn from(bytes: Bytes) -> Self {
        Self::from(&bytes[..])
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            ..Self::default()
        }
    }
}
