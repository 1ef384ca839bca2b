//! Hand-written reader/writer for the tagged binary tree format (NBT).
//!
//! Everything is big-endian. The reader works over an in-memory slice and
//! bounds-checks every read; truncated input and unknown tag kinds are
//! fatal. Compounds preserve insertion order so that re-serializing a
//! parsed tree is byte-stable.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use std::io::{Cursor, Read, Write};

use crate::error::{Result, SchemError};

pub type Compound = IndexMap<String, Tag>;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn kind(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Tag::End => "End",
            Tag::Byte(_) => "Byte",
            Tag::Short(_) => "Short",
            Tag::Int(_) => "Int",
            Tag::Long(_) => "Long",
            Tag::Float(_) => "Float",
            Tag::Double(_) => "Double",
            Tag::ByteArray(_) => "ByteArray",
            Tag::String(_) => "String",
            Tag::List(_) => "List",
            Tag::Compound(_) => "Compound",
            Tag::IntArray(_) => "IntArray",
            Tag::LongArray(_) => "LongArray",
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    /// Widening view of any integral scalar tag.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Tag::Byte(v) => Some(*v as i64),
            Tag::Short(v) => Some(*v as i64),
            Tag::Int(v) => Some(*v as i64),
            Tag::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn int_array(&self) -> Option<&[i32]> {
        match self {
            Tag::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn long_array(&self) -> Option<&[i64]> {
        match self {
            Tag::LongArray(v) => Some(v),
            _ => None,
        }
    }
}

/// Parse a complete tagged tree from `data`.
///
/// A lone End kind at the root yields `Tag::End` (the "null" document).
/// The root name, if any, is discarded.
pub fn parse(data: &[u8]) -> Result<Tag> {
    let mut reader = Reader::new(data);
    let kind = reader.u8()?;
    if kind == 0 {
        return Ok(Tag::End);
    }
    reader.string()?; // root name
    read_payload(&mut reader, kind)
}

struct Reader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader {
            cur: Cursor::new(data),
        }
    }

    fn remaining(&self) -> usize {
        let data = *self.cur.get_ref();
        data.len().saturating_sub(self.cur.position() as usize)
    }

    fn truncated<T>(&self) -> Result<T> {
        Err(SchemError::MalformedContainer(format!(
            "unexpected end of data at offset {}",
            self.cur.position()
        )))
    }

    fn u8(&mut self) -> Result<u8> {
        match self.cur.read_u8() {
            Ok(v) => Ok(v),
            Err(_) => self.truncated(),
        }
    }

    fn i8(&mut self) -> Result<i8> {
        match self.cur.read_i8() {
            Ok(v) => Ok(v),
            Err(_) => self.truncated(),
        }
    }

    fn i16(&mut self) -> Result<i16> {
        match self.cur.read_i16::<BigEndian>() {
            Ok(v) => Ok(v),
            Err(_) => self.truncated(),
        }
    }

    fn i32(&mut self) -> Result<i32> {
        match self.cur.read_i32::<BigEndian>() {
            Ok(v) => Ok(v),
            Err(_) => self.truncated(),
        }
    }

    fn i64(&mut self) -> Result<i64> {
        match self.cur.read_i64::<BigEndian>() {
            Ok(v) => Ok(v),
            Err(_) => self.truncated(),
        }
    }

    fn f32(&mut self) -> Result<f32> {
        match self.cur.read_f32::<BigEndian>() {
            Ok(v) => Ok(v),
            Err(_) => self.truncated(),
        }
    }

    fn f64(&mut self) -> Result<f64> {
        match self.cur.read_f64::<BigEndian>() {
            Ok(v) => Ok(v),
            Err(_) => self.truncated(),
        }
    }

    /// Validated element count for a length-prefixed payload. Rejects
    /// negative lengths and lengths that cannot fit in the remaining
    /// bytes at `elem_size` each.
    fn length(&mut self, elem_size: usize) -> Result<usize> {
        let raw = self.i32()?;
        if raw < 0 {
            return Err(SchemError::MalformedContainer(format!(
                "negative length {raw}"
            )));
        }
        let len = raw as usize;
        if len.saturating_mul(elem_size) > self.remaining() {
            return self.truncated();
        }
        Ok(len)
    }

    fn take(&mut self, len: usize) -> Result<Vec<u8>> {
        if len > self.remaining() {
            return self.truncated();
        }
        let mut buf = vec![0u8; len];
        self.cur
            .read_exact(&mut buf)
            .map_err(|e| SchemError::MalformedContainer(e.to_string()))?;
        Ok(buf)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.i16()? as u16 as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes)
            .map_err(|e| SchemError::MalformedContainer(format!("invalid UTF-8 string: {e}")))
    }
}

fn read_payload(reader: &mut Reader, kind: u8) -> Result<Tag> {
    match kind {
        0 => Ok(Tag::End),
        1 => Ok(Tag::Byte(reader.i8()?)),
        2 => Ok(Tag::Short(reader.i16()?)),
        3 => Ok(Tag::Int(reader.i32()?)),
        4 => Ok(Tag::Long(reader.i64()?)),
        5 => Ok(Tag::Float(reader.f32()?)),
        6 => Ok(Tag::Double(reader.f64()?)),
        7 => {
            let len = reader.length(1)?;
            let bytes = reader.take(len)?;
            Ok(Tag::ByteArray(bytes.into_iter().map(|b| b as i8).collect()))
        }
        8 => Ok(Tag::String(reader.string()?)),
        9 => {
            let child_kind = reader.u8()?;
            let len = reader.length(if child_kind == 0 { 0 } else { 1 })?;
            let mut list = Vec::with_capacity(len.min(reader.remaining()));
            for _ in 0..len {
                list.push(read_payload(reader, child_kind)?);
            }
            Ok(Tag::List(list))
        }
        10 => {
            let mut compound = Compound::new();
            loop {
                let child_kind = reader.u8()?;
                if child_kind == 0 {
                    break;
                }
                let name = reader.string()?;
                let tag = read_payload(reader, child_kind)?;
                compound.insert(name, tag);
            }
            Ok(Tag::Compound(compound))
        }
        11 => {
            let len = reader.length(4)?;
            let mut ints = Vec::with_capacity(len);
            for _ in 0..len {
                ints.push(reader.i32()?);
            }
            Ok(Tag::IntArray(ints))
        }
        12 => {
            let len = reader.length(8)?;
            let mut longs = Vec::with_capacity(len);
            for _ in 0..len {
                longs.push(reader.i64()?);
            }
            Ok(Tag::LongArray(longs))
        }
        other => Err(SchemError::MalformedContainer(format!(
            "unknown tag kind {other}"
        ))),
    }
}

impl Tag {
    /// Serialize this tag as a named root. Used when synthesizing
    /// schematics; the reader does not depend on it.
    pub fn write<W: Write>(&self, writer: &mut W, name: &str) -> std::io::Result<()> {
        writer.write_u8(self.kind())?;
        if !matches!(self, Tag::End) {
            writer.write_u16::<BigEndian>(name.len() as u16)?;
            writer.write_all(name.as_bytes())?;
        }
        self.write_payload(writer)
    }

    fn write_payload<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Tag::End => Ok(()),
            Tag::Byte(v) => writer.write_i8(*v),
            Tag::Short(v) => writer.write_i16::<BigEndian>(*v),
            Tag::Int(v) => writer.write_i32::<BigEndian>(*v),
            Tag::Long(v) => writer.write_i64::<BigEndian>(*v),
            Tag::Float(v) => writer.write_f32::<BigEndian>(*v),
            Tag::Double(v) => writer.write_f64::<BigEndian>(*v),
            Tag::ByteArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &b in v {
                    writer.write_i8(b)?;
                }
                Ok(())
            }
            Tag::String(v) => {
                writer.write_u16::<BigEndian>(v.len() as u16)?;
                writer.write_all(v.as_bytes())
            }
            Tag::List(v) => {
                let child_kind = v.first().map(Tag::kind).unwrap_or(0);
                writer.write_u8(child_kind)?;
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for tag in v {
                    tag.write_payload(writer)?;
                }
                Ok(())
            }
            Tag::Compound(v) => {
                for (name, tag) in v {
                    tag.write(writer, name)?;
                }
                writer.write_u8(0)
            }
            Tag::IntArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &i in v {
                    writer.write_i32::<BigEndian>(i)?;
                }
                Ok(())
            }
            Tag::LongArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &l in v {
                    writer.write_i64::<BigEndian>(l)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(tag: Tag) -> Tag {
        let mut buf = Vec::new();
        tag.write(&mut buf, "root").unwrap();
        parse(&buf).unwrap()
    }

    #[test]
    fn scalar_roundtrip() {
        assert_eq!(roundtrip(Tag::Byte(-5)), Tag::Byte(-5));
        assert_eq!(roundtrip(Tag::Short(1234)), Tag::Short(1234));
        assert_eq!(roundtrip(Tag::Int(-12345678)), Tag::Int(-12345678));
        assert_eq!(roundtrip(Tag::Long(123456789012)), Tag::Long(123456789012));
        assert_eq!(roundtrip(Tag::Float(3.5)), Tag::Float(3.5));
        assert_eq!(roundtrip(Tag::Double(-0.25)), Tag::Double(-0.25));
    }

    #[test]
    fn array_roundtrip() {
        assert_eq!(
            roundtrip(Tag::ByteArray(vec![1, -2, 3])),
            Tag::ByteArray(vec![1, -2, 3])
        );
        assert_eq!(
            roundtrip(Tag::IntArray(vec![1, -2, 3])),
            Tag::IntArray(vec![1, -2, 3])
        );
        assert_eq!(
            roundtrip(Tag::LongArray(vec![i64::MIN, 0, i64::MAX])),
            Tag::LongArray(vec![i64::MIN, 0, i64::MAX])
        );
    }

    #[test]
    fn compound_roundtrip_preserves_order() {
        let mut compound = Compound::new();
        compound.insert("zebra".to_string(), Tag::Int(1));
        compound.insert("apple".to_string(), Tag::String("x".to_string()));
        compound.insert(
            "list".to_string(),
            Tag::List(vec![Tag::Int(1), Tag::Int(2)]),
        );
        let tag = Tag::Compound(compound);

        let parsed = roundtrip(tag.clone());
        assert_eq!(parsed, tag);
        let keys: Vec<&str> = parsed
            .as_compound()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["zebra", "apple", "list"]);
    }

    #[test]
    fn end_at_root_is_null() {
        assert_eq!(parse(&[0]).unwrap(), Tag::End);
    }

    #[test]
    fn unknown_kind_is_fatal() {
        // kind 13, empty name
        let err = parse(&[13, 0, 0]).unwrap_err();
        assert!(matches!(err, SchemError::MalformedContainer(_)));
    }

    #[test]
    fn truncated_payload_is_fatal() {
        // Int tag named "a" with only two payload bytes
        let err = parse(&[3, 0, 1, b'a', 0, 0]).unwrap_err();
        assert!(matches!(err, SchemError::MalformedContainer(_)));
    }

    #[test]
    fn negative_array_length_is_fatal() {
        // ByteArray named "a" with length -1
        let err = parse(&[7, 0, 1, b'a', 0xFF, 0xFF, 0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, SchemError::MalformedContainer(_)));
    }

    #[test]
    fn oversized_length_is_fatal() {
        // IntArray claiming 1000 elements with no payload
        let err = parse(&[11, 0, 1, b'a', 0, 0, 3, 0xE8]).unwrap_err();
        assert!(matches!(err, SchemError::MalformedContainer(_)));
    }
}
