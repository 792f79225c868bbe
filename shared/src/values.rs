//! Named-field value readers and writers.
//!
//! Objects that need both network sync and persistence write themselves once
//! against [`ValueWriter`]. The bit-stream flavour ignores the names and packs
//! the values exactly like the wire codec; [`NamedValues`] keeps them as named
//! text fields for the persistence layer.

use crate::bits::{BitReader, BitWriter};
use crate::codec::MAX_STRING_LENGTH;
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub trait ValueWriter {
    fn write_bool(&mut self, name: &str, value: bool);
    fn write_u8(&mut self, name: &str, value: u8);
    fn write_u16(&mut self, name: &str, value: u16);
    fn write_i32(&mut self, name: &str, value: i32);
    fn write_u32(&mut self, name: &str, value: u32);
    fn write_f32(&mut self, name: &str, value: f32);
    fn write_string(&mut self, name: &str, value: &str);
}

pub trait ValueReader {
    fn read_bool(&mut self, name: &str) -> Result<bool, DecodeError>;
    fn read_u8(&mut self, name: &str) -> Result<u8, DecodeError>;
    fn read_u16(&mut self, name: &str) -> Result<u16, DecodeError>;
    fn read_i32(&mut self, name: &str) -> Result<i32, DecodeError>;
    fn read_u32(&mut self, name: &str) -> Result<u32, DecodeError>;
    fn read_f32(&mut self, name: &str) -> Result<f32, DecodeError>;
    fn read_string(&mut self, name: &str) -> Result<String, DecodeError>;
}

/// Writes named values straight into a bit stream.
pub struct BitValueWriter<'a> {
    writer: &'a mut BitWriter,
}

impl<'a> BitValueWriter<'a> {
    pub fn new(writer: &'a mut BitWriter) -> Self {
        Self { writer }
    }
}

impl ValueWriter for BitValueWriter<'_> {
    fn write_bool(&mut self, _name: &str, value: bool) {
        self.writer.write(&value);
    }

    fn write_u8(&mut self, _name: &str, value: u8) {
        self.writer.write(&value);
    }

    fn write_u16(&mut self, _name: &str, value: u16) {
        self.writer.write(&value);
    }

    fn write_i32(&mut self, _name: &str, value: i32) {
        self.writer.write(&value);
    }

    fn write_u32(&mut self, _name: &str, value: u32) {
        self.writer.write(&value);
    }

    fn write_f32(&mut self, _name: &str, value: f32) {
        self.writer.write(&value);
    }

    fn write_string(&mut self, _name: &str, value: &str) {
        self.writer.write_string(value);
    }
}

/// Reads named values from a bit stream, in the order they were written.
pub struct BitValueReader<'a, 'b> {
    reader: &'a mut BitReader<'b>,
}

impl<'a, 'b> BitValueReader<'a, 'b> {
    pub fn new(reader: &'a mut BitReader<'b>) -> Self {
        Self { reader }
    }
}

impl ValueReader for BitValueReader<'_, '_> {
    fn read_bool(&mut self, _name: &str) -> Result<bool, DecodeError> {
        self.reader.read()
    }

    fn read_u8(&mut self, _name: &str) -> Result<u8, DecodeError> {
        self.reader.read()
    }

    fn read_u16(&mut self, _name: &str) -> Result<u16, DecodeError> {
        self.reader.read()
    }

    fn read_i32(&mut self, _name: &str) -> Result<i32, DecodeError> {
        self.reader.read()
    }

    fn read_u32(&mut self, _name: &str) -> Result<u32, DecodeError> {
        self.reader.read()
    }

    fn read_f32(&mut self, _name: &str) -> Result<f32, DecodeError> {
        self.reader.read()
    }

    fn read_string(&mut self, _name: &str) -> Result<String, DecodeError> {
        self.reader.read_string(MAX_STRING_LENGTH)
    }
}

/// A record of named text fields, used by persistence and settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValues {
    values: BTreeMap<String, String>,
}

impl NamedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn put(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<T, DecodeError> {
        let text = self
            .get(name)
            .ok_or_else(|| DecodeError::MissingValue(name.to_string()))?;
        text.parse().map_err(|_| DecodeError::InvalidValue {
            name: name.to_string(),
            text: text.to_string(),
        })
    }
}

impl ValueWriter for NamedValues {
    fn write_bool(&mut self, name: &str, value: bool) {
        self.put(name, value.to_string());
    }

    fn write_u8(&mut self, name: &str, value: u8) {
        self.put(name, value.to_string());
    }

    fn write_u16(&mut self, name: &str, value: u16) {
        self.put(name, value.to_string());
    }

    fn write_i32(&mut self, name: &str, value: i32) {
        self.put(name, value.to_string());
    }

    fn write_u32(&mut self, name: &str, value: u32) {
        self.put(name, value.to_string());
    }

    // Display for floats is the shortest text that parses back to the same value.
    fn write_f32(&mut self, name: &str, value: f32) {
        self.put(name, value.to_string());
    }

    fn write_string(&mut self, name: &str, value: &str) {
        self.put(name, value.to_string());
    }
}

impl ValueReader for NamedValues {
    fn read_bool(&mut self, name: &str) -> Result<bool, DecodeError> {
        self.parse(name)
    }

    fn read_u8(&mut self, name: &str) -> Result<u8, DecodeError> {
        self.parse(name)
    }

    fn read_u16(&mut self, name: &str) -> Result<u16, DecodeError> {
        self.parse(name)
    }

    fn read_i32(&mut self, name: &str) -> Result<i32, DecodeError> {
        self.parse(name)
    }

    fn read_u32(&mut self, name: &str) -> Result<u32, DecodeError> {
        self.parse(name)
    }

    fn read_f32(&mut self, name: &str) -> Result<f32, DecodeError> {
        self.parse(name)
    }

    fn read_string(&mut self, name: &str) -> Result<String, DecodeError> {
        self.get(name)
            .map(str::to_string)
            .ok_or_else(|| DecodeError::MissingValue(name.to_string()))
    }
}
