//! Versioned binary persistence for a finished [`Index`].
//!
//! The stream starts with a magic marker and a format version, followed by a
//! deduplicated string table and the class records, which reference strings
//! by table position. Decoding re-interns every string into a fresh session
//! and rebuilds the reverse-lookup structures through the same aggregation
//! path as [`Indexer::complete`], so a reloaded index answers queries exactly
//! like the one that was written.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::annotation::{AnnotationInstance, AnnotationTarget, AnnotationValue, MAX_DEPTH};
use crate::error::FormatError;
use crate::index::{ClassInfo, FieldInfo, Index, Indexer, MethodInfo};
use crate::name::{Interner, Name};
use crate::reader::ByteReader;

/// Marker prefix of a persisted index stream.
pub const INDEX_MAGIC: u32 = 0xBABE_1F15;
/// Newest format version this build can decode.
pub const INDEX_VERSION: u8 = 1;

// Value tags of the persisted annotation element tree.
const VALUE_BYTE: u8 = 0;
const VALUE_CHAR: u8 = 1;
const VALUE_SHORT: u8 = 2;
const VALUE_INT: u8 = 3;
const VALUE_LONG: u8 = 4;
const VALUE_FLOAT: u8 = 5;
const VALUE_DOUBLE: u8 = 6;
const VALUE_BOOLEAN: u8 = 7;
const VALUE_STRING: u8 = 8;
const VALUE_ENUM: u8 = 9;
const VALUE_CLASS: u8 = 10;
const VALUE_NESTED: u8 = 11;
const VALUE_ARRAY: u8 = 12;

// Target tags.
const TARGET_CLASS: u8 = 0;
const TARGET_FIELD: u8 = 1;
const TARGET_METHOD: u8 = 2;
const TARGET_METHOD_PARAMETER: u8 = 3;

/// Serialize the index into a self-contained byte stream.
pub fn encode(index: &Index) -> Vec<u8> {
    let mut encoder = Encoder::default();
    encoder.put_u32(index.classes.len() as u32);
    for class in &index.classes {
        encoder.put_class(class);
    }

    let Encoder { strings, body, .. } = encoder;
    let mut out = Vec::with_capacity(body.len() + strings.iter().map(String::len).sum::<usize>());
    out.extend_from_slice(&INDEX_MAGIC.to_be_bytes());
    out.push(INDEX_VERSION);
    out.extend_from_slice(&(strings.len() as u32).to_be_bytes());
    for string in &strings {
        out.extend_from_slice(&(string.len() as u32).to_be_bytes());
        out.extend_from_slice(string.as_bytes());
    }
    out.extend_from_slice(&body);
    out
}

/// Serialize the index to a writer.
pub fn write_to<W: Write>(index: &Index, writer: &mut W) -> Result<(), FormatError> {
    writer.write_all(&encode(index))?;
    Ok(())
}

/// Reconstruct an index from a persisted stream.
///
/// Any inconsistency rejects the whole stream; a partially decoded index is
/// never returned.
pub fn decode(data: &[u8]) -> Result<Index, FormatError> {
    let mut reader = ByteReader::new(data);
    if reader.read_u32()? != INDEX_MAGIC {
        return Err(FormatError::BadIndexMagic);
    }
    let version = reader.read_u8()?;
    if version != INDEX_VERSION {
        return Err(FormatError::UnsupportedIndexVersion { version });
    }

    let mut interner = Interner::new();
    let string_count = reader.read_u32()? as usize;
    // Each entry needs at least its length prefix.
    if string_count > reader.remaining() / 4 {
        return Err(FormatError::Corrupt {
            offset: reader.offset(),
            reason: "string table count exceeds stream size",
        });
    }
    let mut strings = Vec::with_capacity(string_count);
    for _ in 0..string_count {
        let len = reader.read_u32()? as usize;
        let offset = reader.offset();
        let bytes = reader.read_slice(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| FormatError::Corrupt {
            offset,
            reason: "string table entry is not UTF-8",
        })?;
        strings.push(interner.intern(text));
    }

    let decoder = Decoder { strings };
    let class_count = reader.read_u32()? as usize;
    if class_count > reader.remaining() {
        return Err(FormatError::Corrupt {
            offset: reader.offset(),
            reason: "class count exceeds stream size",
        });
    }
    let mut indexer = Indexer::new();
    for _ in 0..class_count {
        let class = decoder.read_class(&mut reader)?;
        indexer.index_class(class);
    }
    if !reader.is_empty() {
        return Err(FormatError::Corrupt {
            offset: reader.offset(),
            reason: "trailing bytes after index data",
        });
    }
    Ok(indexer.complete())
}

/// Reconstruct an index from a reader.
pub fn read_from<R: Read>(reader: &mut R) -> Result<Index, FormatError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode(&data)
}

#[derive(Default)]
struct Encoder {
    strings: Vec<String>,
    lookup: HashMap<String, u32>,
    body: Vec<u8>,
}

impl Encoder {
    // Table positions are 1-based; 0 encodes "absent".
    fn string(&mut self, text: &str) -> u32 {
        if let Some(&position) = self.lookup.get(text) {
            return position;
        }
        self.strings.push(text.to_string());
        let position = self.strings.len() as u32;
        self.lookup.insert(text.to_string(), position);
        position
    }

    fn put_u8(&mut self, value: u8) {
        self.body.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.body.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.body.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.body.extend_from_slice(&value.to_be_bytes());
    }

    fn put_name(&mut self, name: &Name) {
        let position = self.string(name.as_str());
        self.put_u32(position);
    }

    fn put_opt_name(&mut self, name: Option<&Name>) {
        match name {
            Some(name) => self.put_name(name),
            None => self.put_u32(0),
        }
    }

    fn put_class(&mut self, class: &ClassInfo) {
        self.put_name(&class.name);
        self.put_opt_name(class.super_name.as_ref());
        self.put_u16(class.flags);
        self.put_u16(class.interfaces.len() as u16);
        for interface in &class.interfaces {
            self.put_name(interface);
        }
        self.put_opt_name(class.signature.as_ref());
        self.put_annotations(&class.annotations);
        self.put_u16(class.fields.len() as u16);
        for field in &class.fields {
            self.put_field(field);
        }
        self.put_u16(class.methods.len() as u16);
        for method in &class.methods {
            self.put_method(method);
        }
    }

    fn put_field(&mut self, field: &FieldInfo) {
        self.put_name(&field.name);
        self.put_name(&field.descriptor);
        self.put_name(&field.type_name);
        self.put_u16(field.flags);
        self.put_opt_name(field.signature.as_ref());
        self.put_annotations(&field.annotations);
    }

    fn put_method(&mut self, method: &MethodInfo) {
        self.put_name(&method.name);
        self.put_name(&method.descriptor);
        self.put_u16(method.flags);
        self.put_u16(method.parameters.len() as u16);
        for parameter in &method.parameters {
            self.put_name(parameter);
        }
        self.put_name(&method.return_type);
        self.put_u16(method.exceptions.len() as u16);
        for exception in &method.exceptions {
            self.put_name(exception);
        }
        self.put_opt_name(method.signature.as_ref());
        self.put_annotations(&method.annotations);
    }

    fn put_annotations(&mut self, annotations: &[Arc<AnnotationInstance>]) {
        self.put_u16(annotations.len() as u16);
        for instance in annotations {
            self.put_annotation(instance);
        }
    }

    fn put_annotation(&mut self, instance: &AnnotationInstance) {
        self.put_name(instance.name());
        self.put_target(instance.target());
        self.put_u16(instance.values().len() as u16);
        for (element, value) in instance.values() {
            self.put_name(element);
            self.put_value(value);
        }
    }

    fn put_target(&mut self, target: &AnnotationTarget) {
        match target {
            AnnotationTarget::Class(class) => {
                self.put_u8(TARGET_CLASS);
                self.put_name(class);
            }
            AnnotationTarget::Field { class, field } => {
                self.put_u8(TARGET_FIELD);
                self.put_name(class);
                self.put_name(field);
            }
            AnnotationTarget::Method {
                class,
                method,
                descriptor,
            } => {
                self.put_u8(TARGET_METHOD);
                self.put_name(class);
                self.put_name(method);
                self.put_name(descriptor);
            }
            AnnotationTarget::MethodParameter {
                class,
                method,
                descriptor,
                position,
            } => {
                self.put_u8(TARGET_METHOD_PARAMETER);
                self.put_name(class);
                self.put_name(method);
                self.put_name(descriptor);
                self.put_u8(*position);
            }
        }
    }

    fn put_value(&mut self, value: &AnnotationValue) {
        match value {
            AnnotationValue::Byte(v) => {
                self.put_u8(VALUE_BYTE);
                self.put_u8(*v as u8);
            }
            AnnotationValue::Char(v) => {
                self.put_u8(VALUE_CHAR);
                self.put_u16(*v);
            }
            AnnotationValue::Short(v) => {
                self.put_u8(VALUE_SHORT);
                self.put_u16(*v as u16);
            }
            AnnotationValue::Int(v) => {
                self.put_u8(VALUE_INT);
                self.put_u32(*v as u32);
            }
            AnnotationValue::Long(v) => {
                self.put_u8(VALUE_LONG);
                self.put_u64(*v as u64);
            }
            AnnotationValue::Float(v) => {
                self.put_u8(VALUE_FLOAT);
                self.put_u32(v.to_bits());
            }
            AnnotationValue::Double(v) => {
                self.put_u8(VALUE_DOUBLE);
                self.put_u64(v.to_bits());
            }
            AnnotationValue::Boolean(v) => {
                self.put_u8(VALUE_BOOLEAN);
                self.put_u8(u8::from(*v));
            }
            AnnotationValue::String(v) => {
                self.put_u8(VALUE_STRING);
                let position = self.string(v);
                self.put_u32(position);
            }
            AnnotationValue::Enum {
                type_name,
                const_name,
            } => {
                self.put_u8(VALUE_ENUM);
                self.put_name(type_name);
                self.put_name(const_name);
            }
            AnnotationValue::Class(name) => {
                self.put_u8(VALUE_CLASS);
                self.put_name(name);
            }
            AnnotationValue::Nested(instance) => {
                self.put_u8(VALUE_NESTED);
                self.put_annotation(instance);
            }
            AnnotationValue::Array(items) => {
                self.put_u8(VALUE_ARRAY);
                self.put_u16(items.len() as u16);
                for item in items {
                    self.put_value(item);
                }
            }
        }
    }
}

struct Decoder {
    strings: Vec<Name>,
}

impl Decoder {
    fn name(&self, reader: &mut ByteReader<'_>) -> Result<Name, FormatError> {
        let offset = reader.offset();
        let position = reader.read_u32()?;
        match self.opt_lookup(position, offset)? {
            Some(name) => Ok(name),
            None => Err(FormatError::Corrupt {
                offset,
                reason: "string position zero where a name is required",
            }),
        }
    }

    fn opt_name(&self, reader: &mut ByteReader<'_>) -> Result<Option<Name>, FormatError> {
        let offset = reader.offset();
        let position = reader.read_u32()?;
        self.opt_lookup(position, offset)
    }

    fn opt_lookup(&self, position: u32, offset: usize) -> Result<Option<Name>, FormatError> {
        if position == 0 {
            return Ok(None);
        }
        match self.strings.get(position as usize - 1) {
            Some(name) => Ok(Some(name.clone())),
            None => Err(FormatError::Corrupt {
                offset,
                reason: "string position out of range",
            }),
        }
    }

    fn read_class(&self, reader: &mut ByteReader<'_>) -> Result<ClassInfo, FormatError> {
        let name = self.name(reader)?;
        let super_name = self.opt_name(reader)?;
        let flags = reader.read_u16()?;
        let interface_count = reader.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(self.name(reader)?);
        }
        let signature = self.opt_name(reader)?;
        let annotations = self.read_annotations(reader)?;
        let field_count = reader.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(self.read_field(reader, &name)?);
        }
        let method_count = reader.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(self.read_method(reader, &name)?);
        }
        Ok(ClassInfo {
            name,
            super_name,
            interfaces,
            flags,
            signature,
            fields,
            methods,
            annotations,
        })
    }

    fn read_field(
        &self,
        reader: &mut ByteReader<'_>,
        class: &Name,
    ) -> Result<FieldInfo, FormatError> {
        let name = self.name(reader)?;
        let descriptor = self.name(reader)?;
        let type_name = self.name(reader)?;
        let flags = reader.read_u16()?;
        let signature = self.opt_name(reader)?;
        let annotations = self.read_annotations(reader)?;
        Ok(FieldInfo {
            class: class.clone(),
            name,
            descriptor,
            type_name,
            flags,
            signature,
            annotations,
        })
    }

    fn read_method(
        &self,
        reader: &mut ByteReader<'_>,
        class: &Name,
    ) -> Result<MethodInfo, FormatError> {
        let name = self.name(reader)?;
        let descriptor = self.name(reader)?;
        let flags = reader.read_u16()?;
        let parameter_count = reader.read_u16()?;
        let mut parameters = Vec::with_capacity(parameter_count as usize);
        for _ in 0..parameter_count {
            parameters.push(self.name(reader)?);
        }
        let return_type = self.name(reader)?;
        let exception_count = reader.read_u16()?;
        let mut exceptions = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            exceptions.push(self.name(reader)?);
        }
        let signature = self.opt_name(reader)?;
        let annotations = self.read_annotations(reader)?;
        Ok(MethodInfo {
            class: class.clone(),
            name,
            descriptor,
            flags,
            parameters,
            return_type,
            exceptions,
            signature,
            annotations,
        })
    }

    fn read_annotations(
        &self,
        reader: &mut ByteReader<'_>,
    ) -> Result<Vec<Arc<AnnotationInstance>>, FormatError> {
        let count = reader.read_u16()?;
        let mut annotations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            annotations.push(Arc::new(self.read_annotation(reader, 0)?));
        }
        Ok(annotations)
    }

    // Nested values recurse with the same depth cap as the class-file side;
    // a corrupted stream must fail the decode, not exhaust the stack.
    fn read_annotation(
        &self,
        reader: &mut ByteReader<'_>,
        depth: u32,
    ) -> Result<AnnotationInstance, FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::NestingTooDeep);
        }
        let name = self.name(reader)?;
        let target = self.read_target(reader)?;
        let count = reader.read_u16()?;
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let element = self.name(reader)?;
            let value = self.read_value(reader, depth + 1)?;
            values.push((element, value));
        }
        Ok(AnnotationInstance::new(name, values, target))
    }

    fn read_target(&self, reader: &mut ByteReader<'_>) -> Result<AnnotationTarget, FormatError> {
        let offset = reader.offset();
        let tag = reader.read_u8()?;
        let target = match tag {
            TARGET_CLASS => AnnotationTarget::Class(self.name(reader)?),
            TARGET_FIELD => AnnotationTarget::Field {
                class: self.name(reader)?,
                field: self.name(reader)?,
            },
            TARGET_METHOD => AnnotationTarget::Method {
                class: self.name(reader)?,
                method: self.name(reader)?,
                descriptor: self.name(reader)?,
            },
            TARGET_METHOD_PARAMETER => AnnotationTarget::MethodParameter {
                class: self.name(reader)?,
                method: self.name(reader)?,
                descriptor: self.name(reader)?,
                position: reader.read_u8()?,
            },
            _ => {
                return Err(FormatError::Corrupt {
                    offset,
                    reason: "unknown annotation target tag",
                });
            }
        };
        Ok(target)
    }

    fn read_value(
        &self,
        reader: &mut ByteReader<'_>,
        depth: u32,
    ) -> Result<AnnotationValue, FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::NestingTooDeep);
        }
        let offset = reader.offset();
        let tag = reader.read_u8()?;
        let value = match tag {
            VALUE_BYTE => AnnotationValue::Byte(reader.read_u8()? as i8),
            VALUE_CHAR => AnnotationValue::Char(reader.read_u16()?),
            VALUE_SHORT => AnnotationValue::Short(reader.read_u16()? as i16),
            VALUE_INT => AnnotationValue::Int(reader.read_u32()? as i32),
            VALUE_LONG => AnnotationValue::Long(reader.read_u64()? as i64),
            VALUE_FLOAT => AnnotationValue::Float(f32::from_bits(reader.read_u32()?)),
            VALUE_DOUBLE => AnnotationValue::Double(f64::from_bits(reader.read_u64()?)),
            VALUE_BOOLEAN => AnnotationValue::Boolean(reader.read_u8()? != 0),
            VALUE_STRING => AnnotationValue::String(self.name(reader)?.as_str().to_string()),
            VALUE_ENUM => AnnotationValue::Enum {
                type_name: self.name(reader)?,
                const_name: self.name(reader)?,
            },
            VALUE_CLASS => AnnotationValue::Class(self.name(reader)?),
            VALUE_NESTED => {
                AnnotationValue::Nested(Box::new(self.read_annotation(reader, depth + 1)?))
            }
            VALUE_ARRAY => {
                let count = reader.read_u16()?;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(self.read_value(reader, depth + 1)?);
                }
                AnnotationValue::Array(items)
            }
            _ => {
                return Err(FormatError::Corrupt {
                    offset,
                    reason: "unknown annotation value tag",
                });
            }
        };
        Ok(value)
    }
}
