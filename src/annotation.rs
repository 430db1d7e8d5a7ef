use crate::constant_pool::ConstantPool;
use crate::descriptor;
use crate::error::FormatError;
use crate::name::{Interner, Name};
use crate::reader::ByteReader;

// Arrays and nested annotations recurse; adversarial input could otherwise
// nest until the stack blows. The codec decoder enforces the same cap.
pub(crate) const MAX_DEPTH: u32 = 64;

/// Structural element an annotation is attached to.
///
/// Targets are interned keys, never links into the descriptor graph, so an
/// instance can be held by the index independently of the class it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationTarget {
    Class(Name),
    Field {
        class: Name,
        field: Name,
    },
    Method {
        class: Name,
        method: Name,
        descriptor: Name,
    },
    MethodParameter {
        class: Name,
        method: Name,
        descriptor: Name,
        position: u8,
    },
}

impl AnnotationTarget {
    /// Name of the class the annotated element belongs to.
    pub fn class(&self) -> &Name {
        match self {
            AnnotationTarget::Class(name) => name,
            AnnotationTarget::Field { class, .. } => class,
            AnnotationTarget::Method { class, .. } => class,
            AnnotationTarget::MethodParameter { class, .. } => class,
        }
    }
}

/// One decoded annotation element value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Byte(i8),
    /// UTF-16 code unit, as stored in the constant pool.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Enum {
        type_name: Name,
        const_name: Name,
    },
    Class(Name),
    Nested(Box<AnnotationInstance>),
    Array(Vec<AnnotationValue>),
}

/// A decoded annotation occurrence: type name, ordered element values, and
/// the element it targets. Element order matches the byte stream, which is
/// what queries and round trips must reproduce.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInstance {
    name: Name,
    values: Vec<(Name, AnnotationValue)>,
    target: AnnotationTarget,
}

impl AnnotationInstance {
    pub(crate) fn new(
        name: Name,
        values: Vec<(Name, AnnotationValue)>,
        target: AnnotationTarget,
    ) -> Self {
        Self {
            name,
            values,
            target,
        }
    }

    /// Annotation type name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Element values in declaration order.
    pub fn values(&self) -> &[(Name, AnnotationValue)] {
        &self.values
    }

    pub fn value(&self, element: &str) -> Option<&AnnotationValue> {
        self.values
            .iter()
            .find(|(name, _)| name.as_str() == element)
            .map(|(_, value)| value)
    }

    pub fn target(&self) -> &AnnotationTarget {
        &self.target
    }
}

/// Decode one `annotation` structure from an attribute body.
pub(crate) fn decode_annotation(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    interner: &mut Interner,
    target: &AnnotationTarget,
    depth: u32,
) -> Result<AnnotationInstance, FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::NestingTooDeep);
    }
    let type_index = reader.read_u16()?;
    let name = interner.intern(type_name_of(pool.utf8(type_index)?)?);

    let count = reader.read_u16()?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let element_index = reader.read_u16()?;
        let element = interner.intern(pool.utf8(element_index)?);
        let value = decode_value(reader, pool, interner, target, depth + 1)?;
        values.push((element, value));
    }
    Ok(AnnotationInstance::new(name, values, target.clone()))
}

/// Decode one `element_value` structure, recursing into arrays and nested
/// annotations.
pub(crate) fn decode_value(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    interner: &mut Interner,
    target: &AnnotationTarget,
    depth: u32,
) -> Result<AnnotationValue, FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::NestingTooDeep);
    }
    let tag = reader.read_u8()?;
    let value = match tag {
        b'B' => AnnotationValue::Byte(pool.integer(reader.read_u16()?)? as i8),
        b'C' => AnnotationValue::Char(pool.integer(reader.read_u16()?)? as u16),
        b'S' => AnnotationValue::Short(pool.integer(reader.read_u16()?)? as i16),
        b'I' => AnnotationValue::Int(pool.integer(reader.read_u16()?)?),
        b'Z' => AnnotationValue::Boolean(pool.integer(reader.read_u16()?)? != 0),
        b'J' => AnnotationValue::Long(pool.long(reader.read_u16()?)?),
        b'F' => AnnotationValue::Float(pool.float(reader.read_u16()?)?),
        b'D' => AnnotationValue::Double(pool.double(reader.read_u16()?)?),
        b's' => AnnotationValue::String(pool.utf8(reader.read_u16()?)?.to_string()),
        b'e' => {
            let type_name = interner.intern(type_name_of(pool.utf8(reader.read_u16()?)?)?);
            let const_name = interner.intern(pool.utf8(reader.read_u16()?)?);
            AnnotationValue::Enum {
                type_name,
                const_name,
            }
        }
        b'c' => {
            // Class literals carry a return descriptor, so void.class is legal.
            let descriptor = pool.utf8(reader.read_u16()?)?;
            AnnotationValue::Class(interner.intern(&descriptor::return_type(descriptor)?))
        }
        b'@' => AnnotationValue::Nested(Box::new(decode_annotation(
            reader,
            pool,
            interner,
            target,
            depth + 1,
        )?)),
        b'[' => {
            let len = reader.read_u16()?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(decode_value(reader, pool, interner, target, depth + 1)?);
            }
            AnnotationValue::Array(items)
        }
        other => return Err(FormatError::UnknownElementTag { tag: other }),
    };
    Ok(value)
}

/// Slash-form type name of a reference descriptor like `Lcom/example/Foo;`.
fn type_name_of(descriptor: &str) -> Result<&str, FormatError> {
    descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| FormatError::InvalidDescriptor(descriptor.to_string()))
}
