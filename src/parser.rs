use std::sync::Arc;

use tracing::debug;

use crate::annotation::{self, AnnotationInstance, AnnotationTarget};
use crate::constant_pool::ConstantPool;
use crate::descriptor;
use crate::error::FormatError;
use crate::index::{ClassInfo, FieldInfo, MethodInfo};
use crate::name::{Interner, Name};
use crate::reader::ByteReader;

const MAGIC: u32 = 0xCAFE_BABE;
// JDK 1.0 through the newest release we have verified the attribute layout
// against.
const MIN_MAJOR: u16 = 45;
const MAX_MAJOR: u16 = 69;

/// Attribute names the parser decodes structurally. Everything else is
/// skipped over its declared length; unknown attributes are a
/// forward-compatibility case, not an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AttrKind {
    VisibleAnnotations,
    InvisibleAnnotations,
    VisibleParameterAnnotations,
    InvisibleParameterAnnotations,
    Exceptions,
    Signature,
    Unknown,
}

impl AttrKind {
    fn of(name: &str) -> Self {
        match name {
            "RuntimeVisibleAnnotations" => AttrKind::VisibleAnnotations,
            "RuntimeInvisibleAnnotations" => AttrKind::InvisibleAnnotations,
            "RuntimeVisibleParameterAnnotations" => AttrKind::VisibleParameterAnnotations,
            "RuntimeInvisibleParameterAnnotations" => AttrKind::InvisibleParameterAnnotations,
            "Exceptions" => AttrKind::Exceptions,
            "Signature" => AttrKind::Signature,
            _ => AttrKind::Unknown,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AttrKind::VisibleAnnotations => "RuntimeVisibleAnnotations",
            AttrKind::InvisibleAnnotations => "RuntimeInvisibleAnnotations",
            AttrKind::VisibleParameterAnnotations => "RuntimeVisibleParameterAnnotations",
            AttrKind::InvisibleParameterAnnotations => "RuntimeInvisibleParameterAnnotations",
            AttrKind::Exceptions => "Exceptions",
            AttrKind::Signature => "Signature",
            AttrKind::Unknown => "Unknown",
        }
    }
}

/// Parse the full byte stream of one class file into a [`ClassInfo`].
///
/// Names are canonicalized through the given interner; pass the same interner
/// for every class of one index-build session.
pub fn parse_class(data: &[u8], interner: &mut Interner) -> Result<ClassInfo, FormatError> {
    let mut reader = ByteReader::new(data);
    if reader.read_u32()? != MAGIC {
        return Err(FormatError::InvalidMagic);
    }
    let minor = reader.read_u16()?;
    let major = reader.read_u16()?;
    if !(MIN_MAJOR..=MAX_MAJOR).contains(&major) {
        return Err(FormatError::UnsupportedVersion { major, minor });
    }

    let mut pool = ConstantPool::parse(&mut reader)?;
    let flags = reader.read_u16()?;
    let this_class = reader.read_u16()?;
    let super_class = reader.read_u16()?;
    let name = pool.class_name(this_class, interner)?;
    let super_name = if super_class == 0 {
        None
    } else {
        Some(pool.class_name(super_class, interner)?)
    };

    let interface_count = reader.read_u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        let index = reader.read_u16()?;
        interfaces.push(pool.class_name(index, interner)?);
    }

    let field_count = reader.read_u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(parse_field(&mut reader, &mut pool, interner, &name)?);
    }

    let method_count = reader.read_u16()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(parse_method(&mut reader, &mut pool, interner, &name)?);
    }

    let mut annotations = Vec::new();
    let mut signature = None;
    let target = AnnotationTarget::Class(name.clone());
    let attribute_count = reader.read_u16()?;
    for _ in 0..attribute_count {
        let (kind, mut body) = read_attribute(&mut reader, &pool)?;
        match kind {
            AttrKind::VisibleAnnotations | AttrKind::InvisibleAnnotations => {
                decode_annotation_list(&mut body, &pool, interner, &target, &mut annotations)?;
                expect_consumed(&body, kind)?;
            }
            AttrKind::Signature => {
                signature = Some(read_signature(&mut body, &pool, interner, kind)?);
            }
            _ => {}
        }
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

fn parse_field(
    reader: &mut ByteReader<'_>,
    pool: &mut ConstantPool,
    interner: &mut Interner,
    class_name: &Name,
) -> Result<FieldInfo, FormatError> {
    let flags = reader.read_u16()?;
    let name = interner.intern(pool.utf8(reader.read_u16()?)?);
    let descriptor = interner.intern(pool.utf8(reader.read_u16()?)?);
    let type_name = interner.intern(&descriptor::field_type(descriptor.as_str())?);

    let target = AnnotationTarget::Field {
        class: class_name.clone(),
        field: name.clone(),
    };
    let mut annotations = Vec::new();
    let mut signature = None;
    let attribute_count = reader.read_u16()?;
    for _ in 0..attribute_count {
        let (kind, mut body) = read_attribute(reader, pool)?;
        match kind {
            AttrKind::VisibleAnnotations | AttrKind::InvisibleAnnotations => {
                decode_annotation_list(&mut body, pool, interner, &target, &mut annotations)?;
                expect_consumed(&body, kind)?;
            }
            AttrKind::Signature => {
                signature = Some(read_signature(&mut body, pool, interner, kind)?);
            }
            _ => {}
        }
    }

    Ok(FieldInfo {
        class: class_name.clone(),
        name,
        descriptor,
        type_name,
        flags,
        signature,
        annotations,
    })
}

fn parse_method(
    reader: &mut ByteReader<'_>,
    pool: &mut ConstantPool,
    interner: &mut Interner,
    class_name: &Name,
) -> Result<MethodInfo, FormatError> {
    let flags = reader.read_u16()?;
    let name = interner.intern(pool.utf8(reader.read_u16()?)?);
    let descriptor = interner.intern(pool.utf8(reader.read_u16()?)?);
    let (parameter_names, return_name) = descriptor::method_types(descriptor.as_str())?;
    let parameters: Vec<Name> = parameter_names
        .iter()
        .map(|parameter| interner.intern(parameter))
        .collect();
    let return_type = interner.intern(&return_name);

    let method_target = AnnotationTarget::Method {
        class: class_name.clone(),
        method: name.clone(),
        descriptor: descriptor.clone(),
    };
    let mut annotations = Vec::new();
    let mut exceptions = Vec::new();
    let mut signature = None;
    let attribute_count = reader.read_u16()?;
    for _ in 0..attribute_count {
        let (kind, mut body) = read_attribute(reader, pool)?;
        match kind {
            AttrKind::VisibleAnnotations | AttrKind::InvisibleAnnotations => {
                decode_annotation_list(&mut body, pool, interner, &method_target, &mut annotations)?;
                expect_consumed(&body, kind)?;
            }
            AttrKind::VisibleParameterAnnotations | AttrKind::InvisibleParameterAnnotations => {
                let parameter_count = body.read_u8()?;
                for position in 0..parameter_count {
                    let parameter_target = AnnotationTarget::MethodParameter {
                        class: class_name.clone(),
                        method: name.clone(),
                        descriptor: descriptor.clone(),
                        position,
                    };
                    decode_annotation_list(
                        &mut body,
                        pool,
                        interner,
                        &parameter_target,
                        &mut annotations,
                    )?;
                }
                expect_consumed(&body, kind)?;
            }
            AttrKind::Exceptions => {
                let count = body.read_u16()?;
                for _ in 0..count {
                    let index = body.read_u16()?;
                    exceptions.push(pool.class_name(index, interner)?);
                }
                expect_consumed(&body, kind)?;
            }
            AttrKind::Signature => {
                signature = Some(read_signature(&mut body, pool, interner, kind)?);
            }
            _ => {}
        }
    }

    Ok(MethodInfo {
        class: class_name.clone(),
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

/// Read one attribute header and hand back its kind plus a reader scoped to
/// exactly the declared body length. Unrecognized names are logged and their
/// body left to be dropped, which skips them.
fn read_attribute<'a>(
    reader: &mut ByteReader<'a>,
    pool: &ConstantPool,
) -> Result<(AttrKind, ByteReader<'a>), FormatError> {
    let name_index = reader.read_u16()?;
    let length = reader.read_u32()? as usize;
    let kind = {
        let attribute_name = pool.utf8(name_index)?;
        let kind = AttrKind::of(attribute_name);
        if kind == AttrKind::Unknown {
            debug!(attribute = attribute_name, "skipping unrecognized attribute");
        }
        kind
    };
    let body = reader.sub_reader(length)?;
    Ok((kind, body))
}

fn decode_annotation_list(
    body: &mut ByteReader<'_>,
    pool: &ConstantPool,
    interner: &mut Interner,
    target: &AnnotationTarget,
    into: &mut Vec<Arc<AnnotationInstance>>,
) -> Result<(), FormatError> {
    let count = body.read_u16()?;
    for _ in 0..count {
        let instance = annotation::decode_annotation(body, pool, interner, target, 0)?;
        into.push(Arc::new(instance));
    }
    Ok(())
}

fn read_signature(
    body: &mut ByteReader<'_>,
    pool: &ConstantPool,
    interner: &mut Interner,
    kind: AttrKind,
) -> Result<Name, FormatError> {
    let index = body.read_u16()?;
    let signature = interner.intern(pool.utf8(index)?);
    expect_consumed(body, kind)?;
    Ok(signature)
}

fn expect_consumed(body: &ByteReader<'_>, kind: AttrKind) -> Result<(), FormatError> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(FormatError::AttributeLength { name: kind.name() })
    }
}
