//! In-memory class file synthesis for tests.
//!
//! Tests never shell out to a Java compiler; they assemble the exact byte
//! layout the parser consumes. The builder grows a constant pool on demand
//! and encodes members and annotation attributes with the same tag scheme
//! the JVM class file format defines.

use std::collections::HashMap;

/// Initialize a test logger once; repeat calls are ignored.
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Annotation definition to encode into an attribute.
pub(crate) struct AnnotationDef {
    pub(crate) type_descriptor: String,
    pub(crate) elements: Vec<(String, ElementDef)>,
}

impl AnnotationDef {
    pub(crate) fn new(type_descriptor: &str, elements: Vec<(String, ElementDef)>) -> Self {
        Self {
            type_descriptor: type_descriptor.to_string(),
            elements,
        }
    }

    /// Annotation with no elements.
    pub(crate) fn marker(type_descriptor: &str) -> Self {
        Self::new(type_descriptor, Vec::new())
    }
}

/// Element value definition mirroring the `element_value` tag set.
pub(crate) enum ElementDef {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    Enum {
        type_descriptor: String,
        const_name: String,
    },
    Class(String),
    Nested(Box<AnnotationDef>),
    Array(Vec<ElementDef>),
}

/// Builder assembling one synthetic class file.
pub(crate) struct ClassFileBuilder {
    // 1-based; an empty entry is the phantom slot after a wide constant.
    constants: Vec<Vec<u8>>,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    major: u16,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    pub(crate) fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut builder = Self {
            constants: Vec::new(),
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            major: 61,
            access_flags: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        if let Some(super_name) = super_name {
            builder.super_class = builder.class(super_name);
        }
        builder
    }

    fn push_entry(&mut self, bytes: Vec<u8>) -> u16 {
        self.constants.push(bytes);
        self.constants.len() as u16
    }

    pub(crate) fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8_cache.get(text) {
            return index;
        }
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(text.len() as u16).to_be_bytes());
        entry.extend_from_slice(text.as_bytes());
        let index = self.push_entry(entry);
        self.utf8_cache.insert(text.to_string(), index);
        index
    }

    pub(crate) fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.class_cache.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&name_index.to_be_bytes());
        let index = self.push_entry(entry);
        self.class_cache.insert(name.to_string(), index);
        index
    }

    pub(crate) fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3u8];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push_entry(entry)
    }

    pub(crate) fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5u8];
        entry.extend_from_slice(&value.to_be_bytes());
        let index = self.push_entry(entry);
        self.push_entry(Vec::new());
        index
    }

    pub(crate) fn float(&mut self, value: f32) -> u16 {
        let mut entry = vec![4u8];
        entry.extend_from_slice(&value.to_bits().to_be_bytes());
        self.push_entry(entry)
    }

    pub(crate) fn double(&mut self, value: f64) -> u16 {
        let mut entry = vec![6u8];
        entry.extend_from_slice(&value.to_bits().to_be_bytes());
        let index = self.push_entry(entry);
        self.push_entry(Vec::new());
        index
    }

    pub(crate) fn set_major(&mut self, major: u16) {
        self.major = major;
    }

    pub(crate) fn set_access_flags(&mut self, flags: u16) {
        self.access_flags = flags;
    }

    pub(crate) fn add_interface(&mut self, name: &str) {
        let index = self.class(name);
        self.interfaces.push(index);
    }

    pub(crate) fn add_field(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) {
        let record = self.member_record(flags, name, descriptor, attributes);
        self.fields.push(record);
    }

    pub(crate) fn add_method(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) {
        let record = self.member_record(flags, name, descriptor, attributes);
        self.methods.push(record);
    }

    fn member_record(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut record = Vec::new();
        record.extend_from_slice(&flags.to_be_bytes());
        record.extend_from_slice(&name_index.to_be_bytes());
        record.extend_from_slice(&descriptor_index.to_be_bytes());
        record.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            record.extend_from_slice(&attribute);
        }
        record
    }

    pub(crate) fn add_class_attribute(&mut self, attribute: Vec<u8>) {
        self.attributes.push(attribute);
    }

    /// Fully encoded attribute: name index, declared length, body.
    pub(crate) fn raw_attribute(&mut self, name: &str, body: Vec<u8>) -> Vec<u8> {
        let name_index = self.utf8(name);
        let mut attribute = Vec::with_capacity(body.len() + 6);
        attribute.extend_from_slice(&name_index.to_be_bytes());
        attribute.extend_from_slice(&(body.len() as u32).to_be_bytes());
        attribute.extend_from_slice(&body);
        attribute
    }

    pub(crate) fn annotations_attribute(
        &mut self,
        visible: bool,
        annotations: &[AnnotationDef],
    ) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(annotations.len() as u16).to_be_bytes());
        for annotation in annotations {
            self.encode_annotation(annotation, &mut body);
        }
        let name = if visible {
            "RuntimeVisibleAnnotations"
        } else {
            "RuntimeInvisibleAnnotations"
        };
        self.raw_attribute(name, body)
    }

    pub(crate) fn parameter_annotations_attribute(
        &mut self,
        visible: bool,
        parameters: &[Vec<AnnotationDef>],
    ) -> Vec<u8> {
        let mut body = vec![parameters.len() as u8];
        for annotations in parameters {
            body.extend_from_slice(&(annotations.len() as u16).to_be_bytes());
            for annotation in annotations {
                self.encode_annotation(annotation, &mut body);
            }
        }
        let name = if visible {
            "RuntimeVisibleParameterAnnotations"
        } else {
            "RuntimeInvisibleParameterAnnotations"
        };
        self.raw_attribute(name, body)
    }

    pub(crate) fn exceptions_attribute(&mut self, names: &[&str]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(names.len() as u16).to_be_bytes());
        for name in names {
            let index = self.class(name);
            body.extend_from_slice(&index.to_be_bytes());
        }
        self.raw_attribute("Exceptions", body)
    }

    pub(crate) fn signature_attribute(&mut self, signature: &str) -> Vec<u8> {
        let index = self.utf8(signature);
        self.raw_attribute("Signature", index.to_be_bytes().to_vec())
    }

    fn encode_annotation(&mut self, annotation: &AnnotationDef, out: &mut Vec<u8>) {
        let type_index = self.utf8(&annotation.type_descriptor);
        out.extend_from_slice(&type_index.to_be_bytes());
        out.extend_from_slice(&(annotation.elements.len() as u16).to_be_bytes());
        for (name, element) in &annotation.elements {
            let name_index = self.utf8(name);
            out.extend_from_slice(&name_index.to_be_bytes());
            self.encode_element(element, out);
        }
    }

    fn encode_element(&mut self, element: &ElementDef, out: &mut Vec<u8>) {
        match element {
            ElementDef::Byte(value) => {
                let index = self.integer(i32::from(*value));
                out.push(b'B');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Char(value) => {
                let index = self.integer(i32::from(*value));
                out.push(b'C');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Short(value) => {
                let index = self.integer(i32::from(*value));
                out.push(b'S');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Int(value) => {
                let index = self.integer(*value);
                out.push(b'I');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Long(value) => {
                let index = self.long(*value);
                out.push(b'J');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Float(value) => {
                let index = self.float(*value);
                out.push(b'F');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Double(value) => {
                let index = self.double(*value);
                out.push(b'D');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Bool(value) => {
                let index = self.integer(i32::from(*value));
                out.push(b'Z');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Str(value) => {
                let index = self.utf8(value);
                out.push(b's');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Enum {
                type_descriptor,
                const_name,
            } => {
                let type_index = self.utf8(type_descriptor);
                let const_index = self.utf8(const_name);
                out.push(b'e');
                out.extend_from_slice(&type_index.to_be_bytes());
                out.extend_from_slice(&const_index.to_be_bytes());
            }
            ElementDef::Class(descriptor) => {
                let index = self.utf8(descriptor);
                out.push(b'c');
                out.extend_from_slice(&index.to_be_bytes());
            }
            ElementDef::Nested(annotation) => {
                out.push(b'@');
                self.encode_annotation(annotation, out);
            }
            ElementDef::Array(items) => {
                out.push(b'[');
                out.extend_from_slice(&(items.len() as u16).to_be_bytes());
                for item in items {
                    self.encode_element(item, out);
                }
            }
        }
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&((self.constants.len() as u16 + 1).to_be_bytes()));
        for entry in &self.constants {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            out.extend_from_slice(field);
        }
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(method);
        }
        out.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            out.extend_from_slice(attribute);
        }
        out
    }
}
