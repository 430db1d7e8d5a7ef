use std::collections::HashMap;
use std::sync::Arc;

use crate::annotation::AnnotationInstance;
use crate::error::FormatError;
use crate::name::{Interner, Name};
use crate::parser;

pub(crate) const ACC_INTERFACE: u16 = 0x0200;
pub(crate) const ACC_ANNOTATION: u16 = 0x2000;
pub(crate) const ACC_ENUM: u16 = 0x4000;
pub(crate) const ACC_STATIC: u16 = 0x0008;

/// Field metadata extracted from one class file.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub(crate) class: Name,
    pub(crate) name: Name,
    pub(crate) descriptor: Name,
    pub(crate) type_name: Name,
    pub(crate) flags: u16,
    pub(crate) signature: Option<Name>,
    pub(crate) annotations: Vec<Arc<AnnotationInstance>>,
}

impl FieldInfo {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn descriptor(&self) -> &Name {
        &self.descriptor
    }

    /// Readable type name, e.g. `int[]` or `java/lang/String`.
    pub fn type_name(&self) -> &Name {
        &self.type_name
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn is_static(&self) -> bool {
        self.flags & ACC_STATIC != 0
    }

    /// Generic signature, when the compiler emitted one.
    pub fn signature(&self) -> Option<&Name> {
        self.signature.as_ref()
    }

    pub fn annotations(&self) -> &[Arc<AnnotationInstance>] {
        &self.annotations
    }

    /// Name of the class declaring this field.
    pub fn declaring_class(&self) -> &Name {
        &self.class
    }
}

/// Method metadata extracted from one class file.
///
/// The annotation list carries both method-targeted and parameter-targeted
/// instances; the target distinguishes them.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub(crate) class: Name,
    pub(crate) name: Name,
    pub(crate) descriptor: Name,
    pub(crate) flags: u16,
    pub(crate) parameters: Vec<Name>,
    pub(crate) return_type: Name,
    pub(crate) exceptions: Vec<Name>,
    pub(crate) signature: Option<Name>,
    pub(crate) annotations: Vec<Arc<AnnotationInstance>>,
}

impl MethodInfo {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn descriptor(&self) -> &Name {
        &self.descriptor
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn is_static(&self) -> bool {
        self.flags & ACC_STATIC != 0
    }

    /// Parameter type names in declaration order.
    pub fn parameters(&self) -> &[Name] {
        &self.parameters
    }

    pub fn return_type(&self) -> &Name {
        &self.return_type
    }

    /// Declared checked exception type names.
    pub fn exceptions(&self) -> &[Name] {
        &self.exceptions
    }

    pub fn signature(&self) -> Option<&Name> {
        self.signature.as_ref()
    }

    pub fn annotations(&self) -> &[Arc<AnnotationInstance>] {
        &self.annotations
    }

    pub fn declaring_class(&self) -> &Name {
        &self.class
    }
}

/// Fully parsed descriptor of one class.
///
/// Superclass and interface references are stored as names, not links;
/// resolving them to other [`ClassInfo`] values is an [`Index`] lookup, since
/// referenced types may never be indexed at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub(crate) name: Name,
    pub(crate) super_name: Option<Name>,
    pub(crate) interfaces: Vec<Name>,
    pub(crate) flags: u16,
    pub(crate) signature: Option<Name>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) annotations: Vec<Arc<AnnotationInstance>>,
}

impl ClassInfo {
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Superclass name; `None` only for the root of the type hierarchy.
    pub fn super_name(&self) -> Option<&Name> {
        self.super_name.as_ref()
    }

    pub fn interfaces(&self) -> &[Name] {
        &self.interfaces
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn is_interface(&self) -> bool {
        self.flags & ACC_INTERFACE != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.flags & ACC_ANNOTATION != 0
    }

    pub fn is_enum(&self) -> bool {
        self.flags & ACC_ENUM != 0
    }

    pub fn signature(&self) -> Option<&Name> {
        self.signature.as_ref()
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name.as_str() == name)
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|method| method.name.as_str() == name && method.descriptor.as_str() == descriptor)
    }

    /// Class-level annotations only; member annotations live on the members.
    pub fn annotations(&self) -> &[Arc<AnnotationInstance>] {
        &self.annotations
    }

    /// Every instance of the given annotation type declared anywhere in this
    /// class: on the class itself, its fields, its methods, or method
    /// parameters.
    pub fn annotations_by_type(&self, name: &Name) -> Vec<&AnnotationInstance> {
        self.all_annotations()
            .filter(|instance| instance.name() == name)
            .map(Arc::as_ref)
            .collect()
    }

    pub(crate) fn all_annotations(&self) -> impl Iterator<Item = &Arc<AnnotationInstance>> {
        self.annotations
            .iter()
            .chain(self.fields.iter().flat_map(|field| field.annotations.iter()))
            .chain(
                self.methods
                    .iter()
                    .flat_map(|method| method.annotations.iter()),
            )
    }
}

/// Accumulates parsed classes and freezes them into an [`Index`].
///
/// Indexing the same class name twice replaces the earlier descriptor
/// wholesale; re-indexing an updated class file is a supported workflow, not
/// an error. The aggregator is single-threaded; independently parsed classes
/// can be folded in sequentially through [`Indexer::index_class`].
#[derive(Default)]
pub struct Indexer {
    interner: Interner,
    classes: Vec<ClassInfo>,
    by_name: HashMap<Name, usize>,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one class file and fold it into the session.
    pub fn index(&mut self, data: &[u8]) -> Result<&ClassInfo, FormatError> {
        let class = parser::parse_class(data, &mut self.interner)?;
        let slot = self.insert(class);
        Ok(&self.classes[slot])
    }

    /// Fold in a class parsed elsewhere, e.g. concurrently by another caller.
    pub fn index_class(&mut self, class: ClassInfo) {
        self.insert(class);
    }

    fn insert(&mut self, class: ClassInfo) -> usize {
        match self.by_name.get(&class.name) {
            Some(&slot) => {
                self.classes[slot] = class;
                slot
            }
            None => {
                let slot = self.classes.len();
                self.by_name.insert(class.name.clone(), slot);
                self.classes.push(class);
                slot
            }
        }
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Freeze the session into an immutable [`Index`].
    ///
    /// Both reverse-lookup structures are built here in one pass over the
    /// final class list, so a reader can never observe them half-built.
    pub fn complete(self) -> Index {
        let classes: Vec<Arc<ClassInfo>> = self.classes.into_iter().map(Arc::new).collect();
        let mut by_name = HashMap::with_capacity(classes.len());
        let mut annotations: HashMap<Name, Vec<Arc<AnnotationInstance>>> = HashMap::new();
        let mut subtypes: HashMap<Name, Vec<Name>> = HashMap::new();

        for class in &classes {
            by_name.insert(class.name.clone(), Arc::clone(class));
            if let Some(super_name) = &class.super_name {
                subtypes
                    .entry(super_name.clone())
                    .or_default()
                    .push(class.name.clone());
            }
            for interface in &class.interfaces {
                subtypes
                    .entry(interface.clone())
                    .or_default()
                    .push(class.name.clone());
            }
            for instance in class.all_annotations() {
                annotations
                    .entry(instance.name().clone())
                    .or_default()
                    .push(Arc::clone(instance));
            }
        }

        Index {
            classes,
            by_name,
            annotations,
            subtypes,
        }
    }
}

/// Immutable, query-optimized index over a set of parsed classes.
///
/// Once built it never changes, so any number of threads may read it
/// concurrently without locking. Lookups for names that were never indexed
/// return `None` or an empty slice; partial classpaths are a normal operating
/// condition.
#[derive(Debug, PartialEq)]
pub struct Index {
    pub(crate) classes: Vec<Arc<ClassInfo>>,
    by_name: HashMap<Name, Arc<ClassInfo>>,
    annotations: HashMap<Name, Vec<Arc<AnnotationInstance>>>,
    subtypes: HashMap<Name, Vec<Name>>,
}

impl Index {
    pub fn class_by_name(&self, name: &Name) -> Option<&ClassInfo> {
        self.by_name.get(name).map(Arc::as_ref)
    }

    /// All instances of the given annotation type, in indexing order.
    pub fn annotations(&self, name: &Name) -> &[Arc<AnnotationInstance>] {
        self.annotations
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of classes that directly extend or implement the given type.
    ///
    /// Transitive closure is the caller chaining direct lookups.
    pub fn direct_subtypes(&self, name: &Name) -> &[Name] {
        self.subtypes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indexed classes in insertion order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.iter().map(Arc::as_ref)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}
