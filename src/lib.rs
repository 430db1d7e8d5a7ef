//! Class-file indexer: parses JVM class files into compact descriptors,
//! aggregates them into a queryable [`Index`] (annotation reverse lookup,
//! direct subtype lookup, name lookup), and persists the result through a
//! versioned binary format in [`codec`].
//!
//! ```no_run
//! use classdex::{Indexer, Interner};
//!
//! # fn main() -> Result<(), classdex::FormatError> {
//! let mut indexer = Indexer::new();
//! indexer.index(&std::fs::read("target/classes/com/example/Svc.class")?)?;
//! let index = indexer.complete();
//!
//! let mut interner = Interner::new();
//! let component = interner.intern("com/example/Component");
//! for instance in index.annotations(&component) {
//!     println!("{:?}", instance.target());
//! }
//! # Ok(())
//! # }
//! ```

mod annotation;
pub mod codec;
mod constant_pool;
mod descriptor;
mod error;
mod index;
mod jar;
mod name;
mod parser;
mod reader;
#[cfg(test)]
mod test_harness;

pub use annotation::{AnnotationInstance, AnnotationTarget, AnnotationValue};
pub use error::FormatError;
pub use index::{ClassInfo, FieldInfo, Index, Indexer, MethodInfo};
pub use jar::index_jar;
pub use name::{Interner, Name};
pub use parser::parse_class;
