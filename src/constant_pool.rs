use crate::error::FormatError;
use crate::name::{Interner, Name};
use crate::reader::ByteReader;

/// One entry of the class file constant pool.
///
/// Entries the indexer never dereferences (string refs, member refs,
/// name-and-types, method handles, dynamic call sites, module and package
/// infos) are validated and stored as [`Entry::Other`] so references into
/// them stay checkable. Index 0 and the slot following a `Long` or `Double`
/// are [`Entry::Unusable`].
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    Other,
    Unusable,
}

/// Random-access table over the constant pool of one class file.
#[derive(Debug)]
pub(crate) struct ConstantPool {
    entries: Vec<Entry>,
    // Class entry -> interned name, resolved on first access.
    class_names: Vec<Option<Name>>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let count = reader.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Entry::Unusable);

        let mut index = 1u16;
        while index < count {
            let tag = reader.read_u8()?;
            let mut wide = false;
            let entry = match tag {
                1 => {
                    let len = reader.read_u16()? as usize;
                    let bytes = reader.read_slice(len)?;
                    Entry::Utf8(String::from_utf8(bytes.to_vec())?)
                }
                3 => Entry::Integer(reader.read_u32()? as i32),
                4 => Entry::Float(f32::from_bits(reader.read_u32()?)),
                5 => {
                    wide = true;
                    Entry::Long(reader.read_u64()? as i64)
                }
                6 => {
                    wide = true;
                    Entry::Double(f64::from_bits(reader.read_u64()?))
                }
                7 => Entry::Class {
                    name_index: reader.read_u16()?,
                },
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Entry::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Entry::Other
                }
                15 => {
                    reader.skip(3)?;
                    Entry::Other
                }
                other => return Err(FormatError::UnsupportedConstantTag { tag: other }),
            };
            entries.push(entry);
            index += 1;
            if wide {
                entries.push(Entry::Unusable);
                index += 1;
            }
        }

        let class_names = vec![None; entries.len()];
        Ok(Self {
            entries,
            class_names,
        })
    }

    fn entry(&self, index: u16) -> Result<&Entry, FormatError> {
        match self.entries.get(index as usize) {
            None | Some(Entry::Unusable) => Err(FormatError::InvalidConstantIndex { index }),
            Some(entry) => Ok(entry),
        }
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str, FormatError> {
        match self.entry(index)? {
            Entry::Utf8(value) => Ok(value),
            _ => Err(FormatError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn integer(&self, index: u16) -> Result<i32, FormatError> {
        match self.entry(index)? {
            Entry::Integer(value) => Ok(*value),
            _ => Err(FormatError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn long(&self, index: u16) -> Result<i64, FormatError> {
        match self.entry(index)? {
            Entry::Long(value) => Ok(*value),
            _ => Err(FormatError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn float(&self, index: u16) -> Result<f32, FormatError> {
        match self.entry(index)? {
            Entry::Float(value) => Ok(*value),
            _ => Err(FormatError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn double(&self, index: u16) -> Result<f64, FormatError> {
        match self.entry(index)? {
            Entry::Double(value) => Ok(*value),
            _ => Err(FormatError::InvalidConstantIndex { index }),
        }
    }

    /// Interned name behind a `Class` entry, memoized after the first lookup.
    pub(crate) fn class_name(
        &mut self,
        index: u16,
        interner: &mut Interner,
    ) -> Result<Name, FormatError> {
        if let Some(Some(name)) = self.class_names.get(index as usize) {
            return Ok(name.clone());
        }
        let name_index = match self.entry(index)? {
            Entry::Class { name_index } => *name_index,
            _ => return Err(FormatError::InvalidConstantIndex { index }),
        };
        let name = interner.intern(self.utf8(name_index)?);
        self.class_names[index as usize] = Some(name.clone());
        Ok(name)
    }
}
