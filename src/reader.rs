use crate::error::FormatError;

/// Bounds-checked big-endian cursor over a byte slice.
///
/// Shared by the class file parser and the index decoder; every read past the
/// end of the slice fails with the absolute offset where the shortfall was
/// detected.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    /// Absolute offset of the next unread byte.
    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    fn eof(&self) -> FormatError {
        FormatError::Truncated {
            offset: self.offset(),
        }
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, FormatError> {
        let byte = *self.data.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, FormatError> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, FormatError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, FormatError> {
        let high = self.read_u32()? as u64;
        let low = self.read_u32()? as u64;
        Ok(high << 32 | low)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let end = self.pos.checked_add(len).ok_or_else(|| self.eof())?;
        let slice = self.data.get(self.pos..end).ok_or_else(|| self.eof())?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.read_slice(len)?;
        Ok(())
    }

    /// Split off a reader over the next `len` bytes, consuming them.
    ///
    /// The sub-reader keeps reporting absolute offsets.
    pub(crate) fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'a>, FormatError> {
        let base = self.offset();
        let data = self.read_slice(len)?;
        Ok(ByteReader { data, pos: 0, base })
    }
}
