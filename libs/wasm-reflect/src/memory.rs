// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use crate::WASM_PAGE_SIZE;
use crate::errors::MemoryAccessError;

/// A read-only, bounds-checked view of an instance's linear memory.
///
/// The view borrows the session, so it always reflects the memory's current size. Take a new view
/// after calling into the instance, since the memory may have grown.
#[derive(Clone, Copy)]
pub struct MemoryView<'a> {
    data: &'a [u8],
}

/// A writable, bounds-checked view of an instance's linear memory.
pub struct MemoryViewMut<'a> {
    data: &'a mut [u8],
}

// ===== impl MemoryView =====

impl<'a> MemoryView<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// The current size of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The current size of the memory in WebAssembly pages.
    pub fn pages(&self) -> u64 {
        self.data.len() as u64 / WASM_PAGE_SIZE
    }

    /// The host address of the first byte of the memory.
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// The base pointer and current length of the memory.
    pub fn raw_parts(&self) -> (*const u8, usize) {
        (self.data.as_ptr(), self.data.len())
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Copies `buffer.len()` bytes starting at `offset` out of the memory.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryAccessError`] if the range is out of bounds.
    pub fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        read(self.data, offset, buffer)
    }
}

impl fmt::Debug for MemoryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryView")
            .field("base", &self.data.as_ptr())
            .field("len", &self.data.len())
            .finish()
    }
}

// ===== impl MemoryViewMut =====

impl<'a> MemoryViewMut<'a> {
    pub(crate) fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// The current size of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data
    }

    /// Copies `buffer.len()` bytes starting at `offset` out of the memory.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryAccessError`] if the range is out of bounds.
    pub fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        read(self.data, offset, buffer)
    }

    /// Copies `buffer` into the memory starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryAccessError`] if the range is out of bounds. Nothing is written in that
    /// case.
    pub fn write(&mut self, offset: usize, buffer: &[u8]) -> Result<(), MemoryAccessError> {
        let end = offset
            .checked_add(buffer.len())
            .ok_or_else(MemoryAccessError::new)?;
        self.data
            .get_mut(offset..end)
            .ok_or_else(MemoryAccessError::new)?
            .copy_from_slice(buffer);
        Ok(())
    }
}

impl fmt::Debug for MemoryViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryViewMut")
            .field("base", &self.data.as_ptr())
            .field("len", &self.data.len())
            .finish()
    }
}

fn read(data: &[u8], offset: usize, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
    let end = offset
        .checked_add(buffer.len())
        .ok_or_else(MemoryAccessError::new)?;
    buffer.copy_from_slice(data.get(offset..end).ok_or_else(MemoryAccessError::new)?);
    Ok(())
}
