//! `TidyBuffer` wrapper
//!
//! A growable chunk of memory owned by libtidy's allocator, with a read
//! cursor used when the buffer is parsed as input.

use std::ffi::{c_uint, c_void};
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr;
use std::slice;
use std::sync::Arc;

use crate::alloc::Allocator;
use crate::ffi;

pub struct Buffer {
    pub(crate) raw: ffi::TidyBuffer,
    allocator: Option<Arc<Allocator>>,
}

impl Buffer {
    /// Create an empty buffer on the default allocator.
    pub fn new() -> Self {
        let mut raw = MaybeUninit::<ffi::TidyBuffer>::uninit();
        unsafe { ffi::tidyBufInit(raw.as_mut_ptr()) };
        Self {
            raw: unsafe { raw.assume_init() },
            allocator: None,
        }
    }

    /// Create an empty buffer that allocates through `allocator`.
    pub fn with_allocator(allocator: Arc<Allocator>) -> Self {
        let mut raw = MaybeUninit::<ffi::TidyBuffer>::uninit();
        unsafe { ffi::tidyBufInitWithAllocator(raw.as_mut_ptr(), Allocator::as_raw(&allocator)) };
        Self {
            raw: unsafe { raw.assume_init() },
            allocator: Some(allocator),
        }
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        if self.raw.bp.is_null() || self.raw.size == 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.raw.bp, self.raw.size as usize) }
    }

    /// Raw data pointer, null when nothing is allocated.
    pub fn as_ptr(&self) -> *const u8 {
        self.raw.bp
    }

    pub fn len(&self) -> usize {
        self.raw.size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.raw.size == 0
    }

    /// Bytes allocated, which may exceed `len`.
    pub fn capacity(&self) -> usize {
        self.raw.allocated as usize
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Free the current contents and allocate `size` fresh bytes.
    pub fn alloc(&mut self, size: u32) {
        // tidyBufAlloc resets without freeing and drops back to the default
        // allocator, so free first and keep the current allocator.
        unsafe {
            ffi::tidyBufFree(&mut self.raw);
            let allocator = self.raw.allocator;
            ffi::tidyBufAllocWithAllocator(&mut self.raw, allocator, size);
        }
    }

    /// Like [`Buffer::alloc`], switching to `allocator` for this and all
    /// later allocations.
    pub fn alloc_with_allocator(&mut self, allocator: Arc<Allocator>, size: u32) {
        unsafe {
            ffi::tidyBufFree(&mut self.raw);
            ffi::tidyBufAllocWithAllocator(&mut self.raw, Allocator::as_raw(&allocator), size);
        }
        self.allocator = Some(allocator);
    }

    /// Grow to at least `size` bytes; `chunk_size` is the minimum growth,
    /// 0 for libtidy's default of 256.
    pub fn check_alloc(&mut self, size: u32, chunk_size: u32) {
        unsafe { ffi::tidyBufCheckAlloc(&mut self.raw, size, chunk_size) };
    }

    /// Release the storage and reset to empty.
    pub fn free(&mut self) {
        unsafe { ffi::tidyBufFree(&mut self.raw) };
    }

    /// Zero the storage and reset size and cursor; keeps the allocation.
    pub fn clear(&mut self) {
        unsafe { ffi::tidyBufClear(&mut self.raw) };
    }

    /// Point the buffer at memory it does not own.
    ///
    /// # Safety
    ///
    /// `bytes` must be valid for `len` bytes until [`Buffer::detach`] is
    /// called, and the buffer must be detached before it grows, is freed or
    /// is dropped.
    pub unsafe fn attach(&mut self, bytes: *mut u8, len: u32) {
        ffi::tidyBufAttach(&mut self.raw, bytes, len);
    }

    /// Forget the current storage without freeing it.
    ///
    /// # Safety
    ///
    /// If the storage was allocated by libtidy, the caller takes over
    /// freeing it through the same allocator.
    pub unsafe fn detach(&mut self) {
        ffi::tidyBufDetach(&mut self.raw);
    }

    /// Append bytes, growing as needed.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        // tidyBufAppend copies from the pointer, it never writes through it.
        unsafe {
            ffi::tidyBufAppend(
                &mut self.raw,
                bytes.as_ptr() as *mut c_void,
                bytes.len() as c_uint,
            )
        };
    }

    pub fn put_byte(&mut self, byte: u8) {
        unsafe { ffi::tidyBufPutByte(&mut self.raw, byte) };
    }

    /// Remove and return the last byte.
    pub fn pop_byte(&mut self) -> Option<u8> {
        byte_or_eof(unsafe { ffi::tidyBufPopByte(&mut self.raw) })
    }

    /// Read the byte at the cursor and advance it.
    pub fn get_byte(&mut self) -> Option<u8> {
        byte_or_eof(unsafe { ffi::tidyBufGetByte(&mut self.raw) })
    }

    /// Step the cursor back over `byte`, which must be the byte last read.
    pub fn unget_byte(&mut self, byte: u8) {
        unsafe { ffi::tidyBufUngetByte(&mut self.raw, byte) };
    }

    /// Whether the cursor has reached the end of the data.
    pub fn is_eof(&mut self) -> bool {
        unsafe { ffi::tidyBufEndOfInput(&mut self.raw) != ffi::NO }
    }

    /// Read position of the cursor.
    pub fn position(&self) -> usize {
        self.raw.next as usize
    }

    pub(crate) fn as_raw(&mut self) -> *mut ffi::TidyBuffer {
        &mut self.raw
    }
}

fn byte_or_eof(value: i32) -> Option<u8> {
    if value == ffi::EOF {
        None
    } else {
        Some(value as u8)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        let mut buf = Buffer::new();
        buf.append(bytes);
        buf
    }
}

impl From<&str> for Buffer {
    fn from(s: &str) -> Self {
        Buffer::from(s.as_bytes())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.raw.size)
            .field("allocated", &self.raw.allocated)
            .field("next", &self.raw.next)
            .finish()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if !self.raw.bp.is_null() {
            unsafe { ffi::tidyBufFree(&mut self.raw) };
        }
        self.raw.bp = ptr::null_mut();
    }
}
