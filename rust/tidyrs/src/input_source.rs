//! `TidyInputSource` wrapper: delivers raw bytes of input to the parser.

use std::ffi::{c_int, c_uint, c_void};
use std::io::{self, Read};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use crate::buffer::Buffer;
use crate::error::{check_bool, Result};
use crate::ffi;

/// A pull-based byte producer.
pub trait ByteSource {
    /// Next byte, `None` at end of input.
    fn get_byte(&mut self) -> Option<u8>;

    /// Push `byte` back so the next `get_byte` returns it.
    fn unget_byte(&mut self, byte: u8);

    fn is_eof(&mut self) -> bool;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn get_byte(&mut self) -> Option<u8> {
        (**self).get_byte()
    }

    fn unget_byte(&mut self, byte: u8) {
        (**self).unget_byte(byte);
    }

    fn is_eof(&mut self) -> bool {
        (**self).is_eof()
    }
}

/// In-memory source over a byte slice.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl ByteSource for SliceSource<'_> {
    fn get_byte(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn unget_byte(&mut self, _byte: u8) {
        self.pos = self.pos.saturating_sub(1);
    }

    fn is_eof(&mut self) -> bool {
        self.pos >= self.bytes.len()
    }
}

/// Adapts any [`Read`] into a [`ByteSource`].
///
/// Read errors end the input; the first one is kept for [`ReadSource::error`].
/// Pass `&mut source` to an [`InputSource`] to check it after parsing.
pub struct ReadSource<R> {
    reader: io::BufReader<R>,
    pushback: Vec<u8>,
    eof: bool,
    error: Option<io::Error>,
}

impl<R: Read> ReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: io::BufReader::new(reader),
            pushback: Vec::new(),
            eof: false,
            error: None,
        }
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    fn fill(&mut self) {
        if !self.pushback.is_empty() || self.eof {
            return;
        }
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => {
                    self.eof = true;
                    return;
                }
                Ok(_) => {
                    self.pushback.push(byte[0]);
                    return;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("input source read failed: {}", e);
                    self.error = Some(e);
                    self.eof = true;
                    return;
                }
            }
        }
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn get_byte(&mut self) -> Option<u8> {
        self.fill();
        self.pushback.pop()
    }

    fn unget_byte(&mut self, byte: u8) {
        self.pushback.push(byte);
    }

    fn is_eof(&mut self) -> bool {
        self.fill();
        self.pushback.is_empty()
    }
}

/// Input handed to [`Document::parse_source`](crate::Document::parse_source).
///
/// Either wraps a Rust [`ByteSource`] through callbacks, or reads straight
/// from a [`Buffer`].
pub struct InputSource<'a> {
    // Boxed so the address given to libtidy stays put when `self` moves.
    raw: Box<ffi::TidyInputSource>,
    _state: Option<Box<Box<dyn ByteSource + 'a>>>,
    _borrow: PhantomData<&'a mut Buffer>,
}

impl<'a> InputSource<'a> {
    pub fn new<S: ByteSource + 'a>(source: S) -> Result<Self> {
        let mut state: Box<Box<dyn ByteSource + 'a>> = Box::new(Box::new(source));
        let data = &mut *state as *mut Box<dyn ByteSource + 'a> as *mut c_void;
        let mut raw = Box::new(empty_source());
        let ok = unsafe {
            ffi::tidyInitSource(
                &mut *raw,
                data,
                Some(get_byte_trampoline),
                Some(unget_byte_trampoline),
                Some(eof_trampoline),
            )
        };
        check_bool(
            ok,
            "input_source.new: failed to initialize input source. Invalid/NULL callback pointer?",
        )?;
        Ok(Self {
            raw,
            _state: Some(state),
            _borrow: PhantomData,
        })
    }

    /// Read from `buf` starting at its cursor.
    pub fn from_buffer(buf: &'a mut Buffer) -> Self {
        let mut raw = Box::new(empty_source());
        unsafe { ffi::tidyInitInputBuffer(&mut *raw, buf.as_raw()) };
        Self {
            raw,
            _state: None,
            _borrow: PhantomData,
        }
    }

    pub fn get_byte(&mut self) -> Option<u8> {
        let value = unsafe { ffi::tidyGetByte(self.as_raw()) };
        if value == ffi::END_OF_STREAM as c_uint {
            None
        } else {
            Some(value as u8)
        }
    }

    pub fn unget_byte(&mut self, byte: u8) {
        unsafe { ffi::tidyUngetByte(self.as_raw(), byte as c_uint) };
    }

    pub fn is_eof(&mut self) -> bool {
        unsafe { ffi::tidyIsEOF(self.as_raw()) != ffi::NO }
    }

    pub(crate) fn as_raw(&mut self) -> *mut ffi::TidyInputSource {
        &mut *self.raw
    }
}

fn empty_source() -> ffi::TidyInputSource {
    ffi::TidyInputSource {
        sourceData: ptr::null_mut(),
        getByte: None,
        ungetByte: None,
        eof: None,
    }
}

unsafe fn source<'s>(data: *mut c_void) -> &'s mut Box<dyn ByteSource + 's> {
    &mut *(data as *mut Box<dyn ByteSource + 's>)
}

unsafe extern "C" fn get_byte_trampoline(data: *mut c_void) -> c_int {
    let src = source(data);
    match catch_unwind(AssertUnwindSafe(|| src.get_byte())) {
        Ok(Some(byte)) => byte as c_int,
        Ok(None) => ffi::END_OF_STREAM,
        Err(_) => {
            log::error!("input source panicked in get_byte; ending input");
            ffi::END_OF_STREAM
        }
    }
}

unsafe extern "C" fn unget_byte_trampoline(data: *mut c_void, byte: ffi::byte) {
    let src = source(data);
    if catch_unwind(AssertUnwindSafe(|| src.unget_byte(byte))).is_err() {
        log::error!("input source panicked in unget_byte");
    }
}

unsafe extern "C" fn eof_trampoline(data: *mut c_void) -> ffi::Bool {
    let src = source(data);
    match catch_unwind(AssertUnwindSafe(|| src.is_eof())) {
        Ok(false) => ffi::NO,
        Ok(true) => ffi::YES,
        Err(_) => {
            log::error!("input source panicked in is_eof; ending input");
            ffi::YES
        }
    }
}
