//! `TidyOutputSink` wrapper: accepts raw bytes of output.

use std::ffi::{c_uint, c_void};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use crate::buffer::Buffer;
use crate::error::{check_bool, Result};
use crate::ffi;

/// A push-based byte consumer.
pub trait ByteSink {
    fn put_byte(&mut self, byte: u8);
}

impl ByteSink for Vec<u8> {
    fn put_byte(&mut self, byte: u8) {
        self.push(byte);
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn put_byte(&mut self, byte: u8) {
        (**self).put_byte(byte);
    }
}

/// Adapts any [`Write`] into a [`ByteSink`].
///
/// Output is buffered; call [`WriteSink::finish`] to flush and see the first
/// write error, if any.
pub struct WriteSink<W: Write> {
    writer: io::BufWriter<W>,
    error: Option<io::Error>,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: io::BufWriter::new(writer),
            error: None,
        }
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn put_byte(&mut self, byte: u8) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.writer.write_all(&[byte]) {
            log::warn!("output sink write failed: {}", e);
            self.error = Some(e);
        }
    }
}

/// Output target for saves and diagnostics.
pub struct OutputSink<'a> {
    raw: Box<ffi::TidyOutputSink>,
    _state: Option<Box<Box<dyn ByteSink + 'a>>>,
    _borrow: PhantomData<&'a mut Buffer>,
}

impl<'a> OutputSink<'a> {
    pub fn new<S: ByteSink + 'a>(sink: S) -> Result<Self> {
        let mut state: Box<Box<dyn ByteSink + 'a>> = Box::new(Box::new(sink));
        let data = &mut *state as *mut Box<dyn ByteSink + 'a> as *mut c_void;
        let mut raw = Box::new(empty_sink());
        let ok = unsafe { ffi::tidyInitSink(&mut *raw, data, Some(put_byte_trampoline)) };
        check_bool(
            ok,
            "output_sink.new: failed to initialize output sink. Invalid/NULL callback pointer?",
        )?;
        Ok(Self {
            raw,
            _state: Some(state),
            _borrow: PhantomData,
        })
    }

    /// Append output to `buf`.
    pub fn from_buffer(buf: &'a mut Buffer) -> Self {
        let mut raw = Box::new(empty_sink());
        unsafe { ffi::tidyInitOutputBuffer(&mut *raw, buf.as_raw()) };
        Self {
            raw,
            _state: None,
            _borrow: PhantomData,
        }
    }

    pub fn put_byte(&mut self, byte: u8) {
        unsafe { ffi::tidyPutByte(self.as_raw(), byte as c_uint) };
    }

    pub(crate) fn as_raw(&mut self) -> *mut ffi::TidyOutputSink {
        &mut *self.raw
    }
}

fn empty_sink() -> ffi::TidyOutputSink {
    ffi::TidyOutputSink {
        sinkData: ptr::null_mut(),
        putByte: None,
    }
}

unsafe extern "C" fn put_byte_trampoline(data: *mut c_void, byte: ffi::byte) {
    let sink = &mut *(data as *mut Box<dyn ByteSink>);
    if catch_unwind(AssertUnwindSafe(|| sink.put_byte(byte))).is_err() {
        log::error!("output sink panicked in put_byte; byte dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink() {
        let mut out = Vec::new();
        {
            let mut sink = OutputSink::new(&mut out).unwrap();
            for &b in b"<br>" {
                sink.put_byte(b);
            }
        }
        assert_eq!(out, b"<br>");
    }

    #[test]
    fn test_buffer_sink() {
        let mut buf = Buffer::new();
        {
            let mut sink = OutputSink::from_buffer(&mut buf);
            sink.put_byte(b'o');
            sink.put_byte(b'k');
        }
        assert_eq!(buf.as_bytes(), b"ok");
    }

    #[test]
    fn test_write_sink() {
        let mut sink = WriteSink::new(Vec::new());
        sink.put_byte(b'a');
        sink.put_byte(b'b');
        assert_eq!(sink.finish().unwrap(), b"ab");
    }

    struct Exploding;

    impl ByteSink for Exploding {
        fn put_byte(&mut self, _byte: u8) {
            panic!("sink exploded")
        }
    }

    #[test]
    fn test_panicking_sink_drops_bytes() {
        let mut sink = OutputSink::new(Exploding).unwrap();
        sink.put_byte(b'x');
        sink.put_byte(b'y');

        let mut doc = crate::Document::new();
        doc.parse_string("<title>t</title><p>lost").unwrap();
        assert!(doc.save_sink(&mut sink).is_ok());
    }
}
