//! Custom allocators for libtidy
//!
//! libtidy routes every allocation through a `TidyAllocator`, a struct whose
//! first field is a pointer to a vtable of four callbacks. [`Allocator`]
//! reproduces that layout with a static vtable and forwards each callback to
//! a boxed [`RawAllocator`]. A document and any buffers created with the same
//! allocator must all keep it alive, which is why it is handed around as an
//! `Arc`.
//!
//! The process-wide hooks (`set_malloc` and friends) replace the functions
//! the *default* allocator uses and affect every document in the process.

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process;
use std::sync::Arc;
use std::thread;

use crate::error::{check_bool, Result};
use crate::ffi;

/// Memory provider for libtidy.
///
/// # Safety
///
/// `alloc` and `realloc` must return null or a block of at least `size`
/// bytes; `free` and `realloc` receive only blocks produced by this same
/// allocator (or null).
pub unsafe trait RawAllocator {
    fn alloc(&self, size: usize) -> *mut c_void;
    fn realloc(&self, block: *mut c_void, size: usize) -> *mut c_void;
    fn free(&self, block: *mut c_void);

    /// Called when libtidy cannot go on: a failed allocation or a corrupted
    /// tree. libtidy never checks for null blocks, so this must not return.
    fn panic(&self, msg: &str) -> ! {
        log::error!("libtidy panic: {}", msg);
        process::abort()
    }
}

/// `malloc`/`realloc`/`free` from the C library, same as libtidy's default.
/// A failed `malloc` ends up in [`RawAllocator::panic`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

unsafe impl RawAllocator for SystemAllocator {
    fn alloc(&self, size: usize) -> *mut c_void {
        unsafe { libc::malloc(size) }
    }

    fn realloc(&self, block: *mut c_void, size: usize) -> *mut c_void {
        unsafe { libc::realloc(block, size) }
    }

    fn free(&self, block: *mut c_void) {
        unsafe { libc::free(block) }
    }
}

/// A `TidyAllocator` backed by a Rust [`RawAllocator`].
#[repr(C)]
pub struct Allocator {
    base: ffi::TidyAllocator,
    inner: Box<dyn RawAllocator>,
}

static VTABLE: ffi::TidyAllocatorVtbl = ffi::TidyAllocatorVtbl {
    alloc: alloc_trampoline,
    realloc: realloc_trampoline,
    free: free_trampoline,
    panic: panic_trampoline,
};

impl Allocator {
    pub fn new<A: RawAllocator + 'static>(inner: A) -> Arc<Self> {
        Arc::new(Self {
            base: ffi::TidyAllocator { vtbl: &VTABLE },
            inner: Box::new(inner),
        })
    }

    /// Pointer handed to libtidy. libtidy only reads the vtable through it.
    pub(crate) fn as_raw(this: &Arc<Self>) -> *mut ffi::TidyAllocator {
        Arc::as_ptr(this) as *mut Allocator as *mut ffi::TidyAllocator
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator").finish_non_exhaustive()
    }
}

unsafe fn inner<'a>(this: *mut ffi::TidyAllocator) -> &'a dyn RawAllocator {
    // `base` is the first field of a `#[repr(C)]` `Allocator`.
    &*(*(this as *const Allocator)).inner
}

// A null block for a non-empty request, or a panic inside the allocator,
// goes to `panic`; libtidy writes to whatever it is handed.
fn settle(
    alloc: &dyn RawAllocator,
    outcome: thread::Result<*mut c_void>,
    size: usize,
) -> *mut c_void {
    match outcome {
        Ok(block) if !block.is_null() || size == 0 => block,
        Ok(_) => alloc.panic(&format!("out of memory allocating {} bytes", size)),
        Err(_) => alloc.panic(&format!("allocator panicked allocating {} bytes", size)),
    }
}

unsafe extern "C" fn alloc_trampoline(this: *mut ffi::TidyAllocator, size: usize) -> *mut c_void {
    let alloc = inner(this);
    let outcome = catch_unwind(AssertUnwindSafe(|| alloc.alloc(size)));
    catch_unwind(AssertUnwindSafe(|| settle(alloc, outcome, size)))
        .unwrap_or_else(|_| process::abort())
}

unsafe extern "C" fn realloc_trampoline(
    this: *mut ffi::TidyAllocator,
    block: *mut c_void,
    size: usize,
) -> *mut c_void {
    let alloc = inner(this);
    let outcome = catch_unwind(AssertUnwindSafe(|| alloc.realloc(block, size)));
    catch_unwind(AssertUnwindSafe(|| settle(alloc, outcome, size)))
        .unwrap_or_else(|_| process::abort())
}

unsafe extern "C" fn free_trampoline(this: *mut ffi::TidyAllocator, block: *mut c_void) {
    let alloc = inner(this);
    if catch_unwind(AssertUnwindSafe(|| alloc.free(block))).is_err() {
        log::error!("allocator panicked in free");
    }
}

unsafe extern "C" fn panic_trampoline(this: *mut ffi::TidyAllocator, msg: ffi::ctmbstr) {
    let alloc = inner(this);
    let msg = ffi::to_str(msg).unwrap_or("");
    let _ = catch_unwind(AssertUnwindSafe(|| alloc.panic(msg)));
    process::abort()
}

/// Give libtidy's default allocator a `malloc` replacement.
///
/// # Safety
///
/// Must be called before any allocation is made, and together with the
/// matching `set_realloc`/`set_free`, or blocks will be freed by the wrong
/// allocator.
pub unsafe fn set_malloc(fmalloc: ffi::TidyMalloc) -> Result<()> {
    check_bool(
        ffi::tidySetMallocCall(Some(fmalloc)),
        "alloc.set_malloc: failed to install malloc replacement.",
    )
}

/// # Safety
///
/// See [`set_malloc`].
pub unsafe fn set_realloc(frealloc: ffi::TidyRealloc) -> Result<()> {
    check_bool(
        ffi::tidySetReallocCall(Some(frealloc)),
        "alloc.set_realloc: failed to install realloc replacement.",
    )
}

/// # Safety
///
/// See [`set_malloc`].
pub unsafe fn set_free(ffree: ffi::TidyFree) -> Result<()> {
    check_bool(
        ffi::tidySetFreeCall(Some(ffree)),
        "alloc.set_free: failed to install free replacement.",
    )
}

/// # Safety
///
/// The handler is called from inside libtidy and must neither unwind nor
/// return.
pub unsafe fn set_panic(fpanic: ffi::TidyPanic) -> Result<()> {
    check_bool(
        ffi::tidySetPanicCall(Some(fpanic)),
        "alloc.set_panic: failed to install panic handler.",
    )
}
