//! Raw libtidy declarations
//!
//! Only the symbols this crate calls are declared here. Linking is set up by
//! `build.rs`. Everything in this module is a direct mirror of `tidy.h` and
//! `tidybuffio.h`; the safe wrappers live in the sibling modules.

#![allow(non_camel_case_types, non_snake_case, dead_code)]

use std::ffi::{c_char, c_int, c_uint, c_ulong, c_void};

// ============================================================================
// Basic types
// ============================================================================

/// libtidy's `Bool` (`enum { no, yes }`).
pub type Bool = c_int;
pub const NO: Bool = 0;
pub const YES: Bool = 1;

pub type ctmbstr = *const c_char;
pub type tmbstr = *mut c_char;
pub type byte = u8;

/// `EndOfStream` from `tidy.h` (`~0u`), as returned through an `int`.
pub const END_OF_STREAM: c_int = -1;

/// stdio `EOF`, returned by the `tidyBuf*Byte` helpers.
pub const EOF: c_int = -1;

macro_rules! opaque_handle {
    ($($impl_name:ident => $handle:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $impl_name {
                _private: [u8; 0],
            }

            pub type $handle = *const $impl_name;
        )*
    };
}

opaque_handle! {
    _TidyDoc => TidyDoc,
    _TidyOption => TidyOption,
    _TidyNode => TidyNode,
    _TidyAttr => TidyAttr,
    _TidyIterator => TidyIterator,
}

pub type TidyOptionId = c_int;
pub type TidyOptionType = c_int;
pub type TidyConfigCategory = c_int;
pub type TidyNodeType = c_int;
pub type TidyTagId = c_int;
pub type TidyAttrId = c_int;
pub type TidyReportLevel = c_int;

// ============================================================================
// Allocators
// ============================================================================

#[repr(C)]
pub struct TidyAllocatorVtbl {
    pub alloc: unsafe extern "C" fn(this: *mut TidyAllocator, nbytes: usize) -> *mut c_void,
    pub realloc: unsafe extern "C" fn(
        this: *mut TidyAllocator,
        block: *mut c_void,
        nbytes: usize,
    ) -> *mut c_void,
    pub free: unsafe extern "C" fn(this: *mut TidyAllocator, block: *mut c_void),
    pub panic: unsafe extern "C" fn(this: *mut TidyAllocator, msg: ctmbstr),
}

#[repr(C)]
pub struct TidyAllocator {
    pub vtbl: *const TidyAllocatorVtbl,
}

pub type TidyMalloc = unsafe extern "C" fn(len: usize) -> *mut c_void;
pub type TidyRealloc = unsafe extern "C" fn(buf: *mut c_void, len: usize) -> *mut c_void;
pub type TidyFree = unsafe extern "C" fn(buf: *mut c_void);
pub type TidyPanic = unsafe extern "C" fn(msg: ctmbstr);

// ============================================================================
// I/O
// ============================================================================

pub type TidyGetByteFunc = unsafe extern "C" fn(source_data: *mut c_void) -> c_int;
pub type TidyUngetByteFunc = unsafe extern "C" fn(source_data: *mut c_void, bt: byte);
pub type TidyEOFFunc = unsafe extern "C" fn(source_data: *mut c_void) -> Bool;
pub type TidyPutByteFunc = unsafe extern "C" fn(sink_data: *mut c_void, bt: byte);

#[repr(C)]
pub struct TidyInputSource {
    pub sourceData: *mut c_void,
    pub getByte: Option<TidyGetByteFunc>,
    pub ungetByte: Option<TidyUngetByteFunc>,
    pub eof: Option<TidyEOFFunc>,
}

#[repr(C)]
pub struct TidyOutputSink {
    pub sinkData: *mut c_void,
    pub putByte: Option<TidyPutByteFunc>,
}

#[repr(C)]
pub struct TidyBuffer {
    pub allocator: *mut TidyAllocator,
    pub bp: *mut byte,
    pub size: c_uint,
    pub allocated: c_uint,
    pub next: c_uint,
}

pub type TidyOptCallback = unsafe extern "C" fn(option: ctmbstr, value: ctmbstr) -> Bool;
pub type TidyReportFilter = unsafe extern "C" fn(
    tdoc: TidyDoc,
    lvl: TidyReportLevel,
    line: c_uint,
    col: c_uint,
    mssg: ctmbstr,
) -> Bool;

extern "C" {
    // Library
    pub fn tidyReleaseDate() -> ctmbstr;
    pub fn tidyLibraryVersion() -> ctmbstr;

    // Document lifecycle
    pub fn tidyCreate() -> TidyDoc;
    pub fn tidyCreateWithAllocator(allocator: *mut TidyAllocator) -> TidyDoc;
    pub fn tidyRelease(tdoc: TidyDoc);
    pub fn tidySetAppData(tdoc: TidyDoc, app_data: *mut c_void);
    pub fn tidyGetAppData(tdoc: TidyDoc) -> *mut c_void;

    // Diagnostics
    pub fn tidyStatus(tdoc: TidyDoc) -> c_int;
    pub fn tidyDetectedHtmlVersion(tdoc: TidyDoc) -> c_int;
    pub fn tidyDetectedXhtml(tdoc: TidyDoc) -> Bool;
    pub fn tidyDetectedGenericXml(tdoc: TidyDoc) -> Bool;
    pub fn tidyErrorCount(tdoc: TidyDoc) -> c_uint;
    pub fn tidyWarningCount(tdoc: TidyDoc) -> c_uint;
    pub fn tidyAccessWarningCount(tdoc: TidyDoc) -> c_uint;
    pub fn tidyConfigErrorCount(tdoc: TidyDoc) -> c_uint;
    pub fn tidyErrorSummary(tdoc: TidyDoc);
    pub fn tidyGeneralInfo(tdoc: TidyDoc);

    // Configuration
    pub fn tidyLoadConfig(tdoc: TidyDoc, config_file: ctmbstr) -> c_int;
    pub fn tidyLoadConfigEnc(tdoc: TidyDoc, config_file: ctmbstr, charenc: ctmbstr) -> c_int;
    pub fn tidyFileExists(tdoc: TidyDoc, filename: ctmbstr) -> Bool;
    pub fn tidySetCharEncoding(tdoc: TidyDoc, encnam: ctmbstr) -> c_int;
    pub fn tidySetInCharEncoding(tdoc: TidyDoc, encnam: ctmbstr) -> c_int;
    pub fn tidySetOutCharEncoding(tdoc: TidyDoc, encnam: ctmbstr) -> c_int;
    pub fn tidySetOptionCallback(tdoc: TidyDoc, callback: Option<TidyOptCallback>) -> Bool;

    // Options
    pub fn tidyOptGetIdForName(optnam: ctmbstr) -> TidyOptionId;
    pub fn tidyGetOptionList(tdoc: TidyDoc) -> TidyIterator;
    pub fn tidyGetNextOption(tdoc: TidyDoc, pos: *mut TidyIterator) -> TidyOption;
    pub fn tidyGetOption(tdoc: TidyDoc, opt_id: TidyOptionId) -> TidyOption;
    pub fn tidyGetOptionByName(tdoc: TidyDoc, optnam: ctmbstr) -> TidyOption;
    pub fn tidyOptGetId(opt: TidyOption) -> TidyOptionId;
    pub fn tidyOptGetName(opt: TidyOption) -> ctmbstr;
    pub fn tidyOptGetType(opt: TidyOption) -> TidyOptionType;
    pub fn tidyOptIsReadOnly(opt: TidyOption) -> Bool;
    pub fn tidyOptGetCategory(opt: TidyOption) -> TidyConfigCategory;
    pub fn tidyOptGetDefault(opt: TidyOption) -> ctmbstr;
    pub fn tidyOptGetDefaultInt(opt: TidyOption) -> c_ulong;
    pub fn tidyOptGetDefaultBool(opt: TidyOption) -> Bool;
    pub fn tidyOptGetPickList(opt: TidyOption) -> TidyIterator;
    pub fn tidyOptGetNextPick(opt: TidyOption, pos: *mut TidyIterator) -> ctmbstr;
    pub fn tidyOptGetValue(tdoc: TidyDoc, opt_id: TidyOptionId) -> ctmbstr;
    pub fn tidyOptSetValue(tdoc: TidyDoc, opt_id: TidyOptionId, val: ctmbstr) -> Bool;
    pub fn tidyOptParseValue(tdoc: TidyDoc, optnam: ctmbstr, val: ctmbstr) -> Bool;
    pub fn tidyOptGetInt(tdoc: TidyDoc, opt_id: TidyOptionId) -> c_ulong;
    pub fn tidyOptSetInt(tdoc: TidyDoc, opt_id: TidyOptionId, val: c_ulong) -> Bool;
    pub fn tidyOptGetBool(tdoc: TidyDoc, opt_id: TidyOptionId) -> Bool;
    pub fn tidyOptSetBool(tdoc: TidyDoc, opt_id: TidyOptionId, val: Bool) -> Bool;
    pub fn tidyOptResetToDefault(tdoc: TidyDoc, opt_id: TidyOptionId) -> Bool;
    pub fn tidyOptResetAllToDefault(tdoc: TidyDoc) -> Bool;
    pub fn tidyOptSnapshot(tdoc: TidyDoc) -> Bool;
    pub fn tidyOptResetToSnapshot(tdoc: TidyDoc) -> Bool;
    pub fn tidyOptDiffThanDefault(tdoc: TidyDoc) -> Bool;
    pub fn tidyOptDiffThanSnapshot(tdoc: TidyDoc) -> Bool;
    pub fn tidyOptCopyConfig(to: TidyDoc, from: TidyDoc) -> Bool;
    pub fn tidyOptGetEncName(tdoc: TidyDoc, opt_id: TidyOptionId) -> ctmbstr;
    pub fn tidyOptGetCurrPick(tdoc: TidyDoc, opt_id: TidyOptionId) -> ctmbstr;
    pub fn tidyOptGetDeclTagList(tdoc: TidyDoc) -> TidyIterator;
    pub fn tidyOptGetNextDeclTag(
        tdoc: TidyDoc,
        opt_id: TidyOptionId,
        iter: *mut TidyIterator,
    ) -> ctmbstr;
    pub fn tidyOptGetDoc(tdoc: TidyDoc, opt: TidyOption) -> ctmbstr;
    pub fn tidyOptGetDocLinksList(tdoc: TidyDoc, opt: TidyOption) -> TidyIterator;
    pub fn tidyOptGetNextDocLinks(tdoc: TidyDoc, pos: *mut TidyIterator) -> TidyOption;

    // Error output
    pub fn tidySetReportFilter(tdoc: TidyDoc, filter: Option<TidyReportFilter>) -> Bool;
    pub fn tidySetErrorFile(tdoc: TidyDoc, errfilnam: ctmbstr) -> *mut libc::FILE;
    pub fn tidySetErrorBuffer(tdoc: TidyDoc, errbuf: *mut TidyBuffer) -> c_int;
    pub fn tidySetErrorSink(tdoc: TidyDoc, sink: *mut TidyOutputSink) -> c_int;

    // Parse, clean, save
    pub fn tidyParseFile(tdoc: TidyDoc, filename: ctmbstr) -> c_int;
    pub fn tidyParseStdin(tdoc: TidyDoc) -> c_int;
    pub fn tidyParseString(tdoc: TidyDoc, content: ctmbstr) -> c_int;
    pub fn tidyParseBuffer(tdoc: TidyDoc, buf: *mut TidyBuffer) -> c_int;
    pub fn tidyParseSource(tdoc: TidyDoc, source: *mut TidyInputSource) -> c_int;
    pub fn tidyCleanAndRepair(tdoc: TidyDoc) -> c_int;
    pub fn tidyRunDiagnostics(tdoc: TidyDoc) -> c_int;
    pub fn tidyReportDoctype(tdoc: TidyDoc) -> c_int;
    pub fn tidySaveFile(tdoc: TidyDoc, filename: ctmbstr) -> c_int;
    pub fn tidySaveStdout(tdoc: TidyDoc) -> c_int;
    pub fn tidySaveBuffer(tdoc: TidyDoc, buf: *mut TidyBuffer) -> c_int;
    pub fn tidySaveString(tdoc: TidyDoc, buffer: tmbstr, buflen: *mut c_uint) -> c_int;
    pub fn tidySaveSink(tdoc: TidyDoc, sink: *mut TidyOutputSink) -> c_int;
    pub fn tidyOptSaveFile(tdoc: TidyDoc, cfgfil: ctmbstr) -> c_int;
    pub fn tidyOptSaveSink(tdoc: TidyDoc, sink: *mut TidyOutputSink) -> c_int;

    // Tree
    pub fn tidyGetRoot(tdoc: TidyDoc) -> TidyNode;
    pub fn tidyGetHtml(tdoc: TidyDoc) -> TidyNode;
    pub fn tidyGetHead(tdoc: TidyDoc) -> TidyNode;
    pub fn tidyGetBody(tdoc: TidyDoc) -> TidyNode;
    pub fn tidyGetParent(tnod: TidyNode) -> TidyNode;
    pub fn tidyGetChild(tnod: TidyNode) -> TidyNode;
    pub fn tidyGetNext(tnod: TidyNode) -> TidyNode;
    pub fn tidyGetPrev(tnod: TidyNode) -> TidyNode;
    pub fn tidyNodeGetType(tnod: TidyNode) -> TidyNodeType;
    pub fn tidyNodeGetName(tnod: TidyNode) -> ctmbstr;
    pub fn tidyNodeIsText(tnod: TidyNode) -> Bool;
    pub fn tidyNodeIsProp(tdoc: TidyDoc, tnod: TidyNode) -> Bool;
    pub fn tidyNodeIsHeader(tnod: TidyNode) -> Bool;
    pub fn tidyNodeHasText(tdoc: TidyDoc, tnod: TidyNode) -> Bool;
    pub fn tidyNodeGetText(tdoc: TidyDoc, tnod: TidyNode, buf: *mut TidyBuffer) -> Bool;
    pub fn tidyNodeGetValue(tdoc: TidyDoc, tnod: TidyNode, buf: *mut TidyBuffer) -> Bool;
    pub fn tidyNodeGetId(tnod: TidyNode) -> TidyTagId;
    pub fn tidyNodeLine(tnod: TidyNode) -> c_uint;
    pub fn tidyNodeColumn(tnod: TidyNode) -> c_uint;

    // Attributes
    pub fn tidyAttrFirst(tnod: TidyNode) -> TidyAttr;
    pub fn tidyAttrNext(tattr: TidyAttr) -> TidyAttr;
    pub fn tidyAttrName(tattr: TidyAttr) -> ctmbstr;
    pub fn tidyAttrValue(tattr: TidyAttr) -> ctmbstr;
    pub fn tidyAttrGetId(tattr: TidyAttr) -> TidyAttrId;
    pub fn tidyAttrGetById(tnod: TidyNode, att_id: TidyAttrId) -> TidyAttr;

    // Memory hooks
    pub fn tidySetMallocCall(fmalloc: Option<TidyMalloc>) -> Bool;
    pub fn tidySetReallocCall(frealloc: Option<TidyRealloc>) -> Bool;
    pub fn tidySetFreeCall(ffree: Option<TidyFree>) -> Bool;
    pub fn tidySetPanicCall(fpanic: Option<TidyPanic>) -> Bool;

    // Buffers
    pub fn tidyBufInit(buf: *mut TidyBuffer);
    pub fn tidyBufInitWithAllocator(buf: *mut TidyBuffer, allocator: *mut TidyAllocator);
    pub fn tidyBufAlloc(buf: *mut TidyBuffer, alloc_size: c_uint);
    pub fn tidyBufAllocWithAllocator(
        buf: *mut TidyBuffer,
        allocator: *mut TidyAllocator,
        alloc_size: c_uint,
    );
    pub fn tidyBufCheckAlloc(buf: *mut TidyBuffer, alloc_size: c_uint, chunk_size: c_uint);
    pub fn tidyBufFree(buf: *mut TidyBuffer);
    pub fn tidyBufClear(buf: *mut TidyBuffer);
    pub fn tidyBufAttach(buf: *mut TidyBuffer, bp: *mut byte, size: c_uint);
    pub fn tidyBufDetach(buf: *mut TidyBuffer);
    pub fn tidyBufAppend(buf: *mut TidyBuffer, vp: *mut c_void, size: c_uint);
    pub fn tidyBufPutByte(buf: *mut TidyBuffer, bv: byte);
    pub fn tidyBufPopByte(buf: *mut TidyBuffer) -> c_int;
    pub fn tidyBufGetByte(buf: *mut TidyBuffer) -> c_int;
    pub fn tidyBufEndOfInput(buf: *mut TidyBuffer) -> Bool;
    pub fn tidyBufUngetByte(buf: *mut TidyBuffer, bv: byte);

    // Sources and sinks
    pub fn tidyInitSource(
        source: *mut TidyInputSource,
        src_data: *mut c_void,
        gb_func: Option<TidyGetByteFunc>,
        ugb_func: Option<TidyUngetByteFunc>,
        end_func: Option<TidyEOFFunc>,
    ) -> Bool;
    pub fn tidyGetByte(source: *mut TidyInputSource) -> c_uint;
    pub fn tidyUngetByte(source: *mut TidyInputSource, byte_value: c_uint);
    pub fn tidyIsEOF(source: *mut TidyInputSource) -> Bool;
    pub fn tidyInitSink(
        sink: *mut TidyOutputSink,
        snk_data: *mut c_void,
        pb_func: Option<TidyPutByteFunc>,
    ) -> Bool;
    pub fn tidyPutByte(sink: *mut TidyOutputSink, byte_value: c_uint);
    pub fn tidyInitInputBuffer(inp: *mut TidyInputSource, buf: *mut TidyBuffer);
    pub fn tidyInitOutputBuffer(outp: *mut TidyOutputSink, buf: *mut TidyBuffer);
}

/// Borrow a libtidy string as `&str`, `None` for null or non-UTF-8 data.
///
/// # Safety
///
/// `s` must be null or point to a NUL-terminated string that stays valid
/// for `'a`.
pub unsafe fn to_str<'a>(s: ctmbstr) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    std::ffi::CStr::from_ptr(s).to_str().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_str_null() {
        assert_eq!(unsafe { to_str(std::ptr::null()) }, None);
    }

    #[test]
    fn test_to_str_valid() {
        let s = c"tidy";
        assert_eq!(unsafe { to_str(s.as_ptr()) }, Some("tidy"));
    }

    #[test]
    fn test_struct_layout() {
        use std::mem::size_of;
        assert_eq!(size_of::<TidyOutputSink>(), 2 * size_of::<usize>());
        assert_eq!(size_of::<TidyInputSource>(), 4 * size_of::<usize>());
        assert_eq!(size_of::<TidyAllocator>(), size_of::<usize>());
    }
}
