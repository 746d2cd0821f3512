//! `TidyDoc` wrapper
//!
//! A [`Document`] owns one libtidy document: its configuration, its parsed
//! tree and its diagnostics. Every method forwards to the libtidy function
//! of the same purpose and runs the result through [`check`] or
//! [`check_bool`], so failures carry a fixed description of the call that
//! failed.
//!
//! Callbacks (report filter, option callback) and anything libtidy keeps a
//! pointer to (error buffer, error sink, allocator) are owned by the
//! document, so they live exactly as long as libtidy may use them.

use std::any::Any;
use std::cell::Cell;
use std::ffi::{c_uint, c_void, CString};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use crate::alloc::Allocator;
use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::{check, check_bool, Error, Result, Status};
use crate::ffi;
use crate::input_source::InputSource;
use crate::node::Node;
use crate::option::{ConfigOption, DeclTags, DocLinks, OptionId, OptionType, OptionValue, Options};
use crate::output_sink::OutputSink;
use crate::report::{Report, ReportLevel};

type ReportFilter = Box<dyn FnMut(Report<'_>) -> bool>;
type OptionCallback = Box<dyn FnMut(&str, &str) -> bool>;

/// Rust-side state reachable from libtidy callbacks.
#[derive(Default)]
struct Callbacks {
    report_filter: Option<ReportFilter>,
    option_callback: Option<OptionCallback>,
    app_data: Option<Box<dyn Any>>,
}

thread_local! {
    // libtidy's option callback has no context argument; the document
    // currently parsing configuration on this thread is parked here.
    static CONFIG_TARGET: Cell<*mut Callbacks> = const { Cell::new(ptr::null_mut()) };
}

struct ConfigScope(*mut Callbacks);

impl ConfigScope {
    fn enter(state: *mut Callbacks) -> Self {
        Self(CONFIG_TARGET.with(|t| t.replace(state)))
    }
}

impl Drop for ConfigScope {
    fn drop(&mut self) {
        CONFIG_TARGET.with(|t| t.set(self.0));
    }
}

pub struct Document {
    raw: ffi::TidyDoc,
    state: *mut Callbacks,
    error_buffer: Option<Box<Buffer>>,
    error_sink: Option<OutputSink<'static>>,
    allocator: Option<Arc<Allocator>>,
}

impl Document {
    pub fn new() -> Self {
        Self::from_raw(unsafe { ffi::tidyCreate() }, None)
    }

    /// Create a document whose every allocation goes through `allocator`.
    pub fn with_allocator(allocator: Arc<Allocator>) -> Self {
        let raw = unsafe { ffi::tidyCreateWithAllocator(Allocator::as_raw(&allocator)) };
        Self::from_raw(raw, Some(allocator))
    }

    fn from_raw(raw: ffi::TidyDoc, allocator: Option<Arc<Allocator>>) -> Self {
        let state = Box::into_raw(Box::<Callbacks>::default());
        unsafe { ffi::tidySetAppData(raw, state as *mut c_void) };
        log::debug!("created tidy document {:p}", raw);
        Self {
            raw,
            state,
            error_buffer: None,
            error_sink: None,
            allocator,
        }
    }

    fn callbacks(&mut self) -> &mut Callbacks {
        unsafe { &mut *self.state }
    }

    pub fn allocator(&self) -> Option<&Arc<Allocator>> {
        self.allocator.as_ref()
    }

    // ========================================================================
    // Application data
    // ========================================================================

    /// Attach arbitrary data to the document, replacing what was there.
    pub fn set_app_data<T: Any>(&mut self, data: T) {
        self.callbacks().app_data = Some(Box::new(data));
    }

    pub fn app_data<T: Any>(&self) -> Option<&T> {
        unsafe { &*self.state }.app_data.as_ref()?.downcast_ref()
    }

    pub fn app_data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.callbacks().app_data.as_mut()?.downcast_mut()
    }

    /// Remove the attached data if it is a `T`.
    pub fn take_app_data<T: Any>(&mut self) -> Option<T> {
        let state = self.callbacks();
        if !state.app_data.as_ref()?.is::<T>() {
            return None;
        }
        state.app_data.take()?.downcast::<T>().ok().map(|b| *b)
    }

    // ========================================================================
    // Status and diagnostics
    // ========================================================================

    /// Highest severity seen so far: 0 clean, 1 warnings, 2 errors.
    pub fn status(&self) -> i32 {
        unsafe { ffi::tidyStatus(self.raw) }
    }

    /// HTML version number of the parsed document, e.g. 500 for HTML5.
    pub fn detected_html_version(&self) -> i32 {
        unsafe { ffi::tidyDetectedHtmlVersion(self.raw) }
    }

    pub fn is_xhtml(&self) -> bool {
        unsafe { ffi::tidyDetectedXhtml(self.raw) != ffi::NO }
    }

    pub fn is_generic_xml(&self) -> bool {
        unsafe { ffi::tidyDetectedGenericXml(self.raw) != ffi::NO }
    }

    pub fn error_count(&self) -> u32 {
        unsafe { ffi::tidyErrorCount(self.raw) }
    }

    pub fn warning_count(&self) -> u32 {
        unsafe { ffi::tidyWarningCount(self.raw) }
    }

    pub fn access_warning_count(&self) -> u32 {
        unsafe { ffi::tidyAccessWarningCount(self.raw) }
    }

    pub fn config_error_count(&self) -> u32 {
        unsafe { ffi::tidyConfigErrorCount(self.raw) }
    }

    /// Write the error summary to the error output.
    pub fn error_summary(&mut self) {
        unsafe { ffi::tidyErrorSummary(self.raw) };
    }

    /// Write general usage information to the error output.
    pub fn general_info(&mut self) {
        unsafe { ffi::tidyGeneralInfo(self.raw) };
    }

    /// Report the doctype found and the one that will be emitted.
    pub fn report_doctype(&mut self) -> Result<Status> {
        check(
            unsafe { ffi::tidyReportDoctype(self.raw) },
            "document.report_doctype: failed to report doctype.",
        )
    }

    pub fn run_diagnostics(&mut self) -> Result<Status> {
        check(
            unsafe { ffi::tidyRunDiagnostics(self.raw) },
            "document.run_diagnostics: failed to run configured diagnostics on parsed and repaired markup.",
        )
    }

    // ========================================================================
    // Configuration files and encodings
    // ========================================================================

    pub fn load_config<P: AsRef<Path>>(&mut self, path: P) -> Result<Status> {
        let path = path_cstring(path.as_ref())?;
        let _scope = ConfigScope::enter(self.state);
        check(
            unsafe { ffi::tidyLoadConfig(self.raw, path.as_ptr()) },
            "document.load_config: failed to load config file.",
        )
    }

    /// Load a config file written in `charenc`.
    pub fn load_config_enc<P: AsRef<Path>>(&mut self, path: P, charenc: &str) -> Result<Status> {
        let path = path_cstring(path.as_ref())?;
        let charenc = CString::new(charenc)?;
        let _scope = ConfigScope::enter(self.state);
        check(
            unsafe { ffi::tidyLoadConfigEnc(self.raw, path.as_ptr(), charenc.as_ptr()) },
            "document.load_config_enc: failed to load config file.",
        )
    }

    pub fn file_exists<P: AsRef<Path>>(&self, path: P) -> bool {
        match path_cstring(path.as_ref()) {
            Ok(path) => unsafe { ffi::tidyFileExists(self.raw, path.as_ptr()) != ffi::NO },
            Err(_) => false,
        }
    }

    /// Set both input and output encodings.
    pub fn set_char_encoding(&mut self, charenc: &str) -> Result<Status> {
        let charenc = CString::new(charenc)?;
        check(
            unsafe { ffi::tidySetCharEncoding(self.raw, charenc.as_ptr()) },
            "document.set_char_encoding: failed to set char encoding.",
        )
    }

    pub fn set_in_char_encoding(&mut self, charenc: &str) -> Result<Status> {
        let charenc = CString::new(charenc)?;
        check(
            unsafe { ffi::tidySetInCharEncoding(self.raw, charenc.as_ptr()) },
            "document.set_in_char_encoding: failed to set input char encoding.",
        )
    }

    pub fn set_out_char_encoding(&mut self, charenc: &str) -> Result<Status> {
        let charenc = CString::new(charenc)?;
        check(
            unsafe { ffi::tidySetOutCharEncoding(self.raw, charenc.as_ptr()) },
            "document.set_out_char_encoding: failed to set output char encoding.",
        )
    }

    /// Handle options libtidy does not recognise while reading configuration.
    ///
    /// The callback receives the option name and value and returns whether
    /// it accepted them; rejected options are reported as config errors.
    pub fn set_option_callback<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> bool + 'static,
    {
        self.callbacks().option_callback = Some(Box::new(callback));
        check_bool(
            unsafe { ffi::tidySetOptionCallback(self.raw, Some(option_trampoline)) },
            "document.set_option_callback: failed to set option callback. Invalid/NULL callback pointer?",
        )
    }

    /// Apply every setting in `config`, stopping at the first rejected one.
    pub fn apply(&mut self, config: &Config) -> Result<()> {
        for (name, value) in config.iter() {
            log::debug!("applying tidy option {} = {}", name, value);
            self.opt_parse_value(name, value)?;
        }
        Ok(())
    }

    // ========================================================================
    // Options
    // ========================================================================

    pub fn options(&self) -> Options<'_> {
        Options {
            doc: self.raw,
            iter: unsafe { ffi::tidyGetOptionList(self.raw) },
            _doc: PhantomData,
        }
    }

    pub fn option(&self, id: OptionId) -> Option<ConfigOption<'_>> {
        ConfigOption::from_raw(unsafe { ffi::tidyGetOption(self.raw, id.0) })
    }

    pub fn option_by_name(&self, name: &str) -> Result<Option<ConfigOption<'_>>> {
        let name = CString::new(name)?;
        Ok(ConfigOption::from_raw(unsafe {
            ffi::tidyGetOptionByName(self.raw, name.as_ptr())
        }))
    }

    /// Current value of a string option.
    pub fn opt_get_value(&self, id: OptionId) -> Option<&str> {
        unsafe { ffi::to_str(ffi::tidyOptGetValue(self.raw, id.0)) }
    }

    pub fn opt_set_value(&mut self, id: OptionId, value: &str) -> Result<()> {
        let value = CString::new(value)?;
        check_bool(
            unsafe { ffi::tidyOptSetValue(self.raw, id.0, value.as_ptr()) },
            "document.opt_set_value: failed to set option value.",
        )
    }

    /// Set an option by name from its textual form, as a config file would.
    pub fn opt_parse_value(&mut self, name: &str, value: &str) -> Result<()> {
        let name = CString::new(name)?;
        let value = CString::new(value)?;
        let _scope = ConfigScope::enter(self.state);
        check_bool(
            unsafe { ffi::tidyOptParseValue(self.raw, name.as_ptr(), value.as_ptr()) },
            "document.opt_parse_value: failed to parse option value.",
        )
    }

    pub fn opt_get_int(&self, id: OptionId) -> u64 {
        unsafe { ffi::tidyOptGetInt(self.raw, id.0) as u64 }
    }

    pub fn opt_set_int(&mut self, id: OptionId, value: u64) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyOptSetInt(self.raw, id.0, value as _) },
            "document.opt_set_int: failed to set option value.",
        )
    }

    pub fn opt_get_bool(&self, id: OptionId) -> bool {
        unsafe { ffi::tidyOptGetBool(self.raw, id.0) != ffi::NO }
    }

    pub fn opt_set_bool(&mut self, id: OptionId, value: bool) -> Result<()> {
        let value = if value { ffi::YES } else { ffi::NO };
        check_bool(
            unsafe { ffi::tidyOptSetBool(self.raw, id.0, value) },
            "document.opt_set_bool: failed to set option value.",
        )
    }

    /// Read an option according to its declared type.
    pub fn opt_value(&self, id: OptionId) -> Result<OptionValue> {
        let opt = self
            .option(id)
            .ok_or_else(|| Error::UnknownOption(format!("#{}", id.0)))?;
        Ok(match opt.option_type() {
            Some(OptionType::Integer) => OptionValue::Integer(self.opt_get_int(id)),
            Some(OptionType::Boolean) => OptionValue::Boolean(self.opt_get_bool(id)),
            _ => OptionValue::String(self.opt_get_value(id).map(str::to_owned)),
        })
    }

    pub fn opt_reset(&mut self, id: OptionId) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyOptResetToDefault(self.raw, id.0) },
            "document.opt_reset: failed to reset option value.",
        )
    }

    pub fn opt_reset_all(&mut self) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyOptResetAllToDefault(self.raw) },
            "document.opt_reset_all: failed to reset options.",
        )
    }

    /// Remember the current settings for [`Document::opt_restore_snapshot`].
    pub fn opt_snapshot(&mut self) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyOptSnapshot(self.raw) },
            "document.opt_snapshot: failed to create options snapshot.",
        )
    }

    pub fn opt_restore_snapshot(&mut self) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyOptResetToSnapshot(self.raw) },
            "document.opt_restore_snapshot: failed to restore options snapshot.",
        )
    }

    pub fn opt_diff_than_default(&self) -> bool {
        unsafe { ffi::tidyOptDiffThanDefault(self.raw) != ffi::NO }
    }

    pub fn opt_diff_than_snapshot(&self) -> bool {
        unsafe { ffi::tidyOptDiffThanSnapshot(self.raw) != ffi::NO }
    }

    /// Copy every setting of `other` into this document.
    pub fn opt_copy_config(&mut self, other: &Document) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyOptCopyConfig(self.raw, other.raw) },
            "document.opt_copy_config: failed to copy config.",
        )
    }

    /// Name of the encoding selected by an encoding option.
    pub fn opt_get_enc_name(&self, id: OptionId) -> Option<&str> {
        unsafe { ffi::to_str(ffi::tidyOptGetEncName(self.raw, id.0)) }
    }

    /// Label of the current choice of a pick-list option.
    pub fn opt_get_curr_pick(&self, id: OptionId) -> Option<&str> {
        unsafe { ffi::to_str(ffi::tidyOptGetCurrPick(self.raw, id.0)) }
    }

    /// Tags declared through one of the `new-*-tags` options.
    pub fn decl_tags(&self, id: OptionId) -> DeclTags<'_> {
        DeclTags {
            doc: self.raw,
            opt: id,
            iter: unsafe { ffi::tidyOptGetDeclTagList(self.raw) },
            _doc: PhantomData,
        }
    }

    /// Documentation text for an option.
    pub fn opt_get_doc(&self, opt: &ConfigOption<'_>) -> Option<&str> {
        unsafe { ffi::to_str(ffi::tidyOptGetDoc(self.raw, opt.raw)) }
    }

    /// Options the documentation of `opt` refers to.
    pub fn opt_doc_links(&self, opt: &ConfigOption<'_>) -> DocLinks<'_> {
        DocLinks {
            doc: self.raw,
            iter: unsafe { ffi::tidyOptGetDocLinksList(self.raw, opt.raw) },
            _doc: PhantomData,
        }
    }

    // ========================================================================
    // Diagnostic output
    // ========================================================================

    /// Inspect each diagnostic before it is written; return `false` to drop it.
    pub fn set_report_filter<F>(&mut self, filter: F) -> Result<()>
    where
        F: FnMut(Report<'_>) -> bool + 'static,
    {
        self.callbacks().report_filter = Some(Box::new(filter));
        check_bool(
            unsafe { ffi::tidySetReportFilter(self.raw, Some(report_trampoline)) },
            "document.set_report_filter: failed to set filter callback.",
        )
    }

    /// Send diagnostics to a file, created or truncated as needed.
    pub fn set_error_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path_cstring(path.as_ref())?;
        let file = unsafe { ffi::tidySetErrorFile(self.raw, path.as_ptr()) };
        if file.is_null() {
            log::warn!("document.set_error_file: failed to set/create error file.");
            return Err(Error::Rejected {
                context: "document.set_error_file: failed to set/create error file.",
            });
        }
        Ok(())
    }

    /// Collect diagnostics in `buf`, which the document keeps from now on.
    pub fn set_error_buffer(&mut self, buf: Buffer) -> Result<Status> {
        let mut buf = Box::new(buf);
        let status = check(
            unsafe { ffi::tidySetErrorBuffer(self.raw, buf.as_raw()) },
            "document.set_error_buffer: failed to set error buffer.",
        )?;
        self.error_buffer = Some(buf);
        Ok(status)
    }

    /// The buffer installed with [`Document::set_error_buffer`].
    pub fn error_buffer(&self) -> Option<&Buffer> {
        self.error_buffer.as_deref()
    }

    /// Send diagnostics to `sink`, which the document keeps from now on.
    pub fn set_error_sink(&mut self, mut sink: OutputSink<'static>) -> Result<Status> {
        let status = check(
            unsafe { ffi::tidySetErrorSink(self.raw, sink.as_raw()) },
            "document.set_error_sink: failed to set error sink.",
        )?;
        self.error_sink = Some(sink);
        Ok(status)
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    pub fn parse_string(&mut self, content: &str) -> Result<Status> {
        let content = CString::new(content)?;
        check(
            unsafe { ffi::tidyParseString(self.raw, content.as_ptr()) },
            "document.parse_string: failed to parse string.",
        )
    }

    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Status> {
        let path = path_cstring(path.as_ref())?;
        check(
            unsafe { ffi::tidyParseFile(self.raw, path.as_ptr()) },
            "document.parse_file: failed to parse named file.",
        )
    }

    pub fn parse_stdin(&mut self) -> Result<Status> {
        check(
            unsafe { ffi::tidyParseStdin(self.raw) },
            "document.parse_stdin: failed to parse stdin.",
        )
    }

    pub fn parse_buffer(&mut self, buf: &mut Buffer) -> Result<Status> {
        check(
            unsafe { ffi::tidyParseBuffer(self.raw, buf.as_raw()) },
            "document.parse_buffer: failed to parse buffer.",
        )
    }

    pub fn parse_source(&mut self, source: &mut InputSource<'_>) -> Result<Status> {
        check(
            unsafe { ffi::tidyParseSource(self.raw, source.as_raw()) },
            "document.parse_source: failed to parse generic input source.",
        )
    }

    /// Run the configured cleanup and repair passes over the parsed tree.
    pub fn clean_and_repair(&mut self) -> Result<Status> {
        check(
            unsafe { ffi::tidyCleanAndRepair(self.raw) },
            "document.clean_and_repair: failed to execute configured cleanup and repair operations.",
        )
    }

    // ========================================================================
    // Saving
    // ========================================================================

    pub fn save_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Status> {
        let path = path_cstring(path.as_ref())?;
        check(
            unsafe { ffi::tidySaveFile(self.raw, path.as_ptr()) },
            "document.save_file: failed to save to named file.",
        )
    }

    pub fn save_stdout(&mut self) -> Result<Status> {
        check(
            unsafe { ffi::tidySaveStdout(self.raw) },
            "document.save_stdout: failed to save to stdout.",
        )
    }

    /// Append the pretty-printed document to `buf`.
    pub fn save_buffer(&mut self, buf: &mut Buffer) -> Result<Status> {
        check(
            unsafe { ffi::tidySaveBuffer(self.raw, buf.as_raw()) },
            "document.save_buffer: failed to save to buffer.",
        )
    }

    /// Write into `out`, returning the number of bytes used.
    ///
    /// Fails with [`Error::BufferTooSmall`] carrying the size required when
    /// `out` cannot hold the whole document.
    pub fn save_string(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut len = out.len() as c_uint;
        let code =
            unsafe { ffi::tidySaveString(self.raw, out.as_mut_ptr() as ffi::tmbstr, &mut len) };
        if code == -libc::ENOMEM {
            return Err(Error::BufferTooSmall {
                needed: len as usize,
            });
        }
        check(code, "document.save_string: failed to save to string.")?;
        Ok(len as usize)
    }

    /// Pretty-print the document into a new `String`.
    pub fn save_to_string(&mut self) -> Result<String> {
        let mut buf = Buffer::new();
        self.save_buffer(&mut buf)?;
        Ok(buf.to_string_lossy())
    }

    pub fn save_sink(&mut self, sink: &mut OutputSink<'_>) -> Result<Status> {
        check(
            unsafe { ffi::tidySaveSink(self.raw, sink.as_raw()) },
            "document.save_sink: failed to save to given output sink.",
        )
    }

    /// Write the settings that differ from the defaults as a config file.
    pub fn opt_save_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Status> {
        let path = path_cstring(path.as_ref())?;
        check(
            unsafe { ffi::tidyOptSaveFile(self.raw, path.as_ptr()) },
            "document.opt_save_file: failed to save config to file.",
        )
    }

    pub fn opt_save_sink(&mut self, sink: &mut OutputSink<'_>) -> Result<Status> {
        check(
            unsafe { ffi::tidyOptSaveSink(self.raw, sink.as_raw()) },
            "document.opt_save_sink: failed to save settings to generic output sink.",
        )
    }

    // ========================================================================
    // Tree
    // ========================================================================

    pub fn root(&self) -> Option<Node<'_>> {
        Node::from_raw(unsafe { ffi::tidyGetRoot(self.raw) })
    }

    pub fn html(&self) -> Option<Node<'_>> {
        Node::from_raw(unsafe { ffi::tidyGetHtml(self.raw) })
    }

    pub fn head(&self) -> Option<Node<'_>> {
        Node::from_raw(unsafe { ffi::tidyGetHead(self.raw) })
    }

    pub fn body(&self) -> Option<Node<'_>> {
        Node::from_raw(unsafe { ffi::tidyGetBody(self.raw) })
    }

    /// Whether the node is a proprietary (non-standard) element.
    pub fn node_is_prop(&self, node: Node<'_>) -> bool {
        unsafe { ffi::tidyNodeIsProp(self.raw, node.raw) != ffi::NO }
    }

    pub fn node_has_text(&self, node: Node<'_>) -> bool {
        unsafe { ffi::tidyNodeHasText(self.raw, node.raw) != ffi::NO }
    }

    /// Append the node's markup, as it would be saved, to `buf`.
    pub fn node_get_text(&self, node: Node<'_>, buf: &mut Buffer) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyNodeGetText(self.raw, node.raw, buf.as_raw()) },
            "document.node_get_text: failed to retrieve node text.",
        )
    }

    /// Append the raw value of a text-like node to `buf`.
    pub fn node_get_value(&self, node: Node<'_>, buf: &mut Buffer) -> Result<()> {
        check_bool(
            unsafe { ffi::tidyNodeGetValue(self.raw, node.raw, buf.as_raw()) },
            "document.node_get_value: failed to retrieve node value.",
        )
    }

    pub fn node_text(&self, node: Node<'_>) -> Result<String> {
        let mut buf = Buffer::new();
        self.node_get_text(node, &mut buf)?;
        Ok(buf.to_string_lossy())
    }

    pub fn node_value(&self, node: Node<'_>) -> Result<String> {
        let mut buf = Buffer::new();
        self.node_get_value(node, &mut buf)?;
        Ok(buf.to_string_lossy())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("status", &self.status())
            .field("errors", &self.error_count())
            .field("warnings", &self.warning_count())
            .finish()
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        log::debug!("releasing tidy document {:p}", self.raw);
        unsafe {
            ffi::tidyRelease(self.raw);
            drop(Box::from_raw(self.state));
        }
    }
}

#[cfg(unix)]
fn path_cstring(path: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    Ok(CString::new(path.as_os_str().as_bytes())?)
}

#[cfg(not(unix))]
fn path_cstring(path: &Path) -> Result<CString> {
    Ok(CString::new(path.to_string_lossy().as_bytes())?)
}

unsafe extern "C" fn report_trampoline(
    tdoc: ffi::TidyDoc,
    level: ffi::TidyReportLevel,
    line: c_uint,
    column: c_uint,
    message: ffi::ctmbstr,
) -> ffi::Bool {
    let state = ffi::tidyGetAppData(tdoc) as *mut Callbacks;
    let Some(filter) = state.as_mut().and_then(|s| s.report_filter.as_mut()) else {
        return ffi::YES;
    };
    let report = Report {
        level: ReportLevel::from_raw(level),
        line,
        column,
        message: ffi::to_str(message).unwrap_or(""),
    };
    match catch_unwind(AssertUnwindSafe(|| filter(report))) {
        Ok(true) => ffi::YES,
        Ok(false) => ffi::NO,
        Err(_) => {
            log::error!("report filter panicked; letting the message through");
            ffi::YES
        }
    }
}

unsafe extern "C" fn option_trampoline(name: ffi::ctmbstr, value: ffi::ctmbstr) -> ffi::Bool {
    let state = CONFIG_TARGET.with(|t| t.get());
    let Some(callback) = state.as_mut().and_then(|s| s.option_callback.as_mut()) else {
        return ffi::NO;
    };
    let name = ffi::to_str(name).unwrap_or("");
    let value = ffi::to_str(value).unwrap_or("");
    match catch_unwind(AssertUnwindSafe(|| callback(name, value))) {
        Ok(true) => ffi::YES,
        Ok(false) => ffi::NO,
        Err(_) => {
            log::error!("option callback panicked on `{}`", name);
            ffi::NO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::tests::CountingAllocator;
    use crate::output_sink::ByteSink;
    use crate::input_source::SliceSource;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::Ordering;

    fn opt(name: &str) -> OptionId {
        OptionId::from_name(name).unwrap().unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tidyrs-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_parse_clean_save() {
        let mut doc = Document::new();
        let status = doc.parse_string("<title>Foo</title><p>Foo!").unwrap();
        assert_eq!(status, Status::Warnings);
        assert!(doc.warning_count() > 0);
        assert_eq!(doc.error_count(), 0);
        doc.clean_and_repair().unwrap();

        let out = doc.save_to_string().unwrap();
        assert!(out.contains("<title>Foo</title>"));
        assert!(out.contains("<p>Foo!</p>"));
        assert!(!doc.is_xhtml());
        assert!(!doc.is_generic_xml());
    }

    #[test]
    fn test_errors_become_err() {
        let mut doc = Document::new();
        let err = doc.parse_string("<p><foo>bar</foo></p>").unwrap_err();
        assert_eq!(err.code(), Some(2));
        assert_eq!(
            err.context(),
            Some("document.parse_string: failed to parse string.")
        );
        assert!(doc.error_count() > 0);
        assert_eq!(doc.status(), 2);
    }

    #[test]
    fn test_nul_in_input() {
        let mut doc = Document::new();
        assert!(matches!(doc.parse_string("a\0b"), Err(Error::NulByte(_))));
    }

    #[test]
    fn test_bool_and_int_options() {
        let mut doc = Document::new();
        let xhtml = opt("output-xhtml");
        let wrap = opt("wrap");

        assert!(!doc.opt_diff_than_default());
        doc.opt_set_bool(xhtml, true).unwrap();
        assert!(doc.opt_get_bool(xhtml));
        assert_eq!(doc.opt_get_curr_pick(xhtml), Some("yes"));
        doc.opt_set_int(wrap, 120).unwrap();
        assert_eq!(doc.opt_get_int(wrap), 120);
        assert_eq!(doc.opt_value(wrap).unwrap(), OptionValue::Integer(120));
        assert!(doc.opt_diff_than_default());

        doc.opt_reset(wrap).unwrap();
        assert_eq!(doc.opt_get_int(wrap), 68);
        doc.opt_reset_all().unwrap();
        assert!(!doc.opt_get_bool(xhtml));
        assert!(!doc.opt_diff_than_default());
    }

    #[test]
    fn test_string_options() {
        let mut doc = Document::new();
        let alt = opt("alt-text");
        doc.opt_set_value(alt, "image").unwrap();
        assert_eq!(doc.opt_get_value(alt), Some("image"));
        assert_eq!(
            doc.opt_value(alt).unwrap(),
            OptionValue::String(Some("image".to_string()))
        );

        doc.opt_parse_value("indent-spaces", "4").unwrap();
        assert_eq!(doc.opt_get_int(opt("indent-spaces")), 4);

        let err = doc.opt_parse_value("no-such-option", "1").unwrap_err();
        assert_eq!(
            err.context(),
            Some("document.opt_parse_value: failed to parse option value.")
        );
    }

    #[test]
    fn test_snapshot_and_copy() {
        let mut doc = Document::new();
        let indent = opt("indent-spaces");
        doc.opt_snapshot().unwrap();
        doc.opt_set_int(indent, 8).unwrap();
        assert!(doc.opt_diff_than_snapshot());
        doc.opt_restore_snapshot().unwrap();
        assert!(!doc.opt_diff_than_snapshot());
        assert_eq!(doc.opt_get_int(indent), 2);

        let mut source = Document::new();
        source.opt_set_int(indent, 6).unwrap();
        doc.opt_copy_config(&source).unwrap();
        assert_eq!(doc.opt_get_int(indent), 6);
    }

    #[test]
    fn test_encoding() {
        let mut doc = Document::new();
        assert_eq!(doc.set_char_encoding("utf8").unwrap(), Status::Clean);
        doc.set_in_char_encoding("latin1").unwrap();
        doc.set_out_char_encoding("utf8").unwrap();
        assert_eq!(doc.opt_get_enc_name(opt("output-encoding")), Some("utf8"));
        assert!(doc.set_char_encoding("klingon").is_err());
    }

    #[test]
    fn test_config_file_and_option_callback() {
        let path = temp_path("config.txt");
        std::fs::write(&path, "indent-spaces: 5\nx-app-setting: on\n").unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut doc = Document::new();
        let recorded = seen.clone();
        doc.set_option_callback(move |name, value| {
            recorded.borrow_mut().push((name.to_string(), value.to_string()));
            name.starts_with("x-app-")
        })
        .unwrap();

        doc.load_config(&path).unwrap();
        assert_eq!(doc.opt_get_int(opt("indent-spaces")), 5);
        assert!(seen.borrow().iter().any(|(n, _)| n == "x-app-setting"));

        doc.opt_parse_value("x-app-other", "1").unwrap();
        assert!(doc.opt_parse_value("y-unhandled", "1").is_err());

        assert!(doc.file_exists(&path));
        std::fs::remove_file(&path).unwrap();
        assert!(!doc.file_exists(&path));
        assert!(doc.load_config(&path).is_err());
    }

    #[test]
    fn test_opt_save_and_reload() {
        let path = temp_path("saved.cfg");
        let mut doc = Document::new();
        doc.opt_set_int(opt("indent-spaces"), 7).unwrap();
        doc.opt_save_file(&path).unwrap();

        let mut other = Document::new();
        other.load_config(&path).unwrap();
        assert_eq!(other.opt_get_int(opt("indent-spaces")), 7);
        std::fs::remove_file(&path).unwrap();

        let mut out = Vec::new();
        {
            let mut sink = OutputSink::new(&mut out).unwrap();
            doc.opt_save_sink(&mut sink).unwrap();
        }
        assert!(String::from_utf8_lossy(&out).contains("indent-spaces: 7"));
    }

    #[test]
    fn test_decl_tags() {
        let mut doc = Document::new();
        doc.opt_parse_value("new-blocklevel-tags", "panel, card").unwrap();
        let tags: Vec<_> = doc.decl_tags(opt("new-blocklevel-tags")).collect();
        assert!(tags.contains(&"panel"));
        assert!(tags.contains(&"card"));
        assert_eq!(doc.decl_tags(opt("new-inline-tags")).count(), 0);
    }

    #[test]
    fn test_option_docs() {
        let doc = Document::new();
        let indent = doc.option(opt("indent")).unwrap();
        assert!(doc.opt_get_doc(&indent).is_some_and(|d| !d.is_empty()));
        for link in doc.opt_doc_links(&indent) {
            assert!(!link.name().is_empty());
        }
    }

    #[test]
    fn test_report_filter() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let mut doc = Document::new();
        doc.set_error_buffer(Buffer::new()).unwrap();
        let sink = reports.clone();
        doc.set_report_filter(move |r| {
            sink.borrow_mut().push((r.level, r.message.to_string()));
            false
        })
        .unwrap();

        doc.parse_string("<p>no doctype").unwrap();
        let reports = reports.borrow();
        assert!(!reports.is_empty());
        assert!(reports.iter().any(|(_, m)| m.contains("DOCTYPE")));
        assert!(!doc.error_buffer().unwrap().to_string_lossy().contains("DOCTYPE"));
    }

    #[test]
    fn test_error_buffer() {
        let mut doc = Document::new();
        doc.set_error_buffer(Buffer::new()).unwrap();
        doc.parse_string("<p>no doctype").unwrap();
        let errors = doc.error_buffer().unwrap().to_string_lossy();
        assert!(errors.contains("DOCTYPE"));
    }

    #[test]
    fn test_error_sink() {
        struct Shared(Rc<RefCell<Vec<u8>>>);

        impl ByteSink for Shared {
            fn put_byte(&mut self, byte: u8) {
                self.0.borrow_mut().push(byte);
            }
        }

        let out = Rc::new(RefCell::new(Vec::new()));
        let mut doc = Document::new();
        doc.set_error_sink(OutputSink::new(Shared(out.clone())).unwrap())
            .unwrap();
        doc.parse_string("<p>no doctype").unwrap();
        assert!(String::from_utf8_lossy(&out.borrow()).contains("DOCTYPE"));
    }

    #[test]
    fn test_parse_buffer_and_source() {
        let mut doc = Document::new();
        let mut buf = Buffer::from("<title>B</title><p>from buffer");
        doc.parse_buffer(&mut buf).unwrap();
        assert!(doc.save_to_string().unwrap().contains("from buffer"));

        let mut doc = Document::new();
        let mut src =
            InputSource::new(SliceSource::new(b"<title>S</title><p>from source")).unwrap();
        doc.parse_source(&mut src).unwrap();
        assert!(doc.save_to_string().unwrap().contains("from source"));
    }

    #[test]
    fn test_save_string() {
        let mut doc = Document::new();
        doc.parse_string("<title>x</title><p>y").unwrap();

        let mut small = [0u8; 4];
        let needed = match doc.save_string(&mut small) {
            Err(Error::BufferTooSmall { needed }) => needed,
            other => panic!("expected BufferTooSmall, got {:?}", other),
        };
        assert!(needed > 4);

        let mut big = vec![0u8; needed];
        let used = doc.save_string(&mut big).unwrap();
        assert_eq!(used, needed);
        assert!(String::from_utf8_lossy(&big[..used]).contains("<p>y</p>"));
    }

    #[test]
    fn test_save_sink_and_file() {
        let mut doc = Document::new();
        doc.parse_string("<title>x</title><p>sink").unwrap();

        let mut out = Vec::new();
        {
            let mut sink = OutputSink::new(&mut out).unwrap();
            doc.save_sink(&mut sink).unwrap();
        }
        assert!(String::from_utf8_lossy(&out).contains("<p>sink</p>"));

        let path = temp_path("out.html");
        doc.save_file(&path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(saved.contains("<p>sink</p>"));
    }

    #[test]
    fn test_parse_file() {
        let path = temp_path("in.html");
        std::fs::write(&path, "<title>f</title><p>file body").unwrap();
        let mut doc = Document::new();
        doc.parse_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let body = doc.body().unwrap();
        assert_eq!(doc.node_value(body.child().unwrap().child().unwrap()).unwrap(), "file body");
    }

    #[test]
    fn test_error_file() {
        let path = temp_path("errors.txt");
        let mut doc = Document::new();
        doc.set_error_file(&path).unwrap();
        doc.parse_string("<p>no doctype").unwrap();
        drop(doc);
        let errors = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(errors.contains("DOCTYPE"));
    }

    #[test]
    fn test_node_text() {
        let mut doc = Document::new();
        doc.parse_string("<title>t</title><p>hello <b>world</b></p>")
            .unwrap();
        let p = doc.body().unwrap().child().unwrap();
        assert!(doc.node_has_text(p.child().unwrap()));
        assert!(!doc.node_is_prop(p));
        let text = doc.node_text(p).unwrap();
        assert!(text.contains("<b>world</b>"));
        assert_eq!(doc.node_value(p.child().unwrap()).unwrap(), "hello ");
    }

    #[test]
    fn test_app_data() {
        let mut doc = Document::new();
        assert!(doc.app_data::<u32>().is_none());
        doc.set_app_data(41u32);
        *doc.app_data_mut::<u32>().unwrap() += 1;
        assert_eq!(doc.app_data::<u32>(), Some(&42));
        assert!(doc.app_data::<String>().is_none());
        assert!(doc.take_app_data::<String>().is_none());
        assert_eq!(doc.take_app_data::<u32>(), Some(42));
        assert!(doc.app_data::<u32>().is_none());
    }

    #[test]
    fn test_custom_allocator() {
        let counting = CountingAllocator::default();
        let allocs = counting.allocs.clone();
        let frees = counting.frees.clone();
        {
            let mut doc = Document::with_allocator(Allocator::new(counting));
            doc.parse_string("<title>a</title><p>alloc").unwrap();
            assert!(doc.allocator().is_some());
        }
        assert!(allocs.load(Ordering::SeqCst) > 0);
        assert!(frees.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_apply_config() {
        let mut config = Config::new();
        config.set("indent", "auto").set("indent-spaces", "3");
        let mut doc = Document::new();
        doc.apply(&config).unwrap();
        assert_eq!(doc.opt_get_int(opt("indent-spaces")), 3);
    }

    #[test]
    fn test_diagnostics() {
        let mut doc = Document::new();
        doc.set_error_buffer(Buffer::new()).unwrap();
        doc.parse_string("<!DOCTYPE html><title>d</title><p>diagnosed")
            .unwrap();
        assert!(doc.detected_html_version() >= 500);
        doc.clean_and_repair().unwrap();
        doc.run_diagnostics().unwrap();
        doc.report_doctype().unwrap();
        assert_eq!(doc.access_warning_count(), 0);
        assert_eq!(doc.config_error_count(), 0);

        let before = doc.error_buffer().unwrap().len();
        doc.error_summary();
        doc.general_info();
        assert!(doc.error_buffer().unwrap().len() > before);
    }

    #[test]
    fn test_config_errors_counted() {
        let mut doc = Document::new();
        assert!(doc.opt_parse_value("no-such-option", "1").is_err());
        assert!(doc.config_error_count() > 0);
    }

    #[test]
    fn test_load_config_enc() {
        let path = temp_path("config-enc.txt");
        std::fs::write(&path, "indent-spaces: 9\nalt-text: caf\u{e9}\n").unwrap();
        let mut doc = Document::new();
        doc.load_config_enc(&path, "utf8").unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(doc.opt_get_int(opt("indent-spaces")), 9);
        assert_eq!(doc.opt_get_value(opt("alt-text")), Some("caf\u{e9}"));
    }

    #[test]
    fn test_panicking_report_filter() {
        let mut doc = Document::new();
        doc.set_error_buffer(Buffer::new()).unwrap();
        doc.set_report_filter(|_| panic!("filter exploded")).unwrap();
        doc.parse_string("<p>no doctype").unwrap();
        let errors = doc.error_buffer().unwrap().to_string_lossy();
        assert!(errors.contains("DOCTYPE"));
    }

    #[test]
    fn test_panicking_option_callback() {
        let mut doc = Document::new();
        doc.set_option_callback(|_, _| panic!("callback exploded"))
            .unwrap();
        let err = doc.opt_parse_value("x-app-flag", "1").unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        doc.opt_parse_value("indent-spaces", "3").unwrap();
    }
}
