//! `TidyOption` wrapper and option identifiers
//!
//! Option ids are numbered differently across libtidy releases, so they are
//! looked up by name at runtime instead of being hard-coded.

use std::ffi::{c_int, CString};
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use crate::document::Document;
use crate::error::Result;
use crate::ffi;

/// Identifier of a configuration option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OptionId(pub c_int);

impl OptionId {
    /// `TidyUnknownOption`.
    pub const UNKNOWN: OptionId = OptionId(0);

    /// Look up an option id by its config name (e.g. `"indent-spaces"`).
    ///
    /// Returns `Ok(None)` for names libtidy does not know.
    pub fn from_name(name: &str) -> Result<Option<OptionId>> {
        let name = CString::new(name)?;
        let id = unsafe { ffi::tidyOptGetIdForName(name.as_ptr()) };
        if id == Self::UNKNOWN.0 || id == not_found_id() {
            return Ok(None);
        }
        Ok(Some(OptionId(id)))
    }

    pub fn raw(self) -> c_int {
        self.0
    }
}

/// libtidy answers unknown names with `N_TIDY_OPTIONS`, whose value depends
/// on the release; ask for a name that can never match to learn it.
fn not_found_id() -> c_int {
    static SENTINEL: OnceLock<c_int> = OnceLock::new();
    *SENTINEL.get_or_init(|| unsafe { ffi::tidyOptGetIdForName(c"".as_ptr()) })
}

/// Data type of an option value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum OptionType {
    String = 0,
    Integer = 1,
    Boolean = 2,
}

impl OptionType {
    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(OptionType::String),
            1 => Some(OptionType::Integer),
            2 => Some(OptionType::Boolean),
            _ => None,
        }
    }
}

/// Category an option is listed under. Numbering is release specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ConfigCategory(pub c_int);

/// An option's current value, read according to its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    String(Option<String>),
    Integer(u64),
    Boolean(bool),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::String(Some(s)) => f.write_str(s),
            OptionValue::String(None) => Ok(()),
            OptionValue::Integer(n) => write!(f, "{}", n),
            OptionValue::Boolean(b) => f.write_str(if *b { "yes" } else { "no" }),
        }
    }
}

/// A configuration option as described by libtidy.
#[derive(Clone, Copy)]
pub struct ConfigOption<'doc> {
    pub(crate) raw: ffi::TidyOption,
    _doc: PhantomData<&'doc Document>,
}

impl<'doc> ConfigOption<'doc> {
    pub(crate) fn from_raw(raw: ffi::TidyOption) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        Some(Self {
            raw,
            _doc: PhantomData,
        })
    }

    pub fn id(&self) -> OptionId {
        OptionId(unsafe { ffi::tidyOptGetId(self.raw) })
    }

    pub fn name(&self) -> &'doc str {
        unsafe { ffi::to_str(ffi::tidyOptGetName(self.raw)) }.unwrap_or("")
    }

    pub fn option_type(&self) -> Option<OptionType> {
        OptionType::from_raw(unsafe { ffi::tidyOptGetType(self.raw) })
    }

    pub fn is_read_only(&self) -> bool {
        unsafe { ffi::tidyOptIsReadOnly(self.raw) != ffi::NO }
    }

    pub fn category(&self) -> ConfigCategory {
        ConfigCategory(unsafe { ffi::tidyOptGetCategory(self.raw) })
    }

    /// Default value of a string option.
    pub fn default_value(&self) -> Option<&'doc str> {
        unsafe { ffi::to_str(ffi::tidyOptGetDefault(self.raw)) }
    }

    pub fn default_int(&self) -> u64 {
        unsafe { ffi::tidyOptGetDefaultInt(self.raw) as u64 }
    }

    pub fn default_bool(&self) -> bool {
        unsafe { ffi::tidyOptGetDefaultBool(self.raw) != ffi::NO }
    }

    /// The fixed choices of a pick-list option, empty for free-form ones.
    pub fn picks(&self) -> Picks<'doc> {
        Picks {
            opt: self.raw,
            iter: unsafe { ffi::tidyOptGetPickList(self.raw) },
            _doc: PhantomData,
        }
    }
}

impl fmt::Debug for ConfigOption<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOption")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("type", &self.option_type())
            .finish()
    }
}

// A null item ends iteration even if libtidy left the cursor set.
fn fuse<T>(iter: &mut ffi::TidyIterator, item: Option<T>) -> Option<T> {
    if item.is_none() {
        *iter = std::ptr::null();
    }
    item
}

/// Iterator over an option's pick list.
pub struct Picks<'doc> {
    opt: ffi::TidyOption,
    iter: ffi::TidyIterator,
    _doc: PhantomData<&'doc Document>,
}

impl<'doc> Iterator for Picks<'doc> {
    type Item = &'doc str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.is_null() {
            return None;
        }
        let pick = unsafe { ffi::tidyOptGetNextPick(self.opt, &mut self.iter) };
        fuse(&mut self.iter, unsafe { ffi::to_str(pick) })
    }
}

/// Iterator over every option a document knows.
pub struct Options<'doc> {
    pub(crate) doc: ffi::TidyDoc,
    pub(crate) iter: ffi::TidyIterator,
    pub(crate) _doc: PhantomData<&'doc Document>,
}

impl<'doc> Iterator for Options<'doc> {
    type Item = ConfigOption<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.is_null() {
            return None;
        }
        let raw = unsafe { ffi::tidyGetNextOption(self.doc, &mut self.iter) };
        fuse(&mut self.iter, ConfigOption::from_raw(raw))
    }
}

/// Iterator over the options documented as related to another one.
pub struct DocLinks<'doc> {
    pub(crate) doc: ffi::TidyDoc,
    pub(crate) iter: ffi::TidyIterator,
    pub(crate) _doc: PhantomData<&'doc Document>,
}

impl<'doc> Iterator for DocLinks<'doc> {
    type Item = ConfigOption<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.is_null() {
            return None;
        }
        let raw = unsafe { ffi::tidyOptGetNextDocLinks(self.doc, &mut self.iter) };
        fuse(&mut self.iter, ConfigOption::from_raw(raw))
    }
}

/// Iterator over user-declared tags for one of the `new-*-tags` options.
pub struct DeclTags<'doc> {
    pub(crate) doc: ffi::TidyDoc,
    pub(crate) opt: OptionId,
    pub(crate) iter: ffi::TidyIterator,
    pub(crate) _doc: PhantomData<&'doc Document>,
}

impl<'doc> Iterator for DeclTags<'doc> {
    type Item = &'doc str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.is_null() {
            return None;
        }
        let tag = unsafe { ffi::tidyOptGetNextDeclTag(self.doc, self.opt.0, &mut self.iter) };
        fuse(&mut self.iter, unsafe { ffi::to_str(tag) })
    }
}
