//! `TidyAttr` wrapper

use std::ffi::c_int;
use std::fmt;
use std::marker::PhantomData;

use crate::document::Document;
use crate::ffi;

/// Known-attribute identifier. Numbering is release specific; compare ids
/// taken from other attributes rather than hard-coding values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AttrId(pub c_int);

impl AttrId {
    /// `TidyAttr_UNKNOWN`.
    pub const UNKNOWN: AttrId = AttrId(0);
}

/// An attribute of an element node.
#[derive(Clone, Copy)]
pub struct Attribute<'doc> {
    raw: ffi::TidyAttr,
    _doc: PhantomData<&'doc Document>,
}

impl<'doc> Attribute<'doc> {
    pub(crate) fn from_raw(raw: ffi::TidyAttr) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        Some(Self {
            raw,
            _doc: PhantomData,
        })
    }

    pub fn next(&self) -> Option<Attribute<'doc>> {
        Attribute::from_raw(unsafe { ffi::tidyAttrNext(self.raw) })
    }

    pub fn name(&self) -> Option<&'doc str> {
        unsafe { ffi::to_str(ffi::tidyAttrName(self.raw)) }
    }

    /// `None` for attributes written without a value.
    pub fn value(&self) -> Option<&'doc str> {
        unsafe { ffi::to_str(ffi::tidyAttrValue(self.raw)) }
    }

    pub fn id(&self) -> AttrId {
        AttrId(unsafe { ffi::tidyAttrGetId(self.raw) })
    }
}

impl fmt::Debug for Attribute<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name())
            .field("value", &self.value())
            .finish()
    }
}

/// Walks an attribute list via `next`.
pub struct Attributes<'doc> {
    pub(crate) cur: Option<Attribute<'doc>>,
}

impl<'doc> Iterator for Attributes<'doc> {
    type Item = Attribute<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        let attr = self.cur?;
        self.cur = attr.next();
        Some(attr)
    }
}
