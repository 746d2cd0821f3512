//! `TidyNode` wrapper
//!
//! Nodes borrow the [`Document`] they belong to. Navigation returns `None`
//! where libtidy returns a null node.

use std::ffi::c_int;
use std::fmt;
use std::marker::PhantomData;

use crate::attribute::{AttrId, Attribute, Attributes};
use crate::document::Document;
use crate::ffi;

/// Node types (`TidyNodeType`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum NodeType {
    Root = 0,
    DocType = 1,
    Comment = 2,
    ProcIns = 3,
    Text = 4,
    Start = 5,
    End = 6,
    StartEnd = 7,
    CData = 8,
    Section = 9,
    Asp = 10,
    Jste = 11,
    Php = 12,
    XmlDecl = 13,
}

impl NodeType {
    pub fn from_raw(raw: c_int) -> Option<Self> {
        use NodeType::*;
        Some(match raw {
            0 => Root,
            1 => DocType,
            2 => Comment,
            3 => ProcIns,
            4 => Text,
            5 => Start,
            6 => End,
            7 => StartEnd,
            8 => CData,
            9 => Section,
            10 => Asp,
            11 => Jste,
            12 => Php,
            13 => XmlDecl,
            _ => return None,
        })
    }

    /// Start, end or empty element tags.
    pub fn is_element(self) -> bool {
        matches!(self, NodeType::Start | NodeType::End | NodeType::StartEnd)
    }
}

/// Known-element identifier (`TidyTagId`). Numbering is release specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TagId(pub c_int);

impl TagId {
    /// `TidyTag_UNKNOWN`: text, comments and unrecognised elements.
    pub const UNKNOWN: TagId = TagId(0);
}

macro_rules! tags {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// HTML elements that can be tested for with [`Node::is`].
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Tag {
            $($variant,)*
        }

        impl Tag {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Tag::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Tag> {
                $(
                    if name.eq_ignore_ascii_case($name) {
                        return Some(Tag::$variant);
                    }
                )*
                None
            }
        }
    };
}

tags! {
    Html => "html",
    Head => "head",
    Title => "title",
    Base => "base",
    Meta => "meta",
    Body => "body",
    Frameset => "frameset",
    Frame => "frame",
    Iframe => "iframe",
    Noframes => "noframes",
    Hr => "hr",
    H1 => "h1",
    H2 => "h2",
    H3 => "h3",
    H4 => "h4",
    H5 => "h5",
    H6 => "h6",
    Pre => "pre",
    Listing => "listing",
    P => "p",
    Ul => "ul",
    Ol => "ol",
    Dl => "dl",
    Dir => "dir",
    Li => "li",
    Dt => "dt",
    Dd => "dd",
    Table => "table",
    Caption => "caption",
    Td => "td",
    Th => "th",
    Tr => "tr",
    Col => "col",
    Colgroup => "colgroup",
    Br => "br",
    A => "a",
    Link => "link",
    B => "b",
    I => "i",
    Strong => "strong",
    Em => "em",
    Big => "big",
    Small => "small",
    Param => "param",
    Option => "option",
    Optgroup => "optgroup",
    Img => "img",
    Map => "map",
    Area => "area",
    Nobr => "nobr",
    Wbr => "wbr",
    Font => "font",
    Layer => "layer",
    Spacer => "spacer",
    Center => "center",
    Style => "style",
    Script => "script",
    Noscript => "noscript",
    Form => "form",
    Textarea => "textarea",
    Blockquote => "blockquote",
    Applet => "applet",
    Object => "object",
    Div => "div",
    Span => "span",
    Input => "input",
    Q => "q",
    Label => "label",
    Address => "address",
    Xmp => "xmp",
    Select => "select",
    Blink => "blink",
    Marquee => "marquee",
    Embed => "embed",
    Basefont => "basefont",
    Isindex => "isindex",
    S => "s",
    Strike => "strike",
    U => "u",
    Menu => "menu",
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a parsed document tree.
#[derive(Clone, Copy)]
pub struct Node<'doc> {
    pub(crate) raw: ffi::TidyNode,
    _doc: PhantomData<&'doc Document>,
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Node<'_> {}

impl<'doc> Node<'doc> {
    pub(crate) fn from_raw(raw: ffi::TidyNode) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        Some(Self {
            raw,
            _doc: PhantomData,
        })
    }

    pub fn parent(&self) -> Option<Node<'doc>> {
        Node::from_raw(unsafe { ffi::tidyGetParent(self.raw) })
    }

    /// First child.
    pub fn child(&self) -> Option<Node<'doc>> {
        Node::from_raw(unsafe { ffi::tidyGetChild(self.raw) })
    }

    /// Next sibling.
    pub fn next(&self) -> Option<Node<'doc>> {
        Node::from_raw(unsafe { ffi::tidyGetNext(self.raw) })
    }

    /// Previous sibling.
    pub fn prev(&self) -> Option<Node<'doc>> {
        Node::from_raw(unsafe { ffi::tidyGetPrev(self.raw) })
    }

    pub fn children(&self) -> Children<'doc> {
        Children { cur: self.child() }
    }

    pub fn attr_first(&self) -> Option<Attribute<'doc>> {
        Attribute::from_raw(unsafe { ffi::tidyAttrFirst(self.raw) })
    }

    pub fn attrs(&self) -> Attributes<'doc> {
        Attributes {
            cur: self.attr_first(),
        }
    }

    pub fn attr_by_id(&self, id: AttrId) -> Option<Attribute<'doc>> {
        Attribute::from_raw(unsafe { ffi::tidyAttrGetById(self.raw, id.0) })
    }

    /// First attribute whose name matches, ignoring ASCII case.
    pub fn attr_by_name(&self, name: &str) -> Option<Attribute<'doc>> {
        self.attrs()
            .find(|a| a.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_raw(unsafe { ffi::tidyNodeGetType(self.raw) })
    }

    /// Element name; `None` for text and other unnamed nodes.
    pub fn name(&self) -> Option<&'doc str> {
        unsafe { ffi::to_str(ffi::tidyNodeGetName(self.raw)) }
    }

    pub fn is_text(&self) -> bool {
        unsafe { ffi::tidyNodeIsText(self.raw) != ffi::NO }
    }

    /// `h1` to `h6`.
    pub fn is_header(&self) -> bool {
        unsafe { ffi::tidyNodeIsHeader(self.raw) != ffi::NO }
    }

    pub fn id(&self) -> TagId {
        TagId(unsafe { ffi::tidyNodeGetId(self.raw) })
    }

    /// Source line the node started on.
    pub fn line(&self) -> u32 {
        unsafe { ffi::tidyNodeLine(self.raw) }
    }

    pub fn column(&self) -> u32 {
        unsafe { ffi::tidyNodeColumn(self.raw) }
    }

    /// Whether this is an element of the given kind.
    pub fn is(&self, tag: Tag) -> bool {
        self.node_type().is_some_and(NodeType::is_element)
            && self.name().is_some_and(|n| n.eq_ignore_ascii_case(tag.as_str()))
    }

    /// Depth-first walk of this node and everything below it.
    pub fn descendants(&self) -> Descendants<'doc> {
        Descendants {
            root: *self,
            cur: Some(*self),
        }
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.node_type())
            .field("name", &self.name())
            .field("line", &self.line())
            .field("column", &self.column())
            .finish()
    }
}

pub struct Children<'doc> {
    cur: Option<Node<'doc>>,
}

impl<'doc> Iterator for Children<'doc> {
    type Item = Node<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        self.cur = node.next();
        Some(node)
    }
}

pub struct Descendants<'doc> {
    root: Node<'doc>,
    cur: Option<Node<'doc>>,
}

impl<'doc> Iterator for Descendants<'doc> {
    type Item = Node<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        self.cur = node.child().or_else(|| {
            let mut up = node;
            loop {
                if up == self.root {
                    return None;
                }
                if let Some(sib) = up.next() {
                    return Some(sib);
                }
                up = up.parent()?;
            }
        });
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html>\n\
        <head><title>T</title></head>\n\
        <body>\n\
        <h1>Head</h1>\n\
        <p>one <b>two</b></p>\n\
        </body>\n\
        </html>";

    #[test]
    fn test_navigation() {
        let mut doc = Document::new();
        doc.parse_string(PAGE).unwrap();

        let body = doc.body().unwrap();
        assert!(body.is(Tag::Body));
        assert_eq!(body.parent(), doc.html());

        let h1 = body.child().unwrap();
        assert!(h1.is(Tag::H1));
        assert!(h1.is_header());
        assert_eq!(h1.node_type(), Some(NodeType::Start));
        assert_eq!(h1.line(), 4);
        assert!(h1.column() >= 1);

        let p = h1.next().unwrap();
        assert_eq!(p.name(), Some("p"));
        assert!(!p.is_header());
        assert_eq!(p.prev(), Some(h1));
        assert_ne!(p.id(), h1.id());
        assert_ne!(p.id(), TagId::UNKNOWN);
    }

    #[test]
    fn test_text_nodes() {
        let mut doc = Document::new();
        doc.parse_string(PAGE).unwrap();

        let p = doc.body().unwrap().children().find(|n| n.is(Tag::P)).unwrap();
        let text = p.child().unwrap();
        assert!(text.is_text());
        assert_eq!(text.node_type(), Some(NodeType::Text));
        assert_eq!(text.id(), TagId::UNKNOWN);
        assert!(text.next().unwrap().is(Tag::B));
    }

    #[test]
    fn test_descendants() {
        let mut doc = Document::new();
        doc.parse_string(PAGE).unwrap();

        let names: Vec<_> = doc
            .body()
            .unwrap()
            .descendants()
            .filter_map(|n| n.name())
            .collect();
        assert_eq!(names, vec!["body", "h1", "p", "b"]);

        let root = doc.root().unwrap();
        assert_eq!(root.node_type(), Some(NodeType::Root));
        assert!(root.descendants().any(|n| n.is(Tag::Title)));
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(Tag::from_name("TABLE"), Some(Tag::Table));
        assert_eq!(Tag::Colgroup.to_string(), "colgroup");
        assert_eq!(Tag::from_name("custom-element"), None);
    }
}
