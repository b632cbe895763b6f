use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use cssparser::{CowRcStr, ParseError, ParserInput, SourceLocation, ToCss};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{self, ElementSelectorFlags, MatchingContext};
use selectors::parser::{self, ParseRelative, SelectorImpl, SelectorParseErrorKind};
use selectors::{Element, OpaqueElement};

use crate::dom::document::Document;
use crate::dom::node::{ElementData, NodeId, NodeKind};
use crate::error::EngineError;

// ============================================================================
// Selector List
// ============================================================================

/// Parsed CSS selector list, matched against `Document` elements.
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    selectors: parser::SelectorList<FieldSelectors>,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, EngineError> {
        let mut input = ParserInput::new(selector);
        let mut css = cssparser::Parser::new(&mut input);
        let selectors = parser::SelectorList::parse(&FieldSelectorParser, &mut css, ParseRelative::No)
            .map_err(|err| EngineError::Selector {
                selector: selector.to_string(),
                reason: format!("{:?}", err.kind),
            })?;

        Ok(SelectorList {
            source: selector.to_string(),
            selectors,
        })
    }

    /// Number of comma-separated selectors.
    pub fn len(&self) -> usize {
        self.selectors.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.0.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = DocElement::new(doc, node) else {
            return false;
        };

        let mut caches = Default::default();
        let mut context = MatchingContext::new(
            matching::MatchingMode::Normal,
            None,
            &mut caches,
            matching::QuirksMode::NoQuirks,
            matching::NeedsSelectorFlags::No,
            matching::IgnoreNthChildForInvalidation::No,
        );
        self.selectors
            .0
            .iter()
            .any(|s| matching::matches_selector(s, 0, None, &element, &mut context))
    }
}

// ============================================================================
// Selector Implementation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSelectors;

impl SelectorImpl for FieldSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssIdent;
    type LocalName = CssIdent;
    type NamespaceUrl = CssIdent;
    type NamespacePrefix = CssIdent;
    type BorrowedNamespaceUrl = CssIdent;
    type BorrowedLocalName = CssIdent;
    type NonTSPseudoClass = PseudoClass;
    type PseudoElement = NoPseudoElement;
}

struct FieldSelectorParser;

impl<'i> parser::Parser<'i> for FieldSelectorParser {
    type Impl = FieldSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_non_ts_pseudo_class(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> Result<PseudoClass, ParseError<'i, Self::Error>> {
        if name.eq_ignore_ascii_case("defined") {
            return Ok(PseudoClass::Defined);
        }
        Err(location.new_custom_error(SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name)))
    }
}

/// Attribute values in selectors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssString(pub String);

impl<'a> From<&'a str> for CssString {
    fn from(value: &'a str) -> Self {
        CssString(value.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_string(&self.0, dest)
    }
}

/// Tag names, attribute names, ids and classes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct CssIdent(pub String);

impl<'a> From<&'a str> for CssIdent {
    fn from(value: &'a str) -> Self {
        CssIdent(value.to_string())
    }
}

impl ToCss for CssIdent {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_identifier(&self.0, dest)
    }
}

impl PrecomputedHash for CssIdent {
    fn precomputed_hash(&self) -> u32 {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        hasher.finish() as u32
    }
}

/// The only non-structural pseudo-class the engine queries with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoClass {
    Defined,
}

impl parser::NonTSPseudoClass for PseudoClass {
    type Impl = FieldSelectors;

    fn is_active_or_hover(&self) -> bool {
        false
    }

    fn is_user_action_state(&self) -> bool {
        false
    }
}

impl ToCss for PseudoClass {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        match self {
            PseudoClass::Defined => dest.write_str(":defined"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPseudoElement {}

impl parser::PseudoElement for NoPseudoElement {
    type Impl = FieldSelectors;
}

impl ToCss for NoPseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

// ============================================================================
// Element Adapter
// ============================================================================

/// An element node viewed through the `selectors` matching interface.
#[derive(Clone, Copy)]
struct DocElement<'a> {
    doc: &'a Document,
    node: NodeId,
    data: &'a ElementData,
}

impl fmt::Debug for DocElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> #{}", self.data.tag, self.node.0)
    }
}

impl<'a> DocElement<'a> {
    fn new(doc: &'a Document, node: NodeId) -> Option<Self> {
        let data = doc.element(node)?;
        Some(DocElement { doc, node, data })
    }

    fn sibling_element(&self, step: fn(&Document, NodeId) -> Option<NodeId>) -> Option<Self> {
        let mut current = step(self.doc, self.node);
        while let Some(node) = current {
            if let Some(element) = DocElement::new(self.doc, node) {
                return Some(element);
            }
            current = step(self.doc, node);
        }
        None
    }
}

impl Element for DocElement<'_> {
    type Impl = FieldSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent(self.node)
            .and_then(|parent| DocElement::new(self.doc, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        self.doc
            .parent(self.node)
            .is_some_and(|parent| self.doc.is_shadow_root(parent))
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        let root = self.doc.root_node(self.node);
        self.doc
            .shadow_host(root)
            .and_then(|host| DocElement::new(self.doc, host))
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling_element(Document::previous_sibling)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling_element(Document::next_sibling)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .children(self.node)
            .iter()
            .find_map(|child| DocElement::new(self.doc, *child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssIdent) -> bool {
        self.data.tag == name.0
    }

    fn has_namespace(&self, namespace: &CssIdent) -> bool {
        namespace.0.is_empty()
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag == other.data.tag
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssIdent>,
        local_name: &CssIdent,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.0.is_empty() {
                return false;
            }
        }
        self.data
            .attr(&local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &PseudoClass,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match pc {
            PseudoClass::Defined => self.data.defined,
        }
    }

    fn match_pseudo_element(
        &self,
        pe: &NoPseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.data.tag.as_str(), "a" | "area" | "link") && self.data.has_attr("href")
    }

    fn is_html_slot_element(&self) -> bool {
        self.data.tag == "slot"
    }

    fn has_id(&self, id: &CssIdent, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssIdent, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .classes()
            .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
    }

    fn imported_part(&self, _name: &CssIdent) -> Option<CssIdent> {
        None
    }

    fn is_part(&self, _name: &CssIdent) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.node).iter().all(|child| {
            match &self.doc.node(*child).kind {
                NodeKind::Element(_) => false,
                NodeKind::Text(text) => text.is_empty(),
                _ => true,
            }
        })
    }

    fn is_root(&self) -> bool {
        self.doc
            .parent(self.node)
            .is_some_and(|parent| matches!(self.doc.node(parent).kind, NodeKind::Document))
    }
}
