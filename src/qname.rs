//! Qualified names and attributes as exposed by the cursor.
//!
//! A QName is a sequence of namespace (URI), local-name, and optional prefix
//! components. Per XML Namespaces 1.0 Sec. 2.1, two qualified names are equal
//! if they have the same namespace and local-name, regardless of prefix —
//! `PartialEq` and `Hash` therefore ignore the prefix.

use std::fmt;
use std::hash::{Hash, Hasher};

/// The XML namespace, bound implicitly to the `xml` prefix
/// (Namespaces in XML 1.0 Sec. 3).
pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// The reserved `xmlns` attribute prefix (Namespaces in XML 1.0 Sec. 3).
pub const XMLNS_PREFIX: &str = "xmlns";

/// A qualified name: namespace, local-name, optional prefix.
///
/// For namespace-declaration attributes the components follow the convention
/// of the token source: `xmlns="u"` has an empty `space` and local `xmlns`,
/// `xmlns:p="u"` has space `xmlns` and local `p`.
#[derive(Debug, Clone, Default)]
pub struct QName {
    /// The namespace URI. Empty string means no namespace.
    pub space: String,
    /// The local name.
    pub local: String,
    /// The prefix as written in the document, if any.
    pub prefix: Option<String>,
}

impl QName {
    /// Creates a QName without prefix.
    pub fn new(space: impl Into<String>, local: impl Into<String>) -> Self {
        Self { space: space.into(), local: local.into(), prefix: None }
    }

    /// Creates a QName with namespace, local-name, and prefix.
    pub fn with_prefix(
        space: impl Into<String>,
        local: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self { space: space.into(), local: local.into(), prefix: Some(prefix.into()) }
    }

    /// Ob dieser Name ein `xml:base` Attribut bezeichnet (XML Base Sec. 3).
    pub fn is_xml_base(&self) -> bool {
        self.space == XML_NS_URI && self.local == "base"
    }

    /// Ob dieser Name eine Namespace-Deklaration bezeichnet
    /// (`xmlns="…"` oder `xmlns:p="…"`).
    pub fn is_namespace_declaration(&self) -> bool {
        self.space == XMLNS_PREFIX || (self.space.is_empty() && self.local == XMLNS_PREFIX)
    }
}

/// Namespaces in XML 1.0 Sec. 2.1: prefix is not part of the identity.
impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.space == other.space && self.local == other.local
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.space.hash(state);
        self.local.hash(state);
    }
}

/// Display: `prefix:local` wenn Prefix vorhanden, sonst nur `local`.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(pfx) if !pfx.is_empty() => write!(f, "{pfx}:{}", self.local),
            _ => f.write_str(&self.local),
        }
    }
}

/// An attribute of the current start element: name plus unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The qualified attribute name.
    pub name: QName,
    /// The attribute value, entity-unescaped and line-ending normalized.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute from name components and value.
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self { name, value: value.into() }
    }
}
