//! expp – pull-based XML parser with namespace scoping and `xml:base`
//! resolution
//!
//! The cursor is advanced by the caller: [`XmlPullParser::next_tag`] moves to
//! the next start or end tag, [`XmlPullParser::next_text`] reads element
//! text, [`XmlPullParser::skip`] drops a whole subtree, and
//! [`XmlPullParser::decode_element`] hands a subtree to serde. Namespace
//! prefixes and `xml:base` URLs are tracked per element scope.
//!
//! # Beispiel
//!
//! ```
//! use expp::{EventKind, XmlPullParser};
//!
//! # fn main() -> expp::Result<()> {
//! let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
//!     <title>Beispiel</title>
//! </feed>"#;
//!
//! let mut parser = XmlPullParser::from_str(xml)?;
//! parser.next_tag()?;
//! parser.expect_all(EventKind::StartTag, "http://www.w3.org/2005/Atom", "feed")?;
//!
//! parser.next_tag()?;
//! parser.expect(EventKind::StartTag, "title")?;
//! assert_eq!(parser.next_text()?, "Beispiel");
//! # Ok(())
//! # }
//! ```

pub mod base_url;
pub mod encoding;
pub mod error;
pub mod event;
pub mod namespace;
pub mod parser;
pub mod qname;
pub mod source;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent — für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

// Public API: Cursor
pub use parser::XmlPullParser;

// Public API: Events und Namen
pub use event::EventKind;
pub use qname::{Attribute, QName, XMLNS_PREFIX, XML_NS_URI};

// Public API: Token-Schicht
pub use source::{ReaderSource, Token, TokenSource};

// Public API: Scoping
pub use base_url::BaseUrlStack;
pub use namespace::{NamespaceScope, NamespaceStack};

// Public API: Zeichensatz-Hook
pub use encoding::CharsetReader;

// Re-Export: Basis-URLs sind `url::Url` Werte.
pub use url::Url;
