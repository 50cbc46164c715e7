//! `xml:base` tracking (XML Base, W3C Recommendation).
//!
//! Elements carrying an `xml:base` attribute push the resolved absolute URL
//! onto a stack; the matching end tag pops it. Relative references in content
//! are resolved against the innermost base. Resolution treats the base as a
//! directory (see [`BaseUrlStack::resolve`]), which is what feed formats
//! expect of `xml:base`.

use url::Url;

use crate::error::{Error, Result};
use crate::qname::Attribute;

/// Stack of in-scope base URLs, innermost last. Entries are always absolute.
#[derive(Debug, Default)]
pub struct BaseUrlStack {
    stack: Vec<Url>,
}

impl BaseUrlStack {
    /// Creates an empty stack (no base in scope).
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects the attributes of a start tag and pushes a new base if one
    /// declares `xml:base`. Returns whether a push happened, so the caller
    /// can pop symmetrically at the end tag.
    ///
    /// Ein relativer Wert wird gegen die aktuelle Basis aufgelöst; ohne
    /// Basis im Scope muss der Wert absolut sein.
    pub fn push_from_attrs(&mut self, attrs: &[Attribute]) -> Result<bool> {
        let Some(attr) = attrs.iter().find(|a| a.name.is_xml_base()) else {
            return Ok(false);
        };
        let candidate = attr.value.trim();
        // Leerer Wert zählt wie ein fehlendes Attribut.
        if candidate.is_empty() {
            return Ok(false);
        }
        let resolved = match self.stack.last() {
            Some(base) => base
                .join(candidate)
                .map_err(|e| Error::url_resolve(format!("{candidate:?}: {e}")))?,
            None => Url::parse(candidate)
                .map_err(|e| Error::url_resolve(format!("{candidate:?}: {e}")))?,
        };
        self.stack.push(resolved);
        Ok(true)
    }

    /// Pops the innermost base at an end tag. Only call when the matching
    /// start tag pushed.
    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// The innermost base URL in scope, if any.
    pub fn top(&self) -> Option<&Url> {
        self.stack.last()
    }

    /// Resolves `candidate` against the innermost base.
    ///
    /// Returns `Ok(None)` when no base is in scope. The base path is treated
    /// as a directory: a trailing slash is appended before joining unless the
    /// path already ends in one or `candidate` is empty. The stored base is
    /// not modified.
    pub fn resolve(&self, candidate: &str) -> Result<Option<Url>> {
        let Some(base) = self.stack.last() else {
            return Ok(None);
        };
        let mut base = base.clone();
        if !candidate.is_empty() && !base.path().is_empty() && !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        let resolved = base
            .join(candidate)
            .map_err(|e| Error::url_resolve(format!("{candidate:?}: {e}")))?;
        Ok(Some(resolved))
    }

    /// Current nesting depth of bases, Testhilfe.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Ob aktuell keine Basis im Scope ist.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::{QName, XML_NS_URI};

    fn base_attr(value: &str) -> Attribute {
        Attribute::new(QName::with_prefix(XML_NS_URI, "base", "xml"), value)
    }

    #[test]
    fn push_absolute_base() {
        let mut stack = BaseUrlStack::new();
        let pushed = stack
            .push_from_attrs(&[base_attr("http://example.org/feed/")])
            .unwrap();
        assert!(pushed);
        assert_eq!(stack.top().unwrap().as_str(), "http://example.org/feed/");
    }

    #[test]
    fn push_relative_joins_against_top() {
        let mut stack = BaseUrlStack::new();
        stack
            .push_from_attrs(&[base_attr("http://example.org/dir/")])
            .unwrap();
        stack.push_from_attrs(&[base_attr("sub/")]).unwrap();
        assert_eq!(
            stack.top().unwrap().as_str(),
            "http://example.org/dir/sub/"
        );
        stack.pop();
        assert_eq!(stack.top().unwrap().as_str(), "http://example.org/dir/");
    }

    /// Ohne Basis im Scope ist ein relativer `xml:base` Wert ein Fehler.
    #[test]
    fn relative_root_base_is_an_error() {
        let mut stack = BaseUrlStack::new();
        let err = stack.push_from_attrs(&[base_attr("dir/sub")]).unwrap_err();
        assert!(matches!(err, Error::UrlResolve(_)));
        assert!(stack.is_empty());
    }

    /// `xml:base=""` (auch nur Whitespace) wird wie ein fehlendes
    /// Attribut behandelt.
    #[test]
    fn empty_base_value_means_no_push() {
        let mut stack = BaseUrlStack::new();
        assert!(!stack.push_from_attrs(&[base_attr("")]).unwrap());
        assert!(stack.is_empty());

        stack
            .push_from_attrs(&[base_attr("http://example.org/dir/")])
            .unwrap();
        assert!(!stack.push_from_attrs(&[base_attr("   ")]).unwrap());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn no_declaration_means_no_push() {
        let mut stack = BaseUrlStack::new();
        let pushed = stack
            .push_from_attrs(&[Attribute::new(QName::new("", "href"), "x")])
            .unwrap();
        assert!(!pushed);
        assert!(stack.is_empty());
    }

    #[test]
    fn resolve_without_base_is_none() {
        let stack = BaseUrlStack::new();
        assert_eq!(stack.resolve("y/z").unwrap(), None);
    }

    /// XML Base: die Basis wird als Verzeichnis behandelt, auch wenn ihr
    /// Pfad nicht auf `/` endet.
    #[test]
    fn resolve_appends_directory_slash() {
        let mut stack = BaseUrlStack::new();
        stack
            .push_from_attrs(&[base_attr("http://example.org/dir")])
            .unwrap();
        let resolved = stack.resolve("y/z").unwrap().unwrap();
        assert_eq!(resolved.as_str(), "http://example.org/dir/y/z");
        // Die gespeicherte Basis bleibt unverändert.
        assert_eq!(stack.top().unwrap().as_str(), "http://example.org/dir");
    }

    #[test]
    fn resolve_absolute_candidate_wins() {
        let mut stack = BaseUrlStack::new();
        stack
            .push_from_attrs(&[base_attr("http://example.org/dir/")])
            .unwrap();
        let resolved = stack.resolve("https://other.example/x").unwrap().unwrap();
        assert_eq!(resolved.as_str(), "https://other.example/x");
    }

    #[test]
    fn resolve_empty_candidate_yields_base() {
        let mut stack = BaseUrlStack::new();
        stack
            .push_from_attrs(&[base_attr("http://example.org/dir/page")])
            .unwrap();
        let resolved = stack.resolve("").unwrap().unwrap();
        assert_eq!(resolved.as_str(), "http://example.org/dir/page");
    }

    #[test]
    fn attribute_value_is_trimmed() {
        let mut stack = BaseUrlStack::new();
        stack
            .push_from_attrs(&[base_attr("  http://example.org/a/  ")])
            .unwrap();
        assert_eq!(stack.top().unwrap().as_str(), "http://example.org/a/");
    }
}
