//! Namespace prefix scoping (Namespaces in XML 1.0).
//!
//! Each open element carries a scope mapping prefixes to namespace URIs. A
//! scope is derived from its parent by overlaying the `xmlns` declarations of
//! the start tag; closing the element discards the overlay. The stack always
//! holds exactly `depth + 1` scopes, the bottom one being the document scope.

use crate::qname::{Attribute, XMLNS_PREFIX, XML_NS_URI};
use crate::FastHashMap;

/// Eine unveränderliche Prefix-zu-URI Zuordnung für genau eine Element-Tiefe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    bindings: FastHashMap<String, String>,
}

impl NamespaceScope {
    /// The document-level scope. Only the implicit `xml` prefix is bound
    /// (Namespaces in XML 1.0 Sec. 3).
    pub fn document() -> Self {
        let mut bindings = FastHashMap::default();
        bindings.insert("xml".to_string(), XML_NS_URI.to_string());
        Self { bindings }
    }

    /// Derives the child scope by overlaying the namespace declarations found
    /// in `attrs`. Non-declaration attributes are ignored. Prefixes are
    /// compared case-insensitively and stored trimmed and lowercased; URIs
    /// are stored trimmed.
    ///
    /// `self` bleibt unverändert (die Elternscope wird kopiert, nicht
    /// mutiert).
    pub fn with_declarations(&self, attrs: &[Attribute]) -> Self {
        let mut bindings = self.bindings.clone();
        for attr in attrs {
            if !attr.name.is_namespace_declaration() {
                continue;
            }
            // xmlns="u" declares the default namespace (empty prefix),
            // xmlns:p="u" declares prefix p.
            let prefix = if attr.name.space.is_empty() && attr.name.local == XMLNS_PREFIX {
                String::new()
            } else {
                attr.name.local.trim().to_ascii_lowercase()
            };
            bindings.insert(prefix, attr.value.trim().to_string());
        }
        Self { bindings }
    }

    /// Looks up the URI bound to `prefix` in this scope. The empty prefix
    /// queries the default namespace.
    pub fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .get(prefix.trim().to_ascii_lowercase().as_str())
            .map(String::as_str)
    }

    /// The default namespace of this scope, if one is declared.
    pub fn default_namespace(&self) -> Option<&str> {
        self.uri_for_prefix("")
    }

    /// Number of bindings, Testhilfe.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.bindings.len()
    }
}

/// Scope stack, one entry per open element plus the document scope.
#[derive(Debug)]
pub struct NamespaceStack {
    scopes: Vec<NamespaceScope>,
}

impl NamespaceStack {
    /// Creates the stack holding only the document scope.
    pub fn new() -> Self {
        Self { scopes: vec![NamespaceScope::document()] }
    }

    /// The scope of the innermost open element.
    pub fn current(&self) -> &NamespaceScope {
        // Invariante: nie leer, das Dokument-Scope wird nie entfernt.
        self.scopes.last().expect("namespace stack is never empty")
    }

    /// Pushes the scope for an element that just opened.
    pub fn push_scope(&mut self, scope: NamespaceScope) {
        self.scopes.push(scope);
    }

    /// Pops the innermost scope when an element closes. The document scope
    /// stays; a surplus pop on unbalanced input is ignored.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of scopes on the stack (always `depth + 1`).
    pub fn len(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for NamespaceStack {
    fn default() -> Self {
        Self::new()
    }
}
