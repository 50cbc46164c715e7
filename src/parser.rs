//! The pull cursor.
//!
//! [`XmlPullParser`] sits on top of a [`TokenSource`] and exposes the
//! document as a sequence of [`EventKind`]s plus accessors for the current
//! element (name, namespace, attributes, in-scope prefixes, `xml:base`).
//! Navigation is caller-driven: nothing is read until the caller advances,
//! and the cursor never buffers more than the current token.
//!
//! Tiefe, Namespace-Scopes und Basis-URLs werden als Seiteneffekt der
//! Start/End-Element-Verarbeitung gepflegt; nach jedem Aufruf gilt
//! `namespace_stack.len() == depth + 1`.

use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Read};

use serde::de::DeserializeOwned;
use url::Url;

use crate::base_url::BaseUrlStack;
use crate::encoding::{transcoded_stream, CharsetReader};
use crate::error::{Error, Result};
use crate::event::EventKind;
use crate::namespace::{NamespaceScope, NamespaceStack};
use crate::qname::Attribute;
use crate::source::{ReaderSource, Token, TokenSource};

/// Pull-based XML cursor with namespace scoping and `xml:base` tracking.
pub struct XmlPullParser<S: TokenSource = ReaderSource> {
    source: S,
    event: EventKind,
    depth: usize,
    name: String,
    space: String,
    token: Option<Token>,
    namespaces: NamespaceStack,
    bases: BaseUrlStack,
    // Pro offenem Element: hat sein Start-Tag eine Basis gepusht?
    base_pushed: Vec<bool>,
}

impl XmlPullParser<ReaderSource> {
    /// Creates a cursor over a byte stream.
    ///
    /// `strict` enables end-tag matching and turns unresolvable entities and
    /// namespace prefixes into errors. Non-UTF-8 documents are handed to
    /// `charset_reader` for transcoding; without one they are rejected.
    pub fn new(
        reader: impl Read + 'static,
        strict: bool,
        charset_reader: Option<CharsetReader>,
    ) -> Result<Self> {
        let stream = transcoded_stream(Box::new(reader), charset_reader.as_ref())?;
        Ok(Self::with_source(ReaderSource::new(stream, strict)))
    }

    /// Convenience constructor for in-memory documents, non-strict.
    pub fn from_str(xml: &str) -> Result<Self> {
        Self::new(Cursor::new(xml.as_bytes().to_vec()), false, None)
    }
}

impl<S: TokenSource> XmlPullParser<S> {
    /// Wraps an arbitrary token source. The cursor starts on
    /// [`EventKind::StartDocument`].
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            event: EventKind::StartDocument,
            depth: 0,
            name: String::new(),
            space: String::new(),
            token: None,
            namespaces: NamespaceStack::new(),
            bases: BaseUrlStack::new(),
            base_pushed: Vec::new(),
        }
    }

    /// Fetches the next raw event without filtering.
    ///
    /// End-of-input becomes a terminal [`EventKind::EndDocument`], not an
    /// error; further calls keep returning it.
    pub fn next_token(&mut self) -> Result<EventKind> {
        self.reset_token_state();
        match self.source.next_raw_token()? {
            None => self.event = EventKind::EndDocument,
            Some(token) => self.process_token(token)?,
        }
        Ok(self.event)
    }

    /// Advances to the next content event, silently consuming comments,
    /// directives, and processing instructions.
    pub fn next(&mut self) -> Result<EventKind> {
        loop {
            let event = self.next_token()?;
            match event {
                EventKind::Comment
                | EventKind::Directive
                | EventKind::ProcessingInstruction
                | EventKind::IgnorableWhitespace => continue,
                _ => return Ok(event),
            }
        }
    }

    /// Advances to the next start or end tag, skipping whitespace-only text.
    /// Any other event is a [`Error::TagExpected`].
    pub fn next_tag(&mut self) -> Result<EventKind> {
        let mut event = self.next()?;
        while event == EventKind::Text && self.is_whitespace() {
            event = self.next()?;
        }
        match event {
            EventKind::StartTag | EventKind::EndTag => Ok(event),
            other => Err(Error::TagExpected {
                found: other.name(),
                offset: self.source.offset(),
            }),
        }
    }

    /// Reads the text content of the current element up to its end tag.
    ///
    /// Must be called on a start tag. Consecutive text runs (separated by
    /// comments or processing instructions, which [`Self::next`] consumes)
    /// are concatenated. A nested element interrupts the run and is an
    /// error.
    pub fn next_text(&mut self) -> Result<String> {
        if self.event != EventKind::StartTag {
            return Err(Error::NotOnStartTag { operation: "next_text" });
        }
        let mut result = String::new();
        loop {
            match self.next()? {
                EventKind::Text => result.push_str(self.text().as_ref()),
                EventKind::EndTag => return Ok(result),
                other => return Err(Error::TextInterrupted { found: other.name() }),
            }
        }
    }

    /// Consumes the rest of the current subtree, matching end tag included.
    /// Nothing inside the subtree is surfaced to the caller.
    pub fn skip(&mut self) -> Result<()> {
        loop {
            match self.next_token()? {
                EventKind::StartTag => self.skip()?,
                EventKind::EndTag => return Ok(()),
                EventKind::EndDocument => {
                    return Err(Error::xml_parse(
                        "unexpected end of document while skipping subtree",
                        self.source.offset(),
                    ))
                }
                _ => {}
            }
        }
    }

    /// First attribute of the current start tag with the given local name.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|a| a.name.local == local_name)
            .map(|a| a.value.as_str())
    }

    /// Asserts the current event, any namespace. See [`Self::expect_all`].
    pub fn expect(&self, event: EventKind, name: &str) -> Result<()> {
        self.expect_all(event, "*", name)
    }

    /// Asserts that the cursor currently sits on `event` with the given
    /// namespace and name. `"*"` is a wildcard; names compare
    /// case-insensitively.
    pub fn expect_all(&self, event: EventKind, space: &str, name: &str) -> Result<()> {
        let matches = self.event == event
            && (space == "*" || self.space.eq_ignore_ascii_case(space))
            && (name == "*" || self.name.eq_ignore_ascii_case(name));
        if matches {
            Ok(())
        } else {
            Err(Error::ExpectMismatch {
                expected_event: event.name(),
                expected_space: space.to_string(),
                expected_name: name.to_string(),
                found_event: self.event.name(),
                found_space: self.space.clone(),
                found_name: self.name.clone(),
                offset: self.source.offset(),
            })
        }
    }

    /// Textual payload of the current event: verbatim for text, comments,
    /// and directives; `"target data"` for a processing instruction; empty
    /// for everything else.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.token {
            Some(Token::CharData(s)) => Cow::Borrowed(s.as_str()),
            Some(Token::Comment(s)) => Cow::Borrowed(s.as_str()),
            Some(Token::Directive(s)) => Cow::Borrowed(s.as_str()),
            Some(Token::ProcessingInstruction { target, data }) => {
                Cow::Owned(format!("{target} {data}"))
            }
            _ => Cow::Borrowed(""),
        }
    }

    /// Whether the current event carries no non-whitespace text.
    pub fn is_whitespace(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Delegates the current subtree to the serde decoder and populates `T`
    /// from it.
    ///
    /// Must be called on a start tag. Afterwards the cursor looks as if the
    /// subtree had been skipped: event is [`EventKind::EndTag`], depth is
    /// back at the parent level, the name is the just-closed element's name.
    /// A base pushed by this element is popped, so callers who need its
    /// resolution must capture it before delegating.
    pub fn decode_element<T: DeserializeOwned>(&mut self) -> Result<T> {
        if self.event != EventKind::StartTag {
            return Err(Error::NotOnStartTag { operation: "decode_element" });
        }
        let xml = self.source.subtree_to_xml()?;
        let value: T = quick_xml::de::from_str(&xml).map_err(|e| Error::Decode(e.to_string()))?;

        // Cursor so stellen, als wäre der Teilbaum übersprungen worden.
        let name = std::mem::take(&mut self.name);
        self.reset_token_state();
        self.name = name;
        self.event = EventKind::EndTag;
        self.depth = self.depth.saturating_sub(1);
        self.namespaces.pop_scope();
        if self.base_pushed.pop() == Some(true) {
            self.bases.pop();
        }
        Ok(value)
    }

    /// Resolves a (possibly relative) URI reference against the innermost
    /// `xml:base` in scope. `Ok(None)` when no base is in scope.
    pub fn resolve_xml_base(&self, candidate: &str) -> Result<Option<Url>> {
        self.bases.resolve(candidate)
    }

    /// The innermost `xml:base` URL in scope, if any.
    pub fn xml_base(&self) -> Option<&Url> {
        self.bases.top()
    }

    /// The namespace URI bound to `prefix` at the cursor's position. The
    /// empty prefix queries the default namespace.
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces.current().uri_for_prefix(prefix)
    }

    /// The default namespace at the cursor's position, if declared.
    pub fn default_namespace(&self) -> Option<&str> {
        self.namespaces.current().default_namespace()
    }

    /// The current event kind.
    pub fn event(&self) -> EventKind {
        self.event
    }

    /// Element nesting depth; incremented on StartTag, decremented on the
    /// matching EndTag.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Local name of the current (or just-closed) element.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace URI of the current element, empty when unbound.
    pub fn namespace(&self) -> &str {
        &self.space
    }

    /// Attributes of the current start tag; empty slice on other events.
    pub fn attributes(&self) -> &[Attribute] {
        match &self.token {
            Some(Token::StartElement { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// The raw token behind the current event, if one exists.
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Verwirft die transienten Felder des vorherigen Events, damit z.B.
    /// ein Text-Event nie die Attribute des vorherigen Start-Tags zeigt.
    fn reset_token_state(&mut self) {
        self.name.clear();
        self.space.clear();
        self.token = None;
    }

    fn process_token(&mut self, token: Token) -> Result<()> {
        self.event = EventKind::classify(&token);
        let mut base_error: Option<Error> = None;
        match &token {
            Token::StartElement { name, attributes } => {
                let scope: NamespaceScope =
                    self.namespaces.current().with_declarations(attributes);
                self.namespaces.push_scope(scope);
                self.depth += 1;
                self.name.clone_from(&name.local);
                self.space.clone_from(&name.space);
                match self.bases.push_from_attrs(attributes) {
                    Ok(pushed) => self.base_pushed.push(pushed),
                    Err(e) => {
                        // Invarianten bleiben intakt, der Fehler geht an den
                        // Aufrufer.
                        self.base_pushed.push(false);
                        base_error = Some(e);
                    }
                }
            }
            Token::EndElement { name } => {
                self.name.clone_from(&name.local);
                self.space.clone_from(&name.space);
                self.depth = self.depth.saturating_sub(1);
                self.namespaces.pop_scope();
                if self.base_pushed.pop() == Some(true) {
                    self.bases.pop();
                }
            }
            _ => {}
        }
        self.token = Some(token);
        match base_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Die Quelle selbst ist nicht Debug; gezeigt wird der Cursor-Zustand.
impl<S: TokenSource> fmt::Debug for XmlPullParser<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlPullParser")
            .field("event", &self.event)
            .field("depth", &self.depth)
            .field("name", &self.name)
            .field("space", &self.space)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
