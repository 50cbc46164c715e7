//! Raw token source on top of quick-xml.
//!
//! [`ReaderSource`] drives a [`NsReader`] and converts its events into the
//! owned [`Token`] values the cursor consumes. Adjacent character data
//! (text, CDATA sections, resolved entity references) is coalesced into a
//! single `CharData` token; any markup token flushes the buffered run first.
//! End-of-input is reported as `None` and is sticky.

use std::borrow::Cow;
use std::io::{BufReader, Cursor, Read};

use memchr::memchr;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as XmlQName, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;

use crate::error::{Error, Result};
use crate::qname::{Attribute, QName, XMLNS_PREFIX, XML_NS_URI};

/// A raw markup or character-data token, namespace-resolved and unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<name attr="…">`. Empty elements are expanded, so every
    /// `StartElement` is matched by an `EndElement`.
    StartElement {
        name: QName,
        attributes: Vec<Attribute>,
    },
    /// `</name>`.
    EndElement { name: QName },
    /// A maximal run of character data.
    CharData(String),
    /// `<!-- … -->`, ohne die Klammern.
    Comment(String),
    /// `<?target data?>`. The XML declaration appears with target `xml`.
    ProcessingInstruction { target: String, data: String },
    /// `<!DOCTYPE …>` body, including the `DOCTYPE` keyword.
    Directive(String),
}

/// Abstraction over the tokenizer, so the cursor can be fed from tests or
/// from a different backend.
pub trait TokenSource {
    /// Produces the next raw token, or `None` at end-of-input (sticky).
    fn next_raw_token(&mut self) -> Result<Option<Token>>;

    /// Current byte offset in the input stream, for diagnostics.
    fn offset(&self) -> u64;

    /// Re-serializes the element whose `StartElement` was just produced,
    /// start tag through matching end tag, consuming the subtree.
    fn subtree_to_xml(&mut self) -> Result<String>;
}

type InnerReader = NsReader<BufReader<Box<dyn Read>>>;

/// quick-xml backed token source.
pub struct ReaderSource {
    reader: InnerReader,
    buf: Vec<u8>,
    // Markup-Token das eine gepufferte CharData-Run beendet hat.
    pending: Option<Token>,
    strict: bool,
    done: bool,
    // Letztes Start-Tag, roh, für subtree_to_xml.
    last_start: Option<BytesStart<'static>>,
}

impl ReaderSource {
    /// Wraps a byte stream. `strict` controls end-tag matching and whether
    /// unresolvable entities and prefixes are errors.
    pub fn new(reader: Box<dyn Read>, strict: bool) -> Self {
        let mut reader = NsReader::from_reader(BufReader::new(reader));
        let config = reader.config_mut();
        config.trim_text(false);
        // <a/> wird zu Start+End expandiert, der Cursor sieht immer Paare.
        config.expand_empty_elements = true;
        config.check_end_names = strict;
        config.allow_unmatched_ends = !strict;
        Self {
            reader,
            buf: Vec::new(),
            pending: None,
            strict,
            done: false,
            last_start: None,
        }
    }
}

impl TokenSource for ReaderSource {
    fn next_raw_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.pending.take() {
            return Ok(Some(token));
        }
        if self.done {
            return Ok(None);
        }
        // CharData-Run, wird durch das nächste Markup-Token geflusht.
        let mut text: Option<String> = None;
        loop {
            self.buf.clear();
            let offset = self.reader.buffer_position();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => {
                    let token = start_token(&self.reader, &e, self.strict, offset)?;
                    self.last_start = Some(e.into_owned());
                    return Ok(Some(self.flush(text, token)));
                }
                Ok(Event::End(e)) => {
                    let name = element_qname(&self.reader, e.name(), self.strict, offset)?;
                    let token = Token::EndElement { name };
                    return Ok(Some(self.flush(text, token)));
                }
                Ok(Event::Text(e)) => {
                    let raw = utf8(e.as_ref(), offset)?;
                    let value = unescape_lenient(raw, self.strict, offset)?;
                    if !value.is_empty() {
                        append(&mut text, &normalize_line_endings(&value));
                    }
                }
                Ok(Event::CData(e)) => {
                    // CDATA-Inhalt ist wörtlich, kein Unescaping.
                    let raw = utf8(e.as_ref(), offset)?;
                    if !raw.is_empty() {
                        append(&mut text, &normalize_line_endings(raw));
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    let name = utf8(e.as_ref(), offset)?;
                    if let Some(ch) = resolve_char_reference(name) {
                        append(&mut text, &ch.to_string());
                    } else if let Some(predef) = resolve_predefined_entity(name) {
                        append(&mut text, predef);
                    } else if self.strict {
                        return Err(Error::xml_parse(
                            format!("unresolved entity reference &{name};"),
                            offset,
                        ));
                    } else {
                        // Unbekannte Entity bleibt wörtlich im Text.
                        append(&mut text, &format!("&{name};"));
                    }
                }
                Ok(Event::Comment(e)) => {
                    let value = normalize_line_endings(utf8(e.as_ref(), offset)?).into_owned();
                    let token = Token::Comment(value);
                    return Ok(Some(self.flush(text, token)));
                }
                Ok(Event::PI(e)) => {
                    let target = utf8(e.target(), offset)?.to_string();
                    // XML Spec 2.6: S zwischen PITarget und Daten ist
                    // Separator, nicht Teil der Daten.
                    let data = utf8(e.content(), offset)?.trim_start().to_string();
                    let token = Token::ProcessingInstruction { target, data };
                    return Ok(Some(self.flush(text, token)));
                }
                Ok(Event::Decl(d)) => {
                    let token = Token::ProcessingInstruction {
                        target: "xml".to_string(),
                        data: declaration_data(&d, offset)?,
                    };
                    return Ok(Some(self.flush(text, token)));
                }
                Ok(Event::DocType(e)) => {
                    let body = utf8(e.as_ref(), offset)?.trim();
                    let token = Token::Directive(format!("DOCTYPE {body}"));
                    return Ok(Some(self.flush(text, token)));
                }
                Ok(Event::Empty(_)) => {
                    // expand_empty_elements=true, kommt nicht vor
                    unreachable!("empty elements are expanded by configuration")
                }
                Ok(Event::Eof) => {
                    self.done = true;
                    return Ok(text.map(Token::CharData));
                }
                Err(e) => {
                    return Err(Error::xml_parse(e.to_string(), self.reader.buffer_position()))
                }
            }
        }
    }

    fn offset(&self) -> u64 {
        self.reader.buffer_position()
    }

    fn subtree_to_xml(&mut self) -> Result<String> {
        let start = self.last_start.take().ok_or_else(|| {
            Error::xml_parse("no buffered start tag to serialize", self.offset())
        })?;
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Start(start))
            .map_err(|e| Error::Io(e.to_string()))?;
        let mut depth = 0usize;
        loop {
            self.buf.clear();
            let offset = self.reader.buffer_position();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Eof) => {
                    self.done = true;
                    return Err(Error::xml_parse(
                        "unexpected end of input inside element subtree",
                        offset,
                    ));
                }
                Ok(Event::Start(e)) => {
                    depth += 1;
                    writer
                        .write_event(Event::Start(e))
                        .map_err(|er| Error::Io(er.to_string()))?;
                }
                Ok(Event::End(e)) => {
                    let closes_subtree = depth == 0;
                    writer
                        .write_event(Event::End(e))
                        .map_err(|er| Error::Io(er.to_string()))?;
                    if closes_subtree {
                        break;
                    }
                    depth -= 1;
                }
                Ok(event) => {
                    writer
                        .write_event(event)
                        .map_err(|er| Error::Io(er.to_string()))?;
                }
                Err(e) => return Err(Error::xml_parse(e.to_string(), offset)),
            }
        }
        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes)
            .map_err(|e| Error::xml_parse(format!("invalid UTF-8 in subtree: {e}"), self.offset()))
    }
}

impl ReaderSource {
    /// Stellt dem Markup-Token gepufferten Text voran, falls vorhanden.
    fn flush(&mut self, text: Option<String>, token: Token) -> Token {
        match text {
            Some(run) => {
                self.pending = Some(token);
                Token::CharData(run)
            }
            None => token,
        }
    }
}

fn append(text: &mut Option<String>, value: &str) {
    match text {
        Some(run) => run.push_str(value),
        None => *text = Some(value.to_string()),
    }
}

fn utf8(bytes: &[u8], offset: u64) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| Error::xml_parse(format!("invalid UTF-8 in input: {e}"), offset))
}

fn unescape_lenient(raw: &str, strict: bool, offset: u64) -> Result<Cow<'_, str>> {
    match unescape(raw) {
        Ok(text) => Ok(text),
        Err(_) if !strict => Ok(Cow::Borrowed(raw)),
        Err(e) => Err(Error::xml_parse(format!("invalid reference: {e}"), offset)),
    }
}

/// `&#9731;` oder `&#x2603;` zu einem Zeichen auflösen.
fn resolve_char_reference(name: &str) -> Option<char> {
    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

fn start_token(
    reader: &InnerReader,
    e: &BytesStart<'_>,
    strict: bool,
    offset: u64,
) -> Result<Token> {
    let name = element_qname(reader, e.name(), strict, offset)?;
    let mut attributes = Vec::with_capacity(4);
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|er| Error::xml_parse(er.to_string(), offset))?;
        let attr_name = attribute_qname(reader, attr.key, strict, offset)?;
        let raw = utf8(attr.value.as_ref(), offset)?;
        let value = unescape_lenient(raw, strict, offset)?;
        let value = normalize_line_endings(&value).into_owned();
        attributes.push(Attribute::new(attr_name, value));
    }
    Ok(Token::StartElement { name, attributes })
}

fn element_qname(
    reader: &InnerReader,
    name: XmlQName<'_>,
    strict: bool,
    offset: u64,
) -> Result<QName> {
    let (ns, local) = reader.resolve_element(name);
    let local = utf8(local.as_ref(), offset)?.to_string();
    let prefix = match name.prefix() {
        Some(p) => Some(utf8(p.as_ref(), offset)?.to_string()),
        None => None,
    };
    let space = resolved_uri(ns, prefix.as_deref(), strict, offset)?;
    Ok(QName { space, local, prefix })
}

/// Attributnamen folgen der Konvention des Go encoding/xml Tokenizers:
/// `xmlns="u"` hat leeren Space und Local `xmlns`, `xmlns:p="u"` hat Space
/// `xmlns` und Local `p`, `xml:l` ist an den XML-Namespace gebunden.
fn attribute_qname(
    reader: &InnerReader,
    key: XmlQName<'_>,
    strict: bool,
    offset: u64,
) -> Result<QName> {
    let raw = key.as_ref();
    if raw == XMLNS_PREFIX.as_bytes() {
        return Ok(QName::new("", XMLNS_PREFIX));
    }
    if let Some(rest) = raw.strip_prefix(b"xmlns:") {
        return Ok(QName::with_prefix(
            XMLNS_PREFIX,
            utf8(rest, offset)?,
            XMLNS_PREFIX,
        ));
    }
    if let Some(rest) = raw.strip_prefix(b"xml:") {
        return Ok(QName::with_prefix(XML_NS_URI, utf8(rest, offset)?, "xml"));
    }
    let (ns, local) = reader.resolve_attribute(key);
    let local = utf8(local.as_ref(), offset)?.to_string();
    let prefix = match key.prefix() {
        Some(p) => Some(utf8(p.as_ref(), offset)?.to_string()),
        None => None,
    };
    let space = resolved_uri(ns, prefix.as_deref(), strict, offset)?;
    Ok(QName { space, local, prefix })
}

fn resolved_uri(
    ns: ResolveResult<'_>,
    prefix: Option<&str>,
    strict: bool,
    offset: u64,
) -> Result<String> {
    match ns {
        ResolveResult::Bound(ns) => Ok(utf8(ns.as_ref(), offset)?.trim().to_string()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(p) => {
            if strict {
                Err(Error::xml_parse(
                    format!(
                        "unbound namespace prefix {:?}",
                        String::from_utf8_lossy(&p)
                    ),
                    offset,
                ))
            } else {
                // Nicht-strikt: der wörtliche Prefix dient als Space.
                Ok(prefix.unwrap_or_default().to_string())
            }
        }
    }
}

/// Baut den Datenteil der XML-Deklaration wieder auf
/// (`version="…" encoding="…" standalone="…"`).
fn declaration_data(decl: &quick_xml::events::BytesDecl<'_>, offset: u64) -> Result<String> {
    let mut data = String::new();
    if let Ok(version) = decl.version() {
        data.push_str(&format!("version=\"{}\"", utf8(version.as_ref(), offset)?));
    }
    if let Some(Ok(encoding)) = decl.encoding() {
        if !data.is_empty() {
            data.push(' ');
        }
        data.push_str(&format!("encoding=\"{}\"", utf8(encoding.as_ref(), offset)?));
    }
    if let Some(Ok(standalone)) = decl.standalone() {
        if !data.is_empty() {
            data.push(' ');
        }
        data.push_str(&format!(
            "standalone=\"{}\"",
            utf8(standalone.as_ref(), offset)?
        ));
    }
    Ok(data)
}

/// XML 1.0 Sec. 2.11: `\r\n` -> `\n`, alleinstehende `\r` -> `\n`.
fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if memchr(b'\r', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            if matches!(chars.peek(), Some('\n')) {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}
