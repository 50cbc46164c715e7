//! Central error types for the pull parser.
//!
//! End-of-input is deliberately *not* an error: the cursor translates it into
//! a terminal `EndDocument` event. Everything else that can go wrong during a
//! parse is represented here.

use core::fmt;

/// All failure modes of the pull parser.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The underlying tokenizer rejected the input (malformed XML).
    ///
    /// Fatal für diesen Cursor — es wird kein Recovery versucht.
    XmlParse {
        /// Description from the token source.
        message: String,
        /// Byte offset in the input stream where the failure occurred.
        offset: u64,
    },
    /// Reading the input failed during construction or transcoding.
    Io(String),
    /// The document declares a character set that cannot be handled.
    ///
    /// Tritt auf wenn das XML-Prolog-Encoding nicht UTF-8 ist und kein
    /// [`CharsetReader`](crate::encoding::CharsetReader) konfiguriert wurde.
    UnsupportedCharset(String),
    /// An `xml:base` attribute value or a resolution candidate is not a
    /// usable URI reference (RFC 3986).
    UrlResolve(String),
    /// `next_tag` produced something other than a start or end tag.
    TagExpected {
        /// Event name that was actually produced.
        found: &'static str,
        /// Byte offset in the input stream.
        offset: u64,
    },
    /// An operation that requires the cursor to sit on a start tag was
    /// called from a different event.
    NotOnStartTag {
        /// The operation that was misused (`"next_text"`, `"decode_element"`).
        operation: &'static str,
    },
    /// A text run read by `next_text` was interrupted by an event that is
    /// neither text nor the closing tag.
    TextInterrupted {
        /// Event name that interrupted the run.
        found: &'static str,
    },
    /// `expect_all` found a different event/namespace/name than requested.
    ExpectMismatch {
        expected_event: &'static str,
        expected_space: String,
        expected_name: String,
        found_event: &'static str,
        found_space: String,
        found_name: String,
        /// Byte offset in the input stream.
        offset: u64,
    },
    /// The structured-decode delegate could not populate the destination.
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XmlParse { message, offset } => {
                write!(f, "XML parse error at offset {offset}: {message}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::UnsupportedCharset(cs) => {
                write!(f, "unsupported charset {cs:?}: no charset reader configured")
            }
            Self::UrlResolve(msg) => write!(f, "xml:base URL resolution failed: {msg}"),
            Self::TagExpected { found, offset } => {
                write!(f, "expected StartTag or EndTag but got {found} at offset: {offset}")
            }
            Self::NotOnStartTag { operation } => {
                write!(f, "parser must be on StartTag to call {operation}")
            }
            Self::TextInterrupted { found } => {
                write!(
                    f,
                    "text event must be immediately followed by EndTag or Text but got {found}"
                )
            }
            Self::ExpectMismatch {
                expected_event,
                expected_space,
                expected_name,
                found_event,
                found_space,
                found_name,
                offset,
            } => write!(
                f,
                "expected space:{expected_space} name:{expected_name} event:{expected_event} \
                 but got space:{found_space} name:{found_name} event:{found_event} \
                 at offset: {offset}"
            ),
            Self::Decode(msg) => write!(f, "decode element failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `XmlParse` Fehler mit Offset-Kontext.
    pub fn xml_parse(message: impl Into<String>, offset: u64) -> Self {
        Self::XmlParse { message: message.into(), offset }
    }

    /// Erstellt einen `UrlResolve` Fehler.
    pub fn url_resolve(message: impl Into<String>) -> Self {
        Self::UrlResolve(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
