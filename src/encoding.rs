//! Character-set detection and the transcoding hook.
//!
//! The tokenizer wants UTF-8. This module sniffs a small prefix of the raw
//! byte stream (BOM, then the XML declaration) and, when the document is not
//! UTF-8, hands the stream to a caller-supplied [`CharsetReader`] for
//! transcoding. Without a hook a non-UTF-8 document is rejected.

use std::io::{self, Cursor, Read};

use memchr::memmem;

use crate::error::{Error, Result};

/// Callback that wraps a raw byte stream in a reader producing UTF-8.
///
/// Called with the charset label from the BOM or XML declaration and the
/// complete input stream (prolog included). Returning an `io::Error` aborts
/// parser construction.
pub type CharsetReader = Box<dyn Fn(&str, Box<dyn Read>) -> io::Result<Box<dyn Read>>>;

/// Wie viele Bytes für die Erkennung gelesen werden.
const SNIFF_LEN: usize = 1024;

/// Charset labels that need no transcoding.
fn is_utf8_label(label: &str) -> bool {
    matches!(
        label.to_ascii_lowercase().as_str(),
        "utf-8" | "utf8" | "us-ascii" | "ascii"
    )
}

/// Sniffs the charset of `reader` and returns a stream the tokenizer can
/// consume as UTF-8. The sniffed prefix is re-chained in front of the rest,
/// so no input is lost.
pub fn transcoded_stream(
    mut reader: Box<dyn Read>,
    hook: Option<&CharsetReader>,
) -> Result<Box<dyn Read>> {
    let mut prefix = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    // Bis zu SNIFF_LEN Bytes lesen; ein kurzer Read ist kein EOF.
    while filled < SNIFF_LEN {
        let n = reader.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    prefix.truncate(filled);

    // UTF-8 BOM wird verworfen, der Tokenizer will ihn nicht sehen.
    if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
        prefix.drain(..3);
        return Ok(rechain(prefix, reader));
    }

    let declared = if prefix.starts_with(&[0xFF, 0xFE]) {
        Some("utf-16le".to_string())
    } else if prefix.starts_with(&[0xFE, 0xFF]) {
        Some("utf-16be".to_string())
    } else {
        declared_encoding(&prefix)
    };

    match declared {
        None => Ok(rechain(prefix, reader)),
        Some(label) if is_utf8_label(&label) => Ok(rechain(prefix, reader)),
        Some(label) => match hook {
            Some(hook) => {
                log::debug!("transcoding input declared as {label:?}");
                let chained = rechain(prefix, reader);
                Ok(hook(&label, chained)?)
            }
            None => Err(Error::UnsupportedCharset(label)),
        },
    }
}

fn rechain(prefix: Vec<u8>, rest: Box<dyn Read>) -> Box<dyn Read> {
    Box::new(Cursor::new(prefix).chain(rest))
}

/// Extracts the `encoding` pseudo-attribute from the XML declaration, if the
/// sniffed prefix starts with one.
fn declared_encoding(prefix: &[u8]) -> Option<String> {
    let rest = prefix.strip_prefix(b"<?xml")?;
    let end = memmem::find(rest, b"?>")?;
    let decl = &rest[..end];
    let at = memmem::find(decl, b"encoding")?;
    let mut tail = &decl[at + b"encoding".len()..];
    // Whitespace um das Gleichheitszeichen ist erlaubt.
    while let [b' ' | b'\t' | b'\r' | b'\n', r @ ..] = tail {
        tail = r;
    }
    tail = tail.strip_prefix(b"=")?;
    while let [b' ' | b'\t' | b'\r' | b'\n', r @ ..] = tail {
        tail = r;
    }
    let (quote, value) = match tail {
        [q @ (b'"' | b'\''), r @ ..] => (*q, r),
        _ => return None,
    };
    let close = memchr::memchr(quote, value)?;
    String::from_utf8(value[..close].to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(input: &[u8], hook: Option<&CharsetReader>) -> Result<Vec<u8>> {
        let boxed: Box<dyn Read> = Box::new(Cursor::new(input.to_vec()));
        let mut out = Vec::new();
        transcoded_stream(boxed, hook)?
            .read_to_end(&mut out)
            .map_err(Error::from)?;
        Ok(out)
    }

    #[test]
    fn plain_utf8_passes_through() {
        let input = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>";
        assert_eq!(sniff(input, None).unwrap(), input);
    }

    #[test]
    fn missing_declaration_passes_through() {
        let input = b"<a>hi</a>";
        assert_eq!(sniff(input, None).unwrap(), input);
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let input = b"\xEF\xBB\xBF<a/>";
        assert_eq!(sniff(input, None).unwrap(), b"<a/>");
    }

    #[test]
    fn input_longer_than_sniff_window_survives() {
        let mut input = b"<a>".to_vec();
        input.extend(std::iter::repeat(b'x').take(SNIFF_LEN * 2));
        input.extend_from_slice(b"</a>");
        assert_eq!(sniff(&input, None).unwrap(), input);
    }

    #[test]
    fn foreign_charset_without_hook_fails() {
        let input = b"<?xml version=\"1.0\" encoding=\"iso-8859-1\"?><a/>";
        let err = sniff(input, None).unwrap_err();
        assert_eq!(err, Error::UnsupportedCharset("iso-8859-1".to_string()));
    }

    #[test]
    fn hook_receives_label_and_full_stream() {
        let input = b"<?xml version='1.0' encoding='iso-8859-1'?><a>h\xE9</a>";
        // Latin-1 nach UTF-8, naiv Byte für Byte.
        let hook: CharsetReader = Box::new(|label, mut stream| {
            assert_eq!(label, "iso-8859-1");
            let mut raw = Vec::new();
            stream.read_to_end(&mut raw)?;
            let utf8: String = raw.iter().map(|&b| b as char).collect();
            Ok(Box::new(Cursor::new(utf8.into_bytes())))
        });
        let out = sniff(input, Some(&hook)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<a>hé</a>"), "{text}");
        assert!(text.starts_with("<?xml"), "prolog must be preserved: {text}");
    }

    #[test]
    fn utf16_bom_is_reported_to_hook() {
        let input = b"\xFF\xFE<\0a\0/\0>\0";
        let hook: CharsetReader = Box::new(|label, _stream| {
            assert_eq!(label, "utf-16le");
            Ok(Box::new(Cursor::new(b"<a/>".to_vec())))
        });
        assert_eq!(sniff(input, Some(&hook)).unwrap(), b"<a/>");
    }

    #[test]
    fn declared_encoding_parses_both_quotes() {
        assert_eq!(
            declared_encoding(b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>"),
            Some("windows-1252".to_string())
        );
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='ISO-8859-2' ?>"),
            Some("ISO-8859-2".to_string())
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(declared_encoding(b"<a encoding=\"x\">"), None);
    }

    #[test]
    fn encoding_with_spaced_equals() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding = 'KOI8-R'?>"),
            Some("KOI8-R".to_string())
        );
    }
}
