//! Pull-parser event model.
//!
//! Maps the raw tokens of the token source onto the small event vocabulary a
//! pull-parsing caller navigates by. The mapping is total and deterministic;
//! end-of-input is handled one layer up (the cursor turns it into
//! [`EventKind::EndDocument`] instead of an error).

use crate::source::Token;

/// The logical event kinds observable through the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Initial state before the first advance call.
    StartDocument,
    /// Terminal state: the token source reported end-of-input.
    EndDocument,
    /// An element opened. Name, namespace, and attributes are available.
    StartTag,
    /// An element closed. Name and namespace identify the closing element.
    EndTag,
    /// A run of character data (CDATA included).
    Text,
    /// An XML comment.
    Comment,
    /// A processing instruction (the XML declaration appears as a PI with
    /// target `xml`).
    ProcessingInstruction,
    /// A `<!…>` directive, in practice the DOCTYPE declaration.
    Directive,
    /// Reserviert; wird derzeit nie erzeugt. Whitespace-Text bleibt `Text`
    /// und wird nur von Aufrufern (z.B. `next_tag`) gefiltert.
    IgnorableWhitespace,
}

impl EventKind {
    /// Diagnostic name of the event kind, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::StartDocument => "StartDocument",
            Self::EndDocument => "EndDocument",
            Self::StartTag => "StartTag",
            Self::EndTag => "EndTag",
            Self::Text => "Text",
            Self::Comment => "Comment",
            Self::ProcessingInstruction => "ProcessingInstruction",
            Self::Directive => "Directive",
            Self::IgnorableWhitespace => "IgnorableWhitespace",
        }
    }

    /// Classifies one raw token into its event kind.
    pub fn classify(token: &Token) -> Self {
        match token {
            Token::StartElement { .. } => Self::StartTag,
            Token::EndElement { .. } => Self::EndTag,
            Token::CharData(_) => Self::Text,
            Token::Comment(_) => Self::Comment,
            Token::ProcessingInstruction { .. } => Self::ProcessingInstruction,
            Token::Directive(_) => Self::Directive,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::QName;

    #[test]
    fn classify_start_element() {
        let t = Token::StartElement { name: QName::new("", "a"), attributes: Vec::new() };
        assert_eq!(EventKind::classify(&t), EventKind::StartTag);
    }

    #[test]
    fn classify_end_element() {
        let t = Token::EndElement { name: QName::new("", "a") };
        assert_eq!(EventKind::classify(&t), EventKind::EndTag);
    }

    #[test]
    fn classify_char_data() {
        assert_eq!(
            EventKind::classify(&Token::CharData("hi".into())),
            EventKind::Text
        );
    }

    #[test]
    fn classify_comment() {
        assert_eq!(
            EventKind::classify(&Token::Comment("c".into())),
            EventKind::Comment
        );
    }

    #[test]
    fn classify_processing_instruction() {
        let t = Token::ProcessingInstruction {
            target: "xml-stylesheet".into(),
            data: "href=\"s.xsl\"".into(),
        };
        assert_eq!(EventKind::classify(&t), EventKind::ProcessingInstruction);
    }

    #[test]
    fn classify_directive() {
        assert_eq!(
            EventKind::classify(&Token::Directive("DOCTYPE html".into())),
            EventKind::Directive
        );
    }

    /// Jede Event-Art hat einen nicht-leeren Diagnose-Namen.
    #[test]
    fn every_kind_has_a_name() {
        let kinds = [
            EventKind::StartDocument,
            EventKind::EndDocument,
            EventKind::StartTag,
            EventKind::EndTag,
            EventKind::Text,
            EventKind::Comment,
            EventKind::ProcessingInstruction,
            EventKind::Directive,
            EventKind::IgnorableWhitespace,
        ];
        for kind in kinds {
            assert!(!kind.name().is_empty());
            assert_eq!(kind.to_string(), kind.name());
        }
    }
}
