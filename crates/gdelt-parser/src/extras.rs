//! Structured access to the GKG `V2EXTRASXML` column.
//!
//! The extras cell holds a flat sequence of XML elements such as
//! `<PAGE_LINKS>a;b</PAGE_LINKS><PAGE_AUTHORS>x</PAGE_AUTHORS>`. The decoder
//! refuses DTDs outright and never resolves custom entities, so a hostile
//! record cannot trigger entity expansion or an external fetch.

use quick_xml::events::Event;
use quick_xml::Reader;

/// One top-level extras element: `(tag, text content)`.
pub type ExtrasBlock = (String, String);

/// Decodes the extras cell into its `(tag, text)` blocks.
///
/// Malformed XML ends decoding at the failure point; whatever parsed before
/// it is returned. A document carrying a DTD is rejected wholesale.
pub fn parse_blocks(extras: &str) -> Vec<ExtrasBlock> {
    let mut reader = Reader::from_str(extras);
    reader.trim_text(true);

    let mut blocks = Vec::new();
    let mut open: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                open = Some((tag, String::new()));
            }
            Ok(Event::Text(text)) => {
                if let Some((_, content)) = open.as_mut() {
                    // Unescape resolves only the predefined XML entities;
                    // anything custom fails and the raw text is kept.
                    match text.unescape() {
                        Ok(cow) => content.push_str(&cow),
                        Err(_) => content.push_str(&String::from_utf8_lossy(text.as_ref())),
                    }
                }
            }
            Ok(Event::End(_)) => {
                if let Some(block) = open.take() {
                    blocks.push(block);
                }
            }
            Ok(Event::DocType(_)) => {
                tracing::warn!("extras XML carries a DTD; refusing to decode");
                return Vec::new();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "malformed extras XML; keeping blocks decoded so far");
                break;
            }
        }
    }
    blocks
}

/// Convenience accessor for a single extras element's text.
pub fn block<'a>(blocks: &'a [ExtrasBlock], tag: &str) -> Option<&'a str> {
    blocks
        .iter()
        .find(|(name, _)| name == tag)
        .map(|(_, text)| text.as_str())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_blocks_decode() {
        let extras = "<PAGE_LINKS>https://a.example;https://b.example</PAGE_LINKS><PAGE_AUTHORS>jane doe</PAGE_AUTHORS>";
        let blocks = parse_blocks(extras);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            block(&blocks, "PAGE_LINKS"),
            Some("https://a.example;https://b.example")
        );
        assert_eq!(block(&blocks, "PAGE_AUTHORS"), Some("jane doe"));
        assert_eq!(block(&blocks, "MISSING"), None);
    }

    #[test]
    fn predefined_entities_are_unescaped() {
        let blocks = parse_blocks("<PAGE_TITLE>a &amp; b</PAGE_TITLE>");
        assert_eq!(block(&blocks, "PAGE_TITLE"), Some("a & b"));
    }

    #[test]
    fn dtd_is_refused() {
        let extras = "<!DOCTYPE lolz [<!ENTITY a \"aaaa\">]><PAGE_TITLE>&a;</PAGE_TITLE>";
        assert!(parse_blocks(extras).is_empty());
    }

    #[test]
    fn truncated_xml_keeps_earlier_blocks() {
        let blocks = parse_blocks("<A>one</A><B>two");
        assert_eq!(blocks.len(), 1);
        assert_eq!(block(&blocks, "A"), Some("one"));
    }
}
