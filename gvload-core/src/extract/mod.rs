//! Record extraction from exported pages
//!
//! ```text
//! page ──► DocumentNode ──► classify_document
//!                              │  1. conversation (chat log with messages)
//!                              │  2. call   (telephony container, no <audio>)
//!                              │  3. audio  (telephony container with <audio>)
//!                              ▼
//!                        Option<Document>
//! ```
//!
//! The text check runs first because its layout is the most specific.
//! A page matching none of the kinds is not an error: the caller logs it
//! and moves on. Unparseable dates or durations inside a recognized page
//! are errors for that page only.

pub mod conversation;
pub mod fields;
pub mod locators;
pub mod tree;

pub use conversation::{assemble_conversation, extract_conversation, self_identity};
pub use fields::{get_label, parse_date, parse_duration, unescape_entities};
pub use locators::{
    extract_audio, extract_call, extract_text_message, has_media_reference, locate_audio,
    locate_call, locate_chat_log, locate_contact, locate_telephony_container,
};
pub use tree::{decode_page, DocumentNode, HtmlDocument, HtmlNode, Pattern, Step};

use crate::error::Result;
use crate::types::Document;

const TITLE: Pattern = Pattern::new(&[Step::descendant("title")]);

/// Title prefix of a thread page that only has outgoing messages
const ONE_WAY_PREFIX: &str = "Me to ";

/// Per-page inputs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct DocumentContext {
    /// The account owner's numbers; the first one is primary
    pub my_numbers: Vec<String>,
    /// Partner name for threads without any incoming message
    pub one_way_name: Option<String>,
}

impl DocumentContext {
    pub fn new(my_numbers: Vec<String>) -> Self {
        Self {
            my_numbers,
            one_way_name: None,
        }
    }

    /// Take the one-way partner name from the page title.
    pub fn for_page<N: DocumentNode>(&self, root: &N) -> Self {
        Self {
            my_numbers: self.my_numbers.clone(),
            one_way_name: one_way_name(root),
        }
    }
}

/// Partner name from a `Me to <name>` page title.
pub fn one_way_name<N: DocumentNode>(root: &N) -> Option<String> {
    let title = root.find_text(&TITLE)?;
    title
        .trim()
        .strip_prefix(ONE_WAY_PREFIX)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Classify a page, returning the first record kind that matches.
pub fn classify_document<N: DocumentNode>(
    root: &N,
    ctx: &DocumentContext,
) -> Result<Option<Document>> {
    if let Some(conversation) =
        extract_conversation(root, ctx.one_way_name.as_deref(), &ctx.my_numbers)?
    {
        if conversation.is_meaningful() {
            return Ok(Some(Document::Conversation(conversation)));
        }
    }

    if let Some(call) = extract_call(root)? {
        if call.is_meaningful() {
            return Ok(Some(Document::Call(call)));
        }
    }

    if let Some(audio) = extract_audio(root)? {
        if audio.is_meaningful() {
            return Ok(Some(Document::Audio(audio)));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallType;

    fn ctx() -> DocumentContext {
        DocumentContext::new(vec!["15550001111".to_string()])
    }

    #[test]
    fn test_one_way_name_from_title() {
        let doc = HtmlDocument::parse(
            "<html><head><title>Me to Carol King</title></head><body></body></html>",
        );
        assert_eq!(one_way_name(&doc.root()).as_deref(), Some("Carol King"));

        let doc = HtmlDocument::parse(
            "<html><head><title>Bob Smith</title></head><body></body></html>",
        );
        assert_eq!(one_way_name(&doc.root()), None);
    }

    #[test]
    fn test_classify_conversation_first() {
        let doc = HtmlDocument::parse(
            r#"<html><head><title>Me to Carol</title></head><body>
            <div class="hChatLog hfeed">
              <div class="message">
                <abbr class="dt" title="2012-01-02T10:00:00.000Z">10:00</abbr>
                <cite class="sender vcard"><a class="tel" href="tel:+15550001111"><span class="fn">Me</span></a></cite>
                <q>hello</q>
              </div>
            </div>
            <div class="haudio">
              <abbr class="published" title="2012-01-02T10:00:00.000Z">x</abbr>
            </div>
            </body></html>"#,
        );
        let ctx = ctx().for_page(&doc.root());
        match classify_document(&doc.root(), &ctx).unwrap() {
            Some(Document::Conversation(c)) => {
                assert_eq!(c.messages.len(), 1);
                assert_eq!(c.contact.name.as_deref(), Some("Carol"));
            }
            other => panic!("expected conversation, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_call() {
        let doc = HtmlDocument::parse(
            r##"<html><head><title>Missed call</title></head><body>
            <div class="haudio">
              <div class="contributor vcard"><a class="tel" href="tel:+15553334444"><span class="fn">Bob</span></a></div>
              <abbr class="published" title="2012-01-02T10:00:00.000Z">x</abbr>
              <div class="tags"><a rel="tag" href="#missed">Missed</a></div>
            </div></body></html>"##,
        );
        match classify_document(&doc.root(), &ctx()).unwrap() {
            Some(Document::Call(call)) => {
                assert_eq!(call.calltype, Some(CallType::Missed));
                assert_eq!(call.duration, None);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_unrecognized() {
        let doc = HtmlDocument::parse("<html><body><p>Not an export page</p></body></html>");
        assert!(classify_document(&doc.root(), &ctx()).unwrap().is_none());
    }

    #[test]
    fn test_classify_propagates_field_errors() {
        let doc = HtmlDocument::parse(
            r##"<html><body><div class="haudio">
              <div class="contributor vcard"><a class="tel" href="tel:+1"><span class="fn">B</span></a></div>
              <abbr class="published" title="not a date">x</abbr>
            </div></body></html>"##,
        );
        assert!(classify_document(&doc.root(), &ctx()).is_err());
    }
}
