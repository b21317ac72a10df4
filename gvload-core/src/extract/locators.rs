//! Record locators
//!
//! Each locator zooms from a page (or any node) to the subtree encoding one
//! record kind, or reports `None` when the page is not of that kind. The
//! matching extractor then reads typed fields from that subtree.
//!
//! Calls and audio records share one layout, the telephony container
//! (`div.haudio`). The only thing telling them apart is an embedded
//! `<audio>` child: [`locate_call`] and [`locate_audio`] both go through
//! [`locate_telephony_container`] + [`has_media_reference`], so they are
//! mutually exclusive and together cover every container.

use super::fields::{get_label, parse_date, parse_duration, unescape_entities};
use super::tree::{DocumentNode, Pattern, Step};
use crate::error::{Error, Result};
use crate::format::format_duration;
use crate::types::{AudioRecord, CallRecord, Contact, RecordBase, TextRecord};
use chrono::{Duration, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid number regex"));

const SENDER_CONTACT: Pattern = Pattern::new(&[
    Step::descendant("cite").with("class", "sender vcard"),
    Step::child("a").with("class", "tel"),
]);
const CONTRIBUTOR_CONTACT: Pattern = Pattern::new(&[
    Step::descendant("div").with("class", "contributor vcard"),
    Step::child("a").with("class", "tel"),
]);
const CONTACT_NAME: Pattern = Pattern::new(&[Step::child("span").with("class", "fn")]);

const TELEPHONY_CONTAINER: Pattern =
    Pattern::new(&[Step::self_or_descendant("div").with("class", "haudio")]);
const MEDIA_REFERENCE: Pattern = Pattern::new(&[Step::child("audio")]);
const PUBLISHED: Pattern = Pattern::new(&[Step::child("abbr").with("class", "published")]);
const DURATION: Pattern = Pattern::new(&[Step::child("abbr").with("class", "duration")]);
const FULL_TEXT: Pattern = Pattern::new(&[
    Step::child("span").with("class", "description"),
    Step::child("span").with("class", "full-text"),
]);
const WORD_CONFIDENCE: Pattern = Pattern::new(&[
    Step::child("span").with("class", "description"),
    Step::child("span"),
    Step::child("span").with("class", "confidence"),
]);

const CHAT_LOG: Pattern =
    Pattern::new(&[Step::self_or_descendant("div").with("class", "hChatLog hfeed")]);
const MESSAGE: Pattern = Pattern::new(&[Step::child("div").with("class", "message")]);
const MESSAGE_DATE: Pattern = Pattern::new(&[Step::child("abbr").with("class", "dt")]);
const MESSAGE_BODY: Pattern = Pattern::new(&[Step::child("q")]);

/// Placeholder the export writes when a voicemail could not be transcribed
const UNTRANSCRIBED: &str = "Unable to transcribe this message.";

// ============================================
// Contact
// ============================================

/// First contact beneath `node`.
///
/// Messages carry their sender as `cite.sender.vcard > a.tel`; telephony
/// pages carry the other party as `div.contributor.vcard > a.tel`. The name
/// is the `span.fn` text (blank means absent) and the number is the first
/// run of digits in the link's `href` (e.g. `tel:+15551234567`).
pub fn locate_contact<N: DocumentNode>(node: &N) -> Option<Contact> {
    let tel = node
        .find(&SENDER_CONTACT)
        .or_else(|| node.find(&CONTRIBUTOR_CONTACT))?;

    let name = tel
        .find_text(&CONTACT_NAME)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let phonenumber = tel
        .attribute("href")
        .and_then(|href| NUMBER_RE.find(href))
        .map(|m| m.as_str().to_string());

    Some(Contact::new(name, phonenumber))
}

// ============================================
// Telephony (calls and audio)
// ============================================

/// The `div.haudio` region shared by calls and audio records (self allowed).
pub fn locate_telephony_container<N: DocumentNode>(node: &N) -> Option<N> {
    node.find(&TELEPHONY_CONTAINER)
}

/// Whether a telephony container embeds a media file (audio, not a call).
pub fn has_media_reference<N: DocumentNode>(container: &N) -> bool {
    container.find(&MEDIA_REFERENCE).is_some()
}

/// Telephony container of a call page.
pub fn locate_call<N: DocumentNode>(node: &N) -> Option<N> {
    locate_telephony_container(node).filter(|c| !has_media_reference(c))
}

/// Telephony container of a voicemail/recording page.
pub fn locate_audio<N: DocumentNode>(node: &N) -> Option<N> {
    locate_telephony_container(node).filter(has_media_reference)
}

/// Contact, published date and duration of a telephony container.
fn extract_telephony<N: DocumentNode>(
    container: &N,
    kind: &'static str,
) -> Result<(Contact, NaiveDateTime, Option<Duration>)> {
    let contact = locate_contact(container).unwrap_or_default();

    let published = container
        .find(&PUBLISHED)
        .and_then(|n| n.attribute("title").map(str::to_string))
        .ok_or(Error::MissingField {
            kind,
            field: "published",
        })?;
    let date = parse_date(&published)?;

    let duration = container
        .find_text(&DURATION)
        .map(|text| parse_duration(&text))
        .transpose()?;

    Ok((contact, date, duration))
}

/// Extract a call record, or `None` if `node` holds no call.
pub fn extract_call<N: DocumentNode>(node: &N) -> Result<Option<CallRecord>> {
    let Some(container) = locate_call(node) else {
        return Ok(None);
    };

    let (contact, date, duration) = extract_telephony(&container, "call")?;
    let calltype = get_label(&container).and_then(|l| l.call_type());

    Ok(Some(CallRecord {
        base: RecordBase::new(contact, date),
        duration,
        calltype,
    }))
}

/// Extract a voicemail/recording, or `None` if `node` holds no audio.
///
/// The page's published timestamp marks the end of the recording, so the
/// stored date is moved back by the duration to the moment it started.
pub fn extract_audio<N: DocumentNode>(node: &N) -> Result<Option<AudioRecord>> {
    let Some(container) = locate_audio(node) else {
        return Ok(None);
    };

    let (contact, published, duration) = extract_telephony(&container, "audio")?;
    let date = match duration {
        Some(d) => published
            .checked_sub_signed(d)
            .ok_or_else(|| Error::DurationParse(format_duration(d)))?,
        None => published,
    };

    let mut text = None;
    let mut confidence = None;
    if let Some(full_text) = container.find_text(&FULL_TEXT) {
        if !full_text.trim().is_empty() {
            if full_text.trim() != UNTRANSCRIBED {
                text = Some(unescape_entities(&full_text));
            }
            confidence = mean_confidence(&container);
        }
    }

    let filename = container
        .find(&MEDIA_REFERENCE)
        .and_then(|n| n.attribute("src").map(str::to_string))
        .unwrap_or_default();

    Ok(Some(AudioRecord {
        base: RecordBase::new(contact, date),
        duration,
        audiotype: get_label(&container).and_then(|l| l.audio_type()),
        text,
        confidence,
        filename,
    }))
}

/// Mean of the per-word confidence values of a transcription.
fn mean_confidence<N: DocumentNode>(container: &N) -> Option<f64> {
    let values: Vec<f64> = container
        .find_all(&WORD_CONFIDENCE)
        .iter()
        .filter_map(|n| n.text_content().trim().parse::<f64>().ok())
        .collect();

    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// ============================================
// Text conversations
// ============================================

/// The chat log of a text thread page, if it holds any message.
pub fn locate_chat_log<N: DocumentNode>(node: &N) -> Option<N> {
    node.find(&CHAT_LOG)
        .filter(|log| !message_nodes(log).is_empty())
}

/// Message nodes of a chat log, in page order.
pub fn message_nodes<N: DocumentNode>(chat_log: &N) -> Vec<N> {
    chat_log.find_all(&MESSAGE)
}

/// Extract a single text message.
///
/// The sender is whatever contact the message names; the receiver is left
/// empty until the whole conversation is known.
pub fn extract_text_message<N: DocumentNode>(message: &N) -> Result<TextRecord> {
    let contact = locate_contact(message).unwrap_or_default();

    let stamp = message
        .find(&MESSAGE_DATE)
        .and_then(|n| n.attribute("title").map(str::to_string))
        .ok_or(Error::MissingField {
            kind: "text",
            field: "dt",
        })?;
    let date = parse_date(&stamp)?;

    let text = message
        .find_text(&MESSAGE_BODY)
        .map(|body| unescape_entities(&body))
        .unwrap_or_default();

    Ok(TextRecord {
        base: RecordBase::new(contact, date),
        text,
        receiver: Contact::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tree::HtmlDocument;
    use crate::types::{AudioType, CallType};

    fn call_page(duration: &str) -> String {
        format!(
            r##"<html><head><title>Call</title></head><body>
            <div class="haudio">
              <span class="fn">Placed call to</span>
              <div class="contributor vcard">
                <a class="tel" href="tel:+15551230000"><span class="fn">Bob Smith</span></a>
              </div>
              <abbr class="published" title="2011-03-14T19:27:01.000-04:00">Mar 14</abbr>
              <abbr class="duration" title="PT1M3S">{}</abbr>
              <div class="tags">
                <a rel="tag" href="http://www.google.com/voice#all">All</a>
                <a rel="tag" href="http://www.google.com/voice#placed">Placed</a>
              </div>
            </div></body></html>"##,
            duration
        )
    }

    const VOICEMAIL_PAGE: &str = r##"<html><head><title>Voicemail</title></head><body>
        <div class="haudio">
          <div class="contributor vcard">
            <a class="tel" href="tel:+15559870000"><span class="fn"></span></a>
          </div>
          <abbr class="published" title="2011-03-14T12:01:00.000Z">Mar 14</abbr>
          <abbr class="duration">(00:01:00)</abbr>
          <span class="description">
            <span class="full-text">Hi it&amp;#39;s me call back</span>
            <span><span class="confidence">0.5</span></span>
            <span><span class="confidence">1.0</span></span>
          </span>
          <audio controls="controls" src="Voicemail - 2011-03-14.mp3"></audio>
          <div class="tags"><a rel="tag" href="http://www.google.com/voice#voicemail">Voicemail</a></div>
        </div></body></html>"##;

    #[test]
    fn test_locate_contact_contributor() {
        let doc = HtmlDocument::parse(&call_page("(00:01:03)"));
        let contact = locate_contact(&doc.root()).unwrap();
        assert_eq!(contact.name.as_deref(), Some("Bob Smith"));
        assert_eq!(contact.phonenumber.as_deref(), Some("15551230000"));
    }

    #[test]
    fn test_locate_contact_blank_name_is_absent() {
        let doc = HtmlDocument::parse(VOICEMAIL_PAGE);
        let contact = locate_contact(&doc.root()).unwrap();
        assert_eq!(contact.name, None);
        assert_eq!(contact.phonenumber.as_deref(), Some("15559870000"));
    }

    #[test]
    fn test_call_and_audio_are_exclusive() {
        let call = HtmlDocument::parse(&call_page("(00:01:03)"));
        let audio = HtmlDocument::parse(VOICEMAIL_PAGE);

        assert!(locate_telephony_container(&call.root()).is_some());
        assert!(locate_telephony_container(&audio.root()).is_some());

        assert!(locate_call(&call.root()).is_some());
        assert!(locate_audio(&call.root()).is_none());
        assert!(locate_audio(&audio.root()).is_some());
        assert!(locate_call(&audio.root()).is_none());
    }

    #[test]
    fn test_extract_call() {
        let doc = HtmlDocument::parse(&call_page("(00:01:03)"));
        let call = extract_call(&doc.root()).unwrap().unwrap();
        assert_eq!(call.calltype, Some(CallType::Placed));
        assert_eq!(call.duration.unwrap().num_seconds(), 63);
        assert_eq!(call.base.date.unwrap().to_string(), "2011-03-14 23:27:01");
        assert!(call.is_meaningful());
        assert!(extract_audio(&doc.root()).unwrap().is_none());
    }

    #[test]
    fn test_extract_audio_duration_before_earliest_date_is_error() {
        let page = VOICEMAIL_PAGE.replace("(00:01:00)", "(10000000000:00:00)");
        let doc = HtmlDocument::parse(&page);
        assert!(matches!(
            extract_audio(&doc.root()),
            Err(Error::DurationParse(_))
        ));
    }

    #[test]
    fn test_extract_call_bad_duration_is_error() {
        let doc = HtmlDocument::parse(&call_page("soon"));
        let err = extract_call(&doc.root()).unwrap_err();
        assert!(matches!(err, Error::DurationParse(_)));
    }

    #[test]
    fn test_extract_audio_adjusts_date_by_duration() {
        let doc = HtmlDocument::parse(VOICEMAIL_PAGE);
        let audio = extract_audio(&doc.root()).unwrap().unwrap();

        // published 12:01:00 minus one minute of recording
        assert_eq!(audio.base.date.unwrap().to_string(), "2011-03-14 12:00:00");
        assert_eq!(audio.duration.unwrap().num_seconds(), 60);
        assert_eq!(audio.audiotype, Some(AudioType::Voicemail));
        assert_eq!(audio.filename, "Voicemail - 2011-03-14.mp3");
        assert_eq!(audio.text.as_deref(), Some("Hi it's me call back"));
        assert_eq!(audio.confidence, Some(0.75));
        assert!(audio.is_meaningful());
    }

    #[test]
    fn test_extract_audio_untranscribed() {
        let page = VOICEMAIL_PAGE.replace(
            "Hi it&amp;#39;s me call back",
            "Unable to transcribe this message.",
        );
        let doc = HtmlDocument::parse(&page);
        let audio = extract_audio(&doc.root()).unwrap().unwrap();
        assert_eq!(audio.text, None);
        assert_eq!(audio.confidence, Some(0.75));
    }

    #[test]
    fn test_chat_log_without_messages_is_no_match() {
        let doc = HtmlDocument::parse(
            r#"<html><body><div class="hChatLog hfeed"><p>nothing</p></div></body></html>"#,
        );
        assert!(locate_chat_log(&doc.root()).is_none());
    }

    #[test]
    fn test_extract_text_message() {
        let doc = HtmlDocument::parse(
            r#"<html><body><div class="hChatLog hfeed">
              <div class="message">
                <abbr class="dt" title="2011-03-14T19:27:01.000-04:00">7:27 PM</abbr>:
                <cite class="sender vcard"><a class="tel" href="tel:+15551230000"><span class="fn">Bob</span></a></cite>:
                <q>Fish &amp;amp; chips?</q>
              </div>
            </div></body></html>"#,
        );
        let log = locate_chat_log(&doc.root()).unwrap();
        let nodes = message_nodes(&log);
        assert_eq!(nodes.len(), 1);

        let message = extract_text_message(&nodes[0]).unwrap();
        assert_eq!(message.base.contact.name.as_deref(), Some("Bob"));
        assert_eq!(message.text, "Fish & chips?");
        assert!(message.receiver.is_empty());
    }

    #[test]
    fn test_extract_text_message_missing_date() {
        let doc = HtmlDocument::parse(
            r#"<html><body><div class="hChatLog hfeed">
              <div class="message"><q>hi</q></div>
            </div></body></html>"#,
        );
        let log = locate_chat_log(&doc.root()).unwrap();
        let err = extract_text_message(&message_nodes(&log)[0]).unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "dt", .. }));
    }
}
