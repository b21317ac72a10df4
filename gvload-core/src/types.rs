//! Core domain types for gvload
//!
//! These types represent the records extracted from a Google Voice export.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Contact** | A name/number pair; identity is the phone number alone |
//! | **Self identity** | The synthetic contact `###ME###` standing for the account owner |
//! | **Document** | The classified content of one exported page |
//! | **Record** | One row-sized item (call, audio, single text) after flattening |
//! | **Conversation** | All text messages of one exported thread page |
//!
//! ### Record kinds
//!
//! Every record embeds a [`RecordBase`] (contact + date). Kind-specific data
//! lives in the variant payload; shared behavior dispatches on the
//! [`Record`] / [`Document`] tag instead of through a class hierarchy.

use crate::format::{format_duration, format_timestamp};
use chrono::{Duration, NaiveDateTime};
use std::hash::{Hash, Hasher};

/// Name given to the account owner once a sender is recognized by number.
pub const SELF_NAME: &str = "###ME###";

// ============================================
// Contact
// ============================================

/// A correspondent, as far as the export identifies them.
///
/// Equality and hashing use the phone number only: the number is the durable
/// key, while names may be missing or spelled differently across records.
#[derive(Debug, Clone, Default)]
pub struct Contact {
    /// Display name (`None` when blank or absent)
    pub name: Option<String>,
    /// Digits of the phone number, without punctuation
    pub phonenumber: Option<String>,
}

impl Contact {
    pub fn new(name: Option<String>, phonenumber: Option<String>) -> Self {
        Self { name, phonenumber }
    }

    /// The self identity for the given primary number.
    pub fn me(phonenumber: &str) -> Self {
        Self {
            name: Some(SELF_NAME.to_string()),
            phonenumber: Some(phonenumber.to_string()),
        }
    }

    /// Whether this contact is the synthetic self identity.
    pub fn is_me(&self) -> bool {
        self.name.as_deref() == Some(SELF_NAME)
    }

    /// True iff neither name nor number is known.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phonenumber.is_none()
    }

    pub fn is_meaningful(&self) -> bool {
        !self.is_empty()
    }

    /// True iff both name and number are known.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.phonenumber.is_some()
    }

    pub fn dump(&self) -> String {
        format!(
            "{} ({})",
            self.name.as_deref().unwrap_or("None"),
            self.phonenumber.as_deref().unwrap_or("None")
        )
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.phonenumber == other.phonenumber
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.phonenumber.hash(state);
    }
}

impl std::fmt::Display for Contact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Contact: {}", self.dump())
    }
}

// ============================================
// Categories
// ============================================

/// Direction/outcome of a phone call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    Placed,
    Received,
    Missed,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Placed => "placed",
            CallType::Received => "received",
            CallType::Missed => "missed",
        }
    }
}

impl std::str::FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(CallType::Placed),
            "received" => Ok(CallType::Received),
            "missed" => Ok(CallType::Missed),
            _ => Err(format!("unknown call type: {}", s)),
        }
    }
}

/// Kind of audio record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioType {
    Recorded,
    Voicemail,
}

impl AudioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioType::Recorded => "recorded",
            AudioType::Voicemail => "voicemail",
        }
    }
}

impl std::str::FromStr for AudioType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recorded" => Ok(AudioType::Recorded),
            "voicemail" => Ok(AudioType::Voicemail),
            _ => Err(format!("unknown audio type: {}", s)),
        }
    }
}

/// Category tag attached to a telephony page.
///
/// The export tags every call and audio page with one of these tokens
/// (as the fragment of a tag link, e.g. `...#voicemail`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Placed,
    Received,
    Missed,
    Recorded,
    Voicemail,
}

impl Label {
    /// Parse a tag token; unknown tokens (inbox, starred, ...) yield `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "placed" => Some(Label::Placed),
            "received" => Some(Label::Received),
            "missed" => Some(Label::Missed),
            "recorded" => Some(Label::Recorded),
            "voicemail" => Some(Label::Voicemail),
            _ => None,
        }
    }

    pub fn call_type(&self) -> Option<CallType> {
        match self {
            Label::Placed => Some(CallType::Placed),
            Label::Received => Some(CallType::Received),
            Label::Missed => Some(CallType::Missed),
            Label::Recorded | Label::Voicemail => None,
        }
    }

    pub fn audio_type(&self) -> Option<AudioType> {
        match self {
            Label::Recorded => Some(AudioType::Recorded),
            Label::Voicemail => Some(AudioType::Voicemail),
            _ => None,
        }
    }
}

// ============================================
// Records
// ============================================

/// Data shared by every record kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBase {
    /// The other party (or the sender, for text messages)
    pub contact: Contact,
    /// Naive UTC instant
    pub date: Option<NaiveDateTime>,
}

impl RecordBase {
    pub fn new(contact: Contact, date: NaiveDateTime) -> Self {
        Self {
            contact,
            date: Some(date),
        }
    }

    pub fn is_meaningful(&self) -> bool {
        self.date.is_some()
    }

    pub fn dump(&self) -> String {
        let date = self
            .date
            .map(format_timestamp)
            .unwrap_or_else(|| "None".to_string());
        format!("{}; {}", self.contact.dump(), date)
    }
}

/// A placed, received or missed call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRecord {
    pub base: RecordBase,
    pub duration: Option<Duration>,
    pub calltype: Option<CallType>,
}

impl CallRecord {
    pub fn is_meaningful(&self) -> bool {
        self.base.is_meaningful() && self.base.contact.is_meaningful() && self.calltype.is_some()
    }

    pub fn dump(&self) -> String {
        let calltype = self.calltype.map(|c| c.as_str()).unwrap_or("None");
        let mut out = format!("{}; {}", calltype, self.base.dump());
        if let Some(duration) = self.duration {
            out.push_str(&format!("({})", format_duration(duration)));
        }
        out
    }
}

/// A voicemail or a recorded call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioRecord {
    pub base: RecordBase,
    pub duration: Option<Duration>,
    pub audiotype: Option<AudioType>,
    /// Transcription, if the export has one
    pub text: Option<String>,
    /// Mean per-word transcription confidence in `[0, 1]`
    pub confidence: Option<f64>,
    /// Path of the referenced media file, relative to the page
    pub filename: String,
}

impl AudioRecord {
    pub fn is_meaningful(&self) -> bool {
        self.base.is_meaningful() && self.base.contact.is_meaningful() && self.audiotype.is_some()
    }

    pub fn dump(&self) -> String {
        let audiotype = self.audiotype.map(|a| a.as_str()).unwrap_or("None");
        let mut out = format!("{}; {}", audiotype, self.base.dump());
        if let Some(duration) = self.duration {
            out.push_str(&format!("({})", format_duration(duration)));
        }
        if let Some(text) = &self.text {
            if let Some(confidence) = self.confidence {
                out.push_str(&format!(" [{:.2}]", confidence));
            }
            out.push(' ');
            out.push_str(text);
        }
        out
    }
}

/// One SMS in a conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRecord {
    /// `base.contact` is the sender
    pub base: RecordBase,
    pub text: String,
    /// Recipient; only known once the whole conversation has been read
    pub receiver: Contact,
}

impl TextRecord {
    pub fn is_meaningful(&self) -> bool {
        self.base.is_meaningful()
    }

    pub fn dump(&self) -> String {
        format!("{} {}", self.base.dump(), self.text)
    }
}

/// All messages of one exported thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextConversation {
    /// The other party of the thread
    pub contact: Contact,
    pub messages: Vec<TextRecord>,
    /// More than two identities took part; receivers were left unassigned
    pub multi_party: bool,
}

impl TextConversation {
    pub fn is_meaningful(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn dump(&self) -> String {
        let messages: Vec<String> = self.messages.iter().map(|m| m.dump()).collect();
        format!("{} {:?}", self.contact.dump(), messages)
    }
}

// ============================================
// Sum types
// ============================================

/// Classified content of one exported page.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Conversation(TextConversation),
    Call(CallRecord),
    Audio(AudioRecord),
}

impl Document {
    /// Short kind name used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Conversation(_) => "conversation",
            Document::Call(_) => "call",
            Document::Audio(_) => "audio",
        }
    }

    pub fn is_meaningful(&self) -> bool {
        match self {
            Document::Conversation(c) => c.is_meaningful(),
            Document::Call(c) => c.is_meaningful(),
            Document::Audio(a) => a.is_meaningful(),
        }
    }

    pub fn dump(&self) -> String {
        match self {
            Document::Conversation(c) => format!("TextConversation: {}", c.dump()),
            Document::Call(c) => format!("CallRecord: {}", c.dump()),
            Document::Audio(a) => format!("AudioRecord: {}", a.dump()),
        }
    }
}

/// A single persisted item, after conversations have been flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Call(CallRecord),
    Audio(AudioRecord),
    Text(TextRecord),
}

impl Record {
    pub fn base(&self) -> &RecordBase {
        match self {
            Record::Call(c) => &c.base,
            Record::Audio(a) => &a.base,
            Record::Text(t) => &t.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut RecordBase {
        match self {
            Record::Call(c) => &mut c.base,
            Record::Audio(a) => &mut a.base,
            Record::Text(t) => &mut t.base,
        }
    }

    /// Primary contact (the sender, for text messages)
    pub fn contact(&self) -> &Contact {
        &self.base().contact
    }

    pub fn is_meaningful(&self) -> bool {
        match self {
            Record::Call(c) => c.is_meaningful(),
            Record::Audio(a) => a.is_meaningful(),
            Record::Text(t) => t.is_meaningful(),
        }
    }

    pub fn dump(&self) -> String {
        match self {
            Record::Call(c) => format!("CallRecord: {}", c.dump()),
            Record::Audio(a) => format!("AudioRecord: {}", a.dump()),
            Record::Text(t) => format!("TextRecord: {}", t.dump()),
        }
    }
}

/// Explode conversations into their messages.
///
/// Non-text records come first, followed by every text message in
/// document order.
pub fn flatten_documents(documents: Vec<Document>) -> Vec<Record> {
    let mut records = Vec::with_capacity(documents.len());
    let mut texts = Vec::new();

    for document in documents {
        match document {
            Document::Call(c) => records.push(Record::Call(c)),
            Document::Audio(a) => records.push(Record::Audio(a)),
            Document::Conversation(c) => texts.extend(c.messages.into_iter().map(Record::Text)),
        }
    }

    records.extend(texts);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_contact_identity_is_number() {
        let a = Contact::new(Some("Alice".into()), Some("5551234".into()));
        let b = Contact::new(Some("Alicia".into()), Some("5551234".into()));
        let c = Contact::new(None, Some("5551234".into()));
        assert_eq!(a, b);
        assert_eq!(a, c);

        let set: HashSet<Contact> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 1);

        let other = Contact::new(Some("Alice".into()), Some("5559999".into()));
        assert_ne!(other, Contact::new(Some("Alice".into()), Some("5551234".into())));
    }

    #[test]
    fn test_contact_emptiness() {
        assert!(Contact::default().is_empty());
        assert!(!Contact::new(Some("Bob".into()), None).is_empty());
        assert!(Contact::new(Some("Bob".into()), Some("1".into())).is_complete());
        assert!(Contact::me("15550001").is_me());
        assert_eq!(Contact::me("15550001").dump(), "###ME### (15550001)");
    }

    #[test]
    fn test_label_conversions() {
        assert_eq!(Label::from_token("missed"), Some(Label::Missed));
        assert_eq!(Label::from_token("inbox"), None);
        assert_eq!(Label::Voicemail.audio_type(), Some(AudioType::Voicemail));
        assert_eq!(Label::Voicemail.call_type(), None);
        assert_eq!(Label::Placed.call_type(), Some(CallType::Placed));
        assert_eq!("received".parse::<CallType>(), Ok(CallType::Received));
        assert!("bogus".parse::<AudioType>().is_err());
    }

    #[test]
    fn test_call_meaningful_requires_type_and_contact() {
        let mut call = CallRecord {
            base: RecordBase::new(Contact::new(None, Some("1".into())), at(1, 2, 3)),
            duration: Some(Duration::seconds(5)),
            calltype: None,
        };
        assert!(!call.is_meaningful());
        call.calltype = Some(CallType::Placed);
        assert!(call.is_meaningful());
        call.base.contact = Contact::default();
        assert!(!call.is_meaningful());
        assert!(!CallRecord::default().is_meaningful());
    }

    #[test]
    fn test_dump_formats() {
        let call = CallRecord {
            base: RecordBase::new(Contact::new(Some("Bob".into()), Some("1".into())), at(1, 2, 3)),
            duration: Some(Duration::seconds(63)),
            calltype: Some(CallType::Received),
        };
        assert_eq!(call.dump(), "received; Bob (1); 2011-03-14 01:02:03(00:01:03)");

        let audio = AudioRecord {
            base: RecordBase::new(Contact::new(None, Some("2".into())), at(4, 5, 6)),
            duration: None,
            audiotype: Some(AudioType::Voicemail),
            text: Some("call me".into()),
            confidence: Some(0.5),
            filename: "a.mp3".into(),
        };
        assert_eq!(
            audio.dump(),
            "voicemail; None (2); 2011-03-14 04:05:06 [0.50] call me"
        );
    }

    #[test]
    fn test_flatten_documents_puts_texts_last() {
        let text = TextRecord {
            base: RecordBase::new(Contact::me("1"), at(0, 0, 1)),
            text: "hi".into(),
            receiver: Contact::default(),
        };
        let conversation = TextConversation {
            contact: Contact::default(),
            messages: vec![text.clone(), text],
            multi_party: false,
        };
        let call = CallRecord {
            base: RecordBase::new(Contact::new(None, Some("2".into())), at(0, 0, 2)),
            duration: None,
            calltype: Some(CallType::Missed),
        };

        let records = flatten_documents(vec![
            Document::Conversation(conversation),
            Document::Call(call),
        ]);
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], Record::Call(_)));
        assert!(matches!(records[1], Record::Text(_)));
        assert!(matches!(records[2], Record::Text(_)));
    }
}
