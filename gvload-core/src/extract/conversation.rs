//! Text-conversation assembly
//!
//! A thread page lists messages with their sender only. Receivers are worked
//! out once every message has been read:
//!
//! 1. System notices (sender `Google Voice`) and senders with neither name
//!    nor number are dropped.
//! 2. A sender whose number is one of the account's numbers becomes the self
//!    identity; any other sender is the conversation partner.
//! 3. With exactly two parties, every message's receiver is the party that
//!    did not send it. A pure outgoing thread borrows the partner's name from
//!    the page title; a pure incoming thread adds the self identity.
//! 4. More than two parties is a group thread: it is flagged and returned
//!    with receivers left empty.

use super::locators::{extract_text_message, locate_chat_log, message_nodes};
use super::tree::DocumentNode;
use crate::error::Result;
use crate::types::{Contact, TextConversation, TextRecord, SELF_NAME};

/// Sender name of notices generated by the service itself
const SYSTEM_SENDER: &str = "Google Voice";

/// The self identity, keyed by the first of the account's numbers.
pub fn self_identity(my_numbers: &[String]) -> Contact {
    match my_numbers.first() {
        Some(number) => Contact::me(number),
        None => Contact::new(Some(SELF_NAME.to_string()), None),
    }
}

/// Locate and assemble the conversation on a thread page.
///
/// Returns `Ok(None)` when the page has no chat log with messages.
pub fn extract_conversation<N: DocumentNode>(
    node: &N,
    one_way_name: Option<&str>,
    my_numbers: &[String],
) -> Result<Option<TextConversation>> {
    let Some(chat_log) = locate_chat_log(node) else {
        return Ok(None);
    };

    let messages = message_nodes(&chat_log)
        .iter()
        .map(extract_text_message)
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(assemble_conversation(
        messages,
        one_way_name,
        my_numbers,
    )))
}

/// Assign senders and receivers across a thread's messages.
pub fn assemble_conversation(
    messages: Vec<TextRecord>,
    one_way_name: Option<&str>,
    my_numbers: &[String],
) -> TextConversation {
    let me = self_identity(my_numbers);
    let mut conversation = TextConversation::default();
    let mut partner: Option<Contact> = None;

    for mut message in messages {
        let sender = &message.base.contact;
        if sender.name.as_deref() == Some(SYSTEM_SENDER) {
            tracing::debug!(text = %message.text, "Skipping system notice");
            continue;
        }
        if sender.is_empty() {
            tracing::debug!(text = %message.text, "Skipping message without sender");
            continue;
        }

        let from_me = sender
            .phonenumber
            .as_ref()
            .is_some_and(|n| my_numbers.contains(n));
        if from_me {
            message.base.contact = me.clone();
        } else {
            partner = Some(sender.clone());
        }
        conversation.messages.push(message);
    }

    let mut parties: Vec<Contact> = Vec::new();
    for message in &conversation.messages {
        if !parties.contains(&message.base.contact) {
            parties.push(message.base.contact.clone());
        }
    }

    // Outgoing only: the page title is all we know about the other side
    let partner = match partner {
        Some(p) => p,
        None => {
            let p = Contact::new(one_way_name.map(str::to_string), None);
            parties.push(p.clone());
            p
        }
    };

    if parties.len() == 1 {
        // Incoming only: the account owner never replied
        parties.push(me);
    } else if parties.len() > 2 {
        let dumped: Vec<String> = parties.iter().map(|p| p.dump()).collect();
        tracing::warn!(
            parties = ?dumped,
            messages = conversation.messages.len(),
            "Multi-party conversation, receivers left unassigned"
        );
        conversation.multi_party = true;
        return conversation;
    }

    conversation.contact = partner;
    for message in &mut conversation.messages {
        message.receiver = if message.base.contact == parties[0] {
            parties[1].clone()
        } else {
            parties[0].clone()
        };
    }

    conversation
}
