//! Inbound line classification.

use latchkey_core::constants::COMMAND_PREVIEW_LENGTH;
use serde::{Deserialize, Serialize};

use crate::commands::{RemoteCommand, parse_command};

const PREFIX_BROADCAST: &str = "#broadcast=";
const PREFIX_COMMAND: &str = "#command=";
const PREFIX_CONNECTION: &str = "#connection=";
const PREFIX_RESPONSE: &str = "#response=";

/// One inbound line after prefix classification.
///
/// Payloads are trimmed. Only [`InboundMessage::Command`] changes
/// controller state; every other variant is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundMessage {
    Broadcast(String),
    Command(RemoteCommand),
    Connection(String),
    Response(String),
    Plain(String),
}

/// Classify one inbound line by its prefix.
///
/// # Examples
///
/// ```
/// use latchkey_protocol::{classify, InboundMessage};
///
/// assert_eq!(
///     classify("#broadcast= fire drill at 10:00 "),
///     InboundMessage::Broadcast("fire drill at 10:00".into())
/// );
/// assert_eq!(classify("hello"), InboundMessage::Plain("hello".into()));
/// ```
pub fn classify(line: &str) -> InboundMessage {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(PREFIX_BROADCAST) {
        InboundMessage::Broadcast(rest.trim().to_string())
    } else if let Some(rest) = line.strip_prefix(PREFIX_COMMAND) {
        InboundMessage::Command(parse_command(rest))
    } else if let Some(rest) = line.strip_prefix(PREFIX_CONNECTION) {
        InboundMessage::Connection(rest.trim().to_string())
    } else if let Some(rest) = line.strip_prefix(PREFIX_RESPONSE) {
        InboundMessage::Response(rest.trim().to_string())
    } else {
        InboundMessage::Plain(line.to_string())
    }
}

/// Shorten untrusted text for logging.
///
/// The result never exceeds 40 characters; longer input is cut and ends
/// with `...`. Counts characters, not bytes, so multi-byte input is never
/// split.
pub fn command_preview(text: &str) -> String {
    if text.chars().count() <= COMMAND_PREVIEW_LENGTH {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(COMMAND_PREVIEW_LENGTH - 3).collect();
    preview.push_str("...");
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::RemoteCommandKind;

    #[test]
    fn test_classify_command() {
        let message = classify("#command=!security:system:unlock");
        assert_eq!(
            message,
            InboundMessage::Command(RemoteCommand::new(RemoteCommandKind::SystemUnlock))
        );
    }

    #[test]
    fn test_classify_connection_and_response() {
        assert_eq!(
            classify("#connection=keep-alive"),
            InboundMessage::Connection("keep-alive".into())
        );
        assert_eq!(
            classify("\t#response= ok \r\n"),
            InboundMessage::Response("ok".into())
        );
    }

    #[test]
    fn test_prefix_without_equals_is_plain() {
        assert_eq!(
            classify("#broadcast hi"),
            InboundMessage::Plain("#broadcast hi".into())
        );
    }

    #[test]
    fn test_unrecognized_command_still_classified_as_command() {
        let InboundMessage::Command(command) = classify("#command=open sesame") else {
            panic!("expected a command");
        };
        assert_eq!(command.kind, RemoteCommandKind::Unrecognized);
        assert!(command.args.is_empty());
    }

    #[test]
    fn test_preview_short_text_untouched() {
        assert_eq!(command_preview("!security:open"), "!security:open");
    }

    #[test]
    fn test_preview_truncates_to_limit() {
        let long = "x".repeat(120);
        let preview = command_preview(&long);
        assert_eq!(preview.chars().count(), 40);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_preview_exactly_at_limit() {
        let text = "y".repeat(40);
        assert_eq!(command_preview(&text), text);
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&InboundMessage::Broadcast("hi".into())).unwrap();
        assert_eq!(json, r#"{"type":"broadcast","payload":"hi"}"#);
    }
}
