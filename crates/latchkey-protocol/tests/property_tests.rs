//! Property-based tests for inbound line handling.
//!
//! Remote input is untrusted, so classification must be total: any line
//! classifies without panicking, and the logging preview stays bounded.

use latchkey_protocol::{InboundMessage, RemoteCommandKind, classify, command_preview};
use proptest::prelude::*;

/// Strategy for valid unlock durations (1-9).
fn valid_unlock_seconds() -> impl Strategy<Value = i64> {
    1i64..=9i64
}

/// Strategy for integers the remote unlock must reject.
fn out_of_range_seconds() -> impl Strategy<Value = i64> {
    prop_oneof![i64::MIN..=0i64, 10i64..=i64::MAX]
}

proptest! {
    /// Property: classification is total over arbitrary text.
    #[test]
    fn prop_classify_never_panics(line in ".*") {
        let _ = classify(&line);
    }

    /// Property: previews never exceed 40 characters.
    #[test]
    fn prop_preview_bounded(text in ".{0,200}") {
        prop_assert!(command_preview(&text).chars().count() <= 40);
    }

    /// Property: short text passes through the preview unchanged.
    #[test]
    fn prop_preview_identity_for_short_text(text in ".{0,40}") {
        prop_assert_eq!(command_preview(&text), text);
    }

    /// Property: every in-range duration survives a wire round trip.
    #[test]
    fn prop_unlock_in_range_accepted(seconds in valid_unlock_seconds()) {
        let line = format!("#command=!security:unlock {seconds}");
        let InboundMessage::Command(command) = classify(&line) else {
            return Err(TestCaseError::fail("not classified as a command"));
        };
        prop_assert_eq!(command.kind, RemoteCommandKind::Unlock);
        prop_assert_eq!(command.unlock_seconds(), seconds);
    }

    /// Property: out-of-range durations fall back to 3 seconds.
    #[test]
    fn prop_unlock_out_of_range_defaults(seconds in out_of_range_seconds()) {
        let line = format!("#command=!security:unlock {seconds}");
        let InboundMessage::Command(command) = classify(&line) else {
            return Err(TestCaseError::fail("not classified as a command"));
        };
        prop_assert_eq!(command.unlock_seconds(), 3);
    }

    /// Property: surrounding whitespace never changes the classification.
    #[test]
    fn prop_whitespace_insensitive(pad_left in "[ \t]{0,4}", pad_right in "[ \t\r\n]{0,4}") {
        let line = format!("{pad_left}#command=!security:lock{pad_right}");
        let InboundMessage::Command(command) = classify(&line) else {
            return Err(TestCaseError::fail("not classified as a command"));
        };
        prop_assert_eq!(command.kind, RemoteCommandKind::Lock);
    }
}
