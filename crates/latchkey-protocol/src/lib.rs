//! Text protocol spoken between the access point and its remote peer.
//!
//! Every inbound frame is one line of text. A line is classified by its
//! prefix into a [`InboundMessage`]; lines carrying `#command=` are further
//! parsed into a [`RemoteCommand`] the control state machine can act on.
//!
//! # Message Prefixes
//!
//! | Prefix | Variant | Handling |
//! |--------|---------|----------|
//! | `#broadcast=` | [`InboundMessage::Broadcast`] | logged |
//! | `#command=` | [`InboundMessage::Command`] | dispatched to the controller |
//! | `#connection=` | [`InboundMessage::Connection`] | logged |
//! | `#response=` | [`InboundMessage::Response`] | logged |
//! | anything else | [`InboundMessage::Plain`] | logged |
//!
//! # Examples
//!
//! ```
//! use latchkey_protocol::{classify, InboundMessage, RemoteCommandKind};
//!
//! match classify("  #command=!security:unlock 5 ") {
//!     InboundMessage::Command(command) => {
//!         assert_eq!(command.kind, RemoteCommandKind::Unlock);
//!         assert_eq!(command.unlock_seconds(), 5);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! Outbound traffic is limited to the keep-alive line, see
//! [`latchkey_core::constants::KEEP_ALIVE_LINE`].

pub mod commands;
pub mod message;

pub use commands::{RemoteCommand, RemoteCommandKind, parse_command};
pub use message::{InboundMessage, classify, command_preview};
