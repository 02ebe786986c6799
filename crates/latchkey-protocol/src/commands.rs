//! Remote command grammar.
//!
//! The body of a `#command=` line is one of a fixed set of tokens:
//!
//! ```text
//! !security:lock
//! !security:unlock [seconds]
//! !security:system:lock
//! !security:system:unlock
//! !security:manualunlocks:enable
//! !security:manualunlocks:disable
//! ```
//!
//! Only `unlock` takes arguments. Anything else parses as
//! [`RemoteCommandKind::Unrecognized`].

use std::fmt;

use latchkey_core::constants::{DEFAULT_OPEN_SECONDS, REMOTE_UNLOCK_EXCLUSIVE_RANGE};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::message::command_preview;

const CMD_LOCK: &str = "!security:lock";
const CMD_UNLOCK: &str = "!security:unlock";
const CMD_SYSTEM_LOCK: &str = "!security:system:lock";
const CMD_SYSTEM_UNLOCK: &str = "!security:system:unlock";
const CMD_MANUAL_ENABLE: &str = "!security:manualunlocks:enable";
const CMD_MANUAL_DISABLE: &str = "!security:manualunlocks:disable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCommandKind {
    Lock,
    Unlock,
    SystemLock,
    SystemUnlock,
    ManualUnlocksEnable,
    ManualUnlocksDisable,
    Unrecognized,
}

impl fmt::Display for RemoteCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            RemoteCommandKind::Lock => CMD_LOCK,
            RemoteCommandKind::Unlock => CMD_UNLOCK,
            RemoteCommandKind::SystemLock => CMD_SYSTEM_LOCK,
            RemoteCommandKind::SystemUnlock => CMD_SYSTEM_UNLOCK,
            RemoteCommandKind::ManualUnlocksEnable => CMD_MANUAL_ENABLE,
            RemoteCommandKind::ManualUnlocksDisable => CMD_MANUAL_DISABLE,
            RemoteCommandKind::Unrecognized => "<unrecognized>",
        };
        write!(f, "{}", token)
    }
}

/// A parsed remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub kind: RemoteCommandKind,

    /// Whitespace separated arguments. Empty for every kind but `Unlock`.
    pub args: Vec<String>,
}

impl RemoteCommand {
    pub fn new(kind: RemoteCommandKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
        }
    }

    pub fn unlock(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            kind: RemoteCommandKind::Unlock,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Open-cycle duration requested by an `Unlock` command.
    ///
    /// The first argument must be an integer strictly between 0 and 10;
    /// anything else, including a missing argument, yields the default of
    /// 3 seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use latchkey_protocol::RemoteCommand;
    ///
    /// assert_eq!(RemoteCommand::unlock(["7"]).unlock_seconds(), 7);
    /// assert_eq!(RemoteCommand::unlock(["10"]).unlock_seconds(), 3);
    /// assert_eq!(RemoteCommand::unlock(Vec::<String>::new()).unlock_seconds(), 3);
    /// ```
    pub fn unlock_seconds(&self) -> i64 {
        let (low, high) = REMOTE_UNLOCK_EXCLUSIVE_RANGE;
        self.args
            .first()
            .and_then(|arg| arg.trim().parse::<i64>().ok())
            .filter(|seconds| *seconds > low && *seconds < high)
            .unwrap_or(DEFAULT_OPEN_SECONDS)
    }
}

/// Parse the body of a `#command=` line.
///
/// Leading and trailing whitespace is ignored. Matching is exact and case
/// sensitive.
pub fn parse_command(body: &str) -> RemoteCommand {
    let body = body.trim();

    let kind = match body {
        CMD_LOCK => RemoteCommandKind::Lock,
        CMD_SYSTEM_LOCK => RemoteCommandKind::SystemLock,
        CMD_SYSTEM_UNLOCK => RemoteCommandKind::SystemUnlock,
        CMD_MANUAL_ENABLE => RemoteCommandKind::ManualUnlocksEnable,
        CMD_MANUAL_DISABLE => RemoteCommandKind::ManualUnlocksDisable,
        _ => match body.strip_prefix(CMD_UNLOCK) {
            // `!security:unlocked` must not pass for an unlock.
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                return RemoteCommand::unlock(rest.split_whitespace());
            }
            _ => {
                warn!(preview = %command_preview(body), "Unrecognized remote command");
                RemoteCommandKind::Unrecognized
            }
        },
    };

    RemoteCommand::new(kind)
}
