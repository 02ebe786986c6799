//! Policy and protocol constants for the access point.
//!
//! The values here are fixed behavior rather than tunables: the lockout
//! policy, the countdown leading texts, the remote connection timers and the
//! exact user-facing prompts. Components that need a configurable variant
//! (for example the local open-cycle default) clamp back into the ranges
//! defined here.
//!
//! # Usage
//!
//! ```
//! use latchkey_core::constants::{clamp_open_seconds, LOCKOUT_THRESHOLD};
//!
//! assert_eq!(LOCKOUT_THRESHOLD, 5);
//! assert_eq!(clamp_open_seconds(42), 9);
//! assert_eq!(clamp_open_seconds(0), 1);
//! ```

use std::time::Duration;

// ============================================================================
// Lockout policy
// ============================================================================

/// Consecutive denied scans that trigger an automatic lockout.
pub const LOCKOUT_THRESHOLD: u32 = 5;

/// Duration of the automatic lockout, in seconds.
pub const LOCKOUT_SECONDS: i64 = 300;

// ============================================================================
// Open cycle
// ============================================================================

/// Open-cycle length used when a request does not carry a valid duration.
pub const DEFAULT_OPEN_SECONDS: i64 = 3;

/// Shortest open cycle the relay is ever energized for.
pub const MIN_OPEN_SECONDS: i64 = 1;

/// Longest open cycle the relay is ever energized for.
pub const MAX_OPEN_SECONDS: i64 = 9;

/// Remote unlock durations must lie strictly inside this range.
///
/// Anything outside `(0, 10)` falls back to [`DEFAULT_OPEN_SECONDS`].
pub const REMOTE_UNLOCK_EXCLUSIVE_RANGE: (i64, i64) = (0, 10);

/// Duration of the "Locked..." holding notice. Negative on purpose: the
/// countdown engine shows the leading text instead of ticking.
pub const LOCKED_NOTICE_SECONDS: i64 = -1;

/// Clamp an open-cycle duration into `[MIN_OPEN_SECONDS, MAX_OPEN_SECONDS]`.
pub fn clamp_open_seconds(seconds: i64) -> i64 {
    seconds.clamp(MIN_OPEN_SECONDS, MAX_OPEN_SECONDS)
}

// ============================================================================
// Countdown timing
// ============================================================================

/// Tick interval for user-visible countdowns.
pub const COUNTDOWN_TICK: Duration = Duration::from_millis(1000);

/// Length of the inactivity countdown that restores the idle text.
pub const INACTIVITY_MS: i64 = 50;

/// Tick interval of the inactivity countdown.
pub const INACTIVITY_TICK: Duration = Duration::from_millis(50);

// ============================================================================
// Countdown leading texts
// ============================================================================

pub const LEADING_UNLOCKED: &str = "Unlocked for ";
pub const LEADING_LOCKED: &str = "Locked...";
pub const LEADING_SYSTEM_DISABLED: &str = "System disabled for ";

// ============================================================================
// Sensor polling
// ============================================================================

/// Poll interval while waiting for a finger during a scan.
pub const SCAN_POLL: Duration = Duration::from_millis(100);

/// Poll interval while waiting for the finger to lift during enrollment.
pub const LIFT_POLL: Duration = Duration::from_millis(50);

/// Highest credential id the sensor can store.
pub const MAX_CREDENTIAL_ID: u16 = 999;

// ============================================================================
// Remote connection
// ============================================================================

/// Interval between keep-alive lines while the connection is open.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Interval between reconnect attempts while the connection is down.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Keep-alive line sent to the remote peer.
pub const KEEP_ALIVE_LINE: &str = "#connection=keep-alive";

/// Maximum length of the preview logged for an unrecognized command.
pub const COMMAND_PREVIEW_LENGTH: usize = 40;

// ============================================================================
// Credentials
// ============================================================================

/// Emergency uses granted to a freshly enrolled or reset credential.
pub const DEFAULT_EMERGENCY_USES: u32 = 1;

// ============================================================================
// User-facing text
// ============================================================================

/// Idle text while the system is operating normally.
pub const IDLE_TEXT: &str = "";

/// Idle text while manual unlocks were disabled by an administrator.
pub const SYSTEM_DISABLED_TEXT: &str = "System disabled by an Administrator.";

pub const MSG_SCAN_PROMPT: &str = "Place your finger on the sensor.";
pub const MSG_ADMIN_SCAN_PROMPT: &str = "Administrator: place your finger on the sensor.";
pub const MSG_REGISTER_PROMPT: &str = "Place a new finger on the sensor.";
pub const MSG_EMERGENCY_PROMPT: &str =
    "Use your Emergency Use?\nThe system administrator will be notified!";
pub const MSG_NOT_RECOGNIZED: &str = "Access denied.\nFingerprint not recognized.";
pub const MSG_OUT_OF_EMERGENCY_USES: &str = "Access denied.\nYou are out of Emergency Uses!";
pub const MSG_NOT_AUTHORIZED: &str = "Access denied.\nYou are not authorized.";
pub const MSG_ADMIN_ONLY: &str = "Access denied.\nAdministrator access only.";
pub const MSG_ADMIN_REMOVAL: &str =
    "Sorry, you cannot remove Administrator fingerprints.\nRevoke administrator rights first.";
pub const MSG_ALREADY_REGISTERED: &str = "This fingerprint is already registered.";
pub const MSG_REGISTRATION_FAILED: &str = "Could not register the fingerprint.";
pub const MSG_LOCK_FAULT: &str = "Lock hardware fault.\nThe door could not be opened.";

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-5, 1)]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(3, 3)]
    #[case(9, 9)]
    #[case(10, 9)]
    #[case(i64::MAX, 9)]
    fn test_clamp_open_seconds(#[case] input: i64, #[case] expected: i64) {
        assert_eq!(clamp_open_seconds(input), expected);
    }

    #[test]
    fn test_default_open_within_clamp() {
        assert_eq!(clamp_open_seconds(DEFAULT_OPEN_SECONDS), DEFAULT_OPEN_SECONDS);
    }
}
