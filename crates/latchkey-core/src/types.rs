use crate::{Result, constants::MAX_CREDENTIAL_ID, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor slot holding one enrolled fingerprint template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialId(u16);

impl CredentialId {
    /// Wrap a slot number. Range checks happen at the parsing boundary.
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CredentialId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u16 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidCredentialId(s.to_string()))?;
        if id > MAX_CREDENTIAL_ID {
            return Err(Error::InvalidCredentialId(s.to_string()));
        }
        Ok(Self(id))
    }
}

/// An enrolled credential as the controller sees it.
///
/// The template blob itself is kept by storage and the sensor; this record
/// carries only the attributes that drive authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub admin: bool,
    pub emergency_uses: u32,
    pub nickname: String,
}

impl Credential {
    /// A freshly enrolled, non-admin credential with the default emergency allowance.
    pub fn enrolled(id: CredentialId) -> Self {
        Self {
            id,
            admin: false,
            emergency_uses: crate::constants::DEFAULT_EMERGENCY_USES,
            nickname: String::new(),
        }
    }

    /// Text shown in the administrator's credential listing.
    ///
    /// # Examples
    ///
    /// ```
    /// use latchkey_core::{Credential, CredentialId};
    ///
    /// let mut credential = Credential::enrolled(CredentialId::new(3));
    /// assert_eq!(credential.listing_label(), "FP #3 (EU: 1)");
    ///
    /// credential.admin = true;
    /// credential.nickname = "front desk".into();
    /// assert_eq!(credential.listing_label(), "FP #3 (A) - front desk");
    /// ```
    pub fn listing_label(&self) -> String {
        let mut label = if self.admin {
            format!("FP #{} (A)", self.id)
        } else {
            format!("FP #{} (EU: {})", self.id, self.emergency_uses)
        };
        let nickname = self.nickname.trim();
        if !nickname.is_empty() {
            label.push_str(" - ");
            label.push_str(nickname);
        }
        label
    }
}

/// The five independent countdown slots the controller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountdownKind {
    /// General purpose, used for the "Locked..." holding notice.
    Standard,
    /// The relay-energized window of an open cycle.
    OpenCycle,
    /// Lockout after too many denied scans.
    ManualUnlocks,
    /// Window in which denied scans accumulate.
    FailedUnlocks,
    /// Inactivity timer that restores the idle text.
    Background,
}

impl CountdownKind {
    pub const ALL: [CountdownKind; 5] = [
        CountdownKind::Standard,
        CountdownKind::OpenCycle,
        CountdownKind::ManualUnlocks,
        CountdownKind::FailedUnlocks,
        CountdownKind::Background,
    ];
}

impl fmt::Display for CountdownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CountdownKind::Standard => "Standard",
            CountdownKind::OpenCycle => "OpenCycle",
            CountdownKind::ManualUnlocks => "ManualUnlocks",
            CountdownKind::FailedUnlocks => "FailedUnlocks",
            CountdownKind::Background => "Background",
        };
        write!(f, "{}", name)
    }
}
