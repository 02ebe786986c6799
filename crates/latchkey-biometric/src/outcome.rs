use latchkey_core::CredentialId;

/// Result of a scan. `Denied` covers both an unrecognized finger and a
/// sensor failure during the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Authorized(CredentialId),
    Denied,
    Cancelled,
}

/// A template captured and stored during enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: CredentialId,
    pub template: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(Enrollment),
    AlreadyRegistered(CredentialId),
    Failed,
    Cancelled,
}
