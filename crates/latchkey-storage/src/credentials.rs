//! Typed credential records on top of the property store.
//!
//! A credential with id `n` occupies three properties:
//!
//! | key | value |
//! |-----|-------|
//! | `Fingerprint{n}` | nickname, empty when unset |
//! | `Admin{n}` | `true` / `false` |
//! | `EmergencyUses{n}` | remaining emergency uses |
//!
//! The `Fingerprint{n}` key is what marks the credential as existing.

use latchkey_core::{Credential, CredentialId};
use tracing::warn;

use crate::settings::SettingsStore;

const FINGERPRINT_PREFIX: &str = "Fingerprint";
const ADMIN_PREFIX: &str = "Admin";
const EMERGENCY_USES_PREFIX: &str = "EmergencyUses";

fn fingerprint_key(id: CredentialId) -> String {
    format!("{FINGERPRINT_PREFIX}{id}")
}

fn admin_key(id: CredentialId) -> String {
    format!("{ADMIN_PREFIX}{id}")
}

fn emergency_uses_key(id: CredentialId) -> String {
    format!("{EMERGENCY_USES_PREFIX}{id}")
}

impl SettingsStore {
    /// Look up one credential.
    pub fn credential(&self, id: CredentialId) -> Option<Credential> {
        let nickname = self.get(&fingerprint_key(id))?;

        let admin = self.get(&admin_key(id)) == Some("true");

        let emergency_uses = match self.get(&emergency_uses_key(id)) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(credential_id = %id, value = raw, "Unreadable emergency use count");
                0
            }),
            None => 0,
        };

        Some(Credential {
            id,
            admin,
            emergency_uses,
            nickname: nickname.to_string(),
        })
    }

    /// All credentials ordered by id.
    pub fn credentials(&self) -> Vec<Credential> {
        self.credential_ids()
            .into_iter()
            .filter_map(|id| self.credential(id))
            .collect()
    }

    pub fn credential_ids(&self) -> Vec<CredentialId> {
        let mut ids: Vec<CredentialId> = self
            .keys()
            .filter_map(|key| key.strip_prefix(FINGERPRINT_PREFIX))
            .filter_map(|suffix| suffix.parse().ok())
            .collect();
        ids.sort();
        ids
    }

    pub fn admin_ids(&self) -> Vec<CredentialId> {
        self.credentials()
            .into_iter()
            .filter(|credential| credential.admin)
            .map(|credential| credential.id)
            .collect()
    }

    /// Write all three properties of a credential. Not flushed.
    pub fn put_credential(&mut self, credential: &Credential) {
        self.set(fingerprint_key(credential.id), credential.nickname.trim());
        self.set(admin_key(credential.id), credential.admin.to_string());
        self.set(
            emergency_uses_key(credential.id),
            credential.emergency_uses.to_string(),
        );
    }

    /// Drop all three properties of a credential. Not flushed.
    pub fn forget_credential(&mut self, id: CredentialId) {
        self.remove(&fingerprint_key(id));
        self.remove(&admin_key(id));
        self.remove(&emergency_uses_key(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use rstest::rstest;

    async fn store() -> SettingsStore {
        SettingsStore::load(Database::in_memory().await.unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_enrolled_credential_properties() {
        let mut settings = store().await;
        settings.put_credential(&Credential::enrolled(CredentialId::new(3)));

        assert_eq!(settings.get("Fingerprint3"), Some(""));
        assert_eq!(settings.get("Admin3"), Some("false"));
        assert_eq!(settings.get("EmergencyUses3"), Some("1"));
    }

    #[tokio::test]
    async fn test_credentials_sorted_numerically() {
        let mut settings = store().await;
        for id in [10, 2, 1] {
            settings.put_credential(&Credential::enrolled(CredentialId::new(id)));
        }

        let ids: Vec<u16> = settings
            .credential_ids()
            .into_iter()
            .map(|id| id.as_u16())
            .collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }

    #[tokio::test]
    async fn test_admin_ids() {
        let mut settings = store().await;
        let mut admin = Credential::enrolled(CredentialId::new(0));
        admin.admin = true;
        settings.put_credential(&admin);
        settings.put_credential(&Credential::enrolled(CredentialId::new(1)));

        assert_eq!(settings.admin_ids(), vec![CredentialId::new(0)]);
    }

    #[tokio::test]
    async fn test_forget_credential() {
        let mut settings = store().await;
        settings.put_credential(&Credential::enrolled(CredentialId::new(5)));
        settings.forget_credential(CredentialId::new(5));

        assert!(settings.credential(CredentialId::new(5)).is_none());
        assert_eq!(settings.get("Admin5"), None);
    }

    #[rstest]
    #[case(0, "Fingerprint0", "Admin0", "EmergencyUses0")]
    #[case(42, "Fingerprint42", "Admin42", "EmergencyUses42")]
    #[case(999, "Fingerprint999", "Admin999", "EmergencyUses999")]
    fn test_property_keys(
        #[case] id: u16,
        #[case] fingerprint: &str,
        #[case] admin: &str,
        #[case] emergency_uses: &str,
    ) {
        let id = CredentialId::new(id);
        assert_eq!(fingerprint_key(id), fingerprint);
        assert_eq!(admin_key(id), admin);
        assert_eq!(emergency_uses_key(id), emergency_uses);
    }

    #[rstest]
    #[case::word("lots", 0)]
    #[case::negative("-1", 0)]
    #[case::empty("", 0)]
    #[case::padded(" 2 ", 2)]
    #[tokio::test]
    async fn test_emergency_uses_parsing(#[case] raw: &str, #[case] expected: u32) {
        let mut settings = store().await;
        settings.put_credential(&Credential::enrolled(CredentialId::new(1)));
        settings.set("EmergencyUses1", raw);

        let credential = settings.credential(CredentialId::new(1)).unwrap();
        assert_eq!(credential.emergency_uses, expected);
    }

    #[tokio::test]
    async fn test_foreign_fingerprint_keys_are_skipped() {
        let mut settings = store().await;
        settings.put_credential(&Credential::enrolled(CredentialId::new(4)));
        settings.set("FingerprintReader", "R307");

        assert_eq!(settings.credential_ids(), vec![CredentialId::new(4)]);
    }

    #[tokio::test]
    async fn test_nickname_is_trimmed() {
        let mut settings = store().await;
        let mut credential = Credential::enrolled(CredentialId::new(2));
        credential.nickname = "  Bruno ".into();
        settings.put_credential(&credential);

        assert_eq!(settings.credential(CredentialId::new(2)).unwrap().nickname, "Bruno");
    }
}
