use crate::config::DeviceCredentialConfig;
use crate::error::app_error::AppError;
use crate::models::device::DeviceId;
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Real Argon2 hash used as a timing decoy, so that logins for unknown
/// devices cost the same as logins for known ones.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| hash_password("dummy-never-matches").unwrap_or_default());

/// Static allow-list of devices and their argon2 password hashes.
#[derive(Debug, Default)]
pub struct CredentialStore {
    devices: BTreeMap<DeviceId, String>,
}

impl CredentialStore {
    /// Builds the store from configuration, hashing plaintext passwords.
    /// This is slow by design of argon2; call it off the async executor.
    pub fn from_config(entries: &[DeviceCredentialConfig]) -> Result<Self, AppError> {
        let mut devices = BTreeMap::new();

        for entry in entries {
            let id = entry.id.trim();
            if id.is_empty() {
                return Err(AppError::CredentialConfig("device id must not be empty".to_string()));
            }

            let hash = match (&entry.password_hash, &entry.password) {
                (Some(hash), None) => {
                    PasswordHash::new(hash).map_err(|e| AppError::password_hash(format!("Invalid password hash for {id}"), e))?;
                    hash.clone()
                }
                (None, Some(password)) => hash_password(password)?,
                _ => {
                    return Err(AppError::CredentialConfig(format!("device {id} needs exactly one of password or password_hash")));
                }
            };

            if devices.insert(DeviceId::new(id), hash).is_some() {
                return Err(AppError::CredentialConfig(format!("device {id} is listed twice")));
            }
        }

        Ok(Self { devices })
    }

    /// Returns the identity if `device_id` is on the allow-list.
    pub fn resolve(&self, device_id: &str) -> Option<DeviceId> {
        self.devices.get_key_value(device_id).map(|(id, _)| id.clone())
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.keys().cloned().collect()
    }

    /// Checks a login attempt. Argon2 verification compares in constant time.
    pub fn verify(&self, device_id: &str, password: &str) -> Result<DeviceId, AppError> {
        let Some((id, stored)) = self.devices.get_key_value(device_id) else {
            dummy_verify(password);
            return Err(AppError::UnknownDevice(device_id.to_string()));
        };

        let parsed = PasswordHash::new(stored).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AppError::BadPassword)?;

        Ok(id.clone())
    }
}

fn dummy_verify(password: &str) {
    if let Ok(hash) = PasswordHash::new(&DUMMY_HASH) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_string = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), Salt::from(&salt_string))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, password: &str) -> DeviceCredentialConfig {
        DeviceCredentialConfig {
            id: id.to_string(),
            password_hash: None,
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn verify_accepts_correct_password() {
        let store = CredentialStore::from_config(&[entry("raspi-001", "Bag@123")]).unwrap();
        let id = store.verify("raspi-001", "Bag@123").unwrap();
        assert_eq!(id.as_str(), "raspi-001");
    }

    #[test]
    fn verify_distinguishes_unknown_device_and_bad_password() {
        let store = CredentialStore::from_config(&[entry("raspi-001", "Bag@123")]).unwrap();
        assert!(matches!(store.verify("raspi-999", "Bag@123"), Err(AppError::UnknownDevice(id)) if id == "raspi-999"));
        assert!(matches!(store.verify("raspi-001", "wrong"), Err(AppError::BadPassword)));
    }

    #[test]
    fn accepts_precomputed_hash() {
        let hash = hash_password("s3cret").unwrap();
        let store = CredentialStore::from_config(&[DeviceCredentialConfig {
            id: "raspi-002".to_string(),
            password_hash: Some(hash),
            password: None,
        }])
        .unwrap();
        assert!(store.verify("raspi-002", "s3cret").is_ok());
        assert!(store.resolve("raspi-002").is_some());
        assert!(store.resolve("raspi-001").is_none());
    }

    #[test]
    fn rejects_ambiguous_or_duplicate_entries() {
        let both = DeviceCredentialConfig {
            id: "raspi-001".to_string(),
            password_hash: Some("x".to_string()),
            password: Some("y".to_string()),
        };
        assert!(matches!(CredentialStore::from_config(&[both]), Err(AppError::CredentialConfig(_))));

        let duplicate = [entry("raspi-001", "a"), entry("raspi-001", "b")];
        assert!(matches!(CredentialStore::from_config(&duplicate), Err(AppError::CredentialConfig(_))));
    }
}
