use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "imagedeck";

/// Remembered login passwords in the OS keychain, keyed by server and login.
///
/// Only used to re-authenticate after a session is lost; the session token
/// itself lives in the session file.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(server: &str, login: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &Self::account(server, login))
            .context("Failed to create keyring entry")
    }

    fn account(server: &str, login: &str) -> String {
        format!("{}@{}", login, server.trim_end_matches('/'))
    }

    /// Store a password for `login` on `server`
    pub fn store(server: &str, login: &str, password: &str) -> Result<()> {
        Self::entry(server, login)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the remembered password for `login` on `server`
    pub fn get_password(server: &str, login: &str) -> Result<String> {
        Self::entry(server, login)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the password for `login` on `server`
    pub fn delete(server: &str, login: &str) -> Result<()> {
        Self::entry(server, login)?
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_key_ignores_trailing_slash() {
        assert_eq!(
            CredentialStore::account("http://drbl.lab:8080/", "admin"),
            CredentialStore::account("http://drbl.lab:8080", "admin")
        );
        assert_eq!(
            CredentialStore::account("http://drbl.lab", "admin"),
            "admin@http://drbl.lab"
        );
    }
}
