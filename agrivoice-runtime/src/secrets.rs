use agrivoice_core::BearerToken;
use agrivoice_engine::traits::TokenSource;
use anyhow::{Context, bail};

/// Keyring service name. Kept fixed so a rename of the binary does not lose
/// the signed-in session.
const SERVICE: &str = "agrivoice";
const USER_TOKEN_ENTRY: &str = "user_jwt_token";

/// The farm API session token as held in the OS keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStore {
    service: String,
    entry: String,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::user()
    }
}

impl TokenStore {
    /// The store `login` writes to and calls read from.
    pub fn user() -> Self {
        Self {
            service: SERVICE.into(),
            entry: USER_TOKEN_ENTRY.into(),
        }
    }

    fn keyring_entry(&self) -> anyhow::Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.entry).context("create keyring entry")
    }

    /// Stores a token, trimmed. Blank input is refused before the keyring is touched.
    pub fn save(&self, token: &str) -> anyhow::Result<()> {
        let token = token.trim();
        if token.is_empty() {
            bail!("empty token");
        }
        self.keyring_entry()?
            .set_password(token)
            .context("store session token")?;
        log::info!("session token stored in keyring entry {}", self.entry);
        Ok(())
    }

    /// `None` when nobody is signed in or the stored value is blank.
    pub fn load(&self) -> anyhow::Result<Option<BearerToken>> {
        let raw = match self.keyring_entry()?.get_password() {
            Ok(v) => v,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(anyhow::Error::new(e)).context("read session token"),
        };
        Ok(Some(raw.trim())
            .filter(|t| !t.is_empty())
            .map(BearerToken::new))
    }

    /// Signing out twice is not an error.
    pub fn clear(&self) -> anyhow::Result<()> {
        match self.keyring_entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)).context("remove session token"),
        }
    }
}

/// Reads the token from the keyring on every call, so a `logout` in another
/// process takes effect on the next start or upload.
#[derive(Debug, Clone, Default)]
pub struct KeyringTokenSource {
    store: TokenStore,
}

impl KeyringTokenSource {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }
}

impl TokenSource for KeyringTokenSource {
    fn bearer_token(&self) -> anyhow::Result<Option<BearerToken>> {
        self.store.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Real keyring state is left alone in these tests.

    #[test]
    fn user_store_uses_the_stable_entry() {
        let store = TokenStore::user();
        assert_eq!(store.service, "agrivoice");
        assert_eq!(store.entry, "user_jwt_token");
        assert_eq!(KeyringTokenSource::default().store, store);
    }

    #[test]
    fn blank_token_is_refused() {
        let err = TokenStore::user().save(" \n\t").unwrap_err();
        assert_eq!(err.to_string(), "empty token");
    }
}
