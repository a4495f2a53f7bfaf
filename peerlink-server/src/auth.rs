//! Credential collaborator: mock account store and session tokens.
//!
//! The relay core only ever calls [`TokenStore::validate`] at session
//! admission. Token internals are deliberately boring — random opaque
//! strings with a UNIX-seconds expiry — because the admission contract is
//! all the core depends on.

use std::collections::HashMap;
use std::time::SystemTime;

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

/// Why a connection was refused before it ever became Active.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("session token missing")]
    MissingToken,
    #[error("session token not recognized")]
    UnknownToken,
    #[error("session token expired")]
    ExpiredToken,
    #[error("invalid credentials")]
    BadCredentials,
}

/// A freshly issued session token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub identity: String,
    /// UNIX epoch seconds.
    pub expires_at: u64,
}

#[derive(Debug)]
struct TokenRecord {
    identity: String,
    #[allow(dead_code)]
    email: Option<String>,
    expires_at: u64,
}

/// Issues and validates session tokens against a mock account table.
pub struct TokenStore {
    ttl_secs: u64,
    /// identity → password.
    accounts: HashMap<String, String>,
    tokens: Mutex<HashMap<String, TokenRecord>>,
}

impl TokenStore {
    pub fn new(ttl_secs: u64, accounts: HashMap<String, String>) -> Self {
        Self {
            ttl_secs,
            accounts,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Check credentials against the account table and issue a token.
    pub fn login(
        &self,
        identity: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<IssuedToken, AdmissionError> {
        match self.accounts.get(identity) {
            Some(stored) if stored == password => Ok(self.issue(identity, email)),
            _ => Err(AdmissionError::BadCredentials),
        }
    }

    /// Issue a token for an identity, expiring `ttl_secs` from now.
    pub fn issue(&self, identity: &str, email: Option<&str>) -> IssuedToken {
        self.issue_at(identity, email, unix_now())
    }

    /// Issue with an explicit issuance time (deterministic expiry tests).
    pub fn issue_at(&self, identity: &str, email: Option<&str>, issued_at: u64) -> IssuedToken {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(40)
            .map(char::from)
            .collect();
        let expires_at = issued_at + self.ttl_secs;
        self.tokens.lock().insert(
            token.clone(),
            TokenRecord {
                identity: identity.to_string(),
                email: email.map(str::to_string),
                expires_at,
            },
        );
        tracing::debug!(%identity, expires_at, "issued session token");
        IssuedToken {
            token,
            identity: identity.to_string(),
            expires_at,
        }
    }

    /// Resolve a token to its identity, rejecting unknown and expired ones.
    pub fn validate(&self, token: &str) -> Result<String, AdmissionError> {
        self.validate_at(token, unix_now())
    }

    /// Validation against an explicit clock (deterministic expiry tests).
    pub fn validate_at(&self, token: &str, now: u64) -> Result<String, AdmissionError> {
        let tokens = self.tokens.lock();
        let record = tokens.get(token).ok_or(AdmissionError::UnknownToken)?;
        if now > record.expires_at {
            return Err(AdmissionError::ExpiredToken);
        }
        Ok(record.identity.clone())
    }
}

/// Current UNIX time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TokenStore {
        let mut accounts = HashMap::new();
        accounts.insert("user1".to_string(), "123456".to_string());
        TokenStore::new(1800, accounts)
    }

    #[test]
    fn login_issues_a_validating_token() {
        let store = store();
        let issued = store.login("user1", "123456", None).unwrap();
        assert_eq!(store.validate(&issued.token).unwrap(), "user1");
    }

    #[test]
    fn wrong_password_and_unknown_user_are_rejected() {
        let store = store();
        assert_eq!(
            store.login("user1", "wrong", None).unwrap_err(),
            AdmissionError::BadCredentials
        );
        assert_eq!(
            store.login("nobody", "123456", None).unwrap_err(),
            AdmissionError::BadCredentials
        );
    }

    #[test]
    fn token_expires_after_ttl() {
        let store = store();
        let t0 = 1_700_000_000;
        let issued = store.issue_at("user1", None, t0);
        assert_eq!(issued.expires_at, t0 + 1800);

        // Still valid at the boundary, expired one second past it.
        assert!(store.validate_at(&issued.token, t0 + 1800).is_ok());
        assert_eq!(
            store.validate_at(&issued.token, t0 + 1801).unwrap_err(),
            AdmissionError::ExpiredToken
        );
    }

    #[test]
    fn unknown_token_is_rejected() {
        let store = store();
        assert_eq!(
            store.validate("no-such-token").unwrap_err(),
            AdmissionError::UnknownToken
        );
    }
}
