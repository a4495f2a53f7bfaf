//! Directory collaborator: user profiles and friend lists.
//!
//! Static for the lifetime of the process; the relay core only reads it.
//! Loadable from a TOML file, with a built-in seed matching the classic
//! three-user demo setup.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub identity: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Read-only profile and social-graph lookups.
pub struct Directory {
    profiles: HashMap<String, Profile>,
    friends: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    users: Vec<UserEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    identity: String,
    display_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    #[serde(default)]
    friends: Vec<String>,
}

impl Directory {
    /// Load a directory plus its account table from a TOML file.
    pub fn load(path: &str) -> Result<(Self, HashMap<String, String>)> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read directory file {path}"))?;
        Self::from_toml_str(&text).with_context(|| format!("failed to parse directory file {path}"))
    }

    pub fn from_toml_str(text: &str) -> Result<(Self, HashMap<String, String>)> {
        let file: DirectoryFile = toml::from_str(text)?;
        let mut profiles = HashMap::new();
        let mut friends = HashMap::new();
        let mut accounts = HashMap::new();
        for user in file.users {
            if let Some(password) = user.password {
                accounts.insert(user.identity.clone(), password);
            }
            friends.insert(user.identity.clone(), user.friends);
            profiles.insert(
                user.identity.clone(),
                Profile {
                    display_name: user.display_name.unwrap_or_else(|| user.identity.clone()),
                    identity: user.identity,
                    email: user.email,
                },
            );
        }
        Ok((Self { profiles, friends }, accounts))
    }

    /// Built-in seed: user1/user2/user3, password 123456, all friends.
    pub fn seed() -> (Self, HashMap<String, String>) {
        let toml = r#"
            [[users]]
            identity = "user1"
            display_name = "User One"
            password = "123456"
            friends = ["user2", "user3"]

            [[users]]
            identity = "user2"
            display_name = "User Two"
            password = "123456"
            friends = ["user1", "user3"]

            [[users]]
            identity = "user3"
            display_name = "User Three"
            password = "123456"
            friends = ["user1", "user2"]
        "#;
        Self::from_toml_str(toml).expect("built-in seed directory must parse")
    }

    pub fn get_profile(&self, identity: &str) -> Option<&Profile> {
        self.profiles.get(identity)
    }

    /// Friend identities eligible for presence notifications, in directory
    /// order. Unknown identities get an empty list.
    pub fn friends_of(&self, identity: &str) -> &[String] {
        self.friends.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_users_friends_and_accounts() {
        let toml = r#"
            [[users]]
            identity = "alice"
            display_name = "Alice"
            email = "alice@example.com"
            password = "hunter2"
            friends = ["bob"]

            [[users]]
            identity = "bob"
            friends = []
        "#;
        let (dir, accounts) = Directory::from_toml_str(toml).unwrap();

        let alice = dir.get_profile("alice").unwrap();
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(alice.email.as_deref(), Some("alice@example.com"));
        assert_eq!(dir.friends_of("alice"), ["bob".to_string()]);

        // display_name defaults to the identity; no password, no account.
        assert_eq!(dir.get_profile("bob").unwrap().display_name, "bob");
        assert_eq!(accounts.get("alice").map(String::as_str), Some("hunter2"));
        assert!(!accounts.contains_key("bob"));
    }

    #[test]
    fn unknown_identity_has_no_friends() {
        let (dir, _) = Directory::seed();
        assert!(dir.friends_of("stranger").is_empty());
        assert!(dir.get_profile("stranger").is_none());
    }

    #[test]
    fn seed_is_mutual() {
        let (dir, accounts) = Directory::seed();
        assert_eq!(dir.friends_of("user1"), ["user2".to_string(), "user3".to_string()]);
        assert!(dir.friends_of("user2").contains(&"user1".to_string()));
        assert_eq!(accounts.get("user1").map(String::as_str), Some("123456"));
    }
}
