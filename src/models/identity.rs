//! Identity metadata attached to every generated key.

use serde::{Deserialize, Serialize};

/// Name, comment and email that make up the OpenPGP user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub name: String,
    pub comment: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "gpgenie".to_string(),
            comment: String::new(),
            email: String::new(),
        }
    }
}

impl Identity {
    pub fn new(name: impl Into<String>, comment: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: comment.into(),
            email: email.into(),
        }
    }

    /// Render as an OpenPGP user ID: `Name (Comment) <email>`.
    ///
    /// Empty parts are left out along with their delimiters.
    pub fn user_id(&self) -> String {
        let mut uid = self.name.trim().to_string();
        let comment = self.comment.trim();
        if !comment.is_empty() {
            if !uid.is_empty() {
                uid.push(' ');
            }
            uid.push_str(&format!("({comment})"));
        }
        let email = self.email.trim();
        if !email.is_empty() {
            if !uid.is_empty() {
                uid.push(' ');
            }
            uid.push_str(&format!("<{email}>"));
        }
        uid
    }
}
