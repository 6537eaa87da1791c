//! Explicit session handle passed to the record client.

use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Credentials and identity for record-store calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub project_id: String,
    pub public_key: String,
    user: Option<CurrentUser>,
}

impl Session {
    pub fn new(project_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            public_key: public_key.into(),
            user: None,
        }
    }

    /// Build from settings. Malformed user JSON is logged and treated as
    /// signed out.
    pub fn from_settings(settings: &Settings) -> Self {
        let session = Self::new(settings.project_id.clone(), settings.public_key.clone());
        match settings.user_json.as_deref() {
            Some(raw) => match serde_json::from_str::<CurrentUser>(raw) {
                Ok(user) => session.with_user(user),
                Err(e) => {
                    log::warn!("Ignoring DROPVAULT_USER: {}", e);
                    session
                }
            },
            None => session,
        }
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_reads_user() {
        let settings = Settings {
            project_id: "p".into(),
            user_json: Some(r#"{"id":"u1","email":"ada@example.com"}"#.into()),
            ..Settings::default()
        };
        let session = Session::from_settings(&settings);
        assert_eq!(session.project_id, "p");
        assert_eq!(session.current_user().unwrap().email, "ada@example.com");
    }

    #[test]
    fn test_malformed_user_is_signed_out() {
        let settings = Settings {
            user_json: Some("{not json".into()),
            ..Settings::default()
        };
        assert!(Session::from_settings(&settings).current_user().is_none());
    }
}
