//! Player identity supplied by the auth/persistence layer, with a local fallback.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const GUEST_NAME: &str = "Guest";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub session_id: String,
}

// Shape of the `user` record the app keeps in localStorage.
#[derive(Deserialize)]
struct StoredUser {
    name: Option<String>,
    uid: Option<String>,
}

impl SessionIdentity {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Anonymous identity used when no auth data is available.
    pub fn anonymous(seed: u64) -> Self {
        Self {
            display_name: GUEST_NAME.to_string(),
            avatar_url: None,
            session_id: format!("guest-{:016x}", seed),
        }
    }

    /// Build from the stored `{name, uid}` record, filling gaps from the anonymous identity.
    /// Unparseable records fall back entirely.
    pub fn from_stored_user(json: &str, seed: u64) -> Self {
        let fallback = Self::anonymous(seed);
        match serde_json::from_str::<StoredUser>(json) {
            Ok(user) => Self {
                display_name: user.name.filter(|n| !n.is_empty()).unwrap_or(fallback.display_name),
                avatar_url: None,
                session_id: user.uid.filter(|u| !u.is_empty()).unwrap_or(fallback.session_id),
            },
            Err(err) => {
                log::warn!("ignoring unreadable stored user: {err}");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_ids_depend_on_seed() {
        let a = SessionIdentity::anonymous(1);
        let b = SessionIdentity::anonymous(2);
        assert_eq!(a.display_name, GUEST_NAME);
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn stored_user_fills_name_and_uid() {
        let id = SessionIdentity::from_stored_user(r#"{"name":"oyobbeb","uid":"u-1"}"#, 7);
        assert_eq!(id.display_name, "oyobbeb");
        assert_eq!(id.session_id, "u-1");
        assert_eq!(id.avatar_url, None);
    }

    #[test]
    fn broken_stored_user_falls_back() {
        let id = SessionIdentity::from_stored_user("{not json", 7);
        assert_eq!(id, SessionIdentity::anonymous(7));
    }

    #[test]
    fn parses_wire_identity_without_avatar() {
        let id = SessionIdentity::from_json(r#"{"displayName":"HyukE","sessionId":"abc"}"#).unwrap();
        assert_eq!(id.display_name, "HyukE");
        assert_eq!(id.avatar_url, None);
    }
}
