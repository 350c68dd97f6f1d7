pub mod config;
pub mod identity;
pub mod render;
pub mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use identity::{KeyParseError, PublicKey};
pub use validation::ValidationError;

pub const MAX_FULL_NAME_CHARS: usize = 100;
pub const MAX_HANDLE_CHARS: usize = 50;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_LINK_NAME_CHARS: usize = 100;
pub const MAX_URL_CHARS: usize = 500;

/// A registered identity page. Exactly one per fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub fingerprint: String,
    pub full_name: String,
    pub handle: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub links: Vec<Link>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub name: String,
    pub url: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInput {
    pub name: String,
    pub url: String,
}

impl LinkInput {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    pub fingerprint: String,
    pub full_name: String,
    pub handle: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub links: Vec<LinkInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: String,
    pub handle: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub links: Vec<LinkInput>,
}

/// Public projection of a profile. Never carries the owner fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub full_name: String,
    pub handle: String,
    pub bio: String,
    pub links: Vec<PublicLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLink {
    pub name: String,
    pub url: String,
    pub position: u32,
}

impl Profile {
    pub fn to_public(&self) -> PublicProfile {
        PublicProfile::from(self)
    }

    pub fn link_inputs(&self) -> Vec<LinkInput> {
        self.links
            .iter()
            .map(|link| LinkInput::new(link.name.clone(), link.url.clone()))
            .collect()
    }
}

impl From<&Profile> for PublicProfile {
    fn from(profile: &Profile) -> Self {
        Self {
            full_name: profile.full_name.clone(),
            handle: profile.handle.clone(),
            bio: profile.bio.clone(),
            links: profile
                .links
                .iter()
                .map(|link| PublicLink {
                    name: link.name.clone(),
                    url: link.url.clone(),
                    position: link.position,
                })
                .collect(),
        }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> Profile {
        let now = Utc::now();
        Profile {
            id: "p-1".to_string(),
            fingerprint: "ssh-ed25519:ab12".to_string(),
            full_name: "Ada Lovelace".to_string(),
            handle: "ada".to_string(),
            bio: "Analyst".to_string(),
            links: vec![
                Link {
                    id: "l-1".to_string(),
                    name: "Notes".to_string(),
                    url: "https://example.com/notes".to_string(),
                    position: 0,
                },
                Link {
                    id: "l-2".to_string(),
                    name: "Engine".to_string(),
                    url: "https://example.com/engine".to_string(),
                    position: 1,
                },
            ],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn public_projection_drops_owner_fields() {
        let public = sample_profile().to_public();
        let json = serde_json::to_value(&public).expect("serialize");
        assert!(json.get("fingerprint").is_none());
        assert!(json.get("id").is_none());
        assert_eq!(json["handle"], "ada");
        assert_eq!(json["links"][1]["position"], 1);
    }

    #[test]
    fn link_inputs_keep_stored_order() {
        let inputs = sample_profile().link_inputs();
        assert_eq!(
            inputs,
            vec![
                LinkInput::new("Notes", "https://example.com/notes"),
                LinkInput::new("Engine", "https://example.com/engine"),
            ]
        );
    }
}
