use reqwest::Client;
use serde::Deserialize;
use shared::domain::{User, UserId};
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::{Uuid, Variant};

pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Credential handed out by the demo sign-in; the Drive client short-circuits
/// uploads made with it.
pub const DEMO_TOKEN: &str = "demo-token";

const DEFAULT_SUBJECT: &str = "google-user";
const DEFAULT_FULL_NAME: &str = "구글 사용자";
const DEFAULT_AVATAR_URL: &str = "https://picsum.photos/seed/google/80/80";

/// Namespace for mapping non-UUID OAuth subjects onto profile ids.
const SUBJECT_NAMESPACE: Uuid = Uuid::from_u128(0x6f6e_626f_6172_4469_8e67_5375_626a_6563);

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("userinfo request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("userinfo endpoint returned status {status}")]
    Status { status: u16 },
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Clone)]
pub struct IdentityClient {
    http: Client,
    userinfo_url: Url,
}

impl IdentityClient {
    pub fn new(userinfo_url: Url) -> Self {
        Self {
            http: Client::new(),
            userinfo_url,
        }
    }

    /// Resolves an OAuth access token to the local profile shape.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<User, IdentityError> {
        let response = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token.trim())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IdentityError::Status {
                status: response.status().as_u16(),
            });
        }
        let info: UserInfo = response.json().await?;
        debug!(has_subject = info.sub.is_some(), "userinfo resolved");

        let subject = info
            .sub
            .filter(|sub| !sub.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        Ok(User {
            id: normalize_subject(&subject),
            full_name: non_empty(info.name).unwrap_or_else(|| DEFAULT_FULL_NAME.to_string()),
            email: info.email.unwrap_or_default(),
            avatar_url: non_empty(info.picture)
                .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Maps an OAuth subject onto the store's UUID key space.
///
/// Subjects that already are RFC 4122 UUIDs (versions 1 to 5, hyphenated) are
/// kept; anything else is hashed into a stable v5 UUID.
pub fn normalize_subject(subject: &str) -> UserId {
    if let Some(uuid) = rfc4122_uuid(subject) {
        return UserId(uuid);
    }
    UserId(Uuid::new_v5(&SUBJECT_NAMESPACE, subject.as_bytes()))
}

fn rfc4122_uuid(raw: &str) -> Option<Uuid> {
    if raw.len() != 36 {
        return None;
    }
    let uuid = Uuid::try_parse(raw).ok()?;
    let version_ok = matches!(uuid.get_version_num(), 1..=5);
    let variant_ok = uuid.get_variant() == Variant::RFC4122;
    (version_ok && variant_ok).then_some(uuid)
}

/// Identity used when the userinfo lookup fails.
pub fn fallback_admin() -> User {
    User {
        id: UserId(Uuid::nil()),
        full_name: "인사팀 관리자".into(),
        email: "admin@company.com".into(),
        avatar_url: "https://picsum.photos/seed/admin/80/80".into(),
    }
}

pub fn demo_user() -> User {
    User {
        id: UserId(Uuid::nil()),
        full_name: "데모 관리자".into(),
        email: "demo@company.com".into(),
        avatar_url: "https://picsum.photos/seed/manager/80/80".into(),
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
