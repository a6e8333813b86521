use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the external auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: Option<String>,
}

impl CurrentUser {
    /// A session needs a non-blank user id; anything else is anonymous.
    pub fn from_parts(id: Option<&str>, email: Option<&str>) -> Option<Self> {
        let id = id.map(str::trim).filter(|id| !id.is_empty())?;
        Some(Self {
            id: id.to_string(),
            email: email
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(str::to_string),
        })
    }
}

const MAX_CLIENT_ID_LEN: usize = 128;

/// Opaque id of one browser profile. Scopes the pending audit and the
/// preview so clients never see each other's staged work.
///
/// Only ASCII letters, digits, `-` and `_` are accepted, which keeps the id
/// safe to embed in a storage key or file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let id = raw.map(str::trim).filter(|id| !id.is_empty())?;
        let valid = id.len() <= MAX_CLIENT_ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
