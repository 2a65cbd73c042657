use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::CredentialError;

/// Which authentication flow a credential drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Media access key, used against a device on the local network.
    Mak,
    /// Account username/password, used against the web-facing service.
    Web,
}

impl CredentialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKind::Mak => "MAK_CREDENTIAL",
            CredentialKind::Web => "WEB_CREDENTIAL",
        }
    }

    /// Parses a variant tag. Accepts both the long and the short spelling.
    pub fn parse(tag: &str) -> Result<Self, CredentialError> {
        match tag {
            "MAK_CREDENTIAL" | "mak" => Ok(CredentialKind::Mak),
            "WEB_CREDENTIAL" | "web" => Ok(CredentialKind::Web),
            other => Err(CredentialError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable authentication material for one of the two supported flows.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Mak {
        key: String,
    },
    Web {
        username: String,
        password: String,
        unit_name: String,
    },
}

/// Wire shape of the `credential` object inside `bodyAuthenticate`.
#[derive(Serialize)]
#[serde(tag = "type")]
enum WireCredential<'a> {
    #[serde(rename = "makCredential")]
    Mak { key: &'a str },
    #[serde(rename = "mmaCredential")]
    Mma {
        username: &'a str,
        password: &'a str,
    },
}

impl Credential {
    /// Builds a media access key credential.
    pub fn mak(key: impl Into<String>) -> Result<Self, CredentialError> {
        let key = required(CredentialKind::Mak, "key", key.into())?;
        Ok(Credential::Mak { key })
    }

    /// Builds a web account credential bound to the device named `unit_name`.
    pub fn web(
        username: impl Into<String>,
        password: impl Into<String>,
        unit_name: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        Ok(Credential::Web {
            username: required(CredentialKind::Web, "username", username.into())?,
            password: required(CredentialKind::Web, "password", password.into())?,
            unit_name: required(CredentialKind::Web, "unit_name", unit_name.into())?,
        })
    }

    /// Builds a credential from a variant tag and loosely typed named fields.
    ///
    /// `"mak"` needs `mak`; `"web"` needs `username`, `password` and `unit_name`.
    pub fn from_fields(
        tag: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Self, CredentialError> {
        let kind = CredentialKind::parse(tag)?;
        let field = |name: &'static str| {
            fields
                .get(name)
                .cloned()
                .ok_or(CredentialError::MissingField {
                    kind: kind.as_str(),
                    field: name,
                })
        };

        match kind {
            CredentialKind::Mak => Credential::mak(field("mak")?),
            CredentialKind::Web => {
                Credential::web(field("username")?, field("password")?, field("unit_name")?)
            }
        }
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Mak { .. } => CredentialKind::Mak,
            Credential::Web { .. } => CredentialKind::Web,
        }
    }

    /// Friendly name of the device to select after a web login.
    pub fn unit_name(&self) -> Option<&str> {
        match self {
            Credential::Mak { .. } => None,
            Credential::Web { unit_name, .. } => Some(unit_name),
        }
    }

    /// Renders the `bodyAuthenticate` payload for this credential.
    pub fn payload(&self) -> Map<String, Value> {
        let credential = match self {
            Credential::Mak { key } => WireCredential::Mak { key },
            Credential::Web {
                username, password, ..
            } => WireCredential::Mma { username, password },
        };
        let mut payload = Map::new();
        payload.insert("credential".to_string(), json!(credential));
        payload
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Mak { .. } => f.debug_struct("Mak").field("key", &"<redacted>").finish(),
            Credential::Web {
                username,
                unit_name,
                ..
            } => f
                .debug_struct("Web")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("unit_name", unit_name)
                .finish(),
        }
    }
}

/// Rejects absent and whitespace-only values alike.
fn required(
    kind: CredentialKind,
    field: &'static str,
    value: String,
) -> Result<String, CredentialError> {
    if value.trim().is_empty() {
        return Err(CredentialError::MissingField {
            kind: kind.as_str(),
            field,
        });
    }
    Ok(value)
}
