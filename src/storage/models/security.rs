use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{parse_identity_key, require_fields, CorruptRecord, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Creator,
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Creator => "creator",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "creator" => Ok(Role::Creator),
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// An active ban. No record means not banned; `expires_at: None` means permanent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRecord {
    pub reason: String,
    pub issued_by: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BanRecord {
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|until| now >= until)
    }

    /// `expiresAt` must be present even when null, so a truncated temporary
    /// ban is never read back as a permanent one.
    pub fn from_json(key: &str, value: &Value) -> Result<Self, CorruptRecord> {
        require_fields("bans", key, value, &["reason", "issuedBy", "issuedAt", "expiresAt"])?;
        serde_json::from_value(value.clone())
            .map_err(|e| CorruptRecord::new("bans", key, e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Ban,
    Unban,
}

/// Immutable record of a ban or unban, kept for accountability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub target: Identity,
    pub actor: Identity,
    pub reason: String,
    pub at: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditEntry {
    pub fn from_json(index: usize, value: &Value) -> Result<Self, CorruptRecord> {
        let key = index.to_string();
        require_fields("audit", &key, value, &["action", "target", "actor", "reason", "at"])?;
        serde_json::from_value(value.clone())
            .map_err(|e| CorruptRecord::new("audit", key, e.to_string()))
    }
}

/// The security document: roles, bans, warnings and the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityState {
    pub roles: BTreeMap<Identity, Role>,
    pub bans: BTreeMap<Identity, BanRecord>,
    pub warnings: BTreeMap<Identity, u32>,
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl SecurityState {
    /// Rebuilds the document record by record. Anything malformed is
    /// returned alongside the valid remainder instead of failing the load.
    pub fn from_json(document: &Value) -> (Self, Vec<CorruptRecord>) {
        let mut state = SecurityState::default();
        let mut corrupt = Vec::new();

        if let Some(roles) = section(document, "roles", &mut corrupt) {
            for (key, value) in roles {
                let parsed = parse_identity_key("roles", key).and_then(|id| {
                    value
                        .as_str()
                        .ok_or_else(|| CorruptRecord::new("roles", key, "role is not a string"))
                        .and_then(|s| {
                            s.parse::<Role>()
                                .map_err(|e| CorruptRecord::new("roles", key, e))
                        })
                        .map(|role| (id, role))
                });
                match parsed {
                    Ok((id, role)) => {
                        state.roles.insert(id, role);
                    }
                    Err(e) => corrupt.push(e),
                }
            }
        }

        if let Some(bans) = section(document, "bans", &mut corrupt) {
            for (key, value) in bans {
                match parse_identity_key("bans", key)
                    .and_then(|id| BanRecord::from_json(key, value).map(|record| (id, record)))
                {
                    Ok((id, record)) => {
                        state.bans.insert(id, record);
                    }
                    Err(e) => corrupt.push(e),
                }
            }
        }

        if let Some(warnings) = section(document, "warnings", &mut corrupt) {
            for (key, value) in warnings {
                let parsed = parse_identity_key("warnings", key).and_then(|id| {
                    value
                        .as_u64()
                        .and_then(|count| u32::try_from(count).ok())
                        .ok_or_else(|| {
                            CorruptRecord::new("warnings", key, "count is not a non-negative integer")
                        })
                        .map(|count| (id, count))
                });
                match parsed {
                    Ok((id, count)) => {
                        state.warnings.insert(id, count);
                    }
                    Err(e) => corrupt.push(e),
                }
            }
        }

        match document.get("audit") {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                for (index, value) in entries.iter().enumerate() {
                    match AuditEntry::from_json(index, value) {
                        Ok(entry) => state.audit.push(entry),
                        Err(e) => corrupt.push(e),
                    }
                }
            }
            Some(_) => corrupt.push(CorruptRecord::new("audit", "*", "section is not an array")),
        }

        state.saved_at = document
            .get("savedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        (state, corrupt)
    }
}

/// Looks up an object-valued section. Missing is fine; any other shape is
/// reported as corrupt.
pub(crate) fn section<'a>(
    document: &'a Value,
    name: &'static str,
    corrupt: &mut Vec<CorruptRecord>,
) -> Option<&'a serde_json::Map<String, Value>> {
    match document.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            corrupt.push(CorruptRecord::new(name, "*", "section is not an object"));
            None
        }
    }
}
