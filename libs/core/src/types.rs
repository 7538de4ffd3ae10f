use serde::{Deserialize, Serialize};

/// Identifier assigned by the remote system to organizations and environments.
pub type RecordId = i64;

/// Minimal `{id, name}` projection shared by every listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
}

/// Envelope used by the listing endpoints: `{"results": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_id: Option<RecordId>,
}

/// Request body for `POST organizations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrganization {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request body for `POST organizations/{id}/environments`.
///
/// `prior_id` is always serialized, `null` included, so the remote side sees
/// exactly which predecessor the chain was meant to hang from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEnvironment {
    pub name: String,
    pub organization_id: RecordId,
    pub prior_id: Option<RecordId>,
}

impl From<Organization> for Record {
    fn from(org: Organization) -> Self {
        Record {
            id: org.id,
            name: org.name,
        }
    }
}

impl From<Environment> for Record {
    fn from(env: Environment) -> Self {
        Record {
            id: env.id,
            name: env.name,
        }
    }
}
