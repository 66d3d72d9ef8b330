use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE: &str = "Сайт";

/// Captured contact request. Leads are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub created_at: String,
    pub name: String,
    pub phone: String,
    pub message: String,
    pub source: String,
    #[serde(default)]
    pub from_crm: bool,
}

/// Inbound form or webhook payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadSubmission {
    pub name: String,
    pub phone: String,
    pub message: String,
    pub source: String,
    pub from_crm: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
