use serde::{Deserialize, Serialize};

pub type SubdomainId = i64;

pub const DEFAULT_RECORD_TYPE: &str = "CNAME";
pub const DEFAULT_TTL: u32 = 3600;

/// A DNS record owned by the user, as confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subdomain {
    pub id: SubdomainId,
    pub subdomain: String,
    pub target_domain: String,
    pub record_type: String,
    /// Stored as the server reports it; the server does not bound it.
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// User input for a create or update. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainDraft {
    pub subdomain: String,
    pub target_domain: String,
    pub record_type: String,
    pub ttl: u32,
    /// MX preference. Omitted from the request when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
}

impl SubdomainDraft {
    /// A CNAME with the default TTL.
    pub fn new(subdomain: impl Into<String>, target_domain: impl Into<String>) -> Self {
        Self {
            subdomain: subdomain.into(),
            target_domain: target_domain.into(),
            record_type: DEFAULT_RECORD_TYPE.to_string(),
            ttl: DEFAULT_TTL,
            priority: None,
        }
    }

    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = record_type.into();
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_priority(mut self, priority: Option<u16>) -> Self {
        self.priority = priority;
        self
    }
}
