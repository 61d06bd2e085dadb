use serde::{Deserialize, Serialize};

/// Mobile vs. landline classification of a normalized phone number.
/// Unknown is the safe default for anything the locale tables don't cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhoneType {
    Mobile,
    Landline,
    Unknown,
}

impl std::fmt::Display for PhoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhoneType::Mobile => write!(f, "Mobile"),
            PhoneType::Landline => write!(f, "Landline"),
            PhoneType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Lead status as assigned upstream. The client never transitions it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
    New,
    Contacted,
    BadLead,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadStatus::New => write!(f, "New"),
            LeadStatus::Contacted => write!(f, "Contacted"),
            LeadStatus::BadLead => write!(f, "BadLead"),
        }
    }
}

/// A business lead as the scrape boundary returns it: raw phone string,
/// no classification yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLead {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub city: String,
    pub status: LeadStatus,
}

/// A lead after the normalization pipeline: `normalized_phone` and
/// `phone_type` are derived deterministically from `phone` and stay
/// consistent with each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub normalized_phone: String,
    pub phone_type: PhoneType,
    pub website: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub city: String,
    pub status: LeadStatus,
}

/// Prompt/completion prices as the catalog reports them (decimal strings).
/// A model is free-tier iff `prompt == "0"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt: String,
    pub completion: String,
}

/// One entry of the fetched model catalog. Never persisted; only a chosen
/// model id string makes it into [`Settings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub pricing: Pricing,
}

impl Model {
    pub fn is_free(&self) -> bool {
        self.pricing.prompt == "0"
    }
}

/// Placeholder model used until the first settings load completes, so the
/// UI is never blocked waiting on configuration.
pub const DEFAULT_MODEL_ID: &str = "google/gemini-2.0-flash-exp:free";

/// Operator configuration. Saved as a whole; never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: String,
    pub model_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }
}

/// Everything that parameterizes one search. All four fields participate in
/// the query-cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub city: String,
    pub query: String,
    pub api_key: String,
    pub model_id: String,
}

/// Result of normalizing one phone string on demand (the table renders the
/// display form; the other two fields drive classification badges).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedPhone {
    pub normalized: String,
    pub phone_type: PhoneType,
    pub display: String,
}

/// A finished CSV export, handed to the webview for the blob download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPayload {
    pub file_name: String,
    pub mime_type: String,
    pub content: String,
}
