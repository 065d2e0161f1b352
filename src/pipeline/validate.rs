use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A permissive scalar as it appears in source records: string, number,
/// bool, null, or something structurally unexpected. Coercion helpers turn
/// it into the primitive a field wants, degrading to `None` instead of
/// failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
    Other(Value),
}

impl FlexValue {
    /// Trimmed non-empty text, with numbers stringified the way loose
    /// sources tend to mean them.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FlexValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            FlexValue::Number(n) => Some(n.to_string()),
            FlexValue::Bool(b) => Some(b.to_string()),
            FlexValue::Null | FlexValue::Other(_) => None,
        }
    }

    /// Finite numeric value, accepting numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            FlexValue::Number(n) => n.as_f64(),
            FlexValue::Text(s) => s.trim().parse::<f64>().ok(),
            FlexValue::Bool(_) | FlexValue::Null | FlexValue::Other(_) => None,
        };
        value.filter(|v| v.is_finite())
    }
}

/// A field that is sometimes a list and sometimes a single nested record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::Many(items) => items.len(),
            OneOrMany::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A social handle entry as it appears in source records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawHandle {
    pub platform: Option<FlexValue>,
    #[serde(alias = "username", alias = "account")]
    pub handle: Option<FlexValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A completed program task (a social post) as it appears in source records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTask {
    #[serde(alias = "id", alias = "post_id")]
    pub task_id: Option<FlexValue>,
    pub platform: Option<FlexValue>,
    #[serde(alias = "link", alias = "post_url")]
    pub url: Option<FlexValue>,
    pub likes: Option<FlexValue>,
    pub comments: Option<FlexValue>,
    pub shares: Option<FlexValue>,
    #[serde(alias = "impressions")]
    pub reach: Option<FlexValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An advocacy program entry as it appears in source records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProgram {
    #[serde(alias = "id")]
    pub program_id: Option<FlexValue>,
    #[serde(alias = "program_name", alias = "name", alias = "brand_name")]
    pub brand: Option<FlexValue>,
    #[serde(alias = "tasks", alias = "posts", alias = "completed_tasks")]
    pub tasks_completed: Option<OneOrMany<RawTask>>,
    #[serde(alias = "sales_attributed", alias = "total_sales")]
    pub total_sales_attributed: Option<FlexValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The loosely-structured participant record. Every field is optional and
/// permissively typed; unknown fields are preserved in `extra` rather than
/// rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawParticipant {
    #[serde(alias = "id", alias = "userId", alias = "uid")]
    pub user_id: Option<FlexValue>,
    #[serde(alias = "full_name", alias = "user_name", alias = "username")]
    pub name: Option<FlexValue>,
    #[serde(alias = "email_address", alias = "contact_email")]
    pub email: Option<FlexValue>,
    #[serde(alias = "instagram", alias = "ig_handle")]
    pub instagram_handle: Option<FlexValue>,
    #[serde(alias = "tiktok")]
    pub tiktok_handle: Option<FlexValue>,
    #[serde(alias = "twitter")]
    pub twitter_handle: Option<FlexValue>,
    #[serde(alias = "facebook")]
    pub facebook_handle: Option<FlexValue>,
    #[serde(alias = "youtube")]
    pub youtube_handle: Option<FlexValue>,
    #[serde(alias = "linkedin")]
    pub linkedin_handle: Option<FlexValue>,
    #[serde(alias = "handles", alias = "socials")]
    pub social_handles: Option<OneOrMany<RawHandle>>,
    #[serde(alias = "programs", alias = "campaigns")]
    pub advocacy_programs: Option<OneOrMany<RawProgram>>,
    #[serde(alias = "joined_at", alias = "signup_date")]
    pub join_date: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of lenient structural validation for one raw record.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub record: Option<RawParticipant>,
    /// Completeness heuristic: identifier, name, email, and at least one
    /// program entry all present. Does not gate acceptance.
    pub is_clean: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn rejected(message: String) -> Self {
        Self {
            accepted: false,
            record: None,
            is_clean: false,
            errors: vec![message],
        }
    }
}

/// Leniently validates one decoded record. Type-coercible and null fields
/// are fine; a field that is present but structurally wrong (a programs
/// field that is not list/object shaped, for instance) rejects the record.
pub fn validate(raw: &Value) -> ValidationOutcome {
    if !raw.is_object() {
        return ValidationOutcome::rejected("record is not a JSON object".to_string());
    }

    let record: RawParticipant = match serde_json::from_value(raw.clone()) {
        Ok(record) => record,
        Err(e) => return ValidationOutcome::rejected(format!("structural validation failed: {}", e)),
    };

    let has_identity = record
        .user_id
        .as_ref()
        .and_then(FlexValue::as_text)
        .is_some();
    let has_name = record.name.as_ref().and_then(FlexValue::as_text).is_some();
    let has_email = record.email.as_ref().and_then(FlexValue::as_text).is_some();
    let has_programs = record
        .advocacy_programs
        .as_ref()
        .map(|p| !p.is_empty())
        .unwrap_or(false);

    ValidationOutcome {
        accepted: true,
        is_clean: has_identity && has_name && has_email && has_programs,
        record: Some(record),
        errors: Vec::new(),
    }
}
