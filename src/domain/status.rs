use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent fetch attempt for one city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub ok: bool,
    pub message: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusRecord {
    pub fn new(ok: bool, message: impl Into<String>) -> Self {
        Self {
            ok,
            message: message.into(),
            updated_at: Some(Utc::now()),
        }
    }

    pub fn not_yet_updated() -> Self {
        Self {
            ok: false,
            message: "not yet updated".to_string(),
            updated_at: None,
        }
    }

    /// Digits of `updated_at`, used to bust browser caches of chart images
    pub fn version_tag(&self) -> String {
        self.updated_at
            .map(|t| t.format("%Y%m%d%H%M%S").to_string())
            .unwrap_or_else(|| "0".to_string())
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self::not_yet_updated()
    }
}
