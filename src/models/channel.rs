use serde::{Deserialize, Serialize};

use super::TAX_FREE_TAG;

/// A named scrape target with its own seen-set namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub source_url: String,
    pub seen_set_key: String,
    pub message_tag: Option<String>,
}

impl Channel {
    pub fn regular(source_url: impl Into<String>, seen_set_key: impl Into<String>) -> Self {
        Self {
            name: "regular".to_string(),
            source_url: source_url.into(),
            seen_set_key: seen_set_key.into(),
            message_tag: None,
        }
    }

    pub fn tax_free(source_url: impl Into<String>, seen_set_key: impl Into<String>) -> Self {
        Self {
            name: "tax-free".to_string(),
            source_url: source_url.into(),
            seen_set_key: seen_set_key.into(),
            message_tag: Some(TAX_FREE_TAG.to_string()),
        }
    }
}
