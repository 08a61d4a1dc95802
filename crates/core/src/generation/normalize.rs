use std::collections::BTreeMap;

use super::{GenerationError, GenerationRequest};
use crate::report::DEFAULT_CLASSIFICATION;

/// Synonyms collapsed to canonical classification codes.
#[derive(Debug, Clone)]
pub struct ClassificationAliases {
    aliases: BTreeMap<String, String>,
}

impl Default for ClassificationAliases {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert("Аварийный вызов".to_string(), "АВ".to_string());
        Self { aliases }
    }
}

impl ClassificationAliases {
    /// Built-in aliases extended (or overridden) by `extra`.
    pub fn with_overrides(extra: &BTreeMap<String, String>) -> Self {
        let mut aliases = Self::default();
        for (from, to) in extra {
            aliases.aliases.insert(from.trim().to_string(), to.trim().to_string());
        }
        aliases
    }

    /// Canonical form of a classification. Empty input maps to the default.
    pub fn apply(&self, classification: &str) -> String {
        let trimmed = classification.trim();
        if trimmed.is_empty() {
            return DEFAULT_CLASSIFICATION.to_string();
        }
        self.aliases
            .get(trimmed)
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }
}

/// Validate and normalize a request before any backend sees it.
pub fn normalize_request(
    mut request: GenerationRequest,
    aliases: &ClassificationAliases,
) -> Result<GenerationRequest, GenerationError> {
    request.date = request.date.trim().to_string();
    request.address = request.address.trim().to_string();

    if request.date.is_empty() {
        return Err(GenerationError::Validation("date is required".to_string()));
    }
    if request.address.is_empty() {
        return Err(GenerationError::Validation("address is required".to_string()));
    }

    request.classification = aliases.apply(&request.classification);
    Ok(request)
}
