//! Filename keyword → category classification.

use crate::models::{CategoryConfig, CategoryRule};

/// Ordered keyword rules; the first keyword contained in the lowercased
/// filename decides the category.
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    rules: Vec<CategoryRule>,
    default: String,
}

impl CategoryClassifier {
    pub fn new(rules: Vec<CategoryRule>, default: impl Into<String>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| !r.keyword.trim().is_empty())
            .map(|r| CategoryRule::new(r.keyword.to_lowercase(), r.category))
            .collect();
        Self {
            rules,
            default: default.into(),
        }
    }

    pub fn from_config(config: &CategoryConfig) -> Self {
        Self::new(config.rules.clone(), config.default.clone())
    }

    pub fn classify(&self, filename: &str) -> &str {
        let name = filename.to_lowercase();
        self.rules
            .iter()
            .find(|rule| name.contains(&rule.keyword))
            .map(|rule| rule.category.as_str())
            .unwrap_or(&self.default)
    }
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::from_config(&CategoryConfig::default())
    }
}
