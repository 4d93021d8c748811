//! Request DTOs for the proxy API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::normalize_language;

/// Request body for `POST /api/rewrite` and `POST /api/rewrite/batch`
///
/// # Fields
/// - `text`: The text to rewrite
/// - `presetId`: Catalog id of the preset to apply
/// - `language`: Optional output language, `auto` when omitted
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub preset_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl RewriteRequest {
    pub fn new(text: impl Into<String>, preset_id: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            preset_id: Some(preset_id.into()),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Some("Text is required and must be a string.".to_string());
        }
        if self
            .preset_id
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
        {
            return Some("presetId is required and must be a string.".to_string());
        }
        None
    }

    /// Language to key and prompt with: the trimmed value, or `auto`.
    pub fn language(&self) -> &str {
        normalize_language(self.language.as_deref())
    }
}

/// Request body for the `POST /api/extract/*` endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl ExtractRequest {
    pub fn validate(&self) -> Option<String> {
        if self.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Some("Text is required and must be a string.".to_string());
        }
        None
    }

    pub fn language(&self) -> &str {
        normalize_language(self.language.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_request_deserialize() {
        let json = r#"{"text": "hello", "presetId": "magic", "language": "fr"}"#;
        let req: RewriteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.text.as_deref(), Some("hello"));
        assert_eq!(req.preset_id.as_deref(), Some("magic"));
        assert_eq!(req.language(), "fr");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_language_defaults_to_auto() {
        let req: RewriteRequest =
            serde_json::from_str(r#"{"text": "hi", "presetId": "magic"}"#).unwrap();
        assert_eq!(req.language(), "auto");
    }

    #[test]
    fn test_validate_missing_text() {
        let req: RewriteRequest = serde_json::from_str(r#"{"presetId": "magic"}"#).unwrap();
        assert!(req.validate().unwrap().contains("Text is required"));

        let blank = RewriteRequest::new("   ", "magic");
        assert!(blank.validate().is_some());
    }

    #[test]
    fn test_validate_missing_preset() {
        let req: RewriteRequest = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert!(req.validate().unwrap().contains("presetId"));
    }

    #[test]
    fn test_extract_request_validate() {
        let req: ExtractRequest = serde_json::from_str(r#"{"text": ""}"#).unwrap();
        assert!(req.validate().is_some());

        let req: ExtractRequest = serde_json::from_str(r#"{"text": "todo list"}"#).unwrap();
        assert!(req.validate().is_none());
        assert_eq!(req.language(), "auto");
    }
}
