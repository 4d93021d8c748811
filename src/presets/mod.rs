//! Presets Module
//!
//! The catalog of named prompt presets. Prompt wording and sampling settings
//! are data in `catalog.json`, compiled in and parsed once at startup.

mod builder;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upstream::SamplingParams;

pub use builder::{build_messages, language_directive};

/// The catalog shipped with the binary.
const BUILTIN_CATALOG: &str = include_str!("catalog.json");

// == Errors ==
/// A catalog that cannot be loaded.
#[derive(Error, Debug)]
pub enum PresetError {
    #[error("preset catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate preset id '{0}'")]
    Duplicate(String),

    #[error("preset '{id}' is invalid: {reason}")]
    Invalid { id: String, reason: String },
}

// == Preset ==
/// One worked input/output pair shown to the model before the user's text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PresetExample {
    pub input: String,
    pub output: String,
}

/// A named prompt template with its sampling settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Preset {
    pub id: String,
    pub label: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Preset-specific instructions appended to the system prompt
    pub behaviour: String,
    #[serde(default)]
    pub examples: Vec<PresetExample>,
}

impl Preset {
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn validate(&self) -> Result<(), PresetError> {
        let invalid = |reason: &str| PresetError::Invalid {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature outside 0..=2"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens must be positive"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    system_prompt: String,
    presets: Vec<Preset>,
}

// == Preset Catalog ==
/// All presets plus the system prompt shared by every one of them.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    system_prompt: String,
    presets: Vec<Preset>,
    index: HashMap<String, usize>,
}

impl PresetCatalog {
    /// Loads the catalog compiled into the binary.
    pub fn builtin() -> Result<Self, PresetError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parses and validates a catalog document.
    pub fn from_json(json: &str) -> Result<Self, PresetError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.system_prompt, file.presets)
    }

    pub fn new(system_prompt: String, presets: Vec<Preset>) -> Result<Self, PresetError> {
        let mut index = HashMap::with_capacity(presets.len());
        for (i, preset) in presets.iter().enumerate() {
            preset.validate()?;
            if index.insert(preset.id.clone(), i).is_some() {
                return Err(PresetError::Duplicate(preset.id.clone()));
            }
        }
        Ok(Self {
            system_prompt,
            presets,
            index,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.index.get(id).map(|&i| &self.presets[i])
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Presets in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
