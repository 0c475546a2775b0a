//! Engine configuration.
//!
//! Controls how instance identifiers are formed from the raw values the
//! [`IdGenerator`](crate::IdGenerator) hands out.

use serde::{Deserialize, Serialize};

use crate::{EngineError, EngineResult};

/// Configuration for a [`WorkflowEngine`](crate::WorkflowEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Category key passed to the id generator for instance ids.
    pub instance_id_category: String,

    /// Fixed width instance ids are left-padded to.
    pub instance_id_width: usize,

    /// Padding character.
    pub instance_id_pad: char,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instance_id_category: "WFI".to_string(),
            instance_id_width: 12,
            instance_id_pad: '0',
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_instance_id_category(mut self, category: impl Into<String>) -> Self {
        self.instance_id_category = category.into();
        self
    }

    pub fn with_instance_id_width(mut self, width: usize) -> Self {
        self.instance_id_width = width;
        self
    }

    pub fn with_instance_id_pad(mut self, pad: char) -> Self {
        self.instance_id_pad = pad;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.instance_id_category.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "instance_id_category must not be empty".into(),
            ));
        }
        if self.instance_id_width == 0 {
            return Err(EngineError::InvalidConfig(
                "instance_id_width must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Left-pad a generated value to the configured width.
    ///
    /// Values already at or beyond the width are returned unchanged.
    pub fn pad_instance_id(&self, raw: &str) -> String {
        let len = raw.chars().count();
        if len >= self.instance_id_width {
            return raw.to_string();
        }
        let mut id: String = std::iter::repeat(self.instance_id_pad)
            .take(self.instance_id_width - len)
            .collect();
        id.push_str(raw);
        id
    }
}
