use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{JitError, JitResult};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;
pub const DEFAULT_MAX_HELPER_DEPTH: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub max_call_depth: usize,
    pub max_helper_depth: usize,
    pub verify_modules: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_helper_depth: DEFAULT_MAX_HELPER_DEPTH,
            verify_modules: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(text: &str) -> JitResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| JitError::Config(format!("invalid bridge config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> JitResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            JitError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> JitResult<()> {
        if self.max_call_depth == 0 {
            return Err(JitError::Config(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        if self.max_helper_depth == 0 {
            return Err(JitError::Config(
                "max_helper_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
