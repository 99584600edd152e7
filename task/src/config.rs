// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Construction-time configuration of a task runner.

use serde::{Deserialize, Serialize};

/// Task runner configuration.
///
/// Every field has a default, so a partial document (for example
/// `{"name": "decoder"}`) deserializes into a usable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Name used in logs and in `Error::Rejected`.
    pub name: String,
    /// Upper bound on live requests (queued, in flight or idle in the pool).
    /// Start and quit messages never count against it. `None` means
    /// unbounded.
    pub max_request: Option<usize>,
    /// Number of empty requests allocated up front.
    pub init_num: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: "task".to_owned(),
            max_request: None,
            init_num: 0,
        }
    }
}

impl TaskConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_max_request(mut self, max_request: usize) -> Self {
        self.max_request = Some(max_request);
        self
    }

    pub fn with_init_num(mut self, init_num: usize) -> Self {
        self.init_num = init_num;
        self
    }

    /// Pre-fill count, never above `max_request`.
    pub(crate) fn effective_init_num(&self) -> usize {
        match self.max_request {
            Some(max) => self.init_num.min(max),
            None => self.init_num,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TaskConfig::default();
        assert_eq!(config.name, "task");
        assert_eq!(config.max_request, None);
        assert_eq!(config.init_num, 0);
    }

    #[test]
    fn test_init_num_is_clamped() {
        let config = TaskConfig::new("clamp").with_init_num(10).with_max_request(4);
        assert_eq!(config.effective_init_num(), 4);

        let config = TaskConfig::new("free").with_init_num(10);
        assert_eq!(config.effective_init_num(), 10);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: TaskConfig =
            serde_json::from_str(r#"{"name": "decoder", "max_request": 8}"#)
                .unwrap();
        assert_eq!(config.name, "decoder");
        assert_eq!(config.max_request, Some(8));
        assert_eq!(config.init_num, 0);
    }
}
