// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Utility functions for node configuration.

/// Helper functions for parsing node configuration from JSON values.
pub mod config_helpers {
    use crate::error::FrameKitError;
    use serde::Deserialize;

    /// Parses configuration with detailed error messages.
    ///
    /// # Errors
    ///
    /// Returns `FrameKitError::Configuration` if `params` is `None` or if deserialization fails.
    pub fn parse_config_with_context<T>(
        params: Option<&serde_json::Value>,
        context: &str,
    ) -> Result<T, FrameKitError>
    where
        T: for<'de> Deserialize<'de>,
    {
        params.map_or_else(
            || Err(FrameKitError::Configuration(format!("{context} configuration required"))),
            |p| {
                serde_json::from_value(p.clone()).map_err(|e| {
                    FrameKitError::Configuration(format!("Failed to parse {context}: {e}"))
                })
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::config_helpers::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default)]
        depth: usize,
    }

    #[test]
    fn test_malformed_config_is_configuration_error() {
        let ok: Sample =
            parse_config_with_context(Some(&serde_json::json!({ "depth": 3 })), "delay").unwrap();
        assert_eq!(ok.depth, 3);

        let value = serde_json::json!({ "depth": "three" });
        let err = parse_config_with_context::<Sample>(Some(&value), "delay").unwrap_err();
        assert!(err.to_string().contains("Failed to parse delay"));
        assert!(parse_config_with_context::<Sample>(None, "delay").is_err());
    }
}
