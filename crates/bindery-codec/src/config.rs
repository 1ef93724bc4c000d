// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Codec configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bindery_model::wire::DEFAULT_MAX_LEN;

/// Tunables shared by the codec context and the query layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Stop query iteration at the first malformed candidate and report it.
    pub query_fail_fast: bool,
    /// Upper bound for strings and byte blobs read by the predicate decoder.
    pub max_wire_string_len: usize,
    /// Nesting bound for composite predicates on the wire.
    pub max_predicate_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            query_fail_fast: false,
            max_wire_string_len: DEFAULT_MAX_LEN,
            max_predicate_depth: 64,
        }
    }
}

impl CodecConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Error raised while reading or writing a [`CodecConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document was malformed or held a field of the wrong type.
    #[error("[CONFIG_SERDE] {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = CodecConfig::from_json_slice(br#"{"query_fail_fast": true}"#).unwrap();
        assert!(config.query_fail_fast);
        assert_eq!(config.max_predicate_depth, 64);
        assert_eq!(config.max_wire_string_len, 1 << 20);
    }

    #[test]
    fn json_round_trip() {
        let config = CodecConfig {
            query_fail_fast: true,
            max_wire_string_len: 128,
            max_predicate_depth: 4,
        };
        let bytes = config.to_json_vec().unwrap();
        assert_eq!(CodecConfig::from_json_slice(&bytes).unwrap(), config);
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let err = CodecConfig::from_json_slice(b"{").unwrap_err();
        assert!(matches!(err, ConfigError::Serde(_)));
        let err = CodecConfig::from_json_slice(br#"{"max_predicate_depth": "deep"}"#).unwrap_err();
        assert!(err.to_string().starts_with("[CONFIG_SERDE]"));
    }
}
