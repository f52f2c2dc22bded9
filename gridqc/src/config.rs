use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::check::{CheckId, CheckParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),
    #[error("YAML configuration is invalid")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON configuration is invalid")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported file extension for file: {0}")]
    UnsupportedExtension(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> ConfigResult<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedExtension(file_name.to_string())),
        }
    }
}

/// One check to execute: which check, and its parameter overrides. Names
/// absent from `params` fall back to the check's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub id: CheckId,
    #[serde(default)]
    pub params: CheckParams,
}

impl CheckSpec {
    pub fn new(id: CheckId) -> Self {
        Self {
            id,
            params: CheckParams::default(),
        }
    }

    pub fn with_params(id: CheckId, params: CheckParams) -> Self {
        Self { id, params }
    }
}

/// A QC run configuration: the list of checks to evaluate over the surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcConfig {
    pub checks: Vec<CheckSpec>,
}

impl QcConfig {
    pub fn from_file(file_path: &str) -> ConfigResult<Self> {
        let format = FileFormat::from_file_name(file_path)?;
        let serialized = std::fs::read_to_string(file_path)?;
        Self::from_str(&serialized, format)
    }

    pub fn from_str(serialized: &str, format: FileFormat) -> ConfigResult<Self> {
        match format {
            FileFormat::Yaml => Ok(serde_yml::from_str(serialized)?),
            FileFormat::Json => Ok(serde_json::from_str(serialized)?),
        }
    }

    pub fn to_string(&self, format: FileFormat) -> ConfigResult<String> {
        match format {
            FileFormat::Yaml => Ok(serde_yml::to_string(self)?),
            FileFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckParam, ParamValue};
    use crate::density::DensityCheck;
    use crate::tvu::TvuCheck;

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_file_name("qc.yaml").unwrap(), FileFormat::Yaml);
        assert_eq!(FileFormat::from_file_name("qc.YML").unwrap(), FileFormat::Yaml);
        assert_eq!(FileFormat::from_file_name("qc.json").unwrap(), FileFormat::Json);
        assert!(matches!(
            FileFormat::from_file_name("qc.toml"),
            Err(ConfigError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn yaml_config_round_trips() {
        let config = QcConfig {
            checks: vec![
                CheckSpec::with_params(
                    DensityCheck::DESCRIPTOR.check_id(),
                    CheckParams::new(vec![CheckParam::new(DensityCheck::PARAM_MIN_SPN, 7i64)]),
                ),
                CheckSpec::new(TvuCheck::DESCRIPTOR.check_id()),
            ],
        };

        let yaml = config.to_string(FileFormat::Yaml).unwrap();
        let parsed = QcConfig::from_str(&yaml, FileFormat::Yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn json_config_parses_typed_params() {
        let json = format!(
            r#"{{
                "checks": [
                    {{
                        "id": "{}",
                        "params": [
                            {{"name": "Constant Depth Error", "value": 0.1}},
                            {{"name": "Acceptable Area Percentage", "value": 95}}
                        ]
                    }}
                ]
            }}"#,
            TvuCheck::DESCRIPTOR.id
        );

        let config = QcConfig::from_str(&json, FileFormat::Json).unwrap();
        let params = &config.checks[0].params;
        assert_eq!(
            params.get("Constant Depth Error").unwrap(),
            &ParamValue::Float(0.1)
        );
        assert_eq!(
            params.get("Acceptable Area Percentage").unwrap(),
            &ParamValue::Int(95)
        );
    }

    #[test]
    fn missing_params_field_defaults_to_empty() {
        let json = format!(
            r#"{{"checks": [{{"id": "{}"}}]}}"#,
            DensityCheck::DESCRIPTOR.id
        );
        let config = QcConfig::from_str(&json, FileFormat::Json).unwrap();
        assert!(config.checks[0].params.is_empty());
    }
}
