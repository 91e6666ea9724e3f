use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::ingest::layout::Layouts;
use crate::ingest::resolver::MultiStagePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub layouts: Layouts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where supplier spreadsheets are dropped and how their file names are told apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub directory: PathBuf,
    /// Accepted extensions, without the dot. Matched case-sensitively.
    pub extensions: Vec<String>,
    pub assembly_prefix: String,
    pub final_test_a_code: String,
    pub final_test_b_code: String,
    pub final_test_a_markers: FinalTestMarkers,
}

/// File-name markers that pick the stage of a FinalTestSubcontractor-A export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalTestMarkers {
    pub incoming: String,
    pub wip: String,
    pub finished: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub multi_stage_policy: MultiStagePolicy,
    /// Emit one all-null row per stage for suppliers that produced no rows.
    pub emit_placeholders: bool,
    /// Copy `device_name` into `wafer_model` (and back) when a source only has one.
    pub backfill_device_aliases: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = Config::try_from(&AppConfig::default())?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("CHIPLINE").separator("__"));

        config.build()?.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            source: SourceConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
                file_path: None,
            },
            layouts: Layouts::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("production_board_data"),
            extensions: vec!["xlsx".to_string(), "xls".to_string()],
            assembly_prefix: "ITS".to_string(),
            final_test_a_code: "CNEIC".to_string(),
            final_test_b_code: "HTKS".to_string(),
            final_test_a_markers: FinalTestMarkers::default(),
        }
    }
}

impl Default for FinalTestMarkers {
    fn default() -> Self {
        Self {
            incoming: "WMS".to_string(),
            wip: "WIP".to_string(),
            finished: "成品库存".to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            multi_stage_policy: MultiStagePolicy::FirstMatch,
            emit_placeholders: true,
            backfill_device_aliases: true,
        }
    }
}
