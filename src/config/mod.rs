pub mod toml_config;

use crate::adapters::sheets::SHEETS_API_BASE;
use crate::core::ConfigProvider;
use crate::domain::model::SpotChecks;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_required_field, validate_url, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
pub const DEFAULT_WORKSHEET: &str = "Data";
pub const DEFAULT_TABLE: &str = "mfgdata";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "sheet-sqlite-etl"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Append one worksheet of a Google Sheet into a local SQLite database")
)]
pub struct CliConfig {
    /// Load settings from a TOML file instead of flags
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub config: Option<String>,

    /// Service account key file
    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_CREDENTIALS_PATH))]
    pub credentials: String,

    /// Key of the spreadsheet (the id in its URL)
    #[cfg_attr(feature = "cli", arg(long))]
    pub sheet_key: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_WORKSHEET))]
    pub worksheet: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_TABLE))]
    pub table: String,

    /// Directory that receives `<spreadsheet title>.db`
    #[cfg_attr(feature = "cli", arg(long, default_value = "."))]
    pub output_dir: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = SHEETS_API_BASE))]
    pub api_base: String,

    /// Run the built-in spot checks before loading
    #[cfg_attr(feature = "cli", arg(long))]
    pub validate: bool,

    #[cfg_attr(feature = "cli", arg(short, long, help = "Enable verbose output"))]
    pub verbose: bool,

    /// Emit logs as JSON
    #[cfg_attr(feature = "cli", arg(long))]
    pub log_json: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            config: None,
            credentials: DEFAULT_CREDENTIALS_PATH.to_string(),
            sheet_key: None,
            worksheet: DEFAULT_WORKSHEET.to_string(),
            table: DEFAULT_TABLE.to_string(),
            output_dir: ".".to_string(),
            api_base: SHEETS_API_BASE.to_string(),
            validate: false,
            verbose: false,
            log_json: false,
        }
    }
}

impl ConfigProvider for CliConfig {
    fn credentials_path(&self) -> &str {
        &self.credentials
    }

    fn sheet_key(&self) -> &str {
        self.sheet_key.as_deref().unwrap_or_default()
    }

    fn worksheet_name(&self) -> &str {
        &self.worksheet
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn api_base(&self) -> &str {
        &self.api_base
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn spot_checks(&self) -> Option<SpotChecks> {
        self.validate.then(SpotChecks::default)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("credentials", &self.credentials)?;
        let key = validate_required_field("sheet_key", &self.sheet_key)?;
        validate_non_empty_string("sheet_key", key)?;
        validate_non_empty_string("worksheet", &self.worksheet)?;
        validate_non_empty_string("table", &self.table)?;
        validate_path("output_dir", &self.output_dir)?;
        validate_url("api_base", &self.api_base)?;
        Ok(())
    }
}
