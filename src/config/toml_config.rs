use crate::adapters::sheets::SHEETS_API_BASE;
use crate::config::{DEFAULT_CREDENTIALS_PATH, DEFAULT_TABLE, DEFAULT_WORKSHEET};
use crate::core::ConfigProvider;
use crate::domain::model::SpotChecks;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub load: LoadConfig,
    pub validation: Option<ValidationConfig>,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    pub sheet_key: String,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_table")]
    pub table_name: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            table_name: default_table(),
        }
    }
}

/// `[validation]` 區段；沒有列出 checks 時使用內建抽查
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub checks: Option<SpotChecks>,
}

fn default_credentials_path() -> String {
    DEFAULT_CREDENTIALS_PATH.to_string()
}

fn default_worksheet() -> String {
    DEFAULT_WORKSHEET.to_string()
}

fn default_api_base() -> String {
    SHEETS_API_BASE.to_string()
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SHEET_KEY})，未設定的保留原文
    fn substitute_env_vars(content: &str) -> String {
        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.enabled)
    }
}

impl ConfigProvider for TomlConfig {
    fn credentials_path(&self) -> &str {
        &self.source.credentials_path
    }

    fn sheet_key(&self) -> &str {
        &self.source.sheet_key
    }

    fn worksheet_name(&self) -> &str {
        &self.source.worksheet
    }

    fn table_name(&self) -> &str {
        &self.load.table_name
    }

    fn output_dir(&self) -> &str {
        &self.load.output_dir
    }

    fn api_base(&self) -> &str {
        &self.source.api_base
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn spot_checks(&self) -> Option<SpotChecks> {
        let validation = self.validation.as_ref().filter(|v| v.enabled)?;
        Some(validation.checks.clone().unwrap_or_default())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_path("source.credentials_path", &self.source.credentials_path)?;
        validate_non_empty_string("source.sheet_key", &self.source.sheet_key)?;
        if self.source.sheet_key.contains("${") {
            return Err(EtlError::InvalidConfigValueError {
                field: "source.sheet_key".to_string(),
                value: self.source.sheet_key.clone(),
                reason: "environment variable is not set".to_string(),
            });
        }
        validate_non_empty_string("source.worksheet", &self.source.worksheet)?;
        validate_url("source.api_base", &self.source.api_base)?;
        validate_path("load.output_dir", &self.load.output_dir)?;
        validate_non_empty_string("load.table_name", &self.load.table_name)?;
        Ok(())
    }
}
