use clap::Parser;
use sheet_sqlite_etl::config::toml_config::ValidationConfig;
use sheet_sqlite_etl::core::ConfigProvider;
use sheet_sqlite_etl::utils::error::ErrorSeverity;
use sheet_sqlite_etl::utils::{logger, validation::Validate};
use sheet_sqlite_etl::{CliConfig, EtlEngine, EtlError, SheetPipeline, SqliteSink, TomlConfig};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let code = match cli.config.clone() {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match TomlConfig::from_file(&path) {
                Ok(mut config) => {
                    // 命令列旗標覆蓋設定檔
                    config.verbose |= cli.verbose;
                    if cli.validate {
                        let checks = config.validation.take().and_then(|v| v.checks);
                        config.validation = Some(ValidationConfig {
                            enabled: true,
                            checks,
                        });
                    }
                    run(config).await
                }
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    1
                }
            }
        }
        None => run(cli).await,
    };

    ExitCode::from(code)
}

async fn run<C: ConfigProvider + Validate>(config: C) -> u8 {
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        return 1;
    }

    let pipeline = SheetPipeline::new(SqliteSink::new(), config);
    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(summary) => {
            if summary.validation_passed == Some(false) {
                println!("⚠️ Spot checks reported mismatches; rows were loaded anyway");
            }
            println!(
                "✅ Appended {} rows to '{}' in {}",
                summary.rows_written,
                summary.table_name,
                summary.database_path.display()
            );
            println!("sheet-sqlite-etl finished.\n");
            0
        }
        Err(e) => report_failure(&e),
    }
}

fn report_failure(e: &EtlError) -> u8 {
    tracing::error!(
        "❌ Sheet load failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
