// ==========================================
// 账单导入管道 - 命令行入口
// ==========================================
// 用法:
//   marketplace-ledger-import import --type storage_cost --marketplace mp-1 costs.xlsx
//   marketplace-ledger-import runs --limit 20
// ==========================================

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use marketplace_ledger_import::api::{ImportApi, ImportRequest};
use marketplace_ledger_import::db::default_db_path;
use marketplace_ledger_import::domain::ImportType;
use marketplace_ledger_import::importer::TracingProgress;
use marketplace_ledger_import::logging;
use std::path::PathBuf;
use tracing::info;

/// 营销平台账单导入
#[derive(Parser, Debug)]
#[command(name = "marketplace-ledger-import")]
#[command(about = "导入营销平台应计账单 / 仓储费用报表")]
#[command(version)]
struct Args {
    /// SQLite 数据库路径
    #[arg(long, env = "MARKETPLACE_LEDGER_DB_PATH")]
    db: Option<PathBuf>,

    /// 以 JSON 行格式输出日志
    #[arg(long)]
    json_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 导入一个报表文件（.xlsx / .xls / .csv）
    Import {
        /// 导入类型: accrual_ledger | storage_cost
        #[arg(long = "type")]
        import_type: ImportType,

        /// 营销平台 ID
        #[arg(long)]
        marketplace: String,

        /// 账期开始（YYYY-MM-DD），记录日期无法解析时使用
        #[arg(long)]
        period_start: Option<NaiveDate>,

        /// 账期结束（YYYY-MM-DD）
        #[arg(long)]
        period_end: Option<NaiveDate>,

        /// 表头必须与模板完全一致
        #[arg(long)]
        strict: bool,

        /// 报表文件
        file: PathBuf,
    },

    /// 最近的导入运行
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.json_log {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = args.db.unwrap_or_else(default_db_path);
    info!(db = %db_path.display(), version = marketplace_ledger_import::VERSION, "使用数据库");

    let api = ImportApi::open(&db_path.to_string_lossy())
        .with_context(|| format!("无法打开数据库 {}", db_path.display()))?;

    match args.command {
        Command::Import {
            import_type,
            marketplace,
            period_start,
            period_end,
            strict,
            file,
        } => {
            let request = ImportRequest {
                import_type,
                marketplace_id: marketplace,
                period_start,
                period_end,
                strict_headers: strict,
            };
            let response = api
                .import_file(&file, request, &TracingProgress)
                .await
                .with_context(|| format!("导入失败: {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Runs { limit } => {
            let runs = api.recent_runs(limit).await?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
    }

    Ok(())
}
