mod commands;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fwstack")]
#[command(about = "Egress を検査する。Network Firewall を KDL で宣言する。", long_about = None)]
struct Cli {
    /// スタック定義ファイル（省略時は自動検出）
    #[arg(short, long, global = true, env = "FWSTACK_FILE")]
    file: Option<PathBuf>,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// CloudFormation テンプレートを生成
    Synth {
        /// 出力ディレクトリ
        #[arg(short, long, default_value = "fwstack.out")]
        out: PathBuf,
        /// 出力形式（--stdout 時）
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// ファイルに書き込まず標準出力へ表示
        #[arg(long)]
        stdout: bool,
    },
    /// 設定を検証
    Validate,
    /// 宣言されるリソースの一覧を表示
    List {
        /// リソースタイプで絞り込み (例: AWS::EC2::Route)
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,
    },
    /// バージョン情報を表示
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrに出力（stdoutはテンプレート出力に使う）
    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("fwstack {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let file = utils::resolve_stack_file(cli.file)?;

    match cli.command {
        Commands::Synth {
            out,
            format,
            stdout,
        } => {
            commands::synth::handle(&file, &out, format, stdout).await?;
        }
        Commands::Validate => {
            commands::validate::handle(&file)?;
        }
        Commands::List { resource_type } => {
            commands::list::handle(&file, resource_type.as_deref())?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
