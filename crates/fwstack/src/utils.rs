use colored::Colorize;
use std::path::{Path, PathBuf};

/// 使用するスタック定義ファイルを決定する
///
/// `--file` が指定されていればそれを使い、なければ fwstack-config の検索順で探す。
pub fn resolve_stack_file(file: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match file {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("スタック定義ファイルが見つかりません: {}", path.display());
            }
            Ok(path)
        }
        None => Ok(fwstack_config::find_stack_file()?),
    }
}

/// スタック定義を読み込む
pub fn load_spec(file: &Path) -> anyhow::Result<fwstack_core::StackSpec> {
    tracing::debug!(path = %file.display(), "Loading stack definition");
    Ok(fwstack_core::parse_kdl_file(file)?)
}

/// 読み込んだ設定ファイルを表示
pub fn print_loaded_file(file: &Path) {
    eprintln!("📄 {}", file.display().to_string().cyan());
}
