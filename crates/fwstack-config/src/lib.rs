pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// スタック定義ファイルを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "FWSTACK_CONFIG_PATH";

/// カレントディレクトリで探すファイル名（優先順）
pub const STACK_FILE_CANDIDATES: [&str; 4] = [
    "fwstack.local.kdl",
    ".fwstack.local.kdl",
    "fwstack.kdl",
    ".fwstack.kdl",
];

/// プロジェクト内の設定ディレクトリ名
pub const PROJECT_DIR: &str = ".fwstack";

/// スタック定義ファイルがどこで見つかったか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackFileSource {
    /// FWSTACK_CONFIG_PATH
    Env,
    /// カレントディレクトリ
    Current,
    /// ./.fwstack/
    ProjectDir,
    /// ~/.config/fwstack/
    Global,
}

/// カレントディレクトリを起点にスタック定義ファイルを探す
pub fn find_stack_file() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()?;
    find_stack_file_from(&current_dir).map(|(path, _)| path)
}

/// `dir` を起点にスタック定義ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 FWSTACK_CONFIG_PATH (直接パス指定、存在しなければエラー)
/// 2. `dir`: fwstack.local.kdl, .fwstack.local.kdl, fwstack.kdl, .fwstack.kdl
/// 3. `dir/.fwstack/` ディレクトリ内: 同様の順序
/// 4. ~/.config/fwstack/fwstack.kdl (グローバル設定)
pub fn find_stack_file_from(dir: &Path) -> Result<(PathBuf, StackFileSource)> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(&config_path);
        if !path.is_file() {
            return Err(ConfigError::EnvPathNotFound(config_path));
        }
        tracing::debug!(path = %path.display(), "Using {}", CONFIG_PATH_ENV);
        return Ok((path, StackFileSource::Env));
    }

    // 2. 起点ディレクトリで検索
    if let Some(path) = first_existing(dir) {
        return Ok((path, StackFileSource::Current));
    }

    // 3. ./.fwstack/ ディレクトリで検索
    let project_dir = dir.join(PROJECT_DIR);
    if project_dir.is_dir()
        && let Some(path) = first_existing(&project_dir)
    {
        return Ok((path, StackFileSource::ProjectDir));
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("fwstack").join("fwstack.kdl");
        if global.is_file() {
            return Ok((global, StackFileSource::Global));
        }
    }

    Err(ConfigError::StackFileNotFound)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    STACK_FILE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}
