use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "スタック定義ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: fwstack.local.kdl, .fwstack.local.kdl, fwstack.kdl, .fwstack.kdl\n\
        - ./.fwstack/ ディレクトリ\n\
        - ~/.config/fwstack/fwstack.kdl\n\
        または FWSTACK_CONFIG_PATH 環境変数で直接指定できます"
    )]
    StackFileNotFound,

    #[error("FWSTACK_CONFIG_PATH で指定されたファイルが存在しません: {0}")]
    EnvPathNotFound(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
