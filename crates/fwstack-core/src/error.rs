use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("無効なルール (sid {sid}): {message}")]
    InvalidRule { sid: u64, message: String },

    #[error("無効なCIDR: {0}")]
    InvalidCidr(String),

    #[error("サブネットグループが見つかりません: {0}")]
    SubnetGroupNotFound(String),

    #[error("'{0}' が重複して定義されています")]
    Duplicate(String),
}

pub type Result<T> = std::result::Result<T, SpecError>;
