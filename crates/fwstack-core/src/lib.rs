//! fwstack のスタック定義モデルと KDL パーサー

pub mod error;
pub mod model;
pub mod parser;

pub use error::{Result, SpecError};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
