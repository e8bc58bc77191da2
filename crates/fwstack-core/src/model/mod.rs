//! モデル定義
//!
//! fwstack で使用されるデータモデルを定義します。
//! 各モデルは機能ごとにモジュールに分離されています。

mod firewall;
mod instance;
mod network;
mod stack;

// Re-exports
pub use firewall::*;
pub use instance::*;
pub use network::*;
pub use stack::*;
