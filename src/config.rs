//! Configuration module
//!
//! バランス制御のチューニング値とデフォルト値、
//! およびティック間で設定を差し替えるためのメールボックスを提供します。

pub mod balance_config;
pub mod params;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

// balance_config.rsから主要な型を再エクスポート
pub use balance_config::{BalanceConfig, ConfigError, ParkingBrakeMode, RemoteType};

/// 設定差し替え用メールボックス
///
/// 低優先度のコンテキストが`signal()`で新しい設定を置き、
/// 制御ループがティックの先頭で`BalanceController::poll_config()`により取り出す。
pub type ConfigSignal = Signal<CriticalSectionRawMutex, BalanceConfig>;
