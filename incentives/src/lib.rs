pub mod error;
pub mod ledger;
pub mod reward;
pub mod service;

pub use error::{LedgerErr, Result};
pub use ledger::{TokenLedger, Transaction};
pub use reward::{DEFAULT_SCALING_FACTOR, calculate_reward};
pub use service::{IncentiveService, LedgerResponse, RewardRequest, RewardResponse, TransferRequest};
