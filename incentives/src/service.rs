use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Result, TokenLedger, Transaction, calculate_reward, reward::DEFAULT_SCALING_FACTOR};

const REWARD_DESCRIPTION: &str = "Reward for performance improvement";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRequest {
    pub user_id: u64,
    pub previous_metric: f64,
    pub current_metric: f64,
    #[serde(default)]
    pub scaling_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardResponse {
    pub user_id: u64,
    pub reward: f64,
    pub new_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub user_id: u64,
    pub balance: f64,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender_id: u64,
    pub receiver_id: u64,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
}

/// Rounds to two decimal places, for display.
fn round2(value: f64) -> f64 {
    (value * 100.).round() / 100.
}

/// The query surface over a shared `TokenLedger`, meant to sit behind whatever transport the
/// caller exposes.
#[derive(Debug, Clone)]
pub struct IncentiveService {
    ledger: Arc<TokenLedger>,
    default_scaling_factor: f64,
}

impl IncentiveService {
    /// Creates a new `IncentiveService`.
    ///
    /// # Arguments
    /// * `ledger` - The ledger to read from and write to.
    /// * `default_scaling_factor` - Used by requests that don't carry their own.
    pub fn new(ledger: Arc<TokenLedger>, default_scaling_factor: f64) -> Self {
        Self {
            ledger,
            default_scaling_factor,
        }
    }

    pub fn ledger(&self) -> &Arc<TokenLedger> {
        &self.ledger
    }

    /// Computes the reward for an improvement and credits it to the user.
    ///
    /// # Returns
    /// The reward together with the user's new balance rounded to two decimals.
    pub fn submit_reward(&self, request: &RewardRequest) -> RewardResponse {
        let scaling_factor = request
            .scaling_factor
            .unwrap_or(self.default_scaling_factor);

        let reward = calculate_reward(
            request.previous_metric,
            request.current_metric,
            scaling_factor,
        );
        let balance = self.ledger.credit(request.user_id, reward, REWARD_DESCRIPTION);

        RewardResponse {
            user_id: request.user_id,
            reward,
            new_balance: round2(balance),
        }
    }

    /// Returns the user's balance, rounded to two decimals, and every transaction of theirs.
    pub fn ledger_of(&self, user_id: u64) -> LedgerResponse {
        LedgerResponse {
            user_id,
            balance: round2(self.ledger.get_balance(user_id)),
            transactions: self.ledger.transactions(user_id),
        }
    }

    /// Performs a transfer.
    ///
    /// # Returns
    /// The sender's ledger after the transfer, or an `InvalidAmount` or `InsufficientFunds`
    /// error.
    pub fn transfer(&self, request: &TransferRequest) -> Result<LedgerResponse> {
        self.ledger.transfer_tokens(
            request.sender_id,
            request.receiver_id,
            request.amount,
            &request.description,
        )?;

        Ok(self.ledger_of(request.sender_id))
    }
}

impl Default for IncentiveService {
    fn default() -> Self {
        Self::new(Arc::new(TokenLedger::new()), DEFAULT_SCALING_FACTOR)
    }
}
