use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{LedgerErr, Result};

/// A single, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: u64,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub description: String,
}

impl Transaction {
    fn now(user_id: u64, amount: f64, description: String) -> Self {
        Self {
            user_id,
            timestamp: Utc::now(),
            amount,
            description,
        }
    }
}

/// An append-only record of token movements per user.
///
/// A user's balance is the sum of the amounts of their transactions. Entries are never amended
/// nor deleted, and every operation takes the one lock, so a transfer's funds check and both of
/// its entries are a single step for any concurrent reader or writer.
#[derive(Debug, Default)]
pub struct TokenLedger {
    entries: Mutex<HashMap<u64, Vec<Transaction>>>,
}

fn balance_of(entries: &HashMap<u64, Vec<Transaction>>, user_id: u64) -> f64 {
    entries
        .get(&user_id)
        .map(|txs| txs.iter().map(|tx| tx.amount).sum())
        .unwrap_or(0.)
}

fn append(entries: &mut HashMap<u64, Vec<Transaction>>, user_id: u64, amount: f64, description: String) {
    entries
        .entry(user_id)
        .or_default()
        .push(Transaction::now(user_id, amount, description));
}

impl TokenLedger {
    /// Creates a new, empty `TokenLedger`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transaction timestamped with the current UTC time.
    ///
    /// # Arguments
    /// * `user_id` - The owner of the transaction.
    /// * `amount` - Positive for credits, negative for debits.
    /// * `description` - A free form description.
    pub fn record_transaction(&self, user_id: u64, amount: f64, description: impl Into<String>) {
        self.credit(user_id, amount, description);
    }

    /// Same as `record_transaction`, but returns the user's balance right after the append.
    pub fn credit(&self, user_id: u64, amount: f64, description: impl Into<String>) -> f64 {
        let mut entries = self.entries.lock();
        append(&mut entries, user_id, amount, description.into());
        let balance = balance_of(&entries, user_id);

        info!(user_id = user_id, amount = amount, balance = balance; "transaction recorded");
        balance
    }

    /// Returns the sum of the user's transaction amounts, `0.0` for unknown users.
    pub fn get_balance(&self, user_id: u64) -> f64 {
        balance_of(&self.entries.lock(), user_id)
    }

    /// Moves `amount` tokens from `sender_id` to `receiver_id`.
    ///
    /// # Arguments
    /// * `sender_id` - The user being debited.
    /// * `receiver_id` - The user being credited.
    /// * `amount` - The amount of tokens to move.
    /// * `description` - Appended to both entries' descriptions.
    ///
    /// # Returns
    /// An `InvalidAmount` error if `amount` isn't finite and positive, or an `InsufficientFunds`
    /// error if the sender's balance is lower than `amount`. The ledger is left untouched in both
    /// cases.
    pub fn transfer_tokens(
        &self,
        sender_id: u64,
        receiver_id: u64,
        amount: f64,
        description: &str,
    ) -> Result<()> {
        if !(amount.is_finite() && amount > 0.) {
            warn!(user_id = sender_id, requested = amount; "transfer rejected, invalid amount");
            return Err(LedgerErr::InvalidAmount { amount });
        }

        let mut entries = self.entries.lock();

        let balance = balance_of(&entries, sender_id);
        if balance < amount {
            warn!(user_id = sender_id, balance = balance, requested = amount; "transfer rejected");
            return Err(LedgerErr::InsufficientFunds {
                user_id: sender_id,
                balance,
                requested: amount,
            });
        }

        append(
            &mut entries,
            sender_id,
            -amount,
            format!("Transfer to user {receiver_id}: {description}"),
        );
        append(
            &mut entries,
            receiver_id,
            amount,
            format!("Transfer from user {sender_id}: {description}"),
        );

        info!(sender = sender_id, receiver = receiver_id, amount = amount; "transfer recorded");
        Ok(())
    }

    /// Returns a copy of the user's transactions in chronological order.
    pub fn transactions(&self, user_id: u64) -> Vec<Transaction> {
        self.entries
            .lock()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns every user with at least one transaction, sorted.
    pub fn users(&self) -> Vec<u64> {
        let mut users: Vec<_> = self.entries.lock().keys().copied().collect();
        users.sort_unstable();
        users
    }
}
