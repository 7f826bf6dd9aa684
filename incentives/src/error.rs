use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type of every fallible ledger operation.
pub type Result<T> = std::result::Result<T, LedgerErr>;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerErr {
    /// The sender's balance doesn't cover the transfer, nothing was recorded.
    InsufficientFunds {
        user_id: u64,
        balance: f64,
        requested: f64,
    },
    /// Transfers must move a finite, positive amount, nothing was recorded.
    InvalidAmount { amount: f64 },
}

impl Display for LedgerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds {
                user_id,
                balance,
                requested,
            } => write!(
                f,
                "Insufficient funds for transfer: user {user_id} has {balance:.2} and requested {requested:.2}"
            ),
            Self::InvalidAmount { amount } => {
                write!(f, "Invalid transfer amount: {amount}")
            }
        }
    }
}

impl Error for LedgerErr {}
