//! Errors raised by pure domain rules

use thiserror::Error;

/// A business rule violation detected without touching storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("class is at capacity ({capacity} active students)")]
    ClassFull { capacity: i32 },

    #[error("payment of {amount} exceeds the remaining balance of {balance}")]
    Overpayment { amount: String, balance: String },

    #[error("{0}")]
    Invalid(&'static str),
}
