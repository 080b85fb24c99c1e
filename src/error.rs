// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Errors surfaced by the ledger, money, FX, and snapshot cores.
///
/// Validation errors (`UnbalancedTransaction`, `InsufficientPostings`,
/// `NonPositiveAmount`) mean the caller must fix its input; `RateUnavailable`
/// is transient and may succeed after a refresh; `ConversionUnavailable`
/// is the snapshot-level consequence of a missing rate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transaction requires at least two postings, got {0}")]
    InsufficientPostings(usize),

    #[error("transaction does not balance in {currency}: {imbalance} minor units off")]
    UnbalancedTransaction { currency: String, imbalance: i64 },

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("unknown currency '{0}'")]
    UnknownCurrency(String),

    #[error("posting amounts must be positive minor units")]
    NonPositiveAmount,

    #[error("amount out of range for {0}")]
    AmountOutOfRange(String),

    #[error("no exchange rate available for {base}->{quote}")]
    RateUnavailable { base: String, quote: String },

    #[error("cannot convert {currency} to the base currency")]
    ConversionUnavailable { currency: String },

    #[error("account {0} not found")]
    AccountNotFound(i64),

    #[error("account {0} is deactivated")]
    AccountInactive(i64),

    #[error("transaction {0} not found")]
    TransactionNotFound(i64),

    #[error("transaction {0} has already been reversed")]
    AlreadyReversed(i64),

    #[error("base currency cannot be hidden")]
    BaseNotHideable,

    #[error("rate fetch failed: {0}")]
    RateFetch(String),

    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("invalid recurrence rule '{0}'")]
    InvalidRecurrence(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
