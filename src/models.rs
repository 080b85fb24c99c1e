// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: String, // asset | liability | income | expense
    pub currency: String,
    pub active: bool,
}

impl Account {
    /// asset/expense accounts are debit-normal, liability/income credit-normal.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self.kind.as_str(), "asset" | "expense")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: i64,
    pub user_id: i64,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub debit_account_id: i64,
    pub credit_account_id: i64,
    pub rule: String, // weekly | biweekly | monthly | yearly
    pub anchor_date: NaiveDate,
    pub last_materialized: Option<NaiveDate>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetWorthSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub month_end: String, // YYYY-MM
    pub assets_minor: i64,
    pub liabilities_minor: i64,
    pub net_worth_minor: i64,
    pub base_currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: i64,
    pub snapshot_id: i64,
    pub account_id: i64,
    pub balance_minor: i64,
    pub currency: String,
    pub base_minor: i64,
}
