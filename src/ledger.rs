// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::clock::Clock;
use crate::currency;
use crate::error::{CoreError, Result};
use crate::models::Account;
use crate::money::Money;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

/// One leg of a transaction about to be posted. `amount_minor` is a
/// positive magnitude; `is_debit` carries the side.
#[derive(Debug, Clone)]
pub struct NewPosting {
    pub account_id: i64,
    pub amount_minor: i64,
    pub currency: String,
    pub is_debit: bool,
}

fn account_from_row(r: &rusqlite::Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        user_id: r.get(1)?,
        name: r.get(2)?,
        kind: r.get(3)?,
        currency: r.get(4)?,
        active: r.get::<_, i64>(5)? != 0,
    })
}

pub fn get_account(conn: &Connection, user_id: i64, account_id: i64) -> Result<Account> {
    let account = conn
        .query_row(
            "SELECT id, user_id, name, kind, currency, active
             FROM accounts WHERE id=?1 AND user_id=?2",
            params![account_id, user_id],
            account_from_row,
        )
        .optional()?;
    account.ok_or(CoreError::AccountNotFound(account_id))
}

/// Validate a posting set without writing anything: at least two legs,
/// positive magnitudes, known currencies, legs matching their account's
/// currency, accounts active and owned by the user, and every currency
/// group netting to exactly zero minor units (sum of debits == sum of
/// credits, integer arithmetic only). The running sums use checked
/// arithmetic; magnitudes large enough to overflow are rejected rather
/// than wrapped into a sum that accidentally reads as balanced.
pub fn validate_postings(conn: &Connection, user_id: i64, postings: &[NewPosting]) -> Result<()> {
    if postings.len() < 2 {
        return Err(CoreError::InsufficientPostings(postings.len()));
    }
    let mut sums: BTreeMap<String, i64> = BTreeMap::new();
    for p in postings {
        if p.amount_minor <= 0 {
            return Err(CoreError::NonPositiveAmount);
        }
        let cur = currency::lookup(&p.currency)?;
        let account = get_account(conn, user_id, p.account_id)?;
        if !account.active {
            return Err(CoreError::AccountInactive(account.id));
        }
        if account.currency != cur.code {
            return Err(CoreError::CurrencyMismatch {
                left: cur.code.to_string(),
                right: account.currency,
            });
        }
        let signed = if p.is_debit { p.amount_minor } else { -p.amount_minor };
        let sum = sums.entry(cur.code.to_string()).or_insert(0);
        *sum = sum
            .checked_add(signed)
            .ok_or_else(|| CoreError::AmountOutOfRange(cur.code.to_string()))?;
    }
    for (ccy, imbalance) in sums {
        if imbalance != 0 {
            return Err(CoreError::UnbalancedTransaction { currency: ccy, imbalance });
        }
    }
    Ok(())
}

/// Raw row writes. Callers own the enclosing SQLite transaction and must
/// have validated the posting set first.
pub(crate) fn write_transaction(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
    description: &str,
    memo: Option<&str>,
    kind: Option<&str>,
    reverses: Option<i64>,
    postings: &[NewPosting],
) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(user_id, date, description, memo, kind, reverses_transaction_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![user_id, date.to_string(), description, memo, kind, reverses],
    )?;
    let tx_id = conn.last_insert_rowid();
    for p in postings {
        conn.execute(
            "INSERT INTO postings(transaction_id, account_id, amount_minor, currency, is_debit)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![tx_id, p.account_id, p.amount_minor, p.currency.to_uppercase(), p.is_debit as i64],
        )?;
    }
    Ok(tx_id)
}

/// Validate and persist a transaction with its postings atomically: either
/// the transaction and every posting exist afterwards, or nothing does.
/// Once posted it is never mutated; corrections go through
/// [`reverse_transaction`].
pub fn post_transaction(
    conn: &mut Connection,
    user_id: i64,
    date: NaiveDate,
    description: &str,
    memo: Option<&str>,
    kind: Option<&str>,
    postings: &[NewPosting],
) -> Result<i64> {
    validate_postings(conn, user_id, postings)?;
    let tx = conn.transaction()?;
    let id = write_transaction(&tx, user_id, date, description, memo, kind, None, postings)?;
    tx.commit()?;
    Ok(id)
}

/// Fold every posting dated on or before `as_of`, signed by the account's
/// normal balance: a debit posting increases a debit-normal account and
/// decreases a credit-normal one, and vice versa.
pub fn account_balance(conn: &Connection, account_id: i64, as_of: NaiveDate) -> Result<Money> {
    let account = conn
        .query_row(
            "SELECT id, user_id, name, kind, currency, active
             FROM accounts WHERE id=?1",
            params![account_id],
            account_from_row,
        )
        .optional()?
        .ok_or(CoreError::AccountNotFound(account_id))?;
    let debit_normal = account.is_debit_normal();

    let mut stmt = conn.prepare(
        "SELECT p.amount_minor, p.is_debit
         FROM postings p JOIN transactions t ON p.transaction_id = t.id
         WHERE p.account_id=?1 AND t.date<=?2",
    )?;
    let mut rows = stmt.query(params![account_id, as_of.to_string()])?;
    let mut sum: i64 = 0;
    while let Some(r) = rows.next()? {
        let amount: i64 = r.get(0)?;
        let is_debit: bool = r.get::<_, i64>(1)? != 0;
        sum += if is_debit == debit_normal { amount } else { -amount };
    }
    Money::from_minor(sum, &account.currency)
}

/// Post the exact mirror of an existing transaction (debits and credits
/// swapped), dated at the clock's today and linked through
/// `reverses_transaction_id`. The original row is never touched, and a
/// transaction can be reversed only once.
pub fn reverse_transaction(
    conn: &mut Connection,
    user_id: i64,
    tx_id: i64,
    clock: &Clock,
) -> Result<i64> {
    let orig: Option<String> = conn
        .query_row(
            "SELECT description FROM transactions WHERE id=?1 AND user_id=?2",
            params![tx_id, user_id],
            |r| r.get(0),
        )
        .optional()?;
    let description = orig.ok_or(CoreError::TransactionNotFound(tx_id))?;

    let reversed: Option<i64> = conn
        .query_row(
            "SELECT id FROM transactions WHERE reverses_transaction_id=?1",
            params![tx_id],
            |r| r.get(0),
        )
        .optional()?;
    if reversed.is_some() {
        return Err(CoreError::AlreadyReversed(tx_id));
    }

    let mut stmt = conn.prepare(
        "SELECT account_id, amount_minor, currency, is_debit
         FROM postings WHERE transaction_id=?1 ORDER BY id",
    )?;
    let mirrored: Vec<NewPosting> = stmt
        .query_map(params![tx_id], |r| {
            Ok(NewPosting {
                account_id: r.get(0)?,
                amount_minor: r.get(1)?,
                currency: r.get(2)?,
                is_debit: r.get::<_, i64>(3)? == 0, // swap sides
            })
        })?
        .collect::<std::result::Result<_, _>>()?;
    drop(stmt);

    validate_postings(conn, user_id, &mirrored)?;
    let reversal_desc = format!("Reversal of #{}: {}", tx_id, description);
    let tx = conn.transaction()?;
    let id = write_transaction(
        &tx,
        user_id,
        clock.today(),
        &reversal_desc,
        None,
        Some("adjustment"),
        Some(tx_id),
        &mirrored,
    )?;
    tx.commit()?;
    Ok(id)
}
