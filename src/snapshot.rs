// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::models::{AccountSnapshot, NetWorthSnapshot};
use crate::recurring::days_in_month;
use crate::{fx, ledger};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

fn parse_month_key(month: &str) -> Result<(i32, u32)> {
    let invalid = || CoreError::InvalidMonth(month.to_string());
    let (y, m) = month.split_once('-').ok_or_else(invalid)?;
    if y.len() != 4 || m.len() != 2 {
        return Err(invalid());
    }
    let y: i32 = y.parse().map_err(|_| invalid())?;
    let m: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&m) {
        return Err(invalid());
    }
    Ok((y, m))
}

/// Last calendar day of a YYYY-MM month key.
pub fn month_end_date(month: &str) -> Result<NaiveDate> {
    let (y, m) = parse_month_key(month)?;
    NaiveDate::from_ymd_opt(y, m, days_in_month(y, m))
        .ok_or_else(|| CoreError::InvalidMonth(month.to_string()))
}

pub fn load_snapshot(
    conn: &Connection,
    user_id: i64,
    month: &str,
) -> Result<Option<NetWorthSnapshot>> {
    let snap = conn
        .query_row(
            "SELECT id, user_id, month_end, assets_minor, liabilities_minor, net_worth_minor,
                    base_currency, created_at
             FROM net_worth_snapshots WHERE user_id=?1 AND month_end=?2",
            params![user_id, month],
            |r| {
                Ok(NetWorthSnapshot {
                    id: r.get(0)?,
                    user_id: r.get(1)?,
                    month_end: r.get(2)?,
                    assets_minor: r.get(3)?,
                    liabilities_minor: r.get(4)?,
                    net_worth_minor: r.get(5)?,
                    base_currency: r.get(6)?,
                    created_at: r.get::<_, DateTime<Utc>>(7)?,
                })
            },
        )
        .optional()?;
    Ok(snap)
}

pub fn account_rows(conn: &Connection, snapshot_id: i64) -> Result<Vec<AccountSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, snapshot_id, account_id, balance_minor, currency, base_minor
         FROM account_snapshots WHERE snapshot_id=?1 ORDER BY account_id",
    )?;
    let rows = stmt.query_map(params![snapshot_id], |r| {
        Ok(AccountSnapshot {
            id: r.get(0)?,
            snapshot_id: r.get(1)?,
            account_id: r.get(2)?,
            balance_minor: r.get(3)?,
            currency: r.get(4)?,
            base_minor: r.get(5)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

struct Computed {
    children: Vec<(i64, i64, String, i64)>, // account_id, balance_minor, currency, base_minor
    assets_minor: i64,
    liabilities_minor: i64,
    base: String,
}

/// Balance every active asset/liability account as of month end and
/// convert to base. Runs entirely before any row is written, so a missing
/// rate aborts with `ConversionUnavailable` and leaves no partial
/// snapshot behind. Income/expense accounts are flows, not net worth.
fn compute(conn: &Connection, user_id: i64, month: &str) -> Result<Computed> {
    let as_of = month_end_date(month)?;
    let base = fx::get_base_currency(conn)?;

    let mut stmt = conn.prepare(
        "SELECT id, kind FROM accounts
         WHERE user_id=?1 AND active=1 AND kind IN ('asset','liability')
         ORDER BY id",
    )?;
    let accounts = stmt.query_map(params![user_id], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
    })?;

    let mut children = Vec::new();
    let mut assets_minor: i64 = 0;
    let mut liabilities_minor: i64 = 0;
    for row in accounts {
        let (account_id, kind) = row?;
        let balance = ledger::account_balance(conn, account_id, as_of)?;
        let in_base = fx::convert(conn, &balance, &base).map_err(|e| match e {
            CoreError::RateUnavailable { .. } => CoreError::ConversionUnavailable {
                currency: balance.currency().to_string(),
            },
            other => other,
        })?;
        if kind == "asset" {
            assets_minor += in_base.minor_units();
        } else {
            liabilities_minor += in_base.minor_units();
        }
        children.push((
            account_id,
            balance.minor_units(),
            balance.currency().to_string(),
            in_base.minor_units(),
        ));
    }
    Ok(Computed { children, assets_minor, liabilities_minor, base })
}

fn insert_rows(tx: &Connection, user_id: i64, month: &str, c: &Computed, clock: &Clock) -> Result<i64> {
    tx.execute(
        "INSERT INTO net_worth_snapshots
            (user_id, month_end, assets_minor, liabilities_minor, net_worth_minor,
             base_currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            month,
            c.assets_minor,
            c.liabilities_minor,
            c.assets_minor - c.liabilities_minor,
            c.base,
            clock.now().to_rfc3339(),
        ],
    )?;
    let snapshot_id = tx.last_insert_rowid();
    for (account_id, balance_minor, currency, base_minor) in &c.children {
        tx.execute(
            "INSERT INTO account_snapshots
                (snapshot_id, account_id, balance_minor, currency, base_minor)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![snapshot_id, account_id, balance_minor, currency, base_minor],
        )?;
    }
    Ok(snapshot_id)
}

/// Return the snapshot for `(user_id, month)`, creating it on first
/// access. An existing snapshot is returned untouched — re-invoking never
/// recomputes it; only [`recompute`] does. Creation is create-if-absent
/// on the `(user_id, month_end)` unique key, so a concurrent winner's row
/// is returned rather than raced.
pub fn ensure_snapshot(
    conn: &mut Connection,
    user_id: i64,
    month: &str,
    clock: &Clock,
) -> Result<NetWorthSnapshot> {
    parse_month_key(month)?;
    if let Some(existing) = load_snapshot(conn, user_id, month)? {
        return Ok(existing);
    }
    let computed = compute(conn, user_id, month)?;

    let tx = conn.transaction()?;
    let inserted = tx.execute(
        "INSERT INTO net_worth_snapshots
            (user_id, month_end, assets_minor, liabilities_minor, net_worth_minor,
             base_currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(user_id, month_end) DO NOTHING",
        params![
            user_id,
            month,
            computed.assets_minor,
            computed.liabilities_minor,
            computed.assets_minor - computed.liabilities_minor,
            computed.base,
            clock.now().to_rfc3339(),
        ],
    )?;
    if inserted == 0 {
        // lost the create race; the winner's snapshot is the snapshot
        drop(tx);
        return load_snapshot(conn, user_id, month)?
            .ok_or_else(|| CoreError::InvalidMonth(month.to_string()));
    }
    let snapshot_id = tx.last_insert_rowid();
    for (account_id, balance_minor, currency, base_minor) in &computed.children {
        tx.execute(
            "INSERT INTO account_snapshots
                (snapshot_id, account_id, balance_minor, currency, base_minor)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![snapshot_id, account_id, balance_minor, currency, base_minor],
        )?;
    }
    tx.commit()?;
    load_snapshot(conn, user_id, month)?
        .ok_or_else(|| CoreError::InvalidMonth(month.to_string()))
}

/// The one sanctioned way to change a persisted snapshot: recompute from
/// the live ledger and replace the parent and child rows atomically. The
/// fresh figures are computed before the old rows are deleted, so a
/// conversion failure leaves the previous snapshot intact.
pub fn recompute(
    conn: &mut Connection,
    user_id: i64,
    month: &str,
    clock: &Clock,
) -> Result<NetWorthSnapshot> {
    parse_month_key(month)?;
    let computed = compute(conn, user_id, month)?;

    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM account_snapshots WHERE snapshot_id IN
            (SELECT id FROM net_worth_snapshots WHERE user_id=?1 AND month_end=?2)",
        params![user_id, month],
    )?;
    tx.execute(
        "DELETE FROM net_worth_snapshots WHERE user_id=?1 AND month_end=?2",
        params![user_id, month],
    )?;
    insert_rows(&tx, user_id, month, &computed, clock)?;
    tx.commit()?;
    load_snapshot(conn, user_id, month)?
        .ok_or_else(|| CoreError::InvalidMonth(month.to_string()))
}
