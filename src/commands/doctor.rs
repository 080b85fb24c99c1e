// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::currency;
use crate::fx;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Transactions with fewer than two postings
    let mut stmt = conn.prepare(
        "SELECT t.id, COUNT(p.id) FROM transactions t
         LEFT JOIN postings p ON p.transaction_id = t.id
         GROUP BY t.id HAVING COUNT(p.id) < 2",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let n: i64 = r.get(1)?;
        rows.push(vec!["under_posted".into(), format!("tx #{} has {} posting(s)", id, n)]);
    }

    // 2) Per-currency imbalance (should be unreachable past post validation)
    let mut stmt2 = conn.prepare(
        "SELECT transaction_id, currency,
                SUM(CASE WHEN is_debit=1 THEN amount_minor ELSE -amount_minor END) AS s
         FROM postings GROUP BY transaction_id, currency HAVING s != 0",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let id: i64 = r.get(0)?;
        let ccy: String = r.get(1)?;
        let s: i64 = r.get(2)?;
        rows.push(vec![
            "unbalanced".into(),
            format!("tx #{} off by {} minor units {}", id, s, ccy),
        ]);
    }

    // 3) Currencies outside the registry
    let mut stmt3 = conn.prepare(
        "SELECT DISTINCT currency FROM postings
         UNION SELECT currency FROM accounts",
    )?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let ccy: String = r.get(0)?;
        if !currency::is_known(&ccy) {
            rows.push(vec!["unknown_currency".into(), ccy]);
        }
    }

    // 4) Active non-base account currencies without a cached rate
    let base = fx::get_base_currency(conn)?;
    let mut stmt4 = conn.prepare(
        "SELECT DISTINCT currency FROM accounts WHERE active=1 AND currency != ?1",
    )?;
    let mut cur4 = stmt4.query([&base])?;
    while let Some(r) = cur4.next()? {
        let ccy: String = r.get(0)?;
        if fx::rate(conn, &base, &ccy)?.is_none() {
            rows.push(vec!["missing_fx".into(), format!("{}->{}", base, ccy)]);
        }
    }

    // 5) Snapshot totals that disagree with their child rows
    let mut stmt5 = conn.prepare(
        "SELECT s.id, s.month_end, s.net_worth_minor FROM net_worth_snapshots s",
    )?;
    let mut cur5 = stmt5.query([])?;
    while let Some(r) = cur5.next()? {
        let id: i64 = r.get(0)?;
        let month: String = r.get(1)?;
        let net: i64 = r.get(2)?;
        let derived: Option<i64> = conn
            .query_row(
                "SELECT SUM(CASE WHEN a.kind='asset' THEN c.base_minor ELSE -c.base_minor END)
                 FROM account_snapshots c JOIN accounts a ON a.id = c.account_id
                 WHERE c.snapshot_id=?1",
                [id],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        if derived.unwrap_or(0) != net {
            rows.push(vec![
                "snapshot_drift".into(),
                format!("{}: parent {} vs children {:?}", month, net, derived),
            ]);
        }
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
