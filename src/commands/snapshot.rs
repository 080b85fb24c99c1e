// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::clock::Clock;
use crate::fx::{self, HttpRateSource};
use crate::models::NetWorthSnapshot;
use crate::money::Money;
use crate::snapshot;
use crate::utils::{maybe_print_json, parse_date, parse_month, pretty_table};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("ensure", sub)) => ensure(conn, sub, false)?,
        Some(("recompute", sub)) => ensure(conn, sub, true)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("show", sub)) => show(conn, sub)?,
        Some(("export", sub)) => export(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn clock_from(sub: &clap::ArgMatches) -> Result<Clock> {
    let as_of = sub
        .get_one::<String>("as-of")
        .map(|s| parse_date(s))
        .transpose()?;
    Ok(Clock::from_override(as_of))
}

fn ensure(conn: &mut Connection, sub: &clap::ArgMatches, recompute: bool) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let clock = clock_from(sub)?;

    // Best-effort rate refresh; a failure degrades to the cached table.
    if let Err(e) = fx::refresh_rates(conn, &HttpRateSource, false) {
        eprintln!("warning: rate refresh failed ({}); using cached rates", e);
    }

    let snap = if recompute {
        snapshot::recompute(conn, user, &month, &clock)?
    } else {
        snapshot::ensure_snapshot(conn, user, &month, &clock)?
    };
    print_snapshot(&snap)?;
    Ok(())
}

fn print_snapshot(s: &NetWorthSnapshot) -> Result<()> {
    let assets = Money::from_minor(s.assets_minor, &s.base_currency)?;
    let liabilities = Money::from_minor(s.liabilities_minor, &s.base_currency)?;
    let net = Money::from_minor(s.net_worth_minor, &s.base_currency)?;
    println!(
        "Snapshot #{} {}: assets {}, liabilities {}, net worth {}",
        s.id,
        s.month_end,
        assets.format(),
        liabilities.format(),
        net.format()
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let mut stmt = conn.prepare(
        "SELECT id, user_id, month_end, assets_minor, liabilities_minor, net_worth_minor,
                base_currency, created_at
         FROM net_worth_snapshots WHERE user_id=?1 ORDER BY month_end",
    )?;
    let rows = stmt.query_map(params![user], |r| {
        Ok(NetWorthSnapshot {
            id: r.get(0)?,
            user_id: r.get(1)?,
            month_end: r.get(2)?,
            assets_minor: r.get(3)?,
            liabilities_minor: r.get(4)?,
            net_worth_minor: r.get(5)?,
            base_currency: r.get(6)?,
            created_at: r.get(7)?,
        })
    })?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let mut rows = Vec::new();
        for s in &data {
            rows.push(vec![
                s.month_end.clone(),
                Money::from_minor(s.assets_minor, &s.base_currency)?.format(),
                Money::from_minor(s.liabilities_minor, &s.base_currency)?.format(),
                Money::from_minor(s.net_worth_minor, &s.base_currency)?.format(),
                s.base_currency.clone(),
            ]);
        }
        println!(
            "{}",
            pretty_table(
                &["Month", "Assets", "Liabilities", "Net worth", "Base"],
                rows,
            )
        );
    }
    Ok(())
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let snap = snapshot::load_snapshot(conn, user, &month)?
        .with_context(|| format!("No snapshot for {} yet", month))?;
    let children = snapshot::account_rows(conn, snap.id)?;

    if sub.get_flag("json") || sub.get_flag("jsonl") {
        let payload = serde_json::json!({ "snapshot": snap, "accounts": children });
        maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &payload)?;
        return Ok(());
    }

    print_snapshot(&snap)?;
    let mut rows = Vec::new();
    for c in &children {
        let name: String = conn.query_row(
            "SELECT name FROM accounts WHERE id=?1",
            params![c.account_id],
            |r| r.get(0),
        )?;
        rows.push(vec![
            name,
            Money::from_minor(c.balance_minor, &c.currency)?.format(),
            Money::from_minor(c.base_minor, &snap.base_currency)?.format(),
        ]);
    }
    println!(
        "{}",
        pretty_table(
            &["Account", "Balance", &format!("In {}", snap.base_currency)],
            rows,
        )
    );
    Ok(())
}

fn export(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let out = sub.get_one::<String>("out").unwrap();
    let snap = snapshot::load_snapshot(conn, user, &month)?
        .with_context(|| format!("No snapshot for {} yet", month))?;
    let children = snapshot::account_rows(conn, snap.id)?;

    let mut wtr = csv::Writer::from_path(out)?;
    wtr.write_record([
        "month",
        "account",
        "currency",
        "balance",
        "base_currency",
        "balance_in_base",
    ])?;
    for c in &children {
        let name: String = conn.query_row(
            "SELECT name FROM accounts WHERE id=?1",
            params![c.account_id],
            |r| r.get(0),
        )?;
        wtr.write_record([
            snap.month_end.clone(),
            name,
            c.currency.clone(),
            Money::from_minor(c.balance_minor, &c.currency)?.to_major().to_string(),
            snap.base_currency.clone(),
            Money::from_minor(c.base_minor, &snap.base_currency)?.to_major().to_string(),
        ])?;
    }
    wtr.flush()?;
    println!("Exported snapshot {} to {}", month, out);
    Ok(())
}
