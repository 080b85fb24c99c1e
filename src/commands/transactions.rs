// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::clock::Clock;
use crate::ledger::{self, NewPosting};
use crate::money::Money;
use crate::utils::{id_for_account, maybe_print_json, parse_date, parse_leg, pretty_table};
use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("post", sub)) => post(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("reverse", sub)) => reverse(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn legs(
    conn: &Connection,
    user: i64,
    sub: &clap::ArgMatches,
    arg: &str,
    is_debit: bool,
) -> Result<Vec<NewPosting>> {
    let mut out = Vec::new();
    if let Some(values) = sub.get_many::<String>(arg) {
        for raw in values {
            let (account_name, amount) = parse_leg(raw)?;
            let account_id = id_for_account(conn, user, &account_name)?;
            let currency: String = conn.query_row(
                "SELECT currency FROM accounts WHERE id=?1",
                params![account_id],
                |r| r.get(0),
            )?;
            let money = Money::from_decimal(amount, &currency)?;
            out.push(NewPosting {
                account_id,
                amount_minor: money.minor_units(),
                currency,
                is_debit,
            });
        }
    }
    Ok(out)
}

fn post(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let description = sub.get_one::<String>("description").unwrap();
    let memo = sub.get_one::<String>("memo").map(|s| s.as_str());
    let kind = sub.get_one::<String>("kind").map(|s| s.as_str());

    let mut postings = legs(conn, user, sub, "debit", true)?;
    postings.extend(legs(conn, user, sub, "credit", false)?);

    let id = ledger::post_transaction(conn, user, date, description, memo, kind, &postings)?;
    println!("Posted transaction #{} '{}' on {}", id, description, date);
    Ok(())
}

fn reverse(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let id: i64 = *sub.get_one::<i64>("id").unwrap();
    let as_of = sub
        .get_one::<String>("as-of")
        .map(|s| parse_date(s))
        .transpose()?;
    let clock = Clock::from_override(as_of);
    let rev = ledger::reverse_transaction(conn, user, id, &clock)?;
    println!("Reversed transaction #{} with #{}", id, rev);
    Ok(())
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub kind: String,
    pub legs: String,
    pub reverses: Option<i64>,
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let mut sql = String::from(
        "SELECT DISTINCT t.id, t.date, t.description, t.kind, t.reverses_transaction_id
         FROM transactions t
         JOIN postings p ON p.transaction_id = t.id
         JOIN accounts a ON a.id = p.account_id
         WHERE t.user_id = ?",
    );
    let mut params_vec: Vec<String> = vec![user.to_string()];

    if let Some(month) = sub.get_one::<String>("month") {
        sql.push_str(" AND substr(t.date,1,7)=?");
        params_vec.push(month.into());
    }
    if let Some(acct) = sub.get_one::<String>("account") {
        sql.push_str(" AND a.name=?");
        params_vec.push(acct.into());
    }
    sql.push_str(" ORDER BY t.date DESC, t.id DESC");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = params_vec
        .iter()
        .map(|s| s as &dyn rusqlite::ToSql)
        .collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let date: String = r.get(1)?;
        let description: String = r.get(2)?;
        let kind: Option<String> = r.get(3)?;
        let reverses: Option<i64> = r.get(4)?;
        data.push(TransactionRow {
            id,
            date,
            description,
            kind: kind.unwrap_or_default(),
            legs: legs_summary(conn, id)?,
            reverses,
        });
    }
    Ok(data)
}

fn legs_summary(conn: &Connection, tx_id: i64) -> Result<String> {
    let mut stmt = conn.prepare(
        "SELECT a.name, p.amount_minor, p.currency, p.is_debit
         FROM postings p JOIN accounts a ON a.id = p.account_id
         WHERE p.transaction_id=?1 ORDER BY p.id",
    )?;
    let mut rows = stmt.query(params![tx_id])?;
    let mut parts = Vec::new();
    while let Some(r) = rows.next()? {
        let name: String = r.get(0)?;
        let minor: i64 = r.get(1)?;
        let ccy: String = r.get(2)?;
        let is_debit: bool = r.get::<_, i64>(3)? != 0;
        let money = Money::from_minor(minor, &ccy)?;
        let side = if is_debit { "Dr" } else { "Cr" };
        parts.push(format!("{} {} {}", side, name, money.format()));
    }
    Ok(parts.join("; "))
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.description.clone(),
                    r.kind.clone(),
                    r.legs.clone(),
                    r.reverses.map(|i| format!("#{}", i)).unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Date", "Description", "Kind", "Legs", "Reverses"],
                rows,
            )
        );
    }
    Ok(())
}
