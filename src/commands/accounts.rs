// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::currency;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let user: i64 = *sub.get_one::<i64>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let kind = sub.get_one::<String>("kind").unwrap();
            let ccy = currency::lookup(sub.get_one::<String>("currency").unwrap())?;
            conn.execute(
                "INSERT INTO accounts(user_id, name, kind, currency) VALUES (?1, ?2, ?3, ?4)",
                params![user, name, kind, ccy.code],
            )?;
            println!("Added account '{}' ({}, {})", name, kind, ccy.code);
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("deactivate", sub)) => {
            let user: i64 = *sub.get_one::<i64>("user").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let n = conn.execute(
                "UPDATE accounts SET active=0 WHERE user_id=?1 AND name=?2",
                params![user, name],
            )?;
            if n == 0 {
                anyhow::bail!("Account '{}' not found", name);
            }
            println!("Deactivated account '{}'", name);
        }
        _ => {}
    }
    Ok(())
}

#[derive(Serialize)]
struct AccountRow {
    name: String,
    kind: String,
    currency: String,
    active: bool,
    created: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let all = sub.get_flag("all");
    let sql = if all {
        "SELECT name, kind, currency, active, created_at FROM accounts
         WHERE user_id=?1 ORDER BY name"
    } else {
        "SELECT name, kind, currency, active, created_at FROM accounts
         WHERE user_id=?1 AND active=1 ORDER BY name"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![user], |r| {
        Ok(AccountRow {
            name: r.get(0)?,
            kind: r.get(1)?,
            currency: r.get(2)?,
            active: r.get::<_, i64>(3)? != 0,
            created: r.get(4)?,
        })
    })?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|a| {
                vec![
                    a.name.clone(),
                    a.kind.clone(),
                    a.currency.clone(),
                    if a.active { "yes".into() } else { "no".into() },
                    a.created.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Name", "Kind", "Currency", "Active", "Created"], rows)
        );
    }
    Ok(())
}
