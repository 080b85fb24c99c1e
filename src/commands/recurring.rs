// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::clock::Clock;
use crate::money::Money;
use crate::recurring::{self, Recurrence};
use crate::utils::{id_for_account, maybe_print_json, parse_date, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::{params, Connection};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("run", sub)) => run(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let description = sub.get_one::<String>("description").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let currency = sub.get_one::<String>("currency").unwrap();
    let money = Money::from_decimal(amount, currency)?;
    let debit_id = id_for_account(conn, user, sub.get_one::<String>("debit").unwrap())?;
    let credit_id = id_for_account(conn, user, sub.get_one::<String>("credit").unwrap())?;
    let rule = Recurrence::parse(sub.get_one::<String>("rule").unwrap())?;
    let anchor = parse_date(sub.get_one::<String>("anchor").unwrap())?;

    conn.execute(
        "INSERT INTO recurring_templates
            (user_id, description, amount_minor, currency, debit_account_id,
             credit_account_id, rule, anchor_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user,
            description,
            money.minor_units(),
            money.currency(),
            debit_id,
            credit_id,
            rule.as_str(),
            anchor.to_string()
        ],
    )?;
    println!(
        "Added {} template '{}' ({} anchored {})",
        rule.as_str(),
        description,
        money.format(),
        anchor
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let templates = recurring::active_templates(conn, user)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &templates)? {
        let mut rows = Vec::new();
        for t in &templates {
            let money = Money::from_minor(t.amount_minor, &t.currency)?;
            rows.push(vec![
                t.id.to_string(),
                t.description.clone(),
                money.format(),
                t.rule.clone(),
                t.anchor_date.to_string(),
                t.last_materialized
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "never".into()),
            ]);
        }
        println!(
            "{}",
            pretty_table(
                &["Id", "Description", "Amount", "Rule", "Anchor", "Last run"],
                rows,
            )
        );
    }
    Ok(())
}

fn run(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user: i64 = *sub.get_one::<i64>("user").unwrap();
    let as_of = sub
        .get_one::<String>("as-of")
        .map(|s| parse_date(s))
        .transpose()?;
    let clock = Clock::from_override(as_of);
    let created = recurring::run(conn, user, &clock)?;
    if created.is_empty() {
        println!("Nothing to materialize as of {}", clock.today());
    } else {
        println!(
            "Materialized {} transaction(s) as of {}",
            created.len(),
            clock.today()
        );
    }
    Ok(())
}
