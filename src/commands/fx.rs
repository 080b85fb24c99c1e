// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::fx::{self, FxConfig, HttpRateSource};
use crate::money::Money;
use crate::utils::{maybe_print_json, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-base", sub)) => {
            let ccy = sub.get_one::<String>("currency").unwrap();
            fx::set_base_currency(conn, &HttpRateSource, ccy)?;
            println!("Base currency set to {}", ccy.to_uppercase());
        }
        Some(("refresh", sub)) => {
            let force = sub.get_flag("force");
            match fx::refresh_rates(conn, &HttpRateSource, force) {
                Ok(true) => println!("Rates refreshed."),
                Ok(false) => println!("Rates are fresh; skipped (use --force to refetch)."),
                // degrade: keep serving the cached table, warn instead of failing
                Err(e) => match fx::fetched_at(conn)? {
                    Some(at) => eprintln!(
                        "warning: rate fetch failed ({}); keeping table from {}",
                        e,
                        at.to_rfc3339()
                    ),
                    None => return Err(e.into()),
                },
            }
        }
        Some(("convert", sub)) => {
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let from = sub.get_one::<String>("from").unwrap();
            let to = sub.get_one::<String>("to").unwrap();
            let money = Money::from_decimal(amount, from)?;
            let converted = fx::convert(conn, &money, to)?;
            if fx::is_stale(conn)? {
                eprintln!("warning: cached rates are stale; run `tallybook fx refresh`");
            }
            println!("{} -> {}", money.format(), converted.format());
        }
        Some(("show", sub)) => show(conn, sub)?,
        Some(("visible", sub)) => visible(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Serialize)]
struct RateRow {
    base: String,
    quote: String,
    rate: f64,
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let cfg = FxConfig::load(conn)?;
    let mut stmt =
        conn.prepare("SELECT base, quote, rate FROM fx_rates ORDER BY quote")?;
    let rows = stmt.query_map([], |r| {
        Ok(RateRow {
            base: r.get(0)?,
            quote: r.get(1)?,
            rate: r.get(2)?,
        })
    })?;
    let mut data = Vec::new();
    for row in rows {
        let row = row?;
        if cfg.is_visible(&row.quote) {
            data.push(row);
        }
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        match fx::fetched_at(conn)? {
            Some(at) => {
                let marker = if fx::is_stale(conn)? { " (stale)" } else { "" };
                println!("Base {}, fetched {}{}", cfg.base, at.to_rfc3339(), marker);
            }
            None => println!("Base {}, no rates fetched yet", cfg.base),
        }
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| vec![r.base.clone(), r.quote.clone(), format!("{}", r.rate)])
            .collect();
        println!("{}", pretty_table(&["Base", "Quote", "Rate"], rows));
    }
    Ok(())
}

fn visible(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let mut cfg = FxConfig::load(conn)?;
    match m.subcommand() {
        Some(("add", sub)) => {
            let ccy = sub.get_one::<String>("currency").unwrap();
            cfg.show(ccy)?;
            cfg.save(conn)?;
            println!("{} is now visible", ccy.to_uppercase());
        }
        Some(("hide", sub)) => {
            let ccy = sub.get_one::<String>("currency").unwrap();
            cfg.hide(ccy)?;
            cfg.save(conn)?;
            println!("{} is now hidden", ccy.to_uppercase());
        }
        _ => {
            let rows: Vec<Vec<String>> = cfg
                .visible
                .iter()
                .map(|c| {
                    let marker = if *c == cfg.base { "base" } else { "" };
                    vec![c.clone(), marker.to_string()]
                })
                .collect();
            println!("{}", pretty_table(&["Currency", ""], rows));
        }
    }
    Ok(())
}
