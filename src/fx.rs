// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::currency;
use crate::error::{CoreError, Result};
use crate::money::Money;
use crate::utils;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// Cached rates older than this are refetched on the next non-forced refresh.
pub const STALENESS_WINDOW_SECS: i64 = 300;

/// Serializes rate refreshes so concurrent callers cannot land two rate
/// vintages in the cache; the second caller re-checks staleness after
/// acquiring and short-circuits.
static REFRESH_LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);

fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| r.get(0))
        .optional()?;
    Ok(v)
}

fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn get_base_currency(conn: &Connection) -> Result<String> {
    Ok(get_setting(conn, "base_currency")?.unwrap_or_else(|| "USD".to_string()))
}

/// Base currency plus the set of currencies shown in the UI. The base is
/// always a member of the visible set; every load and save re-enforces that.
#[derive(Debug, Clone)]
pub struct FxConfig {
    pub base: String,
    pub visible: BTreeSet<String>,
}

impl FxConfig {
    pub fn load(conn: &Connection) -> Result<Self> {
        let base = get_base_currency(conn)?;
        let mut visible: BTreeSet<String> = get_setting(conn, "visible_currencies")?
            .map(|csv| {
                csv.split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_uppercase())
                    .collect()
            })
            .unwrap_or_default();
        visible.insert(base.clone());
        Ok(Self { base, visible })
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        self.visible.insert(self.base.clone());
        set_setting(conn, "base_currency", &self.base)?;
        let csv: Vec<&str> = self.visible.iter().map(|s| s.as_str()).collect();
        set_setting(conn, "visible_currencies", &csv.join(","))?;
        Ok(())
    }

    pub fn is_visible(&self, code: &str) -> bool {
        self.visible.contains(&code.to_uppercase())
    }

    pub fn show(&mut self, code: &str) -> Result<()> {
        let cur = currency::lookup(code)?;
        self.visible.insert(cur.code.to_string());
        Ok(())
    }

    pub fn hide(&mut self, code: &str) -> Result<()> {
        let cur = currency::lookup(code)?;
        if cur.code == self.base {
            return Err(CoreError::BaseNotHideable);
        }
        self.visible.remove(cur.code);
        Ok(())
    }
}

/// A freshly fetched rate table: quote code (uppercase) -> units of quote
/// per 1 unit of base.
pub struct FetchedTable {
    pub rates: HashMap<String, f64>,
}

pub trait RateSource {
    fn fetch(&self, base: &str) -> Result<FetchedTable>;
}

/// Free currency-api endpoint: GET .../currencies/{base}.json returns
/// `{"date": "...", "<base>": {"usd": 1.08, ...}}` with lowercase codes.
pub struct HttpRateSource;

impl RateSource for HttpRateSource {
    fn fetch(&self, base: &str) -> Result<FetchedTable> {
        let url = format!(
            "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies/{}.json",
            base.to_lowercase()
        );
        let client = utils::http_client().map_err(|e| CoreError::RateFetch(e.to_string()))?;
        let resp = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::RateFetch(e.to_string()))?;
        let body: serde_json::Value = resp
            .json()
            .map_err(|e| CoreError::RateFetch(e.to_string()))?;
        // The date field is ignorable; the table sits under the base's key.
        let table = body
            .get(base.to_lowercase())
            .and_then(|v| v.as_object())
            .ok_or_else(|| CoreError::RateFetch(format!("no rate table for {}", base)))?;
        let mut rates = HashMap::new();
        for (code, v) in table {
            if let Some(rate) = v.as_f64() {
                rates.insert(code.to_uppercase(), rate);
            }
        }
        Ok(FetchedTable { rates })
    }
}

pub fn fetched_at(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    Ok(get_setting(conn, "fx_fetched_at")?
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

pub fn is_stale(conn: &Connection) -> Result<bool> {
    match fetched_at(conn)? {
        Some(at) => Ok((Utc::now() - at).num_seconds() > STALENESS_WINDOW_SECS),
        None => Ok(true),
    }
}

/// Fetch the full table for the current base and replace the cache
/// wholesale. Within the staleness window this is a no-op unless `force`.
/// On fetch failure the previous table is left untouched and the error
/// surfaces to the caller.
///
/// Returns whether a fetch actually happened.
pub fn refresh_rates(conn: &mut Connection, source: &dyn RateSource, force: bool) -> Result<bool> {
    let _guard = REFRESH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if !force && !is_stale(conn)? {
        return Ok(false);
    }
    let base = get_base_currency(conn)?;
    let fetched = source.fetch(&base)?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM fx_rates WHERE base=?1", params![base])?;
    for (quote, rate) in &fetched.rates {
        if *quote == base {
            continue; // base to itself is always 1, kept implicit
        }
        tx.execute(
            "INSERT INTO fx_rates(base, quote, rate) VALUES (?1, ?2, ?3)",
            params![base, quote, rate],
        )?;
    }
    tx.execute(
        "INSERT INTO settings(key, value) VALUES('fx_fetched_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![Utc::now().to_rfc3339()],
    )?;
    tx.commit()?;
    Ok(true)
}

/// Change the base currency. The cached table is in the old base's terms,
/// so it is wiped before the refresh is attempted; stale rates never
/// survive a base change. A failed refresh leaves the cache empty and
/// surfaces the error.
pub fn set_base_currency(conn: &mut Connection, source: &dyn RateSource, code: &str) -> Result<()> {
    let cur = currency::lookup(code)?;
    let mut cfg = FxConfig::load(conn)?;
    cfg.base = cur.code.to_string();
    cfg.save(conn)?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM fx_rates", [])?;
    tx.execute("DELETE FROM settings WHERE key='fx_fetched_at'", [])?;
    tx.commit()?;

    refresh_rates(conn, source, true)?;
    Ok(())
}

/// Rate from the cached table: quote units per 1 base unit. Zero and
/// negative stored rates are treated as unavailable.
pub fn rate(conn: &Connection, base: &str, quote: &str) -> Result<Option<f64>> {
    if base == quote {
        return Ok(Some(1.0));
    }
    let r: Option<f64> = conn
        .query_row(
            "SELECT rate FROM fx_rates WHERE base=?1 AND quote=?2",
            params![base, quote],
            |r| r.get(0),
        )
        .optional()?;
    Ok(r.filter(|v| *v > 0.0))
}

fn require_rate(conn: &Connection, base: &str, quote: &str) -> Result<f64> {
    rate(conn, base, quote)?.ok_or_else(|| CoreError::RateUnavailable {
        base: base.to_string(),
        quote: quote.to_string(),
    })
}

/// Convert `amount` into `to` via the base currency. Same-currency
/// conversion is a strict no-op (no rounding applied); otherwise the
/// amount crosses the float rate boundary once and is rounded back to the
/// target's minor units half away from zero. Conversion is for reporting
/// only; recorded posting amounts are never rewritten.
pub fn convert(conn: &Connection, amount: &Money, to: &str) -> Result<Money> {
    let target = currency::lookup(to)?;
    if amount.currency() == target.code {
        return Ok(amount.clone());
    }
    let base = get_base_currency(conn)?;
    let from = amount.currency();

    let value = if from == base {
        amount.to_major_f64() * require_rate(conn, &base, target.code)?
    } else if target.code == base {
        amount.to_major_f64() / require_rate(conn, &base, from)?
    } else {
        amount.to_major_f64() / require_rate(conn, &base, from)?
            * require_rate(conn, &base, target.code)?
    };
    Money::from_f64(value, target.code)
}
