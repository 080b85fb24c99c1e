// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::{params, Connection};
use std::collections::HashMap;
use tallybook::error::CoreError;
use tallybook::fx::{self, FetchedTable, FxConfig, RateSource};
use tallybook::money::Money;

fn setup(base: &str) -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    tallybook::db::init_schema(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO settings(key,value) VALUES('base_currency',?1)",
        params![base],
    )
    .unwrap();
    conn
}

fn insert_rate(conn: &Connection, base: &str, quote: &str, rate: f64) {
    conn.execute(
        "INSERT INTO fx_rates(base,quote,rate) VALUES (?1,?2,?3)",
        params![base, quote, rate],
    )
    .unwrap();
}

struct StaticSource(HashMap<String, f64>);

impl StaticSource {
    fn of(pairs: &[(&str, f64)]) -> Self {
        Self(pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect())
    }
}

impl RateSource for StaticSource {
    fn fetch(&self, _base: &str) -> tallybook::error::Result<FetchedTable> {
        Ok(FetchedTable { rates: self.0.clone() })
    }
}

struct FailingSource;

impl RateSource for FailingSource {
    fn fetch(&self, _base: &str) -> tallybook::error::Result<FetchedTable> {
        Err(CoreError::RateFetch("boom".into()))
    }
}

#[test]
fn same_currency_conversion_is_a_noop() {
    // no rates at all; identity must still hold
    let conn = setup("USD");
    let m = Money::from_minor(12345, "USD").unwrap();
    let out = fx::convert(&conn, &m, "USD").unwrap();
    assert_eq!(out, m);
}

#[test]
fn base_to_target_multiplies_by_rate() {
    let conn = setup("MXN");
    insert_rate(&conn, "MXN", "USD", 0.057);

    let pesos = Money::from_minor(100_000, "MXN").unwrap(); // 1000.00 MXN
    let dollars = fx::convert(&conn, &pesos, "USD").unwrap();
    assert_eq!(dollars.minor_units(), 5700); // 57.00 USD

    // and back within rounding
    let back = fx::convert(&conn, &dollars, "MXN").unwrap();
    assert!((back.minor_units() - 100_000).abs() <= 1);
}

#[test]
fn triangulation_routes_through_base() {
    let conn = setup("USD");
    insert_rate(&conn, "USD", "EUR", 0.90);
    insert_rate(&conn, "USD", "INR", 83.0);

    // 90 EUR -> 100 USD -> 8300 INR
    let eur = Money::from_minor(9000, "EUR").unwrap();
    let inr = fx::convert(&conn, &eur, "INR").unwrap();
    assert_eq!(inr.minor_units(), 830_000);
}

#[test]
fn round_trip_stays_within_one_minor_unit() {
    let conn = setup("USD");
    insert_rate(&conn, "USD", "EUR", 0.9137);
    insert_rate(&conn, "USD", "INR", 83.27);

    let original = Money::from_minor(12345, "EUR").unwrap();
    let there = fx::convert(&conn, &original, "INR").unwrap();
    let back = fx::convert(&conn, &there, "EUR").unwrap();
    assert!((back.minor_units() - original.minor_units()).abs() <= 1);
}

#[test]
fn missing_rate_is_rate_unavailable() {
    let conn = setup("USD");
    let m = Money::from_minor(100, "USD").unwrap();
    assert!(matches!(
        fx::convert(&conn, &m, "GBP"),
        Err(CoreError::RateUnavailable { .. })
    ));
}

#[test]
fn zero_rate_counts_as_unavailable() {
    let conn = setup("USD");
    insert_rate(&conn, "USD", "EUR", 0.0);
    let m = Money::from_minor(100, "EUR").unwrap();
    assert!(matches!(
        fx::convert(&conn, &m, "USD"),
        Err(CoreError::RateUnavailable { .. })
    ));
}

#[test]
fn refresh_replaces_table_wholesale() {
    let mut conn = setup("USD");
    insert_rate(&conn, "USD", "INR", 83.0);

    let source = StaticSource::of(&[("EUR", 0.91), ("GBP", 0.79)]);
    assert!(fx::refresh_rates(&mut conn, &source, true).unwrap());

    // old INR row must not survive into the new vintage
    assert!(fx::rate(&conn, "USD", "INR").unwrap().is_none());
    assert_eq!(fx::rate(&conn, "USD", "EUR").unwrap(), Some(0.91));
    assert!(fx::fetched_at(&conn).unwrap().is_some());
    assert!(!fx::is_stale(&conn).unwrap());
}

#[test]
fn fresh_table_short_circuits_unforced_refresh() {
    let mut conn = setup("USD");
    let source = StaticSource::of(&[("EUR", 0.91)]);
    assert!(fx::refresh_rates(&mut conn, &source, true).unwrap());

    let other = StaticSource::of(&[("EUR", 0.50)]);
    assert!(!fx::refresh_rates(&mut conn, &other, false).unwrap());
    assert_eq!(fx::rate(&conn, "USD", "EUR").unwrap(), Some(0.91));

    // force ignores the window
    assert!(fx::refresh_rates(&mut conn, &other, true).unwrap());
    assert_eq!(fx::rate(&conn, "USD", "EUR").unwrap(), Some(0.50));
}

#[test]
fn failed_refresh_keeps_previous_table() {
    let mut conn = setup("USD");
    let source = StaticSource::of(&[("EUR", 0.91)]);
    fx::refresh_rates(&mut conn, &source, true).unwrap();

    let err = fx::refresh_rates(&mut conn, &FailingSource, true);
    assert!(matches!(err, Err(CoreError::RateFetch(_))));
    assert_eq!(fx::rate(&conn, "USD", "EUR").unwrap(), Some(0.91));
}

#[test]
fn base_change_invalidates_stale_rates() {
    let mut conn = setup("USD");
    let source = StaticSource::of(&[("EUR", 0.91)]);
    fx::refresh_rates(&mut conn, &source, true).unwrap();

    // refresh fails after the switch: cache must be empty, not stale-USD
    let err = fx::set_base_currency(&mut conn, &FailingSource, "EUR");
    assert!(err.is_err());
    assert_eq!(fx::get_base_currency(&conn).unwrap(), "EUR");
    let m = Money::from_minor(100, "USD").unwrap();
    assert!(matches!(
        fx::convert(&conn, &m, "EUR"),
        Err(CoreError::RateUnavailable { .. })
    ));

    // successful switch installs rates in the new base's terms
    let eur_rates = StaticSource::of(&[("USD", 1.10)]);
    fx::set_base_currency(&mut conn, &eur_rates, "EUR").unwrap();
    assert_eq!(fx::rate(&conn, "EUR", "USD").unwrap(), Some(1.10));
}

#[test]
fn base_is_always_visible_and_cannot_be_hidden() {
    let conn = setup("USD");
    let mut cfg = FxConfig::load(&conn).unwrap();
    assert!(cfg.is_visible("USD"));

    assert!(matches!(cfg.hide("USD"), Err(CoreError::BaseNotHideable)));

    cfg.show("EUR").unwrap();
    cfg.save(&conn).unwrap();
    let cfg = FxConfig::load(&conn).unwrap();
    assert!(cfg.is_visible("EUR"));

    let mut cfg = FxConfig::load(&conn).unwrap();
    cfg.hide("EUR").unwrap();
    cfg.save(&conn).unwrap();
    assert!(!FxConfig::load(&conn).unwrap().is_visible("EUR"));
    assert!(FxConfig::load(&conn).unwrap().is_visible("USD"));
}
