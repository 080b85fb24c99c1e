// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tallybook::clock::Clock;
use tallybook::recurring::{self, Recurrence};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    tallybook::db::init_schema(&mut conn).unwrap();
    for (name, kind) in [("rent", "expense"), ("checking", "asset")] {
        conn.execute(
            "INSERT INTO accounts(user_id, name, kind, currency) VALUES (1, ?1, ?2, 'USD')",
            params![name, kind],
        )
        .unwrap();
    }
    conn
}

fn account_id(conn: &Connection, name: &str) -> i64 {
    conn.query_row("SELECT id FROM accounts WHERE name=?1", params![name], |r| r.get(0))
        .unwrap()
}

fn add_template(conn: &Connection, rule: &str, anchor: &str, amount_minor: i64) -> i64 {
    let rent = account_id(conn, "rent");
    let checking = account_id(conn, "checking");
    conn.execute(
        "INSERT INTO recurring_templates
            (user_id, description, amount_minor, currency, debit_account_id,
             credit_account_id, rule, anchor_date)
         VALUES (1, 'Rent', ?1, 'USD', ?2, ?3, ?4, ?5)",
        params![amount_minor, rent, checking, rule, anchor],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn tx_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn weekly_occurrences_step_by_seven_days() {
    let out = recurring::occurrences_between(
        Recurrence::Weekly,
        date("2025-01-01"),
        None,
        date("2025-01-15"),
    );
    assert_eq!(out, vec![date("2025-01-01"), date("2025-01-08"), date("2025-01-15")]);
}

#[test]
fn biweekly_occurrences_step_by_fourteen_days() {
    let out = recurring::occurrences_between(
        Recurrence::Biweekly,
        date("2025-01-01"),
        Some(date("2025-01-01")),
        date("2025-02-01"),
    );
    assert_eq!(out, vec![date("2025-01-15"), date("2025-01-29")]);
}

#[test]
fn monthly_anchor_on_the_31st_clamps_to_short_months() {
    let out = recurring::occurrences_between(
        Recurrence::Monthly,
        date("2025-01-31"),
        None,
        date("2025-04-30"),
    );
    assert_eq!(
        out,
        vec![
            date("2025-01-31"),
            date("2025-02-28"),
            date("2025-03-31"),
            date("2025-04-30"),
        ]
    );
}

#[test]
fn leap_year_february_gets_the_29th() {
    let out = recurring::occurrences_between(
        Recurrence::Monthly,
        date("2024-01-31"),
        Some(date("2024-01-31")),
        date("2024-02-29"),
    );
    assert_eq!(out, vec![date("2024-02-29")]);
}

#[test]
fn yearly_leap_anchor_clamps_to_feb_28() {
    let out = recurring::occurrences_between(
        Recurrence::Yearly,
        date("2024-02-29"),
        Some(date("2024-02-29")),
        date("2026-12-31"),
    );
    assert_eq!(out, vec![date("2025-02-28"), date("2026-02-28")]);
}

#[test]
fn future_anchor_yields_nothing() {
    let out = recurring::occurrences_between(
        Recurrence::Monthly,
        date("2025-06-01"),
        None,
        date("2025-05-01"),
    );
    assert!(out.is_empty());
}

#[test]
fn run_materializes_missed_occurrences_and_advances_marker() {
    let mut conn = setup();
    let tpl = add_template(&conn, "monthly", "2025-01-31", 150_000);

    let clock = Clock::Fixed(date("2025-03-05"));
    let created = recurring::run(&mut conn, 1, &clock).unwrap();
    assert_eq!(created.len(), 2); // Jan 31 and Feb 28
    assert_eq!(tx_count(&conn), 2);

    let marker: String = conn
        .query_row(
            "SELECT last_materialized FROM recurring_templates WHERE id=?1",
            params![tpl],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(marker, "2025-02-28");

    let dates: Vec<String> = conn
        .prepare("SELECT date FROM transactions ORDER BY date")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(dates, vec!["2025-01-31", "2025-02-28"]);
}

#[test]
fn running_twice_with_the_same_date_creates_no_duplicates() {
    let mut conn = setup();
    add_template(&conn, "monthly", "2025-01-31", 150_000);

    let clock = Clock::Fixed(date("2025-03-05"));
    recurring::run(&mut conn, 1, &clock).unwrap();
    let after_first = tx_count(&conn);

    let created = recurring::run(&mut conn, 1, &clock).unwrap();
    assert!(created.is_empty());
    assert_eq!(tx_count(&conn), after_first);

    // advancing the clock picks up exactly the next occurrence
    let created = recurring::run(&mut conn, 1, &Clock::Fixed(date("2025-03-31"))).unwrap();
    assert_eq!(created.len(), 1);
}

#[test]
fn inactive_templates_are_skipped() {
    let mut conn = setup();
    let tpl = add_template(&conn, "weekly", "2025-01-01", 1_000);
    conn.execute(
        "UPDATE recurring_templates SET active=0 WHERE id=?1",
        params![tpl],
    )
    .unwrap();

    let created = recurring::run(&mut conn, 1, &Clock::Fixed(date("2025-02-01"))).unwrap();
    assert!(created.is_empty());
    assert_eq!(tx_count(&conn), 0);
}

#[test]
fn generated_transactions_are_balanced_two_leg_postings() {
    let mut conn = setup();
    add_template(&conn, "weekly", "2025-01-01", 2_500);
    recurring::run(&mut conn, 1, &Clock::Fixed(date("2025-01-01"))).unwrap();

    let rent = account_id(&conn, "rent");
    let bal = tallybook::ledger::account_balance(&conn, rent, date("2025-01-31")).unwrap();
    assert_eq!(bal.minor_units(), 2_500);
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM postings", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 2);
}
