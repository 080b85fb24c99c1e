// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::ledger::{self, NewPosting};
use crate::models::RecurringTemplate;
use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{params, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "weekly" => Ok(Recurrence::Weekly),
            "biweekly" => Ok(Recurrence::Biweekly),
            "monthly" => Ok(Recurrence::Monthly),
            "yearly" => Ok(Recurrence::Yearly),
            other => Err(CoreError::InvalidRecurrence(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Weekly => "weekly",
            Recurrence::Biweekly => "biweekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Yearly => "yearly",
        }
    }

    /// Smallest occurrence strictly after `after`. Occurrences are
    /// `anchor + k * period`; monthly and yearly anchors on a day the
    /// target month lacks (say the 31st) clamp to that month's last day.
    pub fn next_after(&self, anchor: NaiveDate, after: NaiveDate) -> NaiveDate {
        match self {
            Recurrence::Weekly => next_by_days(anchor, after, 7),
            Recurrence::Biweekly => next_by_days(anchor, after, 14),
            Recurrence::Monthly => next_by_months(anchor, after, 1),
            Recurrence::Yearly => next_by_months(anchor, after, 12),
        }
    }
}

fn next_by_days(anchor: NaiveDate, after: NaiveDate, period: i64) -> NaiveDate {
    if after < anchor {
        return anchor;
    }
    let k = (after - anchor).num_days() / period + 1;
    anchor + Duration::days(k * period)
}

fn next_by_months(anchor: NaiveDate, after: NaiveDate, step: i32) -> NaiveDate {
    if after < anchor {
        return anchor;
    }
    let diff =
        (after.year() - anchor.year()) * 12 + after.month() as i32 - anchor.month() as i32;
    let mut k = (diff / step).max(0);
    let mut candidate = add_months_clamped(anchor, k * step);
    while candidate <= after {
        k += 1;
        candidate = add_months_clamped(anchor, k * step);
    }
    candidate
}

fn add_months_clamped(anchor: NaiveDate, months: i32) -> NaiveDate {
    let zero_based = anchor.year() * 12 + anchor.month0() as i32 + months;
    let y = zero_based.div_euclid(12);
    let m = zero_based.rem_euclid(12) as u32 + 1;
    let day = anchor.day().min(days_in_month(y, m));
    // valid by construction (day clamped into the month)
    NaiveDate::from_ymd_opt(y, m, day).unwrap_or(anchor)
}

pub(crate) fn days_in_month(y: i32, m: u32) -> u32 {
    match m {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if NaiveDate::from_ymd_opt(y, 2, 29).is_some() {
                29
            } else {
                28
            }
        }
    }
}

/// Occurrence dates in `(last, today]`, derived only from the stored
/// marker. When the template has never materialized, the anchor itself is
/// the first occurrence.
pub fn occurrences_between(
    rule: Recurrence,
    anchor: NaiveDate,
    last: Option<NaiveDate>,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut cursor = match last {
        Some(d) => rule.next_after(anchor, d),
        None => anchor,
    };
    while cursor <= today {
        out.push(cursor);
        cursor = rule.next_after(anchor, cursor);
    }
    out
}

pub fn active_templates(conn: &Connection, user_id: i64) -> Result<Vec<RecurringTemplate>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, description, amount_minor, currency, debit_account_id,
                credit_account_id, rule, anchor_date, last_materialized, active
         FROM recurring_templates WHERE user_id=?1 AND active=1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user_id], |r| {
        Ok(RecurringTemplate {
            id: r.get(0)?,
            user_id: r.get(1)?,
            description: r.get(2)?,
            amount_minor: r.get(3)?,
            currency: r.get(4)?,
            debit_account_id: r.get(5)?,
            credit_account_id: r.get(6)?,
            rule: r.get(7)?,
            anchor_date: r.get(8)?,
            last_materialized: r.get(9)?,
            active: r.get::<_, i64>(10)? != 0,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Materialize every missing occurrence up to the clock's today for the
/// user's active templates. Each occurrence posts its transaction and
/// advances `last_materialized` inside one SQLite transaction, so a
/// failed post never advances the marker and re-running with the same
/// date creates nothing new.
pub fn run(conn: &mut Connection, user_id: i64, clock: &Clock) -> Result<Vec<i64>> {
    let today = clock.today();
    let mut created = Vec::new();
    for tpl in active_templates(conn, user_id)? {
        let rule = Recurrence::parse(&tpl.rule)?;
        let postings = [
            NewPosting {
                account_id: tpl.debit_account_id,
                amount_minor: tpl.amount_minor,
                currency: tpl.currency.clone(),
                is_debit: true,
            },
            NewPosting {
                account_id: tpl.credit_account_id,
                amount_minor: tpl.amount_minor,
                currency: tpl.currency.clone(),
                is_debit: false,
            },
        ];
        for date in occurrences_between(rule, tpl.anchor_date, tpl.last_materialized, today) {
            ledger::validate_postings(conn, user_id, &postings)?;
            let tx = conn.transaction()?;
            let id = ledger::write_transaction(
                &tx,
                user_id,
                date,
                &tpl.description,
                None,
                None,
                None,
                &postings,
            )?;
            tx.execute(
                "UPDATE recurring_templates SET last_materialized=?1 WHERE id=?2",
                params![date.to_string(), tpl.id],
            )?;
            tx.commit()?;
            created.push(id);
        }
    }
    Ok(created)
}
