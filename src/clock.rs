// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Date source for the recurring generator and snapshot engine. `Fixed`
/// is the time-travel override; tests and `--as-of` use it, everything
/// else runs on the system clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn from_override(date: Option<NaiveDate>) -> Self {
        match date {
            Some(d) => Clock::Fixed(d),
            None => Clock::System,
        }
    }

    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => Utc::now().date_naive(),
            Clock::Fixed(d) => *d,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(d) => Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN)),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System
    }
}
