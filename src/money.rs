// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::currency;
use crate::error::{CoreError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// An exact monetary amount: integer minor units plus a currency code.
///
/// Every ledger and snapshot sum goes through this type; nothing in the
/// crate does floating-point money arithmetic. FX rates are the single
/// float boundary, and their results are rounded back into minor units
/// here (half away from zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Money {
    minor: i64,
    currency: String,
    scale: u32,
}

impl Money {
    /// Build from a decimal major-unit amount, e.g. `12.345` USD -> 1235 minor.
    pub fn from_decimal(amount: Decimal, code: &str) -> Result<Self> {
        let cur = currency::lookup(code)?;
        let factor = Decimal::from(10i64.pow(cur.scale));
        let minor = amount
            .checked_mul(factor)
            .ok_or_else(|| CoreError::AmountOutOfRange(cur.code.to_string()))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| CoreError::AmountOutOfRange(cur.code.to_string()))?;
        Ok(Self { minor, currency: cur.code.to_string(), scale: cur.scale })
    }

    pub fn from_minor(minor: i64, code: &str) -> Result<Self> {
        let cur = currency::lookup(code)?;
        Ok(Self { minor, currency: cur.code.to_string(), scale: cur.scale })
    }

    /// Round a float major-unit value into minor units, half away from zero.
    /// Used only at the FX boundary where rates are float ratios.
    pub fn from_f64(value: f64, code: &str) -> Result<Self> {
        let cur = currency::lookup(code)?;
        let scaled = value * 10f64.powi(cur.scale as i32);
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return Err(CoreError::AmountOutOfRange(cur.code.to_string()));
        }
        let minor = if scaled >= 0.0 {
            (scaled + 0.5).floor() as i64
        } else {
            (scaled - 0.5).ceil() as i64
        };
        Ok(Self { minor, currency: cur.code.to_string(), scale: cur.scale })
    }

    pub fn zero(code: &str) -> Result<Self> {
        Self::from_minor(0, code)
    }

    pub fn minor_units(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Lossless decimal major-unit value (e.g. 1235 minor USD -> 12.35).
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.minor, self.scale)
    }

    /// Major units as a float. FX-boundary use only.
    pub fn to_major_f64(&self) -> f64 {
        self.minor as f64 / 10f64.powi(self.scale as i32)
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.same_currency(other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or_else(|| CoreError::AmountOutOfRange(self.currency.clone()))?;
        Ok(Self { minor, currency: self.currency.clone(), scale: self.scale })
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.same_currency(other)?;
        let minor = self
            .minor
            .checked_sub(other.minor)
            .ok_or_else(|| CoreError::AmountOutOfRange(self.currency.clone()))?;
        Ok(Self { minor, currency: self.currency.clone(), scale: self.scale })
    }

    /// Symbol- and separator-aware rendering, e.g. "$1,234.56".
    pub fn format(&self) -> String {
        match currency::lookup(&self.currency) {
            Ok(cur) => currency::format_minor(cur, self.minor),
            // Construction validates the code, so this arm is unreachable in
            // practice; render plainly rather than panic.
            Err(_) => format!("{} {}", self.currency, self.to_major()),
        }
    }

    fn same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(CoreError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.to_major(), self.currency)
    }
}
