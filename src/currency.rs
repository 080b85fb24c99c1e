// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{CoreError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Immutable, process-wide currency metadata. The scale is the number of
/// minor-unit decimal places; all ledger amounts are stored as integer
/// multiples of 10^-scale.
#[derive(Debug, Clone, Copy)]
pub struct Currency {
    pub code: &'static str,
    pub scale: u32,
    pub symbol: &'static str,
    pub symbol_first: bool,
    pub group_sep: char,
    pub decimal_sep: char,
}

const CURRENCIES: &[Currency] = &[
    Currency { code: "USD", scale: 2, symbol: "$", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "EUR", scale: 2, symbol: "€", symbol_first: false, group_sep: '.', decimal_sep: ',' },
    Currency { code: "GBP", scale: 2, symbol: "£", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "JPY", scale: 0, symbol: "¥", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "CHF", scale: 2, symbol: "CHF", symbol_first: true, group_sep: '\'', decimal_sep: '.' },
    Currency { code: "CAD", scale: 2, symbol: "$", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "AUD", scale: 2, symbol: "$", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "MXN", scale: 2, symbol: "$", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "BRL", scale: 2, symbol: "R$", symbol_first: true, group_sep: '.', decimal_sep: ',' },
    Currency { code: "INR", scale: 2, symbol: "₹", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "CNY", scale: 2, symbol: "¥", symbol_first: true, group_sep: ',', decimal_sep: '.' },
    Currency { code: "SEK", scale: 2, symbol: "kr", symbol_first: false, group_sep: ' ', decimal_sep: ',' },
    Currency { code: "NOK", scale: 2, symbol: "kr", symbol_first: false, group_sep: ' ', decimal_sep: ',' },
    Currency { code: "BTC", scale: 8, symbol: "₿", symbol_first: true, group_sep: ',', decimal_sep: '.' },
];

static REGISTRY: Lazy<HashMap<&'static str, &'static Currency>> =
    Lazy::new(|| CURRENCIES.iter().map(|c| (c.code, c)).collect());

pub fn lookup(code: &str) -> Result<&'static Currency> {
    REGISTRY
        .get(code.to_uppercase().as_str())
        .copied()
        .ok_or_else(|| CoreError::UnknownCurrency(code.to_string()))
}

pub fn is_known(code: &str) -> bool {
    REGISTRY.contains_key(code.to_uppercase().as_str())
}

/// Render integer minor units with the currency's separators and symbol
/// position, e.g. -123456 USD -> "-$1,234.56", 123456 EUR -> "1.234,56 €".
pub fn format_minor(cur: &Currency, minor: i64) -> String {
    let digits = minor.unsigned_abs().to_string();
    let scale = cur.scale as usize;
    let padded = if digits.len() <= scale {
        format!("{:0>width$}", digits, width = scale + 1)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(cur.group_sep);
        }
        grouped.push(ch);
    }

    let mut body = grouped;
    if scale > 0 {
        body.push(cur.decimal_sep);
        body.push_str(frac_part);
    }

    let sign = if minor < 0 { "-" } else { "" };
    if cur.symbol_first {
        format!("{}{}{}", sign, cur.symbol, body)
    } else {
        format!("{}{} {}", sign, body, cur.symbol)
    }
}
