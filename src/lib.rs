// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cli;
pub mod clock;
pub mod commands;
pub mod currency;
pub mod db;
pub mod error;
pub mod fx;
pub mod ledger;
pub mod models;
pub mod money;
pub mod recurring;
pub mod snapshot;
pub mod utils;
