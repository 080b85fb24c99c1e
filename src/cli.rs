// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{crate_version, value_parser, Arg, ArgAction, Command};

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .value_parser(value_parser!(i64))
        .default_value("1")
        .help("Owning user id")
}

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print as JSON lines"),
    )
}

fn as_of_arg() -> Arg {
    Arg::new("as-of")
        .long("as-of")
        .value_name("YYYY-MM-DD")
        .help("Override today's date (time travel)")
}

pub fn build_cli() -> Command {
    Command::new("tallybook")
        .about("Double-entry multi-currency ledger with FX valuation and net-worth snapshots")
        .version(crate_version!())
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("account")
                .about("Manage accounts")
                .subcommand(
                    Command::new("add")
                        .about("Add an account")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("kind")
                                .long("kind")
                                .required(true)
                                .value_parser(["asset", "liability", "income", "expense"]),
                        )
                        .arg(Arg::new("currency").long("currency").required(true))
                        .arg(user_arg()),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List accounts")
                        .arg(
                            Arg::new("all")
                                .long("all")
                                .action(ArgAction::SetTrue)
                                .help("Include deactivated accounts"),
                        )
                        .arg(user_arg()),
                ))
                .subcommand(
                    Command::new("deactivate")
                        .about("Soft-deactivate an account (never hard-deleted)")
                        .arg(Arg::new("name").required(true))
                        .arg(user_arg()),
                ),
        )
        .subcommand(
            Command::new("tx")
                .about("Post, list, and reverse transactions")
                .subcommand(
                    Command::new("post")
                        .about("Post a balanced transaction (>=2 legs)")
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("description").long("description").required(true))
                        .arg(Arg::new("memo").long("memo"))
                        .arg(
                            Arg::new("kind")
                                .long("kind")
                                .value_parser(["income", "expense", "transfer", "adjustment"]),
                        )
                        .arg(
                            Arg::new("debit")
                                .long("debit")
                                .value_name("ACCOUNT:AMOUNT")
                                .action(ArgAction::Append),
                        )
                        .arg(
                            Arg::new("credit")
                                .long("credit")
                                .value_name("ACCOUNT:AMOUNT")
                                .action(ArgAction::Append),
                        )
                        .arg(user_arg()),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List transactions")
                        .arg(Arg::new("month").long("month").value_name("YYYY-MM"))
                        .arg(Arg::new("account").long("account"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        )
                        .arg(user_arg()),
                ))
                .subcommand(
                    Command::new("reverse")
                        .about("Post the mirror of a transaction")
                        .arg(Arg::new("id").required(true).value_parser(value_parser!(i64)))
                        .arg(as_of_arg())
                        .arg(user_arg()),
                ),
        )
        .subcommand(
            Command::new("fx")
                .about("Base currency, visibility, and exchange rates")
                .subcommand(
                    Command::new("set-base")
                        .about("Change the base currency (invalidates the rate cache)")
                        .arg(Arg::new("currency").required(true)),
                )
                .subcommand(
                    Command::new("refresh")
                        .about("Fetch the rate table for the current base")
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .action(ArgAction::SetTrue)
                                .help("Ignore the staleness window"),
                        ),
                )
                .subcommand(
                    Command::new("convert")
                        .about("Convert an amount between currencies")
                        .arg(Arg::new("amount").required(true))
                        .arg(Arg::new("from").required(true))
                        .arg(Arg::new("to").required(true)),
                )
                .subcommand(json_flags(Command::new("show").about("Show cached rates")))
                .subcommand(
                    Command::new("visible")
                        .about("Manage visible currencies")
                        .subcommand(Command::new("show"))
                        .subcommand(
                            Command::new("add").arg(Arg::new("currency").required(true)),
                        )
                        .subcommand(
                            Command::new("hide").arg(Arg::new("currency").required(true)),
                        ),
                ),
        )
        .subcommand(
            Command::new("recurring")
                .about("Recurring transaction templates")
                .subcommand(
                    Command::new("add")
                        .about("Add a template")
                        .arg(Arg::new("description").long("description").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("currency").long("currency").required(true))
                        .arg(Arg::new("debit").long("debit").value_name("ACCOUNT").required(true))
                        .arg(Arg::new("credit").long("credit").value_name("ACCOUNT").required(true))
                        .arg(
                            Arg::new("rule")
                                .long("rule")
                                .required(true)
                                .value_parser(["weekly", "biweekly", "monthly", "yearly"]),
                        )
                        .arg(Arg::new("anchor").long("anchor").value_name("YYYY-MM-DD").required(true))
                        .arg(user_arg()),
                )
                .subcommand(json_flags(
                    Command::new("list").about("List templates").arg(user_arg()),
                ))
                .subcommand(
                    Command::new("run")
                        .about("Materialize missing occurrences up to today")
                        .arg(as_of_arg())
                        .arg(user_arg()),
                ),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Monthly net-worth snapshots")
                .subcommand(
                    Command::new("ensure")
                        .about("Create the month's snapshot if absent (idempotent)")
                        .arg(Arg::new("month").required(true).value_name("YYYY-MM"))
                        .arg(as_of_arg())
                        .arg(user_arg()),
                )
                .subcommand(
                    Command::new("recompute")
                        .about("Replace the month's snapshot from the live ledger")
                        .arg(Arg::new("month").required(true).value_name("YYYY-MM"))
                        .arg(as_of_arg())
                        .arg(user_arg()),
                )
                .subcommand(json_flags(
                    Command::new("list").about("List snapshots").arg(user_arg()),
                ))
                .subcommand(json_flags(
                    Command::new("show")
                        .about("Show a snapshot with per-account rows")
                        .arg(Arg::new("month").required(true).value_name("YYYY-MM"))
                        .arg(user_arg()),
                ))
                .subcommand(
                    Command::new("export")
                        .about("Export a snapshot's account rows as CSV")
                        .arg(Arg::new("month").required(true).value_name("YYYY-MM"))
                        .arg(Arg::new("out").long("out").required(true))
                        .arg(user_arg()),
                ),
        )
        .subcommand(Command::new("doctor").about("Scan the ledger for integrity issues"))
}
