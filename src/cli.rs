// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::dates::TRAILING_WINDOWS;
use clap::{Arg, ArgAction, ArgGroup, Command, arg, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(arg!(--json "Print JSON").action(ArgAction::SetTrue))
        .arg(arg!(--jsonl "Print JSON lines").action(ArgAction::SetTrue))
}

fn returns_cmd() -> Command {
    let mut cmd = Command::new("returns")
        .about("Money-weighted annualized return (XIRR) of a set of accounts")
        .arg(
            Arg::new("account")
                .long("account")
                .value_name("PATTERN")
                .action(ArgAction::Append)
                .required(true)
                .help("Account(s) to include; matched from the start of the account name. Repeatable."),
        )
        .arg(
            Arg::new("internal")
                .long("internal")
                .value_name("PATTERN")
                .action(ArgAction::Append)
                .help("Account(s) holding internal flows such as dividends, interest and capital gains. Repeatable."),
        )
        .arg(arg!(--currency <CCY> "Currency to compute returns in (default: base currency)"))
        .arg(arg!(--from <DATE> "Start date YYYY-MM-DD, inclusive"))
        .arg(arg!(--to <DATE> "End date YYYY-MM-DD, inclusive (default: today)"))
        .arg(
            arg!(--year <YEAR> "Calendar year; shorthand for --from/--to")
                .value_parser(value_parser!(i32)),
        )
        .arg(arg!(--ytd "Year to date").action(ArgAction::SetTrue))
        .arg(
            arg!(--prefix "Treat account patterns as literal prefixes instead of regexes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(--"debug-cashflows" "Print the cashflows used for the calculation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(--"debug-inflows" "Print accounts money came from")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(--"debug-outflows" "Print accounts money went to")
                .action(ArgAction::SetTrue),
        )
        .arg(arg!(--json "Print the result as JSON").action(ArgAction::SetTrue));

    let mut shortcuts = vec!["year", "ytd"];
    for (flag, years) in TRAILING_WINDOWS {
        cmd = cmd.arg(
            Arg::new(flag)
                .long(flag)
                .action(ArgAction::SetTrue)
                .help(format!("Trailing {} year(s) ending today", years)),
        );
        shortcuts.push(flag);
    }
    cmd.group(ArgGroup::new("shortcut").args(shortcuts).multiple(false))
}

pub fn build_cli() -> Command {
    Command::new("returnclip")
        .about("Money-weighted investment returns over a double-entry ledger")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(arg!(--db <PATH> "Ledger database path (default: platform data dir)").global(true))
        .arg(
            arg!(-v --verbose "Log classification details to stderr")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("init").about("Create the ledger database"))
        .subcommand(
            Command::new("config")
                .about("Settings")
                .subcommand(
                    Command::new("set-currency")
                        .about("Set the base currency")
                        .arg(arg!(<CURRENCY>).id("currency")),
                )
                .subcommand(Command::new("show").about("Show settings")),
        )
        .subcommand(
            Command::new("import")
                .about("Import ledger data from CSV")
                .subcommand(
                    Command::new("transactions")
                        .about("CSV: txn,date,narration,account,units,currency,cost,cost_currency,price,price_currency")
                        .arg(arg!(--path <CSV>).required(true)),
                )
                .subcommand(
                    Command::new("prices")
                        .about("CSV: date,base,quote,rate")
                        .arg(arg!(--path <CSV>).required(true)),
                ),
        )
        .subcommand(
            Command::new("price")
                .about("Historical prices and rates")
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--date <DATE>).required(true))
                        .arg(arg!(--base <BASE>).required(true))
                        .arg(arg!(--quote <QUOTE>).required(true))
                        .arg(arg!(--rate <RATE>).required(true)),
                )
                .subcommand(json_flags(
                    Command::new("list").arg(arg!(--base <BASE> "Only this commodity")),
                ))
                .subcommand(
                    Command::new("convert")
                        .arg(arg!(--date <DATE>).required(true))
                        .arg(arg!(--amount <AMOUNT>).required(true))
                        .arg(arg!(--from <CCY>).required(true))
                        .arg(arg!(--to <CCY>).required(true)),
                ),
        )
        .subcommand(
            Command::new("tx").about("Ledger transactions").subcommand(json_flags(
                Command::new("list")
                    .arg(arg!(--account <PREFIX> "Only transactions touching this account prefix"))
                    .arg(arg!(--limit <N>).value_parser(value_parser!(usize))),
            )),
        )
        .subcommand(returns_cmd())
        .subcommand(
            Command::new("doctor").about("Check the ledger for unbalanced or unpriced entries"),
        )
}
