// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::path::PathBuf;

use returnclip::{cli, commands, db, logging};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    logging::init(matches.get_flag("verbose"));

    let db_override = matches.get_one::<String>("db").map(PathBuf::from);
    let mut conn = match &db_override {
        Some(path) => db::open_at(path)?,
        None => db::open_or_init()?,
    };

    match matches.subcommand() {
        Some(("init", _)) => {
            let path = match db_override {
                Some(p) => p,
                None => db::db_path()?,
            };
            println!("Database initialized at {}", path.display());
        }
        Some(("config", sub)) => commands::config::handle(&conn, sub)?,
        Some(("import", sub)) => commands::importer::handle(&mut conn, sub)?,
        Some(("price", sub)) => commands::prices::handle(&conn, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&conn, sub)?,
        Some(("returns", sub)) => commands::returns::handle(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
