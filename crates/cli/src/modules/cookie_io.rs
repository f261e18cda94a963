// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session cookie import/export.
//!
//! Export hands the session to a browser (JSON or a console snippet);
//! import takes cookies pasted from a browser and validates them with one
//! probe request before accepting.

use super::{ModuleCtx, ModuleFuture};

pub fn run(ctx: ModuleCtx) -> ModuleFuture {
    Box::pin(async move {
        loop {
            let choice = ctx.prompter.read_choice(
                "\n  Cookie Import/Export\n\
                 \x20 (1) Export session cookies as JSON\n\
                 \x20 (2) Export browser console snippet\n\
                 \x20 (3) Import cookies\n\
                 \x20 (0) Back\n  Select: ",
                0,
                3,
            );
            match choice {
                0 => return Ok(()),
                1 => {
                    println!("\n{}\n", ctx.session.export_cookies());
                }
                2 => {
                    println!("\n  Paste this in the browser console on the game page:\n");
                    println!("  {}\n", ctx.session.export_cookie_script());
                }
                3 => {
                    let input = ctx
                        .prompter
                        .read_line("  Paste a cookie JSON object or a raw session cookie: ");
                    if input.is_empty() {
                        continue;
                    }
                    match ctx.session.import_cookies(&input).await {
                        Ok(true) => println!("  Cookies imported and validated."),
                        Ok(false) => println!("  Those cookies are expired or invalid."),
                        Err(e) => println!("  Import failed: {e}"),
                    }
                }
                _ => {}
            }
        }
    })
}
