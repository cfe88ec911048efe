//! `mythos repl` - the interactive loop.
//!
//! A line that parses as an expression prints its value; anything else
//! runs as statements. Globals persist for the life of the session.
//! Errors are reported and the loop continues.

use std::io::{self, BufRead, Write};

use mythos_drv::{Config, Session, SessionError};

pub fn execute() -> Result<(), SessionError> {
    let mut session = Session::new(Config::default());

    println!("mythos {} - :quit to exit", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == ":quit" || trimmed == ":q" {
            break;
        }

        match session.eval_line(&line) {
            Ok(Some(value)) => println!("{}", value.display()),
            Ok(None) => {}
            Err(err) => eprintln!("error: {}", err),
        }
    }
    Ok(())
}
