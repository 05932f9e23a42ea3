//! Sends a pre-built message read from stdin
//!
//! ```text
//! cargo run --example inject_raw -- localhost:25 < message.eml
//! ```

use std::{env, io, process::ExitCode};

use courier::{deliver_raw, Context};

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let relay = env::args().nth(1).unwrap_or_else(|| "localhost:25".to_owned());
    match deliver_raw(&Context::background(), io::stdin().lock(), &relay) {
        Ok(response) => {
            println!("Email sent: {}", response.code());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Could not send email: {e}");
            ExitCode::FAILURE
        }
    }
}
