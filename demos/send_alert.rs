//! Renders the template named in a configuration file and sends it
//!
//! ```text
//! cargo run --example send_alert -- alerts.yml '{"Status":"firing"}'
//! ```

use std::{env, process::ExitCode, time::Duration};

use courier::{Context, EmailConfig};

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let Some(config_path) = args.next() else {
        eprintln!("usage: send_alert <config.yml> [json data]");
        return ExitCode::FAILURE;
    };
    let data: serde_json::Value = match args.next().map(|raw| serde_json::from_str(&raw)) {
        Some(Ok(data)) => data,
        Some(Err(e)) => {
            eprintln!("invalid data: {e}");
            return ExitCode::FAILURE;
        }
        None => serde_json::Value::Null,
    };

    let config = match EmailConfig::load_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let ctx = Context::with_timeout(Duration::from_secs(30));
    match courier::send(&ctx, &config, &data) {
        Ok(response) => {
            println!("Email sent: {}", response.message().collect::<Vec<_>>().join(" "));
            ExitCode::SUCCESS
        }
        Err(e) if e.is_retryable() => {
            eprintln!("Could not send email, retry later: {e}");
            ExitCode::from(75)
        }
        Err(e) => {
            eprintln!("Could not send email: {e}");
            ExitCode::FAILURE
        }
    }
}
