mod check;

use chrono::Utc;
use clap::Parser;
use clap::error::ErrorKind;
use sniffwave_common::nagios::{Severity, Verdict};
use tracing_subscriber::EnvFilter;

use check::CheckArgs;

/// Stdout belongs to the plugin output, so logs go to stderr.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match CheckArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let reason = e.to_string();
            let first_line = reason.lines().next().unwrap_or("invalid arguments");
            println!("{}", Verdict::unknown(first_line.trim_start_matches("error: ")));
            eprintln!("{}", e);
            std::process::exit(Severity::Unknown.code());
        }
    };

    init_logging(&args.log_level);

    let verdict = check::run(&args, Utc::now()).await;
    println!("{}", verdict);
    std::process::exit(verdict.severity.code());
}
