/// prload - constant-arrival-rate load generator for the review service.
use clap::Parser;
use prload::cli::Cli;
use prload::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    if let Err(e) = cli.run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
