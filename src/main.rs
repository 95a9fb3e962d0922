use clap::Parser;

use sprintboard::cli::Cli;
use sprintboard::cmd;
use sprintboard::config::Config;
use sprintboard::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format);
    let config = Config::resolve(cli.db, cli.team, cli.log_format);
    tracing::debug!(db = %config.db_path.display(), team = ?config.team, "resolved config");

    if let Err(e) = cmd::run(cli.command, &config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
