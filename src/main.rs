use clap::Parser;
use sparplan::api::{Cli, run_command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run_command(cli.command).await {
        Ok(json) if json.is_empty() => {}
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
