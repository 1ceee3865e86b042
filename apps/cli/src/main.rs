mod command;
mod config;
mod main_lib;

use command::{Command, USAGE};
use config::Config;
use main_lib::{execute, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args).inspect_err(|_| eprintln!("{}", USAGE))?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let output = execute(&command, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
