use std::error::Error;

use pubsink_core::Settings;
use tracing::{error, info};

mod cmdline;
mod demo;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = cmdline::root_cli().get_matches();
    let settings = Settings::load()?;
    info!(?settings, "Loaded settings");

    match matches.subcommand() {
        Some((cmdline::BASIC, args)) => {
            let url = args.get_one::<String>("url").ok_or("missing --url")?;
            let count = args.get_one::<usize>("count").copied().unwrap_or(3);
            demo::run_basic(settings, url, count).await
        }
        Some((cmdline::EMULATOR, args)) => {
            let project_id = args
                .get_one::<String>("project-id")
                .ok_or("missing --project-id")?;
            let topic = args.get_one::<String>("topic").ok_or("missing --topic")?;
            demo::run_emulator(settings, project_id, topic).await
        }
        _ => Err("unknown subcommand".into()),
    }
}
