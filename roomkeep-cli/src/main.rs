use clap::Parser;
use std::io::{stdout, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use roomkeep_common::models::{Config, ConfigPatch};
use roomkeep_core::eventbus::LifecycleEvent;
use roomkeep_core::LifecycleContext;

mod commands;
mod simulated;

use simulated::SimulatedClient;

#[derive(Parser, Debug, Clone)]
#[command(name = "roomkeep")]
#[command(author, version, about = "Roomkeep - idle-time cleanup for a long-running chat client")]
struct Args {
    /// Disable cleanup entirely
    #[arg(long, default_value = "false")]
    disabled: bool,

    /// Inactivity threshold in milliseconds
    #[arg(long)]
    inactive_time_ms: Option<u64>,

    /// Interval between cleanup passes in milliseconds
    #[arg(long)]
    refresh_interval_ms: Option<u64>,

    /// Do not capture/restore the open room's view around a pass
    #[arg(long, default_value = "false")]
    no_preserve: bool,

    /// Room to open at startup
    #[arg(long)]
    room: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigPatch {
        ConfigPatch {
            enabled: self.disabled.then_some(false),
            inactive_time_ms: self.inactive_time_ms,
            refresh_interval_ms: self.refresh_interval_ms,
            preserve_current_room: self.no_preserve.then_some(false),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("roomkeep=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let config = Config::from_env()?.merged(&args.overrides());
    info!("Roomkeep starting with {:?}", config);

    if let Err(e) = run(config, args).await {
        error!("Roomkeep error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run(config: Config, args: Args) -> anyhow::Result<()> {
    let client = SimulatedClient::new();
    if let Some(room) = &args.room {
        client.open(room);
    }

    let ctx = LifecycleContext::start(config, client.collaborators())?;

    let mut events = ctx.event_bus().subscribe(None).await;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event {
                LifecycleEvent::PreserveRoom(snap) | LifecycleEvent::RestoreRoom(snap) => {
                    println!("[{}] {} (scroll {})", event.event_type(), snap.room_id, snap.scroll_offset)
                }
                _ => println!("[{}]", event.event_type()),
            }
        }
    });

    println!("Roomkeep demo. Type 'help' for available commands.\n");
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("roomkeep> ");
        stdout().flush()?;

        let line = match reader.next_line().await? {
            Some(line) => line.trim().to_string(),
            None => break,
        };
        if line.is_empty() {
            continue;
        }

        let (quit_requested, output) = commands::dispatch(&line, &ctx, &client).await;
        if let Some(msg) = output {
            println!("{}", msg);
        }
        if quit_requested {
            break;
        }
    }

    ctx.shutdown().await;
    drop(ctx);
    printer.abort();
    Ok(())
}
