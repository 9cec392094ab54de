// roomkeep-cli/src/commands.rs

use std::sync::Arc;

use roomkeep_common::models::{ConfigPatch, MessageFilter};
use roomkeep_core::activity::ActivitySignal;
use roomkeep_core::LifecycleContext;

use crate::simulated::SimulatedClient;

pub const HELP: &str = "\
Commands:
  activity [pointer|key|scroll|touch|focus|blur|show|hide]
  open <room>         open a room (makes its stream live)
  close               close the open room
  scroll <offset>     move the open room's scroll position
  messages <room> [system] [threads]
  ring                queue an unacknowledged call notification
  config key=value..  enabled, inactiveTimeMs, refreshIntervalMs, preserveCurrentRoom
  status | stats | report
  cleanup             run a cleanup pass now
  quit";

/// Runs one command line. Returns `(quit_requested, output)`.
pub async fn dispatch(
    line: &str,
    ctx: &LifecycleContext,
    client: &Arc<SimulatedClient>,
) -> (bool, Option<String>) {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return (false, None);
    };
    let args: Vec<&str> = parts.collect();

    // Every typed command is user input.
    if cmd != "activity" {
        ctx.record_activity(ActivitySignal::Key);
    }

    let output = match cmd {
        "help" => HELP.to_string(),
        "quit" | "exit" => return (true, None),
        "activity" => match parse_signal(args.first().copied().unwrap_or("pointer")) {
            Some(signal) => {
                ctx.record_activity(signal);
                format!("recorded {:?}", signal)
            }
            None => "unknown signal".to_string(),
        },
        "open" => match args.first() {
            Some(room) => {
                client.open(room);
                format!("opened {}", room)
            }
            None => "usage: open <room>".to_string(),
        },
        "close" => {
            client.close();
            "closed".to_string()
        }
        "scroll" => match args.first().and_then(|s| s.parse::<f64>().ok()) {
            Some(offset) => match client.scroll_to(offset) {
                Some(room) => format!("{} scrolled to {}", room, offset),
                None => "no room open".to_string(),
            },
            None => "usage: scroll <offset>".to_string(),
        },
        "messages" => match args.first() {
            Some(room) => {
                let filter = MessageFilter {
                    show_system: args.contains(&"system"),
                    show_threads: args.contains(&"threads"),
                    limit: 10,
                    ..Default::default()
                };
                match ctx.reader().messages(room, &filter).await {
                    Ok(list) => list
                        .iter()
                        .map(|m| format!("[{}] {}: {}", m.kind, m.author, m.text))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    Err(e) => format!("error: {}", e),
                }
            }
            None => "usage: messages <room> [system] [threads]".to_string(),
        },
        "ring" => {
            client.ring();
            "call queued".to_string()
        }
        "config" => match parse_patch(&args) {
            Ok(patch) if patch.is_empty() => to_json(&ctx.config()),
            Ok(patch) => match ctx.update_config(&patch).await {
                Ok(update) => to_json(&update.current),
                Err(e) => format!("error: {}", e),
            },
            Err(e) => format!("error: {}", e),
        },
        "status" => to_json(&ctx.status()),
        "stats" => to_json(&ctx.cache_stats()),
        "report" => match ctx.last_report() {
            Some(report) => to_json(&report),
            None => "no cleanup pass has run yet".to_string(),
        },
        "cleanup" => match ctx.run_cleanup_now().await {
            Ok(report) => to_json(&report),
            Err(e) => format!("error: {}", e),
        },
        other => format!("unknown command '{}'; type 'help'", other),
    };
    (false, Some(output))
}

fn parse_signal(name: &str) -> Option<ActivitySignal> {
    match name {
        "pointer" | "mouse" => Some(ActivitySignal::Pointer),
        "key" => Some(ActivitySignal::Key),
        "scroll" => Some(ActivitySignal::Scroll),
        "touch" => Some(ActivitySignal::Touch),
        "focus" => Some(ActivitySignal::FocusGained),
        "blur" => Some(ActivitySignal::FocusLost),
        "show" => Some(ActivitySignal::Visible),
        "hide" => Some(ActivitySignal::Hidden),
        _ => None,
    }
}

fn parse_patch(args: &[&str]) -> anyhow::Result<ConfigPatch> {
    let mut patch = ConfigPatch::default();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{}'", arg))?;
        match key {
            "enabled" => patch.enabled = Some(value.parse()?),
            "inactiveTimeMs" => patch.inactive_time_ms = Some(value.parse()?),
            "refreshIntervalMs" => patch.refresh_interval_ms = Some(value.parse()?),
            "preserveCurrentRoom" => patch.preserve_current_room = Some(value.parse()?),
            other => anyhow::bail!("unknown config key '{}'", other),
        }
    }
    Ok(patch)
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("error: {}", e))
}
