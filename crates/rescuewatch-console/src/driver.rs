//! Event loop: transport events, timer deadlines, operator input and
//! shutdown signals all funnel into one `Console` on one task.

use std::time::Duration;

use chrono::Utc;
use rescuewatch_core::{Console, ConsoleConfig, ConsoleError, OperatorAction, PinHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::{self, Command};
use crate::terminal::{self, TerminalMap, TerminalSurface};
use crate::transport::{self, TransportEvent};

type Session = Console<TerminalMap, TerminalSurface>;

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Sleep until `deadline_ms`, or forever when nothing is scheduled.
async fn sleep_until(deadline_ms: Option<u64>) {
    match deadline_ms {
        Some(deadline) => {
            let wait = deadline.saturating_sub(now_ms());
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                ctrl_c.await.ok();
                tracing::info!("received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c, shutting down");
    }
}

pub async fn run(config: ConsoleConfig) -> anyhow::Result<()> {
    let endpoint = config.endpoint.clone();
    let mut console: Session = Console::new(config, TerminalMap::default(), TerminalSurface);
    let cancel = CancellationToken::new();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<TransportEvent>();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    console.start();
    println!("type `help` for commands");

    loop {
        if let Some(attempt) = console.take_dial() {
            transport::dial(endpoint.clone(), attempt, events_tx.clone(), &cancel);
        }

        tokio::select! {
            () = &mut shutdown => break,
            Some(event) = events_rx.recv() => handle_transport(&mut console, event),
            () = sleep_until(console.next_deadline()) => console.fire_timers(now_ms()),
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_line(&mut console, &line) {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed; commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed; commands disabled");
                    stdin_open = false;
                }
            },
        }
    }

    console.shutdown();
    cancel.cancel();
    Ok(())
}

fn handle_transport(console: &mut Session, event: TransportEvent) {
    let now = now_ms();
    match event {
        TransportEvent::Opened { attempt, link } => {
            console.transport_opened(attempt, Box::new(link), now);
        }
        TransportEvent::Text { attempt, text } => {
            if console.connection().current_attempt() == Some(attempt) {
                console.handle_text(&text, now);
            } else {
                tracing::debug!(%attempt, "dropping frame from superseded connection");
            }
        }
        TransportEvent::Closed { attempt, reason } => {
            tracing::info!(%attempt, %reason, "transport closed");
            console.transport_closed(attempt, now);
        }
    }
}

/// Run one operator command. Returns `false` when the operator quits.
fn handle_line(console: &mut Session, line: &str) -> bool {
    let command = match commands::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            println!("{}", e.to_string().trim_end());
            return true;
        }
    };
    let now = now_ms();
    match command {
        Command::List => {
            let mut shown = 0;
            for event in console.filtered() {
                println!("{}", terminal::format_row(event));
                shown += 1;
            }
            if shown == 0 {
                println!("(no events)");
            }
        }
        Command::Filter(args) => {
            if let Some(criterion) = args.criterion() {
                console.set_filter(criterion);
            }
        }
        Command::Select { id } => report(console.select(&id)),
        Command::Pin { n } => report(console.activate_marker(PinHandle(n))),
        Command::Deselect => console.clear_selection(),
        Command::Confirm => respond(console, OperatorAction::Confirm, now),
        Command::Reject => respond(console, OperatorAction::Reject, now),
        Command::Retry => console.manual_reconnect(now),
        Command::Clear => {
            let dropped = console.clear_history();
            println!("cleared {dropped} events");
        }
        Command::Stats => {
            let stats = console.stats();
            println!("events: {}", stats.total);
            for (kind, n) in &stats.by_kind {
                println!("  {:<8} {n}", kind.as_str());
            }
            for (priority, n) in &stats.by_priority {
                println!("  {:<8} {n}", priority.as_str());
            }
            println!("  with fire {}, with water {}", stats.with_fire, stats.with_water);
            // Failure is already surfaced as a toast.
            let _ = console.request_relay_stats(now);
        }
        Command::Status => println!("{}", terminal::format_status(&console.status())),
        Command::Help => print!("{}", commands::help()),
        Command::Quit => return false,
    }
    true
}

fn respond(console: &mut Session, action: OperatorAction, now: u64) {
    // Other failures are already shown as toasts.
    if let Err(ConsoleError::NoSelection) = console.respond(action, now) {
        println!("select an event first");
    }
}

fn report(result: Result<(), ConsoleError>) {
    if let Err(e) = result {
        println!("{e}");
    }
}
