//! Daemon: reminder loop plus the console command adapter.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use bosswatch_agent::{AgentError, TimerController, format, reminder_sink};
use bosswatch_core::{BotConfig, EntityCatalog, Scope, TimerStore};
use bosswatch_scheduler::ReminderScheduler;

use crate::console::{self, Command, ConsoleTransport};

pub async fn run(data_dir: &Path, config_path: &Path, catalog_path: &Path) -> Result<()> {
    let config = BotConfig::load(config_path);
    let catalog = EntityCatalog::load(catalog_path);
    if catalog.is_empty() {
        warn!("entity catalog is empty, no aliases will resolve");
    }

    std::fs::create_dir_all(data_dir).into_diagnostic()?;
    let store = TimerStore::load(&data_dir.join("timers.json"), config.tz());

    let controller = Arc::new(TimerController::new(
        catalog,
        config,
        store,
        ReminderScheduler::new(),
    ));

    let outcome = controller.restore(Utc::now()).await;
    info!(
        restored = outcome.timers_restored,
        pruned = outcome.pruned,
        "daemon starting"
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown signals
    let shutdown_tx_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx_signal.send(true);
    });

    let sink = reminder_sink(Arc::clone(&controller), Arc::new(ConsoleTransport));
    let scheduler = controller.scheduler().clone();
    let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx, sink).await });

    console_loop(Arc::clone(&controller), shutdown_tx).await;

    scheduler_handle.await.into_diagnostic()?;
    controller.save().await;
    info!("daemon shut down");
    Ok(())
}

/// Read commands from stdin until shutdown or EOF.
async fn console_loop(controller: Arc<TimerController>, shutdown_tx: watch::Sender<bool>) {
    // The console acts as one group scope, so group semantics (visibility,
    // filters, reset privilege) apply to it like any other group.
    let scope = Scope::Group {
        group_id: "console".to_string(),
    };
    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed");
                let _ = shutdown_tx.send(true);
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                let _ = shutdown_tx.send(true);
                break;
            }
        };

        let Some(command) = console::parse(&line) else {
            if !line.trim().is_empty() {
                println!("unrecognized command");
            }
            continue;
        };

        if command == Command::Quit {
            let _ = shutdown_tx.send(true);
            break;
        }
        let reply = execute(&controller, &scope, command).await;
        println!("{}", reply);
    }
}

async fn execute(controller: &TimerController, scope: &Scope, command: Command) -> String {
    let tz = controller.tz();
    let secondary = controller.config().secondary_tz();
    let now = Utc::now();

    match command {
        Command::Death {
            alias,
            time,
            suffixed,
        } => {
            let mut result = controller.record_death(scope, &alias, &time, now).await;
            // Suffixed form precedence: the whole token (which may itself end
            // in 'd') is tried as an alias first, then with the death marker
            // stripped.
            if suffixed
                && matches!(result, Err(AgentError::UnknownEntity(_)))
                && let Some(stripped) = alias.strip_suffix(['d', 'D'])
                && !stripped.is_empty()
            {
                result = controller.record_death(scope, stripped, &time, now).await;
            }
            match result {
                Ok(timer) => format::spawn_recorded(
                    &controller.catalog().display(&timer.entity_id),
                    timer.spawn_time,
                    tz,
                    secondary,
                ),
                Err(e) => describe(e),
            }
        }
        Command::Add { alias, time } => {
            match controller.add_manual(scope, &alias, &time, now).await {
                Ok(timer) => format::timer_added(
                    &controller.catalog().display(&timer.entity_id),
                    timer.spawn_time,
                    tz,
                    secondary,
                ),
                Err(e) => describe(e),
            }
        }
        Command::List => {
            let timers = controller.list_visible(scope, now).await;
            format::timer_list(&timers, controller.catalog(), tz, secondary)
        }
        Command::Cancel { alias } => match controller.cancel(scope, &alias).await {
            Ok(0) => "No timer to cancel".to_string(),
            Ok(_) => format!("Cancelled timer for {}", alias),
            Err(e) => describe(e),
        },
        Command::Reset => {
            // The console is the operator's seat, so it carries the group
            // admin privilege.
            match controller.reset(scope, true).await {
                Ok(outcome) => format!("Cleared {} timers", outcome.timers_cleared),
                Err(e) => describe(e),
            }
        }
        Command::Quit => unreachable!("handled by the caller"),
    }
}

fn describe(e: AgentError) -> String {
    match e {
        AgentError::UnknownEntity(alias) => format!("Unknown boss: {}", alias),
        AgentError::InvalidTime(e) => format!("Could not parse time: {}", e),
        AgentError::NotFuture => "Spawn time must be in the future".to_string(),
        AgentError::ScopeDisabled => "This chat is not enabled for timers".to_string(),
        AgentError::EntityFiltered => "That boss is not tracked in this group".to_string(),
        AgentError::NotPrivileged => "Reset requires admin privileges".to_string(),
    }
}
