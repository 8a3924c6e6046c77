use super::{EXIT_CANCELED, EXIT_ERROR, EXIT_FATAL};
use crate::ApplyArgs;
use crate::observer::ConsoleObserver;
use anyhow::Context;
use colored::Colorize;
use provflow_cloud::{
    CancellationToken, FatalReason, RetryController, RetryPolicy, RetrySession, TerminalOutcome,
};
use provflow_config::Settings;
use std::path::Path;
use std::process::ExitCode;

pub async fn handle(args: ApplyArgs) -> anyhow::Result<ExitCode> {
    let (mut settings, source) = Settings::load(args.config.as_deref())?;
    match source {
        Some(path) => tracing::info!("Using settings from {}", path.display()),
        None => tracing::info!("No settings file found, using defaults"),
    }
    apply_overrides(&mut settings, &args);
    settings.validate()?;

    let backend = crate::backend::build(&settings)?;
    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let mut controller = RetryController::new(backend)
        .with_classifier(crate::backend::classifier(&settings))
        .with_policy(RetryPolicy::new(settings.retry_interval()))
        .with_cancellation(cancel)
        .with_observer(ConsoleObserver::new(
            crate::backend::connection_settings(&settings),
        ));

    println!(
        "{} {} back-end, {}s between attempts",
        "Provisioning with the".blue(),
        settings.backend.to_string().cyan(),
        settings.retry.interval_secs
    );

    if let Err(e) = controller.prepare().await {
        eprintln!("{} {}", "Preparation failed:".red().bold(), e);
        return Ok(ExitCode::from(EXIT_ERROR));
    }

    let outcome = controller.run().await;

    if let Some(ref path) = args.report
        && let Err(e) = write_report(controller.session(), path)
    {
        tracing::warn!("Could not write session report: {:#}", e);
    }

    Ok(ExitCode::from(exit_status(&outcome)))
}

fn apply_overrides(settings: &mut Settings, args: &ApplyArgs) {
    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if let Some(interval) = args.interval {
        settings.retry.interval_secs = interval;
    }
    if let Some(ref dir) = args.config_dir {
        settings.terraform.config_dir = dir.clone();
    }
    if let Some(ref stack_id) = args.stack_id {
        settings.job_api.stack_id = Some(stack_id.clone());
    }
}

fn exit_status(outcome: &TerminalOutcome) -> u8 {
    match outcome {
        TerminalOutcome::Succeeded { .. } => 0,
        TerminalOutcome::Fatal(FatalReason::Canceled) => EXIT_CANCELED,
        TerminalOutcome::Fatal(FatalReason::Classified { .. }) => EXIT_FATAL,
    }
}

fn write_report(session: &RetrySession, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Session report written to {}", path.display());
    Ok(())
}

/// Cancel on the first Ctrl-C or SIGTERM; exit on the second
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        println!();
        println!(
            "{}",
            "Stopping after the current attempt (Ctrl-C again to abort now)".yellow()
        );
        cancel.cancel();

        wait_for_shutdown().await;
        std::process::exit(i32::from(EXIT_CANCELED));
    });
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Could not listen for SIGTERM: {}", e);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
