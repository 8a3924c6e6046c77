//! Console output for a running session

use colored::Colorize;
use provflow_cloud::{
    ConnectionInfo, ConnectionSettings, ErrorKind, NextAction, SessionEvent, SessionObserver,
    display_value,
};

/// Prints attempt progress for the operator
pub struct ConsoleObserver {
    connection: ConnectionSettings,
}

impl ConsoleObserver {
    pub fn new(connection: ConnectionSettings) -> Self {
        Self { connection }
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::AttemptStarted { attempt, backend } => {
                println!();
                println!(
                    "{} {}",
                    format!("▶ Attempt #{}", attempt).cyan().bold(),
                    format!("({})", backend).dimmed()
                );
            }
            SessionEvent::AttemptFailed {
                kind,
                message,
                next,
                unknown_streak,
                ..
            } => {
                match next {
                    NextAction::FatalStop => {
                        println!("  {} {}", "✗".red().bold(), kind.to_string().red().bold());
                    }
                    NextAction::RetryAfter(_) if *kind == ErrorKind::Unknown => {
                        println!(
                            "  {} {} {}",
                            "?".yellow().bold(),
                            "unrecognized failure".yellow().bold(),
                            format!("({} in a row)", unknown_streak).dimmed()
                        );
                    }
                    NextAction::RetryAfter(_) => {
                        println!("  {} {}", "✗".yellow(), kind.to_string().yellow());
                    }
                }
                println!("  reason: {}", message);
                match next {
                    NextAction::FatalStop => {
                        println!("  {}", "Fix the configuration and run again.".red());
                    }
                    NextAction::RetryAfter(_) => println!("  next:   {}", next),
                }
            }
            SessionEvent::Succeeded { attempt, outputs } => {
                println!(
                    "{}",
                    format!("✓ Provisioned on attempt #{}", attempt).green().bold()
                );
                if !outputs.is_empty() {
                    println!();
                    println!("Outputs:");
                    for (name, value) in outputs {
                        println!("  {} = {}", name.cyan(), display_value(value));
                    }
                }
                if let Some(info) = ConnectionInfo::from_outputs(outputs, &self.connection) {
                    println!();
                    println!("Public address: {}", info.address.green().bold());
                    println!("Connect with:   {}", info.command.cyan());
                }
            }
            SessionEvent::Canceled { attempts } => {
                println!();
                println!(
                    "{}",
                    format!("Canceled after {} attempt(s).", attempts).yellow()
                );
            }
        }
    }
}
