use anyhow::Context;
use colored::Colorize;
use provflow_cloud::ErrorClassifier;
use provflow_config::Settings;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

pub fn handle(file: Option<&Path>, config: Option<&Path>) -> anyhow::Result<ExitCode> {
    let raw_output = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("could not read stdin")?;
            buf
        }
    };

    let classifier = match config {
        Some(path) => {
            let (settings, _) = Settings::load(Some(path))?;
            crate::backend::classifier(&settings)
        }
        None => ErrorClassifier::new(),
    };

    let classification = classifier.classify(&raw_output);
    let kind = classification.kind;

    let (kind_label, verdict) = if kind.is_fatal() {
        (kind.to_string().red().bold(), "no (fatal)".red())
    } else {
        (kind.to_string().yellow().bold(), "yes".green())
    };

    println!("kind:      {}", kind_label);
    println!("retryable: {}", verdict);
    println!("message:   {}", classification.message);

    Ok(ExitCode::SUCCESS)
}
