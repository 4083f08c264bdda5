pub mod clean;
pub mod completions;
pub mod compose_config;
pub mod init_docker;
pub mod logs;
pub mod man_pages;
pub mod mode;
pub mod prebuilt;
pub mod pull;
pub mod restart;
pub mod run;
pub mod shell;
pub mod status;
pub mod stop;
pub mod work_on;

use bentoctl_core::{CoreError, ErrorKind, FanOutReport};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STATE_ERROR: u8 = 3;

/// A command failure with the exit code it maps to.
#[derive(Debug)]
pub struct CommandError {
    pub message: String,
    pub code: u8,
}

impl CommandError {
    pub fn new(message: impl Into<String>, code: u8) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

impl From<CoreError> for CommandError {
    fn from(err: CoreError) -> Self {
        let code = match err.kind() {
            ErrorKind::UnknownService
            | ErrorKind::NoDevVariant
            | ErrorKind::MissingConfiguration
            | ErrorKind::InvalidTarget => EXIT_CONFIG_ERROR,
            ErrorKind::StateCorruption => EXIT_STATE_ERROR,
            ErrorKind::ExternalProcess | ErrorKind::Io => EXIT_FAILURE,
        };
        Self::new(err.to_string(), code)
    }
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        Self::new(message, EXIT_FAILURE)
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::from(format!("JSON serialization failed: {e}")))
}

fn style_or_default(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        style_or_default("{spinner:.cyan} {msg}")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(style_or_default("{msg}"));
    pb.finish_with_message(format!("{} {msg}", ok_mark()));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(style_or_default("{msg}"));
    pb.finish_with_message(format!("{} {msg}", fail_mark()));
}

pub fn ok_mark() -> String {
    Style::new().green().bold().apply_to("✓").to_string()
}

pub fn fail_mark() -> String {
    Style::new().red().bold().apply_to("✗").to_string()
}

pub fn warn_mark() -> String {
    Style::new().yellow().bold().apply_to("⚠").to_string()
}

pub fn colorize_mode(mode: &str) -> String {
    match mode {
        "prebuilt" => Style::new().green().apply_to(mode).to_string(),
        "local" => Style::new().yellow().bold().apply_to(mode).to_string(),
        other => other.to_owned(),
    }
}

pub fn colorize_status(status: &str) -> String {
    match status {
        "running (healthy)" => Style::new().green().apply_to(status).to_string(),
        "running (starting)" => Style::new().cyan().apply_to(status).to_string(),
        "running (unhealthy)" => Style::new().red().bold().apply_to(status).to_string(),
        "not running" | "not found" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Print a fan-out result. Any failed service makes the command exit
/// with `EXIT_FAILURE`, after every service has been reported.
pub fn report_fan_out(report: &FanOutReport, json: bool) -> Result<u8, CommandError> {
    if json {
        println!("{}", json_pretty(report)?);
    } else {
        for service in &report.succeeded {
            println!("{} {} {service}", ok_mark(), report.operation);
        }
        for failure in &report.failed {
            eprintln!(
                "{} {} {}: {} failed: {}",
                fail_mark(),
                report.operation,
                failure.service,
                failure.step,
                failure.error
            );
        }
    }

    if report.is_success() {
        Ok(EXIT_SUCCESS)
    } else {
        Err(CommandError::new(
            format!(
                "{} of {} service(s) failed during {} '{}'",
                report.failed.len(),
                report.failed.len() + report.succeeded.len(),
                report.operation,
                report.target
            ),
            EXIT_FAILURE,
        ))
    }
}

/// Announce a long-running operation unless output is JSON.
pub fn announce(json: bool, msg: &str) {
    if !json {
        eprintln!("{} {msg}", Style::new().cyan().bold().apply_to("→"));
    }
}
