use std::sync::OnceLock;

use jit_abi::ReturnCode;
use owo_colors::OwoColorize;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = ansi_enabled();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

pub fn status_label(status: ReturnCode) -> String {
    let text = status.to_string();
    if !ansi_enabled() {
        return text;
    }
    if status.is_success() {
        format!("{}", text.bright_green())
    } else {
        format!("{}", text.bright_red())
    }
}

pub fn verdict_label(ok: bool) -> String {
    let text = if ok { "ok" } else { "MISMATCH" };
    if !ansi_enabled() {
        return text.to_string();
    }
    if ok {
        format!("{}", text.green())
    } else {
        format!("{}", text.bright_red().bold())
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    supports_color::on_cached(Stream::Stdout).is_some()
}
