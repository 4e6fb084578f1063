use std::io;

use alloy_primitives::U256;
use jit::logging::{self, status_label, verdict_label};
use jit::{BridgeConfig, EnvSnapshot, build_probe_module, run_probe};
use jit_abi::{LayoutManifest, ReturnCode};
use tracing::info;

const DEFAULT_GAS: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Layout,
    Probe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliConfig {
    command: Command,
    json: bool,
    check_path: Option<String>,
    env_path: Option<String>,
    config_path: Option<String>,
    gas: U256,
    dump_ir: bool,
    help: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            command: Command::Layout,
            json: false,
            check_path: None,
            env_path: None,
            config_path: None,
            gas: U256::from(DEFAULT_GAS),
            dump_ir: false,
            help: false,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli_args(&args).map_err(io::Error::other)?;
    if cli.help {
        print_usage();
        return Ok(());
    }
    logging::init()?;

    match cli.command {
        Command::Layout => run_layout(&cli),
        Command::Probe => run_probe_command(&cli),
    }
}

fn run_layout(cli: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = LayoutManifest::current();
    if let Some(path) = cli.check_path.as_ref() {
        let text = std::fs::read_to_string(path)?;
        let theirs: LayoutManifest = serde_json::from_str(&text)?;
        let mismatches = manifest.mismatches(&theirs);
        if mismatches.is_empty() {
            println!("{}: {path} matches abi v{}", verdict_label(true), manifest.abi_version);
            return Ok(());
        }
        for mismatch in &mismatches {
            println!("{}: {mismatch}", verdict_label(false));
        }
        return Err(io::Error::other(format!(
            "{} layout mismatches against {path}",
            mismatches.len()
        ))
        .into());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }
    println!(
        "runtime block: abi v{}, {} bytes (word {}, pointer {})",
        manifest.abi_version, manifest.total_size, manifest.word_size, manifest.pointer_size
    );
    for (index, slot) in manifest.slots.iter().enumerate() {
        println!(
            "  {index:>2}  {:<18} {:<7} offset {:>4}  size {:>2}",
            slot.name,
            format!("{:?}", slot.kind).to_lowercase(),
            slot.offset,
            slot.size
        );
    }
    Ok(())
}

fn run_probe_command(cli: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env = match cli.env_path.as_ref() {
        Some(path) => EnvSnapshot::load(path)?,
        None => EnvSnapshot::default(),
    };
    let config = match cli.config_path.as_ref() {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if cli.dump_ir {
        print!("{}", build_probe_module().dump());
        return Ok(());
    }

    let report = run_probe(&env, cli.gas, &config)?;
    info!(status = %report.status, gas_left = %report.gas_left, "probe finished");
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let stop = status_label(ReturnCode::Stop);
        println!("status: {} (expected {stop})", report.status);
        for entry in &report.entries {
            println!(
                "  {:<8} {:<28} host {:<12} generated {}",
                verdict_label(entry.matches()),
                entry.probe,
                format_word(entry.expected),
                format_word(entry.observed)
            );
        }
    }
    if !report.is_consistent() {
        return Err(io::Error::other("generated code disagrees with the host runtime").into());
    }
    Ok(())
}

fn format_word(word: Option<U256>) -> String {
    match word {
        Some(word) => format!("{word:#x}"),
        None => "-".to_string(),
    }
}

fn parse_cli_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig::default();
    let mut index = 0usize;

    match args.first().map(String::as_str) {
        Some("layout") => index = 1,
        Some("probe") => {
            cfg.command = Command::Probe;
            index = 1;
        }
        _ => {}
    }

    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cfg.help = true;
                index += 1;
            }
            "--json" => {
                cfg.json = true;
                index += 1;
            }
            "--dump-ir" if cfg.command == Command::Probe => {
                cfg.dump_ir = true;
                index += 1;
            }
            "--check" if cfg.command == Command::Layout => {
                let path = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --check".to_string())?;
                cfg.check_path = Some(path.clone());
                index += 2;
            }
            "--env" if cfg.command == Command::Probe => {
                let path = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --env".to_string())?;
                cfg.env_path = Some(path.clone());
                index += 2;
            }
            "--config" if cfg.command == Command::Probe => {
                let path = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --config".to_string())?;
                cfg.config_path = Some(path.clone());
                index += 2;
            }
            "--gas" if cfg.command == Command::Probe => {
                let raw = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --gas".to_string())?;
                cfg.gas = raw
                    .parse::<U256>()
                    .map_err(|_| format!("invalid --gas value '{raw}'"))?;
                index += 2;
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }
    Ok(cfg)
}

fn print_usage() {
    println!("Usage:");
    println!("  evmjit-probe                              (same as `layout`)");
    println!("  evmjit-probe layout [--json]");
    println!("  evmjit-probe layout --check <manifest.json>");
    println!("  evmjit-probe probe [--env <env.json>] [--gas <n>] [--config <config.json>] [--json]");
    println!("  evmjit-probe probe --dump-ir");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn defaults_to_layout() {
        let cfg = parse_cli_args(&[]).expect("empty args should parse");
        assert_eq!(cfg.command, Command::Layout);
        assert!(!cfg.json);
    }

    #[test]
    fn probe_flags() {
        let cfg = parse_cli_args(&args(&["probe", "--gas", "0x5208", "--env", "env.json", "--json"]))
            .expect("probe args should parse");
        assert_eq!(cfg.command, Command::Probe);
        assert_eq!(cfg.gas, U256::from(21_000u64));
        assert_eq!(cfg.env_path.as_deref(), Some("env.json"));
        assert!(cfg.json);
    }

    #[test]
    fn flags_are_scoped_to_their_command() {
        assert!(parse_cli_args(&args(&["layout", "--gas", "1"])).is_err());
        assert!(parse_cli_args(&args(&["probe", "--check", "x.json"])).is_err());
        assert!(parse_cli_args(&args(&["probe", "--gas"])).is_err());
    }
}
