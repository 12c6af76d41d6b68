mod debug_report;

use chrono::NaiveDateTime;
use modlore::{Context, ModuleDefinition, Options, process_verbose_with};
use serde_json::json;
use std::io::{self, IsTerminal, Read};

const DEFAULT_REFERENCE: &str = "2023-10-01T00:00:00";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let defs: Vec<ModuleDefinition> = match &config.config_path {
        Some(path) => match load_definitions(path) {
            Ok(defs) => defs,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(2);
            }
        },
        None => Vec::new(),
    };

    let ctx = Context {
        reference_time: config.reference_time,
        content_tags: config.content_tags.clone(),
        default_retain_layers: -1,
    };
    let opts = Options {};
    let chat = json!([{ "mes": config.input, "is_user": false }]);

    match process_verbose_with(&chat, &[], 0, 0, &defs, &ctx, &opts) {
        Ok(res) => debug_report::print_run(&config.input, &res, config.color),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

struct CliConfig {
    input: String,
    reference_time: NaiveDateTime,
    config_path: Option<String>,
    content_tags: Vec<String>,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut reference_time = parse_reference(DEFAULT_REFERENCE)?;
    let mut config_path: Option<String> = None;
    let mut content_tags: Vec<String> = Vec::new();
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("modlore {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--reference" => {
                let value = args.next().ok_or_else(|| "error: --reference expects a value".to_string())?;
                reference_time = parse_reference(&value)?;
            }
            "--config" => {
                let value = args.next().ok_or_else(|| "error: --config expects a path".to_string())?;
                config_path = Some(value);
            }
            "--tag" => {
                let value = args.next().ok_or_else(|| "error: --tag expects a name".to_string())?;
                content_tags.push(value);
            }
            "--input" | "-i" => {
                let value = args.next().ok_or_else(|| "error: --input expects a value".to_string())?;
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value);
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
            other if input.is_none() && !other.starts_with('-') => {
                input = Some(other.to_string());
            }
            other => return Err(format!("error: unrecognized argument '{other}'")),
        }
    }

    let input = match input {
        Some(input) => input,
        None if !io::stdin().is_terminal() => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("error: failed to read stdin: {e}"))?;
            buffer.trim_end().to_string()
        }
        None => return Err("error: no input provided (pass text, use --input, or pipe stdin)".to_string()),
    };

    Ok(CliConfig { input, reference_time, config_path, content_tags, color })
}

fn parse_reference(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map_err(|_| format!("error: invalid reference time '{value}' (expected YYYY-MM-DDTHH:MM:SS)"))
}

fn load_definitions(path: &str) -> Result<Vec<ModuleDefinition>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("error: cannot read '{path}': {e}"))?;
    serde_json::from_str(&raw).map_err(|e| format!("error: cannot parse '{path}': {e}"))
}

fn print_help() {
    println!(
        "modlore {} - structured-tag extraction debugger

USAGE:
    modlore [OPTIONS] [TEXT]

OPTIONS:
    -i, --input <TEXT>      Text to scan (or pass positionally / pipe stdin)
        --config <PATH>     JSON file with module definitions
        --tag <NAME>        Content tag to trim on (repeatable, ordered)
        --reference <TIME>  Reference time, YYYY-MM-DDTHH:MM:SS
        --color             Force colored output
        --no-color          Disable colored output
    -h, --help              Show this help
    -V, --version           Show version",
        env!("CARGO_PKG_VERSION")
    );
}
