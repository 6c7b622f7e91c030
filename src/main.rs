//! snap – command-line HTML → PDF snapshot tool.
//!
//! Usage:
//!   snap <input.html> [output.pdf] [--title "Report"] [--config cfg.json]
//!        [--report report.json] [--fetch-timeout-ms N]
//!   snap --template <name> [output.pdf]
//!
//! If `output.pdf` is omitted the PDF is written next to the input file with
//! the same stem (e.g. `report.html` → `report.pdf`).

use std::{env, fs, path::Path, path::PathBuf, process};

use report_snap::{templates, ConvertConfig, Converter};

#[derive(Default)]
struct Args {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    title: Option<String>,
    config: Option<PathBuf>,
    report: Option<PathBuf>,
    fetch_timeout_ms: Option<u64>,
    template: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let prog = argv.first().map(String::as_str).unwrap_or("snap");
    let args = match parse_args(&argv[1..]) {
        Ok(Some(a)) => a,
        Ok(None) => {
            print_usage(prog);
            process::exit(0);
        }
        Err(msg) => {
            eprintln!("Error: {msg}");
            print_usage(prog);
            process::exit(1);
        }
    };

    let (html, stem, default_output) = match (&args.template, &args.input) {
        (Some(name), _) => match templates::by_name(name) {
            Some(html) => (html, name.clone(), PathBuf::from(format!("{name}.pdf"))),
            None => {
                eprintln!(
                    "Error: unknown template '{name}' (available: {})",
                    templates::NAMES.join(", ")
                );
                process::exit(1);
            }
        },
        (None, Some(input)) => {
            let html = match fs::read_to_string(input) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error reading '{}': {e}", input.display());
                    process::exit(1);
                }
            };
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("report")
                .to_string();
            (html, stem, input.with_extension("pdf"))
        }
        (None, None) => {
            eprintln!("Error: no input file specified.");
            print_usage(prog);
            process::exit(1);
        }
    };
    let output = args.output.clone().unwrap_or(default_output);

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(c) => c,
            Err(msg) => {
                eprintln!("Error: {msg}");
                process::exit(1);
            }
        },
        None => ConvertConfig {
            title: stem,
            ..ConvertConfig::default()
        },
    };
    if let Some(title) = args.title {
        config.title = title;
    }
    if let Some(ms) = args.fetch_timeout_ms {
        config.fetch_timeout_ms = ms;
    }

    let converter = match Converter::new(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match converter.convert(&html).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error generating PDF: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = write_creating_dirs(&output, &result.pdf) {
        eprintln!("Error writing '{}': {e}", output.display());
        process::exit(1);
    }
    if let Some(path) = &args.report {
        let written = result
            .report
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| write_creating_dirs(path, json.as_bytes()).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("Error writing report '{}': {e}", path.display());
            process::exit(1);
        }
    }

    let pages = result.report.page_count();
    let missing = result.report.unembedded.len();
    eprintln!(
        "Wrote '{}' ({} bytes, {} page{}{})",
        output.display(),
        result.pdf.len(),
        pages,
        if pages == 1 { "" } else { "s" },
        if missing == 0 {
            String::new()
        } else {
            format!(", {missing} resource(s) not embedded")
        }
    );
}

/// `Ok(None)` means help was requested.
fn parse_args(argv: &[String]) -> Result<Option<Args>, String> {
    let mut args = Args::default();
    let mut positional = Vec::new();

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        let flag = arg.as_str();
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match flag {
            "--title" | "-t" => args.title = Some(value()?),
            "--config" | "-c" => args.config = Some(PathBuf::from(value()?)),
            "--report" | "-r" => args.report = Some(PathBuf::from(value()?)),
            "--template" => args.template = Some(value()?),
            "--fetch-timeout-ms" => {
                let raw = value()?;
                let ms = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--fetch-timeout-ms expects milliseconds, got '{raw}'"))?;
                args.fetch_timeout_ms = Some(ms);
            }
            "--help" | "-h" => return Ok(None),
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            path => positional.push(PathBuf::from(path)),
        }
    }

    // With a template the only positional is the output path.
    let mut positional = positional.into_iter();
    if args.template.is_none() {
        args.input = positional.next();
    }
    args.output = positional.next();
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {}", extra.display()));
    }
    Ok(Some(args))
}

fn load_config(path: &Path) -> Result<ConvertConfig, String> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("cannot read config '{}': {e}", path.display()))?;
    ConvertConfig::from_json(&json).map_err(|e| format!("config '{}': {e}", path.display()))
}

fn write_creating_dirs(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)
}

fn print_usage(prog: &str) {
    eprintln!("snap – paginated HTML to PDF snapshots (report-snap)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [output.pdf] [flags]");
    eprintln!("  {prog} --template <name> [output.pdf] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>   HTML with elements marked class=\"pdf-page\" or \"report-page\"");
    eprintln!("  [output.pdf]   Output path  (default: same stem as input with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --title, -t           Document title in PDF metadata (default: input filename stem)");
    eprintln!("  --config, -c          JSON conversion config; missing fields take defaults");
    eprintln!("  --report, -r          Write a JSON conversion report to this path");
    eprintln!("  --fetch-timeout-ms    Per-resource download timeout (default: 15000)");
    eprintln!("  --template            Convert a built-in sample: {}", templates::NAMES.join(", "));
    eprintln!("  --help                Print this message");
}
