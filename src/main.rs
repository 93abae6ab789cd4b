//! Command-line entry point: run one training pass and print the JSON result.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use feedtrain::config::{self, TrainerConfig};
use feedtrain::features::TrainingRecord;
use feedtrain::logging;
use feedtrain::pipeline::{PipelineError, TrainingOutcome, TrainingPipeline};
use feedtrain::request::{self, TrainRequest};
use feedtrain::store::MemoryStore;

const EXIT_REJECTED: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode, String> {
    let options = match parse_args(std::env::args().skip(1).collect())? {
        Parsed::Help => {
            println!("{}", help_text());
            return Ok(ExitCode::SUCCESS);
        }
        Parsed::Info => {
            print_json(&request::service_info());
            return Ok(ExitCode::SUCCESS);
        }
        Parsed::Run(options) => options,
    };

    let config_path = match &options.config_path {
        Some(path) => path.clone(),
        None => config::default_config_path().map_err(|err| err.to_string())?,
    };
    let loaded = if options.config_path.is_some() {
        config::load_from_path(&config_path)
    } else {
        config::load_or_default(&config_path)
    }
    .map_err(|err| err.to_string())?;
    let mut config = config::apply_env_overrides(loaded, |key| std::env::var(key).ok());
    if let Some(model) = &options.model_name {
        config.model.name = model.clone();
    }

    if let Err(err) = logging::init(&config.logging) {
        eprintln!("File logging disabled: {err}");
    }

    if let Err(err) = options.request.validate() {
        let (status, body) = request::bad_request(&err);
        print_json(&body);
        tracing::error!("Rejected request (HTTP {}): {err}", status.code());
        return Ok(ExitCode::FAILURE);
    }
    let result = if let Some(records_path) = &options.dry_run_records {
        let records = read_records(records_path)?;
        tracing::info!(
            "Dry run over {} records from {}",
            records.len(),
            records_path.display()
        );
        let store = MemoryStore::new().with_records(records);
        let pipeline =
            TrainingPipeline::new(store, &config.model).map_err(|err| err.to_string())?;
        pipeline.run(&options.request)
    } else {
        run_remote(&config, &options.request)?
    };

    Ok(report(&result))
}

fn run_remote(
    config: &TrainerConfig,
    request: &TrainRequest,
) -> Result<Result<TrainingOutcome, PipelineError>, String> {
    let pipeline = TrainingPipeline::connect(config).map_err(|err| err.to_string())?;
    Ok(pipeline.run(request))
}

fn report(result: &Result<TrainingOutcome, PipelineError>) -> ExitCode {
    let (status, body) = request::respond(result);
    print_json(&body);
    match result {
        Ok(TrainingOutcome::Trained(_)) => ExitCode::SUCCESS,
        Ok(TrainingOutcome::Rejected(_)) => ExitCode::from(EXIT_REJECTED),
        Err(err) => {
            tracing::error!("Training failed (HTTP {}): {err}", status.code());
            ExitCode::FAILURE
        }
    }
}

fn print_json(body: &serde_json::Value) {
    match serde_json::to_string_pretty(body) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("Failed to render result: {err}"),
    }
}

fn read_records(path: &Path) -> Result<Vec<TrainingRecord>, String> {
    let file = std::fs::File::open(path)
        .map_err(|err| format!("Failed to open {}: {err}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str::<TrainingRecord>(&line)
            .map_err(|err| format!("{}:{}: invalid record: {err}", path.display(), idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[derive(Debug, Clone)]
struct CliOptions {
    config_path: Option<PathBuf>,
    model_name: Option<String>,
    dry_run_records: Option<PathBuf>,
    request: TrainRequest,
}

enum Parsed {
    Help,
    Info,
    Run(CliOptions),
}

fn parse_args(args: Vec<String>) -> Result<Parsed, String> {
    let mut config_path = None;
    let mut model_name = None;
    let mut dry_run = false;
    let mut records = None;
    let mut request = TrainRequest::default();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Ok(Parsed::Help),
            "--info" => return Ok(Parsed::Info),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--days" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--days requires a value".to_string())?;
                request.days = value
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid --days value: {value}"))?;
            }
            "--limit" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--limit requires a value".to_string())?;
                request.limit = value
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid --limit value: {value}"))?;
            }
            "--activate" => {
                request.activate = true;
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_name = Some(value.clone());
            }
            "--dry-run" => {
                dry_run = true;
            }
            "--records" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--records requires a value".to_string())?;
                records = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let dry_run_records = match (dry_run, records) {
        (true, Some(path)) => Some(path),
        (true, None) => return Err("--dry-run requires --records <file>".to_string()),
        (false, Some(_)) => return Err("--records is only valid with --dry-run".to_string()),
        (false, None) => None,
    };

    Ok(Parsed::Run(CliOptions {
        config_path,
        model_name,
        dry_run_records,
        request,
    }))
}

fn help_text() -> String {
    [
        "feedtrain",
        "",
        "Retrains the feed engagement classifier and stores a new weight version.",
        "",
        "Usage:",
        "  feedtrain [--config <file>] [--days <n>] [--limit <n>] [--activate] [options]",
        "",
        "Options:",
        "  --config <file>     Config file (default: .feedtrain/config.toml in the config dir).",
        "  --days <n>          Training window in days (default: 30).",
        "  --limit <n>         Max exported rows (default: 50000).",
        "  --activate          Make the new version the active one.",
        "  --model <name>      Override the model name from the config.",
        "  --dry-run           Train against an in-memory store instead of the remote one.",
        "  --records <file>    JSON-lines export used by --dry-run.",
        "  --info              Print the training endpoint description and exit.",
        "",
        "Environment:",
        "  SUPABASE_URL, SUPABASE_SERVICE_KEY, TRAIN_API_KEY override the config file.",
        "",
        "Exit codes: 0 trained, 2 rejected for data quality, 1 failure.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_request_flags() {
        let Parsed::Run(options) =
            parse_args(args(&["--days", "7", "--limit", "100", "--activate"])).unwrap()
        else {
            panic!("expected run options");
        };
        assert_eq!(
            options.request,
            TrainRequest {
                days: 7,
                limit: 100,
                activate: true
            }
        );
        assert!(options.dry_run_records.is_none());
    }

    #[test]
    fn dry_run_needs_records() {
        assert!(parse_args(args(&["--dry-run"])).is_err());
        assert!(parse_args(args(&["--records", "x.jsonl"])).is_err());
        let Parsed::Run(options) =
            parse_args(args(&["--dry-run", "--records", "x.jsonl"])).unwrap()
        else {
            panic!("expected run options");
        };
        assert_eq!(options.dry_run_records, Some(PathBuf::from("x.jsonl")));
    }

    #[test]
    fn rejects_unknown_and_malformed_arguments() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--days", "soon"])).is_err());
        assert!(matches!(parse_args(args(&["-h"])), Ok(Parsed::Help)));
    }

    #[test]
    fn info_flag_short_circuits() {
        assert!(matches!(
            parse_args(args(&["--days", "7", "--info"])),
            Ok(Parsed::Info)
        ));
        assert!(help_text().contains("--info"));
    }

    #[test]
    fn zero_window_is_a_bad_request() {
        let Parsed::Run(options) = parse_args(args(&["--days", "0"])).unwrap() else {
            panic!("expected run options");
        };
        let err = options.request.validate().unwrap_err();
        let (status, body) = request::bad_request(&err);
        assert_eq!(status.code(), 400);
        assert!(body["error"].as_str().unwrap().contains("days"));
    }

    #[test]
    fn reads_json_lines_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(
            &path,
            "{\"engaged\": true, \"has_media\": 1}\n\n{\"engaged\": false, \"inv_age\": \"0.5\"}\n",
        )
        .unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].engaged);
    }
}
