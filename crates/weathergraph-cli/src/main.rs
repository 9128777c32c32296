use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use weathergraph::{
    AppError, ErrorKind, WeatherConnector,
    config::{ConfigError, DatasetTarget, Preferences, RuntimeConfig, StoragePreferences},
    geocoding::NominatimResolver,
    logging,
    providers::HttpClient,
    service,
    sheet::{RowRecord, SheetReader},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Append today's weather for a configured city to an xlsx dataset"
)]
struct Cli {
    /// Preferences file with the `[location]` section.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Dataset workbook path.
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Worksheet name; defaults to the first sheet.
    #[arg(long, global = true)]
    sheet: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch current weather and append one row (default).
    Fetch {
        #[arg(long)]
        json: bool,
    },
    /// Print rows stored in the dataset.
    Show {
        #[arg(long, conflicts_with = "last")]
        first: Option<usize>,
        #[arg(long)]
        last: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

const ENVELOPE_SCHEMA_VERSION: &str = "v1";
const ERROR_CODE_RUNTIME_SERIALIZE: &str = "runtime.serialize_failed";

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
}

impl CliError {
    fn runtime(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Runtime,
            code,
            message: message.into(),
        }
    }

    fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::User => 2,
            ErrorKind::Runtime => 1,
        }
    }
}

impl From<AppError> for CliError {
    fn from(error: AppError) -> Self {
        Self {
            kind: error.kind(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl Cli {
    fn command_name(&self) -> &'static str {
        match &self.command {
            None | Some(Commands::Fetch { .. }) => "weathergraph.fetch",
            Some(Commands::Show { .. }) => "weathergraph.show",
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let command = cli.command_name();
    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            tracing::debug!(command, code = error.code, "command failed");
            eprintln!("error[{}]: {}", error.code, error.message);
            std::process::exit(error.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<String, CliError> {
    let config = apply_settings_override(RuntimeConfig::from_env(), cli.settings.clone());
    match cli.command {
        None => run_fetch(&config, cli.data, cli.sheet, false),
        Some(Commands::Fetch { json }) => run_fetch(&config, cli.data, cli.sheet, json),
        Some(Commands::Show { first, last, json }) => {
            let target = show_target(&config, cli.data, cli.sheet)?;
            let rows = read_rows(&target, first, last)?;
            if json {
                render_json_envelope("weathergraph.show", json!(rows))
            } else {
                Ok(format_rows(&rows))
            }
        }
    }
}

fn apply_settings_override(mut config: RuntimeConfig, settings: Option<PathBuf>) -> RuntimeConfig {
    if let Some(path) = settings {
        config.settings_path = path;
    }
    config
}

fn run_fetch(
    config: &RuntimeConfig,
    data: Option<PathBuf>,
    sheet: Option<String>,
    json: bool,
) -> Result<String, CliError> {
    let preferences = Preferences::load(&config.settings_path).map_err(AppError::from)?;
    let target = config.dataset_target(&preferences.storage, data, sheet);
    let location = preferences.location.query();
    tracing::info!(location, path = %target.path.display(), "recording weather");

    let client = HttpClient::new(config.http_timeout()).map_err(AppError::from)?;
    let connector = WeatherConnector::new(NominatimResolver::new(&client), &client);
    let record = service::record_weather(&connector, &location, &target)?;

    if json {
        render_json_envelope(
            "weathergraph.fetch",
            json!({
                "location": location,
                "path": target.path.display().to_string(),
                "record": record,
            }),
        )
    } else {
        Ok(format!(
            "{location}: {} -> {}",
            record.summary(),
            target.path.display()
        ))
    }
}

/// `show` works without a preferences file; only the `[storage]` section is
/// consulted, and a missing file means defaults.
fn show_target(
    config: &RuntimeConfig,
    data: Option<PathBuf>,
    sheet: Option<String>,
) -> Result<DatasetTarget, CliError> {
    let storage = if data.is_some() {
        StoragePreferences::default()
    } else {
        match Preferences::load(&config.settings_path) {
            Ok(preferences) => preferences.storage,
            Err(ConfigError::Missing(_)) => StoragePreferences::default(),
            Err(error) => return Err(AppError::from(error).into()),
        }
    };

    Ok(config.dataset_target(&storage, data, sheet))
}

fn read_rows(
    target: &DatasetTarget,
    first: Option<usize>,
    last: Option<usize>,
) -> Result<Vec<RowRecord>, CliError> {
    let mut reader = SheetReader::new(&target.path).map_err(AppError::from)?;
    reader.open().map_err(AppError::from)?;
    let sheet = target.sheet.as_deref();

    let rows = match (first, last) {
        (Some(count), _) => reader.get_top(count, sheet),
        (None, Some(count)) => reader.get_bottom(count, sheet),
        (None, None) => reader.get_all(sheet),
    }
    .map_err(AppError::from)?;

    reader.close();
    Ok(rows)
}

fn format_rows(rows: &[RowRecord]) -> String {
    let Some(first) = rows.first() else {
        return "no rows".to_string();
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(first.keys().cloned().collect::<Vec<_>>().join("\t"));
    for row in rows {
        lines.push(
            row.values()
                .map(|cell| cell.header_text())
                .collect::<Vec<_>>()
                .join("\t"),
        );
    }
    lines.join("\n")
}

fn render_json_envelope(command: &str, result: serde_json::Value) -> Result<String, CliError> {
    serde_json::to_string(&json!({
        "schema_version": ENVELOPE_SCHEMA_VERSION,
        "command": command,
        "ok": true,
        "result": result,
    }))
    .map_err(|error| {
        CliError::runtime(
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize output envelope: {error}"),
        )
    })
}
