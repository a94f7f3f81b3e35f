//! Fieldgate command-line front end.
//!
//! Runs one field query through the access gateway and prints the fields
//! visible to the given role as JSON.

mod config;
mod seed;

use std::process::ExitCode;

use clap::Parser;
use fieldgate::{AccessGateway, AnyBackend, FieldQuery, InputValidator, RecordSchema, Role};
use tracing::info;

use config::GatewayCliConfig;

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fieldgate={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Opens the configured backend and loads the seed file, if any.
async fn open_backend(
    config: &GatewayCliConfig,
    schema: &RecordSchema,
) -> anyhow::Result<AnyBackend> {
    let selection = config
        .selection()
        .map_err(|e| anyhow::anyhow!("Invalid backend configuration: {}", e))?;
    let backend = AnyBackend::open(selection, schema).await?;

    if let Some(path) = &config.seed {
        let records = seed::load_records(path)?;
        for record in &records {
            backend.insert(record).await?;
        }
        info!(count = records.len(), path = %path.display(), "Loaded seed records");
    }

    Ok(backend)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = GatewayCliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let schema = RecordSchema::employees();
    let backend = open_backend(&config, &schema).await?;

    info!(
        backend = %config.backend,
        role = %config.role,
        field = %config.field,
        "Running field query"
    );

    let gateway = AccessGateway::new(schema)
        .with_validator(InputValidator::new(config.max_input_length));
    let query = FieldQuery::new(&config.field, &config.value);

    match gateway
        .fetch(&Role::new(&config.role), &query, &backend)
        .await
    {
        Ok(records) => {
            let records: Vec<_> = records.collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error ({}): {}", e.kind(), e.public_message());
            Ok(ExitCode::from(2))
        }
    }
}
