use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};

/// How log records get written to the console.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One bunyan formatted JSON object per line
    Json,
}

pub fn init_tracing(name: &str, format: LogFormat) {
    match format {
        LogFormat::Text => init_text(),
        LogFormat::Json => init_json(name),
    }
}

fn init_json(name: &str) {
    use tracing_subscriber::prelude::*;

    let formatting_layer = BunyanFormattingLayer::new(name.to_string(), std::io::stdout);

    if let Err(e) = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .try_init()
    {
        eprintln!("Error initializing logging: {:?}", e);
    }
}

fn init_text() {
    if let Err(e) = env_logger::builder().format_timestamp_millis().try_init() {
        eprintln!("Error initializing logging: {:?}", e);
    }
}
