use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use stride_engine::{ConsumerConfig, EmptyBatchPolicy, RecordTemplate};

use crate::error::BenchError;

#[derive(Parser, Debug)]
#[command(name = "stride-bench", about = "Producer/consumer load driver for a shared sequence store")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Insert records from N stride-partitioned workers
    Produce,
    /// Drain the sequence with N workers of one consumer group
    Consume,
    /// Produce, then consume, against one store
    Run,
    /// Print record count and group cursor
    Status,
    /// Print one record as JSON
    Get { id: String },
    /// Delete one record
    Delete { id: String },
    /// Insert or replace one record from JSON; missing fields default
    Put { id: String, json: String },
    /// Overwrite selected fields of an existing record from JSON
    Patch { id: String, json: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct CommonArgs {
    /// Path to a TOML config file
    #[arg(short = 'c', long, global = true, env = "STRIDE_CONFIG")]
    pub config: Option<String>,

    /// Store endpoint (data directory for the file store)
    #[arg(short = 's', long = "server", global = true, env = "STRIDE_SERVER")]
    pub endpoint: Option<String>,

    /// Store backend
    #[arg(long, global = true, value_enum)]
    pub kind: Option<StoreKind>,

    /// Database name
    #[arg(long = "dbname", global = true)]
    pub database: Option<String>,

    /// Number of workers
    #[arg(short = 'p', long, global = true)]
    pub workers: Option<u64>,

    /// Sync every write to disk
    #[arg(short = 'j', long, global = true, overrides_with = "no_ensure_disk_write")]
    pub ensure_disk_write: bool,

    /// Do not sync writes, even if the config file asks for it
    #[arg(long, global = true, overrides_with = "ensure_disk_write")]
    pub no_ensure_disk_write: bool,

    /// Consumer group id
    #[arg(long, global = true)]
    pub group_id: Option<u64>,

    /// IDs claimed per cursor advance
    #[arg(short = 'n', long, global = true)]
    pub batch_size: Option<u64>,

    /// Highest id producers insert (inclusive)
    #[arg(long, global = true)]
    pub ceiling: Option<u64>,

    /// Clear records/cursors before running
    #[arg(long, global = true, overrides_with = "no_reset")]
    pub reset: bool,

    /// Keep existing records/cursors instead of clearing them
    #[arg(long, global = true, overrides_with = "reset")]
    pub no_reset: bool,

    /// Cancel all workers when one fails
    #[arg(long, global = true, overrides_with = "no_abort_on_error")]
    pub abort_on_error: bool,

    /// Let the other workers finish when one fails
    #[arg(long, global = true, overrides_with = "abort_on_error")]
    pub no_abort_on_error: bool,

    /// Throughput report period in milliseconds
    #[arg(long, global = true)]
    pub report_interval_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub workers: Option<u64>,
    pub report_interval_ms: Option<u64>,
    pub reset: Option<bool>,
    pub abort_on_error: Option<bool>,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub producer: ProducerSection,
    #[serde(default)]
    pub consumer: ConsumerSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    pub kind: Option<StoreKind>,
    pub endpoint: Option<String>,
    pub database: Option<String>,
    pub ensure_disk_write: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProducerSection {
    pub ceiling: Option<u64>,
    pub file_name: Option<String>,
    pub buffer_address: Option<String>,
    pub reserved: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsumerSection {
    pub group_id: Option<u64>,
    pub batch_size: Option<u64>,
    pub empty_batch: Option<EmptyBatchPolicy>,
}

pub fn load_config(path: &str) -> Result<Config, BenchError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BenchError::config("read", format!("'{path}': {e}")))?;
    toml::from_str(&content).map_err(|e| BenchError::config("parse", format!("'{path}': {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_CEILING: u64 = 15_000_000;

/// A `--x`/`--no-x` pair; `None` when neither was given.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub endpoint: Option<PathBuf>,
    pub database: String,
    pub ensure_disk_write: bool,
}

/// Final settings: config file < env/CLI.
#[derive(Debug, Clone)]
pub struct Effective {
    pub workers: u64,
    pub report_interval: Duration,
    pub reset: bool,
    pub abort_on_error: bool,
    pub store: StoreSettings,
    pub ceiling: u64,
    pub template: RecordTemplate,
    pub consumer: ConsumerConfig,
}

impl Effective {
    pub fn new(args: &CommonArgs) -> Result<Self, BenchError> {
        let cfg = match &args.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &CommonArgs, cfg: Config) -> Result<Self, BenchError> {
        let template = RecordTemplate::default();
        let template = RecordTemplate {
            file_name: cfg.producer.file_name.unwrap_or(template.file_name),
            buffer_address: cfg.producer.buffer_address.unwrap_or(template.buffer_address),
            reserved: cfg.producer.reserved.unwrap_or(template.reserved),
        };

        let eff = Self {
            workers: args.workers.or(cfg.workers).unwrap_or(1),
            report_interval: Duration::from_millis(
                args.report_interval_ms.or(cfg.report_interval_ms).unwrap_or(1000),
            ),
            reset: switch(args.reset, args.no_reset).or(cfg.reset).unwrap_or(true),
            abort_on_error: switch(args.abort_on_error, args.no_abort_on_error)
                .or(cfg.abort_on_error)
                .unwrap_or(false),
            store: StoreSettings {
                kind: args.kind.or(cfg.store.kind).unwrap_or_default(),
                endpoint: args.endpoint.clone().or(cfg.store.endpoint).map(PathBuf::from),
                database: args.database.clone().or(cfg.store.database).unwrap_or_else(|| "test".into()),
                ensure_disk_write: switch(args.ensure_disk_write, args.no_ensure_disk_write)
                    .or(cfg.store.ensure_disk_write)
                    .unwrap_or(false),
            },
            ceiling: args.ceiling.or(cfg.producer.ceiling).unwrap_or(DEFAULT_CEILING),
            template,
            consumer: ConsumerConfig {
                group_id: args.group_id.or(cfg.consumer.group_id).unwrap_or(1),
                batch_size: args.batch_size.or(cfg.consumer.batch_size).unwrap_or(1),
                empty_batch: cfg.consumer.empty_batch.unwrap_or_default(),
            },
        };
        eff.validate()?;
        Ok(eff)
    }

    fn validate(&self) -> Result<(), BenchError> {
        if self.workers == 0 {
            return Err(BenchError::config("validate", "workers must be at least 1"));
        }
        if self.consumer.batch_size == 0 {
            return Err(BenchError::config("validate", "batch_size must be at least 1"));
        }
        if self.report_interval.is_zero() {
            return Err(BenchError::config("validate", "report_interval_ms must be at least 1"));
        }
        if i64::try_from(self.ceiling).is_err() {
            return Err(BenchError::config("validate", format!("ceiling must not exceed {}", i64::MAX)));
        }
        if self.store.kind == StoreKind::File && self.store.endpoint.is_none() {
            return Err(BenchError::config("validate", "file store needs an endpoint (-s or [store] endpoint)"));
        }
        Ok(())
    }
}
