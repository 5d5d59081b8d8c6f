use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use bulk_load_bench::bench::Benchmark;
use bulk_load_bench::{
    ConflictPolicy, Destination, LoadConfig, LoadError, RowSource, RunResult, StrategyKind,
    TableName, db, fixtures, init_logger,
};

#[derive(Parser, Debug)]
#[command(
    name = "bulk-load-bench",
    about = "Benchmark bulk-load strategies against a PostgreSQL table"
)]
struct Args {
    /// CSV file to load (overrides BULK_SOURCE_PATH).
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Destination table (overrides BULK_TABLE).
    #[arg(long, global = true)]
    table: Option<String>,

    /// Conflict policy for INSERT-based strategies (`fail` or `skip`).
    #[arg(long, global = true)]
    conflict: Option<ConflictPolicy>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Truncate the table and load it with one strategy.
    Run {
        #[arg(long)]
        strategy: StrategyKind,
    },
    /// Run several strategies in turn and rank them.
    Bench {
        /// Comma-separated strategy names; all strategies when omitted.
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<StrategyKind>,
    },
    /// Write a synthetic bulk_test CSV.
    Generate {
        #[arg(long)]
        rows: usize,
        #[arg(long, default_value = "bulk_test.csv")]
        output: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Apply database migrations.
    Migrate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    init_logger();

    if let Err(err) = run(Args::parse()).await {
        log::error!("{}", err);
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), LoadError> {
    let Args {
        file,
        table,
        conflict,
        format,
        command,
    } = args;

    let (kinds, single) = match command {
        Command::Generate { rows, output, seed } => {
            return fixtures::generate_file(&output, rows, seed);
        }
        Command::Migrate => {
            let config = LoadConfig::from_env()?;
            let pool = db::connect(&config.database_url, config.max_connections).await?;
            return db::run_migrations(&pool).await;
        }
        Command::Run { strategy } => (vec![strategy], true),
        Command::Bench { strategies } if strategies.is_empty() => (StrategyKind::ALL.to_vec(), false),
        Command::Bench { strategies } => (strategies, false),
    };

    let mut config = LoadConfig::from_env()?;
    if let Some(file) = file {
        config.source_path = file;
    }
    if let Some(table) = table {
        config.table = TableName::parse(&table)?;
    }
    if conflict.is_some() {
        config.strategies.conflict = conflict;
    }

    let pool = db::connect(&config.database_url, config.max_connections).await?;
    let source = RowSource::open(&config.source_path, config.schema.clone())?;
    let destination = Destination::new(pool, config.table.clone(), config.schema.clone());
    let benchmark = Benchmark::new(&source, &destination, &config.strategies);

    if single {
        let result = benchmark.run_one(kinds[0]).await?;
        return print_result(&result, format);
    }

    let report = benchmark.run_all(&kinds).await;
    match format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", to_json(&report)?),
    }
    Ok(())
}

fn print_result(result: &RunResult, format: OutputFormat) -> Result<(), LoadError> {
    match format {
        OutputFormat::Text => println!("{result}"),
        OutputFormat::Json => println!("{}", to_json(result)?),
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, LoadError> {
    serde_json::to_string(value).map_err(|e| LoadError::Config(format!("failed to encode report: {e}")))
}
