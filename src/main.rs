mod cli;

use realstate::config::{self, Config};
use realstate_db::Store;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("realstate {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if let Commands::Validate { config: path } = &cli.command {
        init_logging(&cli, None);
        let path = path.as_deref().or(cli.config.as_deref());
        return validate_config(path);
    }

    let mut config = config::load_config_or_default(cli.config.as_deref())?;
    if cli.echo {
        config.database.echo = true;
    }
    init_logging(&cli, config.logging.filter.as_deref());

    match cli.command {
        Commands::Init => init(&config),
        Commands::Teardown { yes } => teardown(&config, yes),
        Commands::Status { json } => status(&config, json),
        Commands::Check => check(&config),
        Commands::Validate { .. } | Commands::Version => Ok(()),
    }
}

fn init_logging(cli: &Cli, configured: Option<&str>) {
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "realstate=trace,realstate_db=debug,realstate_common=debug".to_string()
        } else if let Some(filter) = configured {
            filter.to_string()
        } else {
            "realstate=info,realstate_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> Result<Store> {
    let descriptor = config.database.descriptor()?;
    tracing::debug!("Opening store at {}", descriptor);
    Store::connect(&config.database)
        .with_context(|| format!("Failed to open store at {}", descriptor))
}

fn init(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    store.initialize().context("Schema initialization failed")?;
    println!("✓ Schema initialized");
    store.shutdown();
    Ok(())
}

fn teardown(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to drop the schema without --yes");
    }
    let store = open_store(config)?;
    store.teardown().context("Schema teardown failed")?;
    println!("✓ Schema dropped");
    store.shutdown();
    Ok(())
}

fn status(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let tables = store.schema_status()?;
    let pool = store.pool_status();

    if json {
        let report = serde_json::json!({
            "database": store.pool().descriptor().redacted(),
            "tables": tables,
            "pool": pool,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Database: {}", store.pool().descriptor());
        for table in &tables {
            match table.rows {
                Some(rows) => println!("  {:<14} {} rows", table.name, rows),
                None => println!("  {:<14} missing", table.name),
            }
        }
        println!(
            "Pool: {} open, {} idle, ceiling {}",
            pool.connections, pool.idle_connections, pool.ceiling
        );
    }

    store.shutdown();
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    store.ping().context("Store did not answer")?;
    let pool = store.pool_status();
    println!("✓ Connected to {}", store.pool().descriptor());
    println!(
        "  Pool: {} open, {} idle, ceiling {}",
        pool.connections, pool.idle_connections, pool.ceiling
    );
    store.shutdown();
    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::load_config_or_default(None)?
        }
    };
    println!("✓ Configuration is valid");
    println!("  Database: {}", config.database.descriptor()?);
    println!(
        "  Pool: {} + {} overflow, {}s timeout",
        config.database.pool_size, config.database.max_overflow, config.database.pool_timeout_secs
    );
    println!("  Echo: {}", config.database.echo);
    Ok(())
}
