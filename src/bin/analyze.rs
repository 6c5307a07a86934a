use anyhow::Result;
use clap::Parser;
use schemagraph::catalog::Scope;
use schemagraph::db::{migrate, Db};
use schemagraph::report::build_report;
use schemagraph::store::RelationshipStore;
use schemagraph::Config;

#[derive(Parser, Debug)]
#[command(name = "analyze")]
#[command(about = "Compute centrality and cluster analytics over the current relationship set")]
struct Args {
    /// Server name (defaults to [scope] in config.toml)
    #[arg(long)]
    server: Option<String>,

    /// Database name (defaults to [scope] in config.toml)
    #[arg(long)]
    database: Option<String>,

    /// Schema name (defaults to [scope] in config.toml)
    #[arg(long)]
    schema: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    // RUST_LOG overrides the configured log level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.catalog.log_level.clone()),
    )
    .init();

    let defaults = config.default_scope();
    let scope = Scope::new(
        args.server.as_deref().unwrap_or(&defaults.server_name),
        args.database.as_deref().unwrap_or(&defaults.database_name),
        args.schema.as_deref().unwrap_or(&defaults.schema_name),
    );

    let db = Db::new(config.db_path());
    db.with_connection(|conn| migrate::run_migrations(conn)).await?;

    let store = RelationshipStore::new(&db);
    let records = store.current_relationships(&scope).await?;
    if records.is_empty() {
        log::warn!("No current relationships for scope {scope}. Run infer first.");
    }
    log::info!(
        "Analyzing {} current relationships for scope {scope}",
        records.len()
    );

    let report = build_report(&scope, &records, &config.pagerank_params());
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
