use anyhow::Result;
use clap::Parser;
use schemagraph::catalog::{fetch_column_classifications, fetch_column_occurrences, Scope};
use schemagraph::db::{migrate, Db};
use schemagraph::matcher::{match_candidates, MatchingMode};
use schemagraph::store::RelationshipStore;
use schemagraph::Config;

#[derive(Parser, Debug)]
#[command(name = "infer")]
#[command(about = "Infer table relationships for a scope and replace its current set")]
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

    /// Matching mode: exact, alias or combined (defaults to config)
    #[arg(long)]
    mode: Option<String>,

    /// Print candidates as JSON without persisting
    #[arg(long)]
    dry_run: bool,
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
    let mode = match args.mode.as_deref() {
        Some(raw) => raw.parse::<MatchingMode>()?,
        None => config.inference.matching_mode,
    };

    log::info!("Starting relationship inference for scope {scope}");

    let db = Db::new(config.db_path());
    db.with_connection(|conn| migrate::run_migrations(conn)).await?;

    let occurrences = fetch_column_occurrences(&db, &scope).await?;
    if occurrences.is_empty() {
        log::warn!(
            "No column occurrences for scope {scope}. Run the catalog crawler first."
        );
        return Ok(());
    }
    let classifications = fetch_column_classifications(&db, &scope).await?;
    log::info!(
        "Fetched {} occurrences, {} classifications",
        occurrences.len(),
        classifications.len()
    );

    let candidates = match_candidates(
        &scope,
        &occurrences,
        &classifications,
        &config.table_filter()?,
        &config.alias_map(),
        mode,
    );

    let fk_semantic = candidates
        .iter()
        .filter(|c| c.relationship_type == schemagraph::matcher::RelationshipType::FkSemantic)
        .count();
    log::info!(
        "Matched {} candidates ({} fk_semantic)",
        candidates.len(),
        fk_semantic
    );

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    let store = RelationshipStore::new(&db);
    let current = store.replace_scope(&scope, &candidates).await?;
    println!("Scope {scope}: {current} current relationships");

    Ok(())
}
