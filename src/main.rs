use anyhow::Result;
use schemagraph::catalog::{fetch_column_classifications, fetch_column_occurrences};
use schemagraph::db::{migrate, Db};
use schemagraph::matcher::match_candidates;
use schemagraph::store::RelationshipStore;
use schemagraph::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // Initialize logger: RUST_LOG overrides the configured log level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.catalog.log_level.clone()),
    )
    .init();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "run" => {
            // Full inference pass for the configured scope
            run_inference(&config).await?;
        }
        "verify" | _ => {
            // Default: verify database schema and print scope summary
            run_schema_verification(&config).await?;
        }
    }

    Ok(())
}

async fn run_schema_verification(config: &Config) -> Result<()> {
    let db = Db::new(config.db_path());

    db.with_connection(|conn| migrate::run_migrations(conn)).await?;

    let scope = config.default_scope();
    let scope_clone = scope.clone();
    let (occurrences, classifications, current) = db
        .with_connection(move |conn| {
            let scoped_count = |sql: &str| -> schemagraph::Result<i64> {
                Ok(conn.query_row(
                    sql,
                    rusqlite::params![
                        scope_clone.server_name,
                        scope_clone.database_name,
                        scope_clone.schema_name
                    ],
                    |row| row.get(0),
                )?)
            };
            let occurrences = scoped_count(
                "SELECT COUNT(*) FROM column_occurrences \
                 WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3",
            )?;
            let classifications = scoped_count(
                "SELECT COUNT(*) FROM column_classifications \
                 WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3",
            )?;
            let current = scoped_count(
                "SELECT COUNT(*) FROM table_relationships \
                 WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3 \
                   AND is_current = 1",
            )?;
            Ok((occurrences, classifications, current))
        })
        .await?;

    println!("Schema OK. Scope {scope}:");
    println!("  column occurrences:     {occurrences}");
    println!("  column classifications: {classifications}");
    println!("  current relationships:  {current}");

    Ok(())
}

async fn run_inference(config: &Config) -> Result<()> {
    let db = Db::new(config.db_path());

    db.with_connection(|conn| migrate::run_migrations(conn)).await?;

    let scope = config.default_scope();
    log::info!("Running relationship inference for scope {scope}");

    let occurrences = fetch_column_occurrences(&db, &scope).await?;
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
        config.inference.matching_mode,
    );
    log::info!("Matched {} relationship candidates", candidates.len());

    let store = RelationshipStore::new(&db);
    let current = store.replace_scope(&scope, &candidates).await?;
    println!("Scope {scope}: {current} current relationships");

    Ok(())
}
