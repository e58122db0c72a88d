//! pianos - prints the piano catalog held in the configured database

use anyhow::Context;

use pianos::database::{self, SessionFactory};
use pianos::settings::{self, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let config = Settings::load();

    // Default database lives in the platform data dir
    if config.uses_default_database() {
        let data_dir = settings::data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
    }

    let handle = database::configure(&config.database_config())
        .await
        .context("failed to open piano database")?;
    let factory = SessionFactory::new(handle.clone());

    let result = print_catalog(&factory).await;
    handle.close().await;
    result
}

async fn print_catalog(factory: &SessionFactory) -> anyhow::Result<()> {
    let mut session = factory.new_session().await?;

    for category in session.list_categories().await? {
        let pianos = category.pianos(&mut session).await?;
        println!("{} ({})", category.name, pianos.len());
        for piano in pianos {
            println!("  #{} {}", piano.id, piano.name);
        }
    }

    let uncategorized: Vec<_> = session
        .list_pianos()
        .await?
        .into_iter()
        .filter(|piano| piano.piano_category_id.is_none())
        .collect();
    if !uncategorized.is_empty() {
        println!("Uncategorized ({})", uncategorized.len());
        for piano in uncategorized {
            println!("  #{} {}", piano.id, piano.name);
        }
    }

    session.rollback().await?;
    Ok(())
}
