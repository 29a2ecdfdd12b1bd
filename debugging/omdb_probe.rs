//! Query OMDb through the same client the server uses and print what comes back.
//! Usage:
//!   cargo run --bin omdb_probe -- search <title words...>
//!   cargo run --bin omdb_probe -- detail <imdb_id>
//! Requires OMDB_API_KEY in the environment (.env supported).

use anyhow::{bail, Result};
use dotenvy::dotenv;
use popcorn::config::Config;
use popcorn::models::WatchedEntry;
use popcorn::omdb::{OmdbApi, OmdbClient, SearchOutcome, NO_MOVIES_FOUND};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin omdb_probe -- search <title words...>");
        eprintln!("       cargo run --bin omdb_probe -- detail <imdb_id>");
        std::process::exit(1);
    }

    let config = Config::from_env()?;
    let client = OmdbClient::new(&config)?;

    match args[0].as_str() {
        "search" => {
            let query = args[1..].join(" ");
            match client.search(&query).await? {
                SearchOutcome::Found(rows) => {
                    println!("Found {} results", rows.len());
                    for row in rows {
                        println!("{}\t{}\t{}", row.id, row.year, row.title);
                    }
                }
                SearchOutcome::NotFound => println!("{NO_MOVIES_FOUND}"),
            }
        }
        "detail" => {
            let detail = client.fetch_detail(&args[1]).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
            // Shows how the record would be stored if rated 10.
            let entry = WatchedEntry::from_detail(&detail, 10)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        other => bail!("unknown command '{}', expected 'search' or 'detail'", other),
    }

    Ok(())
}
