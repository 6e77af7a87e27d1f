// Dump stored daily rollups and the derived 7-day report as JSON.
//
// Usage: cargo run --example dump_daily -- [DB_PATH]
//   DB_PATH  default: ./data/network_stats.db

use netpulse::daily_store::DailyStore;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("./data/network_stats.db");

    let store = DailyStore::connect(path, 1).await?;
    store.init().await?;
    let rollups = store.all_rollups().await?;
    let recent = store.query_recent_days(7).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "rollups": rollups,
            "daily_7d": recent,
        }))?
    );
    Ok(())
}
