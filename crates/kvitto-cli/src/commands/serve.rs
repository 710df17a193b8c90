//! Server command implementation

use std::path::Path;

use anyhow::Result;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Kvitto API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}/api", host, port);

    let config = kvitto_server::ServerConfig {
        require_auth: !no_auth,
        ..kvitto_server::ServerConfig::from_env()
    };

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!(
            "   🔑 API keys: {} configured (KVITTO_API_KEYS)",
            config.api_keys.len()
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    kvitto_server::serve(db, host, port, config).await?;

    Ok(())
}
