// ============================================================================
// codelock-db - CLI inspection tool for the code-lock registry
// ============================================================================
// Usage:
//   codelock-db stats                         Show registry statistics
//   codelock-db list [--show-codes]           List locks
//   codelock-db export --format json          Export full registry as JSON
//   codelock-db set 7 1234 --owner 100        Create a lock / change a code
//   codelock-db remove 7                      Delete a lock
// ============================================================================

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use codelock_core::{ActorId, InstanceId, LockCode, LockStore, UpsertOutcome};
use std::path::PathBuf;

/// Code-lock registry inspection tool
#[derive(Parser)]
#[command(name = "codelock-db", version, about = "Inspect and manage the code-lock registry")]
struct Cli {
    /// Path to the registry file (default: ~/.codelocks/locks.json)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show registry statistics (lock and remembered-user counts)
    Stats,

    /// List locks with their owners and remembered users
    List {
        /// Print codes in the clear instead of masking them
        #[arg(long)]
        show_codes: bool,
    },

    /// Export full registry contents as JSON
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Create a lock or change the code on an existing one
    Set {
        /// Instance id of the protected object
        instance: u64,

        /// Four-digit code (ex. 1234)
        code: String,

        /// Actor recorded as owner if the lock is created
        #[arg(long)]
        owner: u64,
    },

    /// Delete a lock
    Remove {
        /// Instance id of the protected object
        instance: u64,
    },
}

/// Resolve the registry file: explicit flag, then CODELOCK_REGISTRY, then
/// ~/.codelocks/locks.json.
fn registry_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Ok(env_path) = std::env::var("CODELOCK_REGISTRY") {
        return Ok(PathBuf::from(env_path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".codelocks").join("locks.json"))
}

fn open_store(flag: Option<PathBuf>) -> Result<LockStore> {
    let mut store = LockStore::new(registry_path(flag)?);
    store.load()?;
    Ok(store)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = open_store(cli.registry)?;

    match cli.command {
        Commands::Stats => cmd_stats(&store),
        Commands::List { show_codes } => cmd_list(&store, show_codes),
        Commands::Export { format } => cmd_export(&store, &format),
        Commands::Set {
            instance,
            code,
            owner,
        } => cmd_set(store, InstanceId(instance), &code, ActorId(owner)),
        Commands::Remove { instance } => cmd_remove(store, InstanceId(instance)),
    }
}

fn cmd_stats(store: &LockStore) -> Result<()> {
    let locks = store.snapshot();
    let remembered: usize = locks.iter().map(|lock| lock.users.len()).sum();
    let shared = locks.iter().filter(|lock| lock.users.len() > 1).count();

    println!("=== Code Lock Registry Stats ===");
    println!("Registry: {}", store.path().display());
    println!();
    println!("Locks:            {}", locks.len());
    println!("Shared locks:     {}", shared);
    println!("Remembered users: {}", remembered);

    Ok(())
}

fn cmd_list(store: &LockStore, show_codes: bool) -> Result<()> {
    let locks = store.snapshot();

    if locks.is_empty() {
        println!("No locks found.");
        return Ok(());
    }

    println!("{:<12}  {:<6}  {:<20}  {}", "INSTANCE", "CODE", "OWNER", "USERS");
    println!("{}", "-".repeat(70));

    for lock in &locks {
        let code = if show_codes {
            lock.code.to_string()
        } else {
            "****".to_string()
        };
        let owner = lock
            .owner()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<12}  {:<6}  {:<20}  {}",
            lock.instance_id,
            code,
            owner,
            lock.users.len()
        );
    }

    println!("\nTotal: {} locks", locks.len());
    Ok(())
}

fn cmd_export(store: &LockStore, format: &str) -> Result<()> {
    if format != "json" {
        anyhow::bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "registry": store.path().display().to_string(),
        "locks": store.snapshot(),
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

fn cmd_set(mut store: LockStore, instance_id: InstanceId, code: &str, owner: ActorId) -> Result<()> {
    let code: LockCode = code.parse()?;
    let outcome = store.upsert(instance_id, code, owner);
    store.save()?;

    match outcome {
        UpsertOutcome::Created => println!("Created lock on {} (owner {})", instance_id, owner),
        UpsertOutcome::Changed => println!("Changed code on {}", instance_id),
    }
    Ok(())
}

fn cmd_remove(mut store: LockStore, instance_id: InstanceId) -> Result<()> {
    if store.remove(instance_id) {
        store.save()?;
        println!("Removed lock on {}", instance_id);
    } else {
        println!("No lock on {}", instance_id);
    }
    Ok(())
}
