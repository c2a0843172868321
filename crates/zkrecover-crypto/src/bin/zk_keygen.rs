//! ZK Key Generation Tool for zkrecover.
//!
//! Generates Groth16 proving and verifying keys for the recovery circuits.
//!
//! Usage:
//!   cargo run --bin zk-keygen -- generate --output ./zk-keys
//!   cargo run --bin zk-keygen -- generate --circuit commitment-recovery
//!   cargo run --bin zk-keygen -- verify --vk ./zk-keys/identity_query.vk.bin

use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zkrecover_crypto::groth16::{pk_to_bytes, vk_from_bytes, vk_hash, vk_to_bytes};
use zkrecover_crypto::CircuitKind;

const CIRCUIT_VERSION: &str = "1.0.0";
const DEFAULT_TREE_DEPTH: usize = 20;

/// ZK Key Generation Tool for zkrecover recovery proofs.
#[derive(Parser)]
#[command(name = "zk-keygen")]
#[command(about = "Generate Groth16 proving and verifying keys for zkrecover circuits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate new proving and verifying keys.
    Generate {
        /// Output directory for keys.
        #[arg(short, long, default_value = "./zk-keys")]
        output: PathBuf,

        /// Circuit to generate keys for (omit for all).
        #[arg(short, long)]
        circuit: Option<CircuitKind>,

        /// Identity registry tree depth.
        #[arg(short, long, default_value_t = DEFAULT_TREE_DEPTH, env = "ZKRECOVER_TREE_DEPTH")]
        depth: usize,
    },

    /// Verify that a verifying key matches expected hash.
    Verify {
        /// Path to verifying key file.
        #[arg(long)]
        vk: PathBuf,

        /// Expected VK hash (hex).
        #[arg(short, long)]
        expected_hash: Option<String>,
    },

    /// Show information about existing keys.
    Info {
        /// Directory containing keys.
        #[arg(short, long, default_value = "./zk-keys")]
        keys_dir: PathBuf,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "info,zkrecover_crypto=debug",
            _ => "debug",
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer().with_target(cli.verbose >= 2)).init();
    }
}

fn generate_keys(
    output_dir: &Path,
    circuit: Option<CircuitKind>,
    depth: usize,
) -> anyhow::Result<()> {
    println!("zkrecover ZK Key Generator v{}", CIRCUIT_VERSION);
    println!("==================================");
    println!("Merkle depth: {}", depth);
    println!();

    fs::create_dir_all(output_dir)?;

    let kinds = match circuit {
        Some(kind) => vec![kind],
        None => CircuitKind::ALL.to_vec(),
    };
    for kind in kinds {
        generate_circuit_keys(output_dir, kind, depth)?;
    }

    println!();
    println!("Key generation complete!");
    println!();
    println!("To use these keys:");
    println!("  1. Point [keys].dir in zkrecover.toml at the verifying keys");
    println!("  2. Copy the .pk.bin files to clients that need to generate proofs");
    println!("  3. Compare VK hashes with `zk-keygen verify` before deployment");

    Ok(())
}

fn generate_circuit_keys(
    output_dir: &Path,
    kind: CircuitKind,
    depth: usize,
) -> anyhow::Result<()> {
    info!(circuit = %kind, "running circuit-specific setup");
    let (pk, vk) = kind.setup(depth)?;
    let stem = kind.file_stem();

    let pk_bytes = pk_to_bytes(&pk)?;
    let pk_path = output_dir.join(format!("{}.pk.bin", stem));
    File::create(&pk_path)?.write_all(&pk_bytes)?;
    println!("Proving key: {} ({} bytes)", pk_path.display(), pk_bytes.len());

    let vk_bytes = vk_to_bytes(&vk)?;
    let vk_path = output_dir.join(format!("{}.vk.bin", stem));
    File::create(&vk_path)?.write_all(&vk_bytes)?;
    println!("Verifying key: {} ({} bytes)", vk_path.display(), vk_bytes.len());

    let hash = vk_hash(&vk_bytes);
    let hash_path = output_dir.join(format!("{}.vk.hash", stem));
    writeln!(File::create(&hash_path)?, "{}", hash)?;
    println!("VK hash: {}", hash);

    let merkle_depth = (kind == CircuitKind::IdentityQuery).then_some(depth);
    let meta_path = output_dir.join(format!("{}.meta.json", stem));
    let metadata = serde_json::json!({
        "circuit": stem,
        "version": CIRCUIT_VERSION,
        "merkle_depth": merkle_depth,
        "public_inputs": kind.num_public_inputs(),
        "vk_hash": hash,
        "pk_size": pk_bytes.len(),
        "vk_size": vk_bytes.len(),
        "generated_at": chrono::Utc::now().to_rfc3339(),
    });
    serde_json::to_writer_pretty(File::create(&meta_path)?, &metadata)?;
    info!(circuit = %kind, path = %meta_path.display(), "keys written");

    Ok(())
}

fn verify_key(vk_path: &Path, expected_hash: Option<String>) -> anyhow::Result<()> {
    println!("Verifying key: {}", vk_path.display());

    let vk_bytes = fs::read(vk_path)?;
    let actual_hash = vk_hash(&vk_bytes);
    println!("VK hash: {}", actual_hash);
    println!("Size: {} bytes", vk_bytes.len());

    let vk = vk_from_bytes(&vk_bytes)?;
    println!("Deserialization: OK ({} public inputs)", vk.gamma_abc_g1.len().saturating_sub(1));

    if let Some(expected) = expected_hash {
        if actual_hash == expected.trim() {
            println!("Hash match: OK");
        } else {
            warn!(expected = %expected, actual = %actual_hash, "verifying key hash mismatch");
            eprintln!("Hash MISMATCH!");
            eprintln!("  Expected: {}", expected);
            eprintln!("  Actual:   {}", actual_hash);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn show_info(keys_dir: &Path) -> anyhow::Result<()> {
    println!("zkrecover ZK Keys Info");
    println!("======================");
    println!("Directory: {}", keys_dir.display());
    println!();

    let mut found = false;
    for kind in CircuitKind::ALL {
        let meta_path = keys_dir.join(format!("{}.meta.json", kind.file_stem()));
        if !meta_path.exists() {
            continue;
        }
        found = true;
        let metadata: serde_json::Value = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
        println!("{}:", kind);
        println!("  Version: {}", metadata["version"]);
        println!("  Merkle depth: {}", metadata["merkle_depth"]);
        println!("  Public inputs: {}", metadata["public_inputs"]);
        println!("  VK hash: {}", metadata["vk_hash"]);
        println!("  PK size: {} bytes", metadata["pk_size"]);
        println!("  VK size: {} bytes", metadata["vk_size"]);
        println!("  Generated: {}", metadata["generated_at"]);
    }

    if !found {
        println!("No keys found. Run 'zk-keygen generate' first.");
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Commands::Generate {
            output,
            circuit,
            depth,
        } => generate_keys(&output, circuit, depth)?,
        Commands::Verify { vk, expected_hash } => verify_key(&vk, expected_hash)?,
        Commands::Info { keys_dir } => show_info(&keys_dir)?,
    }

    Ok(())
}
