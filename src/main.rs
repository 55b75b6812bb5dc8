//! stripecode CLI
//!
//! Encodes a file into k data + m parity shards inside a coding directory,
//! and decodes it back from any k of them.
//!
//! # Usage
//!
//! ```text
//! stripecode encode photo.jpg -k 4 -m 2 -w 8 --buffer-size 1048576
//! stripecode encode --random 104857600 --seed 7 -k 10 -m 4
//! stripecode decode photo.jpg
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stripecode::adapters::{DirectoryBackend, DEFAULT_CODING_DIR};
use stripecode::ec::{
    Codec, CodecConfig, DecodeOptions, RandomInput, StripeDecoder, StripeEncoder, WordSize,
};
use stripecode::metrics::CodecMetrics;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Stripe-parallel Reed-Solomon erasure coding
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long, global = true, env = "PRINT_METRICS")]
    print_metrics: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a file (or random data) into shards
    Encode(EncodeArgs),
    /// Restore a file from its shards
    Decode(DecodeArgs),
}

#[derive(ClapArgs, Debug)]
struct EncodeArgs {
    /// File to encode
    #[arg(required_unless_present = "random", conflicts_with = "random")]
    input: Option<PathBuf>,

    /// Encode SIZE pseudo-random bytes instead of a file; nothing is written
    #[arg(long, value_name = "SIZE")]
    random: Option<u64>,

    /// Seed for --random
    #[arg(long, requires = "random")]
    seed: Option<u64>,

    /// Number of data shards (k)
    #[arg(short = 'k', long, env = "EC_DATA_SHARDS", default_value = "4")]
    data_shards: usize,

    /// Number of parity shards (m)
    #[arg(short = 'm', long, env = "EC_PARITY_SHARDS", default_value = "2")]
    parity_shards: usize,

    /// Field word size in bits (8, 16 or 32)
    #[arg(short = 'w', long, env = "EC_WORD_SIZE", default_value = "8", value_parser = parse_word_size)]
    word_size: WordSize,

    /// Packet size (0 for none)
    #[arg(long, env = "EC_PACKET_SIZE", default_value = "0")]
    packet_size: usize,

    /// Stripe buffer size in bytes (0 for a single stripe)
    #[arg(long, env = "EC_BUFFER_SIZE", default_value = "0")]
    buffer_size: usize,

    /// Directory receiving shards and metadata
    #[arg(long, env = "EC_CODING_DIR", default_value = DEFAULT_CODING_DIR)]
    coding_dir: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct DecodeArgs {
    /// Original file name; selects the shards in the coding directory
    input: PathBuf,

    /// Directory holding shards and metadata
    #[arg(long, env = "EC_CODING_DIR", default_value = DEFAULT_CODING_DIR)]
    coding_dir: PathBuf,

    /// Always invert a decoding matrix, even for a single lost data shard
    #[arg(long)]
    no_fast_path: bool,
}

fn parse_word_size(s: &str) -> Result<WordSize, String> {
    let bits: u32 = s.parse().map_err(|e| format!("{}", e))?;
    WordSize::from_bits(bits).map_err(|e| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    let metrics = Arc::new(CodecMetrics::new().context("failed to register metrics")?);

    match &args.command {
        Command::Encode(cmd) => run_encode(cmd, metrics.clone()).await?,
        Command::Decode(cmd) => run_decode(cmd, metrics.clone()).await?,
    }

    if args.print_metrics {
        print!("{}", metrics.gather_text()?);
    }

    Ok(())
}

async fn run_encode(cmd: &EncodeArgs, metrics: Arc<CodecMetrics>) -> anyhow::Result<()> {
    let config = CodecConfig::new(cmd.data_shards, cmd.parity_shards, cmd.word_size)
        .with_packet_size(cmd.packet_size)
        .with_buffer_size(cmd.buffer_size);
    let codec = Arc::new(Codec::new(config).context("invalid coding parameters")?);
    let encoder = StripeEncoder::new(codec.clone()).with_metrics(metrics);

    info!(
        "Encoding with k={} m={} w={} packet={} buffer={}",
        codec.config().data_shards,
        codec.config().parity_shards,
        codec.config().word_size,
        codec.config().packet_size,
        codec.config().buffer_size
    );

    let report = match (&cmd.input, cmd.random) {
        (_, Some(size)) => {
            let mut input = RandomInput::new(cmd.seed);
            encoder
                .encode(&mut input, size, "random", None)
                .await
                .context("random-input encode failed")?
        }
        (Some(path), None) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            let size = file.metadata().await?.len();
            let backend = DirectoryBackend::create(&cmd.coding_dir, path)
                .await
                .with_context(|| format!("failed to create {}", cmd.coding_dir.display()))?
                .with_data_shards(codec.data_shards());

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut reader = tokio::io::BufReader::new(file);
            encoder
                .encode(&mut reader, size, &name, Some(&backend))
                .await
                .with_context(|| format!("failed to encode {}", path.display()))?
        }
        (None, None) => bail!("an input file or --random SIZE is required"),
    };

    println!("{}", report);
    Ok(())
}

async fn run_decode(cmd: &DecodeArgs, metrics: Arc<CodecMetrics>) -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(&cmd.coding_dir, &cmd.input);
    let decoder = StripeDecoder::new(DecodeOptions {
        fast_path: !cmd.no_fast_path,
    })
    .with_metrics(metrics);

    let report = decoder
        .decode(&backend)
        .await
        .with_context(|| format!("failed to decode {}", cmd.input.display()))?;

    info!("Wrote {}", backend.decoded_path().display());
    println!("{}", report);
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("tokio=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
