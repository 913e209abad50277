//! romscope CLI
//!
//! Identify files, print their metadata, extract embedded images, and run
//! encrypted containers through the cipher core.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing::{debug, info};

use romscope_core::{ByteSource, FileSource, PropertyValue};
use romscope_crypto::{ChainingMode, CipherContext, DecryptingSource, BLOCK_SIZE};
use romscope_formats::logging::{init_with_config, TracingConfig};
use romscope_formats::{ParseOptions, ParsedFile, RegistryError, BUILTIN_REGISTRY};

/// Bytes decrypted per read in `decrypt`; a multiple of the block size
const DECRYPT_CHUNK: usize = 1024 * 1024;

/// romscope - metadata and image extraction for ROM and texture files
#[derive(Parser)]
#[command(name = "romscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// YAML file with parse options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Identify files and show their properties
    Info(InfoArgs),

    /// Decode the first image of a file and write it as PNG
    Image(ImageArgs),

    /// List registered format handlers in dispatch order
    Formats,

    /// Decrypt a file with AES in ECB, CBC or CTR mode
    Decrypt(DecryptArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Files to inspect
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args)]
struct ImageArgs {
    /// File containing an image
    path: PathBuf,

    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct DecryptArgs {
    /// Encrypted input file
    input: PathBuf,

    /// Output path for the plaintext
    #[arg(short, long)]
    output: PathBuf,

    /// Key as hex (16, 24 or 32 bytes)
    #[arg(long)]
    key: String,

    /// IV or initial counter as hex (16 bytes; CBC and CTR only)
    #[arg(long)]
    iv: Option<String>,

    /// Chaining mode: ecb, cbc or ctr
    #[arg(long, default_value = "ctr")]
    mode: ChainingMode,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_with_config(TracingConfig::for_verbosity(cli.verbose));

    let options = match &cli.config {
        Some(path) => ParseOptions::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ParseOptions::default(),
    };
    debug!(?options, "parse options");

    match cli.command {
        Commands::Info(args) => cmd_info(args, &options, cli.format),
        Commands::Image(args) => cmd_image(args, &options),
        Commands::Formats => cmd_formats(cli.format),
        Commands::Decrypt(args) => cmd_decrypt(args),
    }
}

fn cmd_info(args: InfoArgs, options: &ParseOptions, format: OutputFormat) -> Result<()> {
    let results: Vec<(PathBuf, Result<ParsedFile, RegistryError>)> = args
        .paths
        .par_iter()
        .map(|path| (path.clone(), BUILTIN_REGISTRY.parse_path(path, options)))
        .collect();

    let failures = results.iter().filter(|(_, r)| r.is_err()).count();

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = results
                .iter()
                .map(|(path, result)| match result {
                    Ok(parsed) => serde_json::json!({
                        "path": path,
                        "result": parsed.to_json(),
                    }),
                    Err(e) => serde_json::json!({
                        "path": path,
                        "error": e.to_string(),
                    }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            for (path, result) in &results {
                match result {
                    Ok(parsed) => print_parsed(path, parsed),
                    Err(e) => println!("{}: error: {}", path.display(), error_chain(e)),
                }
            }
        }
    }

    if failures == results.len() {
        bail!("No file could be parsed");
    }
    Ok(())
}

fn print_parsed(path: &Path, parsed: &ParsedFile) {
    let name = BUILTIN_REGISTRY
        .get(parsed.format)
        .map_or(parsed.format, |h| h.name());
    println!("{}: {}", path.display(), name);

    let width = parsed.properties.names().map(str::len).max().unwrap_or(0);
    for (key, value) in parsed.properties.iter() {
        match value {
            PropertyValue::Bitmap(bitmap) => match parsed.texture(*bitmap) {
                Some(texture) => println!(
                    "  {:width$}  {}x{} image",
                    key,
                    texture.width(),
                    texture.height()
                ),
                None => println!("  {:width$}  {}", key, value),
            },
            _ => println!("  {:width$}  {}", key, value),
        }
    }
}

/// Error message followed by each of its causes
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn cmd_image(args: ImageArgs, options: &ParseOptions) -> Result<()> {
    let options = ParseOptions {
        decode_textures: true,
        ..options.clone()
    };
    let parsed = BUILTIN_REGISTRY
        .parse_path(&args.path, &options)
        .with_context(|| format!("Failed to parse {}", args.path.display()))?;

    let Some(texture) = parsed.textures.first() else {
        bail!("{} ({}) has no image", args.path.display(), parsed.format);
    };
    texture
        .bitmap
        .save_png(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        width = texture.width(),
        height = texture.height(),
        output = %args.output.display(),
        "image written"
    );
    println!(
        "Wrote {}x{} image to {}",
        texture.width(),
        texture.height(),
        args.output.display()
    );
    Ok(())
}

fn cmd_formats(format: OutputFormat) -> Result<()> {
    let handlers = BUILTIN_REGISTRY.handlers();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&handlers)?),
        OutputFormat::Text => {
            for h in &handlers {
                println!("{:<10} {:>4}  {:<28} .{}", h.id, h.priority, h.name, h.extensions.join(" ."));
                if !h.description.is_empty() {
                    println!("{:16}{}", "", h.description);
                }
            }
        }
    }
    Ok(())
}

fn cmd_decrypt(args: DecryptArgs) -> Result<()> {
    let key = hex::decode(args.key.trim()).context("Key is not valid hex")?;
    let iv = args
        .iv
        .as_deref()
        .map(|iv| hex::decode(iv.trim()).context("IV is not valid hex"))
        .transpose()?;

    let mut cipher = CipherContext::new();
    cipher.set_key(&key).context("Invalid key")?;
    cipher.set_chaining_mode(args.mode)?;

    let input = FileSource::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    if !args.mode.is_stream() && input.len() % BLOCK_SIZE as u64 != 0 {
        bail!(
            "{} is {} bytes, not a multiple of the {}-byte block size required by {:?}",
            args.input.display(),
            input.len(),
            BLOCK_SIZE,
            args.mode
        );
    }
    let source = DecryptingSource::new(input, cipher, iv.as_deref())
        .context("Cipher setup failed")?;

    let mut output = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?,
    );

    let total = source.len();
    let mut offset = 0u64;
    while offset < total {
        let len = (total - offset).min(DECRYPT_CHUNK as u64) as usize;
        let chunk = source
            .read(offset, len)
            .with_context(|| format!("Decryption failed at offset {}", offset))?;
        output.write_all(&chunk)?;
        offset += len as u64;
    }
    output.flush()?;

    info!(bytes = total, mode = ?args.mode, "decrypted");
    println!("Decrypted {} bytes to {}", total, args.output.display());
    Ok(())
}
