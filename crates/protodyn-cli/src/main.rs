//! protodyn - Decode and encode Protocol Buffer messages at runtime
//!
//! This tool loads a compiled `FileDescriptorSet` (as produced by
//! `protoc --descriptor_set_out`) and converts messages between the binary
//! wire format and JSON, without generated code.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use protodyn_core::value::record_to_json;
use protodyn_core::{
    Codec, CodecConfig, MessageDescriptor, Schema, UnknownFieldPolicy, Value,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;

/// Decode and encode Protocol Buffer messages against a descriptor set
#[derive(Parser, Debug)]
#[command(name = "protodyn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a binary message to JSON
    Decode(DecodeArgs),
    /// Encode a JSON message to binary
    Encode(EncodeArgs),
    /// List the messages in a descriptor set
    List(SchemaArgs),
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Binary FileDescriptorSet describing the messages
    #[arg(short, long, env = "PROTODYN_DESCRIPTOR_SET")]
    descriptor_set: PathBuf,
}

#[derive(Args, Debug)]
struct CodecArgs {
    /// Fully-qualified message name, e.g. `pkg.Message`
    #[arg(short, long)]
    message: String,

    /// Maximum nesting depth of messages
    #[arg(long, default_value = "100")]
    max_depth: usize,

    /// Discard fields the schema does not declare instead of failing
    #[arg(long)]
    skip_unknown: bool,

    /// Use packed encoding for repeated numeric fields
    #[arg(long)]
    pack: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    #[command(flatten)]
    codec: CodecArgs,

    /// Binary input file (`-` for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    #[command(flatten)]
    codec: CodecArgs,

    /// JSON input file (`-` for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Binary output file
    #[arg(short, long, required_unless_present = "hex")]
    output: Option<PathBuf>,

    /// Print the encoding as lowercase hex on stdout
    #[arg(long)]
    hex: bool,
}

impl CodecArgs {
    fn codec(&self) -> Codec {
        let unknown_fields = if self.skip_unknown {
            UnknownFieldPolicy::Skip
        } else {
            UnknownFieldPolicy::Reject
        };

        Codec::with_config(
            CodecConfig::new()
                .max_depth(self.max_depth)
                .unknown_fields(unknown_fields)
                .pack_repeated_scalars(self.pack),
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Decode(args) => decode(args),
        Command::Encode(args) => encode(args),
        Command::List(args) => list(args),
    }
}

/// Decode a binary message and print it as JSON
fn decode(args: &DecodeArgs) -> Result<()> {
    let schema = load_schema(&args.schema.descriptor_set)?;
    let message = find_message(&schema, &args.codec.message)?;

    let bytes = read_input(&args.input)?;
    let record = args
        .codec
        .codec()
        .decode(&bytes, &message)
        .with_context(|| format!("Failed to decode {} as {}", display(&args.input), message.full_name()))?;

    info!("Decoded {} fields from {} bytes", record.len(), bytes.len());

    let mut json = serde_json::to_string_pretty(&record_to_json(&record))
        .context("Failed to render JSON")?;
    json.push('\n');

    match &args.output {
        Some(path) => write_file(path, json.as_bytes()),
        None => write_stdout(json.as_bytes()),
    }
}

/// Encode a JSON message to the wire format
fn encode(args: &EncodeArgs) -> Result<()> {
    let schema = load_schema(&args.schema.descriptor_set)?;
    let message = find_message(&schema, &args.codec.message)?;

    let input = read_input(&args.input)?;
    let json: serde_json::Value = serde_json::from_slice(&input)
        .with_context(|| format!("Failed to parse JSON from {}", display(&args.input)))?;

    let record = match Value::from_json(&json) {
        Some(Value::Message(record)) => record,
        _ => bail!("Input must be a JSON object, found: {}", json_kind(&json)),
    };

    let bytes = args
        .codec
        .codec()
        .encode(&record, &message)
        .with_context(|| format!("Failed to encode {}", message.full_name()))?;

    info!("Encoded {} fields into {} bytes", record.len(), bytes.len());

    if args.hex {
        let mut hex = to_hex(&bytes);
        hex.push('\n');
        write_stdout(hex.as_bytes())?;
    }
    if let Some(path) = &args.output {
        write_file(path, &bytes)?;
    }

    Ok(())
}

/// Print every message name in the descriptor set
fn list(args: &SchemaArgs) -> Result<()> {
    let schema = load_schema(&args.descriptor_set)?;

    let mut out = String::new();
    for message in schema.messages() {
        out.push_str(message.full_name());
        out.push('\n');
    }
    write_stdout(out.as_bytes())
}

fn load_schema(path: &Path) -> Result<Schema> {
    trace!("Reading {}", path.display());
    let data = fs::read(path)
        .with_context(|| format!("Failed to read descriptor set: {}", path.display()))?;

    let schema = Schema::decode_file_descriptor_set(&data)
        .with_context(|| format!("Failed to load descriptor set: {}", path.display()))?;

    debug!(
        "Loaded {} files with {} messages from {}",
        schema.files().len(),
        schema.messages().len(),
        path.display()
    );
    Ok(schema)
}

fn find_message(schema: &Schema, name: &str) -> Result<MessageDescriptor> {
    match schema.get_message_by_name(name) {
        Some(message) => Ok(message),
        None => bail!("Message '{}' not found in descriptor set", name),
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .context("Failed to read stdin")?;
        return Ok(data);
    }

    fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, data).with_context(|| format!("Failed to write file: {}", path.display()))?;
    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(data).context("Failed to write to stdout")?;
    stdout.flush().context("Failed to write to stdout")
}

fn display(path: &Path) -> String {
    if path == Path::new("-") {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
