#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use diztrace_client::{
    demo_items, write_items, TcpTransport, ToolError, TraceIpcTool, TransportConfig,
};
use diztrace_host::{
    ApiContainer, InMemoryUserData, ServiceProvider, SharedUserData, UserDataApi, UserDataValue,
};
use diztrace_protocol::{decode_envelope, encode_envelope, EnvelopeHeader};
use tracing::info;

/// Exit status when nothing is listening on the trace endpoint.
const EXIT_NOT_LISTENING: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "diztrace", about = "Exchange SNES CPU trace records with a running emulator")]
struct Args {
    /// Emulator host. Defaults to `DIZTRACE_HOST`, then 127.0.0.1.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Emulator trace port. Defaults to `DIZTRACE_PORT`, then 27015.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Give up connecting after N milliseconds (0 waits for the OS).
    #[arg(long, global = true)]
    connect_timeout_ms: Option<u64>,

    /// Fail a read or write that stalls for N milliseconds (0 blocks indefinitely).
    #[arg(long, global = true)]
    io_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send the built-in one-record sample to the emulator.
    SendDemo,

    /// Receive one message from the emulator and print its records.
    Recv,

    /// Decode an envelope captured to a file and print its records.
    Decode {
        file: PathBuf,

        /// Print the envelope's declared lengths before the records.
        #[arg(long)]
        header: bool,
    },

    /// Write the sample envelope to a file.
    EncodeDemo { file: PathBuf },

    /// Inspect or edit a user-data file through the scripting API.
    Userdata {
        /// JSON file backing the store. Created on first write.
        #[arg(long)]
        file: PathBuf,

        #[command(subcommand)]
        action: UserDataAction,
    },
}

#[derive(Debug, Subcommand)]
enum UserDataAction {
    Get { key: String },
    /// Values parse as bool, integer or float before falling back to text.
    Set { key: String, value: String },
    Remove { key: String },
    Contains { key: String },
    Clear,
    List,
}

impl UserDataAction {
    fn mutates(&self) -> bool {
        matches!(
            self,
            UserDataAction::Set { .. } | UserDataAction::Remove { .. } | UserDataAction::Clear
        )
    }
}

fn transport_config(args: &Args) -> Result<TransportConfig> {
    let mut config = TransportConfig::from_env().context("invalid trace endpoint environment")?;
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        if port == 0 {
            bail!("--port must be non-zero");
        }
        config.port = port;
    }
    if let Some(ms) = args.connect_timeout_ms {
        config.connect_timeout = millis(ms);
    }
    if let Some(ms) = args.io_timeout_ms {
        config.io_timeout = millis(ms);
    }
    Ok(config)
}

fn millis(ms: u64) -> Option<Duration> {
    (ms != 0).then(|| Duration::from_millis(ms))
}

fn trace_tool(config: TransportConfig) -> TraceIpcTool<TcpTransport> {
    TraceIpcTool::new(TcpTransport::new(config))
}

fn decode_file(path: &Path, print_header: bool) -> Result<()> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read envelope: {}", path.display()))?;
    let items = decode_envelope(&bytes)
        .with_context(|| format!("failed to decode envelope: {}", path.display()))?;

    let mut out = BufWriter::new(io::stdout().lock());
    if print_header {
        // Already validated by the decode above.
        let header = EnvelopeHeader::parse(&bytes)?;
        writeln!(
            out,
            "envelope: {} bytes decompressed, {} bytes compressed",
            header.decompressed_len, header.compressed_len
        )?;
    }
    write_items(&mut out, &items).context("failed to write records")?;
    Ok(())
}

fn encode_demo(path: &Path) -> Result<()> {
    let bytes = encode_envelope(&demo_items())?;
    fs::write(path, &bytes)
        .with_context(|| format!("failed to write envelope: {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote demo envelope");
    Ok(())
}

fn load_user_data(path: &Path) -> Result<InMemoryUserData> {
    if !path.exists() {
        return Ok(InMemoryUserData::new());
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    InMemoryUserData::load_json(file)
        .with_context(|| format!("failed to load {}", path.display()))
}

fn run_user_data_action(
    api: &UserDataApi,
    action: &UserDataAction,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        UserDataAction::Get { key } => match api.get(key) {
            Some(value) => writeln!(out, "{value}")?,
            None => bail!("no user data for key {key:?}"),
        },
        UserDataAction::Set { key, value } => api.set(key, UserDataValue::parse_cli(value)),
        UserDataAction::Remove { key } => writeln!(out, "{}", api.remove(key))?,
        UserDataAction::Contains { key } => writeln!(out, "{}", api.contains_key(key))?,
        UserDataAction::Clear => api.clear(),
        UserDataAction::List => {
            for key in api.keys() {
                if let Some(value) = api.get(&key) {
                    writeln!(out, "{key}={value}")?;
                }
            }
        }
    }
    Ok(())
}

fn user_data(path: &Path, action: &UserDataAction) -> Result<()> {
    let store = Arc::new(Mutex::new(load_user_data(path)?));
    let shared: SharedUserData = store.clone();
    let container = ApiContainer::register(&ServiceProvider::new().with_user_data(shared));
    let api = container
        .user_data()
        .context("user data API was not registered")?;

    let mut out = io::stdout().lock();
    run_user_data_action(api, action, &mut out)?;

    if action.mutates() {
        let store = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        store
            .save_json(file)
            .with_context(|| format!("failed to save {}", path.display()))?;
        info!(path = %path.display(), entries = store.len(), "saved user data");
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::SendDemo => {
            let config = transport_config(args)?;
            info!(endpoint = %config.endpoint(), "sending demo records");
            trace_tool(config).send_demo()?;
        }
        Command::Recv => {
            let config = transport_config(args)?;
            info!(endpoint = %config.endpoint(), "waiting for trace message");
            let mut out = BufWriter::new(io::stdout().lock());
            trace_tool(config).receive_and_print(&mut out)?;
        }
        Command::Decode { file, header } => decode_file(file, *header)?,
        Command::EncodeDemo { file } => encode_demo(file)?,
        Command::Userdata { file, action } => user_data(file, action)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let refused = err
                .downcast_ref::<ToolError>()
                .is_some_and(ToolError::is_connection_refused);
            if refused {
                let endpoint = transport_config(&args).map(|config| config.endpoint()).ok();
                eprintln!(
                    "error: nothing is listening on {}; start the emulator's trace server first",
                    endpoint.as_deref().unwrap_or("the trace endpoint")
                );
                ExitCode::from(EXIT_NOT_LISTENING)
            } else {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        }
    }
}
