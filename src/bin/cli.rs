//! rqap CLI Client
//!
//! Command-line interface for talking to a QAP1 server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use rqap::{QapError, Session, SessionConfig};

/// rqap CLI
#[derive(Parser, Debug)]
#[command(name = "rqap-cli")]
#[command(about = "CLI client for QAP1 (Rserve) servers")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6311")]
    server: String,

    /// User name for authentication
    #[arg(short, long)]
    user: Option<String>,

    /// Password for authentication
    #[arg(short, long)]
    password: Option<String>,

    /// Socket read timeout in milliseconds (0 disables)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate an expression and print its value
    Eval {
        /// The R expression to evaluate
        expr: String,
    },

    /// Evaluate an expression, discarding the result
    VoidEval {
        /// The R expression to evaluate
        expr: String,
    },

    /// Download a file from the server's working directory
    Download {
        /// Remote file name
        remote: String,

        /// Local path to write to (defaults to the remote name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a local file to the server's working directory
    Upload {
        /// Local file to upload
        file: PathBuf,

        /// Remote file name (defaults to the local name)
        #[arg(short, long)]
        remote: Option<String>,
    },

    /// Delete a file in the server's working directory
    Remove {
        /// Remote file name
        remote: String,
    },

    /// Select the server-side string encoding
    SetEncoding {
        /// Encoding name, e.g. utf8, latin1, native
        encoding: String,
    },

    /// Ask the server to shut down
    Shutdown,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rqap=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> rqap::Result<()> {
    let mut builder = SessionConfig::builder()
        .addr(&args.server)
        .read_timeout_ms(args.read_timeout_ms);
    if let (Some(user), Some(password)) = (&args.user, &args.password) {
        builder = builder.credentials(user, password);
    }
    let config = builder.build();

    let mut session = Session::connect(&config)?;
    tracing::debug!(
        "Session established with {} (protocol {})",
        session.peer_addr(),
        session.server_version()
    );

    match args.command {
        Commands::Eval { expr } => {
            let value = session.eval(&expr)?;
            println!("{}", value);
        }
        Commands::VoidEval { expr } => {
            session.void_eval(&expr)?;
            tracing::info!("Evaluated");
        }
        Commands::Download { remote, output } => {
            let content = session.read_file(&remote)?;
            let output = output.unwrap_or_else(|| PathBuf::from(basename(&remote)));
            std::fs::write(&output, &content)?;
            tracing::info!("Wrote {} bytes to {}", content.len(), output.display());
        }
        Commands::Upload { file, remote } => {
            let remote = match remote {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        QapError::Io(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            format!("{} has no usable file name", file.display()),
                        ))
                    })?,
            };
            let content = std::fs::read(&file)?;
            session.write_file(&remote, &content)?;
            tracing::info!("Uploaded {} bytes as {}", content.len(), remote);
        }
        Commands::Remove { remote } => {
            session.remove_file(&remote)?;
            tracing::info!("Removed {}", remote);
        }
        Commands::SetEncoding { encoding } => {
            session.set_encoding(&encoding)?;
            tracing::info!("Encoding set to {}", encoding);
        }
        Commands::Shutdown => {
            session.shutdown()?;
            tracing::info!("Server shutting down");
        }
    }

    Ok(())
}

/// Final path component of a remote name.
fn basename(remote: &str) -> &str {
    remote.rsplit(&['/', '\\'][..]).next().unwrap_or(remote)
}
