//! Session
//!
//! The connection façade: opens the socket, performs the identification
//! handshake and login, and exposes the server's commands as typed
//! methods.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::{PasswordCipher, SessionConfig};
use crate::error::{QapError, Result};
use crate::protocol::{
    encode_request, read_response, read_stream_response, Arg, CommandId, Parameter,
};
use crate::sexp::Sexp;

use super::transport;

/// Size of the identification block the server sends on connect.
const ID_BLOCK_LEN: usize = 32;

/// Authentication schemes offered in the identification block. The
/// presence of either scheme means the server requires a login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct AuthOffer {
    plaintext: bool,
    crypt: bool,
    salt: Option<String>,
}

impl AuthOffer {
    fn required(&self) -> bool {
        self.plaintext || self.crypt
    }
}

/// A connected session
///
/// The protocol is strictly half-duplex: one command is in flight at a
/// time, and its full response must be consumed before the next command
/// starts. Every command method takes `&mut self` for its whole exchange,
/// so the borrow checker enforces that ordering at compile time; sharing
/// a session across threads needs external synchronization around whole
/// commands, never around parts of one.
#[derive(Debug)]
pub struct Session {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,

    /// Protocol version announced in the handshake
    server_version: String,

    /// Authentication schemes the server offered
    auth: AuthOffer,

    /// Cipher for encrypted authentication, if configured
    cipher: Option<PasswordCipher>,

    /// Chunk size for file transfers
    file_chunk_size: usize,
}

impl Session {
    /// Connect to a server, read its identification block, and log in if
    /// it requires authentication and the configuration carries
    /// credentials.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let stream = open_stream(config)?;
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm: exchanges are small and latency-bound
        stream.set_nodelay(true)?;
        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let mut session = Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            peer_addr,
            server_version: String::new(),
            auth: AuthOffer::default(),
            cipher: config.cipher,
            file_chunk_size: config.file_chunk_size.max(1),
        };

        let mut id = [0u8; ID_BLOCK_LEN];
        transport::read_exact_buf(&mut session.reader, &mut id)?;
        let (version, auth) = parse_id_block(&id)?;
        tracing::debug!(
            "Connected to {} (protocol {}, authentication required: {})",
            session.peer_addr,
            version,
            auth.required()
        );
        session.server_version = version;
        session.auth = auth;

        if session.auth.required() {
            if let Some(credentials) = &config.credentials {
                session.login(&credentials.user, &credentials.password)?;
            } else {
                tracing::debug!(
                    "Server at {} requires authentication but no credentials are configured",
                    session.peer_addr
                );
            }
        }

        Ok(session)
    }

    /// Authenticate with the scheme the server offered.
    ///
    /// Plaintext is preferred when allowed; otherwise the password runs
    /// through the configured cipher with the server's salt.
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let secret = if self.auth.plaintext {
            password.to_string()
        } else if self.auth.crypt {
            let salt = self.auth.salt.as_deref().ok_or_else(|| {
                QapError::Protocol("server demands encrypted login but sent no salt".to_string())
            })?;
            let cipher = self.cipher.ok_or_else(|| {
                QapError::Unsupported(
                    "server demands encrypted authentication and no cipher is configured"
                        .to_string(),
                )
            })?;
            cipher(password, salt)
        } else {
            password.to_string()
        };

        self.exchange(
            CommandId::Login,
            &[Arg::String(format!("{}\n{}", user, secret))],
        )?;
        tracing::debug!("Logged in to {} as {}", self.peer_addr, user);
        Ok(())
    }

    /// Evaluate an expression and return its value.
    pub fn eval(&mut self, expr: &str) -> Result<Sexp> {
        let parameters = self.exchange(CommandId::Eval, &[Arg::String(expr.to_string())])?;
        first_sexp(parameters)
    }

    /// Evaluate an expression, discarding any result.
    pub fn void_eval(&mut self, expr: &str) -> Result<()> {
        self.exchange(CommandId::VoidEval, &[Arg::String(expr.to_string())])?;
        Ok(())
    }

    /// Assign a value to a symbol in the server's global environment.
    pub fn assign(&mut self, symbol: &str, value: &Sexp) -> Result<()> {
        self.exchange(
            CommandId::AssignSexp,
            &[Arg::String(symbol.to_string()), Arg::Sexp(value.clone())],
        )?;
        Ok(())
    }

    /// Select the encoding the server uses for strings, e.g. `"utf8"`.
    pub fn set_encoding(&mut self, encoding: &str) -> Result<()> {
        self.exchange(CommandId::SetEncoding, &[Arg::String(encoding.to_string())])?;
        Ok(())
    }

    /// Download a file from the server's working directory.
    pub fn read_file(&mut self, remote: &str) -> Result<Vec<u8>> {
        self.exchange(CommandId::OpenFile, &[Arg::String(remote.to_string())])?;

        let mut content = Vec::new();
        let mut chunk = vec![0u8; self.file_chunk_size];
        loop {
            // The argument caps the chunk at our buffer size.
            let limit = chunk.len().min(i32::MAX as usize) as i32;
            let request = encode_request(CommandId::ReadFile, &[Arg::Int(limit)]);
            transport::write_all(&mut self.writer, &request)?;
            let received = read_stream_response(&mut self.reader, &mut chunk)?;
            if received == 0 {
                break;
            }
            content.extend_from_slice(&chunk[..received]);
        }

        self.exchange(CommandId::CloseFile, &[])?;
        tracing::debug!(
            "Read {} bytes from {} on {}",
            content.len(),
            remote,
            self.peer_addr
        );
        Ok(content)
    }

    /// Upload a file to the server's working directory, replacing any
    /// existing content.
    pub fn write_file(&mut self, remote: &str, content: &[u8]) -> Result<()> {
        self.exchange(CommandId::CreateFile, &[Arg::String(remote.to_string())])?;
        for chunk in content.chunks(self.file_chunk_size) {
            self.exchange(CommandId::WriteFile, &[Arg::Bytes(chunk.to_vec())])?;
        }
        self.exchange(CommandId::CloseFile, &[])?;
        tracing::debug!(
            "Wrote {} bytes to {} on {}",
            content.len(),
            remote,
            self.peer_addr
        );
        Ok(())
    }

    /// Delete a file in the server's working directory.
    pub fn remove_file(&mut self, remote: &str) -> Result<()> {
        self.exchange(CommandId::RemoveFile, &[Arg::String(remote.to_string())])?;
        Ok(())
    }

    /// Ask the server to shut down. Consumes the session; the connection
    /// is gone afterwards.
    pub fn shutdown(mut self) -> Result<()> {
        self.exchange(CommandId::Shutdown, &[])?;
        Ok(())
    }

    /// Protocol version the server announced.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Send one command and read its complete response.
    fn exchange(&mut self, command: CommandId, args: &[Arg]) -> Result<Vec<Parameter>> {
        tracing::trace!("Sending {:?} with {} argument(s)", command, args.len());
        let request = encode_request(command, args);
        transport::write_all(&mut self.writer, &request)?;
        let parameters = match read_response(&mut self.reader) {
            Ok(parameters) => parameters,
            Err(e) => {
                tracing::warn!("{:?} failed for {}: {}", command, self.peer_addr, e);
                return Err(e);
            }
        };
        tracing::trace!("{:?} returned {} parameter(s)", command, parameters.len());
        Ok(parameters)
    }
}

fn open_stream(config: &SessionConfig) -> Result<TcpStream> {
    if config.connect_timeout_ms == 0 {
        return Ok(TcpStream::connect(&config.addr)?);
    }
    let addr = config.addr.to_socket_addrs()?.next().ok_or_else(|| {
        QapError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{} resolved to no addresses", config.addr),
        ))
    })?;
    let timeout = Duration::from_millis(config.connect_timeout_ms);
    Ok(TcpStream::connect_timeout(&addr, timeout)?)
}

/// Parse the 32-byte identification block: magic, protocol version, and
/// capability attributes.
fn parse_id_block(id: &[u8; ID_BLOCK_LEN]) -> Result<(String, AuthOffer)> {
    if &id[0..4] != b"Rsrv" {
        return Err(QapError::Protocol(
            "handshake does not begin with Rsrv".to_string(),
        ));
    }
    if &id[8..12] != b"QAP1" {
        return Err(QapError::Protocol(
            "server does not speak QAP1".to_string(),
        ));
    }
    let version = std::str::from_utf8(&id[4..8])
        .map_err(|_| QapError::Protocol("malformed protocol version in handshake".to_string()))?
        .to_string();
    if version != "0103" {
        return Err(QapError::Unsupported(format!("protocol version {}", version)));
    }

    let mut auth = AuthOffer::default();
    for chunk in id[12..].chunks_exact(4) {
        match chunk {
            b"ARpt" => auth.plaintext = true,
            b"ARuc" => auth.crypt = true,
            [b'K', salt @ ..] => {
                let salt: Vec<u8> = salt
                    .iter()
                    .take_while(|&&b| b != 0 && b != b' ')
                    .copied()
                    .collect();
                if let Ok(salt) = std::str::from_utf8(&salt) {
                    auth.salt = Some(salt.to_string());
                }
            }
            // R version and other informational attributes
            _ => {}
        }
    }
    Ok((version, auth))
}

/// The first S-expression among the response parameters.
fn first_sexp(parameters: Vec<Parameter>) -> Result<Sexp> {
    for parameter in parameters {
        if let Parameter::Sexp(value) = parameter {
            return Ok(value);
        }
    }
    Err(QapError::Protocol("response carried no value".to_string()))
}
