//! Session configuration
//!
//! Centralized configuration with sensible defaults.

use std::fmt;

/// Derives the login secret from a password and the server-issued salt.
///
/// The server announces during the handshake whether it wants the
/// password plain or run through a cipher; the cipher itself is supplied
/// by the caller and treated as opaque here.
pub type PasswordCipher = fn(password: &str, salt: &str) -> String;

/// Login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    /// The password never reaches log output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Main configuration for a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Server address, host:port
    pub addr: String,

    /// Connection-establishment timeout (milliseconds); 0 uses the OS
    /// default
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds); 0 disables. Disabled by
    /// default: evaluations may legitimately run for a long time.
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds); 0 disables
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Authentication Configuration
    // -------------------------------------------------------------------------
    /// Credentials presented when the server requires a login
    pub credentials: Option<Credentials>,

    /// Cipher applied to the password when the server demands encrypted
    /// authentication
    pub cipher: Option<PasswordCipher>,

    // -------------------------------------------------------------------------
    // File Transfer Configuration
    // -------------------------------------------------------------------------
    /// Chunk size for file downloads and uploads (in bytes)
    pub file_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6311".to_string(),
            connect_timeout_ms: 5000,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            credentials: None,
            cipher: None,
            file_chunk_size: 1024 * 1024, // 1 MB
        }
    }
}

impl SessionConfig {
    /// Create a new config builder
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for SessionConfig
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the server address
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the connection-establishment timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the socket read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the socket write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the login credentials
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some(Credentials::new(user, password));
        self
    }

    /// Set the password cipher for encrypted authentication
    pub fn cipher(mut self, cipher: PasswordCipher) -> Self {
        self.config.cipher = Some(cipher);
        self
    }

    /// Set the file transfer chunk size (in bytes)
    pub fn file_chunk_size(mut self, size: usize) -> Self {
        self.config.file_chunk_size = size;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}
