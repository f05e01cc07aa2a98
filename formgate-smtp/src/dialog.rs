//! The socket side of an SMTP conversation.
//!
//! [`Dialog`] is the seam between the transaction state machine and the
//! network: send one command line, read one complete reply, upgrade to
//! TLS. Tests drive the state machine through a scripted implementation;
//! production uses [`TcpDialog`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Result, SmtpError};
use crate::response::Reply;

/// Initial size of the reply read buffer.
const BUFFER_SIZE: usize = 8192;

/// Ceiling on reply buffer growth.
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// One side of an SMTP conversation, substitutable in tests.
#[async_trait]
pub trait Dialog: Send {
    /// Send one line; CRLF is appended here.
    async fn send_line(&mut self, line: &str) -> Result<()>;

    /// Read one complete (possibly multi-line) reply.
    async fn read_reply(&mut self) -> Result<Reply>;

    /// Upgrade the underlying connection to TLS. Called exactly once, after
    /// the server has accepted STARTTLS.
    async fn upgrade_tls(&mut self) -> Result<()>;
}

enum Conn {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Conn {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(data).await?,
            Self::Tls(stream) => stream.write_all(data).await?,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Self::Plain(stream) => stream.read(buf).await?,
            Self::Tls(stream) => stream.read(buf).await?,
        };
        if n == 0 {
            return Err(SmtpError::ConnectionClosed);
        }
        Ok(n)
    }
}

/// A real TCP dialog, plain until upgraded via STARTTLS.
pub struct TcpDialog {
    conn: Option<Conn>,
    server_name: String,
    buffer: Vec<u8>,
    filled: usize,
}

impl TcpDialog {
    /// Connect to `host:port`. `host` is also the name verified during the
    /// later TLS upgrade.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(Self {
            conn: Some(Conn::Plain(stream)),
            server_name: host.to_string(),
            buffer: vec![0u8; BUFFER_SIZE],
            filled: 0,
        })
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        self.conn.as_mut().ok_or(SmtpError::ConnectionClosed)
    }
}

#[async_trait]
impl Dialog for TcpDialog {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let data = format!("{line}\r\n");
        self.conn()?.send(data.as_bytes()).await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some((reply, consumed)) = Reply::parse(&self.buffer[..self.filled])? {
                self.buffer.copy_within(consumed..self.filled, 0);
                self.filled -= consumed;
                return Ok(reply);
            }

            if self.filled >= self.buffer.len() {
                let new_size = self.buffer.len() * 2;
                if new_size > MAX_BUFFER_SIZE {
                    return Err(SmtpError::Parse(format!(
                        "reply exceeds {MAX_BUFFER_SIZE} bytes"
                    )));
                }
                self.buffer.resize(new_size, 0);
            }

            // Borrow the connection and the buffer as disjoint fields.
            let conn = self.conn.as_mut().ok_or(SmtpError::ConnectionClosed)?;
            let n = conn.read(&mut self.buffer[self.filled..]).await?;
            self.filled += n;
        }
    }

    async fn upgrade_tls(&mut self) -> Result<()> {
        let Some(Conn::Plain(stream)) = self.conn.take() else {
            return Err(SmtpError::Tls("connection is not plain TCP".to_string()));
        };

        let mut root_store = RootCertStore::empty();
        let certs = rustls_native_certs::load_native_certs();
        for cert in certs.certs {
            root_store
                .add(cert)
                .map_err(|e| SmtpError::Tls(format!("failed to add certificate: {e}")))?;
        }
        if !certs.errors.is_empty() {
            tracing::warn!(errors = ?certs.errors, "some system certificates could not be loaded");
        }

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(self.server_name.clone())
            .map_err(|e| SmtpError::Tls(format!("invalid server name: {e}")))?;

        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| SmtpError::Tls(e.to_string()))?;

        self.conn = Some(Conn::Tls(Box::new(tls_stream)));
        Ok(())
    }
}
