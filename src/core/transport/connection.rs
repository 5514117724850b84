//! Client-side endpoint establishment.
//!
//! A [`Connection`] is the pair of framed halves the client proxy needs,
//! plus the server child process when the endpoint is a spawned command.

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::process::Child;
use tracing::info;

use super::framing::{FrameReader, FrameWriter};
use super::{TransportConfig, TransportError, TransportResult};

/// Type-erased buffered read half.
pub type DynReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Type-erased write half.
pub type DynWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// How the client reaches the tool server.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Transport selection (stdio spawns `server_command`, tcp dials).
    pub transport: TransportConfig,

    /// Server executable used by the stdio transport.
    pub server_command: String,

    /// Arguments passed to the server executable.
    pub server_args: Vec<String>,

    /// Extra environment for the spawned server.
    pub server_env: Vec<(String, String)>,
}

/// An open, framed, bidirectional channel to the tool server.
pub struct Connection {
    pub reader: FrameReader<DynReader>,
    pub writer: FrameWriter<DynWriter>,
    pub child: Option<Child>,
}

impl Connection {
    /// Wrap an arbitrary pair of byte streams.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: DynReader = Box::new(BufReader::new(reader));
        let writer: DynWriter = Box::new(writer);
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            child: None,
        }
    }

    /// Open the configured endpoint.
    pub async fn open(endpoint: &Endpoint) -> TransportResult<Self> {
        info!("Connecting to tool server via {}", endpoint.transport.description());

        match &endpoint.transport {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio => Self::spawn(endpoint),
            #[cfg(feature = "tcp")]
            TransportConfig::Tcp(cfg) => Self::dial(&format!("{}:{}", cfg.host, cfg.port)).await,
        }
    }

    /// Launch the server as a child process and talk over its pipes.
    ///
    /// The server's stderr is inherited so its logs stay visible.
    #[cfg(feature = "stdio")]
    pub fn spawn(endpoint: &Endpoint) -> TransportResult<Self> {
        use std::process::Stdio;
        use tokio::process::Command;

        let mut child = Command::new(&endpoint.server_command)
            .args(&endpoint.server_args)
            .envs(endpoint.server_env.iter().cloned())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::spawn(&endpoint.server_command, e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::protocol("server stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::protocol("server stdout was not captured"))?;

        info!(
            pid = child.id(),
            "Spawned tool server '{}'", endpoint.server_command
        );

        let mut connection = Self::from_io(stdout, stdin);
        connection.child = Some(child);
        Ok(connection)
    }

    /// Connect to a listening server.
    #[cfg(feature = "tcp")]
    pub async fn dial(address: &str) -> TransportResult<Self> {
        use tokio::net::TcpStream;

        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| TransportError::connect(address, e))?;
        stream.set_nodelay(true)?;

        info!("Connected to tool server at {}", address);

        let (read_half, write_half) = stream.into_split();
        Ok(Self::from_io(read_half, write_half))
    }
}
