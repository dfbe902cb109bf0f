//! Minecraft server-list-ping client
//!
//! Resolves `_minecraft._tcp` SRV indirection, performs the handshake/request
//! exchange and reads the framed JSON status response.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{LauncherError, Result};
use crate::protocol::{PacketBuilder, PacketReader};

/// Default Minecraft server port
pub const DEFAULT_PORT: u16 = 25565;

/// Additional socket reads permitted after the first response chunk
const MAX_EXTRA_READS: usize = 5;

/// Version block of a status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusVersion {
    /// Server brand and version name
    pub name: String,
    /// Protocol number the server speaks
    pub protocol: i64,
}

/// Player counts of a status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPlayers {
    /// Slot capacity
    pub max: i64,
    /// Currently connected players
    pub online: i64,
    /// Optional sample of connected player names
    #[serde(default)]
    pub sample: Option<Value>,
}

/// A parsed, normalized server-list-ping response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Version block
    pub version: Option<StatusVersion>,
    /// Player counts
    pub players: Option<StatusPlayers>,
    /// MOTD; always an object with at least a `text` field
    pub description: Value,
    /// Optional base64 favicon
    #[serde(default)]
    pub favicon: Option<String>,
    /// When this response was retrieved
    #[serde(rename = "retrievedAt")]
    pub retrieved_at: DateTime<Utc>,
}

/// Client for the server-list-ping exchange
#[derive(Debug, Clone)]
pub struct ServerStatusClient {
    protocol: u32,
    hostname: String,
    port: u16,
    idle_timeout: Duration,
}

impl ServerStatusClient {
    /// Create a client for `hostname:port` speaking the given protocol number
    pub fn new<S: Into<String>>(protocol: u32, hostname: S, port: u16) -> Self {
        Self {
            protocol,
            hostname: hostname.into(),
            port,
            idle_timeout: Duration::from_secs(5),
        }
    }

    /// Create a client against the default port
    pub fn with_default_port<S: Into<String>>(protocol: u32, hostname: S) -> Self {
        Self::new(protocol, hostname, DEFAULT_PORT)
    }

    /// Override the socket idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Perform the status exchange and return the normalized response
    pub async fn status(&self) -> Result<ServerStatus> {
        let (hostname, port) = match self.srv_candidate().await {
            Some((host, port)) => (host, port),
            None => (self.hostname.clone(), self.port),
        };

        let mut stream = self.connect(&hostname, port).await?;

        let mut handshake = PacketBuilder::new();
        handshake
            .put_varint(0x00)
            .put_varint(self.protocol)
            .put_string(&hostname)
            .put_u16(port)
            .put_varint(1);
        stream.write_all(&handshake.finish()).await?;

        let mut request = PacketBuilder::new();
        request.put_varint(0x00);
        stream.write_all(&request.finish()).await?;

        let json = self.read_response(&mut stream).await?;
        let mut parsed: Value = serde_json::from_str(&json)?;
        let Some(fields) = parsed.as_object_mut() else {
            return Err(LauncherError::unexpected_packet(
                "status response is not a JSON object",
            ));
        };

        // Old servers send the MOTD as a bare string
        if let Some(description) = fields.get("description") {
            if description.is_string() {
                let text = description.clone();
                fields.insert(
                    "description".to_string(),
                    serde_json::json!({ "text": text }),
                );
            }
        }
        fields.insert("retrievedAt".to_string(), serde_json::to_value(Utc::now())?);

        Ok(serde_json::from_value(parsed)?)
    }

    /// Look up `_minecraft._tcp.<hostname>` and return the first SRV target.
    ///
    /// IP literals never carry SRV records and lookup failures are not errors;
    /// both fall back to the configured host and port.
    async fn srv_candidate(&self) -> Option<(String, u16)> {
        if self.hostname.parse::<IpAddr>().is_ok() {
            return None;
        }
        let resolver = TokioAsyncResolver::tokio_from_system_conf().ok()?;
        let lookup = resolver
            .srv_lookup(format!("_minecraft._tcp.{}", self.hostname))
            .await
            .ok()?;
        let record = lookup.iter().next()?;
        let target = record.target().to_utf8();
        let target = target.trim_end_matches('.').to_string();
        log::debug!(
            "SRV record for {}: {}:{}",
            self.hostname,
            target,
            record.port()
        );
        Some((target, record.port()))
    }

    async fn connect(&self, hostname: &str, port: u16) -> Result<TcpStream> {
        let mut addrs = tokio::net::lookup_host((hostname, port))
            .await
            .map_err(|_| LauncherError::Unreachable(hostname.to_string()))?;
        let addr = addrs
            .next()
            .ok_or_else(|| LauncherError::Unreachable(hostname.to_string()))?;

        match tokio::time::timeout(self.idle_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Err(LauncherError::ConnectionRefused(format!("{hostname}:{port}")))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(LauncherError::timeout(format!("{hostname}:{port}"))),
        }
    }

    async fn read_chunk(&self, stream: &mut TcpStream, buf: &mut [u8]) -> Result<usize> {
        let n = tokio::time::timeout(self.idle_timeout, stream.read(buf))
            .await
            .map_err(|_| LauncherError::timeout("status response"))??;
        if n == 0 {
            return Err(LauncherError::Reset(
                "server closed the connection mid-response".into(),
            ));
        }
        Ok(n)
    }

    /// Read the framed response, joining fragmented TCP reads until the
    /// promised byte count has arrived.
    async fn read_response(&self, stream: &mut TcpStream) -> Result<String> {
        let mut buf = [0u8; 8 * 1024];
        let n = self.read_chunk(stream, &mut buf).await?;
        let mut reader = PacketReader::new(&buf[..n]);

        let frame_len = reader.read_varint()? as usize;
        let mut extra_reads = 0;
        while reader.remaining() < frame_len {
            if extra_reads >= MAX_EXTRA_READS {
                return Err(LauncherError::FrameOverflow(format!(
                    "status response still short of {frame_len} bytes after {MAX_EXTRA_READS} extra reads"
                )));
            }
            let n = self.read_chunk(stream, &mut buf).await?;
            reader.append(&buf[..n]);
            extra_reads += 1;
        }

        let packet_id = reader.read_varint()?;
        if packet_id != 0x00 {
            return Err(LauncherError::unexpected_packet(format!(
                "expected status response (0x00), got 0x{packet_id:02x}"
            )));
        }
        reader.read_string()
    }
}
