//! Persistent TCP connection to the detection service

use std::future::Future;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::codec::{ResponseFraming, FIXED_RESPONSE_LEN, MAX_CHUNK_LEN};
use crate::error::ConnectionError;

/// Receive buffer ceiling for line framing; a server that never sends `\n`
/// is treated as a lost connection rather than buffered forever
const MAX_LINE_LEN: usize = 64 * 1024;

/// Single request/response connection. Only the transceive stage uses it;
/// the controller closes it once at shutdown.
pub struct Connection {
    stream: Option<TcpStream>,
    peer: String,
    framing: ResponseFraming,
    io_timeout: Duration,
    rx_buf: BytesMut,
}

impl Connection {
    /// Connect with Nagle disabled so each frame is flushed promptly
    #[instrument(skip(framing, io_timeout))]
    pub async fn open(
        host: &str,
        port: u16,
        framing: ResponseFraming,
        io_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let peer = format!("{}:{}", host, port);
        let connect_err = |source: std::io::Error| ConnectionError::Connect {
            addr: peer.clone(),
            source,
        };

        let stream = timeout(io_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| connect_err(std::io::ErrorKind::TimedOut.into()))?
            .map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;

        info!("Connected to detection server {} ({:?} framing)", peer, framing);

        Ok(Self {
            stream: Some(stream),
            peer,
            framing,
            io_timeout,
            rx_buf: BytesMut::with_capacity(MAX_CHUNK_LEN),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one framed request and read its response. Every failure is
    /// `ConnectionLost`; the connection must not be reused afterwards.
    pub async fn exchange(&mut self, message: &[u8]) -> Result<Bytes, ConnectionError> {
        let io_timeout = self.io_timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ConnectionError::lost("connection already closed"))?;

        with_timeout(io_timeout, "write", async {
            stream.write_all(message).await?;
            stream.flush().await
        })
        .await?;

        match self.framing {
            ResponseFraming::Fixed => {
                let mut response = vec![0u8; FIXED_RESPONSE_LEN];
                with_timeout(io_timeout, "read", stream.read_exact(&mut response)).await?;
                Ok(Bytes::from(response))
            }
            ResponseFraming::Chunk => {
                let mut chunk = vec![0u8; MAX_CHUNK_LEN];
                let n = with_timeout(io_timeout, "read", stream.read(&mut chunk)).await?;
                if n == 0 {
                    return Err(ConnectionError::lost("server closed the connection"));
                }
                chunk.truncate(n);
                Ok(Bytes::from(chunk))
            }
            ResponseFraming::Line => {
                loop {
                    if let Some(pos) = self.rx_buf.iter().position(|&b| b == b'\n') {
                        let mut line = self.rx_buf.split_to(pos + 1);
                        line.truncate(pos);
                        if !self.rx_buf.is_empty() {
                            debug!("{} byte(s) of a later response buffered", self.rx_buf.len());
                        }
                        return Ok(line.freeze());
                    }
                    if self.rx_buf.len() >= MAX_LINE_LEN {
                        return Err(ConnectionError::lost(format!(
                            "no line terminator within {} bytes",
                            MAX_LINE_LEN
                        )));
                    }

                    self.rx_buf.reserve(MAX_CHUNK_LEN);
                    let n =
                        with_timeout(io_timeout, "read", stream.read_buf(&mut self.rx_buf)).await?;
                    if n == 0 {
                        return Err(ConnectionError::lost("server closed the connection"));
                    }
                }
            }
        }
    }

    /// Shut the socket down. Closing an already-closed connection is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Socket shutdown for {}: {}", self.peer, e);
            }
            self.rx_buf.clear();
            info!("Connection to {} closed", self.peer);
        }
    }

    /// Bytes received past the last returned response
    pub fn buffered(&self) -> usize {
        self.rx_buf.remaining()
    }
}

async fn with_timeout<T, F>(limit: Duration, op: &str, fut: F) -> Result<T, ConnectionError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ConnectionError::lost(format!("{} failed: {}", op, e))),
        Err(_) => Err(ConnectionError::lost(format!("{} timed out after {:?}", op, limit))),
    }
}
