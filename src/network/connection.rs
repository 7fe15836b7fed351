use std::time::Duration;

use futures::{SinkExt, StreamExt};
use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace};

use crate::core::{Error, Result};
use crate::protocol::codec::ChecksumFn;
use crate::protocol::{Frame, FrameCodec};
use crate::util::Hex;

/// Opens the TCP connection to the RS485 gateway.
///
/// The socket gets `TCP_NODELAY` so single frames go out immediately, and
/// keepalive so a silently vanished gateway is eventually noticed.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let stream = match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(Error::connect(format!("Failed to connect to {}:{}: {}", host, port, e)))
        }
        Err(_) => {
            return Err(Error::connect(format!(
                "Timed out connecting to {}:{} after {:?}",
                host, port, timeout
            )))
        }
    };

    stream.set_nodelay(true)?;
    SockRef::from(&stream).set_keepalive(true)?;

    info!(peer = %stream.peer_addr()?, "connected to gateway");
    Ok(stream)
}

/// Frame reader/writer over any byte stream
pub struct Transport<T> {
    framed: Framed<T, FrameCodec>,
}

impl<T> Transport<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `io`, validating incoming frames with `checksum`
    pub fn new(io: T, checksum: ChecksumFn) -> Self {
        Transport {
            framed: Framed::new(io, FrameCodec::with_checksum(checksum)),
        }
    }

    /// Waits for the next valid frame.
    ///
    /// Corrupt bytes are skipped inside the codec. `None` means the peer
    /// closed the stream.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.framed.next().await {
            Some(Ok(frame)) => {
                trace!(frame = %Hex(&frame.to_bytes()), "received");
                Ok(Some(frame))
            }
            Some(Err(e)) => Err(e),
            None => {
                debug!(discarded = self.discarded(), "stream closed by peer");
                Ok(None)
            }
        }
    }

    /// Writes one frame and flushes it
    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        trace!(frame = %Hex(&frame.to_bytes()), "sending");
        self.framed.send(frame).await
    }

    /// Bytes dropped while resynchronising
    pub fn discarded(&self) -> u64 {
        self.framed.codec().discarded()
    }
}
