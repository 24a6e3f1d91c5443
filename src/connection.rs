//! Framed connection wrapper
//!
//! Wraps one TCP stream and exposes thread-safe send/receive of whole
//! messages. The two directions are independent (one task commonly reads
//! while another writes), but each direction is individually serialized so
//! concurrent senders never interleave frame bytes and concurrent receivers
//! each get one distinct message.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};

use crate::codec;
use crate::error::{ChatError, Result};
use crate::message::Message;

/// A bidirectional framed message stream over TCP
///
/// Created on accept (server) or on dial (client); closed by the owning
/// session handler. `close` unblocks any task parked in `send`/`receive`.
pub struct Connection {
    reader: Mutex<FrameReader>,
    writer: Mutex<OwnedWriteHalf>,
    peer_addr: SocketAddr,
    closed: watch::Sender<bool>,
}

/// Read half plus its decode buffer; guarded as one unit so a frame is never
/// split between two callers.
struct FrameReader {
    half: OwnedReadHalf,
    buffer: BytesMut,
}

impl FrameReader {
    async fn next_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = codec::decode(&mut self.buffer)? {
                return Ok(message);
            }
            let n = self.half.read_buf(&mut self.buffer).await?;
            if n == 0 {
                // EOF at a frame boundary is a clean close; mid-frame it is not
                return Err(if self.buffer.is_empty() {
                    ChatError::EndOfStream
                } else {
                    ChatError::Io(std::io::ErrorKind::UnexpectedEof.into())
                });
            }
        }
    }
}

impl Connection {
    /// Wrap an established TCP stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let (closed, _) = watch::channel(false);
        Ok(Self {
            reader: Mutex::new(FrameReader {
                half: read_half,
                buffer: BytesMut::with_capacity(4096),
            }),
            writer: Mutex::new(write_half),
            peer_addr,
            closed,
        })
    }

    /// Serialize and write one message as a single frame
    ///
    /// Atomic with respect to other concurrent `send` calls: a second
    /// message's bytes never interleave with a first's.
    pub async fn send(&self, message: &Message) -> Result<()> {
        let frame = codec::encode(message)?;

        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(ChatError::ConnectionClosed);
        }
        let mut writer = tokio::select! {
            guard = self.writer.lock() => guard,
            _ = closed.changed() => return Err(ChatError::ConnectionClosed),
        };
        tokio::select! {
            res = async {
                writer.write_all(&frame).await?;
                writer.flush().await?;
                Ok::<_, std::io::Error>(())
            } => res.map_err(ChatError::Io),
            _ = closed.changed() => Err(ChatError::ConnectionClosed),
        }
    }

    /// Block until a full message is available and return it
    ///
    /// Concurrent `receive` calls are serialized; no message is delivered
    /// twice.
    pub async fn receive(&self) -> Result<Message> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(ChatError::ConnectionClosed);
        }
        let mut reader = tokio::select! {
            guard = self.reader.lock() => guard,
            _ = closed.changed() => return Err(ChatError::ConnectionClosed),
        };
        tokio::select! {
            res = reader.next_message() => res,
            _ = closed.changed() => Err(ChatError::ConnectionClosed),
        }
    }

    /// Remote address, for diagnostics
    pub fn remote_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Release the underlying stream
    ///
    /// Idempotent; any task blocked in `send`/`receive` fails with
    /// `ConnectionClosed` rather than hanging.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        // Blocked senders observe the flag and release the lock promptly
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
