// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Line-framed TCP connection to the daemon.
//!
//! The daemon speaks newline-terminated UTF-8 text. Responses to normal
//! commands are one or more lines terminated by a blank line; `listen`
//! never terminates. Any line starting with `ERR:` is a command error.
//!
//! A connection is a single blocking socket owned by one logical task:
//! request/response pairs never interleave. The configured timeout
//! applies to every socket operation except reads in stream mode, where
//! the bus may legitimately stay quiet for a long time.

use crate::error::{Error, Result};
use log::debug;
use socket2::{SockRef, TcpKeepalive};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const KEEPALIVE_TIME: Duration = Duration::from_secs(60);

struct Io {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// Reconnecting line-framed duplex to the daemon.
///
/// With `autoconnect` enabled, any I/O on a closed connection first
/// (re)establishes it; otherwise it fails with
/// [`Error::NotConnected`].
pub struct Connection {
    host: String,
    port: u16,
    autoconnect: bool,
    timeout: Option<Duration>,
    io: Option<Io>,
}

impl Connection {
    /// New, unconnected. Autoconnect off, no timeout.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Connection {
        Connection {
            host: host.into(),
            port,
            autoconnect: false,
            timeout: None,
            io: None,
        }
    }

    /// Enable automatic connect and re-connect.
    #[must_use]
    pub fn with_autoconnect(mut self, autoconnect: bool) -> Connection {
        self.autoconnect = autoconnect;
        self
    }

    /// Timeout applied to connect, send and non-stream receive.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Connection {
        self.timeout = Some(timeout);
        self
    }

    /// Host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Establish the connection.
    ///
    /// # Errors
    ///
    /// `Error::Io` on refused, unreachable or timed-out connect.
    pub fn connect(&mut self) -> Result<()> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("cannot resolve {}", self.host),
                ))
            })?;
        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        stream.set_nodelay(true)?;
        SockRef::from(&stream)
            .set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_TIME))?;
        let writer = stream.try_clone()?;
        self.io = Some(Io {
            reader: BufReader::new(stream),
            writer,
        });
        debug!("connected to {}:{}", self.host, self.port);
        Ok(())
    }

    /// Close the connection. Idempotent.
    pub fn disconnect(&mut self) {
        if self.io.take().is_some() {
            debug!("disconnected from {}:{}", self.host, self.port);
        }
    }

    /// Best-effort liveness: `true` if a socket is held. Does not probe
    /// whether the peer is still there.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.io.is_some()
    }

    /// Send one line (newline appended).
    ///
    /// # Errors
    ///
    /// `Error::NotConnected` without connection and autoconnect off;
    /// `Error::Io` if the link breaks.
    pub fn write(&mut self, line: &str) -> Result<()> {
        self.ensure_connected()?;
        let Some(io) = self.io.as_mut() else {
            return Err(Error::NotConnected);
        };
        if let Err(e) = io.writer.write_all(format!("{}\n", line).as_bytes()) {
            self.disconnect();
            return Err(e.into());
        }
        Ok(())
    }

    /// Receive one line, stripped of trailing whitespace. An `ERR:` line
    /// raises [`Error::Command`] after draining the rest of the
    /// response.
    pub fn read_line(&mut self) -> Result<String> {
        let line = self.next_line()?;
        if let Some(detail) = command_error(&line) {
            let detail = detail.to_string();
            self.drain_response()?;
            return Err(Error::Command(detail));
        }
        Ok(line)
    }

    /// Lazy sequence of received lines.
    ///
    /// Normal mode yields every line up to and including the first empty
    /// one, then terminates; `infinite` mode never terminates naturally
    /// and reads without timeout. With `check`, an `ERR:` line drains
    /// the remaining response and yields [`Error::Command`].
    pub fn read_lines(&mut self, infinite: bool, check: bool) -> Lines<'_> {
        if infinite {
            self.set_read_timeout(None);
        }
        Lines {
            conn: self,
            infinite,
            check,
            done: false,
        }
    }

    /// Receive one line without error-line checking.
    pub(crate) fn next_line(&mut self) -> Result<String> {
        self.ensure_connected()?;
        let Some(io) = self.io.as_mut() else {
            return Err(Error::NotConnected);
        };
        let mut buf = String::new();
        match io.reader.read_line(&mut buf) {
            Ok(0) => {
                self.disconnect();
                Err(Error::Disconnected)
            }
            Ok(_) => Ok(buf.trim_end().to_string()),
            Err(e) => {
                self.disconnect();
                Err(e.into())
            }
        }
    }

    /// Consume lines until the terminating blank line.
    pub(crate) fn drain_response(&mut self) -> Result<()> {
        loop {
            if self.next_line()?.is_empty() {
                return Ok(());
            }
        }
    }

    /// Switch the socket read timeout; `None` blocks indefinitely.
    pub(crate) fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        if let Some(io) = &self.io {
            let _ = io.reader.get_ref().set_read_timeout(timeout);
        }
    }

    /// Restore the configured request/response read timeout.
    pub(crate) fn restore_read_timeout(&mut self) {
        let timeout = self.timeout;
        self.set_read_timeout(timeout);
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.io.is_some() {
            return Ok(());
        }
        if self.autoconnect {
            self.connect()
        } else {
            Err(Error::NotConnected)
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("autoconnect", &self.autoconnect)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// `Some(detail)` if `line` is a daemon command error.
///
/// Both `ERR:` and `ERR: ` prefixes occur in the wild.
pub(crate) fn command_error(line: &str) -> Option<&str> {
    line.strip_prefix("ERR:").map(str::trim_start)
}

/// Iterator over received lines, see [`Connection::read_lines`].
pub struct Lines<'a> {
    conn: &'a mut Connection,
    infinite: bool,
    check: bool,
    done: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let line = match self.conn.next_line() {
            Ok(line) => line,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if self.check {
            if let Some(detail) = command_error(&line) {
                let detail = detail.to_string();
                self.done = true;
                if let Err(e) = self.conn.drain_response() {
                    return Some(Err(e));
                }
                return Some(Err(Error::Command(detail)));
            }
        }
        if line.is_empty() && !self.infinite {
            self.done = true;
        }
        Some(Ok(line))
    }
}

impl Drop for Lines<'_> {
    fn drop(&mut self) {
        if self.infinite {
            // the stream cannot end on its own, only a close interrupts it
            if !self.done {
                self.conn.disconnect();
            }
            self.conn.restore_read_timeout();
        } else if !self.done {
            // leftover response lines would corrupt the next request
            let _ = self.conn.drain_response();
        }
    }
}
