// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Top-level daemon client.
//!
//! A [`Client`] owns one [`Connection`] and the message catalog loaded
//! from the daemon. All operations serialize on the single socket;
//! callers wanting parallel reads create additional clients.
//!
//! The streaming operations ([`Client::listen`], [`Client::observe`],
//! [`Client::wait_scan_completed`]) hand out iterators borrowing the
//! client mutably, which pins the request/response discipline at compile
//! time. Dropping a stream iterator mid-flight closes the connection;
//! with autoconnect the next operation transparently reconnects.

use crate::connection::{Connection, Lines};
use crate::error::{Error, Result};
use crate::msg::{filter_msg, Decoded, Msg};
use crate::msgdecoder::{decode_line, decode_value};
use crate::msgdef::MsgDef;
use crate::msgdefdecoder::decode_msgdef;
use crate::msgdefs::MsgDefs;
use crate::request::Request;
use crate::types::Value;
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// The catalog query sent for `load_msgdefs` and scan polling.
const FIND_ALL: &str = "find -a -F type,circuit,name,fields";

/// Samples that must agree before the daemon scan counts as finished.
const SCAN_STABLE_POLLS: usize = 4;

/// Client for one ebusd instance.
///
/// # Example
///
/// ```rust,no_run
/// use ebus::{Client, Result};
///
/// fn main() -> Result<()> {
///     let mut client = Client::new("127.0.0.1", 8888);
///     client.load_msgdefs()?;
///     println!("{}", client.msgdefs().summary());
///
///     let selection = client.msgdefs().resolve("bai/*")?;
///     for msg in client.observe(Some(selection), false, None) {
///         let msg = msg?;
///         println!("{}", msg.ident());
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Client {
    connection: Connection,
    msgdefs: MsgDefs,
}

impl Client {
    /// New client with a reconnecting connection.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Client {
        Client {
            connection: Connection::new(host, port).with_autoconnect(true),
            msgdefs: MsgDefs::new(),
        }
    }

    /// Apply a timeout to connect, send and request/response receive.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Client {
        self.connection = self.connection.with_timeout(timeout);
        self
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The loaded message catalog.
    #[must_use]
    pub fn msgdefs(&self) -> &MsgDefs {
        &self.msgdefs
    }

    /// Close the connection. The next operation reconnects.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Load the message catalog from the daemon.
    ///
    /// Clears the previous catalog, fetches all message definitions and
    /// stores them ordered by `(circuit, name)`. Malformed lines are
    /// logged and skipped; synthetic `scan*` circuits from the daemon's
    /// discovery pass are dropped.
    pub fn load_msgdefs(&mut self) -> Result<()> {
        self.msgdefs.clear();
        let lines = self.request(FIND_ALL, false)?;
        for line in lines.iter().filter(|line| !line.is_empty()) {
            match decode_msgdef(line) {
                Ok(msgdef) if msgdef.circuit.starts_with("scan") => {}
                Ok(msgdef) => self.msgdefs.add(Arc::new(msgdef)),
                Err(e) => warn!("cannot decode message definition ({})", e),
            }
        }
        debug!("loaded {}", self.msgdefs.summary());
        Ok(())
    }

    /// Poll the catalog size until the daemon's background scan settles.
    ///
    /// The daemon discovers bus slaves progressively after startup. The
    /// returned iterator requests the catalog once per `interval`,
    /// yields the entry count per poll and terminates once the last
    /// four samples are equal.
    pub fn wait_scan_completed(&mut self, interval: Duration) -> ScanWait<'_> {
        ScanWait {
            client: self,
            interval,
            counts: Vec::new(),
            done: false,
        }
    }

    /// Read one message.
    ///
    /// With `prio`, the definition's priority is passed to the daemon as
    /// polling priority. `ttl` bounds the acceptable value age in
    /// seconds.
    ///
    /// Returns `None` when the daemon rejects the read (`ERR:` answer);
    /// an absent value is normal operation, logged at warn level.
    pub fn read(
        &mut self,
        msgdef: &Arc<MsgDef>,
        prio: bool,
        ttl: Option<u32>,
    ) -> Result<Option<Decoded>> {
        let cmd = Request::new("read")
            .opt("-c", Some(&msgdef.circuit))
            .opt("-p", if prio { msgdef.prio } else { None })
            .opt("-m", ttl)
            .arg(&msgdef.name)
            .build();
        match self.request(&cmd, true) {
            Ok(lines) => {
                let payload = lines.first().map(String::as_str).unwrap_or_default();
                Ok(Some(decode_value(msgdef, payload)))
            }
            Err(Error::Command(detail)) => {
                warn!("read {}: {}", msgdef.ident(), detail);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write a raw value string to a message.
    ///
    /// When `msgdef` carries a proper subset of the cataloged fields
    /// this becomes a read-modify-write: the current payload is read,
    /// the subset positions are substituted with the `;`-separated
    /// caller values and the combined payload is written back. That
    /// path requires the cataloged message to be readable.
    ///
    /// # Errors
    ///
    /// `Error::NotWritable` if the message does not support (partial)
    /// writing, `Error::Command` if the daemon rejects a command.
    pub fn write(&mut self, msgdef: &MsgDef, value: &str, ttl: Option<u32>) -> Result<()> {
        if !msgdef.write {
            return Err(Error::NotWritable(msgdef.ident()));
        }
        let full = self
            .msgdefs
            .get(&msgdef.circuit, &msgdef.name)
            .map(Arc::clone);
        match full {
            Some(full) if full.fields.len() != msgdef.fields.len() => {
                self.write_partial(msgdef, &full, value, ttl)
            }
            _ => self.write_direct(msgdef, value),
        }
    }

    /// Encode logical values with the field types, then write.
    ///
    /// `values` correspond to `msgdef.fields` in order. Integer types
    /// with divider multiply the logical value into the daemon's raw
    /// integer form; [`Value::Na`] renders the type's sentinel.
    pub fn write_values(
        &mut self,
        msgdef: &MsgDef,
        values: &[Value],
        ttl: Option<u32>,
    ) -> Result<()> {
        if values.len() != msgdef.fields.len() {
            return Err(Error::Encode(format!(
                "{} takes {} values, got {}",
                msgdef.ident(),
                msgdef.fields.len(),
                values.len()
            )));
        }
        let encoded = msgdef
            .fields
            .iter()
            .zip(values)
            .map(|(fielddef, value)| fielddef.type_.encode(value))
            .collect::<Result<Vec<String>>>()?;
        self.write(msgdef, &encoded.join(";"), ttl)
    }

    fn write_direct(&mut self, msgdef: &MsgDef, value: &str) -> Result<()> {
        let cmd = Request::new("write")
            .opt("-c", Some(&msgdef.circuit))
            .arg(&msgdef.name)
            .arg(value)
            .build();
        self.request(&cmd, true)?;
        Ok(())
    }

    fn write_partial(
        &mut self,
        partial: &MsgDef,
        full: &Arc<MsgDef>,
        value: &str,
        ttl: Option<u32>,
    ) -> Result<()> {
        if !full.read {
            return Err(Error::NotWritable(format!(
                "{} is not read-modify-writable",
                full.ident()
            )));
        }
        let cmd = Request::new("read")
            .opt("-c", Some(&full.circuit))
            .opt("-m", ttl)
            .arg(&full.name)
            .build();
        let lines = self.request(&cmd, true)?;
        let payload = lines.first().map(String::as_str).unwrap_or_default();
        if let Decoded::Broken(broken) = decode_value(full, payload) {
            return Err(Error::Command(format!(
                "cannot read current value of {}: {}",
                full.ident(),
                broken.error
            )));
        }
        let mut values: Vec<String> = payload.split(';').map(str::to_string).collect();
        let substitutes: Vec<&str> = value.split(';').collect();
        if substitutes.len() != partial.fields.len() {
            return Err(Error::Encode(format!(
                "{} partial write takes {} values, got {}",
                partial.ident(),
                partial.fields.len(),
                substitutes.len()
            )));
        }
        for (fielddef, substitute) in partial.fields.iter().zip(substitutes) {
            match values.get_mut(fielddef.idx) {
                Some(slot) => *slot = substitute.to_string(),
                None => {
                    return Err(Error::Encode(format!(
                        "payload of {} has no position {}",
                        full.ident(),
                        fielddef.idx
                    )))
                }
            }
        }
        self.write_direct(partial, &values.join(";"))
    }

    /// Stream decoded messages from the daemon's listen mode.
    ///
    /// Skips the `listen started` acknowledgment. With a selection,
    /// each message is filtered and possibly narrowed; unknown messages
    /// are dropped silently and undecodable lines are logged and
    /// skipped. The stream never terminates on its own: dropping the
    /// iterator closes the connection.
    pub fn listen(&mut self, selection: Option<MsgDefs>) -> Result<Listen<'_>> {
        self.connection.write("listen")?;
        self.connection.set_read_timeout(None);
        Ok(Listen {
            client: self,
            selection,
            done: false,
        })
    }

    /// Observe a selection: read every readable message once, catch up
    /// on updates that raced the read sweep via `find -d`, then listen.
    ///
    /// Emissions are change-filtered against the last observed value
    /// during the first two phases; the listen phase forwards daemon
    /// events as-is (the daemon already emits on change). All phase-one
    /// emissions precede all phase-two emissions precede the live
    /// stream.
    pub fn observe(
        &mut self,
        selection: Option<MsgDefs>,
        prio: bool,
        ttl: Option<u32>,
    ) -> Observe<'_> {
        let selection = selection.unwrap_or_else(|| self.msgdefs.clone());
        let read_queue: VecDeque<Arc<MsgDef>> = selection.iter().map(Arc::clone).collect();
        Observe {
            client: self,
            selection,
            prio,
            ttl,
            last: HashMap::new(),
            read_queue,
            catchup_queue: VecDeque::new(),
            phase: Phase::Read,
        }
    }

    /// Daemon state: the first comma-separated token of the `state`
    /// answer (`running`, `scanning`, ...). A transport timeout
    /// degrades to the literal `no ebusd connection`.
    pub fn get_state(&mut self) -> Result<String> {
        match self.request("state", false) {
            Ok(lines) => Ok(lines
                .first()
                .and_then(|line| line.split(',').next())
                .unwrap_or("no ebusd connection")
                .trim()
                .to_string()),
            Err(e) if e.is_timeout() => Ok("no ebusd connection".to_string()),
            Err(e) => Err(e),
        }
    }

    /// Send a raw daemon command and stream the response lines.
    ///
    /// With `infinite`, the stream does not terminate on a blank line.
    pub fn cmd(&mut self, cmd: &str, infinite: bool) -> Result<Lines<'_>> {
        self.connection.write(cmd)?;
        Ok(self.connection.read_lines(infinite, false))
    }

    /// Send a command and collect the response, without the terminating
    /// blank line.
    fn request(&mut self, cmd: &str, check: bool) -> Result<Vec<String>> {
        self.connection.write(cmd)?;
        let mut lines = Vec::new();
        for line in self.connection.read_lines(false, check) {
            lines.push(line?);
        }
        if lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        Ok(lines)
    }
}

/// Read one line in listen mode and decode it.
///
/// `Ok(None)` means the line was skipped (ack, blank, unknown or
/// undecodable message, filtered out); the caller keeps polling.
fn poll_listen_line(client: &mut Client, selection: Option<&MsgDefs>) -> Result<Option<Msg>> {
    let line = client.connection.next_line()?;
    if line.is_empty() || line == "listen started" {
        return Ok(None);
    }
    match decode_line(&client.msgdefs, &line) {
        Ok(Decoded::Msg(msg)) => match selection {
            Some(selection) => Ok(filter_msg(&msg, selection)),
            None => Ok(Some(msg)),
        },
        Ok(Decoded::Broken(broken)) => {
            warn!("broken message {} ({})", broken.ident(), broken.error);
            Ok(None)
        }
        Err(Error::UnknownMsg { circuit, name }) => {
            debug!("unknown message {}/{}", circuit, name);
            Ok(None)
        }
        Err(Error::Format(line)) => {
            warn!("cannot decode message ({:?})", line);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Stream of messages from listen mode, see [`Client::listen`].
pub struct Listen<'a> {
    client: &'a mut Client,
    selection: Option<MsgDefs>,
    done: bool,
}

impl Iterator for Listen<'_> {
    type Item = Result<Msg>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match poll_listen_line(self.client, self.selection.as_ref()) {
                Ok(Some(msg)) => return Some(Ok(msg)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Drop for Listen<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.client.connection.disconnect();
        }
        self.client.connection.restore_read_timeout();
    }
}

enum Phase {
    Read,
    CatchUp,
    Listen,
    Done,
}

/// Observe state machine, see [`Client::observe`].
pub struct Observe<'a> {
    client: &'a mut Client,
    selection: MsgDefs,
    prio: bool,
    ttl: Option<u32>,
    last: HashMap<String, Option<Msg>>,
    read_queue: VecDeque<Arc<MsgDef>>,
    catchup_queue: VecDeque<Msg>,
    phase: Phase,
}

impl Observe<'_> {
    /// Phase one: read each selected message once. `Ok(None)` means the
    /// read sweep finished.
    fn step_read(&mut self) -> Result<Option<Msg>> {
        while let Some(msgdef) = self.read_queue.pop_front() {
            if msgdef.read {
                match self.client.read(&msgdef, self.prio, self.ttl)? {
                    Some(Decoded::Msg(msg)) => {
                        if let Some(filtered) = filter_msg(&msg, &self.selection) {
                            if !filtered.fields.is_empty() {
                                self.last
                                    .insert(filtered.ident(), Some(filtered.clone()));
                                return Ok(Some(filtered));
                            }
                        }
                    }
                    Some(Decoded::Broken(broken)) => {
                        warn!("broken message {} ({})", broken.ident(), broken.error);
                    }
                    None => {}
                }
            } else if msgdef.update {
                // seed change detection for update-only messages
                self.last.insert(msgdef.ident(), None);
            }
        }
        Ok(None)
    }

    /// Collect `find -d` results (values updated while phase one ran).
    fn load_catchup(&mut self) -> Result<()> {
        let lines = self.client.request("find -d", false)?;
        for line in lines.iter().filter(|line| !line.is_empty()) {
            match decode_line(&self.client.msgdefs, line) {
                Ok(Decoded::Msg(msg)) => {
                    if let Some(filtered) = filter_msg(&msg, &self.selection) {
                        if !filtered.fields.is_empty() {
                            self.catchup_queue.push_back(filtered);
                        }
                    }
                }
                Ok(Decoded::Broken(broken)) => {
                    debug!("broken message {} ({})", broken.ident(), broken.error);
                }
                Err(Error::UnknownMsg { .. }) => {}
                Err(Error::Format(line)) => {
                    debug!("cannot decode message ({:?})", line);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Phase two: emit catch-up values that differ from the last
    /// observation. `Ok(None)` means the queue is exhausted.
    fn step_catchup(&mut self) -> Result<Option<Msg>> {
        while let Some(msg) = self.catchup_queue.pop_front() {
            let ident = msg.ident();
            let unchanged = self
                .last
                .get(&ident)
                .is_some_and(|prev| prev.as_ref() == Some(&msg));
            if !unchanged {
                self.last.insert(ident, Some(msg.clone()));
                return Ok(Some(msg));
            }
        }
        Ok(None)
    }
}

impl Iterator for Observe<'_> {
    type Item = Result<Msg>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Read => match self.step_read() {
                    Ok(Some(msg)) => return Some(Ok(msg)),
                    Ok(None) => {
                        if let Err(e) = self.load_catchup() {
                            self.phase = Phase::Done;
                            return Some(Err(e));
                        }
                        self.phase = Phase::CatchUp;
                    }
                    Err(e) => {
                        self.phase = Phase::Done;
                        return Some(Err(e));
                    }
                },
                Phase::CatchUp => match self.step_catchup() {
                    Ok(Some(msg)) => return Some(Ok(msg)),
                    Ok(None) => {
                        if let Err(e) = self.client.connection.write("listen") {
                            self.phase = Phase::Done;
                            return Some(Err(e));
                        }
                        self.client.connection.set_read_timeout(None);
                        self.phase = Phase::Listen;
                    }
                    Err(e) => {
                        self.phase = Phase::Done;
                        return Some(Err(e));
                    }
                },
                Phase::Listen => {
                    match poll_listen_line(self.client, Some(&self.selection)) {
                        Ok(Some(msg)) => return Some(Ok(msg)),
                        Ok(None) => {}
                        Err(e) => {
                            self.phase = Phase::Done;
                            return Some(Err(e));
                        }
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}

impl Drop for Observe<'_> {
    fn drop(&mut self) {
        if matches!(self.phase, Phase::Listen) {
            self.client.connection.disconnect();
            self.client.connection.restore_read_timeout();
        }
    }
}

/// Scan-quiescence poller, see [`Client::wait_scan_completed`].
pub struct ScanWait<'a> {
    client: &'a mut Client,
    interval: Duration,
    counts: Vec<usize>,
    done: bool,
}

impl Iterator for ScanWait<'_> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.counts.is_empty() {
            std::thread::sleep(self.interval);
        }
        let lines = match self.client.request(FIND_ALL, false) {
            Ok(lines) => lines,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let count = lines.iter().filter(|line| !line.is_empty()).count();
        self.counts.push(count);
        if self.counts.len() >= SCAN_STABLE_POLLS
            && self.counts[self.counts.len() - SCAN_STABLE_POLLS..]
                .iter()
                .all(|c| *c == count)
        {
            self.done = true;
        }
        Some(Ok(count))
    }
}
