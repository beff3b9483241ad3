// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ebus - client for the ebusd heating-bus daemon
//!
//! [ebusd](https://github.com/john30/ebusd) bridges the EBUS serial
//! field bus of heating appliances to a line-oriented TCP interface.
//! This crate connects to that interface, loads the daemon's
//! self-describing message catalog, reads and writes messages, and
//! consumes the asynchronous update stream with typed decoding.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ebus::{Client, Result};
//!
//! fn main() -> Result<()> {
//!     let mut client = Client::new("127.0.0.1", 8888);
//!     client.load_msgdefs()?;
//!
//!     // read one message
//!     let msgdef = client.msgdefs().resolve("bai/Status01")?;
//!     if let Some(msgdef) = msgdef.iter().next().cloned() {
//!         if let Some(decoded) = client.read(&msgdef, false, None)? {
//!             println!("{:?}", decoded.msg());
//!         }
//!     }
//!
//!     // stream every value change
//!     for msg in client.listen(None)? {
//!         let msg = msg?;
//!         for field in &msg.fields {
//!             println!("{} {}", msg.field_ident(field), field.unitvalue());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                           Client                              |
//! |   load_msgdefs | read | write | listen | observe | state      |
//! +---------------------------------------------------------------+
//! |     Catalog (MsgDefs)        |        Decoders               |
//! |   find/resolve/summary       |  catalog lines -> MsgDef      |
//! |                              |  event lines   -> Msg         |
//! +---------------------------------------------------------------+
//! |                       Type registry                           |
//! |   ~40 builtin types + lazily grown parameterized families     |
//! +---------------------------------------------------------------+
//! |                        Connection                             |
//! |   reconnecting line-framed TCP, request/response + streams    |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Entry point: owns the connection and the catalog |
//! | [`MsgDefs`] | Message catalog with glob find and pattern resolve |
//! | [`MsgDef`] / [`FieldDef`] | Immutable message/field definitions |
//! | [`Msg`] / [`Field`] | A decoded message and its typed values |
//! | [`Type`] / [`Value`] | The EBUS primitive type system |
//! | [`CircuitMap`] | Circuit display names (`bai.3` -> `Heater#3`) |
//!
//! The client does not speak the raw EBUS wire format (the daemon
//! does), keeps no state across restarts and performs no
//! authentication.

/// Circuit display-name mapping.
pub mod circuitmap;
/// Line-framed reconnecting TCP connection.
pub mod connection;
mod client;
mod error;
/// Decoded messages and message filtering.
pub mod msg;
/// Event line decoding.
pub mod msgdecoder;
/// Message and field definitions.
pub mod msgdef;
/// Catalog line parsing.
pub mod msgdefdecoder;
/// Message definition container.
pub mod msgdefs;
mod request;
/// The EBUS primitive type system.
pub mod types;

pub use circuitmap::CircuitMap;
pub use client::{Client, Listen, Observe, ScanWait};
pub use connection::{Connection, Lines};
pub use error::{Error, Result};
pub use msg::{filter_msg, BrokenMsg, Decoded, Field, Msg};
pub use msgdecoder::{decode_line, decode_value};
pub use msgdef::{FieldDef, MsgDef, VirtFieldDef, VirtKind};
pub use msgdefdecoder::decode_msgdef;
pub use msgdefs::MsgDefs;
pub use types::{get_type, IntSpec, TimeSpec, Type, Value};
