// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ebusd client CLI
//!
//! Command-line front-end for the `ebus` client library.
//!
//! # Usage
//!
//! ```bash
//! # show daemon state
//! ebusctl state
//!
//! # list all known messages and fields
//! ebusctl ls
//!
//! # read all outside temperatures
//! ebusctl read "*/OutsideTemp"
//!
//! # write one field (read-modify-write for partial messages)
//! ebusctl write ui/TempIncrease/temp 5
//!
//! # seed all values, then follow every change
//! ebusctl observe
//! ```
//!
//! Patterns are `;`-separated `circuit/name(#prio)?(/field)?` globs;
//! the default `*/*` selects everything.

use clap::{Parser, Subcommand};
use colored::Colorize;
use ebus::{Client, CircuitMap, Decoded, Msg, Type, Value};
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Poll interval while waiting for the daemon's bus scan to settle.
const SCANWAIT_INTERVAL: Duration = Duration::from_secs(5);

/// ebusd client CLI
#[derive(Parser, Debug)]
#[command(name = "ebusctl")]
#[command(about = "ebusd client CLI")]
#[command(version)]
struct Args {
    /// Daemon host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Daemon port
    #[arg(short = 'P', long, default_value_t = 8888)]
    port: u16,

    /// I/O timeout in seconds
    #[arg(short = 'T', long, default_value_t = 10)]
    timeout: u64,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// YAML file with circuit display-name overrides
    #[arg(long, value_name = "FILE")]
    circuitmap: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a raw command to the daemon and print the response
    Cmd {
        /// Command line to send
        cmd: String,

        /// Do not stop at the first empty response line
        #[arg(short, long)]
        infinite: bool,
    },

    /// Print decoded messages as the daemon announces value changes
    Listen {
        /// Message patterns separated by ';' (i.e. 'ui/OutsideTemp')
        #[arg(default_value = "*/*")]
        patterns: String,

        /// Wait for the daemon's bus scan to settle first
        #[arg(short = 'w', long)]
        scanwait: bool,
    },

    /// List selected message and field definitions
    Ls {
        /// Message patterns separated by ';' (i.e. 'ui/OutsideTemp')
        #[arg(default_value = "*/*")]
        patterns: String,

        /// Print field identifiers only
        #[arg(long)]
        name_only: bool,

        /// Keep only messages with this direction flag (r, w or u)
        #[arg(long = "type", value_name = "FLAG")]
        type_filter: Option<char>,

        /// Wait for the daemon's bus scan to settle first
        #[arg(short = 'w', long)]
        scanwait: bool,
    },

    /// Read each selected readable message once and print it
    Read {
        /// Message patterns separated by ';' (i.e. 'ui/OutsideTemp')
        #[arg(default_value = "*/*")]
        patterns: String,

        /// Set poll priority on the daemon
        #[arg(short, long)]
        prio: bool,

        /// Maximum age of the value in seconds
        #[arg(short, long, default_value_t = 0)]
        ttl: u32,

        /// Wait for the daemon's bus scan to settle first
        #[arg(short = 'w', long)]
        scanwait: bool,
    },

    /// Write a value to one field
    Write {
        /// Field path (i.e. 'ui/TempIncrease/temp')
        field: String,

        /// Value to write; NONE writes the unavailable sentinel
        value: String,

        /// Wait for the daemon's bus scan to settle first
        #[arg(short = 'w', long)]
        scanwait: bool,
    },

    /// Read all selected messages once, catch up and keep listening
    Observe {
        /// Message patterns separated by ';' (i.e. 'ui/OutsideTemp')
        #[arg(default_value = "*/*")]
        patterns: String,

        /// Set poll priority on the daemon
        #[arg(short, long)]
        prio: bool,

        /// Maximum age of the value in seconds
        #[arg(short, long)]
        ttl: Option<u32>,

        /// Wait for the daemon's bus scan to settle first
        #[arg(short = 'w', long)]
        scanwait: bool,
    },

    /// Show the daemon state
    State,
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);
    if let Err(e) = run(&args) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = Client::new(args.host.clone(), args.port)
        .with_timeout(Duration::from_secs(args.timeout));
    let circuitmap = load_circuitmap(args.circuitmap.as_deref())?;

    match &args.command {
        Commands::Cmd { cmd, infinite } => cmd_cmd(&mut client, cmd, *infinite),
        Commands::Listen { patterns, scanwait } => {
            cmd_listen(&mut client, &circuitmap, patterns, *scanwait)
        }
        Commands::Ls {
            patterns,
            name_only,
            type_filter,
            scanwait,
        } => cmd_ls(&mut client, patterns, *name_only, *type_filter, *scanwait),
        Commands::Read {
            patterns,
            prio,
            ttl,
            scanwait,
        } => cmd_read(&mut client, patterns, *prio, *ttl, *scanwait),
        Commands::Write {
            field,
            value,
            scanwait,
        } => cmd_write(&mut client, field, value, *scanwait),
        Commands::Observe {
            patterns,
            prio,
            ttl,
            scanwait,
        } => cmd_observe(&mut client, &circuitmap, patterns, *prio, *ttl, *scanwait),
        Commands::State => cmd_state(&mut client),
    }
}

/// Built-in defaults layered with the optional YAML override file
/// (a flat `circuitname: displayname` mapping).
fn load_circuitmap(path: Option<&Path>) -> Result<CircuitMap, Box<dyn std::error::Error>> {
    let mut circuitmap = CircuitMap::with_defaults();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)?;
        let overrides: BTreeMap<String, String> = serde_yaml::from_str(&text)?;
        for (circuitname, displayname) in overrides {
            circuitmap.add(circuitname, displayname);
        }
    }
    Ok(circuitmap)
}

fn load_msgdefs(
    client: &mut Client,
    scanwait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if scanwait {
        print!("Waiting for ebusd scan to complete ");
        std::io::stdout().flush()?;
        for count in client.wait_scan_completed(SCANWAIT_INTERVAL) {
            count?;
            print!(".");
            std::io::stdout().flush()?;
        }
        println!(" DONE.");
    }
    print!("Loading message definitions ... ");
    std::io::stdout().flush()?;
    client.load_msgdefs()?;
    println!("{} DONE.", client.msgdefs().summary().green());
    Ok(())
}

fn cmd_cmd(
    client: &mut Client,
    cmd: &str,
    infinite: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    for line in client.cmd(cmd, infinite)? {
        println!("{}", line?);
    }
    Ok(())
}

fn cmd_listen(
    client: &mut Client,
    circuitmap: &CircuitMap,
    patterns: &str,
    scanwait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    load_msgdefs(client, scanwait)?;
    let selection = client.msgdefs().resolve(patterns)?;
    println!("Listening to {}", selection.summary());
    for msg in client.listen(Some(selection))? {
        print_msg(&msg?, Some(circuitmap));
    }
    Ok(())
}

fn cmd_ls(
    client: &mut Client,
    patterns: &str,
    name_only: bool,
    type_filter: Option<char>,
    scanwait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match type_filter {
        None => None,
        Some('r') => Some('r'),
        Some('w') => Some('w'),
        Some('u') => Some('u'),
        Some(other) => return Err(format!("--type must be r, w or u, not {:?}", other).into()),
    };
    load_msgdefs(client, scanwait)?;
    let selection = client.msgdefs().resolve_filtered(patterns, |m| match filter {
        Some('r') => m.read,
        Some('w') => m.write,
        Some('u') => m.update,
        _ => true,
    })?;
    if name_only {
        for msgdef in selection.iter() {
            for field in &msgdef.fields {
                println!("{}/{}", msgdef.ident(), field.name);
            }
        }
        return Ok(());
    }
    let rows: Vec<LsRow> = selection
        .iter()
        .flat_map(|msgdef| {
            msgdef.fields.iter().map(move |field| LsRow {
                type_: msgdef.type_(),
                ident: format!("{}/{}", msgdef.ident(), field.name),
                details: describe_type(&field.type_),
                unit: field.unit.clone().unwrap_or_default(),
                comment: field.comment.clone().unwrap_or_default(),
            })
        })
        .collect();
    println!("{}", tabled::Table::new(rows));
    Ok(())
}

#[derive(tabled::Tabled)]
struct LsRow {
    #[tabled(rename = "Type")]
    type_: String,
    #[tabled(rename = "Field")]
    ident: String,
    #[tabled(rename = "Values")]
    details: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Comment")]
    comment: String,
}

fn cmd_read(
    client: &mut Client,
    patterns: &str,
    prio: bool,
    ttl: u32,
    scanwait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    load_msgdefs(client, scanwait)?;
    let selection = client
        .msgdefs()
        .resolve_filtered(patterns, |m| m.read || m.update)?;
    println!("Reading {}", selection.summary());
    let msgdefs: Vec<_> = selection.iter().cloned().collect();
    for msgdef in msgdefs {
        if !msgdef.read {
            continue;
        }
        match client.read(&msgdef, prio, Some(ttl))? {
            Some(Decoded::Msg(msg)) => print_msg(&msg, None),
            Some(Decoded::Broken(broken)) => {
                println!("{:<48} {}", broken.ident(), broken.error.red());
            }
            None => {}
        }
    }
    Ok(())
}

fn cmd_write(
    client: &mut Client,
    field: &str,
    value: &str,
    scanwait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    load_msgdefs(client, scanwait)?;
    let resolved = client.msgdefs().resolve(field)?;
    if resolved.is_empty() {
        return Err(format!("no message matches {:?}", field).into());
    }
    let msgdefs: Vec<_> = resolved.iter().cloned().collect();
    for msgdef in msgdefs {
        let values = parse_values(&msgdef.fields, value)?;
        client.write_values(&msgdef, &values, None)?;
        println!("{} {}", msgdef.ident(), "written".green());
    }
    Ok(())
}

/// Parse the `;`-separated CLI input into logical field values.
///
/// `NONE` denotes the unavailable sentinel for every field.
fn parse_values(
    fields: &[ebus::FieldDef],
    input: &str,
) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    if input == "NONE" {
        return Ok(vec![Value::Na; fields.len()]);
    }
    let parts: Vec<&str> = input.split(';').collect();
    if parts.len() != fields.len() {
        return Err(format!(
            "expected {} value(s), got {}",
            fields.len(),
            parts.len()
        )
        .into());
    }
    let mut values = Vec::with_capacity(fields.len());
    for (field, part) in fields.iter().zip(parts) {
        match field.type_.decode(part) {
            Value::Invalid { raw, reason } => {
                return Err(format!(
                    "{:?} is no valid value for field {} ({})",
                    raw, field.name, reason
                )
                .into())
            }
            value => values.push(value),
        }
    }
    Ok(values)
}

fn cmd_observe(
    client: &mut Client,
    circuitmap: &CircuitMap,
    patterns: &str,
    prio: bool,
    ttl: Option<u32>,
    scanwait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    load_msgdefs(client, scanwait)?;
    let selection = client.msgdefs().resolve(patterns)?;
    println!("Observing {}", selection.summary());
    for msg in client.observe(Some(selection), prio, ttl) {
        print_msg(&msg?, Some(circuitmap));
    }
    Ok(())
}

fn cmd_state(client: &mut Client) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", client.get_state()?);
    Ok(())
}

/// One line per field: identifier, flags, unitized value, comment.
fn print_msg(msg: &Msg, circuitmap: Option<&CircuitMap>) {
    for field in &msg.fields {
        let comment = field
            .comment
            .as_ref()
            .map(|c| format!(" [{}]", c))
            .unwrap_or_default();
        match circuitmap {
            Some(circuitmap) => println!(
                "{:<12} {:<48} {} {}{}",
                circuitmap.displayname(&msg.msgdef.circuit),
                msg.field_ident(field),
                msg.msgdef.type_(),
                field.unitvalue(),
                comment
            ),
            None => println!(
                "{:<48} {} {}{}",
                msg.field_ident(field),
                msg.msgdef.type_(),
                field.unitvalue(),
                comment
            ),
        }
    }
}

/// Short value-domain description for the `ls` listing.
fn describe_type(type_: &Type) -> String {
    match type_ {
        Type::Str { .. } => "str".to_string(),
        Type::Hex { .. } => "hex".to_string(),
        Type::Int(spec) if spec.divider.is_some_and(|d| d > 0.0) => "float".to_string(),
        Type::Int(_) => "int".to_string(),
        Type::Bool => "bool".to_string(),
        Type::Float => "float".to_string(),
        Type::Date => "date".to_string(),
        Type::Time(spec) if spec.no_second => "hh:mm".to_string(),
        Type::Time(_) => "hh:mm:ss".to_string(),
        Type::DateTime => "datetime".to_string(),
        Type::Weekday => "weekday".to_string(),
        Type::Pin => "pin".to_string(),
        Type::Enum { values } => values.join(";"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebus::FieldDef;
    use std::io::Write as _;

    fn uch() -> Type {
        ebus::get_type("UCH").unwrap()
    }

    #[test]
    fn parse_values_by_type() {
        let fields = vec![
            FieldDef::new(0, "a", uch(), None, None),
            FieldDef::new(1, "b", ebus::get_type("D2C").unwrap(), None, None),
        ];
        let values = parse_values(&fields, "17;27.5").unwrap();
        assert_eq!(values, vec![Value::Int(17), Value::Float(27.5)]);
        assert!(parse_values(&fields, "17").is_err());
        assert!(parse_values(&fields, "x;27.5").is_err());
    }

    #[test]
    fn parse_none_as_sentinel() {
        let fields = vec![FieldDef::new(0, "a", uch(), None, None)];
        assert_eq!(parse_values(&fields, "NONE").unwrap(), vec![Value::Na]);
    }

    #[test]
    fn circuitmap_overrides_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "boo: My Boo\nmc.4: Mixer Unit 2").unwrap();
        let map = load_circuitmap(Some(file.path())).unwrap();
        assert_eq!(map.displayname("boo"), "My Boo");
        assert_eq!(map.displayname("mc.4"), "Mixer Unit 2");
        assert_eq!(map.displayname("bai"), "Heater");
    }

    #[test]
    fn circuitmap_defaults_without_file() {
        let map = load_circuitmap(None).unwrap();
        assert_eq!(map.displayname("hwc"), "Water");
    }

    #[test]
    fn type_descriptions() {
        assert_eq!(describe_type(&uch()), "int");
        assert_eq!(describe_type(&ebus::get_type("D2C").unwrap()), "float");
        assert_eq!(describe_type(&ebus::get_type("BTM").unwrap()), "hh:mm");
        assert_eq!(
            describe_type(&Type::Enum {
                values: vec!["off".into(), "on".into()]
            }),
            "off;on"
        );
    }

    #[test]
    fn cli_parses() {
        let args = Args::parse_from(["ebusctl", "-H", "10.0.0.2", "read", "-p", "bai/*"]);
        assert_eq!(args.host, "10.0.0.2");
        match args.command {
            Commands::Read { patterns, prio, ttl, .. } => {
                assert_eq!(patterns, "bai/*");
                assert!(prio);
                assert_eq!(ttl, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
