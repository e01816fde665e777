use std::time::Duration;

use anyhow::Context;
use futures::TryStreamExt;
use tracing::{info, warn};
use tracing_subscriber;

use clap::Parser;

use armlink::{discover, find_arm_port, Client, Connection, DEFAULT_BAUD_RATE};

/// Renders bytes as a lowercase hex string.
fn hex_str(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parses a command id given as decimal or `0x`-prefixed hex.
fn command_id(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };

    parsed.map_err(|_| format!("invalid command id: {}", s))
}

/// Hex-encoded payload argument.
#[derive(Debug, Clone, Default)]
struct HexPayload(Vec<u8>);

fn hex_payload(s: &str) -> Result<HexPayload, String> {
    if !s.is_ascii() {
        return Err(format!("invalid hex payload: {}", s));
    }
    if s.len() % 2 != 0 {
        return Err("payload must be an even number of hex digits".to_string());
    }

    let mut bytes = Vec::with_capacity(s.len() / 2);
    for i in (0..s.len()).step_by(2) {
        let byte = u8::from_str_radix(&s[i..i + 2], 16)
            .map_err(|_| format!("invalid hex payload: {}", s))?;
        bytes.push(byte);
    }

    Ok(HexPayload(bytes))
}

/// Parses and validates the given watch interval.
fn watch_interval(s: &str) -> Result<Duration, String> {
    let secs = s
        .parse::<u64>()
        .map_err(|_| "invalid value for watch interval".to_string())?;
    let rv = Duration::from_secs(secs);
    if rv.is_zero() {
        return Err("watch interval must be non-zero".to_string());
    }

    Ok(rv)
}

#[derive(Parser)]
#[command(name = "arm-tool")]
#[command(version = "0.1")]
#[command(about = "Diagnostic tool for the arm's serial link", long_about = None)]
struct Args {
    /// Serial port device path. Auto-discovered when omitted.
    port: Option<String>,

    /// Baud rate.
    #[arg(short = 'b', long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// List candidate serial ports and exit.
    #[arg(short = 'l', long)]
    list: bool,

    /// Print the port listing as JSON (with --list).
    #[arg(long)]
    json: bool,

    /// Probe the device with a version query and report the raw response.
    #[arg(short = 'P', long)]
    probe: bool,

    /// Query the device's alarm state.
    #[arg(short = 'a', long)]
    alarms: bool,

    /// Clear all active alarms.
    #[arg(short = 'c', long)]
    clear: bool,

    /// Reboot the device.
    #[arg(short = 'R', long)]
    reboot: bool,

    /// Send an arbitrary command id (decimal or 0x-prefixed hex).
    #[arg(short = 's', long, value_name = "CMD")]
    #[arg(value_parser = command_id)]
    send: Option<u8>,

    /// Hex-encoded payload for --send.
    #[arg(long, value_name = "HEX", default_value = "")]
    #[arg(value_parser = hex_payload)]
    payload: HexPayload,

    /// Re-query the alarm state this often (seconds) until interrupted.
    #[arg(short = 'w', long = "watch", value_name = "SECONDS")]
    #[arg(value_parser = watch_interval)]
    watch: Option<Duration>,
}

fn list_ports(json: bool) -> anyhow::Result<()> {
    let candidates = discover()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    if candidates.is_empty() {
        warn!("no serial ports found; check that the device is connected");
        return Ok(());
    }

    for candidate in candidates {
        let product = candidate.product.as_deref().unwrap_or("-");
        println!(
            "{}  [{}]  {}",
            candidate.port_name, candidate.reason, product
        );
    }

    Ok(())
}

async fn run_commands(args: &Args, con: &mut Connection) -> anyhow::Result<()> {
    if args.probe {
        let version = con.query_version_raw().await?;
        println!("version response: {}", hex_str(&version));
    }

    if args.alarms {
        let state = con.query_alarm_state_raw().await?;
        println!("alarm state: {}", hex_str(&state));
    }

    if args.clear {
        let resp = con.clear_alarms().await?;
        info!("alarm clear command acknowledged");
        println!("clear response: {}", hex_str(resp.payload()));
    }

    if args.reboot {
        let resp = con.reboot().await?;
        println!("reboot response: {}", hex_str(resp.payload()));
    }

    if let Some(cmd) = args.send {
        let resp = con.send_raw(cmd, args.payload.0.clone()).await?;
        println!(
            "response (cmd: 0x{:02x}, seq: {}, checksum ok: {}): {}",
            resp.command_id(),
            resp.sequence(),
            resp.checksum_ok(),
            hex_str(resp.payload())
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if args.list {
        return list_ports(args.json);
    }

    let port = match &args.port {
        Some(port) => port.clone(),
        None => find_arm_port()?
            .context("could not find a serial port that looks like the arm; try --list")?,
    };
    info!("using port: {}@{}", port, args.baud);

    let client = Client::open((port.as_str(), args.baud))?;
    let mut con = client
        .get_connection()
        .await
        .with_context(|| format!("failed to open {}", port))?;

    let no_action =
        !args.probe && !args.alarms && !args.clear && !args.reboot && args.send.is_none();
    if no_action && args.watch.is_none() {
        // bare invocation behaves like the connection test: probe and report
        let version = con.query_version_raw().await?;
        println!("version response: {}", hex_str(&version));
    } else {
        run_commands(&args, &mut con).await?;
    }

    if let Some(interval) = args.watch {
        info!("watching alarm state every {:?}", interval);
        let snapshots = con.alarm_snapshots(interval)?;
        tokio::pin!(snapshots);

        while let Some(snapshot) = snapshots.try_next().await? {
            println!(
                "alarm state (seq: {}, checksum ok: {}): {}",
                snapshot.sequence,
                snapshot.checksum_ok,
                hex_str(&snapshot.state)
            );
        }

        return Ok(());
    }

    con.shutdown().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        Args::command().debug_assert()
    }

    #[test]
    fn parse_command_id() {
        assert_eq!(command_id("0x8A").unwrap(), 0x8A);
        assert_eq!(command_id("0xcf").unwrap(), 0xCF);
        assert_eq!(command_id("129").unwrap(), 0x81);
        assert!(command_id("0x1FF").is_err());
        assert!(command_id("alarms").is_err());
    }

    #[test]
    fn parse_hex_payload() {
        assert_eq!(hex_payload("").unwrap().0, Vec::<u8>::new());
        assert_eq!(hex_payload("deadbeef").unwrap().0, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(hex_payload("abc").is_err());
        assert!(hex_payload("zz").is_err());
    }

    #[test]
    fn parse_hex_payload_rejects_non_ascii() {
        assert!(hex_payload("\u{20ac}\u{20ac}").is_err());
        assert!(hex_payload("de\u{e4}d").is_err());
    }

    #[test]
    fn hex_str_formats_lowercase() {
        assert_eq!(hex_str(&[0xAA, 0x01, 0x0D]), "aa010d");
        assert_eq!(hex_str(&[]), "");
    }
}
