// nrfcap test application -- CLI tool for exercising the mousejack capture
// bridge against real dongles or a mock transport.
//
// Usage:
//   nrfcap-test-app list
//   nrfcap-test-app probe mousejack
//   nrfcap-test-app probe mousejack-3-12
//   nrfcap-test-app channels
//   nrfcap-test-app capture --definition mousejack --channel 42 --duration 30
//   nrfcap-test-app capture --definition mousejack-3-12 --count 100
//   nrfcap-test-app capture --mock --count 1
//
// Set RUST_LOG=nrfcap=debug (or trace) to watch the session lifecycle and
// wire traffic.

use std::time::{Duration, Instant};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nrfcap::locator::MatchedDevice;
use nrfcap::mousejack::MousejackBuilder;
use nrfcap::test_harness::MockUsbTransport;
use nrfcap::usb::matcher::{MOUSEJACK_USB_PRODUCT, MOUSEJACK_USB_VENDOR};
use nrfcap::{CaptureSource, channel};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// nrfcap test application -- exercises the capture bridge from the command line.
#[derive(Parser)]
#[command(name = "nrfcap-test-app", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate attached mousejack dongles.
    List,

    /// Probe a source definition without opening the device.
    Probe {
        /// Source definition, e.g. `mousejack` or `mousejack-3-12`.
        #[arg(default_value = "mousejack")]
        definition: String,
    },

    /// Print the supported channel list.
    Channels,

    /// Open a dongle and print captured frames.
    Capture {
        /// Source definition, e.g. `mousejack` or `mousejack-3-12`.
        #[arg(long, default_value = "mousejack")]
        definition: String,

        /// Channel to tune to after opening (2-83). Without this the
        /// dongle stays on whatever channel the firmware booted with.
        #[arg(long)]
        channel: Option<String>,

        /// Capture duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,

        /// Stop after this many frames (0 = unlimited).
        #[arg(long, default_value_t = 0)]
        count: u64,

        /// Promiscuous address-prefix filter as hex bytes, e.g. "AA55".
        /// At most 5 bytes.
        #[arg(long, value_parser = parse_hex_bytes)]
        prefix: Option<Vec<u8>>,

        /// Use a mock transport instead of real hardware. Useful for
        /// verifying CLI parsing and bridge wiring without a dongle.
        #[arg(long)]
        mock: bool,
    },
}

/// Parse a hex string like "AA55CC" into bytes.
fn parse_hex_bytes(s: &str) -> std::result::Result<Vec<u8>, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.len() % 2 != 0 {
        return Err("hex string must have an even number of digits".into());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| format!("invalid hex byte: {e}")))
        .collect()
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_list(source: &dyn CaptureSource) -> Result<()> {
    let entries = source.list().await.context("device enumeration failed")?;

    if entries.is_empty() {
        println!("No mousejack dongles found.");
        return Ok(());
    }

    println!("{:<20}  Hardware", "Interface");
    println!("{:<20}  --------", "-".repeat(20));
    for entry in &entries {
        println!("{:<20}  {}", entry.interface, entry.hardware);
    }
    println!();
    println!("{} dongle(s) found.", entries.len());

    Ok(())
}

async fn cmd_probe(source: &dyn CaptureSource, definition: &str) -> Result<()> {
    match source.probe(definition).await? {
        Some(report) => {
            println!("Probe: supported");
            println!("  UUID:     {}", report.uuid);
            println!(
                "  Channels: {} ({}..{})",
                report.channels.len(),
                report.channels.first().map(String::as_str).unwrap_or("-"),
                report.channels.last().map(String::as_str).unwrap_or("-"),
            );
        }
        None => {
            println!("Probe: '{definition}' is not an available mousejack source.");
        }
    }
    Ok(())
}

fn cmd_channels() -> Result<()> {
    let channels = channel::channel_list();
    println!("{} channels: {}", channels.len(), channels.join(" "));
    Ok(())
}

async fn cmd_capture(
    definition: &str,
    channel: Option<&str>,
    duration_secs: u64,
    max_frames: u64,
    prefix: Option<Vec<u8>>,
    mock: bool,
) -> Result<()> {
    let mut builder = MousejackBuilder::new();
    if let Some(prefix) = prefix {
        builder = builder.promiscuous_prefix(prefix);
    }
    let mut source = builder.build().context("libusb initialization failed")?;

    let report = if mock {
        // Pre-load the mode-entry exchange and one canned frame so the
        // full open/capture path runs without hardware.
        let mut transport = MockUsbTransport::new();
        transport.expect(&[0x06, 0x00], &[0x00]);
        transport.expect(&[0x10], &[0xAA, 0x01, 0x02, 0x03]);
        let device = MatchedDevice {
            bus: 0,
            address: 0,
            vendor_id: MOUSEJACK_USB_VENDOR,
            product_id: MOUSEJACK_USB_PRODUCT,
        };
        let report = source
            .open_with_transport(Box::new(transport), device)
            .await
            .context("failed to open mock transport")?;
        println!("Opened (mock transport) -- {}", report.capture_interface);
        report
    } else {
        let report = source
            .open(definition)
            .await
            .with_context(|| format!("failed to open '{definition}'"))?;
        println!("Opened {} ({})", report.capture_interface, report.uuid);
        report
    };

    if let Some(chanstr) = channel {
        let ch = source
            .translate_channel(chanstr)
            .with_context(|| format!("invalid channel '{chanstr}'"))?;
        source
            .control_channel(Some(ch))
            .await
            .context("channel change failed")?;
        println!("Tuned to channel {ch}");
    }

    let mut frames = source.frames().context("frame receiver unavailable")?;

    let deadline =
        (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));
    let mut received: u64 = 0;

    println!(
        "Capturing on {} (Ctrl-C to stop)...",
        report.capture_interface
    );

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Capture duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Interrupted.");
                break;
            }
            frame = tokio::time::timeout(timeout, frames.recv()) => {
                match frame {
                    Ok(Some(frame)) => {
                        received += 1;
                        println!(
                            "[{received:>6}] {:3} bytes: {:02X?}",
                            frame.bytes.len(),
                            frame.bytes
                        );
                        if max_frames > 0 && received >= max_frames {
                            println!("Frame count reached.");
                            break;
                        }
                    }
                    Ok(None) => {
                        println!("Frame channel closed.");
                        break;
                    }
                    Err(_) => {
                        if deadline.is_some() {
                            println!("Capture duration elapsed.");
                        }
                        break;
                    }
                }
            }
        }
    }

    source.shutdown();
    source.run_capture().await.context("capture shutdown failed")?;

    println!("{received} frame(s) captured.");

    if mock && received == 0 {
        bail!("mock capture produced no frames");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::List => {
            let source = MousejackBuilder::new()
                .build()
                .context("libusb initialization failed")?;
            cmd_list(&source).await
        }
        Command::Probe { definition } => {
            let source = MousejackBuilder::new()
                .build()
                .context("libusb initialization failed")?;
            cmd_probe(&source, definition).await
        }
        Command::Channels => cmd_channels(),
        Command::Capture {
            definition,
            channel,
            duration,
            count,
            prefix,
            mock,
        } => {
            cmd_capture(
                definition,
                channel.as_deref(),
                *duration,
                *count,
                prefix.clone(),
                *mock,
            )
            .await
        }
    }
}
