mod config;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use oscport::{Encoder, OscPort, OscReceiver, OscSender, PortConfig, ReceiveMode};

#[derive(Parser)]
#[command(name = "osc-tester")]
#[command(about = "Send, receive and loop back OSC messages over UDP")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send `(1, "hello", 3.14)` messages to a remote endpoint
    Send {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value_t = oscport::config::DEFAULT_REMOTE_PORT)]
        port: u16,

        #[arg(short, long, default_value_t = 1)]
        count: u32,

        #[arg(long, default_value_t = 0)]
        interval_ms: u64,

        #[arg(long = "async", help = "Queue sends on the background thread")]
        queued: bool,
    },
    /// Log every received message until Ctrl-C
    Receive {
        #[arg(short, long, default_value_t = oscport::config::DEFAULT_REMOTE_PORT)]
        port: u16,

        #[arg(long, help = "Stop after this many seconds")]
        duration: Option<u64>,
    },
    /// Send counted /ping messages to a port's own address and verify order
    Loopback {
        #[arg(short, long, default_value_t = 0)]
        port: u16,

        #[arg(short, long, default_value_t = 100)]
        count: i32,

        #[arg(long, help = "YAML file overriding the port configuration")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Send {
            host,
            port,
            count,
            interval_ms,
            queued,
        } => send(&host, port, count, Duration::from_millis(interval_ms), queued),
        Command::Receive { port, duration } => receive(port, duration.map(Duration::from_secs)),
        Command::Loopback {
            port,
            count,
            config,
        } => {
            let mut config = match config {
                Some(path) => config::load_port_config(&path)?,
                None => PortConfig::default(),
            };
            if port != 0 {
                config.local_port = port;
            }
            loopback(config, count)
        }
    }
}

fn send(host: &str, port: u16, count: u32, interval: Duration, queued: bool) -> Result<()> {
    let sender = OscSender::to_host(host, port)
        .with_context(|| format!("Failed to create sender for {}:{}", host, port))?;
    let path = if queued { "/async" } else { "/sync" };
    log::info!(
        "Sending {} message(s) from {} to {}:{}",
        count,
        sender.local_addr(),
        host,
        port
    );

    for _ in 0..count {
        let bytes = Encoder::new(path).add(1).add("hello").add(3.14f32).encode()?;
        let start = Instant::now();
        if queued {
            sender.send_async(bytes)?;
        } else {
            sender.send(&bytes)?;
        }
        log::info!("{} took {:?}", path, start.elapsed());
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    sender.dispose();
    log::info!("{:?}", sender.socket().stats());
    Ok(())
}

fn receive(port: u16, duration: Option<Duration>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let receiver =
        OscReceiver::bind(port).with_context(|| format!("Failed to bind port {}", port))?;
    receiver.add_receiver(|capsule| log::info!("{}", capsule));
    receiver.add_error(|e| log::warn!("{}", e));

    let start = Instant::now();
    while running.load(Ordering::SeqCst) {
        if duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    receiver.dispose();
    log::info!("{:?}", receiver.socket().stats());
    Ok(())
}

fn loopback(mut config: PortConfig, count: i32) -> Result<()> {
    config.receive_mode = ReceiveMode::Poll;
    config.limit_receive_buffer = 0;
    if config.bind_address.is_unspecified() {
        config.bind_address = Ipv4Addr::LOCALHOST;
    }

    let port = OscPort::start(config).context("Failed to start port")?;
    let own = port.local_addr();
    log::info!("Looping {} message(s) through {}", count, own);

    for i in 0..count {
        port.send_message_to(&Encoder::new("/ping").add(i).into_message(), own)?;
    }

    let mut expected = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    while expected < count && Instant::now() < deadline {
        for capsule in port.poll_received() {
            let value = capsule.message.args.first().and_then(|a| a.as_int());
            if value != Some(expected) {
                bail!("Out of order: expected {}, got {}", expected, capsule.message);
            }
            expected += 1;
        }
        for error in port.poll_errors() {
            log::warn!("{}", error);
        }
        thread::sleep(Duration::from_millis(1));
    }

    log::info!("{}", port.diagnostics());
    port.dispose();
    if expected < count {
        bail!("Received {} of {} messages", expected, count);
    }
    log::info!("All {} messages arrived in order", count);
    Ok(())
}
