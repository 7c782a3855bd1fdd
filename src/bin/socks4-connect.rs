// Fetch a page through a SOCKS4 proxy.
use std::error::Error;
use std::io::{Read, Write};
use std::time::Duration;

use clap::Parser;
use socks4_dialer::{Addr, Outbound, Socks4};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Proxy address, e.g. 127.0.0.1:1080 or [::1]:1080
    #[arg(long, default_value = "[::1]:1080")]
    proxy: String,

    /// Target IPv4 address
    #[arg(short, long, default_value = "78.47.48.145")]
    target: String,

    /// Target port
    #[arg(short, long, default_value_t = 80)]
    port: u16,

    /// Host header sent in the HTTP request
    #[arg(long, default_value = "bithalde.de")]
    host_header: String,

    /// User id sent to the proxy (optional)
    #[arg(short, long)]
    user_id: Option<String>,

    /// Timeout in seconds for connect and handshake
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Number of response bytes to print
    #[arg(long, default_value_t = 42)]
    read_bytes: usize,

    /// Log handshake details
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let timeout = Duration::from_secs(args.timeout);
    let mut socks4 = Socks4::new(args.proxy.as_str())
        .with_timeout(timeout)
        .with_handshake_timeout(timeout);
    if let Some(user_id) = &args.user_id {
        socks4 = socks4.with_user_id(user_id.as_str());
    }

    let mut target = Addr::new(args.target.as_str(), args.port);
    let mut conn = socks4.dial_tcp(&mut target)?;
    info!("tunnel to {} via {} established", target, args.proxy);

    let request = format!("GET / HTTP/1.0\r\nHost: {}\r\n\r\n", args.host_header);
    conn.write_all(request.as_bytes())?;

    let mut buf = Vec::with_capacity(args.read_bytes);
    conn.take(args.read_bytes as u64).read_to_end(&mut buf)?;
    println!("{}", String::from_utf8_lossy(&buf));
    Ok(())
}
