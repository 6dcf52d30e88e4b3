//! blur-ctl — command-line interface for the blurd daemon.

mod cmd;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_ADDR: &str = "127.0.0.1:5000";

fn print_usage() {
    println!("Usage: blur-ctl [--port <port>] [--addr <host:port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                     Show radius, bands, and job counters");
    println!("  radius                     Show the current filter radius");
    println!("  radius set <n>             Change the radius (even values round up)");
    println!("  jobs [limit]               List recently recorded jobs");
    println!("  send <input> <output>      Blur a PNG through the image socket");
    println!("  shutdown                   Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>        Control API port (default: {})", DEFAULT_PORT);
    println!("  --addr <host:port>   Image socket address (default: {})", DEFAULT_ADDR);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut addr = DEFAULT_ADDR.to_string();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--addr" => {
                i += 1;
                addr = args.get(i).context("--addr requires a value")?.clone();
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["shutdown"] => cmd::status::cmd_shutdown(port).await,
        ["radius"] => cmd::radius::cmd_radius(port).await,
        ["radius", "set", n] => cmd::radius::cmd_radius_set(port, n).await,
        ["jobs"] => cmd::jobs::cmd_jobs(port, None).await,
        ["jobs", limit] => cmd::jobs::cmd_jobs(port, Some(*limit)).await,
        ["send", input, output] => cmd::send::cmd_send(&addr, input, output).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
