//! Chat server demo with an in-memory store
//!
//! Run with: cargo run --example chat_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example chat_server                    # binds to 0.0.0.0:7667
//!   cargo run --example chat_server localhost          # binds to 127.0.0.1:7667
//!   cargo run --example chat_server 127.0.0.1:7700     # binds to 127.0.0.1:7700
//!
//! The demo seeds a `lobby` room with two users and prints signed tokens
//! for them, ready to paste into the chat_client demo. The signing secret
//! comes from the SECRET_KEY environment variable, falling back to a demo
//! value so the pair works out of the box.

use std::net::SocketAddr;
use std::sync::Arc;

use roomcast::auth::{Identity, JwtIssuer, JwtVerifier, SECRET_ENV_VAR};
use roomcast::store::{ChatStore, MemoryStore};
use roomcast::{ChatServer, ServerConfig};

const DEMO_SECRET: &str = "roomcast-demo-secret";

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:7667
/// - "localhost:7700" -> 127.0.0.1:7700
/// - "127.0.0.1" -> 127.0.0.1:7667
/// - "0.0.0.0:7667" -> 0.0.0.0:7667
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = roomcast::protocol::DEFAULT_PORT;

    // Replace "localhost" with "127.0.0.1"
    let normalized = arg.replace("localhost", "127.0.0.1");

    // Try parsing as SocketAddr first (includes port)
    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    // Try parsing as IP address without port
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: chat_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:7667)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  chat_server                     # binds to 0.0.0.0:7667");
    eprintln!("  chat_server localhost           # binds to 127.0.0.1:7667");
    eprintln!("  chat_server 127.0.0.1:7700      # binds to 127.0.0.1:7700");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], roomcast::protocol::DEFAULT_PORT)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roomcast=debug".parse()?)
                .add_directive("chat_server=debug".parse()?),
        )
        .init();

    let secret = std::env::var(SECRET_ENV_VAR).unwrap_or_else(|_| DEMO_SECRET.to_string());

    // Seed the store with a room and two users
    let store = Arc::new(MemoryStore::new());
    let alice = store.add_user("alice").await;
    let bob = store.add_user("bob").await;
    store.create_room("lobby", alice, None).await?;

    let issuer = JwtIssuer::new(secret.as_bytes());
    let alice_token = issuer.issue(&Identity::new(alice, "alice"))?;
    let bob_token = issuer.issue(&Identity::new(bob, "bob"))?;

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };

    println!("Starting chat server on {}", config.bind_addr);
    println!();
    println!("=== Demo tokens (valid 24h, room: lobby) ===");
    println!("alice: {}", alice_token);
    println!("bob:   {}", bob_token);
    println!();
    println!("=== Join with the demo client ===");
    println!("cargo run --example chat_client -- <TOKEN>");
    println!("cargo run --example chat_client -- <TOKEN> lobby {}", config.bind_addr);
    println!();

    let verifier = Arc::new(JwtVerifier::new(secret.as_bytes()));
    let server = ChatServer::new(config, verifier, store);

    // Run until Ctrl+C, then disconnect every session cleanly
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
