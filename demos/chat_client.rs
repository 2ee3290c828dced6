//! Interactive chat client demo
//!
//! Run with: cargo run --example chat_client -- TOKEN [ROOM] [SERVER]
//!
//! Examples:
//!   cargo run --example chat_client -- eyJhbGci...
//!   cargo run --example chat_client -- eyJhbGci... lobby
//!   cargo run --example chat_client -- eyJhbGci... lobby 127.0.0.1:7700
//!
//! Get a token from the chat_server demo, which prints two on startup.
//! Type a line to send it to the room; type /ping to probe the server
//! and /quit to leave.

use roomcast::client::{ChatClient, ClientConfig};
use roomcast::protocol::ServerFrame;
use roomcast::store::StoredMessage;
use tokio::io::AsyncBufReadExt;

fn print_usage() {
    eprintln!("Usage: chat_client TOKEN [ROOM] [SERVER]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  TOKEN     Signed token from the chat server operator");
    eprintln!("  ROOM      Room to join (default: lobby)");
    eprintln!("  SERVER    Server address (default: 127.0.0.1:7667)");
    eprintln!();
    eprintln!("Commands once connected:");
    eprintln!("  /ping     Probe the server");
    eprintln!("  /quit     Leave the room and exit");
}

fn render_history(message: &StoredMessage) {
    println!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M:%S"),
        message.author_name,
        message.content
    );
}

fn render(frame: &ServerFrame) {
    match frame {
        ServerFrame::NewMessage { data } => render_history(data),
        ServerFrame::UserJoined { data } => println!("* {}", data.message),
        ServerFrame::UserLeft { data } => println!("* {}", data.message),
        ServerFrame::Pong => println!("* pong"),
        ServerFrame::Error { message } => eprintln!("! server error: {}", message),
        ServerFrame::ForceDisconnect { message } => println!("! disconnected: {}", message),
        other => println!("? unexpected {} frame", other.kind()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") || args.len() < 2 {
        print_usage();
        if args.len() < 2 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let token = args[1].clone();
    let room = args.get(2).cloned().unwrap_or_else(|| "lobby".to_string());
    let server = args
        .get(3)
        .cloned()
        .unwrap_or_else(|| "127.0.0.1:7667".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Connecting to {}...", server);
    let mut client = ChatClient::connect(ClientConfig::new(server)).await?;

    let greeting = client.authenticate(&token, &room).await?;
    println!("Joined {} as {}", greeting.room, greeting.user);
    if greeting.history.is_empty() {
        println!("No history yet. Say something!");
    } else {
        println!("--- last {} messages ---", greeting.history.len());
        for message in &greeting.history {
            render_history(message);
        }
        println!("--- end of history ---");
    }

    let (mut incoming, mut outgoing) = client.into_split();

    // Print broadcasts as they arrive
    let mut reader_task = tokio::spawn(async move {
        loop {
            match incoming.next_frame().await {
                Ok(Some(frame)) => render(&frame),
                Ok(None) => {
                    println!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    eprintln!("Read error: {}", e);
                    break;
                }
            }
        }
    });
    let mut reader_done = false;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = &mut reader_task => {
                reader_done = true;
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) if line.trim() == "/ping" => outgoing.ping().await?,
                Some(line) if line.trim().is_empty() => {}
                Some(line) => outgoing.send_message(&line).await?,
                None => break,
            }
        }
    }

    let _ = outgoing.close().await;
    if !reader_done {
        let _ = reader_task.await;
    }

    Ok(())
}
