//! `parley`: command-line front end of the offline-first chat client.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_client::config::ClientConfig;
use parley_client::state::AppState;
use parley_shared::constants::APP_NAME;
use parley_shared::types::ChatId;
use parley_store::{Chat, Message};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend base URL (overrides PARLEY_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// SQLite database file (overrides PARLEY_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in; without --otp a code is emailed first
    Login {
        email: String,
        #[arg(long)]
        otp: Option<String>,
    },
    /// Create an account; without --otp a code is emailed first
    Signup {
        first_name: String,
        last_name: String,
        email: String,
        #[arg(long)]
        otp: Option<String>,
    },
    /// List chats
    Chats,
    /// Show a chat and its messages
    Open { chat: String },
    /// Send a message
    Send { chat: String, text: String },
    /// Start a chat from someone's invite code
    Join { invite: String },
    /// Print your own invite code
    Invite,
    /// Push every unsynced record now
    Sync,
    /// Keep probing the backend and reconcile whenever it comes back
    Watch,
    /// Forget the session and all cached data
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_client=debug,parley_store=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting {} client v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = cli.db {
        config.db_path = Some(path);
    }
    info!(?config, "Loaded configuration");

    let state = AppState::open(config).context("failed to initialise client")?;
    let online = state.probe_now().await;
    info!(online, api = %state.config.api_url, "backend probed");

    match cli.command {
        Commands::Login { email, otp } => {
            let Some(code) = otp else {
                state.auth.send_otp(&email).await?;
                println!("Code sent to {email}; re-run with --otp <code>");
                return Ok(());
            };
            state.auth.verify_otp(&email, &code).await?;
            let user = state.auth.login(&email).await?;
            println!("Logged in as {} ({})", user.full_name(), user.id);
        }
        Commands::Signup {
            first_name,
            last_name,
            email,
            otp,
        } => {
            let Some(code) = otp else {
                state.auth.send_otp(&email).await?;
                println!("Code sent to {email}; re-run with --otp <code>");
                return Ok(());
            };
            state.auth.verify_otp(&email, &code).await?;
            let user = state.auth.signup(&first_name, &last_name, &email).await?;
            println!("Welcome, {} ({})", user.full_name(), user.id);
        }
        Commands::Chats => {
            let me = state.auth.session()?.user_id;
            let chats = state.sync.load_chats(&me).await?;
            if chats.is_empty() {
                println!("No chats yet.");
            }
            for chat in &chats {
                print_chat(chat);
            }
        }
        Commands::Open { chat } => {
            let view = state.sync.open_chat(&ChatId::new(chat)).await?;
            match &view.chat {
                Some(chat) => print_chat(chat),
                None => println!("(chat not cached)"),
            }
            // Stored newest first; print in reading order.
            for msg in view.messages.iter().rev() {
                print_message(msg);
            }
        }
        Commands::Send { chat, text } => {
            let me = state.auth.session()?.user_id;
            let msg = state.sync.send_message(&ChatId::new(chat), &me, &text).await?;
            print_message(&msg);
        }
        Commands::Join { invite } => {
            let user = state.auth.current_user()?;
            let chat = state
                .sync
                .create_chat_from_invite(&user.id, &user.full_name(), &invite)
                .await?;
            print_chat(&chat);
        }
        Commands::Invite => {
            println!("{}", state.auth.invite_code()?);
        }
        Commands::Sync => {
            let report = state.sync.reconcile().await?;
            println!(
                "chats: {} synced, {} failed; messages: {} synced, {} failed, {} waiting",
                report.chats_synced,
                report.chats_failed,
                report.messages_synced,
                report.messages_failed,
                report.messages_skipped,
            );
        }
        Commands::Watch => {
            let probe = state
                .sync
                .connectivity()
                .spawn_probe(state.api.clone(), state.config.probe_interval);
            let engine = state.sync.clone();

            tokio::select! {
                _ = engine.run_on_reconnect() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                }
            }
            probe.abort();
        }
        Commands::Logout => {
            state.auth.logout()?;
            println!("Logged out.");
        }
    }

    Ok(())
}

fn print_chat(chat: &Chat) {
    let marker = if chat.is_synced { ' ' } else { '*' };
    println!(
        "{marker} {id}  {name}  ({unread} unread)",
        id = chat.id,
        name = chat.user_name,
        unread = chat.unread_count,
    );
}

fn print_message(msg: &Message) {
    let marker = if msg.is_synced { ' ' } else { '*' };
    println!(
        "{marker} [{time}] {sender}: {text}",
        time = msg.created_at.format("%Y-%m-%d %H:%M"),
        sender = msg.sender_id,
        text = msg.text,
    );
}
