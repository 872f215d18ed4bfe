//! Interactive terminal front end for the guest chat client.
//!
//! Initialises the guest session, connects to the broker, then bridges
//! stdin lines to outbound sends and inbound messages to stdout with the
//! streaming reveal. Configuration comes from the environment:
//! `HOLLER_AUTH_BASE` (default `http://localhost:8080/auth`) and
//! `HOLLER_WS_BASE` (default `ws://localhost:8080`).

use std::io::Write as _;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use holler_client::{reveal_steps, ChatConfig, ChatPanel, GuestChatClient};
use holler_session::{SessionManager, SessionStore};
use holler_shared::constants::{REVEAL_STEP, REVEAL_TICK_MS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("holler_client=debug,holler_net=debug,holler_session=info,warn")
    });
    fmt().with_env_filter(filter).with_target(true).init();

    let auth_base = std::env::var("HOLLER_AUTH_BASE")
        .unwrap_or_else(|_| "http://localhost:8080/auth".to_string());
    let ws_base =
        std::env::var("HOLLER_WS_BASE").unwrap_or_else(|_| "ws://localhost:8080".to_string());

    let store = SessionStore::open_default().context("opening session store")?;
    let session = SessionManager::new(auth_base, store);

    let snapshot = session.session_snapshot();
    if let Some(identity) = snapshot.identity {
        tracing::info!(
            guest = %identity.short(),
            credential = snapshot.credential_preview.as_deref().unwrap_or("none"),
            "found stored session"
        );
    }

    let mut panel = ChatPanel::new();
    print_last_line(&panel);

    panel.connect_started();
    let credential = match session.init_session().await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "guest session init failed");
            panel.connect_failed();
            print_last_line(&panel);
            return Ok(());
        }
    };
    let identity = session.get_or_create_identity()?;

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let mut client = GuestChatClient::new(ChatConfig::new(ws_base));
    let callback = Box::new(move |message| {
        let _ = inbound_tx.send(message);
    });

    if let Err(e) = client.connect(&credential, identity, callback).await {
        tracing::error!(error = %e, "guest chat connect failed");
        panel.connect_failed();
        print_last_line(&panel);
        return Ok(());
    }
    panel.connect_succeeded();
    println!("[{}] type a message, /quit to exit", panel.status_text());

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            inbound = inbound_rx.recv() => {
                let Some(message) = inbound else { break };
                panel.push_inbound(&message);
                print!("support: ");
                let mut shown = 0;
                for prefix in reveal_steps(&message.text, REVEAL_STEP) {
                    print!("{}", &prefix[shown..]);
                    std::io::stdout().flush().ok();
                    shown = prefix.len();
                    tokio::time::sleep(std::time::Duration::from_millis(REVEAL_TICK_MS)).await;
                }
                panel.finish_streaming();
                println!();
            }

            line = lines.next_line() => {
                match line? {
                    None => break,
                    Some(input) if input.trim() == "/quit" => break,
                    Some(input) => {
                        if let Some(text) = panel.prepare_send(&input) {
                            let conversation = panel.conversation().clone();
                            if let Err(e) = client.send_message(&text, &conversation).await {
                                tracing::warn!(error = %e, "message not sent");
                            }
                        }
                    }
                }
            }
        }
    }

    client.disconnect();
    Ok(())
}

fn print_last_line(panel: &ChatPanel) {
    if let Some(line) = panel.messages().last() {
        println!("support: {}", line.text);
    }
}
