//! Three peers on one in-process bus: a one-to-one chat, then a group.
//!
//! ```text
//! cargo run -p chat-demo                # default client config
//! cargo run -p chat-demo -- config.json # config overrides, e.g. {"qos": "exactly_once"}
//! RUST_LOG=parley=debug cargo run -p chat-demo
//! ```

use std::error::Error;

use parley::prelude::*;
use parley::protocol::topics::group_chat_topic;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn load_config() -> Result<ClientConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(ClientConfig::default()),
    }
}

async fn show(client: &ParleyClient) -> Result<(), ParleyError> {
    for event in client.poll_events().await? {
        info!(user = %client.user_id(), event = ?event, "{}", event.type_name());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config()?;
    let broker = LocalBus::new();

    let connect = |id: &str| {
        let builder = ParleyClient::builder().config(config.clone());
        let bus = broker.connect(id);
        async move { builder.connect(bus?).await }
    };
    let alice = connect("alice").await?;
    let bob = connect("bob").await?;
    let carol = connect("carol").await?;

    // -- One-to-one --

    let request_id = alice.send_invite(bob.user_id()).await?;
    show(&bob).await?;
    let chat_topic = bob.accept_invite(&request_id).await?;
    show(&alice).await?;

    alice.send_message(&chat_topic, "hi bob").await?;
    bob.send_message(&chat_topic, "hey alice").await?;
    show(&alice).await?;
    show(&bob).await?;

    // -- Group --

    let group = carol.create_group("Friends").await?;
    show(&carol).await?;

    for peer in [&alice, &bob] {
        show(peer).await?;
        peer.request_join_discovered(&group.group_id).await?;
    }
    for pending in carol.snapshot().await?.pending_join_requests {
        carol
            .approve_join_request(&pending.group_id, &pending.requester)
            .await?;
    }
    show(&carol).await?;
    show(&alice).await?;
    show(&bob).await?;

    let group_topic = group_chat_topic(&group.group_id);
    carol
        .send_group_message(&group_topic, &group.group_id, "welcome, both of you")
        .await?;
    alice
        .send_group_message(&group_topic, &group.group_id, "thanks carol")
        .await?;
    for peer in [&alice, &bob, &carol] {
        show(peer).await?;
    }

    alice.save_conversations().await?;
    show(&alice).await?;

    carol.clean_all_groups().await?;
    for peer in [&alice, &bob, &carol] {
        show(peer).await?;
        peer.shutdown().await;
    }

    info!("demo finished");
    Ok(())
}
