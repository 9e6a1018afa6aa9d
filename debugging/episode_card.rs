//! Mount the nearest-episode card against a running server and print the
//! markup of every state it passes through.
//! Uses NEAREST_EPISODE_URL, CARD_RETRY_COUNT and CARD_RETRY_DELAY_MS from the
//! environment (.env supported). Pass `--retry` to press "Try Again" once if
//! the card settles on an error.

use anyhow::{Context, Result};
use chrono::Local;
use dotenvy::dotenv;
use episode_viewer::card::{render_card, CardHandle, HttpEpisodeSource, RetryPolicy, ViewState};
use std::env;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_URL: &str = "http://127.0.0.1:3000/api/nearest-episode";

fn retry_policy() -> Result<RetryPolicy> {
    let mut policy = RetryPolicy::default();
    if let Ok(raw) = env::var("CARD_RETRY_COUNT") {
        policy.max_retries = raw.parse().context("CARD_RETRY_COUNT must be a number")?;
    }
    if let Ok(raw) = env::var("CARD_RETRY_DELAY_MS") {
        let ms: u64 = raw.parse().context("CARD_RETRY_DELAY_MS must be a number")?;
        policy.delay = Duration::from_millis(ms);
    }
    Ok(policy)
}

fn print_state(state: &ViewState) -> Result<()> {
    let html = render_card(state, &Local).context("Failed to render card")?;
    println!("{}\n", html);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present for local runs.
    dotenv().ok();

    let url = env::var("NEAREST_EPISODE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let retry_once = env::args().any(|a| a == "--retry");

    let source = HttpEpisodeSource::new(url).context("Failed to build HTTP client")?;
    let mut card = CardHandle::mount(Arc::new(source), retry_policy()?);

    print_state(&card.state())?;
    let mut settled = card.settled().await;
    print_state(&settled)?;

    if retry_once && matches!(settled, ViewState::Error { .. }) && card.retry().await {
        print_state(&card.state())?;
        settled = card.settled().await;
        print_state(&settled)?;
    }

    Ok(())
}
