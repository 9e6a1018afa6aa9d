//! HTML for each card state.
//!
//! Everything is escaped except the episode description, which is trusted
//! markup sanitized upstream and emitted verbatim.

use super::state::{LoadError, ViewState};
use crate::models::parse_start_time;
use askama::Template;
use chrono::TimeZone;
use std::fmt::Display;

const LABEL_FORMAT: &str = "%b %d, %Y, %H:%M";

pub const SERVER_ERROR_MESSAGE: &str = "Server error occurred. Please try again later.";
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Failed to load episode information. Please check your connection.";

#[derive(Template)]
#[template(path = "card_loading.html")]
struct LoadingCard;

#[derive(Template)]
#[template(path = "card_empty.html")]
struct EmptyCard;

#[derive(Template)]
#[template(path = "card_error.html")]
struct ErrorCard {
    message: &'static str,
    retrying: bool,
}

#[derive(Template)]
#[template(path = "card_ready.html")]
struct ReadyCard<'a> {
    title: &'a str,
    start_time: &'a str,
    label: String,
    description: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "page.html")]
struct Page<'a> {
    card: &'a str,
}

/// "Jun 16, 2025, 01:00" in `tz`; falls back to the raw string if it does not parse.
pub fn format_start_label<Tz>(start_time: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match parse_start_time(start_time) {
        Some(instant) => instant.with_timezone(tz).format(LABEL_FORMAT).to_string(),
        None => start_time.to_string(),
    }
}

pub fn render_card<Tz>(state: &ViewState, tz: &Tz) -> askama::Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match state {
        ViewState::Loading => LoadingCard.render(),
        ViewState::Empty => EmptyCard.render(),
        ViewState::Error { kind, retrying } => ErrorCard {
            message: match kind {
                LoadError::Server => SERVER_ERROR_MESSAGE,
                LoadError::Connection => CONNECTION_ERROR_MESSAGE,
            },
            retrying: *retrying,
        }
        .render(),
        ViewState::Ready(episode) => ReadyCard {
            title: &episode.title,
            start_time: &episode.start_time,
            label: format_start_label(&episode.start_time, tz),
            description: episode.description.as_deref(),
        }
        .render(),
    }
}

pub fn render_page<Tz>(state: &ViewState, tz: &Tz) -> askama::Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let card = render_card(state, tz)?;
    Page { card: &card }.render()
}
