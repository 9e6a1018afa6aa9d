//! The nearest-episode card: request layer, view-state machine and markup.

mod fetch;
mod handle;
mod render;
mod state;

pub use fetch::{fetch_with_retry, EpisodeSource, FetchError, HttpEpisodeSource, RetryPolicy};
pub use handle::CardHandle;
pub use render::{
    format_start_label, render_card, render_page, CONNECTION_ERROR_MESSAGE, SERVER_ERROR_MESSAGE,
};
pub use state::{CardModel, LoadError, Ticket, ViewState};
