use super::fetch::FetchError;
use crate::models::NearestEpisode;
use crate::selector::SelectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The endpoint answered 500.
    Server,
    /// Any other status, or the request never got an answer.
    Connection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Empty,
    Error { kind: LoadError, retrying: bool },
    Ready(NearestEpisode),
}

impl ViewState {
    pub fn from_outcome(outcome: Result<NearestEpisode, FetchError>) -> Self {
        match outcome {
            Ok(episode) => ViewState::Ready(episode),
            Err(e) => match e.status() {
                Some(404) => ViewState::Empty,
                Some(500) => ViewState::Error {
                    kind: LoadError::Server,
                    retrying: false,
                },
                _ => ViewState::Error {
                    kind: LoadError::Connection,
                    retrying: false,
                },
            },
        }
    }

    /// Server-side rendering path: the selector result stands in for the HTTP round trip.
    pub fn from_selection(outcome: Result<NearestEpisode, SelectorError>) -> Self {
        Self::from_outcome(outcome.map_err(|e| FetchError::Status {
            status: e.status().as_u16(),
            info: serde_json::Value::Null,
        }))
    }

    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            ViewState::Loading | ViewState::Error { retrying: true, .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Card state machine. Only the response to the latest ticket is applied.
#[derive(Debug)]
pub struct CardModel {
    state: ViewState,
    latest: u64,
}

impl Default for CardModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CardModel {
    pub fn new() -> Self {
        Self {
            state: ViewState::Loading,
            latest: 0,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn begin_request(&mut self) -> Ticket {
        self.latest += 1;
        self.state = ViewState::Loading;
        Ticket(self.latest)
    }

    /// Manual retry keeps the error on screen with a busy retry control.
    pub fn begin_retry(&mut self) -> Option<Ticket> {
        match self.state {
            ViewState::Error {
                kind,
                retrying: false,
            } => {
                self.latest += 1;
                self.state = ViewState::Error {
                    kind,
                    retrying: true,
                };
                Some(Ticket(self.latest))
            }
            _ => None,
        }
    }

    /// Returns false when the ticket was superseded and the outcome dropped.
    pub fn settle(&mut self, ticket: Ticket, outcome: Result<NearestEpisode, FetchError>) -> bool {
        if ticket.0 != self.latest {
            return false;
        }
        self.state = ViewState::from_outcome(outcome);
        true
    }
}
