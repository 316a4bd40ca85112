use crate::paginate::PageStream;
use model::core::{identifiers::Identifier, window::FetchWindow};

/// Per-run inputs a connector needs beyond the window.
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    /// Resolved identifiers for multi-identifier endpoints. Ignored by
    /// sources that enumerate everything themselves.
    pub identifiers: Vec<Identifier>,
}

impl FetchParams {
    pub fn with_identifiers(identifiers: Vec<Identifier>) -> Self {
        Self { identifiers }
    }
}

/// Upstream source that yields raw pages for a window.
///
/// A connector never writes; the stream is lazy and each page is requested
/// only when the consumer asks for it.
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Largest window one fetch may cover. Longer windows are split by the caller.
    fn max_window_days(&self) -> Option<u32> {
        None
    }

    fn fetch<'a>(&'a self, window: FetchWindow, params: &'a FetchParams) -> PageStream<'a>;
}
