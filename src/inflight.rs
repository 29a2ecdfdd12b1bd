use tokio_util::sync::CancellationToken;

/// Tracks the single current request of one request class.
///
/// Each new request bumps the generation and cancels the token handed to the
/// previous one. A completion is only applied when its captured generation is
/// still current, so a superseded response is dropped even if it raced past
/// the cancellation.
#[derive(Debug, Default)]
pub(crate) struct Inflight {
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl Inflight {
    /// Invalidates whatever is in flight and returns the new generation.
    pub(crate) fn supersede(&mut self) -> u64 {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.generation += 1;
        self.generation
    }

    /// Token for a request started under the current generation.
    pub(crate) fn token(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        token
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Called once the current request has settled.
    pub(crate) fn finish(&mut self, generation: u64) {
        if self.is_current(generation) {
            self.cancel = None;
        }
    }
}
