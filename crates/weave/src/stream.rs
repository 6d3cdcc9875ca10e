use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, ready};
use pin_project::pin_project;

use crate::{
    enrich::{BlockIndexSet, enrich},
    messages::StreamChunk,
    provider::{CallOptions, Provider},
};

/// Canonical chunks of one provider stream.
///
/// Owns the stream's [`BlockIndexSet`]. Events that decode to nothing are skipped. Dropping
/// the stream cancels it, and every chunk already yielded stays a valid fragment.
#[pin_project]
pub struct EnrichedStream<'a, P, S>
where
    P: Provider,
{
    #[pin]
    events: S,
    provider: &'a P,
    options: CallOptions,
    blocks: BlockIndexSet,
    pending: VecDeque<StreamChunk>,
}

impl<'a, P, S> EnrichedStream<'a, P, S>
where
    P: Provider,
    S: Stream<Item = P::StreamEvent>,
{
    pub fn new(provider: &'a P, events: S, options: CallOptions) -> Self {
        Self {
            events,
            provider,
            options,
            blocks: BlockIndexSet::new(),
            pending: VecDeque::new(),
        }
    }

    /// Block indices seen so far.
    pub fn blocks(&self) -> &BlockIndexSet {
        &self.blocks
    }
}

impl<P, S> Stream for EnrichedStream<'_, P, S>
where
    P: Provider,
    S: Stream<Item = P::StreamEvent>,
{
    type Item = StreamChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(chunk) = this.pending.pop_front() {
                return Poll::Ready(Some(chunk));
            }

            let Some(event) = ready!(this.events.as_mut().poll_next(cx)) else {
                return Poll::Ready(None);
            };

            for raw in this.provider.decode_event(event, this.options) {
                let chunk = enrich(raw, this.blocks);
                this.pending.push_back(chunk);
            }
        }
    }
}
