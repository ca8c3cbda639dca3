//! In-process bucket notifications.
//!
//! The store pushes an event onto the channel after every write and the
//! dispatcher hands each one to the thumbnail creator in its own task, the
//! way a bucket notification triggers an independent handler invocation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span};

use crate::models::event::S3Event;
use crate::services::thumbnail_service::ThumbnailCreator;

pub type EventSender = mpsc::UnboundedSender<S3Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<S3Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Run until every sender is dropped.
pub async fn dispatch(mut events: EventReceiver, creator: Arc<ThumbnailCreator>) {
    while let Some(event) = events.recv().await {
        let creator = creator.clone();
        let span = info_span!("object_created_invocation");
        tokio::spawn(
            async move {
                match creator.handle(&event).await {
                    Ok(Some(url)) => info!(%url, "thumbnail created"),
                    Ok(None) => debug!("event skipped"),
                    Err(err) => error!(error = %err, "thumbnail invocation failed"),
                }
            }
            .instrument(span),
        );
    }
    debug!("notification channel closed, dispatcher stopping");
}
