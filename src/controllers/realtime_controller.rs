use std::{convert::Infallible, time::Duration};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

// GET /events
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let evt = match rx.recv().await {
            Ok(data) => Event::default().event("alertFired").data(data),
            Err(RecvError::Lagged(n)) => Event::default().event("ping").data(format!("lagged {n}")),
            Err(RecvError::Closed) => return None,
        };

        Some((Ok(evt), rx))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(20))
            .text("keep-alive"),
    )
}
