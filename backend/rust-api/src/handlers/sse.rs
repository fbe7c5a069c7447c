use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

use super::{quizzes::player_service, reject};
use crate::metrics::SSE_CONNECTIONS_ACTIVE;
use crate::models::quiz::InviteCode;
use crate::models::session::{SessionClosed, SessionEvent};
use crate::services::{leaderboard_service::LeaderboardService, AppState};

/// SSE endpoint for live session and leaderboard updates
/// GET /api/v1/quizzes/{code}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Client connected to SSE stream: quiz={}", code);

    // Fails with 404 before any stream is opened.
    let player = player_service(&state);
    player.snapshot(&code).await.map_err(reject)?;
    let code = InviteCode::parse(&code).map_err(reject)?;

    let sessions = player.watch(&code).await.map_err(reject)?;
    let quiz_code = code.to_string();
    let sessions = sessions.map(move |snapshot| match snapshot {
        Some(snapshot) => SessionEvent::SessionUpdate(snapshot),
        None => SessionEvent::SessionClosed(SessionClosed {
            quiz_code: quiz_code.clone(),
            message: "The quiz session is no longer available".to_string(),
        }),
    });

    let boards = LeaderboardService::new(state.store.clone())
        .subscribe(&code)
        .await
        .map_err(reject)?
        .map(SessionEvent::LeaderboardUpdate);

    let events = stream::select(sessions, boards).boxed();
    Ok(Sse::new(create_event_stream(code, events)).keep_alive(KeepAlive::default()))
}

/// Counts the connection while the response stream is alive.
struct ConnectionGuard {
    code: InviteCode,
}

impl ConnectionGuard {
    fn new(code: InviteCode) -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self { code }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
        tracing::info!("SSE stream closed: quiz={}", self.code);
    }
}

/// Forwards events until the session closes or the client disconnects.
fn create_event_stream(
    code: InviteCode,
    events: BoxStream<'static, SessionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (events, ConnectionGuard::new(code), false),
        |(mut events, guard, closed)| async move {
            if closed {
                return None;
            }

            let event = events.next().await?;
            let closed = matches!(event, SessionEvent::SessionClosed(_));
            if closed {
                tracing::info!("Session closed, ending stream: quiz={}", guard.code);
            }

            let sse = Event::default()
                .event(event.event_name())
                .data(event.to_sse_data());

            Some((Ok(sse), (events, guard, closed)))
        },
    )
}
