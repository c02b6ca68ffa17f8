use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use eventwire_events::{CommandPayload, CommandRegistry};

use crate::app::demo::{Journal, NoteRecorder, RecordNote};
use crate::ingress::{CommandIngress, IngressOptions};

pub mod journal;
pub mod system;

/// Command endpoints plus the journal view.
pub fn router(
    commands: Arc<CommandRegistry>,
    options: IngressOptions,
    notes: Arc<Journal>,
) -> Router {
    let recorder = Arc::new(NoteRecorder::new(notes.clone()));
    let record_note = CommandIngress::new(commands, RecordNote::COMMAND_TYPE).with_options(options);

    Router::new()
        .route(
            "/commands/record_note",
            record_note.clone().handler(recorder.clone()),
        )
        .route(
            "/commands/record_note_with_reply",
            record_note.handler_with_reply(recorder),
        )
        .route("/journal", get(journal::list))
        .layer(Extension(notes))
}
