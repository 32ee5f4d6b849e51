// Session module - the practice session state machine
//
// state: SessionState, SessionAction and the pure transition table
// recording_session: one attempt (audio + result) kept consistent with its state
// events: SessionEvent and the completion sink seam
// machine: PracticeSession, which wires recorder, client and sink together

mod events;
mod machine;
mod recording_session;
mod state;

pub use events::{NullSink, SessionEvent, SessionResultSink};
pub use machine::{PracticeSession, SessionDeps};
pub use recording_session::RecordingSession;
pub use state::{transition, SessionAction, SessionState};
