//! Server session state machine.
//!
//! Transport-independent: each inbound message is applied to the current
//! state and yields one [`SessionAction`] for the connection layer to carry
//! out. Responses produced here (and by the connection layer) must leave the
//! connection in arrival order.

use tracing::debug;

use crate::protocol::message::Message;
use crate::value::Map;

/// Lifecycle states of a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Running,
    Failed,
    Closing,
    Closed,
}

/// Whether a released run streams its records or discards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Pull,
    Discard,
}

/// What the connection layer must do in response to one inbound message.
#[derive(Debug, PartialEq)]
pub enum SessionAction {
    /// Invoke the init hook, then reply SUCCESS(server metadata).
    Init { client_name: String, auth_token: Map },
    /// Queue the run task behind its readiness signal; no response yet.
    EnqueueRun { statement: String, parameters: Map },
    /// Release the readiness signal of the oldest queued run.
    ReleaseStream(StreamMode),
    /// Invoke the ack-failure hook, then reply SUCCESS({}).
    AckFailure,
    /// Cancel the in-flight task, drain the queue emitting one IGNORED per
    /// queued run, clear the buffers, then reply SUCCESS({}).
    Reset,
    /// Reply IGNORED({}) and drop the oldest pending readiness signal: the
    /// stream request belongs to a run that already failed.
    IgnoreStream,
    /// Emit the given response, in order with everything queued before it.
    Reply(Message),
}

/// The per-connection state machine driving legal transitions.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Mark the session failed; called when a run task raises.
    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
    }

    pub fn set_closing(&mut self) {
        self.state = SessionState::Closing;
    }

    pub fn set_closed(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Apply one inbound message, returning the action for the connection layer.
    pub fn on_message(&mut self, message: Message) -> SessionAction {
        let action = match self.state {
            SessionState::Uninitialized => match message {
                Message::Init {
                    client_name,
                    auth_token,
                } => {
                    self.state = SessionState::Ready;
                    SessionAction::Init {
                        client_name,
                        auth_token,
                    }
                }
                _ => {
                    self.state = SessionState::Failed;
                    SessionAction::Reply(Message::Failure {
                        metadata: Vec::new(),
                    })
                }
            },
            SessionState::Ready => match message {
                Message::Run {
                    statement,
                    parameters,
                } => {
                    self.state = SessionState::Running;
                    SessionAction::EnqueueRun {
                        statement,
                        parameters,
                    }
                }
                Message::Reset => SessionAction::Reset,
                _ => {
                    self.state = SessionState::Failed;
                    SessionAction::Reply(Message::Failure {
                        metadata: Vec::new(),
                    })
                }
            },
            SessionState::Running => match message {
                Message::PullAll => {
                    self.state = SessionState::Ready;
                    SessionAction::ReleaseStream(StreamMode::Pull)
                }
                Message::DiscardAll => {
                    self.state = SessionState::Ready;
                    SessionAction::ReleaseStream(StreamMode::Discard)
                }
                _ => {
                    self.state = SessionState::Failed;
                    SessionAction::Reply(Message::Failure {
                        metadata: Vec::new(),
                    })
                }
            },
            SessionState::Failed => match message {
                Message::AckFailure => {
                    self.state = SessionState::Ready;
                    SessionAction::AckFailure
                }
                Message::Reset => {
                    self.state = SessionState::Ready;
                    SessionAction::Reset
                }
                Message::PullAll | Message::DiscardAll => SessionAction::IgnoreStream,
                _ => SessionAction::Reply(Message::Ignored {
                    metadata: Vec::new(),
                }),
            },
            // Nothing inbound is expected past close; answer with a failure
            // without resurrecting the session.
            SessionState::Closing | SessionState::Closed => {
                SessionAction::Reply(Message::Failure {
                    metadata: Vec::new(),
                })
            }
        };
        debug!(state = ?self.state, ?action, "session transition");
        action
    }
}
