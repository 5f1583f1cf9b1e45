//! Per-connection session state machine.
//!
//! # Responsibility
//! - Run the AUTH/REGISTER handshake, then the strict request/response loop.
//! - Classify failures and decide whether the peer is told about them.
//!
//! # Invariants
//! - States move `Unauthenticated -> Authenticated -> Terminated` only; a
//!   session is never reused.
//! - Requests are handled strictly in order: the next frame is not read until
//!   the previous response has been written.
//! - Note operations run only in `Authenticated`, scoped to the bound user.

use crate::model::note::UserId;
use crate::model::user::User;
use crate::protocol::{
    decode_payload, read_frame, write_envelope, Credentials, Envelope, FrameError, MessageType,
};
use crate::server::dispatch::{DispatchError, Dispatcher};
use crate::server::error::{DomainError, ProtocolError, SessionError, TransportError};
use crate::server::Services;
use crate::service::auth_service::{AuthServiceError, CredentialVerifier};
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(User),
    Terminated,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Peer closed the connection at a message boundary.
    PeerClosed,
    TransportError,
    ProtocolError,
    /// Handshake failed with a domain error.
    HandshakeRejected,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::TransportError => "transport_error",
            Self::ProtocolError => "protocol_error",
            Self::HandshakeRejected => "handshake_rejected",
        }
    }
}

/// Summary returned when a session terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    /// Bound user, when the handshake succeeded.
    pub user_id: Option<UserId>,
    /// Authenticated-phase requests received.
    pub requests: u64,
    pub reason: EndReason,
}

type HandshakeHandler =
    fn(&dyn CredentialVerifier, &Credentials) -> Result<User, AuthServiceError>;

/// Handshake routes; any other type code is a protocol violation.
const HANDSHAKES: &[(MessageType, HandshakeHandler)] = &[
    (MessageType::Auth, authenticate),
    (MessageType::Register, register),
];

fn authenticate(
    verifier: &dyn CredentialVerifier,
    credentials: &Credentials,
) -> Result<User, AuthServiceError> {
    verifier.authenticate(&credentials.user_name, &credentials.password)
}

fn register(
    verifier: &dyn CredentialVerifier,
    credentials: &Credentials,
) -> Result<User, AuthServiceError> {
    verifier.register(&credentials.user_name, &credentials.password)
}

/// Server-side state for one client connection.
pub struct Session<S> {
    id: Uuid,
    peer: String,
    stream: S,
    credentials: Arc<dyn CredentialVerifier>,
    dispatcher: Dispatcher,
    max_message_size: usize,
    state: SessionState,
    requests: u64,
}

impl<S: Read + Write> Session<S> {
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        services: &Services,
        max_message_size: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: peer.into(),
            stream,
            credentials: Arc::clone(&services.credentials),
            dispatcher: Dispatcher::new(Arc::clone(&services.notes)),
            max_message_size,
            state: SessionState::Unauthenticated,
            requests: 0,
        }
    }

    /// Drives the session until it terminates.
    pub fn run(mut self) -> SessionReport {
        let started_at = Instant::now();
        info!(
            "event=session_start module=session status=ok session_id={} peer={}",
            self.id, self.peer
        );

        let reason = loop {
            match self.step() {
                Ok(true) => {}
                Ok(false) => break EndReason::PeerClosed,
                Err(err) => break self.abort(err),
            }
        };

        let user_id = match &self.state {
            SessionState::Authenticated(user) => Some(user.id),
            _ => None,
        };
        self.state = SessionState::Terminated;
        info!(
            "event=session_end module=session status=ok session_id={} peer={} reason={} requests={} duration_ms={}",
            self.id,
            self.peer,
            reason.as_str(),
            self.requests,
            started_at.elapsed().as_millis()
        );

        SessionReport {
            session_id: self.id,
            user_id,
            requests: self.requests,
            reason,
        }
    }

    /// Handles one incoming frame; `Ok(false)` means the peer closed.
    fn step(&mut self) -> Result<bool, SessionError> {
        let owner = match &self.state {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated(user) => Some(user.id),
            SessionState::Terminated => return Ok(false),
        };

        let Some(frame) = read_frame(&mut self.stream, self.max_message_size)? else {
            return Ok(false);
        };

        match owner {
            None => {
                let user = self.handshake(&frame)?;
                self.send(&Envelope::success())?;
                self.state = SessionState::Authenticated(user);
            }
            Some(owner) => self.serve_request(owner, &frame)?,
        }
        Ok(true)
    }

    fn handshake(&mut self, frame: &[u8]) -> Result<User, SessionError> {
        let envelope = Envelope::decode(frame).map_err(ProtocolError::from)?;
        let (kind, handler) = HANDSHAKES
            .iter()
            .find(|(kind, _)| kind.code() == envelope.code)
            .ok_or(ProtocolError::UnexpectedHandshakeMessage {
                code: envelope.code,
            })?;
        let credentials: Credentials =
            decode_payload(&envelope.data).map_err(ProtocolError::from)?;

        let user = match handler(self.credentials.as_ref(), &credentials) {
            Ok(user) => user,
            Err(err) => {
                let err = SessionError::from(err);
                info!(
                    "event=handshake module=session status=error mode={} session_id={} peer={} error_code={}",
                    kind.name(),
                    self.id,
                    self.peer,
                    err.code()
                );
                return Err(err);
            }
        };
        info!(
            "event=handshake module=session status=ok mode={} session_id={} peer={} user_id={}",
            kind.name(),
            self.id,
            self.peer,
            user.id
        );
        Ok(user)
    }

    fn serve_request(&mut self, owner: UserId, frame: &[u8]) -> Result<(), SessionError> {
        let request = Envelope::decode(frame)
            .map_err(|err| SessionError::Transport(TransportError::UndecodableEnvelope(err)))?;
        self.requests += 1;
        let kind = request.kind().map_or("unknown", MessageType::name);

        let outcome = match self.dispatcher.dispatch(owner, &request) {
            Ok(response) => {
                match write_envelope(&mut self.stream, &response, self.max_message_size) {
                    Ok(()) => Ok(()),
                    // Nothing was written; answer with ERROR instead.
                    Err(FrameError::MessageTooLarge { size, max }) => {
                        Err(DomainError::ResponseTooLarge { size, max })
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Err(DispatchError::Domain(err)) => Err(err),
            Err(DispatchError::Protocol(err)) => return Err(err.into()),
        };

        match outcome {
            Ok(()) => {
                debug!(
                    "event=request module=session status=ok session_id={} user_id={} code={} kind={}",
                    self.id, owner, request.code, kind
                );
            }
            Err(err) => {
                info!(
                    "event=request module=session status=domain_error session_id={} user_id={} code={} kind={} error_code={}",
                    self.id,
                    owner,
                    request.code,
                    kind,
                    err.code()
                );
                self.send(&Envelope::error(err.to_string()))?;
            }
        }
        Ok(())
    }

    fn send(&mut self, envelope: &Envelope) -> Result<(), SessionError> {
        write_envelope(&mut self.stream, envelope, self.max_message_size)
            .map_err(SessionError::from)
    }

    /// Logs a fatal error and notifies the peer when the error class allows.
    fn abort(&mut self, err: SessionError) -> EndReason {
        let reason = match &err {
            SessionError::Transport(_) => EndReason::TransportError,
            SessionError::Protocol(_) => EndReason::ProtocolError,
            SessionError::Domain(_) => EndReason::HandshakeRejected,
        };

        match &err {
            SessionError::Transport(inner) => {
                warn!(
                    "event=session_abort module=session status=error session_id={} peer={} error_code={} error={}",
                    self.id,
                    self.peer,
                    err.code(),
                    inner
                );
            }
            SessionError::Protocol(_) | SessionError::Domain(_) => {
                warn!(
                    "event=session_abort module=session status=error session_id={} peer={} error_code={}",
                    self.id,
                    self.peer,
                    err.code()
                );
                if let Err(send_err) = self.send(&Envelope::error(err.to_string())) {
                    debug!(
                        "event=session_abort module=session status=notify_failed session_id={} error={}",
                        self.id, send_err
                    );
                }
            }
        }

        reason
    }
}

#[cfg(test)]
mod tests {
    use super::{EndReason, Session};
    use crate::db::{open_db_in_memory, share};
    use crate::model::note::{Note, NoteList};
    use crate::protocol::{
        decode_payload, encode_payload, read_frame, write_envelope, write_frame, Credentials,
        Envelope, ErrorPayload, MessageType,
    };
    use crate::server::Services;
    use crate::service::auth_service::CredentialVerifier;
    use crate::service::password::PasswordHasher;
    use std::io::{Cursor, Read, Write};

    const WIRE_MAX: usize = 1 << 20;

    /// In-memory duplex: scripted client frames in, server frames out.
    struct Scripted {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Scripted {
        fn new(requests: &[Envelope]) -> Self {
            let mut input = Vec::new();
            for request in requests {
                write_envelope(&mut input, request, WIRE_MAX).unwrap();
            }
            Self::from_bytes(input)
        }

        fn from_bytes(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }

        fn responses(&self) -> Vec<Envelope> {
            let mut reader = Cursor::new(self.output.clone());
            let mut responses = Vec::new();
            while let Some(frame) = read_frame(&mut reader, WIRE_MAX).unwrap() {
                responses.push(Envelope::decode(&frame).unwrap());
            }
            responses
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn services() -> Services {
        Services::sqlite_with_hasher(share(open_db_in_memory().unwrap()), PasswordHasher::new(1))
    }

    fn handshake(kind: MessageType, user: &str, password: &str) -> Envelope {
        Envelope::new(kind, encode_payload(&Credentials::new(user, password)))
    }

    fn error_text(envelope: &Envelope) -> String {
        assert_eq!(envelope.kind(), Some(MessageType::Error));
        decode_payload::<ErrorPayload>(&envelope.data)
            .unwrap()
            .error_text
    }

    fn run(services: &Services, stream: &mut Scripted) -> super::SessionReport {
        Session::new(stream, "test-peer", services, WIRE_MAX).run()
    }

    #[test]
    fn register_then_requests_then_peer_close() {
        let services = services();
        let mut stream = Scripted::new(&[
            handshake(MessageType::Register, "alice", "pw1"),
            Envelope::new(MessageType::NewNote, encode_payload(&Note::draft("t", "b"))),
            Envelope::new(MessageType::GetAllNotes, Vec::new()),
        ]);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::PeerClosed);
        assert_eq!(report.requests, 2);
        assert!(report.user_id.is_some());

        let responses = stream.responses();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], Envelope::success());
        assert_eq!(responses[1], Envelope::success());
        let list: NoteList = decode_payload(&responses[2].data).unwrap();
        assert_eq!(list.count, 1);
        assert_eq!(list.notes[0].title, "t");
        assert_eq!(list.notes[0].body, "b");
    }

    #[test]
    fn auth_with_unknown_user_is_rejected_and_terminates() {
        let services = services();
        let mut stream = Scripted::new(&[
            handshake(MessageType::Auth, "ghost", "pw"),
            Envelope::new(MessageType::GetAllNotes, Vec::new()),
        ]);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::HandshakeRejected);
        assert_eq!(report.user_id, None);

        let responses = stream.responses();
        assert_eq!(responses.len(), 1);
        assert!(error_text(&responses[0]).contains("not found"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let services = services();
        services.credentials.register("alice", "pw1").unwrap();
        let mut stream = Scripted::new(&[handshake(MessageType::Auth, "alice", "nope")]);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::HandshakeRejected);
        assert_eq!(error_text(&stream.responses()[0]), "wrong password");
    }

    #[test]
    fn non_handshake_message_first_is_a_protocol_error() {
        let services = services();
        let mut stream = Scripted::new(&[Envelope::new(MessageType::GetAllNotes, Vec::new())]);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::ProtocolError);
        assert!(error_text(&stream.responses()[0]).contains("not AUTH or REGISTER"));
    }

    #[test]
    fn malformed_handshake_envelope_is_reported_before_closing() {
        let services = services();
        let mut input = Vec::new();
        write_frame(&mut input, b"garbage", WIRE_MAX).unwrap();
        let mut stream = Scripted::from_bytes(input);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::ProtocolError);
        assert!(error_text(&stream.responses()[0]).contains("malformed envelope"));
    }

    #[test]
    fn domain_errors_keep_the_session_open() {
        let services = services();
        let mut stream = Scripted::new(&[
            handshake(MessageType::Register, "bob", "pw"),
            Envelope::new(MessageType::DeleteNote, encode_payload(&Note::reference(404))),
            Envelope::new(MessageType::Logout, Vec::new()),
            Envelope::new(MessageType::GetAllNotes, Vec::new()),
        ]);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::PeerClosed);
        assert_eq!(report.requests, 3);

        let responses = stream.responses();
        assert_eq!(responses.len(), 4);
        assert_eq!(error_text(&responses[1]), "note 404 not found");
        assert_eq!(error_text(&responses[2]), "unknown server message code: 10");
        assert_eq!(responses[3].kind(), Some(MessageType::Success));
    }

    #[test]
    fn undecodable_envelope_after_auth_ends_silently() {
        let services = services();
        let mut input = Vec::new();
        let register = handshake(MessageType::Register, "carol", "pw");
        write_envelope(&mut input, &register, WIRE_MAX).unwrap();
        write_frame(&mut input, b"{broken", WIRE_MAX).unwrap();
        let mut stream = Scripted::from_bytes(input);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::TransportError);
        assert_eq!(stream.responses(), vec![Envelope::success()]);
    }

    #[test]
    fn malformed_inner_payload_after_auth_is_fatal() {
        let services = services();
        let mut stream = Scripted::new(&[
            handshake(MessageType::Register, "dave", "pw"),
            Envelope::new(MessageType::NewNote, b"\"nope\"".to_vec()),
            Envelope::new(MessageType::GetAllNotes, Vec::new()),
        ]);

        let report = run(&services, &mut stream);
        assert_eq!(report.reason, EndReason::ProtocolError);
        let responses = stream.responses();
        assert_eq!(responses.len(), 2);
        assert!(error_text(&responses[1]).contains("malformed note payload"));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let services = services();
        let mut input = Vec::new();
        write_frame(&mut input, &vec![b' '; 4096], WIRE_MAX).unwrap();
        let mut stream = Scripted::from_bytes(input);

        let report = Session::new(&mut stream, "test-peer", &services, 1024).run();
        assert_eq!(report.reason, EndReason::ProtocolError);
        assert!(error_text(&stream.responses()[0]).contains("message too large"));
    }

    #[test]
    fn oversized_list_response_is_answered_with_error_and_session_continues() {
        let services = services();
        let body = "x".repeat(1800);
        let mut stream = Scripted::new(&[
            handshake(MessageType::Register, "erin", "pw"),
            Envelope::new(MessageType::NewNote, encode_payload(&Note::draft("a", &body))),
            Envelope::new(MessageType::NewNote, encode_payload(&Note::draft("b", &body))),
            Envelope::new(MessageType::GetAllNotes, Vec::new()),
            Envelope::new(MessageType::GetByTitle, encode_payload(&Note::draft("a", ""))),
        ]);

        let report = Session::new(&mut stream, "test-peer", &services, 4096).run();
        assert_eq!(report.reason, EndReason::PeerClosed);
        assert_eq!(report.requests, 4);

        let responses = stream.responses();
        assert_eq!(responses.len(), 5);
        assert!(error_text(&responses[3]).starts_with("response too large"));
        let found: NoteList = decode_payload(&responses[4].data).unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(found.notes[0].body, body);
    }
}
