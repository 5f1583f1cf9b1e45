//! Blocking client for the note protocol.
//!
//! # Responsibility
//! - Speak the framed envelope protocol from the client side.
//! - Turn ERROR responses into `ClientError::Server` with the server's text.
//!
//! # Invariants
//! - One request in flight at a time; every call reads exactly one response.

use crate::model::note::{Note, NoteId, NoteList};
use crate::protocol::frame::DEFAULT_MAX_MESSAGE_SIZE;
use crate::protocol::{
    decode_payload, encode_payload, read_frame, write_envelope, CodecError, Credentials, Envelope,
    ErrorPayload, FrameError, MessageType, Payload,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// Client-side failure.
#[derive(Debug)]
pub enum ClientError {
    Frame(FrameError),
    Codec(CodecError),
    /// Server closed the connection instead of answering.
    ConnectionClosed,
    /// Server answered with ERROR.
    Server(String),
    /// Response type code was neither SUCCESS nor ERROR.
    UnexpectedResponse(i64),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frame(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::ConnectionClosed => write!(f, "connection closed by server"),
            Self::Server(text) => write!(f, "server error: {text}"),
            Self::UnexpectedResponse(code) => write!(f, "unexpected response type {code}"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Frame(err) => Some(err),
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(value: FrameError) -> Self {
        Self::Frame(value)
    }
}

impl From<CodecError> for ClientError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<io::Error> for ClientError {
    fn from(value: io::Error) -> Self {
        Self::Frame(FrameError::Io(value))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Typed client over any byte stream; TCP by default.
pub struct NoteClient<S = TcpStream> {
    stream: S,
    max_message_size: usize,
}

impl NoteClient<TcpStream> {
    pub fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> NoteClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Sets the frame size limit for both requests and responses; it should
    /// match the server's `max_message_size`.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn authenticate(&mut self, user_name: &str, password: &str) -> ClientResult<()> {
        self.handshake(MessageType::Auth, user_name, password)
    }

    pub fn register(&mut self, user_name: &str, password: &str) -> ClientResult<()> {
        self.handshake(MessageType::Register, user_name, password)
    }

    pub fn create_note(&mut self, title: &str, body: &str) -> ClientResult<()> {
        self.call(MessageType::NewNote, &Note::draft(title, body))?;
        Ok(())
    }

    pub fn get_note(&mut self, id: NoteId) -> ClientResult<Note> {
        let data = self.call(MessageType::GetNote, &Note::reference(id))?;
        Ok(decode_payload(&data)?)
    }

    pub fn update_note(&mut self, id: NoteId, title: &str, body: &str) -> ClientResult<()> {
        let note = Note {
            id,
            ..Note::draft(title, body)
        };
        self.call(MessageType::UpdateNote, &note)?;
        Ok(())
    }

    pub fn delete_note(&mut self, id: NoteId) -> ClientResult<()> {
        self.call(MessageType::DeleteNote, &Note::reference(id))?;
        Ok(())
    }

    pub fn list_notes(&mut self) -> ClientResult<NoteList> {
        let data = self.request(&Envelope::new(MessageType::GetAllNotes, Vec::new()))?;
        Ok(decode_payload(&data)?)
    }

    pub fn search_by_title(&mut self, title: &str) -> ClientResult<NoteList> {
        let data = self.call(MessageType::GetByTitle, &Note::draft(title, ""))?;
        Ok(decode_payload(&data)?)
    }

    /// Sends a raw envelope and returns the SUCCESS payload.
    ///
    /// # Errors
    /// - `ClientError::Server` when the server answers with ERROR.
    /// - `ClientError::ConnectionClosed` when no response arrives.
    pub fn request(&mut self, envelope: &Envelope) -> ClientResult<Vec<u8>> {
        write_envelope(&mut self.stream, envelope, self.max_message_size)?;
        let frame = read_frame(&mut self.stream, self.max_message_size)?
            .ok_or(ClientError::ConnectionClosed)?;
        let response = Envelope::decode(&frame)?;

        match response.kind() {
            Some(MessageType::Success) => Ok(response.data),
            Some(MessageType::Error) => {
                let payload: ErrorPayload = decode_payload(&response.data)?;
                Err(ClientError::Server(payload.error_text))
            }
            _ => Err(ClientError::UnexpectedResponse(response.code)),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn handshake(
        &mut self,
        kind: MessageType,
        user_name: &str,
        password: &str,
    ) -> ClientResult<()> {
        self.call(kind, &Credentials::new(user_name, password))?;
        Ok(())
    }

    fn call<P: Payload>(&mut self, kind: MessageType, payload: &P) -> ClientResult<Vec<u8>> {
        self.request(&Envelope::new(kind, encode_payload(payload)))
    }
}
