use notekeeper_core::db::{open_db_in_memory, share};
use notekeeper_core::protocol::frame::DEFAULT_MAX_MESSAGE_SIZE;
use notekeeper_core::protocol::{
    encode_payload, read_frame, write_envelope, Credentials, Envelope, FrameError, MessageType,
};
use notekeeper_core::service::password::PasswordHasher;
use notekeeper_core::{AdmissionController, NoteClient, Server, ServerConfig, Services};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn start_server(max_conn: usize) -> (SocketAddr, Arc<AdmissionController>) {
    let services = Services::sqlite_with_hasher(
        share(open_db_in_memory().unwrap()),
        PasswordHasher::new(1),
    );
    let server = Server::bind(&ServerConfig::new("127.0.0.1", 0, max_conn), services).unwrap();
    let addr = server.local_addr().unwrap();
    let admission = server.admission();
    thread::spawn(move || server.serve());
    (addr, admission)
}

/// Sends REGISTER on a raw stream without waiting for the answer.
fn send_register(addr: SocketAddr, user_name: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).unwrap();
    let register = Envelope::new(
        MessageType::Register,
        encode_payload(&Credentials::new(user_name, "pw")),
    );
    write_envelope(&mut stream, &register, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
    stream
}

fn assert_no_answer_yet(stream: &mut TcpStream) {
    stream
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    match read_frame(stream, DEFAULT_MAX_MESSAGE_SIZE).unwrap_err() {
        FrameError::Io(io) => {
            assert!(matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));
        }
        other => panic!("unexpected frame error: {other}"),
    }
}

fn assert_answered_with_success(stream: &mut TcpStream) {
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let frame = read_frame(stream, DEFAULT_MAX_MESSAGE_SIZE)
        .unwrap()
        .unwrap();
    let response = Envelope::decode(&frame).unwrap();
    assert_eq!(response.kind(), Some(MessageType::Success));
}

#[test]
fn connection_beyond_capacity_waits_for_a_free_slot() {
    let (addr, admission) = start_server(1);

    let mut holder = NoteClient::connect(addr).unwrap();
    holder.register("first", "pw").unwrap();
    assert_eq!(admission.in_use(), 1);

    let mut waiting = send_register(addr, "second");
    assert_no_answer_yet(&mut waiting);
    assert_eq!(admission.in_use(), 1);

    drop(holder);

    assert_answered_with_success(&mut waiting);
    assert_eq!(admission.in_use(), 1);
}

#[test]
fn third_handshake_stalls_until_one_of_two_sessions_ends() {
    let (addr, admission) = start_server(2);

    let mut first = NoteClient::connect(addr).unwrap();
    first.register("first", "pw").unwrap();
    let mut second = NoteClient::connect(addr).unwrap();
    second.register("second", "pw").unwrap();
    assert_eq!(admission.in_use(), 2);

    let mut third = send_register(addr, "third");
    assert_no_answer_yet(&mut third);
    assert_eq!(admission.in_use(), 2);

    second.list_notes().unwrap();
    drop(first);

    assert_answered_with_success(&mut third);
    assert_eq!(admission.in_use(), 2);
    assert_eq!(second.list_notes().unwrap().count, 0);
}
