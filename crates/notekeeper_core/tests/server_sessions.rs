use notekeeper_core::db::{open_db_in_memory, share};
use notekeeper_core::protocol::frame::DEFAULT_MAX_MESSAGE_SIZE;
use notekeeper_core::protocol::{write_frame, Envelope, MessageType};
use notekeeper_core::service::password::PasswordHasher;
use notekeeper_core::{ClientError, NoteClient, Server, ServerConfig, Services};
use std::net::{SocketAddr, TcpStream};
use std::thread;

fn start_server(max_conn: usize) -> SocketAddr {
    start_server_with_limit(max_conn, DEFAULT_MAX_MESSAGE_SIZE)
}

fn start_server_with_limit(max_conn: usize, max_message_size: usize) -> SocketAddr {
    let services = Services::sqlite_with_hasher(
        share(open_db_in_memory().unwrap()),
        PasswordHasher::new(1),
    );
    let mut config = ServerConfig::new("127.0.0.1", 0, max_conn);
    config.max_message_size = max_message_size;
    let server = Server::bind(&config, services).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.serve());
    addr
}

fn server_error<T: std::fmt::Debug>(result: Result<T, ClientError>) -> String {
    match result {
        Err(ClientError::Server(text)) => text,
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn register_then_authenticate_and_manage_notes() {
    let addr = start_server(2);

    let mut first = NoteClient::connect(addr).unwrap();
    first.register("alice", "pw").unwrap();
    first.create_note("groceries", "milk").unwrap();
    drop(first);

    let mut client = NoteClient::connect(addr).unwrap();
    client.authenticate("alice", "pw").unwrap();

    let list = client.list_notes().unwrap();
    assert_eq!(list.count, 1);
    let id = list.notes[0].id;

    let note = client.get_note(id).unwrap();
    assert_eq!(note.title, "groceries");
    assert_eq!(note.body, "milk");

    client.update_note(id, "groceries", "milk, eggs").unwrap();
    assert_eq!(client.get_note(id).unwrap().body, "milk, eggs");

    let found = client.search_by_title("grocer").unwrap();
    assert_eq!(found.count, 1);
    assert_eq!(found.notes[0].id, id);

    client.delete_note(id).unwrap();
    assert_eq!(client.list_notes().unwrap().count, 0);
}

#[test]
fn unknown_user_is_rejected_and_connection_closed() {
    let addr = start_server(1);

    let mut client = NoteClient::connect(addr).unwrap();
    let text = server_error(client.authenticate("ghost", "pw"));
    assert_eq!(text, "user \"ghost\" not found");

    assert!(client.list_notes().is_err());
}

#[test]
fn domain_errors_keep_the_session_usable() {
    let addr = start_server(1);

    let mut client = NoteClient::connect(addr).unwrap();
    client.register("bob", "pw").unwrap();

    assert_eq!(server_error(client.delete_note(99)), "note 99 not found");

    client.create_note("plan", "a").unwrap();
    assert_eq!(
        server_error(client.create_note("plan", "b")),
        "note with \"plan\" name already exists"
    );

    assert_eq!(
        server_error(client.request(&Envelope::new(MessageType::Logout, Vec::new()))),
        "unknown server message code: 10"
    );
    assert_eq!(
        server_error(client.request(&Envelope {
            code: 42,
            data: Vec::new(),
        })),
        "unknown server message code: 42"
    );

    assert_eq!(client.list_notes().unwrap().count, 1);
}

#[test]
fn duplicate_registration_ends_the_handshake() {
    let addr = start_server(1);

    let mut first = NoteClient::connect(addr).unwrap();
    first.register("carol", "pw").unwrap();
    drop(first);

    let mut second = NoteClient::connect(addr).unwrap();
    assert_eq!(
        server_error(second.register("carol", "other")),
        "user with \"carol\" nickname has been registered"
    );
}

#[test]
fn notes_are_scoped_to_their_owner() {
    let addr = start_server(2);

    let mut alice = NoteClient::connect(addr).unwrap();
    alice.register("alice", "pw").unwrap();
    alice.create_note("private", "x").unwrap();
    let id = alice.list_notes().unwrap().notes[0].id;

    let mut bob = NoteClient::connect(addr).unwrap();
    bob.register("bob", "pw").unwrap();
    assert_eq!(server_error(bob.get_note(id)), format!("note {id} not found"));
    assert_eq!(bob.list_notes().unwrap().count, 0);
    assert_eq!(bob.search_by_title("private").unwrap().count, 0);
}

#[test]
fn first_message_must_be_a_handshake() {
    let addr = start_server(1);

    let mut client = NoteClient::connect(addr).unwrap();
    let text = server_error(client.list_notes());
    assert!(text.contains("not AUTH or REGISTER"), "{text}");
}

#[test]
fn garbage_after_authentication_closes_silently() {
    let addr = start_server(1);

    let mut stream = TcpStream::connect(addr).unwrap();
    let mut client = NoteClient::new(stream.try_clone().unwrap());
    client.register("dave", "pw").unwrap();

    write_frame(&mut stream, b"not json", DEFAULT_MAX_MESSAGE_SIZE).unwrap();
    assert!(matches!(
        client.list_notes(),
        Err(ClientError::ConnectionClosed) | Err(ClientError::Frame(_))
    ));
}

#[test]
fn list_larger_than_the_frame_limit_is_refused_without_breaking_the_session() {
    let addr = start_server_with_limit(1, 4096);
    let body = "x".repeat(1800);

    let mut client = NoteClient::connect(addr).unwrap().with_max_message_size(4096);
    client.register("erin", "pw").unwrap();
    client.create_note("first", &body).unwrap();
    client.create_note("second", &body).unwrap();

    let text = server_error(client.list_notes());
    assert!(text.starts_with("response too large"), "{text}");

    let first = client.search_by_title("first").unwrap();
    assert_eq!(first.count, 1);
    assert_eq!(first.notes[0].body, body);

    client.delete_note(first.notes[0].id).unwrap();
    let remaining = client.list_notes().unwrap();
    assert_eq!(remaining.count, 1);
    assert_eq!(remaining.notes[0].title, "second");
}
