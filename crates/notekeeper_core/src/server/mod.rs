//! TCP server: listener, admission and per-connection sessions.
//!
//! # Responsibility
//! - Bind the configured address and accept connections forever.
//! - Gate every session behind the admission controller.
//! - Run each admitted session on its own thread.
//!
//! # Invariants
//! - A connection is served only while it holds an admission slot; the slot
//!   is released however the session ends.
//! - Connections beyond capacity wait in accept order; none are rejected.

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod session;

use crate::db::SharedConnection;
use crate::server::admission::{AdmissionController, AdmissionSlot};
use crate::server::config::{ConfigError, ServerConfig};
use crate::server::session::Session;
use crate::service::auth_service::{CredentialVerifier, SqliteCredentialVerifier};
use crate::service::note_service::{NoteStore, SqliteNoteStore};
use crate::service::password::PasswordHasher;
use log::{debug, error, info, warn};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pause after a failed `accept`, e.g. when file descriptors run out.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Storage-facing services shared by every session.
#[derive(Clone)]
pub struct Services {
    pub notes: Arc<dyn NoteStore>,
    pub credentials: Arc<dyn CredentialVerifier>,
}

impl Services {
    pub fn new(notes: Arc<dyn NoteStore>, credentials: Arc<dyn CredentialVerifier>) -> Self {
        Self { notes, credentials }
    }

    /// SQLite-backed services over one shared connection.
    pub fn sqlite(conn: SharedConnection) -> Self {
        Self::sqlite_with_hasher(conn, PasswordHasher::default())
    }

    pub fn sqlite_with_hasher(conn: SharedConnection, hasher: PasswordHasher) -> Self {
        Self {
            notes: Arc::new(SqliteNoteStore::new(Arc::clone(&conn))),
            credentials: Arc::new(SqliteCredentialVerifier::with_hasher(conn, hasher)),
        }
    }
}

/// Bound listener plus everything needed to serve sessions.
pub struct Server {
    listener: TcpListener,
    admission: Arc<AdmissionController>,
    services: Services,
    max_message_size: usize,
}

impl Server {
    /// Validates `config` and binds its listen address.
    ///
    /// # Errors
    /// - Any `ConfigError` from validation.
    /// - `ConfigError::Bind` when the address cannot be bound.
    pub fn bind(config: &ServerConfig, services: Services) -> Result<Self, ConfigError> {
        config.validate()?;
        let admission = AdmissionController::new(config.max_conn)?;
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr).map_err(|source| ConfigError::Bind {
            addr: addr.clone(),
            source,
        })?;

        Ok(Self {
            listener,
            admission,
            services,
            max_message_size: config.max_message_size,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn admission(&self) -> Arc<AdmissionController> {
        Arc::clone(&self.admission)
    }

    /// Accepts connections until the listener fails.
    ///
    /// Admission happens on the accept thread, so pending connections are
    /// admitted in accept order.
    pub fn serve(self) -> io::Result<()> {
        let local_addr = self.local_addr()?;
        info!(
            "event=server_start module=server status=ok addr={} max_conn={} max_message_size={}",
            local_addr,
            self.admission.capacity(),
            self.max_message_size
        );

        let mut incoming = self.listener.incoming();
        while let Some(stream) = next_accepted(&mut incoming, ACCEPT_BACKOFF) {
            let peer = stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            info!("event=connection_accepted module=server status=ok peer={peer}");

            let slot = self.admit(&peer);
            debug!(
                "event=admission module=server status=ok peer={} in_use={} capacity={}",
                peer,
                self.admission.in_use(),
                self.admission.capacity()
            );
            self.spawn_session(stream, peer, slot);
        }

        Ok(())
    }

    fn admit(&self, peer: &str) -> AdmissionSlot {
        if let Some(slot) = self.admission.try_acquire() {
            return slot;
        }
        info!(
            "event=admission_wait module=server status=waiting peer={} in_use={} capacity={}",
            peer,
            self.admission.in_use(),
            self.admission.capacity()
        );
        self.admission.acquire()
    }

    fn spawn_session(&self, stream: TcpStream, peer: String, slot: AdmissionSlot) {
        let services = self.services.clone();
        let max_message_size = self.max_message_size;
        let thread_peer = peer.clone();

        let spawned = thread::Builder::new()
            .name(format!("session-{peer}"))
            .spawn(move || {
                let _slot = slot;
                Session::new(stream, thread_peer, &services, max_message_size).run();
            });

        // The closure, slot included, is dropped when spawning fails.
        if let Err(err) = spawned {
            error!("event=session_start module=server status=error peer={peer} error={err}");
        }
    }
}

/// Returns the next accepted connection, sleeping `backoff` after each
/// failed accept. `None` once the source is exhausted.
fn next_accepted<T>(
    incoming: &mut impl Iterator<Item = io::Result<T>>,
    backoff: Duration,
) -> Option<T> {
    for result in incoming {
        match result {
            Ok(conn) => return Some(conn),
            Err(err) => {
                warn!(
                    "event=connection_accepted module=server status=error backoff_ms={} error={err}",
                    backoff.as_millis()
                );
                thread::sleep(backoff);
            }
        }
    }
    None
}
