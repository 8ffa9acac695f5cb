//! AMI session management
//!
//! [`AmiClient`] is the public surface: connect, login, action submission,
//! reconnect, close. A single background reader task drains the socket,
//! classifying each message as event (published to [`AmiStreams::events`])
//! and/or response (handed to the correlator). Network failures park the
//! reader until a successful [`AmiClient::reconnect`]; all other read
//! failures are surfaced on [`AmiStreams::errors`] without stopping the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::action::{self, Params};
use crate::constants::{DEFAULT_EVENT_QUEUE_SIZE, ERROR_QUEUE_SIZE, HEADER_ACTION_ID};
use crate::error::{AmiError, AmiResult};
use crate::event::AmiEvent;
use crate::pending::{PendingActions, ResponseHandle};
use crate::protocol::{MessageReader, MessageWriter};
use crate::response::AmiResponse;
use crate::transport::{TlsOptions, Transport};

/// Options applied when opening a session.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    tls: TlsOptions,
    event_queue_size: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            tls: TlsOptions::default(),
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
        }
    }
}

impl ConnectOptions {
    /// Standard settings: TLS disabled, event queue capacity 100.
    pub fn new() -> Self {
        Self::default()
    }

    /// Negotiate TLS over the TCP connection.
    pub fn with_tls(mut self) -> Self {
        self.tls
            .enabled = true;
        self
    }

    /// Accept self-signed / unverified server certificates.
    pub fn with_insecure_tls(mut self) -> Self {
        self.tls
            .insecure_skip_verify = true;
        self
    }

    /// Use a custom TLS configuration (implies TLS enabled). Takes precedence
    /// over the default verifying config and the insecure flag.
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls
            .config = Some(config);
        self.tls
            .enabled = true;
        self
    }

    /// Capacity of the event delivery queue (default 100). When full, the
    /// reader blocks rather than dropping events.
    pub fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size.max(1);
        self
    }
}

/// Streams the session exposes to the embedding application.
///
/// `errors` and `net_errors` have capacity 1: sized to hold the first failure,
/// deliberately not to queue many. The reader blocks rather than dropping a
/// failure the application has not yet observed.
#[derive(Debug)]
pub struct AmiStreams {
    /// Inbound events, delivered in wire order.
    pub events: mpsc::Receiver<AmiEvent>,
    /// Non-fatal read/classification failures; the reader keeps going.
    pub errors: mpsc::Receiver<AmiError>,
    /// Network failures; after one of these the reader is parked until
    /// [`AmiClient::reconnect`] succeeds. When to reconnect is the
    /// application's policy.
    pub net_errors: mpsc::Receiver<AmiError>,
}

#[derive(Clone)]
struct Credentials {
    username: String,
    secret: String,
}

/// AMI client handle (Clone + Send): submit actions from any task.
#[derive(Clone)]
pub struct AmiClient {
    transport: Transport,
    writer: Arc<Mutex<MessageWriter>>,
    pending: Arc<PendingActions>,
    credentials: Arc<StdMutex<Option<Credentials>>>,
    running: Arc<AtomicBool>,
    reader_slot: Arc<StdMutex<Option<MessageReader>>>,
    resume_rx_slot: Arc<StdMutex<Option<mpsc::Receiver<MessageReader>>>>,
    resume_tx: mpsc::Sender<MessageReader>,
    reconnect_lock: Arc<Mutex<()>>,
    event_tx: mpsc::Sender<AmiEvent>,
    error_tx: mpsc::Sender<AmiError>,
    net_error_tx: mpsc::Sender<AmiError>,
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl AmiClient {
    /// Open a session: dial `address` (`host:port`), verify the AMI banner,
    /// and return the client plus its delivery streams. The background reader
    /// does not start until [`run`](Self::run) is called.
    pub async fn connect(
        address: &str,
        options: ConnectOptions,
    ) -> AmiResult<(Self, AmiStreams)> {
        let transport = Transport::new(address, options.tls);
        let (reader, writer) = transport
            .connect()
            .await?;

        let (event_tx, events) = mpsc::channel(options.event_queue_size);
        let (error_tx, errors) = mpsc::channel(ERROR_QUEUE_SIZE);
        let (net_error_tx, net_errors) = mpsc::channel(ERROR_QUEUE_SIZE);
        let (resume_tx, resume_rx) = mpsc::channel(1);

        let client = AmiClient {
            transport,
            writer: Arc::new(Mutex::new(writer)),
            pending: Arc::new(PendingActions::new()),
            credentials: Arc::new(StdMutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            reader_slot: Arc::new(StdMutex::new(Some(reader))),
            resume_rx_slot: Arc::new(StdMutex::new(Some(resume_rx))),
            resume_tx,
            reconnect_lock: Arc::new(Mutex::new(())),
            event_tx,
            error_tx,
            net_error_tx,
        };

        let streams = AmiStreams {
            events,
            errors,
            net_errors,
        };

        Ok((client, streams))
    }

    /// Start the background reader task. Idempotent: only one reader ever
    /// runs per session, no matter how many times this is called.
    pub fn run(&self) {
        if self
            .running
            .swap(true, Ordering::SeqCst)
        {
            debug!("reader already running");
            return;
        }

        let reader = self
            .reader_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let resume_rx = self
            .resume_rx_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let (Some(reader), Some(resume_rx)) = (reader, resume_rx) else {
            warn!("reader state already consumed, not starting");
            return;
        };

        tokio::spawn(reader_task(
            reader,
            resume_rx,
            self.pending
                .clone(),
            self.event_tx
                .clone(),
            self.error_tx
                .clone(),
            self.net_error_tx
                .clone(),
        ));
    }

    /// Submit an action and return the handle its single response will be
    /// delivered on.
    ///
    /// Parameters are normalized (names title-cased per hyphenated token,
    /// values trimmed) and an `Actionid` is generated when absent. The
    /// delivery slot is registered strictly before the request bytes are
    /// written, so the response can never race ahead of its slot. A write
    /// failure rolls the slot back and surfaces the error directly.
    pub async fn action(&self, params: Params) -> AmiResult<ResponseHandle> {
        let params = action::normalize(params)?;
        let action_id = params
            .get(HEADER_ACTION_ID)
            .cloned()
            .unwrap_or_default();

        let handle = self
            .pending
            .register(&action_id);

        let mut writer = self
            .writer
            .lock()
            .await;
        if let Err(err) = writer
            .write_action(&params)
            .await
        {
            drop(writer);
            self.pending
                .remove(&action_id);
            return Err(err);
        }

        Ok(handle)
    }

    /// Authenticate to the manager and store the credentials for silent
    /// replay on reconnect.
    ///
    /// Blocks for the login response, so [`run`](Self::run) must have been
    /// called first. Fails with the server-reported message when the status
    /// indicates an error.
    pub async fn login(&self, username: &str, secret: &str) -> AmiResult<()> {
        let params = Params::from([
            ("Action".to_string(), "Login".to_string()),
            ("Username".to_string(), username.to_string()),
            ("Secret".to_string(), secret.to_string()),
        ]);

        let mut handle = self
            .action(params)
            .await?;
        let response = handle
            .recv()
            .await
            .ok_or(AmiError::ConnectionClosed)?;

        if response.is_error() {
            return Err(AmiError::AuthenticationFailed {
                message: response
                    .message()
                    .unwrap_or("login rejected")
                    .to_string(),
            });
        }

        let mut credentials = self
            .credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *credentials = Some(Credentials {
            username: username.to_string(),
            secret: secret.to_string(),
        });
        info!(username, "logged in");
        Ok(())
    }

    /// Replace the transport: close the old stream, dial again, unpark the
    /// reader on the fresh stream and replay the stored credentials.
    ///
    /// Only one reconnect runs at a time. A transport failure is pushed onto
    /// the network-error stream and returned; a login-replay failure is
    /// returned to the caller only.
    pub async fn reconnect(&self) -> AmiResult<()> {
        let _guard = self
            .reconnect_lock
            .lock()
            .await;

        match self
            .transport
            .connect()
            .await
        {
            Ok((reader, writer)) => {
                {
                    // Swapping the writer drops the old write half, closing
                    // what remains of the dead stream (best-effort).
                    let mut current = self
                        .writer
                        .lock()
                        .await;
                    *current = writer;
                }

                if self
                    .resume_tx
                    .send(reader)
                    .await
                    .is_err()
                {
                    return Err(AmiError::ConnectionClosed);
                }
                info!("transport replaced, reader resumed");

                let credentials = self
                    .credentials
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
                if let Some(c) = credentials {
                    self.login(&c.username, &c.secret)
                        .await?;
                }
                Ok(())
            }
            Err(err) => {
                warn!(%err, "reconnect failed");
                // Stream capacity is 1; if a failure already sits unobserved
                // there, the first one wins and this copy is dropped.
                let _ = self
                    .net_error_tx
                    .try_send(err.duplicate());
                Err(err)
            }
        }
    }

    /// Close the session: best-effort `Logoff` (not awaited), then shut down
    /// the transport.
    pub async fn close(&self) {
        let logoff = Params::from([("Action".to_string(), "Logoff".to_string())]);
        if let Err(err) = self
            .action(logoff)
            .await
        {
            debug!(%err, "logoff not sent");
        }

        let mut writer = self
            .writer
            .lock()
            .await;
        if let Err(err) = writer
            .shutdown()
            .await
        {
            debug!(%err, "error shutting down transport");
        }
        info!("session closed");
    }
}

async fn reader_task(
    reader: MessageReader,
    resume_rx: mpsc::Receiver<MessageReader>,
    pending: Arc<PendingActions>,
    event_tx: mpsc::Sender<AmiEvent>,
    error_tx: mpsc::Sender<AmiError>,
    net_error_tx: mpsc::Sender<AmiError>,
) {
    let inner = std::panic::AssertUnwindSafe(reader_loop(
        reader,
        resume_rx,
        pending,
        event_tx,
        error_tx,
        net_error_tx,
    ));
    if futures_util::FutureExt::catch_unwind(inner)
        .await
        .is_err()
    {
        tracing::error!("reader task panicked");
    }
}

/// The single perpetual reading loop: one per live transport.
///
/// Event classification runs before response delivery, and neither step's
/// failure aborts the other. Event publication blocks when the queue is
/// full; events are never silently dropped.
async fn reader_loop(
    mut reader: MessageReader,
    mut resume_rx: mpsc::Receiver<MessageReader>,
    pending: Arc<PendingActions>,
    event_tx: mpsc::Sender<AmiEvent>,
    error_tx: mpsc::Sender<AmiError>,
    net_error_tx: mpsc::Sender<AmiError>,
) {
    loop {
        match reader
            .read_message()
            .await
        {
            Ok(message) => {
                if let Some(event) = AmiEvent::classify(&message) {
                    if event_tx
                        .send(event)
                        .await
                        .is_err()
                    {
                        debug!("event stream closed, reader exiting");
                        return;
                    }
                }
                if let Some(response) = AmiResponse::classify(&message) {
                    pending.deliver(response);
                }
            }
            Err(err) if err.is_network() => {
                warn!(%err, "network error, parking reader until reconnect");
                if net_error_tx
                    .send(err)
                    .await
                    .is_err()
                {
                    debug!("network-error stream closed, reader exiting");
                    return;
                }
                match resume_rx
                    .recv()
                    .await
                {
                    Some(new_reader) => {
                        reader = new_reader;
                        info!("reader resumed on new transport");
                    }
                    None => {
                        debug!("session dropped while parked, reader exiting");
                        return;
                    }
                }
            }
            Err(err) => {
                if error_tx
                    .send(err)
                    .await
                    .is_err()
                {
                    debug!("error stream closed, reader exiting");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ConnectOptions::new();
        assert_eq!(options.event_queue_size, DEFAULT_EVENT_QUEUE_SIZE);
    }

    #[test]
    fn queue_size_floor_is_one() {
        let options = ConnectOptions::new().with_event_queue_size(0);
        assert_eq!(options.event_queue_size, 1);
    }
}
