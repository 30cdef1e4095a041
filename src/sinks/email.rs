//! Batching email sink
//!
//! Every `BatchingEmailSink` owns one worker thread and a zero-capacity
//! channel. A `write` blocks until the worker takes the buffer, then returns
//! success. The worker runs a small state machine:
//!
//! - idle: wait for the first message
//! - collecting: the first message opens a window of `delay`; later
//!   messages join the backlog without moving the deadline
//! - flush: at the deadline (or on an explicit flush, a full backlog, or
//!   the channel closing) the backlog is concatenated into one mail and handed to the
//!   transport, then the worker goes back to idle
//!
//! Transport failures and panics are reported on stderr and counted, never
//! returned to a writer. Dropping the sink closes the channel without
//! waiting; the worker sends what it holds and exits on its own.

use crate::core::error::panic_message;
use crate::core::{BatchMetrics, LoggerError, Result, Sink};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Deserialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sender and recipients of every batch a sink sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailEnvelope {
    pub from: String,
    pub to: Vec<String>,
}

/// Delivers a fully composed message (headers included)
///
/// Calls are made from the sink's worker thread only, one at a time.
pub trait MailTransport: Send + 'static {
    fn send(&self, envelope: &MailEnvelope, message: &[u8]) -> Result<()>;
}

impl<T: MailTransport + ?Sized> MailTransport for Box<T> {
    fn send(&self, envelope: &MailEnvelope, message: &[u8]) -> Result<()> {
        (**self).send(envelope, message)
    }
}

/// SMTP delivery with STARTTLS and login credentials
#[cfg(feature = "smtp")]
pub struct SmtpMailer {
    transport: lettre::SmtpTransport,
}

#[cfg(feature = "smtp")]
impl SmtpMailer {
    /// Default submission port used when `server` carries none
    pub const DEFAULT_PORT: u16 = 587;

    /// Connect lazily to `server` (`host` or `host:port`)
    pub fn new(server: &str, username: &str, password: &str) -> Result<Self> {
        use lettre::transport::smtp::authentication::Credentials;

        let (host, port) = split_server(server)?;
        let transport = lettre::SmtpTransport::starttls_relay(host)
            .map_err(|e| LoggerError::mail(format!("invalid relay '{}': {}", host, e)))?
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self { transport })
    }
}

#[cfg(feature = "smtp")]
impl MailTransport for SmtpMailer {
    fn send(&self, envelope: &MailEnvelope, message: &[u8]) -> Result<()> {
        use lettre::{address::Envelope, Address, Transport};

        let parse = |addr: &str| {
            addr.parse::<Address>()
                .map_err(|e| LoggerError::mail(format!("invalid address '{}': {}", addr, e)))
        };
        let from = parse(envelope.from.as_str())?;
        let to = envelope
            .to
            .iter()
            .map(|addr| parse(addr.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let envelope = Envelope::new(Some(from), to).map_err(|e| LoggerError::mail(e.to_string()))?;

        self.transport
            .send_raw(&envelope, message)
            .map_err(|e| LoggerError::mail(e.to_string()))?;
        Ok(())
    }
}

#[cfg(feature = "smtp")]
fn split_server(server: &str) -> Result<(&str, u16)> {
    match server.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                LoggerError::config("email", format!("invalid port in server '{}'", server))
            })?;
            Ok((host, port))
        }
        None => Ok((server, SmtpMailer::DEFAULT_PORT)),
    }
}

/// How a batching sink groups and addresses its mail
///
/// # Example
///
/// ```
/// use rust_log_pipeline::sinks::BatchSettings;
/// use std::time::Duration;
///
/// let settings = BatchSettings::new("logger@example.com", ["ops@example.com"])
///     .subject("Production errors")
///     .delay(Duration::from_secs(30))
///     .max_backlog(500);
/// assert_eq!(settings.max_backlog, Some(500));
/// ```
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub sender: String,
    pub receivers: Vec<String>,
    pub subject: String,
    /// Window measured from the first message of a batch
    pub delay: Duration,
    /// Send early once this many messages are waiting
    pub max_backlog: Option<usize>,
}

impl BatchSettings {
    pub fn new<I, S>(sender: impl Into<String>, receivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sender: sender.into(),
            receivers: receivers.into_iter().map(Into::into).collect(),
            subject: String::new(),
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            max_backlog: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_backlog(mut self, limit: usize) -> Self {
        self.max_backlog = Some(limit);
        self
    }

    fn envelope(&self) -> MailEnvelope {
        MailEnvelope {
            from: self.sender.clone(),
            to: self.receivers.clone(),
        }
    }

    fn backlog_full(&self, len: usize) -> bool {
        self.max_backlog.is_some_and(|limit| len >= limit)
    }
}

const DEFAULT_DELAY_MS: u64 = 60_000;

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

/// Settings for the `email` sink type
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// `host` or `host:port`
    pub server: String,
    /// Sender address, also the login name
    pub sender: String,
    #[serde(default)]
    pub password: String,
    pub receivers: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub max_backlog: Option<usize>,
}

impl EmailConfig {
    pub fn batch_settings(&self) -> Result<BatchSettings> {
        if self.receivers.is_empty() {
            return Err(LoggerError::config("email", "at least one receiver is required"));
        }
        if self.max_backlog == Some(0) {
            return Err(LoggerError::config("email", "max_backlog must be positive"));
        }
        Ok(BatchSettings {
            sender: self.sender.clone(),
            receivers: self.receivers.clone(),
            subject: self.subject.clone(),
            delay: Duration::from_millis(self.delay_ms),
            max_backlog: self.max_backlog,
        })
    }
}

/// Build the raw message: headers, blank line, then every buffer in order
pub fn compose_message(settings: &BatchSettings, backlog: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = backlog.iter().map(Vec::len).sum();
    let mut message = Vec::with_capacity(256 + body_len);

    let headers = format!(
        "From: {}\r\nTo: {}\r\nSubject: =?utf-8?B?{}?=\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n",
        settings.sender,
        settings.receivers.join(","),
        STANDARD.encode(settings.subject.as_bytes()),
    );
    message.extend_from_slice(headers.as_bytes());
    for buf in backlog {
        message.extend_from_slice(buf);
    }
    message
}

enum Command {
    Write(Vec<u8>),
    Flush(Sender<()>),
}

/// Coalesces bursts of log lines into one mail per delay window
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::Sink;
/// use rust_log_pipeline::sinks::{BatchSettings, BatchingEmailSink, MailEnvelope, MailTransport};
/// use std::time::Duration;
///
/// struct Discard;
///
/// impl MailTransport for Discard {
///     fn send(&self, _: &MailEnvelope, _: &[u8]) -> rust_log_pipeline::Result<()> {
///         Ok(())
///     }
/// }
///
/// let settings = BatchSettings::new("app@example.com", ["ops@example.com"])
///     .delay(Duration::from_secs(60));
/// let sink = BatchingEmailSink::new(settings, Discard).unwrap();
/// sink.write(b"disk full\n").unwrap();
/// sink.flush().unwrap();
/// assert_eq!(sink.metrics().batches_sent(), 1);
/// ```
pub struct BatchingEmailSink {
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    metrics: Arc<BatchMetrics>,
    subject: String,
}

impl BatchingEmailSink {
    /// Spawn the worker that owns `transport`
    pub fn new<T: MailTransport>(settings: BatchSettings, transport: T) -> Result<Self> {
        let (sender, receiver) = bounded(0);
        let metrics = Arc::new(BatchMetrics::new());
        let subject = settings.subject.clone();

        let worker_metrics = Arc::clone(&metrics);
        let worker = thread::Builder::new()
            .name("log-email-batch".to_string())
            .spawn(move || run_worker(receiver, settings, transport, worker_metrics))
            .map_err(|e| {
                LoggerError::io_operation("spawn email worker", "failed to start thread", e)
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            metrics,
            subject,
        })
    }

    /// Sink delivering over SMTP as configured
    #[cfg(feature = "smtp")]
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let settings = config.batch_settings()?;
        let mailer = SmtpMailer::new(&config.server, &config.sender, &config.password)?;
        Self::new(settings, mailer)
    }

    pub fn metrics(&self) -> &BatchMetrics {
        &self.metrics
    }

    fn channel(&self) -> Result<&Sender<Command>> {
        self.sender.as_ref().ok_or(LoggerError::ChannelSendError)
    }
}

impl Sink for BatchingEmailSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.channel()?
            .send(Command::Write(buf.to_vec()))
            .map_err(|_| LoggerError::ChannelSendError)?;
        self.metrics.record_accepted();
        Ok(buf.len())
    }

    /// Send the open window now and wait for the attempt to finish
    fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.channel()?
            .send(Command::Flush(ack_tx))
            .map_err(|_| LoggerError::ChannelSendError)?;
        ack_rx.recv().map_err(|_| LoggerError::ChannelSendError)
    }

    fn name(&self) -> &str {
        "email"
    }
}

impl BatchingEmailSink {
    /// Close the sink and wait up to `timeout` for the open window to be sent
    ///
    /// `DEFAULT_SHUTDOWN_TIMEOUT` is a reasonable bound at process exit.
    /// Returns `false` when the worker was still busy at the deadline; it
    /// keeps running detached and finishes on its own.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        drop(self.sender.take());

        let handle = match self.worker.take() {
            Some(handle) => handle,
            None => return true,
        };
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Email worker thread panicked: {:?}", e);
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Email worker for subject {:?} did not finish within {:?}. \
                     It keeps sending in the background.",
                    self.subject, timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for BatchingEmailSink {
    /// Closing the channel makes the worker send its open window and exit.
    /// The dropping thread never waits for that send: a handler table can be
    /// released by any logging caller. Use `shutdown` to wait.
    fn drop(&mut self) {
        drop(self.sender.take());
        drop(self.worker.take());
    }
}

fn run_worker<T: MailTransport>(
    receiver: Receiver<Command>,
    settings: BatchSettings,
    transport: T,
    metrics: Arc<BatchMetrics>,
) {
    let envelope = settings.envelope();

    loop {
        let first = match receiver.recv() {
            Ok(Command::Write(buf)) => buf,
            Ok(Command::Flush(ack)) => {
                let _ = ack.send(());
                continue;
            }
            Err(_) => return,
        };

        let deadline = Instant::now() + settings.delay;
        let mut backlog = vec![first];
        let mut ack = None;
        let mut closed = false;

        while !settings.backlog_full(backlog.len()) {
            match receiver.recv_deadline(deadline) {
                Ok(Command::Write(buf)) => backlog.push(buf),
                Ok(Command::Flush(done)) => {
                    ack = Some(done);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        let message = compose_message(&settings, &backlog);
        let outcome = catch_unwind(AssertUnwindSafe(|| transport.send(&envelope, &message)))
            .unwrap_or_else(|payload| {
                Err(LoggerError::sink_panicked("email", panic_message(payload.as_ref())))
            });
        match outcome {
            Ok(()) => {
                metrics.record_sent();
                eprintln!(
                    "[LOGGER INFO] Sent log email: subject={:?}, messages={}",
                    settings.subject,
                    backlog.len()
                );
            }
            Err(e) => {
                metrics.record_send_failure();
                eprintln!(
                    "[LOGGER ERROR] Failed to send log email: subject={:?}, error={}",
                    settings.subject, e
                );
            }
        }

        if let Some(done) = ack {
            let _ = done.send(());
        }
        if closed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
    }

    impl RecordingTransport {
        fn bodies(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .map(|(_, msg)| {
                    let text = String::from_utf8_lossy(msg).into_owned();
                    text.split_once("\r\n\r\n")
                        .map(|(_, body)| body.to_string())
                        .unwrap_or_default()
                })
                .collect()
        }

        fn times(&self) -> Vec<Instant> {
            self.sent.lock().iter().map(|(at, _)| *at).collect()
        }
    }

    impl MailTransport for RecordingTransport {
        fn send(&self, _envelope: &MailEnvelope, message: &[u8]) -> Result<()> {
            self.sent.lock().push((Instant::now(), message.to_vec()));
            Ok(())
        }
    }

    struct FailingTransport;

    impl MailTransport for FailingTransport {
        fn send(&self, _envelope: &MailEnvelope, _message: &[u8]) -> Result<()> {
            Err(LoggerError::mail("connection refused"))
        }
    }

    fn settings(delay_ms: u64) -> BatchSettings {
        BatchSettings::new("app@example.com", ["ops@example.com", "dev@example.com"])
            .subject("Alerts")
            .delay(Duration::from_millis(delay_ms))
    }

    fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_compose_message_headers() {
        let message = compose_message(&settings(10), &[b"one\n".to_vec(), b"two\n".to_vec()]);
        assert_eq!(
            String::from_utf8(message).unwrap(),
            "From: app@example.com\r\n\
             To: ops@example.com,dev@example.com\r\n\
             Subject: =?utf-8?B?QWxlcnRz?=\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\r\n\
             one\ntwo\n"
        );
    }

    #[test]
    fn test_burst_coalesces_into_one_send() {
        let transport = RecordingTransport::default();
        let sink = BatchingEmailSink::new(settings(200), transport.clone()).unwrap();

        let start = Instant::now();
        sink.write(b"a\n").unwrap();
        thread::sleep(Duration::from_millis(50));
        sink.write(b"b\n").unwrap();
        thread::sleep(Duration::from_millis(30));
        sink.write(b"c\n").unwrap();

        assert!(wait_for(Duration::from_secs(2), || transport.bodies().len() == 1));
        assert_eq!(transport.bodies(), vec!["a\nb\nc\n"]);

        let elapsed = transport.times()[0] - start;
        assert!(elapsed >= Duration::from_millis(200), "sent after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1000), "sent after {:?}", elapsed);

        // Nothing else was pending, so no second mail follows.
        thread::sleep(Duration::from_millis(250));
        assert_eq!(transport.bodies().len(), 1);

        sink.write(b"d\n").unwrap();
        assert!(wait_for(Duration::from_secs(2), || transport.bodies().len() == 2));
        assert_eq!(transport.bodies()[1], "d\n");
        assert_eq!(sink.metrics().accepted(), 4);
        assert_eq!(sink.metrics().batches_sent(), 2);
    }

    #[test]
    fn test_later_arrivals_do_not_extend_window() {
        let transport = RecordingTransport::default();
        let sink = BatchingEmailSink::new(settings(150), transport.clone()).unwrap();

        let start = Instant::now();
        for i in 0..10 {
            sink.write(format!("{}\n", i).as_bytes()).unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        assert!(wait_for(Duration::from_secs(2), || !transport.bodies().is_empty()));
        let elapsed = transport.times()[0] - start;
        assert!(elapsed < Duration::from_millis(1000), "sent after {:?}", elapsed);
        assert_eq!(transport.bodies()[0], "0\n1\n2\n3\n4\n5\n6\n7\n8\n9\n");
    }

    #[test]
    fn test_transport_failure_is_isolated() {
        let sink = BatchingEmailSink::new(settings(20), FailingTransport).unwrap();

        assert_eq!(sink.write(b"x\n").unwrap(), 2);
        assert!(wait_for(Duration::from_secs(2), || sink.metrics().send_failures() == 1));

        // A fresh window starts after the failed attempt.
        assert_eq!(sink.write(b"y\n").unwrap(), 2);
        sink.flush().unwrap();
        assert_eq!(sink.metrics().send_failures(), 2);
        assert_eq!(sink.metrics().batches_sent(), 0);
    }

    #[test]
    fn test_flush_sends_open_window() {
        let transport = RecordingTransport::default();
        let sink = BatchingEmailSink::new(settings(60_000), transport.clone()).unwrap();

        sink.flush().unwrap();
        assert!(transport.bodies().is_empty());

        sink.write(b"urgent\n").unwrap();
        sink.flush().unwrap();
        assert_eq!(transport.bodies(), vec!["urgent\n"]);
    }

    struct SlowTransport {
        inner: RecordingTransport,
        pause: Duration,
    }

    impl MailTransport for SlowTransport {
        fn send(&self, envelope: &MailEnvelope, message: &[u8]) -> Result<()> {
            thread::sleep(self.pause);
            self.inner.send(envelope, message)
        }
    }

    struct PanickingTransport {
        calls: Arc<Mutex<u32>>,
    }

    impl MailTransport for PanickingTransport {
        fn send(&self, _envelope: &MailEnvelope, _message: &[u8]) -> Result<()> {
            *self.calls.lock() += 1;
            panic!("smtp client exploded");
        }
    }

    #[test]
    fn test_drop_drains_pending_backlog() {
        let transport = RecordingTransport::default();
        let sink = BatchingEmailSink::new(settings(60_000), transport.clone()).unwrap();

        sink.write(b"last words\n").unwrap();
        drop(sink);

        assert!(wait_for(Duration::from_secs(2), || transport.bodies().len() == 1));
        assert_eq!(transport.bodies(), vec!["last words\n"]);
    }

    #[test]
    fn test_drop_does_not_wait_for_slow_send() {
        let transport = RecordingTransport::default();
        let slow = SlowTransport {
            inner: transport.clone(),
            pause: Duration::from_millis(800),
        };
        let sink = BatchingEmailSink::new(settings(60_000), slow).unwrap();
        sink.write(b"pending\n").unwrap();

        let start = Instant::now();
        drop(sink);
        assert!(start.elapsed() < Duration::from_millis(300), "drop took {:?}", start.elapsed());

        assert!(wait_for(Duration::from_secs(3), || transport.bodies().len() == 1));
    }

    #[test]
    fn test_shutdown_waits_for_send() {
        let transport = RecordingTransport::default();
        let slow = SlowTransport {
            inner: transport.clone(),
            pause: Duration::from_millis(100),
        };
        let sink = BatchingEmailSink::new(settings(60_000), slow).unwrap();
        sink.write(b"pending\n").unwrap();

        assert!(sink.shutdown(crate::core::DEFAULT_SHUTDOWN_TIMEOUT));
        assert_eq!(transport.bodies(), vec!["pending\n"]);
    }

    #[test]
    fn test_transport_panic_keeps_worker_alive() {
        let calls = Arc::new(Mutex::new(0));
        let transport = PanickingTransport {
            calls: Arc::clone(&calls),
        };
        let sink = BatchingEmailSink::new(settings(60_000), transport).unwrap();

        sink.write(b"first\n").unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.metrics().send_failures(), 1);

        assert_eq!(sink.write(b"second\n").unwrap(), 7);
        sink.flush().unwrap();
        assert_eq!(sink.metrics().send_failures(), 2);
        assert_eq!(*calls.lock(), 2);
        assert_eq!(sink.metrics().batches_sent(), 0);
    }

    #[test]
    fn test_backlog_cap_sends_early() {
        let transport = RecordingTransport::default();
        let sink =
            BatchingEmailSink::new(settings(60_000).max_backlog(2), transport.clone()).unwrap();

        for line in ["1\n", "2\n", "3\n"] {
            sink.write(line.as_bytes()).unwrap();
        }

        assert!(wait_for(Duration::from_secs(2), || !transport.bodies().is_empty()));
        assert_eq!(transport.bodies()[0], "1\n2\n");

        sink.flush().unwrap();
        assert_eq!(transport.bodies(), vec!["1\n2\n", "3\n"]);
    }

    #[test]
    fn test_config_validation() {
        let config: EmailConfig = serde_json::from_str(
            r#"{"server": "smtp.example.com:25", "sender": "a@example.com", "receivers": []}"#,
        )
        .unwrap();
        assert_eq!(config.delay_ms, DEFAULT_DELAY_MS);
        assert!(config.batch_settings().unwrap_err().is_configuration());
    }

    #[cfg(feature = "smtp")]
    #[test]
    fn test_split_server() {
        assert_eq!(split_server("mail.local:2525").unwrap(), ("mail.local", 2525));
        assert_eq!(split_server("mail.local").unwrap(), ("mail.local", 587));
        assert!(split_server("mail.local:abc").is_err());
    }
}
