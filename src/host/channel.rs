use std::collections::VecDeque;
use std::io::{BufRead, Write};

use tracing::debug;

use crate::error::EngineError;
use crate::host::messages::{EngineMessage, HostMessage};

/// Connection to the privileged host process.
pub trait HostChannel {
    fn send(&mut self, message: &EngineMessage) -> Result<(), EngineError>;

    /// Next message from the host, or `None` once the host has nothing more
    /// to say.
    fn next_message(&mut self) -> Result<Option<HostMessage>, EngineError>;
}

// ============================================================================
// NDJSON transport
// ============================================================================

/// One JSON object per line over any reader/writer pair.
pub struct NdjsonHost<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> NdjsonHost<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        NdjsonHost { reader, writer }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> HostChannel for NdjsonHost<R, W> {
    fn send(&mut self, message: &EngineMessage) -> Result<(), EngineError> {
        let json = message.to_json()?;

        writeln!(self.writer, "{}", json).map_err(|e| EngineError::HostIo {
            context: format!("writing {}", message.command()),
            source: e,
        })?;

        self.writer.flush().map_err(|e| EngineError::HostIo {
            context: "flushing host stream".into(),
            source: e,
        })
    }

    fn next_message(&mut self) -> Result<Option<HostMessage>, EngineError> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| EngineError::HostIo {
                    context: "reading host stream".into(),
                    source: e,
                })?;

            if read == 0 {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }
            return HostMessage::from_json(line.trim()).map(Some);
        }
    }
}

// ============================================================================
// HTTP transport
// ============================================================================

/// Posts every engine message to a host endpoint. A non-empty reply body is
/// a host message and is queued for `next_message`.
pub struct HttpHost {
    endpoint: String,
    client: reqwest::blocking::Client,
    pending: VecDeque<HostMessage>,
}

impl HttpHost {
    pub fn new(endpoint: &str) -> Self {
        HttpHost {
            endpoint: endpoint.to_string(),
            client: reqwest::blocking::Client::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl HostChannel for HttpHost {
    fn send(&mut self, message: &EngineMessage) -> Result<(), EngineError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(message)
            .send()
            .map_err(|e| EngineError::Host(format!("POST {} failed: {}", self.endpoint, e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Host(format!(
                "host answered {} to {}",
                response.status(),
                message.command()
            )));
        }

        let body = response
            .text()
            .map_err(|e| EngineError::Host(format!("unreadable host reply: {}", e)))?;
        if !body.trim().is_empty() {
            let reply = HostMessage::from_json(body.trim())?;
            debug!(command = message.command(), ?reply, "host replied");
            self.pending.push_back(reply);
        }
        Ok(())
    }

    fn next_message(&mut self) -> Result<Option<HostMessage>, EngineError> {
        Ok(self.pending.pop_front())
    }
}

// ============================================================================
// In-memory transport
// ============================================================================

type Responder = Box<dyn FnMut(&EngineMessage) -> Vec<HostMessage>>;

/// Keeps every sent message and serves queued replies. An optional responder
/// produces replies as messages are sent.
#[derive(Default)]
pub struct RecordingHost {
    sent: Vec<EngineMessage>,
    inbox: VecDeque<HostMessage>,
    responder: Option<Responder>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&EngineMessage) -> Vec<HostMessage> + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn push(&mut self, message: HostMessage) {
        self.inbox.push_back(message);
    }

    pub fn sent(&self) -> &[EngineMessage] {
        &self.sent
    }

    pub fn sent_commands(&self) -> Vec<&'static str> {
        self.sent.iter().map(EngineMessage::command).collect()
    }
}

impl HostChannel for RecordingHost {
    fn send(&mut self, message: &EngineMessage) -> Result<(), EngineError> {
        self.sent.push(message.clone());
        if let Some(responder) = self.responder.as_mut() {
            self.inbox.extend(responder(message));
        }
        Ok(())
    }

    fn next_message(&mut self) -> Result<Option<HostMessage>, EngineError> {
        Ok(self.inbox.pop_front())
    }
}
