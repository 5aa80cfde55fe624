/*!
call.rs - one generic request/response exchange with a node.

A `GenericCall` owns the input payload and, once finished, either the
output payload or the failure text. The channel servicing the call gets
a `CallCompleter` (the sending half of a oneshot) and may complete it
from any thread; the issuing thread parks in `wait()`.

`wait()` is unbounded unless a timeout was opted into. It must not be
called from inside an async context (it blocks the thread).
*/

use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::payload::{MessageSchema, Payload};

/// Lifecycle of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Succeeded,
    Failed,
}

enum CallOutcome {
    Done(Payload),
    Failed(String),
}

/// Completion handle passed to whatever services the call.
pub struct CallCompleter {
    tx: oneshot::Sender<CallOutcome>,
    output_schema: MessageSchema,
}

impl CallCompleter {
    /// Schema the output payload has to conform to.
    pub fn output_schema(&self) -> &MessageSchema {
        &self.output_schema
    }

    /// Complete with an output payload built against `output_schema`.
    pub fn succeed(self, output: Payload) {
        if output.schema() != &self.output_schema {
            let text = format!(
                "node replied with message '{}', expected '{}'",
                output.schema().name,
                self.output_schema.name
            );
            return self.fail(text);
        }
        let _ = self.tx.send(CallOutcome::Done(output));
    }

    /// Decode a JSON reply; a reply that does not fit the schema fails the call.
    pub fn succeed_json(self, raw: &serde_json::Value) {
        match Payload::from_json(self.output_schema.clone(), raw) {
            Ok(payload) => {
                let _ = self.tx.send(CallOutcome::Done(payload));
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub fn fail(self, text: impl Into<String>) {
        let _ = self.tx.send(CallOutcome::Failed(text.into()));
    }
}

/// Asynchronous request/response unit with a blocking `wait`.
pub struct GenericCall {
    input: Payload,
    output: Option<Payload>,
    state: CallState,
    error_text: String,
    timeout: Option<Duration>,
    output_schema: MessageSchema,
    tx: Option<oneshot::Sender<CallOutcome>>,
    rx: Option<oneshot::Receiver<CallOutcome>>,
}

impl GenericCall {
    pub fn new(input: Payload, output_schema: MessageSchema) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            input,
            output: None,
            state: CallState::Pending,
            error_text: String::new(),
            timeout: None,
            output_schema,
            tx: Some(tx),
            rx: Some(rx),
        }
    }

    /// Bound `wait()`; `None` keeps the unbounded default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn input(&self) -> &Payload {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut Payload {
        &mut self.input
    }

    /// Hand out the completion handle. Only the first caller gets one.
    pub fn completer(&mut self) -> Option<CallCompleter> {
        self.tx.take().map(|tx| CallCompleter {
            tx,
            output_schema: self.output_schema.clone(),
        })
    }

    /// Block until the call is completed or failed.
    pub fn wait(&mut self) {
        if self.state != CallState::Pending {
            return;
        }
        // Unissued call: drop our own sender so the receiver sees a closed channel.
        self.tx = None;

        let Some(rx) = self.rx.take() else {
            return self.finish(Err("call already consumed".into()));
        };
        let outcome = match self.timeout {
            None => rx
                .blocking_recv()
                .map_err(|_| "call abandoned before completion".to_string()),
            Some(limit) => wait_bounded(rx, limit),
        };
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: std::result::Result<CallOutcome, String>) {
        match outcome {
            Ok(CallOutcome::Done(payload)) => {
                self.output = Some(payload);
                self.state = CallState::Succeeded;
            }
            Ok(CallOutcome::Failed(text)) | Err(text) => {
                self.error_text = text;
                self.state = CallState::Failed;
            }
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn failed(&self) -> bool {
        self.state == CallState::Failed
    }

    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    /// Output payload; only present after a successful `wait()`.
    pub fn output(&self) -> Option<&Payload> {
        self.output.as_ref()
    }

    /// Waits, then converts the outcome into a result.
    pub fn into_result(mut self) -> Result<Payload> {
        self.wait();
        match self.output.take() {
            Some(payload) if self.state == CallState::Succeeded => Ok(payload),
            _ => Err(Error::RemoteCall(self.error_text)),
        }
    }
}

fn wait_bounded(
    rx: oneshot::Receiver<CallOutcome>,
    limit: Duration,
) -> std::result::Result<CallOutcome, String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| format!("cannot wait for call: {e}"))?;
    match rt.block_on(tokio::time::timeout(limit, rx)) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(_)) => Err("call abandoned before completion".into()),
        Err(_) => Err(format!("call timed out after {} ms", limit.as_millis())),
    }
}
