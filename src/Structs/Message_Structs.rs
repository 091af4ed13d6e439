// Cross-thread units of work. Each message is moved into a channel, owned by
// the channel while queued, and consumed by exactly one `process` on the
// receiving side.

use super::Value_Structs::{BackendInfo, Record, Schema};
use crate::error::BackendResult;
use crate::Threading::Backend::{Backend, BackendContext};

/// Work sent from a frontend (engine thread) to its backend (worker thread).
#[derive(Debug)]
pub enum InputMessage {
    Init {
        info: BackendInfo,
        schema: Schema,
        frontend_name: String,
    },
    /// A batch of rows, in submission order.
    Write(Vec<Record>),
    SetBuf(bool),
    Flush,
    Rotate {
        rotated_path: String,
        open: f64,
        close: f64,
        terminating: bool,
    },
    Finish,
    Heartbeat {
        network_time: f64,
        current_time: f64,
    },
}

impl InputMessage {
    pub fn name(&self) -> &'static str {
        match self {
            InputMessage::Init { .. } => "Init",
            InputMessage::Write(_) => "Write",
            InputMessage::SetBuf(_) => "SetBuf",
            InputMessage::Flush => "Flush",
            InputMessage::Rotate { .. } => "Rotate",
            InputMessage::Finish => "Finish",
            InputMessage::Heartbeat { .. } => "Heartbeat",
        }
    }

    /// Execute the message against the backend, consuming it.
    ///
    /// A rotation always produces exactly one completion report, successful
    /// or not, so the owner's rotation bookkeeping is never left waiting.
    pub(crate) fn process(self, backend: &mut dyn Backend, ctx: &mut BackendContext) -> BackendResult {
        match self {
            InputMessage::Init {
                info,
                schema,
                frontend_name,
            } => {
                ctx.set_frontend_name(frontend_name);
                let result = backend.init(ctx, &info, &schema);
                if result.is_ok() {
                    ctx.set_schema(schema);
                }
                result
            }
            InputMessage::Write(records) => backend.write(ctx, records),
            InputMessage::SetBuf(enabled) => backend.set_buffering(ctx, enabled),
            InputMessage::Flush => backend.flush(ctx),
            InputMessage::Rotate {
                rotated_path,
                open,
                close,
                terminating,
            } => {
                let result = backend.rotate(ctx, &rotated_path, open, close, terminating);
                let report = RotationReport {
                    writer: Some(ctx.frontend_name().to_string()),
                    rotated_path,
                    open,
                    close,
                    terminating,
                    success: result.is_ok(),
                };
                ctx.send(OutputMessage::RotationFinished(report));
                result
            }
            InputMessage::Finish => backend.finish(ctx),
            InputMessage::Heartbeat {
                network_time,
                current_time,
            } => {
                backend.heartbeat(ctx, network_time, current_time);
                Ok(())
            }
        }
    }
}

/// Completion of a rotation request.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationReport {
    /// Name of the frontend whose backend rotated, `None` when the pair had no
    /// live backend and nothing was rotated.
    pub writer: Option<String>,
    pub rotated_path: String,
    pub open: f64,
    pub close: f64,
    pub terminating: bool,
    pub success: bool,
}

/// Reports sent from a backend (worker thread) back to the engine thread.
#[derive(Debug)]
pub enum OutputMessage {
    Info(String),
    Warning(String),
    /// A non-fatal error; the thread keeps running.
    Error(String),
    /// An operation failed and the worker stopped itself.
    Failed {
        operation: &'static str,
        reason: String,
    },
    RotationFinished(RotationReport),
    /// A record produced by an input backend.
    Put(Record),
    /// An input backend has delivered everything it read for now.
    EndOfData,
}

impl OutputMessage {
    pub fn name(&self) -> &'static str {
        match self {
            OutputMessage::Info(_) => "Info",
            OutputMessage::Warning(_) => "Warning",
            OutputMessage::Error(_) => "Error",
            OutputMessage::Failed { .. } => "Failed",
            OutputMessage::RotationFinished(_) => "RotationFinished",
            OutputMessage::Put(_) => "Put",
            OutputMessage::EndOfData => "EndOfData",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, OutputMessage::Error(_) | OutputMessage::Failed { .. })
    }
}
