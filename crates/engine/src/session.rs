//! Executes parsed commands against the coordinator and renders JSON lines.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use holdfast_core::Clock;
use holdfast_events::EventBus;
use holdfast_infra::{InventoryStore, ReservationCoordinator};
use holdfast_inventory::{
    Reservation, ReservationError, ReservationService, Unit, UnitChangeEvent,
};

use crate::commands::Command;

/// Payload of a successful reply.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyBody {
    Reservation(Reservation),
    Unit(Unit),
    Units(Vec<Unit>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    /// Authoritative unit state observed with the rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Unit>,
}

impl From<&ReservationError> for ErrorBody {
    fn from(err: &ReservationError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            current: err.current().cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub command: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReplyBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    fn from_result<T, F>(command: &'static str, result: Result<T, ReservationError>, body: F) -> Self
    where
        F: FnOnce(T) -> ReplyBody,
    {
        match result {
            Ok(value) => Self {
                command,
                ok: true,
                result: Some(body(value)),
                error: None,
            },
            Err(err) => Self {
                command,
                ok: false,
                result: None,
                error: Some(ErrorBody::from(&err)),
            },
        }
    }
}

/// One line of engine output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Reply(Reply),
    Event(UnitChangeEvent),
    /// The input line could not be parsed; nothing was executed.
    Invalid { line: usize, message: String },
}

/// Serializes outputs as JSON lines onto a shared writer.
#[derive(Debug)]
pub struct JsonLines<W> {
    inner: Mutex<W>,
}

impl<W: Write> JsonLines<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    pub fn emit(&self, output: &Output) -> io::Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("output writer poisoned"))?;
        serde_json::to_writer(&mut *writer, output)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn into_inner(self) -> Option<W> {
        self.inner.into_inner().ok()
    }
}

pub struct Session<S, B, C> {
    coordinator: Arc<ReservationCoordinator<S, B, C>>,
}

impl<S, B, C> Session<S, B, C>
where
    S: InventoryStore,
    B: EventBus<UnitChangeEvent>,
    C: Clock,
{
    pub fn new(coordinator: Arc<ReservationCoordinator<S, B, C>>) -> Self {
        Self { coordinator }
    }

    pub fn execute(&self, command: Command) -> Reply {
        let name = command.name();
        debug!(command = name, "executing command");
        let coordinator = self.coordinator.as_ref();

        match command {
            Command::Reserve {
                unit_id,
                actor,
                ttl,
            } => {
                let ttl = ttl.unwrap_or_else(|| coordinator.default_ttl());
                Reply::from_result(
                    name,
                    coordinator.reserve(unit_id, &actor, ttl),
                    ReplyBody::Reservation,
                )
            }
            Command::Release { unit_id, actor } => Reply::from_result(
                name,
                coordinator.release(unit_id, &actor),
                ReplyBody::Unit,
            ),
            Command::Extend {
                unit_id,
                actor,
                additional,
            } => Reply::from_result(
                name,
                coordinator.extend(unit_id, &actor, additional),
                ReplyBody::Reservation,
            ),
            Command::Advance {
                unit_id,
                actor,
                target,
            } => Reply::from_result(
                name,
                coordinator.advance(unit_id, target, &actor),
                ReplyBody::Unit,
            ),
            Command::Cancel { unit_id, actor } => Reply::from_result(
                name,
                coordinator.cancel(unit_id, &actor),
                ReplyBody::Unit,
            ),
            Command::Get { unit_id } => {
                Reply::from_result(name, coordinator.get(unit_id), ReplyBody::Unit)
            }
            Command::List { project_id } => Reply::from_result(
                name,
                coordinator.list(project_id).map(|mut units| {
                    units.sort_by(|a, b| a.attributes().code.cmp(&b.attributes().code));
                    units
                }),
                ReplyBody::Units,
            ),
        }
    }
}
