//! In-memory collaborators for driving waits without a live endpoint.

use crate::error::FetchError;
use crate::resource::{EntityClient, EntityRef, ResourceKind, StateSource};
use crate::rpc::RpcResponse;
use crate::snapshot::StateSnapshot;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Replays a fixed sequence of fetch results; the last entry repeats forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    label: String,
    script: Vec<Result<StateSnapshot, FetchError>>,
    fetches: u32,
}

impl ScriptedSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Script made only of snapshots.
    pub fn from_states(states: &[(&str, &str)]) -> Self {
        states
            .iter()
            .fold(Self::new("scripted"), |src, (p, s)| src.then_state(p, s))
    }

    #[must_use]
    pub fn then_state(mut self, primary: &str, secondary: &str) -> Self {
        self.script.push(Ok(StateSnapshot::new(primary, secondary)));
        self
    }

    #[must_use]
    pub fn then_error(mut self, error: FetchError) -> Self {
        self.script.push(Err(error));
        self
    }

    #[must_use]
    pub fn then_repeat(mut self, primary: &str, secondary: &str, times: usize) -> Self {
        for _ in 0..times {
            self.script.push(Ok(StateSnapshot::new(primary, secondary)));
        }
        self
    }

    /// Number of `fetch` calls so far.
    pub fn fetches(&self) -> u32 {
        self.fetches
    }
}

impl StateSource for ScriptedSource {
    fn fetch(&mut self) -> Result<StateSnapshot, FetchError> {
        let index = (self.fetches as usize).min(self.script.len().saturating_sub(1));
        self.fetches += 1;
        self.script
            .get(index)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Protocol("empty script".to_string())))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[derive(Debug)]
struct Timeline {
    current: Value,
    pending: VecDeque<Value>,
}

#[derive(Debug, Default)]
struct ClientState {
    next_id: u64,
    entities: HashMap<EntityRef, Timeline>,
    outages: u32,
    info_calls: u32,
}

/// A fake orchestration endpoint.
///
/// Each entity holds a current document plus a queue of future ones. Every
/// `info` call returns the current document and then advances one step, so a
/// transition queued with [`ScriptedClient::schedule`] becomes visible over
/// successive polls.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    state: Mutex<ClientState>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Create an entity with an initial document; returns the allocate response.
    pub fn allocate(&self, kind: ResourceKind, initial: Value) -> RpcResponse {
        self.with_state(|state| {
            let id = state.next_id;
            state.next_id += 1;
            state.entities.insert(
                EntityRef { kind, id },
                Timeline {
                    current: initial,
                    pending: VecDeque::new(),
                },
            );
            RpcResponse::success(id.to_string())
        })
    }

    /// Queue documents to be served after the current one.
    pub fn schedule(
        &self,
        entity: EntityRef,
        docs: impl IntoIterator<Item = Value>,
    ) -> RpcResponse {
        self.with_state(|state| match state.entities.get_mut(&entity) {
            Some(timeline) => {
                timeline.pending.extend(docs);
                RpcResponse::success(entity.id.to_string())
            }
            None => not_found(&entity),
        })
    }

    /// Remove an entity; later `info` calls report it missing.
    pub fn delete(&self, entity: EntityRef) -> RpcResponse {
        self.with_state(|state| match state.entities.remove(&entity) {
            Some(_) => RpcResponse::success(entity.id.to_string()),
            None => not_found(&entity),
        })
    }

    /// Fail the next `count` calls at the transport level.
    pub fn fail_next(&self, count: u32) {
        self.with_state(|state| state.outages += count);
    }

    pub fn info_calls(&self) -> u32 {
        self.with_state(|state| state.info_calls)
    }

    pub fn exists(&self, entity: EntityRef) -> bool {
        self.with_state(|state| state.entities.contains_key(&entity))
    }

    /// New VM in `PENDING`.
    pub fn allocate_vm(&self) -> RpcResponse {
        self.allocate(ResourceKind::Vm, vm_doc(1, 0))
    }

    /// `PROLOG`, `BOOT`, then `RUNNING`.
    pub fn deploy(&self, id: u64) -> RpcResponse {
        self.schedule(vm(id), [vm_doc(3, 1), vm_doc(3, 2), vm_doc(3, 3)])
    }

    /// `PROLOG`, `BOOT`, then `BOOT_FAILURE`.
    pub fn deploy_failing(&self, id: u64) -> RpcResponse {
        self.schedule(vm(id), [vm_doc(3, 1), vm_doc(3, 2), vm_doc(3, 36)])
    }

    /// `SHUTDOWN`, `EPILOG`, then `DONE`.
    pub fn terminate(&self, id: u64) -> RpcResponse {
        self.schedule(vm(id), [vm_doc(3, 12), vm_doc(3, 11), vm_doc(6, 0)])
    }

    /// New image that stays `LOCKED` for `locked_polls` polls, then `READY`.
    pub fn allocate_image(&self, locked_polls: usize) -> RpcResponse {
        let response = self.allocate(ResourceKind::Image, image_doc(4));
        if let Ok(id) = response.parse_id() {
            let entity = EntityRef {
                kind: ResourceKind::Image,
                id,
            };
            let docs = std::iter::repeat_n(image_doc(4), locked_polls.saturating_sub(1))
                .chain(std::iter::once(image_doc(1)));
            self.schedule(entity, docs);
        }
        response
    }
}

impl EntityClient for ScriptedClient {
    fn info(&self, entity: &EntityRef) -> Result<RpcResponse, FetchError> {
        self.with_state(|state| {
            state.info_calls += 1;
            if state.outages > 0 {
                state.outages -= 1;
                return Err(FetchError::Transport("connection refused".to_string()));
            }
            let Some(timeline) = state.entities.get_mut(entity) else {
                return Ok(not_found(entity));
            };
            let body = timeline.current.to_string();
            if let Some(next) = timeline.pending.pop_front() {
                timeline.current = next;
            }
            Ok(RpcResponse::success(body))
        })
    }
}

fn vm(id: u64) -> EntityRef {
    EntityRef {
        kind: ResourceKind::Vm,
        id,
    }
}

fn not_found(entity: &EntityRef) -> RpcResponse {
    RpcResponse::error(format!(
        "[one.{}.info] Error getting {} [{}].",
        entity.kind, entity.kind, entity.id
    ))
}

/// VM document with numeric `STATE` and `LCM_STATE`.
pub fn vm_doc(state: u32, lcm_state: u32) -> Value {
    json!({ "VM": { "STATE": state, "LCM_STATE": lcm_state } })
}

/// Image document with a numeric `STATE`.
pub fn image_doc(state: u32) -> Value {
    json!({ "IMAGE": { "STATE": state } })
}
