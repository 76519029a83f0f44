//! Remote resource handles and the fetch capability the waiter depends on.

use crate::document::{EntityDocument, StateMapping};
use crate::error::FetchError;
use crate::rpc::RpcResponse;
use crate::snapshot::{NO_SUB_STATE, StateSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Anything whose current state can be fetched with one round trip.
pub trait StateSource {
    fn fetch(&mut self) -> Result<StateSnapshot, FetchError>;

    /// Short label for log lines.
    fn describe(&self) -> String {
        "resource".to_string()
    }
}

impl<S: StateSource + ?Sized> StateSource for &mut S {
    fn fetch(&mut self) -> Result<StateSnapshot, FetchError> {
        (**self).fetch()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Adapts a closure into a [`StateSource`].
pub struct FnSource<F> {
    label: String,
    fetch: F,
}

impl<F> FnSource<F>
where
    F: FnMut() -> Result<StateSnapshot, FetchError>,
{
    pub fn new(label: impl Into<String>, fetch: F) -> Self {
        Self {
            label: label.into(),
            fetch,
        }
    }
}

impl<F> StateSource for FnSource<F>
where
    F: FnMut() -> Result<StateSnapshot, FetchError>,
{
    fn fetch(&mut self) -> Result<StateSnapshot, FetchError> {
        (self.fetch)()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// State labels derived from the last fetched document.
pub trait EntityState {
    fn primary_state(&self) -> String;
    fn secondary_state(&self) -> String;
}

/// Entity kinds managed through the orchestration endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vm,
    Image,
    BackupJob,
    Hook,
    MarketApp,
    VnTemplate,
    Zone,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        Self::Vm,
        Self::Image,
        Self::BackupJob,
        Self::Hook,
        Self::MarketApp,
        Self::VnTemplate,
        Self::Zone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Image => "image",
            Self::BackupJob => "backup_job",
            Self::Hook => "hook",
            Self::MarketApp => "market_app",
            Self::VnTemplate => "vn_template",
            Self::Zone => "zone",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

/// Identifies one entity on the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: ResourceKind,
    pub id: u64,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// The one RPC a [`RemoteResource`] needs.
pub trait EntityClient {
    /// Fetch the entity document; the success payload is JSON.
    ///
    /// `Err` means no response arrived at all (connection refused, timeout).
    fn info(&self, entity: &EntityRef) -> Result<RpcResponse, FetchError>;
}

/// Handle to one remote entity with its last fetched document.
pub struct RemoteResource<'c, C: EntityClient + ?Sized> {
    client: &'c C,
    entity: EntityRef,
    mapping: StateMapping,
    last: Option<EntityDocument>,
    invalidated: bool,
}

impl<'c, C: EntityClient + ?Sized> RemoteResource<'c, C> {
    pub fn new(client: &'c C, entity: EntityRef, mapping: StateMapping) -> Self {
        Self {
            client,
            entity,
            mapping,
            last: None,
            invalidated: false,
        }
    }

    /// Build a handle from the response of an allocate call.
    pub fn from_allocate(
        client: &'c C,
        kind: ResourceKind,
        response: &RpcResponse,
        mapping: StateMapping,
    ) -> Result<Self, FetchError> {
        let id = response.parse_id()?;
        Ok(Self::new(client, EntityRef { kind, id }, mapping))
    }

    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    pub fn id(&self) -> u64 {
        self.entity.id
    }

    /// One round trip; replaces the cached document on success.
    pub fn info(&mut self) -> Result<&EntityDocument, FetchError> {
        if self.invalidated {
            return Err(FetchError::Invalidated);
        }
        let payload = self.client.info(&self.entity)?.into_result()?;
        let doc = EntityDocument::from_json_str(&payload)?;
        debug!(entity = %self.entity, "Refreshed entity document");
        Ok(self.last.insert(doc))
    }

    /// Last fetched document, if any.
    pub fn document(&self) -> Option<&EntityDocument> {
        self.last.as_ref()
    }

    /// Mark the handle dead after the entity has been deleted.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
        self.last = None;
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    fn cached_snapshot(&self) -> Option<StateSnapshot> {
        self.last
            .as_ref()
            .and_then(|doc| self.mapping.snapshot(doc).ok())
    }
}

impl<C: EntityClient + ?Sized> StateSource for RemoteResource<'_, C> {
    fn fetch(&mut self) -> Result<StateSnapshot, FetchError> {
        self.info()?;
        match &self.last {
            Some(doc) => self.mapping.snapshot(doc),
            None => Err(FetchError::Invalidated),
        }
    }

    fn describe(&self) -> String {
        self.entity.to_string()
    }
}

/// Labels from the cached document; empty when nothing was fetched yet.
impl<C: EntityClient + ?Sized> EntityState for RemoteResource<'_, C> {
    fn primary_state(&self) -> String {
        self.cached_snapshot()
            .map(|s| s.primary().to_string())
            .unwrap_or_default()
    }

    fn secondary_state(&self) -> String {
        self.cached_snapshot()
            .map(|s| s.secondary().to_string())
            .unwrap_or_else(|| NO_SUB_STATE.to_string())
    }
}
