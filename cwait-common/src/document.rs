//! Path-addressable entity documents and state extraction.
//!
//! Documents are JSON trees as returned by `show -j` style calls, e.g.
//! `{"VM": {"STATE": "3", "LCM_STATE": "3"}}`. Paths are `/`-separated keys;
//! numeric segments index arrays.

use crate::error::FetchError;
use crate::snapshot::{ACTIVE_STATE, NO_SUB_STATE, StateSnapshot};
use serde_json::Value;

/// Primary VM states, indexed by numeric code.
pub const VM_STATES: &[&str] = &[
    "INIT",
    "PENDING",
    "HOLD",
    "ACTIVE",
    "STOPPED",
    "SUSPENDED",
    "DONE",
    "FAILED",
    "POWEROFF",
    "UNDEPLOYED",
    "CLONING",
    "CLONING_FAILURE",
];

/// VM life-cycle (sub-)states, indexed by numeric code.
pub const LCM_STATES: &[&str] = &[
    "LCM_INIT",
    "PROLOG",
    "BOOT",
    "RUNNING",
    "MIGRATE",
    "SAVE_STOP",
    "SAVE_SUSPEND",
    "SAVE_MIGRATE",
    "PROLOG_MIGRATE",
    "PROLOG_RESUME",
    "EPILOG_STOP",
    "EPILOG",
    "SHUTDOWN",
    "CANCEL",
    "FAILURE",
    "CLEANUP_RESUBMIT",
    "UNKNOWN",
    "HOTPLUG",
    "SHUTDOWN_POWEROFF",
    "BOOT_UNKNOWN",
    "BOOT_POWEROFF",
    "BOOT_SUSPENDED",
    "BOOT_STOPPED",
    "CLEANUP_DELETE",
    "HOTPLUG_SNAPSHOT",
    "HOTPLUG_NIC",
    "HOTPLUG_SAVEAS",
    "HOTPLUG_SAVEAS_POWEROFF",
    "HOTPLUG_SAVEAS_SUSPENDED",
    "SHUTDOWN_UNDEPLOY",
    "EPILOG_UNDEPLOY",
    "PROLOG_UNDEPLOY",
    "BOOT_UNDEPLOY",
    "HOTPLUG_PROLOG_POWEROFF",
    "HOTPLUG_EPILOG_POWEROFF",
    "BOOT_MIGRATE",
    "BOOT_FAILURE",
    "BOOT_MIGRATE_FAILURE",
    "PROLOG_MIGRATE_FAILURE",
    "PROLOG_FAILURE",
    "EPILOG_FAILURE",
    "EPILOG_STOP_FAILURE",
    "EPILOG_UNDEPLOY_FAILURE",
    "PROLOG_MIGRATE_POWEROFF",
    "PROLOG_MIGRATE_POWEROFF_FAILURE",
    "PROLOG_MIGRATE_SUSPEND",
    "PROLOG_MIGRATE_SUSPEND_FAILURE",
    "BOOT_UNDEPLOY_FAILURE",
    "BOOT_STOPPED_FAILURE",
    "PROLOG_RESUME_FAILURE",
    "PROLOG_UNDEPLOY_FAILURE",
    "DISK_SNAPSHOT_POWEROFF",
    "DISK_SNAPSHOT_REVERT_POWEROFF",
    "DISK_SNAPSHOT_DELETE_POWEROFF",
    "DISK_SNAPSHOT_SUSPENDED",
    "DISK_SNAPSHOT_REVERT_SUSPENDED",
    "DISK_SNAPSHOT_DELETE_SUSPENDED",
    "DISK_SNAPSHOT",
    "DISK_SNAPSHOT_REVERT",
    "DISK_SNAPSHOT_DELETE",
    "PROLOG_MIGRATE_UNKNOWN",
    "PROLOG_MIGRATE_UNKNOWN_FAILURE",
    "DISK_RESIZE",
    "DISK_RESIZE_POWEROFF",
    "DISK_RESIZE_UNDEPLOYED",
    "HOTPLUG_NIC_POWEROFF",
    "HOTPLUG_RESIZE",
    "HOTPLUG_SAVEAS_UNDEPLOYED",
    "HOTPLUG_SAVEAS_STOPPED",
];

/// Image states, indexed by numeric code.
pub const IMAGE_STATES: &[&str] = &[
    "INIT",
    "READY",
    "USED",
    "DISABLED",
    "LOCKED",
    "ERROR",
    "CLONE",
    "DELETE",
    "USED_PERS",
    "LOCKED_USED",
    "LOCKED_USED_PERS",
];

/// A fetched entity document.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDocument {
    root: Value,
}

impl EntityDocument {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, FetchError> {
        serde_json::from_str(raw)
            .map(Self::from_value)
            .map_err(|e| FetchError::Protocol(format!("invalid JSON document: {e}")))
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Look up a node by `/`-separated path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |node, segment| match node {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Scalar at `path` as text; numbers and booleans are rendered.
    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// How to read a [`StateSnapshot`] out of an [`EntityDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMapping {
    primary_path: String,
    secondary_path: Option<String>,
    primary_labels: Option<&'static [&'static str]>,
    secondary_labels: Option<&'static [&'static str]>,
}

impl StateMapping {
    /// Labels are read verbatim from the given paths.
    pub fn labels(primary_path: impl Into<String>, secondary_path: Option<String>) -> Self {
        Self {
            primary_path: primary_path.into(),
            secondary_path,
            primary_labels: None,
            secondary_labels: None,
        }
    }

    /// `VM/STATE` and `VM/LCM_STATE` decoded through the VM tables.
    pub fn vm() -> Self {
        Self {
            primary_path: "VM/STATE".to_string(),
            secondary_path: Some("VM/LCM_STATE".to_string()),
            primary_labels: Some(VM_STATES),
            secondary_labels: Some(LCM_STATES),
        }
    }

    /// `IMAGE/STATE` decoded through the image table.
    pub fn image() -> Self {
        Self {
            primary_path: "IMAGE/STATE".to_string(),
            secondary_path: None,
            primary_labels: Some(IMAGE_STATES),
            secondary_labels: None,
        }
    }

    pub fn primary_path(&self) -> &str {
        &self.primary_path
    }

    pub fn secondary_path(&self) -> Option<&str> {
        self.secondary_path.as_deref()
    }

    pub fn snapshot(&self, doc: &EntityDocument) -> Result<StateSnapshot, FetchError> {
        let raw = doc
            .get_str(&self.primary_path)
            .ok_or_else(|| FetchError::Protocol(format!("missing {}", self.primary_path)))?;
        let primary = decode(&raw, self.primary_labels, &self.primary_path)?;

        // Sub-state is only reported while active.
        let secondary = match &self.secondary_path {
            Some(path) if primary == ACTIVE_STATE => {
                let raw = doc
                    .get_str(path)
                    .ok_or_else(|| FetchError::Protocol(format!("missing {path}")))?;
                decode(&raw, self.secondary_labels, path)?
            }
            _ => NO_SUB_STATE.to_string(),
        };

        Ok(StateSnapshot::new(primary, secondary))
    }
}

fn decode(
    raw: &str,
    table: Option<&'static [&'static str]>,
    path: &str,
) -> Result<String, FetchError> {
    let Some(table) = table else {
        return Ok(raw.to_string());
    };
    // Already a label (e.g. `STATE_STR`-style documents).
    if table.contains(&raw) {
        return Ok(raw.to_string());
    }
    let code: usize = raw
        .trim()
        .parse()
        .map_err(|_| FetchError::Protocol(format!("{path}: unrecognized state '{raw}'")))?;
    table
        .get(code)
        .map(|label| label.to_string())
        .ok_or_else(|| FetchError::Protocol(format!("{path}: state code {code} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vm_doc(state: &str, lcm: &str) -> EntityDocument {
        EntityDocument::from_value(json!({
            "VM": { "ID": "12", "NAME": "new_test_machine", "STATE": state, "LCM_STATE": lcm }
        }))
    }

    #[test]
    fn test_state_tables_positions() {
        assert_eq!(VM_STATES[3], "ACTIVE");
        assert_eq!(VM_STATES[6], "DONE");
        assert_eq!(VM_STATES[8], "POWEROFF");
        assert_eq!(LCM_STATES[3], "RUNNING");
        assert_eq!(LCM_STATES[36], "BOOT_FAILURE");
        assert_eq!(IMAGE_STATES[1], "READY");
    }

    #[test]
    fn test_get_nested_paths() {
        let doc = EntityDocument::from_value(json!({
            "VM": { "TEMPLATE": { "NIC": [ { "IP": "192.168.0.1" }, { "IP": "192.168.0.2" } ] } }
        }));
        assert_eq!(doc.get_str("VM/TEMPLATE/NIC/1/IP").as_deref(), Some("192.168.0.2"));
        assert!(doc.get("VM/TEMPLATE/NIC/5/IP").is_none());
        assert!(doc.get("VM/MISSING").is_none());
        assert!(doc.get_str("VM/TEMPLATE").is_none());
    }

    #[test]
    fn test_get_str_renders_numbers() {
        let doc = EntityDocument::from_value(json!({ "IMAGE": { "STATE": 1 } }));
        assert_eq!(doc.get_str("IMAGE/STATE").as_deref(), Some("1"));
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        assert!(matches!(
            EntityDocument::from_json_str("<VM/>"),
            Err(FetchError::Protocol(_))
        ));
    }

    #[test]
    fn test_vm_mapping_active() {
        let snap = StateMapping::vm().snapshot(&vm_doc("3", "3")).unwrap();
        assert_eq!(snap, StateSnapshot::new("ACTIVE", "RUNNING"));
    }

    #[test]
    fn test_vm_mapping_inactive_reports_placeholder() {
        let snap = StateMapping::vm().snapshot(&vm_doc("6", "0")).unwrap();
        assert_eq!(snap, StateSnapshot::new("DONE", NO_SUB_STATE));
    }

    #[test]
    fn test_vm_mapping_accepts_labels() {
        let snap = StateMapping::vm().snapshot(&vm_doc("ACTIVE", "BOOT")).unwrap();
        assert_eq!(snap, StateSnapshot::new("ACTIVE", "BOOT"));
    }

    #[test]
    fn test_vm_mapping_out_of_range() {
        let err = StateMapping::vm().snapshot(&vm_doc("99", "0")).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_vm_mapping_missing_path() {
        let doc = EntityDocument::from_value(json!({ "VM": { "ID": "1" } }));
        let err = StateMapping::vm().snapshot(&doc).unwrap_err();
        assert_eq!(err, FetchError::Protocol("missing VM/STATE".into()));
    }

    #[test]
    fn test_image_mapping() {
        let doc = EntityDocument::from_value(json!({ "IMAGE": { "STATE": "1" } }));
        let snap = StateMapping::image().snapshot(&doc).unwrap();
        assert_eq!(snap, StateSnapshot::primary_only("READY"));
    }

    #[test]
    fn test_raw_label_mapping() {
        let doc = EntityDocument::from_value(json!({
            "DOCUMENT": { "STATE": "RUNNING", "PHASE": "deploying" }
        }));
        let mapping = StateMapping::labels("DOCUMENT/STATE", Some("DOCUMENT/PHASE".into()));
        // Raw mappings keep the sub-state out unless the primary is ACTIVE.
        let snap = mapping.snapshot(&doc).unwrap();
        assert_eq!(snap, StateSnapshot::primary_only("RUNNING"));
    }
}
