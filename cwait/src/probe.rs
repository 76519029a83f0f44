//! Fetching state by running an external command.
//!
//! The command is expected to print the entity document as JSON on stdout,
//! e.g. `onevm show 12 --json`.

use cwait_common::{EntityDocument, FetchError, StateMapping, StateSnapshot};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
    mapping: StateMapping,
}

impl CommandProbe {
    /// `argv[0]` is the program.
    pub fn new(argv: &[String], mapping: StateMapping) -> Result<Self, FetchError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| FetchError::Protocol("empty command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            mapping,
        })
    }

    pub fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command once and map its output to a snapshot.
    ///
    /// A non-zero exit is transient (the endpoint may be briefly unreachable);
    /// failing to start the program or unparseable output is not.
    pub async fn fetch(&self) -> Result<StateSnapshot, FetchError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::Rpc(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Transport(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(bytes = output.stdout.len(), "Probe output received");
        let doc = EntityDocument::from_json_str(&stdout)?;
        self.mapping.snapshot(&doc)
    }
}
