//! Change hooks
//!
//! After a certificate reconciliation changes anything, two hooks run: the
//! repo hook (regenerate repository definitions) and the branding hook. Both
//! are best-effort. A hook is anything implementing [`ChangeHook`]; the
//! [`CommandHook`] implementation runs `[[hooks]]` entries from the settings
//! file as subprocesses.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Serials touched by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<u64>,
    pub removed: Vec<u64>,
}

impl ChangeSet {
    pub fn new(added: Vec<u64>, removed: Vec<u64>) -> Self {
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Post-change collaborator invoked by the certificate reconciler.
pub trait ChangeHook: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    fn run(&self, changes: &ChangeSet) -> Result<()>;
}

/// Events that can trigger command hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    /// Repository definitions need regenerating
    RepoUpdate,
    /// Product branding may have changed
    BrandingUpdate,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepoUpdate => write!(f, "repo-update"),
            Self::BrandingUpdate => write!(f, "branding-update"),
        }
    }
}

/// Configuration for a single command hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// The event that triggers this hook
    pub event: HookEvent,
    /// The command to execute
    pub command: String,
    /// Arguments to pass to the command
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// Variables exported to hook processes and substituted into their args
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub vars: HashMap<String, String>,
}

impl HookContext {
    /// Context describing a set of certificate changes.
    ///
    /// Serial lists are space separated.
    pub fn for_changes(event: HookEvent, changes: &ChangeSet) -> Self {
        let join = |serials: &[u64]| {
            serials
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        };

        let mut vars = HashMap::new();
        vars.insert("HOOK_EVENT_TYPE".to_string(), event.to_string());
        vars.insert("ADDED_SERIALS".to_string(), join(&changes.added));
        vars.insert("REMOVED_SERIALS".to_string(), join(&changes.removed));
        Self { vars }
    }
}

/// Result of running a single hook
#[derive(Debug)]
pub struct HookResult {
    pub event: HookEvent,
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Run all hooks matching the given event
///
/// Hooks run in order. The first non-zero exit stops the run and is returned
/// as [`Error::HookFailed`].
pub fn run_hooks(
    hooks: &[HookConfig],
    event: HookEvent,
    context: &HookContext,
    default_dir: &Path,
) -> Result<Vec<HookResult>> {
    let mut results = Vec::new();

    for hook in hooks.iter().filter(|h| h.event == event) {
        let result = execute_hook(hook, context, default_dir)?;

        if !result.success {
            let stderr = result.stderr.trim();
            let message = if stderr.is_empty() {
                format!("exited with status {:?}", result.exit_code)
            } else {
                format!("exited with status {:?}: {}", result.exit_code, stderr)
            };
            return Err(Error::HookFailed {
                event: event.to_string(),
                command: hook.command.clone(),
                message,
            });
        }

        tracing::debug!(
            event = %event,
            command = %hook.command,
            stdout = %result.stdout.trim(),
            "Hook succeeded"
        );
        results.push(result);
    }

    Ok(results)
}

fn execute_hook(hook: &HookConfig, context: &HookContext, default_dir: &Path) -> Result<HookResult> {
    let work_dir = hook.working_dir.as_deref().unwrap_or(default_dir);

    let args: Vec<String> = hook
        .args
        .iter()
        .map(|arg| substitute_vars(arg, &context.vars))
        .collect();

    let output = Command::new(&hook.command)
        .args(&args)
        .current_dir(work_dir)
        .envs(&context.vars)
        .output()
        .map_err(|e| Error::HookFailed {
            event: hook.event.to_string(),
            command: hook.command.clone(),
            message: e.to_string(),
        })?;

    Ok(HookResult {
        event: hook.event,
        command: hook.command.clone(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
    })
}

/// Substitute `${VAR_NAME}` patterns with context variables
fn substitute_vars(input: &str, vars: &HashMap<String, String>) -> String {
    let mut result = input.to_string();
    for (key, value) in vars {
        let pattern = format!("${{{}}}", key);
        result = result.replace(&pattern, value);
    }
    result
}

/// A [`ChangeHook`] running the configured commands for one event.
#[derive(Debug, Clone)]
pub struct CommandHook {
    event: HookEvent,
    hooks: Vec<HookConfig>,
    default_dir: PathBuf,
}

impl CommandHook {
    /// Keep only the entries of `hooks` registered for `event`.
    pub fn new(event: HookEvent, hooks: &[HookConfig], default_dir: impl Into<PathBuf>) -> Self {
        Self {
            event,
            hooks: hooks.iter().filter(|h| h.event == event).cloned().collect(),
            default_dir: default_dir.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl ChangeHook for CommandHook {
    fn name(&self) -> &str {
        match self.event {
            HookEvent::RepoUpdate => "repo-update",
            HookEvent::BrandingUpdate => "branding-update",
        }
    }

    fn run(&self, changes: &ChangeSet) -> Result<()> {
        let context = HookContext::for_changes(self.event, changes);
        run_hooks(&self.hooks, self.event, &context, &self.default_dir)?;
        Ok(())
    }
}

/// Several hooks sharing one slot.
///
/// Every hook runs even if an earlier one fails; the first failure is
/// returned after all have run.
pub struct HookChain {
    name: String,
    hooks: Vec<Arc<dyn ChangeHook>>,
}

impl HookChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Vec::new(),
        }
    }

    pub fn with(mut self, hook: Arc<dyn ChangeHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl ChangeHook for HookChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, changes: &ChangeSet) -> Result<()> {
        let mut first_error = None;
        for hook in &self.hooks {
            if let Err(e) = hook.run(changes) {
                tracing::warn!(chain = %self.name, hook = hook.name(), "Hook failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
