//! Shell-command backed collaborators.
//!
//! Each privileged primitive is a configurable command template run through
//! `sh -c`. Templates may reference `{name}`, `{size}` and `{path}`; substituted
//! values are single-quoted. Exit status 0 is success.

use super::{PrivilegedOperator, SystemProperties};
use crate::util::run_shell;
use dsu_shared::errors::{DsuError, DsuResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Command templates for the privileged operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSet {
    /// Shell used to run every template.
    pub shell: String,
    pub set_dynamic_partition_property: String,
    pub force_stop_conflicting_component: String,
    pub create_partition: String,
    pub install_partition_image: String,
    pub enable_dynamic_os: String,
    pub disable_dynamic_os: String,
    /// Prints `1`/`true` while a dynamic system image is booted.
    pub query_image_running: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            shell: "sh".into(),
            set_dynamic_partition_property:
                "setprop persist.sys.fflag.override.settings_dynamic_system true".into(),
            force_stop_conflicting_component: "am force-stop com.android.dynsystem".into(),
            create_partition: "gsi_tool create-partition --name {name} --size {size}".into(),
            install_partition_image: "gsi_tool write-partition --name {name} --image {path}"
                .into(),
            enable_dynamic_os: "gsi_tool enable".into(),
            disable_dynamic_os: "gsi_tool disable".into(),
            query_image_running: "getprop ro.gsid.image_running".into(),
        }
    }
}

impl CommandSet {
    pub fn sanitize(&self) -> DsuResult<()> {
        let templates = [
            ("shell", &self.shell),
            (
                "set_dynamic_partition_property",
                &self.set_dynamic_partition_property,
            ),
            (
                "force_stop_conflicting_component",
                &self.force_stop_conflicting_component,
            ),
            ("create_partition", &self.create_partition),
            ("install_partition_image", &self.install_partition_image),
            ("enable_dynamic_os", &self.enable_dynamic_os),
            ("disable_dynamic_os", &self.disable_dynamic_os),
            ("query_image_running", &self.query_image_running),
        ];
        for (key, value) in templates {
            if value.trim().is_empty() {
                return Err(DsuError::Config(format!("command `{}` is empty", key)));
            }
        }
        Ok(())
    }
}

/// Quote `value` for safe interpolation into a POSIX shell command.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Fill `{name}`, `{size}` and `{path}` placeholders.
fn render(template: &str, name: Option<&str>, size: Option<u64>, path: Option<&Path>) -> String {
    let mut rendered = template.to_string();
    if let Some(name) = name {
        rendered = rendered.replace("{name}", &shell_quote(name));
    }
    if let Some(size) = size {
        rendered = rendered.replace("{size}", &size.to_string());
    }
    if let Some(path) = path {
        rendered = rendered.replace("{path}", &shell_quote(&path.to_string_lossy()));
    }
    rendered
}

/// Runs privileged operations as shell commands.
#[derive(Debug, Clone)]
pub struct CommandOperator {
    commands: CommandSet,
}

impl CommandOperator {
    pub fn new(commands: CommandSet) -> Self {
        Self { commands }
    }

    fn run(&self, operation: &str, command: &str) -> DsuResult<()> {
        let output = run_shell(&self.commands.shell, command)?;
        if output.success {
            return Ok(());
        }
        tracing::warn!(
            operation = %operation,
            code = ?output.code,
            stderr = %output.stderr,
            "Privileged command failed"
        );
        Err(DsuError::Internal(format!(
            "{} exited with {:?}: {}",
            operation, output.code, output.stderr
        )))
    }
}

impl PrivilegedOperator for CommandOperator {
    fn set_dynamic_partition_property(&self) -> DsuResult<()> {
        self.run(
            "set_dynamic_partition_property",
            &self.commands.set_dynamic_partition_property,
        )
    }

    fn force_stop_conflicting_component(&self) -> DsuResult<()> {
        self.run(
            "force_stop_conflicting_component",
            &self.commands.force_stop_conflicting_component,
        )
    }

    fn create_partition(&self, name: &str, size_bytes: u64) -> DsuResult<()> {
        let command = render(
            &self.commands.create_partition,
            Some(name),
            Some(size_bytes),
            None,
        );
        self.run("create_partition", &command)
    }

    fn install_partition_image(&self, staged_file: &Path, name: &str) -> DsuResult<()> {
        let command = render(
            &self.commands.install_partition_image,
            Some(name),
            None,
            Some(staged_file),
        );
        self.run("install_partition_image", &command)
    }

    fn enable_dynamic_os(&self) -> DsuResult<()> {
        self.run("enable_dynamic_os", &self.commands.enable_dynamic_os)
    }

    fn disable_dynamic_os(&self) -> DsuResult<()> {
        self.run("disable_dynamic_os", &self.commands.disable_dynamic_os)
    }
}

/// Reads device state with a property query command.
#[derive(Debug, Clone)]
pub struct GetpropProperties {
    shell: String,
    query: String,
}

impl GetpropProperties {
    pub fn new(commands: &CommandSet) -> Self {
        Self {
            shell: commands.shell.clone(),
            query: commands.query_image_running.clone(),
        }
    }
}

impl SystemProperties for GetpropProperties {
    fn is_dynamic_os_image_running(&self) -> DsuResult<bool> {
        let output = run_shell(&self.shell, &self.query)?;
        if !output.success {
            return Err(DsuError::Internal(format!(
                "property query exited with {:?}: {}",
                output.code, output.stderr
            )));
        }
        Ok(matches!(output.stdout.as_str(), "1" | "true"))
    }
}
