//! Sequential, best-effort dependency provisioning.

use std::fmt;

use crate::process::Environment;
use crate::protocol::Outbox;

/// Locators ending with this suffix are archives; their short name comes
/// from the file name.
pub const ARCHIVE_SUFFIX: &str = ".whl";

/// A bare package name (`pandas`, `pyodide-http==0.2.1`) or an archive locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec(String);

impl DependencySpec {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_archive(&self) -> bool {
        self.0.ends_with(ARCHIVE_SUFFIX)
    }

    /// Name used in status lines: for archives, the last path segment up to
    /// its first `-`; otherwise the whole string.
    pub fn short_name(&self) -> &str {
        if !self.is_archive() {
            return &self.0;
        }
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        file.split('-').next().unwrap_or(file)
    }
}

impl From<&str> for DependencySpec {
    fn from(spec: &str) -> Self {
        Self::new(spec)
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(String),
    Failed(String, String),
}

impl InstallOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstallOutcome::Installed(_))
    }
}

/// Install every spec in declared order. A failed install is reported on
/// the outbox and never stops the remaining ones.
pub async fn provision<E>(env: &mut E, specs: &[DependencySpec], outbox: &Outbox) -> Vec<InstallOutcome>
where
    E: Environment + ?Sized,
{
    let mut outcomes = Vec::with_capacity(specs.len());
    for spec in specs {
        let name = spec.short_name().to_string();
        outbox.status(format!("Installing {}", name));
        match env.install(spec).await {
            Ok(()) => {
                tracing::info!(package = %name, spec = %spec, "installed");
                outcomes.push(InstallOutcome::Installed(name));
            }
            Err(e) => {
                tracing::warn!(package = %name, spec = %spec, error = %e, "install failed");
                outbox.status(format!("Error while installing {}", name));
                outcomes.push(InstallOutcome::Failed(name, e.trace()));
            }
        }
    }
    let failed = outcomes.iter().filter(|o| !o.is_installed()).count();
    tracing::info!(total = outcomes.len(), failed, "provisioning finished");
    outcomes
}
