//! Environment fingerprints attached to every snapshot.
//!
//! The fingerprint is produced by an [`EnvironmentProbe`]. Only platform,
//! runtime version and CPU count take part in the environment-changed check;
//! the remaining fields are informational.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub platform: String,
    pub runtime_version: String,
    pub cpu_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
}

impl Environment {
    pub fn new<P: Into<String>, R: Into<String>>(
        platform: P,
        runtime_version: R,
        cpu_count: usize,
    ) -> Self {
        Self {
            platform: platform.into(),
            runtime_version: runtime_version.into(),
            cpu_count,
            threads: None,
            memory_limit: None,
        }
    }

    /// True when two fingerprints describe comparable hosts.
    pub fn same_host_class(&self, other: &Environment) -> bool {
        self.platform == other.platform
            && self.runtime_version == other.runtime_version
            && self.cpu_count == other.cpu_count
    }
}

/// Source of the environment fingerprint embedded by `SnapshotStore::create`.
pub trait EnvironmentProbe: Send + Sync {
    fn fingerprint(&self) -> Environment;
}

/// Probe describing the process this library runs in.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostProbe;

impl EnvironmentProbe for HostProbe {
    fn fingerprint(&self) -> Environment {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Environment::new(
            format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            runtime_version(),
            cpu_count,
        )
    }
}

/// `rust-<version>` of the compiler that built this crate, or `rust` when the
/// build script could not determine it.
fn runtime_version() -> String {
    match option_env!("RUSTC_VERSION") {
        Some(version) if !version.is_empty() => format!("rust-{version}"),
        _ => "rust".to_string(),
    }
}

/// Probe returning a fixed fingerprint.
#[derive(Clone, Debug, Default)]
pub struct FixedProbe(pub Environment);

impl EnvironmentProbe for FixedProbe {
    fn fingerprint(&self) -> Environment {
        self.0.clone()
    }
}
