//! Host resources reported at registration.
//!
//! Every registration carries exactly three resource descriptors: `CPU`
//! (cores × 1024), `MEMORY` (total megabytes) and `PORTS` (the reserved host
//! ports). Probing is best effort; a failed memory probe reports zero.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// CPU units reported per core.
pub const CPU_UNITS_PER_CORE: i32 = 1024;

/// Default location of the kernel's memory statistics.
pub const DEFAULT_MEMINFO_PATH: &str = "/proc/meminfo";

/// The type tag of a resource on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    /// A single integer value.
    Integer,
    /// A set of strings.
    StringSet,
}

/// The value of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceValue {
    /// An integer capacity.
    Integer(i32),
    /// A set of string values.
    StringSet(Vec<String>),
}

/// A named, typed capacity reported to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource name (e.g. `CPU`).
    pub name: String,
    /// Resource value; the kind follows from it.
    pub value: ResourceValue,
}

impl Resource {
    /// Create an integer resource.
    #[must_use]
    pub fn integer(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value: ResourceValue::Integer(value),
        }
    }

    /// Create a string-set resource.
    #[must_use]
    pub fn string_set(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value: ResourceValue::StringSet(values),
        }
    }

    /// The type tag of this resource.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self.value {
            ResourceValue::Integer(_) => ResourceKind::Integer,
            ResourceValue::StringSet(_) => ResourceKind::StringSet,
        }
    }
}

/// The fixed set of resources sent with every registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSet([Resource; 3]);

impl ResourceSet {
    /// Build the resource set from raw capacities.
    #[must_use]
    pub fn new(cpu_cores: usize, memory_mb: u64, reserved_ports: &[u16]) -> Self {
        let cpu = i32::try_from(cpu_cores)
            .unwrap_or(i32::MAX)
            .saturating_mul(CPU_UNITS_PER_CORE);
        let memory = i32::try_from(memory_mb).unwrap_or(i32::MAX);
        let ports = reserved_ports.iter().map(ToString::to_string).collect();

        Self([
            Resource::integer("CPU", cpu),
            Resource::integer("MEMORY", memory),
            Resource::string_set("PORTS", ports),
        ])
    }

    /// Probe the host and build the resource set.
    ///
    /// A failed memory probe is logged and reported as zero megabytes.
    #[must_use]
    pub fn from_probe(probe: &dyn HostProbe, reserved_ports: &[u16]) -> Self {
        let memory_mb = probe.total_memory_mb().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Unable to get memory info");
            0
        });
        Self::new(probe.cpu_count(), memory_mb, reserved_ports)
    }

    /// The resources in reporting order.
    #[must_use]
    pub fn as_slice(&self) -> &[Resource] {
        &self.0
    }
}

/// Source of host capacity information.
pub trait HostProbe: Send + Sync {
    /// Number of CPU cores available.
    fn cpu_count(&self) -> usize;

    /// Total memory in megabytes.
    ///
    /// # Errors
    ///
    /// Returns an error if memory statistics cannot be read.
    fn total_memory_mb(&self) -> io::Result<u64>;
}

/// Probes the machine the agent runs on.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    meminfo_path: PathBuf,
}

impl SystemProbe {
    /// Create a probe reading `/proc/meminfo`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_meminfo_path(DEFAULT_MEMINFO_PATH)
    }

    /// Create a probe reading memory statistics from the given file.
    #[must_use]
    pub fn with_meminfo_path(path: impl Into<PathBuf>) -> Self {
        Self {
            meminfo_path: path.into(),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SystemProbe {
    fn cpu_count(&self) -> usize {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }

    fn total_memory_mb(&self) -> io::Result<u64> {
        let content = std::fs::read_to_string(&self.meminfo_path)?;
        parse_mem_total_kb(&content)
            .map(|kb| kb / 1024)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "MemTotal not found"))
    }
}

/// Extract the `MemTotal` value (in kB) from `/proc/meminfo` content.
#[must_use]
pub fn parse_mem_total_kb(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// A probe returning fixed values.
#[derive(Debug, Clone)]
pub struct FixedProbe {
    /// Reported core count.
    pub cpu_count: usize,
    /// Reported memory, or `None` to simulate a failed probe.
    pub memory_mb: Option<u64>,
}

impl HostProbe for FixedProbe {
    fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    fn total_memory_mb(&self) -> io::Result<u64> {
        self.memory_mb
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "memory unavailable"))
    }
}
