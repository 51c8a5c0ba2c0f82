//! Device names and host-CPU resolution.
//!
//! A fully specified device name looks like
//! `/job:worker/replica:0/task:1/device:GPU:0`. Every component is optional,
//! `*` stands for "unspecified", and the legacy short forms `/cpu:N` and
//! `/gpu:N` are accepted. [`DeviceName::to_cpu_device`] maps a device to the
//! CPU on the same job/replica/task, which is how consumers are grouped when
//! deciding where a constant should live.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Device type string for host CPUs.
pub const CPU: &str = "CPU";
/// Device type string for GPUs (legacy `/gpu:N` form).
pub const GPU: &str = "GPU";

/// A device name that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse device name '{name}': {reason}")]
pub struct DeviceNameError {
    pub name: String,
    pub reason: &'static str,
}

/// A parsed device name. `None` components are unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceName {
    pub job: Option<String>,
    pub replica: Option<u32>,
    pub task: Option<u32>,
    pub device_type: Option<String>,
    pub id: Option<u32>,
}

impl DeviceName {
    /// Parses a full device name. The empty string parses to a name with
    /// every component unspecified.
    pub fn parse(name: &str) -> Result<DeviceName, DeviceNameError> {
        let err = |reason| DeviceNameError {
            name: name.to_string(),
            reason,
        };
        let mut parsed = DeviceName::default();
        if name == "/" {
            return Ok(parsed);
        }

        let mut rest = name;
        while !rest.is_empty() {
            let mut progress = false;

            if let Some(r) = rest.strip_prefix("/job:") {
                rest = match r.strip_prefix('*') {
                    Some(r) => {
                        parsed.job = None;
                        r
                    }
                    None => {
                        let (job, r) = consume_job_name(r).ok_or_else(|| err("bad job name"))?;
                        parsed.job = Some(job.to_string());
                        r
                    }
                };
                progress = true;
            }
            if let Some(r) = rest.strip_prefix("/replica:") {
                let (replica, r) = consume_optional_number(r).ok_or_else(|| err("bad replica"))?;
                parsed.replica = replica;
                rest = r;
                progress = true;
            }
            if let Some(r) = rest.strip_prefix("/task:") {
                let (task, r) = consume_optional_number(r).ok_or_else(|| err("bad task"))?;
                parsed.task = task;
                rest = r;
                progress = true;
            }
            if let Some(r) = rest.strip_prefix("/device:") {
                let r = match r.strip_prefix('*') {
                    Some(r) => {
                        parsed.device_type = None;
                        r
                    }
                    None => {
                        let (ty, r) =
                            consume_device_type(r).ok_or_else(|| err("bad device type"))?;
                        parsed.device_type = Some(ty.to_string());
                        r
                    }
                };
                rest = match r.strip_prefix(':') {
                    Some(r) => {
                        let (id, r) = consume_optional_number(r).ok_or_else(|| err("bad device id"))?;
                        parsed.id = id;
                        r
                    }
                    None => {
                        parsed.id = None;
                        r
                    }
                };
                progress = true;
            }

            // Legacy short forms.
            for (prefixes, ty) in [(["/cpu:", "/CPU:"], CPU), (["/gpu:", "/GPU:"], GPU)] {
                if let Some(r) = prefixes.iter().find_map(|p| rest.strip_prefix(p)) {
                    let (id, r) = consume_optional_number(r).ok_or_else(|| err("bad device id"))?;
                    parsed.device_type = Some(ty.to_string());
                    parsed.id = id;
                    rest = r;
                    progress = true;
                }
            }

            if !progress {
                return Err(err("unrecognized component"));
            }
        }
        Ok(parsed)
    }

    /// Returns `true` if the device type is `CPU`.
    pub fn is_cpu(&self) -> bool {
        self.device_type.as_deref() == Some(CPU)
    }

    /// The CPU device co-located with this one: same job, replica and task,
    /// type `CPU`, id 0.
    pub fn to_cpu_device(&self) -> DeviceName {
        DeviceName {
            device_type: Some(CPU.to_string()),
            id: Some(0),
            ..self.clone()
        }
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(job) = &self.job {
            write!(f, "/job:{}", job)?;
        }
        if let Some(replica) = self.replica {
            write!(f, "/replica:{}", replica)?;
        }
        if let Some(task) = self.task {
            write!(f, "/task:{}", task)?;
        }
        if let Some(ty) = &self.device_type {
            match self.id {
                Some(id) => write!(f, "/device:{}:{}", ty, id)?,
                None => write!(f, "/device:{}:*", ty)?,
            }
        }
        Ok(())
    }
}

impl FromStr for DeviceName {
    type Err = DeviceNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceName::parse(s)
    }
}

/// Returns `true` if `name` parses and names a CPU device.
pub fn is_cpu_device(name: &str) -> bool {
    DeviceName::parse(name).map_or(false, |d| d.is_cpu())
}

/// Maps a device name to the canonical name of the CPU on the same host.
pub fn device_name_to_cpu_device_name(name: &str) -> Result<String, DeviceNameError> {
    Ok(DeviceName::parse(name)?.to_cpu_device().to_string())
}

// ---------------------------------------------------------------------------
// Component scanners
// ---------------------------------------------------------------------------

/// `[a-z][a-z0-9_-]*`
fn consume_job_name(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_lowercase() => {}
        _ => return None,
    }
    let end = chars
        .find(|&(_, c)| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'))
        .map_or(s.len(), |(i, _)| i);
    Some(s.split_at(end))
}

/// `[A-Za-z][A-Za-z0-9_]*`
fn consume_device_type(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() => {}
        _ => return None,
    }
    let end = chars
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(s.len(), |(i, _)| i);
    Some(s.split_at(end))
}

/// Either `*` (unspecified) or a run of decimal digits.
fn consume_optional_number(s: &str) -> Option<(Option<u32>, &str)> {
    if let Some(rest) = s.strip_prefix('*') {
        return Some((None, rest));
    }
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let (digits, rest) = s.split_at(end);
    digits.parse().ok().map(|n| (Some(n), rest))
}
