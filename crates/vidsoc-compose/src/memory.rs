//! Shared memory crossbar and its port capabilities.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vidsoc_platform::ResourceKind;

use crate::error::{ComposeError, Result};

/// Clock domain of ports that do not ask for one.
pub const SYS_DOMAIN: &str = "sys";

/// Direction of a crossbar port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortDirection {
    Read,
    Write,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Read => f.write_str("read"),
            PortDirection::Write => f.write_str("write"),
        }
    }
}

/// What a pipeline asks the crossbar for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRequest {
    pub direction: PortDirection,
    /// Word width in bits; the crossbar's native width if absent.
    pub data_width: Option<u32>,
    /// Reverse byte order of each word.
    pub reverse: bool,
    /// Clock domain the port is used from.
    pub clock_domain: Option<String>,
}

impl PortRequest {
    pub fn write() -> Self {
        Self {
            direction: PortDirection::Write,
            data_width: None,
            reverse: false,
            clock_domain: None,
        }
    }

    pub fn read(data_width: u32) -> Self {
        Self {
            direction: PortDirection::Read,
            data_width: Some(data_width),
            reverse: false,
            clock_domain: None,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn clocked_in(mut self, domain: impl Into<String>) -> Self {
        self.clock_domain = Some(domain.into());
        self
    }
}

/// Exclusive access to one crossbar port.
///
/// Not `Clone`: a port moves into exactly one pipeline.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct MemoryPort {
    id: u32,
    direction: PortDirection,
    data_width: u32,
    reverse: bool,
    clock_domain: String,
}

impl MemoryPort {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn clock_domain(&self) -> &str {
        &self.clock_domain
    }
}

/// The memory arbiter handing out ports.
#[derive(Debug)]
pub struct Crossbar {
    ports: u32,
    native_width: u32,
    granted: u32,
}

impl Crossbar {
    pub fn new(ports: u32, native_width: u32) -> Self {
        Self {
            ports,
            native_width,
            granted: 0,
        }
    }

    /// Grant the next free port.
    pub fn get_port(&mut self, request: PortRequest) -> Result<MemoryPort> {
        if self.granted >= self.ports {
            return Err(ComposeError::exhausted(
                ResourceKind::CrossbarPort,
                format!("all {} crossbar ports are granted", self.ports),
            ));
        }
        let port = MemoryPort {
            id: self.granted,
            direction: request.direction,
            data_width: request.data_width.unwrap_or(self.native_width),
            reverse: request.reverse,
            clock_domain: request
                .clock_domain
                .unwrap_or_else(|| SYS_DOMAIN.to_string()),
        };
        self.granted += 1;
        debug!(
            port = port.id,
            direction = %port.direction,
            width = port.data_width,
            domain = %port.clock_domain,
            "granted crossbar port"
        );
        Ok(port)
    }

    /// Ports not yet granted.
    pub fn remaining(&self) -> u32 {
        self.ports - self.granted
    }
}
