//! Target board model for video SoC composition.
//!
//! A platform enumerates the scarce global resources a system image is
//! composed against:
//! - **CSR space:** addressable control/status register slots
//! - **Interrupt lines:** fixed by the interrupt controller
//! - **Clock generators:** PLL sites, some held by the base system
//! - **Crossbar ports and connectors:** the physical attachment points

pub mod error;
pub mod parse;
pub mod platform;
pub mod pool;

pub use error::{PlatformError, Result};
pub use platform::{ClockGenerator, Connector, ConnectorClaims, CsrSpace, Platform, SystemClock};
pub use pool::{RangePool, ResourceKind, ResourcePool};
