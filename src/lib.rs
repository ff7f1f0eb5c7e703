//! Drivers for bench DC power supplies, electronic loads, source meters and
//! multimeters that speak SCPI (or close to it).
//!
//! The library is organised in three layers:
//!
//! - [`adapters`]: the [`Transport`] trait and its TCP socket, serial, VISA and mock
//!   implementations;
//! - [`scpi`]: command tables, template formatting, reply parsing and the [`Scpi`]
//!   session that dispatches operation keys to the wire;
//! - [`instrument`]: the [`PowerSupply`] trait and one driver per vendor, plus a
//!   [`registry`](instrument::registry) that builds drivers from [`config`].
//!
//! ```no_run
//! use dcps::instrument::{AimTtiPlp, PowerSupply};
//!
//! fn main() -> dcps::DcpsResult<()> {
//!     let mut psu = AimTtiPlp::new("TCPIP0::192.168.1.100::9221::SOCKET");
//!     psu.open()?;
//!     psu.set_voltage(5.0, Some(1), None)?;
//!     psu.set_current(0.1, Some(1), None)?;
//!     psu.output_on(Some(1), None)?;
//!     println!("{:?} V", psu.measure_voltage(Some(1))?);
//!     psu.close()
//! }
//! ```
//!
//! The crate logs through `tracing` and never installs a subscriber.

pub mod adapters;
pub mod config;
pub mod error;
pub mod instrument;
pub mod scpi;

pub use adapters::Transport;
pub use config::{DcpsConfig, InstrumentSettings};
pub use error::{DcpsError, DcpsResult};
pub use instrument::{FrontPanelText, PowerSupply};
pub use scpi::{Capability, DriverProfile, Scpi};
