//! Risk engine for the paper-trading venue
//!
//! Everything that reads the price cache and mutates account state:
//! - `snapshot`: pure account snapshot computation
//! - `margin`: margin requirements, maintenance tiers, leverage bounds
//! - `closeout`: the lock-then-verify closure protocol shared by every
//!   path out of OPEN
//! - `enforcer`: fixed-cadence liquidation scan
//! - `watcher`: per-tick SL/TP trigger evaluation
//! - `admission`: pre-trade admission control

pub mod admission;
pub mod closeout;
pub mod enforcer;
pub mod margin;
pub mod snapshot;
pub mod watcher;

pub const SERVICE_VERSION: &str = "0.1.0";
