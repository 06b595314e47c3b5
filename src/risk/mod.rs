// Risk management module
pub mod crash_failsafe;
pub mod sizer;

pub use crash_failsafe::{CrashCheck, CrashFailsafe, CrashTrigger};
pub use sizer::{PositionSize, RealizedPnl, RiskSizer, RISK_EPSILON};
