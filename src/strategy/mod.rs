// Entry/exit signal module
pub mod rebuy;
pub mod signals;

pub use rebuy::{RebuyMode, RebuyPriceCalculator};
pub use signals::{entry_signal, exit_signal, ExitSignal};
