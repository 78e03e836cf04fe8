// Closed-loop wheel control
//
// - state: odometry, targets, power, counters
// - law: rate-limited step target and proportional power
// - app: the wakeup tick and the command handlers around them

pub mod app;
pub mod law;
pub mod state;

pub use app::{Connector, MotorApp};
pub use state::{ControlState, Counters};
