pub mod daemon;
pub mod onboard;
pub mod resolve;
pub mod schedules;
pub mod sync;
pub mod token;
