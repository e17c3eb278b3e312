mod document;
mod state;

pub use document::{AlarmDocument, MetricId, SubAlarm};
pub use state::AlarmState;
