use serde::{Deserialize, Serialize};

/// Three-valued alarm state with Kleene-style combination: `Undetermined`
/// taints a result unless the other operand decides it outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmState {
    Ok,
    Alarm,
    Undetermined,
}

impl AlarmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Alarm => "ALARM",
            Self::Undetermined => "UNDETERMINED",
        }
    }

    /// `and` is OK as soon as any operand is OK; ALARM only when every
    /// operand is ALARM.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Ok, _) | (_, Self::Ok) => Self::Ok,
            (Self::Alarm, Self::Alarm) => Self::Alarm,
            _ => Self::Undetermined,
        }
    }

    /// `or` is ALARM as soon as any operand is ALARM; OK only when every
    /// operand is OK.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Alarm, _) | (_, Self::Alarm) => Self::Alarm,
            (Self::Ok, Self::Ok) => Self::Ok,
            _ => Self::Undetermined,
        }
    }
}

impl std::fmt::Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
