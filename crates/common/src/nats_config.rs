pub const METRICS_STREAM: &str = "VIGIL_METRICS";
pub const METRICS_SUBJECT: &str = "vigil.metrics.>";
pub const METRICS_SUBJECT_PREFIX: &str = "vigil.metrics";
pub const METRICS_CONSUMER: &str = "vigil-engine-metrics";

pub const DEFINITIONS_STREAM: &str = "VIGIL_DEFINITIONS";
pub const DEFINITIONS_SUBJECT: &str = "vigil.definitions";
pub const DEFINITIONS_CONSUMER: &str = "vigil-engine-definitions";

pub const ALARMS_STREAM: &str = "VIGIL_ALARMS";
pub const ALARMS_SUBJECT: &str = "vigil.alarms";

pub fn subject_for_source(source: &str) -> String {
    format!("{METRICS_SUBJECT_PREFIX}.{source}")
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub name: String,
    pub subjects: Vec<String>,
    pub max_bytes: i64,
    pub max_age_secs: u64,
}

impl StreamConfig {
    pub fn metrics() -> Self {
        Self {
            name: METRICS_STREAM.into(),
            subjects: vec![METRICS_SUBJECT.into()],
            max_bytes: 1_073_741_824,
            max_age_secs: 86400,
        }
    }

    pub fn definitions() -> Self {
        Self {
            name: DEFINITIONS_STREAM.into(),
            subjects: vec![DEFINITIONS_SUBJECT.into()],
            max_bytes: 268_435_456,
            max_age_secs: 86400 * 7,
        }
    }

    pub fn alarms() -> Self {
        Self {
            name: ALARMS_STREAM.into(),
            subjects: vec![ALARMS_SUBJECT.into()],
            max_bytes: 268_435_456,
            max_age_secs: 86400 * 7,
        }
    }
}
