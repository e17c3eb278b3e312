use std::str::FromStr;

/// How the definition set is kept in sync: consuming discrete change events
/// from the definitions stream, or polling the definition API for full
/// snapshots and diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionMode {
    Stream,
    Poll,
}

impl FromStr for DefinitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream" => Ok(Self::Stream),
            "poll" => Ok(Self::Poll),
            _ => Err(format!("unknown definition mode: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub nats_url: String,
    pub api_addr: String,
    pub batch_size: usize,
    pub check_alarm_interval_secs: u64,
    pub definition_mode: DefinitionMode,
    pub definition_api_url: String,
    pub check_definition_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://127.0.0.1:4222".into(),
            api_addr: "0.0.0.0:9091".into(),
            batch_size: 50,
            check_alarm_interval_secs: 60,
            definition_mode: DefinitionMode::Stream,
            definition_api_url: "http://127.0.0.1:8080/v2/alarm-definitions".into(),
            check_definition_interval_secs: 120,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            nats_url: env_or("NATS_URL", defaults.nats_url),
            api_addr: env_or("ENGINE_API_ADDR", defaults.api_addr),
            batch_size: env_parsed("BATCH_SIZE", defaults.batch_size),
            check_alarm_interval_secs: env_parsed(
                "CHECK_ALARM_INTERVAL_SECS",
                defaults.check_alarm_interval_secs,
            ),
            definition_mode: env_parsed("DEFINITION_MODE", defaults.definition_mode),
            definition_api_url: env_or("DEFINITION_API_URL", defaults.definition_api_url),
            check_definition_interval_secs: env_parsed(
                "CHECK_DEFINITION_INTERVAL_SECS",
                defaults.check_definition_interval_secs,
            ),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
