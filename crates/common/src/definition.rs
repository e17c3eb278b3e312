use serde::{Deserialize, Serialize};

/// A user-authored alarm definition as it arrives from the definition
/// source (change stream or listing endpoint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlarmDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub expression: String,
    #[serde(default)]
    pub match_by: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub ok_actions: Vec<String>,
    #[serde(default)]
    pub alarm_actions: Vec<String>,
    #[serde(default)]
    pub undetermined_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A discrete mutation of the definition set, as carried on the
/// definitions stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionChange {
    Create(AlarmDefinition),
    Update(AlarmDefinition),
    Delete { id: String },
}

#[derive(Debug)]
pub enum DefinitionError {
    Json(String),
    MissingField(&'static str),
    UnknownRequest(String),
}

impl std::fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "json: {e}"),
            Self::MissingField(name) => write!(f, "missing or empty field: {name}"),
            Self::UnknownRequest(r) => write!(f, "unknown request type: {r}"),
        }
    }
}

impl std::error::Error for DefinitionError {}

impl AlarmDefinition {
    /// Fail-closed decoding: anything that does not match the schema, or
    /// carries an empty `id`/`name`/`expression`, is rejected.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, DefinitionError> {
        let def: AlarmDefinition = serde_json::from_value(value.clone())
            .map_err(|e| DefinitionError::Json(e.to_string()))?;
        def.validate()?;
        Ok(def)
    }

    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let def: AlarmDefinition =
            serde_json::from_str(json).map_err(|e| DefinitionError::Json(e.to_string()))?;
        def.validate()?;
        Ok(def)
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.is_empty() {
            return Err(DefinitionError::MissingField("id"));
        }
        if self.name.is_empty() {
            return Err(DefinitionError::MissingField("name"));
        }
        if self.expression.is_empty() {
            return Err(DefinitionError::MissingField("expression"));
        }
        Ok(())
    }

    /// The action list selected for a given alarm state name.
    pub fn actions_for(&self, state: &str) -> &[String] {
        match state {
            "OK" => &self.ok_actions,
            "ALARM" => &self.alarm_actions,
            _ => &self.undetermined_actions,
        }
    }
}

/// Decodes one change record: `{"request": "POST"|"PUT"|"DEL", ...definition}`.
/// DEL records only need an `id`; the others must carry a full definition.
pub fn decode_change(json: &str) -> Result<DefinitionChange, DefinitionError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| DefinitionError::Json(e.to_string()))?;
    let request = value
        .get("request")
        .and_then(|r| r.as_str())
        .ok_or(DefinitionError::MissingField("request"))?;
    match request {
        "POST" => Ok(DefinitionChange::Create(AlarmDefinition::from_value(&value)?)),
        "PUT" => Ok(DefinitionChange::Update(AlarmDefinition::from_value(&value)?)),
        "DEL" => {
            let id = value
                .get("id")
                .and_then(|i| i.as_str())
                .filter(|i| !i.is_empty())
                .ok_or(DefinitionError::MissingField("id"))?;
            Ok(DefinitionChange::Delete { id: id.to_string() })
        }
        other => Err(DefinitionError::UnknownRequest(other.to_string())),
    }
}
