use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier wrapper for registered age brackets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeBracketId(pub String);

impl AgeBracketId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for AgeBracketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for enrollments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(pub String);

impl EnrollmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive age range an enrollment may fall into. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBracket {
    pub id: AgeBracketId,
    pub min_age: u32,
    pub max_age: u32,
}

impl AgeBracket {
    pub fn contains(&self, age: u32) -> bool {
        self.min_age <= age && age <= self.max_age
    }
}

/// Validated bracket bounds awaiting an identifier from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAgeBracket {
    min_age: u32,
    max_age: u32,
}

impl NewAgeBracket {
    pub fn new(min_age: u32, max_age: u32) -> Result<Self, FieldError> {
        if min_age > max_age {
            return Err(FieldError::InvertedRange { min_age, max_age });
        }
        Ok(Self { min_age, max_age })
    }

    /// Parse a JSON request body of the form `{"min_age": 18, "max_age": 25}`.
    pub fn parse(body: &[u8]) -> Result<Self, FieldError> {
        let object = json_object(body)?;
        let min_age = age_field(&object, "min_age")?;
        let max_age = age_field(&object, "max_age")?;
        Self::new(min_age, max_age)
    }

    pub fn min_age(&self) -> u32 {
        self.min_age
    }

    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    pub fn with_id(self, id: AgeBracketId) -> AgeBracket {
        AgeBracket {
            id,
            min_age: self.min_age,
            max_age: self.max_age,
        }
    }
}

/// Lifecycle of an enrollment. The only transition is `Pending -> Processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,
    Processed,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processed => "PROCESSED",
        }
    }
}

/// Stored enrollment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub name: String,
    pub age: u32,
    /// External identifier; format is not checked here.
    pub cpf: String,
    pub status: EnrollmentStatus,
}

/// Structurally valid enrollment input. Age eligibility is checked separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRequest {
    pub name: String,
    pub age: u32,
    pub cpf: String,
}

impl EnrollmentRequest {
    /// Parse a JSON request body of the form `{"name": "...", "age": 22, "cpf": "..."}`.
    pub fn parse(body: &[u8]) -> Result<Self, FieldError> {
        let object = json_object(body)?;
        let name = text_field(&object, "name")?;
        let age = age_field(&object, "age")?;
        let cpf = text_field(&object, "cpf")?;
        Ok(Self { name, age, cpf })
    }

    pub fn into_enrollment(self, id: EnrollmentId) -> Enrollment {
        Enrollment {
            id,
            name: self.name,
            age: self.age,
            cpf: self.cpf,
            status: EnrollmentStatus::Pending,
        }
    }
}

/// The sole payload carried on the enrollment queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentMessage {
    pub enrollment_id: EnrollmentId,
}

impl EnrollmentMessage {
    /// JSON body published to the queue.
    pub fn to_body(&self) -> String {
        serde_json::json!({ "enrollment_id": self.enrollment_id.0 }).to_string()
    }
}

/// Structural problems with client input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("request body is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    Missing(&'static str),
    #[error("field {0} must be a non-empty string")]
    NotText(&'static str),
    #[error("field {0} must be a non-negative integer")]
    NotAnAge(&'static str),
    #[error("min_age ({min_age}) must not exceed max_age ({max_age})")]
    InvertedRange { min_age: u32, max_age: u32 },
}

fn json_object(body: &[u8]) -> Result<Map<String, Value>, FieldError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        _ => Err(FieldError::NotAnObject),
    }
}

fn text_field(object: &Map<String, Value>, field: &'static str) -> Result<String, FieldError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(FieldError::Missing(field)),
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(_) => Err(FieldError::NotText(field)),
    }
}

/// Accepts JSON integers and integer strings such as `"25"`.
fn age_field(object: &Map<String, Value>, field: &'static str) -> Result<u32, FieldError> {
    let parsed = match object.get(field) {
        None | Some(Value::Null) => return Err(FieldError::Missing(field)),
        Some(Value::Number(number)) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(text)) => text.trim().parse::<u32>().ok(),
        Some(_) => None,
    };
    parsed.ok_or(FieldError::NotAnAge(field))
}
