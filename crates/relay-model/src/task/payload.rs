use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ModelError, ModelResult};

/// Wire format of an opaque task payload.
///
/// The set is closed: every format has an explicit decode contract in
/// [`PayloadFormat::check`], and unknown tags are rejected at parse time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
    /// Arbitrary bytes; any content is accepted.
    #[default]
    Binary,
    /// UTF-8 JSON document.
    Json,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Binary => "binary",
            PayloadFormat::Json => "json",
        }
    }

    /// Verify that `data` satisfies this format's decode contract.
    ///
    /// Contents are never kept; only success or failure is reported.
    pub fn check(&self, data: &[u8]) -> ModelResult<()> {
        match self {
            PayloadFormat::Binary => Ok(()),
            PayloadFormat::Json => serde_json::from_slice::<serde_json::Value>(data)
                .map(|_| ())
                .map_err(|e| ModelError::InvalidPayload {
                    format: self.as_str(),
                    reason: e.to_string(),
                }),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "bytes" => Ok(PayloadFormat::Binary),
            "json" => Ok(PayloadFormat::Json),
            other => Err(ModelError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl Serialize for PayloadFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PayloadFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque bytes tagged with their wire format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub format: PayloadFormat,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl TaskPayload {
    pub fn new(format: PayloadFormat, data: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            data: data.into(),
        }
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(PayloadFormat::Binary, data)
    }

    /// Run the format's decode contract over the bytes.
    pub fn validate(&self) -> ModelResult<()> {
        self.format.check(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
