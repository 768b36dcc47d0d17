//! Identification result types.
//!
//! Provider output is untrusted. It is deserialized into `RawIdentification`
//! (everything optional) and only becomes a `RockIdentification` after
//! `validate` has checked presence, enum membership and the confidence range.

use crate::error::{IdentifyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rock class by formation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RockType {
    Igneous,
    Sedimentary,
    Metamorphic,
}

impl RockType {
    pub fn as_str(self) -> &'static str {
        match self {
            RockType::Igneous => "igneous",
            RockType::Sedimentary => "sedimentary",
            RockType::Metamorphic => "metamorphic",
        }
    }

    /// Guess the class from a rock name using the reference table the
    /// model server was trained against.
    pub fn infer_from_name(name: &str) -> Option<RockType> {
        const TABLE: &[(&str, RockType)] = &[
            ("granite", RockType::Igneous),
            ("basalt", RockType::Igneous),
            ("obsidian", RockType::Igneous),
            ("pumice", RockType::Igneous),
            ("limestone", RockType::Sedimentary),
            ("sandstone", RockType::Sedimentary),
            ("shale", RockType::Sedimentary),
            ("conglomerate", RockType::Sedimentary),
            ("marble", RockType::Metamorphic),
            ("slate", RockType::Metamorphic),
            ("gneiss", RockType::Metamorphic),
            ("schist", RockType::Metamorphic),
        ];
        let lower = name.to_lowercase();
        TABLE
            .iter()
            .find(|(key, _)| lower.contains(key))
            .map(|(_, rock_type)| *rock_type)
    }
}

impl FromStr for RockType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "igneous" => Ok(RockType::Igneous),
            "sedimentary" => Ok(RockType::Sedimentary),
            "metamorphic" => Ok(RockType::Metamorphic),
            other => Err(format!("unknown rock type '{}'", other)),
        }
    }
}

impl fmt::Display for RockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated identification, ready to show to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RockIdentification {
    pub name: String,
    #[serde(rename = "type")]
    pub rock_type: RockType,
    /// Percentage, always within 0..=100.
    pub confidence: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minerals: Option<Vec<String>>,
    /// Ranked alternatives, only reported by the custom model server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_predictions: Vec<Prediction>,
}

/// One ranked alternative from the custom model server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub name: String,
    pub confidence: f64,
}

/// Provider output exactly as received. Nothing is trusted yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIdentification {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub rock_type: Option<String>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
    pub minerals: Option<Vec<String>>,
    #[serde(rename = "top_3_predictions")]
    pub top_predictions: Option<Vec<Prediction>>,
}

impl RawIdentification {
    /// Check the untrusted payload and turn it into a domain value.
    pub fn validate(self) -> Result<RockIdentification> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| IdentifyError::InvalidResult("missing rock name".to_string()))?;

        let rock_type = match self.rock_type.as_deref().map(RockType::from_str) {
            Some(Ok(t)) => t,
            parsed => {
                let inferred = RockType::infer_from_name(&name).ok_or_else(|| {
                    let reason = match parsed {
                        Some(Err(e)) => e,
                        _ => "missing rock type".to_string(),
                    };
                    IdentifyError::InvalidResult(format!("{} for '{}'", reason, name))
                })?;
                log::warn!(
                    "[IDENTIFY] Upstream type {:?} not usable, inferred {} from name '{}'",
                    self.rock_type,
                    inferred,
                    name
                );
                inferred
            }
        };

        let confidence = self
            .confidence
            .ok_or_else(|| IdentifyError::InvalidResult("missing confidence".to_string()))
            .and_then(clamp_confidence)?;

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .ok_or_else(|| IdentifyError::InvalidResult("missing description".to_string()))?;

        let minerals = self.minerals.map(|list| {
            list.into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>()
        });

        let top_predictions = self
            .top_predictions
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.name.trim().is_empty())
            .map(|p| {
                Ok(Prediction {
                    name: p.name.trim().to_string(),
                    confidence: clamp_confidence(p.confidence)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RockIdentification {
            name,
            rock_type,
            confidence,
            description,
            minerals,
            top_predictions,
        })
    }
}

fn clamp_confidence(value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(IdentifyError::InvalidResult(format!(
            "confidence {} is not a number",
            value
        )));
    }
    let clamped = value.clamp(0.0, 100.0);
    if clamped != value {
        log::warn!("[IDENTIFY] Confidence {} clamped to {}", value, clamped);
    }
    Ok(clamped)
}

/// Parse provider JSON text straight into a validated result.
pub fn parse_identification(provider: &'static str, json: &str) -> Result<RockIdentification> {
    let raw: RawIdentification =
        serde_json::from_str(json.trim()).map_err(|e| IdentifyError::Parse {
            provider,
            message: format!("result is not an identification object: {}", e),
        })?;
    raw.validate()
}

/// Same as `parse_identification`, for a body that is already JSON.
pub fn identification_from_value(
    provider: &'static str,
    json: serde_json::Value,
) -> Result<RockIdentification> {
    let raw: RawIdentification =
        serde_json::from_value(json).map_err(|e| IdentifyError::Parse {
            provider,
            message: format!("result is not an identification object: {}", e),
        })?;
    raw.validate()
}
