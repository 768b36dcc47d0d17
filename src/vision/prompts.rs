//! Identification prompt shared by the hosted vision providers.
//!
//! This text is the contract with the model: the JSON keys it asks for are
//! the keys `RawIdentification` deserializes.

pub const OPENAI_MAX_TOKENS: u32 = 500;

pub const IDENTIFY_PROMPT: &str = r#"Identify this rock. Provide: name, type (igneous/sedimentary/metamorphic), confidence (0-100), brief description, and main minerals. Respond in JSON format: {"name": "", "type": "", "confidence": 0, "description": "", "minerals": []}"#;
