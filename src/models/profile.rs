use serde::{Deserialize, Serialize};

use super::enums::{AgeBracket, DurationBucket, Gender};
use super::ModelError;

pub const MIN_INTENSITY: u8 = 1;
pub const MAX_INTENSITY: u8 = 10;
/// Slider position the intake form starts at.
pub const DEFAULT_INTENSITY: u8 = 5;

/// Structured intake answers describing the health concern.
///
/// Built by intake submission, stored in the local mirror, and attached
/// to exactly one remote session. Only the primary symptom is mandatory;
/// the select fields stay `None` when the user skipped them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeProfile {
    pub age_bracket: Option<AgeBracket>,
    pub gender: Option<Gender>,
    pub primary_symptom: String,
    pub duration: Option<DurationBucket>,
    pub intensity: u8,
    #[serde(default)]
    pub associated_symptoms: Vec<String>,
    #[serde(default)]
    pub known_conditions: Vec<String>,
    #[serde(default)]
    pub family_history: String,
}

impl IntakeProfile {
    /// Minimal valid profile with everything optional left empty.
    pub fn new(primary_symptom: &str, intensity: u8) -> Result<Self, ModelError> {
        let profile = Self {
            age_bracket: None,
            gender: None,
            primary_symptom: primary_symptom.trim().to_string(),
            duration: None,
            intensity,
            associated_symptoms: Vec::new(),
            known_conditions: Vec::new(),
            family_history: String::new(),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Check the invariants a profile must hold before it reaches a session.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.primary_symptom.trim().is_empty() {
            return Err(ModelError::EmptyPrimarySymptom);
        }
        if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&self.intensity) {
            return Err(ModelError::IntensityOutOfRange(i64::from(self.intensity)));
        }
        Ok(())
    }

    /// Return a copy with trimmed text and deduplicated symptom/condition sets.
    pub fn normalized(mut self) -> Self {
        self.primary_symptom = self.primary_symptom.trim().to_string();
        self.family_history = self.family_history.trim().to_string();
        self.associated_symptoms = dedupe_preserving_order(self.associated_symptoms);
        self.known_conditions = dedupe_preserving_order(self.known_conditions);
        self
    }
}

/// Drop blank entries and repeated values, keeping the first occurrence.
pub fn dedupe_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_primary_symptom() {
        let profile = IntakeProfile::new("  fever ", 6).unwrap();
        assert_eq!(profile.primary_symptom, "fever");
        assert_eq!(profile.intensity, 6);
    }

    #[test]
    fn blank_primary_symptom_rejected() {
        assert_eq!(
            IntakeProfile::new("   ", 5).unwrap_err(),
            ModelError::EmptyPrimarySymptom
        );
    }

    #[test]
    fn intensity_bounds() {
        assert!(IntakeProfile::new("cough", 1).is_ok());
        assert!(IntakeProfile::new("cough", 10).is_ok());
        assert_eq!(
            IntakeProfile::new("cough", 0).unwrap_err(),
            ModelError::IntensityOutOfRange(0)
        );
        assert_eq!(
            IntakeProfile::new("cough", 11).unwrap_err(),
            ModelError::IntensityOutOfRange(11)
        );
    }

    #[test]
    fn normalized_dedupes_sets() {
        let mut profile = IntakeProfile::new("headache", 4).unwrap();
        profile.associated_symptoms = vec![
            "Nausea".into(),
            "Dizziness".into(),
            "Nausea".into(),
            " ".into(),
        ];
        profile.known_conditions = vec!["Asthma".into(), "Asthma".into()];
        let profile = profile.normalized();
        assert_eq!(profile.associated_symptoms, vec!["Nausea", "Dizziness"]);
        assert_eq!(profile.known_conditions, vec!["Asthma"]);
    }

    #[test]
    fn deserializes_without_optional_lists() {
        let json = r#"{
            "age_bracket": "31-50",
            "gender": "preferisco-non-dire",
            "primary_symptom": "fever",
            "duration": null,
            "intensity": 6
        }"#;
        let profile: IntakeProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.gender, Some(Gender::PreferNotToSay));
        assert!(profile.associated_symptoms.is_empty());
        assert!(profile.family_history.is_empty());
    }
}
