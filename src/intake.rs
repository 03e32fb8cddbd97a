//! Intake form state and submission.
//!
//! The form collects select values as raw strings; submission parses them,
//! validates the result and stores it as the profile the next session
//! will be opened with.

use std::str::FromStr;

use thiserror::Error;

use crate::mirror::{LocalStateMirror, MirrorError, MirrorStore};
use crate::models::{
    AgeBracket, DurationBucket, Gender, IntakeProfile, ModelError, DEFAULT_INTENSITY,
};

/// Associated symptoms offered as checkboxes.
pub const COMMON_SYMPTOMS: &[&str] = &[
    "Fever",
    "Headache",
    "Chest pain",
    "Abdominal pain",
    "Nausea",
    "Vomiting",
    "Diarrhea",
    "Constipation",
    "Cough",
    "Shortness of breath",
    "Muscle pain",
    "Joint pain",
    "Skin rash",
    "Itching",
    "Dizziness",
    "Fainting",
    "Anxiety",
    "Insomnia",
    "Fatigue",
];

/// Known conditions offered as checkboxes.
pub const KNOWN_CONDITIONS: &[&str] = &[
    "Asthma",
    "Diabetes",
    "Hypertension",
    "Hypothyroidism",
    "Hyperthyroidism",
    "Heart disease",
    "Allergies",
    "Arthritis",
    "Depression",
    "Anxiety",
];

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Invalid intake: {0}")]
    Invalid(#[from] ModelError),

    #[error("Could not store intake: {0}")]
    Mirror(#[from] MirrorError),
}

/// Intake form as the user is filling it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeDraft {
    /// Select values; empty means not answered.
    pub age_bracket: String,
    pub gender: String,
    pub duration: String,
    pub primary_symptom: String,
    pub intensity: u8,
    pub associated_symptoms: Vec<String>,
    pub known_conditions: Vec<String>,
    pub family_history: String,
}

impl Default for IntakeDraft {
    fn default() -> Self {
        Self {
            age_bracket: String::new(),
            gender: String::new(),
            duration: String::new(),
            primary_symptom: String::new(),
            intensity: DEFAULT_INTENSITY,
            associated_symptoms: Vec::new(),
            known_conditions: Vec::new(),
            family_history: String::new(),
        }
    }
}

impl IntakeDraft {
    pub fn toggle_associated_symptom(&mut self, symptom: &str, checked: bool) {
        toggle(&mut self.associated_symptoms, symptom, checked);
    }

    pub fn toggle_known_condition(&mut self, condition: &str, checked: bool) {
        toggle(&mut self.known_conditions, condition, checked);
    }

    /// Whether the submit button should be enabled.
    pub fn is_submittable(&self) -> bool {
        !self.primary_symptom.trim().is_empty()
    }

    /// Parse and validate into a profile.
    pub fn into_profile(self) -> Result<IntakeProfile, ModelError> {
        let profile = IntakeProfile {
            age_bracket: parse_select::<AgeBracket>(&self.age_bracket)?,
            gender: parse_select::<Gender>(&self.gender)?,
            primary_symptom: self.primary_symptom,
            duration: parse_select::<DurationBucket>(&self.duration)?,
            intensity: self.intensity,
            associated_symptoms: self.associated_symptoms,
            known_conditions: self.known_conditions,
            family_history: self.family_history,
        }
        .normalized();
        profile.validate()?;
        Ok(profile)
    }
}

/// Validate `draft` and store it as the current intake profile.
///
/// A new intake starts a new evaluation, so any active session id and
/// completion record left from the previous one are removed.
pub fn submit_intake<S: MirrorStore>(
    mirror: &LocalStateMirror<S>,
    draft: IntakeDraft,
) -> Result<IntakeProfile, IntakeError> {
    let profile = draft.into_profile()?;
    mirror.store_profile(&profile)?;
    mirror.clear_active_session_id()?;
    mirror.clear_completion()?;
    tracing::info!(
        intensity = profile.intensity,
        associated = profile.associated_symptoms.len(),
        conditions = profile.known_conditions.len(),
        "Intake profile stored"
    );
    Ok(profile)
}

fn parse_select<T>(raw: &str) -> Result<Option<T>, ModelError>
where
    T: FromStr<Err = ModelError>,
{
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(None)
    } else {
        T::from_str(raw).map(Some)
    }
}

fn toggle(list: &mut Vec<String>, value: &str, checked: bool) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if checked {
        if !list.iter().any(|v| v == value) {
            list.push(value.to_string());
        }
    } else {
        list.retain(|v| v != value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MemoryMirrorStore;
    use crate::models::{CompletionRecord, SessionId};

    fn draft() -> IntakeDraft {
        IntakeDraft {
            primary_symptom: " fever ".into(),
            intensity: 6,
            ..IntakeDraft::default()
        }
    }

    #[test]
    fn default_draft_starts_at_mid_intensity() {
        let d = IntakeDraft::default();
        assert_eq!(d.intensity, DEFAULT_INTENSITY);
        assert!(!d.is_submittable());
    }

    #[test]
    fn toggles_never_duplicate() {
        let mut d = draft();
        d.toggle_associated_symptom("Cough", true);
        d.toggle_associated_symptom("Cough", true);
        d.toggle_associated_symptom("Fatigue", true);
        assert_eq!(d.associated_symptoms, vec!["Cough", "Fatigue"]);

        d.toggle_associated_symptom("Cough", false);
        assert_eq!(d.associated_symptoms, vec!["Fatigue"]);

        d.toggle_known_condition("Asthma", true);
        d.toggle_known_condition("Asthma", false);
        assert!(d.known_conditions.is_empty());
    }

    #[test]
    fn selects_parse_from_service_values() {
        let profile = IntakeDraft {
            age_bracket: "31-50".into(),
            gender: "femmina".into(),
            duration: "cronico".into(),
            ..draft()
        }
        .into_profile()
        .unwrap();
        assert_eq!(profile.age_bracket, Some(AgeBracket::From31To50));
        assert_eq!(profile.gender, Some(Gender::Female));
        assert_eq!(profile.duration, Some(DurationBucket::Chronic));
        assert_eq!(profile.primary_symptom, "fever");
    }

    #[test]
    fn unknown_select_value_rejected() {
        let err = IntakeDraft {
            gender: "robot".into(),
            ..draft()
        }
        .into_profile()
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidEnum { .. }));
    }

    #[test]
    fn lists_are_deduplicated_in_order() {
        let profile = IntakeDraft {
            associated_symptoms: vec!["Cough".into(), "Nausea".into(), "Cough".into()],
            ..draft()
        }
        .into_profile()
        .unwrap();
        assert_eq!(profile.associated_symptoms, vec!["Cough", "Nausea"]);
    }

    #[test]
    fn submit_rejects_blank_symptom_and_stores_nothing() {
        let store = MemoryMirrorStore::new();
        let mirror = LocalStateMirror::new(store.clone());
        let err = submit_intake(
            &mirror,
            IntakeDraft {
                primary_symptom: "  ".into(),
                ..IntakeDraft::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, IntakeError::Invalid(ModelError::EmptyPrimarySymptom)));
        assert!(store.is_empty());
    }

    #[test]
    fn submit_replaces_previous_evaluation() {
        let mirror = LocalStateMirror::new(MemoryMirrorStore::new());
        let old = SessionId::parse("old").unwrap();
        mirror.set_active_session_id(&old).unwrap();
        mirror
            .store_completion(&CompletionRecord {
                session_id: old,
                completed_at: chrono::Utc::now().naive_utc(),
                turn_count: 4,
            })
            .unwrap();

        let profile = submit_intake(&mirror, draft()).unwrap();
        assert_eq!(mirror.load_profile().unwrap(), Some(profile));
        assert!(mirror.active_session_id().unwrap().is_none());
        assert!(mirror.load_completion().unwrap().is_none());
    }
}
