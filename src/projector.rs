//! Summary projection: turns the service's session summary and history
//! into the two result views, one for the person who took the evaluation
//! and one for a clinician.
//!
//! Everything here is a fixed lookup or template. The same inputs always
//! produce the same output; nothing is generated or fetched.

use serde::{Deserialize, Serialize};

use crate::models::{SessionSummary, Turn, UrgencyTier};

pub const NO_SYMPTOMS_PLACEHOLDER: &str = "No specific symptoms recorded";
pub const NO_RISK_FACTORS_PLACEHOLDER: &str = "No significant risk factors identified";
pub const FOLLOW_UP: &str =
    "Clinical reassessment recommended if symptoms persist or worsen.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayView {
    pub recommendations: Vec<String>,
    pub urgency_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalView {
    /// Five lines: start date, duration, user turns, symptoms, max urgency.
    pub clinical_notes: Vec<String>,
    pub risk_factors: Vec<String>,
    pub follow_up: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryProjection {
    pub lay_view: LayView,
    pub clinical_view: ClinicalView,
}

/// Project a closed session into both audience views.
pub fn project(summary: &SessionSummary, history: &[Turn]) -> SummaryProjection {
    SummaryProjection {
        lay_view: LayView {
            recommendations: recommendations(summary.max_urgency),
            urgency_message: urgency_message(summary.max_urgency).to_string(),
        },
        clinical_view: ClinicalView {
            clinical_notes: clinical_notes(summary, history),
            risk_factors: risk_factors(summary),
            follow_up: FOLLOW_UP.to_string(),
        },
    }
}

/// Lay guidance for a tier. `Unknown` gets the self-care set.
pub fn recommendations(tier: UrgencyTier) -> Vec<String> {
    let items: &[&str] = match tier {
        UrgencyTier::High => &[
            "Contact emergency services (118) or your physician now",
            "Do not drive yourself; ask someone to accompany you",
            "Keep a list of your symptoms and medications at hand",
            "If symptoms worsen suddenly, go to the nearest emergency department",
        ],
        UrgencyTier::Medium => &[
            "Monitor your symptoms over the next 24-48 hours",
            "Contact your physician if symptoms persist or worsen",
            "Rest and stay well hydrated",
            "Note any new symptoms and when they appear",
        ],
        UrgencyTier::Low | UrgencyTier::Unknown => &[
            "Rest and stay well hydrated",
            "Monitor how your symptoms evolve",
            "Consult your physician if symptoms do not improve within a few days",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

pub fn urgency_message(tier: UrgencyTier) -> &'static str {
    match tier {
        UrgencyTier::High => {
            "Your symptoms may need prompt medical attention. Seek care as soon as possible."
        }
        UrgencyTier::Medium => {
            "Your symptoms should be monitored. Consider contacting your physician."
        }
        UrgencyTier::Low => "Your symptoms appear manageable with self-care.",
        UrgencyTier::Unknown => "Evaluation completed.",
    }
}

fn clinical_notes(summary: &SessionSummary, history: &[Turn]) -> Vec<String> {
    // History is capped by the service; prefer its exact count.
    let user_turns = summary
        .user_message_count
        .map(|n| n as usize)
        .unwrap_or_else(|| history.iter().filter(|t| t.is_user()).count());
    let symptoms = if summary.symptoms_mentioned.is_empty() {
        NO_SYMPTOMS_PLACEHOLDER.to_string()
    } else {
        summary.symptoms_mentioned.join(", ")
    };

    vec![
        format!(
            "Evaluation session started on {}",
            summary.start_time.format("%Y-%m-%d")
        ),
        format!("Session duration: {} minutes", summary.duration_minutes()),
        format!("User messages: {user_turns}"),
        format!("Symptoms mentioned: {symptoms}"),
        format!("Maximum urgency level: {}", summary.max_urgency),
    ]
}

fn risk_factors(summary: &SessionSummary) -> Vec<String> {
    if !summary.known_conditions.is_empty() {
        return summary.known_conditions.clone();
    }
    match &summary.profile_snapshot {
        Some(profile) if !profile.known_conditions.is_empty() => {
            profile.known_conditions.clone()
        }
        _ => vec![NO_RISK_FACTORS_PLACEHOLDER.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntakeProfile, Role, SessionId, TurnId};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn summary(tier: UrgencyTier) -> SessionSummary {
        SessionSummary {
            session_id: SessionId::parse("s-1").unwrap(),
            start_time: at(10, 0, 0),
            end_time: at(10, 7, 59),
            message_count: 5,
            max_urgency: tier,
            symptoms_mentioned: vec!["fever".into(), "chills".into()],
            user_message_count: None,
            known_conditions: Vec::new(),
            profile_snapshot: None,
        }
    }

    fn turn(id: &str, role: Role) -> Turn {
        Turn {
            id: TurnId::Server(id.into()),
            role,
            content: String::new(),
            timestamp: at(10, 0, 0),
            urgency: None,
            next_questions: Vec::new(),
        }
    }

    fn history() -> Vec<Turn> {
        vec![
            turn("a", Role::Assistant),
            turn("b", Role::User),
            turn("c", Role::Assistant),
            turn("d", Role::User),
            turn("e", Role::Assistant),
        ]
    }

    #[test]
    fn high_tier_yields_urgent_set_whatever_the_history() {
        let with_history = project(&summary(UrgencyTier::High), &history());
        let without = project(&summary(UrgencyTier::High), &[]);
        assert_eq!(with_history.lay_view.recommendations.len(), 4);
        assert_eq!(
            with_history.lay_view.recommendations,
            without.lay_view.recommendations
        );
        assert!(with_history.lay_view.recommendations[0].contains("emergency services"));
    }

    #[test]
    fn recommendation_set_sizes() {
        assert_eq!(recommendations(UrgencyTier::Medium).len(), 4);
        assert_eq!(recommendations(UrgencyTier::Low).len(), 3);
        assert_eq!(
            recommendations(UrgencyTier::Unknown),
            recommendations(UrgencyTier::Low)
        );
    }

    #[test]
    fn unknown_tier_gets_neutral_message() {
        assert_eq!(urgency_message(UrgencyTier::Unknown), "Evaluation completed.");
    }

    #[test]
    fn clinical_notes_in_fixed_order() {
        let notes = project(&summary(UrgencyTier::Medium), &history())
            .clinical_view
            .clinical_notes;
        assert_eq!(
            notes,
            vec![
                "Evaluation session started on 2026-03-01",
                "Session duration: 7 minutes",
                "User messages: 2",
                "Symptoms mentioned: fever, chills",
                "Maximum urgency level: medium",
            ]
        );
    }

    #[test]
    fn empty_symptoms_use_placeholder() {
        let mut s = summary(UrgencyTier::Low);
        s.symptoms_mentioned.clear();
        let notes = project(&s, &[]).clinical_view.clinical_notes;
        assert_eq!(notes[3], format!("Symptoms mentioned: {NO_SYMPTOMS_PLACEHOLDER}"));
        assert_eq!(notes[2], "User messages: 0");
    }

    #[test]
    fn risk_factors_from_known_conditions() {
        let mut s = summary(UrgencyTier::Low);
        assert_eq!(
            project(&s, &[]).clinical_view.risk_factors,
            vec![NO_RISK_FACTORS_PLACEHOLDER]
        );

        let mut profile = IntakeProfile::new("fever", 6).unwrap();
        profile.known_conditions = vec!["Asthma".into(), "Diabetes".into()];
        s.profile_snapshot = Some(profile);
        assert_eq!(
            project(&s, &[]).clinical_view.risk_factors,
            vec!["Asthma", "Diabetes"]
        );
    }

    #[test]
    fn user_message_count_prefers_service_total() {
        let mut s = summary(UrgencyTier::Low);
        s.user_message_count = Some(60);
        let notes = project(&s, &history()).clinical_view.clinical_notes;
        assert_eq!(notes[2], "User messages: 60");
    }

    #[test]
    fn risk_factors_survive_incomplete_profile() {
        let mut s = summary(UrgencyTier::Low);
        s.known_conditions = vec!["Hypertension".into()];
        assert!(s.profile_snapshot.is_none());
        assert_eq!(
            project(&s, &[]).clinical_view.risk_factors,
            vec!["Hypertension"]
        );
    }

    #[test]
    fn projection_is_deterministic() {
        let s = summary(UrgencyTier::High);
        let a = serde_json::to_string(&project(&s, &history())).unwrap();
        let b = serde_json::to_string(&project(&s, &history())).unwrap();
        assert_eq!(a, b);
        assert_eq!(project(&s, &[]).clinical_view.follow_up, FOLLOW_UP);
    }
}
