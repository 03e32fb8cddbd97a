//! Results page loading: completion record → service summary and
//! history → projected views.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::mirror::{LocalStateMirror, MirrorError, MirrorStore};
use crate::models::{CompletionRecord, SessionId, UrgencyTier};
use crate::orchestrator::Destination;
use crate::projector::{project, ClinicalView, LayView};
use crate::remote::{RemoteError, SessionApi};

/// Everything the results page shows for one closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsView {
    pub session_id: SessionId,
    pub start_time: NaiveDateTime,
    pub duration_minutes: i64,
    pub message_count: u32,
    pub max_urgency: UrgencyTier,
    pub lay_view: LayView,
    pub clinical_view: ClinicalView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsLoad {
    Loaded(Box<ResultsView>),
    /// No finished session on record; go somewhere else.
    Redirect(Destination),
}

/// Load the results of the most recently finished session.
///
/// A missing or unreadable completion record redirects home without
/// contacting the service.
pub fn load_results<A: SessionApi, S: MirrorStore>(
    api: &A,
    mirror: &LocalStateMirror<S>,
) -> Result<ResultsLoad, RemoteError> {
    let Some(record) = completion_record(mirror) else {
        tracing::info!("No completed session on record, redirecting home");
        return Ok(ResultsLoad::Redirect(Destination::Home));
    };

    let summary = api.fetch_summary(&record.session_id)?;
    let history = api.fetch_history(&record.session_id)?;
    let projection = project(&summary, &history);
    tracing::info!(
        session_id = %record.session_id,
        max_urgency = %summary.max_urgency,
        history_len = history.len(),
        "Results loaded"
    );

    Ok(ResultsLoad::Loaded(Box::new(ResultsView {
        session_id: summary.session_id.clone(),
        start_time: summary.start_time,
        duration_minutes: summary.duration_minutes(),
        message_count: summary.message_count,
        max_urgency: summary.max_urgency,
        lay_view: projection.lay_view,
        clinical_view: projection.clinical_view,
    })))
}

/// Discard every local trace of the previous evaluation and go back to intake.
pub fn start_new_evaluation<S: MirrorStore>(
    mirror: &LocalStateMirror<S>,
) -> Result<Destination, MirrorError> {
    mirror.clear_all()?;
    tracing::info!("Starting new evaluation");
    Ok(Destination::Intake)
}

fn completion_record<S: MirrorStore>(mirror: &LocalStateMirror<S>) -> Option<CompletionRecord> {
    match mirror.load_completion() {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, "Completion record is unreadable");
            None
        }
    }
}
