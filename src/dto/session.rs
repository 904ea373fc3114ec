use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    dto::{format_system_time, validation::validate_player_name},
    state::{
        FormSession,
        steps::{InputKind, ResolvedField, StepAnswers, StepContext},
        wizard::WizardPhase,
    },
};

/// Chooses the participant filling the form.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartSessionRequest {
    /// Registered name of the participant.
    #[validate(custom(function = "validate_player_name"))]
    pub player: String,
}

/// Answers submitted with a Next / Previous / Finish transition.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StepSubmission {
    /// Values keyed by record column. Omitted columns are left untouched.
    #[serde(default)]
    pub answers: IndexMap<String, String>,
    /// Columns the participant chose not to answer.
    #[serde(default)]
    pub skipped: Vec<String>,
}

impl From<StepSubmission> for StepAnswers {
    fn from(value: StepSubmission) -> Self {
        Self {
            values: value.answers,
            skipped: value.skipped,
        }
    }
}

/// Coarse phase reported to clients.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// No participant chosen yet.
    Unset,
    /// Filling one of the steps.
    Step,
    /// Last participant finished.
    Complete,
}

impl From<WizardPhase> for PhaseKind {
    fn from(value: WizardPhase) -> Self {
        match value {
            WizardPhase::Unset => Self::Unset,
            WizardPhase::Step(_) => Self::Step,
            WizardPhase::Complete => Self::Complete,
        }
    }
}

/// A field of the current step, with the value saved so far in the session.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct FieldView {
    /// Record column written by this field.
    pub key: String,
    /// Question shown to the participant.
    pub label: String,
    /// Widget kind.
    pub input: InputKind,
    /// Accepted values for choice, player and upload fields.
    pub options: Vec<String>,
    /// Whether the field may be skipped.
    pub skippable: bool,
    /// Answer saved so far in the session.
    pub value: Option<String>,
    /// Value written on finish when left unanswered.
    pub default: Option<String>,
}

impl FieldView {
    fn new(field: ResolvedField, value: Option<&str>) -> Self {
        Self {
            key: field.key,
            label: field.label,
            input: field.input,
            options: field.options,
            skippable: field.skippable,
            value: value.map(str::to_owned),
            default: field.default,
        }
    }
}

/// The current step rendered against the registry at request time.
#[derive(Debug, Serialize, ToSchema)]
pub struct StepView {
    /// 1-based position.
    pub index: usize,
    /// Step identifier.
    pub id: String,
    /// Page heading.
    pub title: String,
    /// Fields in display order.
    pub fields: Vec<FieldView>,
    /// Whether Previous is allowed.
    pub can_go_back: bool,
    /// Whether the step is finished with Finish rather than Next.
    pub is_last: bool,
}

/// Full state of a form session.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    /// Session identifier.
    pub id: Uuid,
    /// Wizard phase.
    pub phase: PhaseKind,
    /// Current 1-based step.
    pub step: Option<usize>,
    /// Number of steps in the flow.
    pub total_steps: usize,
    /// Participant filling the form.
    pub player: Option<String>,
    /// Answers gathered so far, identity included.
    pub answers: IndexMap<String, String>,
    /// Current step, when on one.
    pub current: Option<StepView>,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last transition time, RFC 3339.
    pub updated_at: String,
}

impl SessionView {
    /// Render `session`, resolving the current step against `registry`.
    pub fn build(session: &FormSession, config: &AppConfig, registry: &[String]) -> Self {
        let current = session.current_step().and_then(|index| {
            let step = config.step(index)?;
            let player = session.player()?;
            let ctx = StepContext {
                registry,
                player,
                allow_self_vote: config.allow_self_vote(),
            };
            let fields = step
                .resolve_fields(&ctx)
                .into_iter()
                .map(|field| {
                    let value = session.answers().get(&field.key);
                    FieldView::new(field, value)
                })
                .collect();

            Some(StepView {
                index,
                id: step.id.clone(),
                title: step.title.clone(),
                fields,
                can_go_back: index > 1,
                is_last: index == session.total_steps(),
            })
        });

        Self {
            id: session.id(),
            phase: session.phase().into(),
            step: session.current_step(),
            total_steps: session.total_steps(),
            player: session.player().map(str::to_owned),
            answers: session.answers().fields().clone(),
            current,
            created_at: format_system_time(session.created_at()),
            updated_at: format_system_time(session.updated_at()),
        }
    }
}

/// Result of a Next / Previous transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    /// Whether the merged answers reached the store.
    pub saved: bool,
    pub session: SessionView,
}

/// Result of the Finish transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinishResponse {
    /// Whether the final record reached the store.
    pub saved: bool,
    /// Record written for the participant, defaults included.
    pub record: IndexMap<String, String>,
    /// Session after the reset.
    pub session: SessionView,
}
