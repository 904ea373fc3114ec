//! Wizard step definitions: which fields each step owns, how they render against the
//! current registry, and how a submission is turned into record cells.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dao::models::{PLAYER_KEY, PredictionRecord, SKIPPED, TIMESTAMP_KEY};

/// Stored when the participant attached a photo to their top moment.
pub const UPLOADED: &str = "Subida ✅";
/// Stored when no photo was attached.
pub const NOT_UPLOADED: &str = "No subida";

/// Placeholder replaced by the other player's name in per-player labels.
const NAME_PLACEHOLDER: &str = "{name}";
/// Columns written by the wizard itself, never by a field.
const RESERVED_KEYS: [&str; 2] = [PLAYER_KEY, TIMESTAMP_KEY];

/// Input kind of a configured field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Single-line free text.
    Text,
    /// Multi-line free text.
    LongText,
    /// `#rrggbb` color.
    Color,
    /// One value out of a fixed list.
    Choice {
        /// Accepted values, in display order.
        options: Vec<String>,
    },
    /// Peer prediction: a registered player's name.
    Player,
    /// Photo upload status ([`UPLOADED`] / [`NOT_UPLOADED`]).
    Upload,
    /// One free-text question per other registered player; the field key is a prefix.
    AboutEachPlayer,
}

/// A field as declared in the step configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldSpec {
    /// Record column (or column prefix for [`FieldKind::AboutEachPlayer`]).
    pub key: String,
    /// Question shown to the participant; `{name}` is substituted for per-player fields.
    pub label: String,
    /// Input kind.
    pub kind: FieldKind,
    /// Whether the field may be stored as the skipped sentinel.
    #[serde(default = "default_skippable")]
    pub skippable: bool,
    /// Value written on finish when the field was never answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_skippable() -> bool {
    true
}

/// One page of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepDefinition {
    /// Stable identifier.
    pub id: String,
    /// Page heading.
    pub title: String,
    /// Owned fields, in display order.
    pub fields: Vec<FieldSpec>,
}

/// Concrete input kind once per-player fields have been expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum InputKind {
    Text,
    LongText,
    Color,
    Choice,
    Player,
    Upload,
}

/// A field resolved against a registry snapshot, ready to render or validate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ResolvedField {
    pub key: String,
    pub label: String,
    pub input: InputKind,
    pub options: Vec<String>,
    pub skippable: bool,
    pub default: Option<String>,
}

/// Registry snapshot and policy used to resolve a step for one participant.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Registered names at render time.
    pub registry: &'a [String],
    /// Participant filling the form.
    pub player: &'a str,
    /// Whether peer predictions may name the participant.
    pub allow_self_vote: bool,
}

/// Answers submitted for one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepAnswers {
    /// Submitted values keyed by column.
    pub values: IndexMap<String, String>,
    /// Columns the participant chose to skip.
    pub skipped: Vec<String>,
}

/// Reasons a step submission is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum CollectError {
    #[error("field `{key}` does not belong to step `{step}`")]
    UnknownField { step: String, key: String },
    #[error("field `{key}` cannot be skipped")]
    NotSkippable { key: String },
    #[error("`{value}` is not a valid option for `{key}`")]
    InvalidOption { key: String, value: String },
    #[error("`{value}` is not a registered player (field `{key}`)")]
    UnknownPlayer { key: String, value: String },
    #[error("field `{key}` cannot name the participant themself")]
    SelfVote { key: String },
    #[error("`{value}` is not a `#rrggbb` color (field `{key}`)")]
    InvalidColor { key: String, value: String },
}

impl FieldSpec {
    fn new(key: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            skippable: true,
            default: None,
        }
    }

    fn not_skippable(mut self) -> Self {
        self.skippable = false;
        self
    }

    fn with_default(mut self, value: &str) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Value applied on finish when the field was never written.
    fn default_value(&self) -> Option<&str> {
        match (&self.default, &self.kind) {
            (Some(value), _) => Some(value),
            (None, FieldKind::Upload) => Some(NOT_UPLOADED),
            _ => None,
        }
    }

    fn resolve(&self, ctx: &StepContext<'_>) -> Vec<ResolvedField> {
        let single = |input: InputKind, options: Vec<String>| {
            vec![ResolvedField {
                key: self.key.clone(),
                label: self.label.clone(),
                input,
                options,
                skippable: self.skippable,
                default: self.default_value().map(str::to_owned),
            }]
        };

        match &self.kind {
            FieldKind::Text => single(InputKind::Text, Vec::new()),
            FieldKind::LongText => single(InputKind::LongText, Vec::new()),
            FieldKind::Color => single(InputKind::Color, Vec::new()),
            FieldKind::Upload => single(
                InputKind::Upload,
                vec![UPLOADED.to_owned(), NOT_UPLOADED.to_owned()],
            ),
            FieldKind::Choice { options } => single(InputKind::Choice, options.clone()),
            FieldKind::Player => single(InputKind::Player, ctx.peer_options()),
            FieldKind::AboutEachPlayer => ctx
                .others()
                .map(|name| ResolvedField {
                    key: about_player_key(&self.key, name),
                    label: self.label.replace(NAME_PLACEHOLDER, name),
                    input: InputKind::LongText,
                    options: Vec::new(),
                    skippable: self.skippable,
                    default: self.default.clone(),
                })
                .collect(),
        }
    }
}

/// Record column for the "about player X" question with the given prefix.
pub fn about_player_key(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

impl<'a> StepContext<'a> {
    fn others(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        let player = self.player;
        self.registry
            .iter()
            .map(String::as_str)
            .filter(move |name| *name != player)
    }

    fn peer_options(&self) -> Vec<String> {
        if self.allow_self_vote {
            self.registry.to_vec()
        } else {
            self.others().map(str::to_owned).collect()
        }
    }
}

impl StepDefinition {
    /// Fields of this step resolved against the registry snapshot in `ctx`.
    ///
    /// A field that would land on the identity or timestamp column is dropped.
    pub fn resolve_fields(&self, ctx: &StepContext<'_>) -> Vec<ResolvedField> {
        self.fields
            .iter()
            .flat_map(|field| field.resolve(ctx))
            .filter(|field| !RESERVED_KEYS.contains(&field.key.as_str()))
            .collect()
    }

    /// Record columns owned by this step for the participant in `ctx`.
    pub fn owned_keys(&self, ctx: &StepContext<'_>) -> Vec<String> {
        self.resolve_fields(ctx)
            .into_iter()
            .map(|field| field.key)
            .collect()
    }

    /// Validate a submission and turn it into the cells this step writes.
    ///
    /// Omitted fields are not written. A key listed in `skipped` is stored as
    /// [`SKIPPED`] whatever value was sent alongside it.
    pub fn collect(
        &self,
        ctx: &StepContext<'_>,
        answers: &StepAnswers,
    ) -> Result<PredictionRecord, CollectError> {
        let fields: IndexMap<String, ResolvedField> = self
            .resolve_fields(ctx)
            .into_iter()
            .map(|field| (field.key.clone(), field))
            .collect();

        let lookup = |key: &str| {
            fields.get(key).ok_or_else(|| CollectError::UnknownField {
                step: self.id.clone(),
                key: key.to_owned(),
            })
        };

        let mut record = PredictionRecord::new();
        for (key, value) in &answers.values {
            let field = lookup(key)?;
            if answers.skipped.contains(key) {
                continue;
            }
            validate_value(field, ctx, value)?;
            record.insert(key.clone(), value.clone());
        }
        for key in &answers.skipped {
            let field = lookup(key)?;
            if !field.skippable {
                return Err(CollectError::NotSkippable { key: key.clone() });
            }
            record.insert(key.clone(), SKIPPED);
        }

        Ok(record)
    }

    /// Defaults for fields of this step that `answers` never populated.
    pub fn missing_defaults(
        &self,
        ctx: &StepContext<'_>,
        answers: &PredictionRecord,
    ) -> Vec<(String, String)> {
        self.resolve_fields(ctx)
            .into_iter()
            .filter(|field| !answers.contains_key(&field.key))
            .filter_map(|field| field.default.map(|value| (field.key, value)))
            .collect()
    }
}

fn validate_value(
    field: &ResolvedField,
    ctx: &StepContext<'_>,
    value: &str,
) -> Result<(), CollectError> {
    // An empty answer or the sentinel typed by hand are always accepted.
    if value.is_empty() || value == SKIPPED {
        return Ok(());
    }

    match field.input {
        InputKind::Text | InputKind::LongText => Ok(()),
        InputKind::Color if is_hex_color(value) => Ok(()),
        InputKind::Color => Err(CollectError::InvalidColor {
            key: field.key.clone(),
            value: value.to_owned(),
        }),
        InputKind::Choice | InputKind::Upload if field.options.iter().any(|o| o == value) => Ok(()),
        InputKind::Choice | InputKind::Upload => Err(CollectError::InvalidOption {
            key: field.key.clone(),
            value: value.to_owned(),
        }),
        InputKind::Player if value == ctx.player && !ctx.allow_self_vote => {
            Err(CollectError::SelfVote {
                key: field.key.clone(),
            })
        }
        InputKind::Player if ctx.registry.iter().any(|name| name == value) => Ok(()),
        InputKind::Player => Err(CollectError::UnknownPlayer {
            key: field.key.clone(),
            value: value.to_owned(),
        }),
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Check that steps exist, ids are unique, no column is owned by two fields and no field
/// writes the identity or timestamp column.
pub fn validate_steps(steps: &[StepDefinition]) -> Result<(), String> {
    if steps.is_empty() {
        return Err("at least one step is required".into());
    }

    let mut ids = Vec::with_capacity(steps.len());
    let mut keys: Vec<&str> = Vec::new();
    for step in steps {
        if ids.contains(&step.id.as_str()) {
            return Err(format!("duplicate step id `{}`", step.id));
        }
        ids.push(step.id.as_str());

        for field in &step.fields {
            if field.key.is_empty() {
                return Err(format!("step `{}` declares a field without key", step.id));
            }
            if keys.contains(&field.key.as_str()) {
                return Err(format!("field `{}` is declared twice", field.key));
            }
            let collides = |reserved: &&str| match field.kind {
                FieldKind::AboutEachPlayer => reserved.starts_with(field.key.as_str()),
                _ => *reserved == field.key,
            };
            if let Some(reserved) = RESERVED_KEYS.into_iter().find(collides) {
                return Err(format!(
                    "field `{}` of step `{}` may write the reserved column `{reserved}`",
                    field.key, step.id
                ));
            }
            keys.push(field.key.as_str());
        }
    }

    Ok(())
}

/// Emoji offered for the mood of the year.
fn mood_emojis() -> Vec<String> {
    ["🚀", "✨", "💸", "🏖️", "🧘", "🔥", "🌈", "📚", "🏠", "🍕"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Built-in five-step flow.
pub fn reference_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition {
            id: "past_year".into(),
            title: "📅 2025".into(),
            fields: vec![
                FieldSpec::new(
                    "Palabra 2025",
                    "Define tu 2025 en una sola palabra",
                    FieldKind::Text,
                ),
                FieldSpec::new(
                    "Momento Top 2025",
                    "¿Cuál fue el momento TOP de este año 2025?",
                    FieldKind::LongText,
                ),
                FieldSpec::new(
                    "Foto Momentos",
                    "Sube una foto de tu momento TOP (opcional)",
                    FieldKind::Upload,
                )
                .not_skippable()
                .with_default(NOT_UPLOADED),
            ],
        },
        StepDefinition {
            id: "outlook".into(),
            title: "📸 Tu Moodboard 2026".into(),
            fields: vec![
                FieldSpec::new("Mood Color", "Elige el color de tu año", FieldKind::Color)
                    .not_skippable(),
                FieldSpec::new(
                    "Mood Emoji",
                    "Emoji de tu año",
                    FieldKind::Choice {
                        options: mood_emojis(),
                    },
                )
                .not_skippable(),
                FieldSpec::new("Mood Vibe", "Año en una frase", FieldKind::Text).not_skippable(),
                FieldSpec::new(
                    "Palabra 2026",
                    "Define como sera tu 2026 en una sola palabra",
                    FieldKind::Text,
                ),
                FieldSpec::new(
                    "Expectativa 2026",
                    "¿Cómo esperas que sea 2026?",
                    FieldKind::LongText,
                ),
            ],
        },
        StepDefinition {
            id: "world".into(),
            title: "🌍 El Mundo en 2026".into(),
            fields: vec![
                FieldSpec::new(
                    "Ganador Mundial",
                    "¿Qué selección ganará el Mundial 2026?",
                    FieldKind::Text,
                ),
                FieldSpec::new(
                    "Evento Del Año",
                    "¿Cuál será la noticia mundial del año?",
                    FieldKind::LongText,
                ),
                FieldSpec::new(
                    "Tendencia Tecnologica",
                    "¿Qué tecnología lo cambiará todo en 2026?",
                    FieldKind::Text,
                ),
            ],
        },
        StepDefinition {
            id: "peer".into(),
            title: "👥 Predicciones de NPM".into(),
            fields: [
                (
                    "Noticia Importante",
                    "¿Quién crees que dará la noticia más importante en 2026?",
                ),
                ("Noticia Inesperada", "¿Quién dará la noticia más inesperada?"),
                (
                    "Relacion Sorpresa",
                    "¿Quién empezará una relación que no nos esperemos?",
                ),
                (
                    "Anecdota Surrealista",
                    "¿Quién tendrá la anécdota más surrealista?",
                ),
                ("Frase Mitica", "¿Quién dirá la frase más mítica del año?"),
                (
                    "Cambio Fisico",
                    "¿Quién va a hacer el mayor cambio físico este año?",
                ),
                ("Comprara Coche", "¿Quién se comprará un coche este año?"),
            ]
            .into_iter()
            .map(|(key, label)| FieldSpec::new(key, label, FieldKind::Player))
            .collect(),
        },
        StepDefinition {
            id: "individual".into(),
            title: "🧪 Análisis Personalizado".into(),
            fields: vec![FieldSpec::new(
                "Sobre ",
                "¿Qué crees que hará o cómo le irá a {name} este año?",
                FieldKind::AboutEachPlayer,
            )],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn ctx<'a>(registry: &'a [String], player: &'a str) -> StepContext<'a> {
        StepContext {
            registry,
            player,
            allow_self_vote: true,
        }
    }

    fn answers(values: &[(&str, &str)], skipped: &[&str]) -> StepAnswers {
        StepAnswers {
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            skipped: skipped.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn step(id: &str) -> StepDefinition {
        reference_steps()
            .into_iter()
            .find(|step| step.id == id)
            .unwrap()
    }

    #[test]
    fn reference_flow_is_valid() {
        let steps = reference_steps();
        assert_eq!(steps.len(), 5);
        validate_steps(&steps).unwrap();
    }

    #[test]
    fn about_each_player_follows_current_registry_and_excludes_self() {
        let individual = step("individual");

        let before = registry(&["Ana", "Luis"]);
        assert_eq!(individual.owned_keys(&ctx(&before, "Ana")), vec!["Sobre Luis"]);

        let after = registry(&["Ana", "Luis", "Marta"]);
        let fields = individual.resolve_fields(&ctx(&after, "Ana"));
        assert_eq!(
            fields.iter().map(|f| f.key.as_str()).collect::<Vec<_>>(),
            vec!["Sobre Luis", "Sobre Marta"]
        );
        assert_eq!(
            fields[1].label,
            "¿Qué crees que hará o cómo le irá a Marta este año?"
        );
    }

    #[test]
    fn skipped_fields_store_the_sentinel() {
        let past = step("past_year");
        let names = registry(&["Ana"]);
        let record = past
            .collect(
                &ctx(&names, "Ana"),
                &answers(&[("Palabra 2025", "Caos"), ("Momento Top 2025", "ignored")], &["Momento Top 2025"]),
            )
            .unwrap();

        assert_eq!(record.get("Palabra 2025"), Some("Caos"));
        assert_eq!(record.get("Momento Top 2025"), Some(SKIPPED));
        assert!(!record.contains_key("Foto Momentos"));
    }

    #[test]
    fn foreign_keys_are_rejected() {
        let past = step("past_year");
        let names = registry(&["Ana"]);
        let err = past
            .collect(&ctx(&names, "Ana"), &answers(&[("Palabra 2026", "x")], &[]))
            .unwrap_err();
        assert!(matches!(err, CollectError::UnknownField { .. }));
    }

    #[test]
    fn peer_predictions_must_name_registered_players() {
        let peer = step("peer");
        let names = registry(&["Ana", "Luis"]);
        let context = ctx(&names, "Ana");

        peer.collect(&context, &answers(&[("Comprara Coche", "Luis")], &[]))
            .unwrap();
        peer.collect(&context, &answers(&[("Comprara Coche", "")], &[]))
            .unwrap();
        peer.collect(&context, &answers(&[("Comprara Coche", SKIPPED)], &[]))
            .unwrap();

        let err = peer
            .collect(&context, &answers(&[("Comprara Coche", "Pepe")], &[]))
            .unwrap_err();
        assert!(matches!(err, CollectError::UnknownPlayer { .. }));
    }

    #[test]
    fn self_vote_follows_policy() {
        let peer = step("peer");
        let names = registry(&["Ana", "Luis"]);
        let mut context = ctx(&names, "Ana");

        peer.collect(&context, &answers(&[("Frase Mitica", "Ana")], &[]))
            .unwrap();

        context.allow_self_vote = false;
        let err = peer
            .collect(&context, &answers(&[("Frase Mitica", "Ana")], &[]))
            .unwrap_err();
        assert_eq!(
            err,
            CollectError::SelfVote {
                key: "Frase Mitica".into()
            }
        );
        let options = &peer.resolve_fields(&context)[0].options;
        assert_eq!(options, &vec!["Luis".to_string()]);
    }

    #[test]
    fn choices_colors_and_skips_are_validated() {
        let outlook = step("outlook");
        let names = registry(&["Ana"]);
        let context = ctx(&names, "Ana");

        outlook
            .collect(&context, &answers(&[("Mood Emoji", "🔥"), ("Mood Color", "#ff4b2b")], &[]))
            .unwrap();
        assert!(matches!(
            outlook.collect(&context, &answers(&[("Mood Emoji", "🦀")], &[])),
            Err(CollectError::InvalidOption { .. })
        ));
        assert!(matches!(
            outlook.collect(&context, &answers(&[("Mood Color", "red")], &[])),
            Err(CollectError::InvalidColor { .. })
        ));
        assert!(matches!(
            outlook.collect(&context, &answers(&[], &["Mood Vibe"])),
            Err(CollectError::NotSkippable { .. })
        ));
    }

    #[test]
    fn upload_defaults_to_not_uploaded() {
        let past = step("past_year");
        let names = registry(&["Ana"]);
        let context = ctx(&names, "Ana");

        let answered: PredictionRecord = [("Palabra 2025", "Caos")].into_iter().collect();
        assert_eq!(
            past.missing_defaults(&context, &answered),
            vec![("Foto Momentos".to_string(), NOT_UPLOADED.to_string())]
        );

        let uploaded: PredictionRecord = [("Foto Momentos", UPLOADED)].into_iter().collect();
        assert!(past.missing_defaults(&context, &uploaded).is_empty());
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let mut steps = reference_steps();
        let duplicate = steps[0].fields[0].clone();
        steps[2].fields.push(duplicate);
        assert!(validate_steps(&steps).is_err());
        assert!(validate_steps(&[]).is_err());
    }

    #[test]
    fn identity_and_timestamp_columns_are_reserved() {
        for key in [PLAYER_KEY, TIMESTAMP_KEY] {
            let mut steps = reference_steps();
            steps[0].fields.push(FieldSpec::new(key, "Quién", FieldKind::Text));
            assert!(validate_steps(&steps).is_err(), "{key} accepted as a field");
        }

        let mut steps = reference_steps();
        steps[4].fields[0].key = "Jug".into();
        assert!(validate_steps(&steps).is_err());
    }

    #[test]
    fn reserved_columns_are_never_collected() {
        let sneaky = StepDefinition {
            id: "sneaky".into(),
            title: "Sneaky".into(),
            fields: vec![
                FieldSpec::new(PLAYER_KEY, "Quién", FieldKind::Text),
                FieldSpec::new("Jug", "Sobre {name}", FieldKind::AboutEachPlayer),
            ],
        };
        let names = registry(&["Ana", "ador", "Luis"]);
        let context = ctx(&names, "Ana");

        assert_eq!(sneaky.owned_keys(&context), vec!["JugLuis"]);
        let err = sneaky
            .collect(&context, &answers(&[(PLAYER_KEY, "Luis")], &[]))
            .unwrap_err();
        assert!(matches!(err, CollectError::UnknownField { .. }));
    }

    #[test]
    fn step_definitions_deserialize_from_config() {
        let json = r#"{
            "id": "uno",
            "title": "Uno",
            "fields": [
                {"key": "PalabraYear", "label": "Palabra", "kind": {"type": "text"}},
                {"key": "Emoji", "label": "Emoji", "kind": {"type": "choice", "options": ["a", "b"]}, "skippable": false}
            ]
        }"#;
        let step: StepDefinition = serde_json::from_str(json).unwrap();
        assert!(step.fields[0].skippable);
        assert_eq!(
            step.fields[1].kind,
            FieldKind::Choice {
                options: vec!["a".into(), "b".into()]
            }
        );
    }
}
