//! Generation client: asks the content model for topics, questions, locations
//! and leaderboards, validates what comes back, caches good results and falls
//! back to locally synthesized content otherwise.
//!
//! Each fetch makes at most one model request. Every failure (transport,
//! status, unparsable or wrongly shaped payload) ends in the fallback path,
//! so callers always get correctly shaped, exactly sized content.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::cache::{leaderboard_key, location_key, topics_key, CacheStore};
use crate::config::{GenerationSettings, Prompts};
use crate::domain::{
  difficulty_for_level, level_at, theme_for_level, BackgroundTheme, Difficulty, InteractableItem,
  LeaderboardEntry, Location, LocationExit, Question, QuestionType, Topic, TypeDistribution, WordDetail,
  MAX_START_LEVEL,
};
use crate::fallback::{fallback_leaderboard, fallback_location, synthesize};
use crate::ids::IdSource;
use crate::model::{ContentModel, GenerationRequest, ModelError};
use crate::schema::{placeholder_options, FieldKind, PLACEHOLDER_OPTIONS, FieldSpec, RecordSchema, Validated};
use crate::util::{fill_template, strip_code_fence, trunc_for_log};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
  #[error("no content model configured")]
  Unavailable,
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error("payload is not JSON: {0}")]
  Parse(String),
  #[error("payload has the wrong shape: {0}")]
  Shape(String),
}

pub struct GenerationClient {
  model: Option<Arc<dyn ContentModel>>,
  cache: CacheStore,
  ids: Arc<dyn IdSource>,
  prompts: Prompts,
  settings: GenerationSettings,
}

// --- Record schemas ---

fn topic_schema() -> RecordSchema {
  RecordSchema {
    name: "topics",
    wrappers: &["items", "topics"],
    fields: vec![
      FieldSpec::required("name", FieldKind::String),
      FieldSpec::optional("description", FieldKind::String, json!("")),
      FieldSpec::optional("icon", FieldKind::String, json!("📘")),
    ],
  }
}

fn question_schema() -> RecordSchema {
  RecordSchema {
    name: "questions",
    wrappers: &["items", "questions"],
    fields: vec![
      FieldSpec::optional("type", FieldKind::Enum(&QuestionType::ALL), json!("Reading")),
      FieldSpec::required("question", FieldKind::String),
      FieldSpec::optional("options", FieldKind::StringList, placeholder_options()),
      FieldSpec::required("correctAnswer", FieldKind::String),
      FieldSpec::optional("explanation", FieldKind::String, json!("")),
      FieldSpec::optional("vietnameseTranslation", FieldKind::String, Value::Null),
      FieldSpec::optional("listeningText", FieldKind::String, Value::Null),
    ],
  }
}

fn word_schema() -> RecordSchema {
  RecordSchema {
    name: "wordDetail",
    wrappers: &[],
    fields: vec![
      FieldSpec::required("english", FieldKind::String),
      FieldSpec::required("vietnamese", FieldKind::String),
      FieldSpec::optional("ipa", FieldKind::String, json!("")),
      FieldSpec::optional("partOfSpeech", FieldKind::String, json!("")),
      FieldSpec::optional("usagePatterns", FieldKind::StringList, json!([])),
      FieldSpec::optional("description", FieldKind::String, json!("")),
      FieldSpec::optional("exampleSentence", FieldKind::String, Value::Null),
    ],
  }
}

fn location_schema() -> RecordSchema {
  let item = RecordSchema {
    name: "item",
    wrappers: &[],
    fields: vec![
      FieldSpec::required("name", FieldKind::String),
      FieldSpec::optional("emoji", FieldKind::String, json!("📦")),
      FieldSpec::required("wordDetail", FieldKind::Object(word_schema())),
    ],
  };
  let exit = RecordSchema {
    name: "exit",
    wrappers: &[],
    fields: vec![
      FieldSpec::required("direction", FieldKind::String),
      FieldSpec::required("targetLocationName", FieldKind::String),
      FieldSpec::optional("emoji", FieldKind::String, json!("🚪")),
    ],
  };
  RecordSchema {
    name: "location",
    wrappers: &[],
    fields: vec![
      FieldSpec::optional("name", FieldKind::String, Value::Null),
      FieldSpec::optional("description", FieldKind::String, json!("")),
      FieldSpec::required("items", FieldKind::ObjectList(item)),
      FieldSpec::required("exits", FieldKind::ObjectList(exit)),
      FieldSpec::optional("backgroundTheme", FieldKind::Enum(&BackgroundTheme::ALL), json!("neutral")),
    ],
  }
}

fn leaderboard_schema() -> RecordSchema {
  RecordSchema {
    name: "leaderboard",
    wrappers: &["items", "entries", "leaderboard"],
    fields: vec![
      FieldSpec::required("name", FieldKind::String),
      FieldSpec::optional("avatar", FieldKind::String, json!("🙂")),
      FieldSpec::required("xp", FieldKind::Integer),
      FieldSpec::optional("country", FieldKind::String, json!("🌍")),
    ],
  }
}

// --- Drafts: what the model contributes before we stamp our own fields ---

#[derive(Deserialize)]
struct TopicDraft {
  name: String,
  description: String,
  icon: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDraft {
  name: String,
  emoji: String,
  word_detail: WordDetail,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationDraft {
  name: Option<String>,
  description: String,
  items: Vec<Value>,
  exits: Vec<Value>,
  background_theme: BackgroundTheme,
}

/// Decode normalized maps, dropping any that still do not fit `T`.
fn decode_records<T: DeserializeOwned>(records: Vec<Map<String, Value>>) -> Vec<T> {
  records
    .into_iter()
    .filter_map(|m| serde_json::from_value::<T>(Value::Object(m)).ok())
    .collect()
}

fn distribution_text(distribution: Option<TypeDistribution>, count: usize) -> String {
  match distribution {
    Some(d) => {
      let c = d.counts(count);
      format!(
        "Use exactly {} Reading, {} Listening, {} Speaking and {} Writing questions.",
        c.reading, c.listening, c.speaking, c.writing
      )
    }
    None => "All questions are Reading questions.".to_string(),
  }
}

/// Fill the per-type defaults a question needs to be playable. Multiple-choice
/// questions whose answer matches none of the options are dropped.
fn finish_question(mut q: Question) -> Option<Question> {
  if q.kind.has_options() {
    if q.options.len() < 2 {
      q.options = PLACEHOLDER_OPTIONS.iter().map(|s| s.to_string()).collect();
    }
    if !q.snap_answer() {
      debug!(target: "generation", question = %trunc_for_log(&q.question, 60), answer = %q.correct_answer, "Answer matches no option; dropped");
      return None;
    }
  } else {
    q.options.clear();
  }
  if q.kind == QuestionType::Listening
    && q.listening_text.as_deref().map_or(true, |t| t.trim().is_empty())
  {
    q.listening_text = Some(q.question.clone());
  }
  Some(q)
}

impl GenerationClient {
  pub fn new(
    model: Option<Arc<dyn ContentModel>>,
    cache: CacheStore,
    ids: Arc<dyn IdSource>,
    prompts: Prompts,
    settings: GenerationSettings,
  ) -> Self {
    Self { model, cache, ids, prompts, settings }
  }

  #[allow(dead_code)]
  pub fn cache(&self) -> &CacheStore { &self.cache }

  pub fn has_model(&self) -> bool { self.model.is_some() }

  /// One model round trip: request, strip code fences, parse JSON.
  async fn request_json(&self, schema: Value, schema_name: &'static str, user: String) -> Result<Value, GenerationError> {
    let model = self.model.as_ref().ok_or(GenerationError::Unavailable)?;
    let request = GenerationRequest {
      system: self.prompts.system.clone(),
      user,
      schema,
      schema_name,
      temperature: self.settings.temperature,
    };
    let text = model.generate(request).await?;
    let body = strip_code_fence(&text);
    serde_json::from_str::<Value>(body).map_err(|e| {
      debug!(target: "generation", kind = schema_name, preview = %trunc_for_log(body, 120), "Unparsable payload");
      GenerationError::Parse(e.to_string())
    })
  }

  /// Request a batch and return the records that survive normalization.
  async fn request_batch<T: DeserializeOwned>(&self, schema: &RecordSchema, user: String) -> Result<Vec<T>, GenerationError> {
    let value = self.request_json(schema.to_json_schema(), schema.name, user).await?;
    match schema.normalize_batch(&value) {
      Validated::Valid(records) => Ok(decode_records(records)),
      Validated::Invalid(reason) => Err(GenerationError::Shape(reason)),
    }
  }

  /// Topics for levels `start_level .. start_level + count`, cached per (start, count).
  /// The start is clamped to `1..=MAX_START_LEVEL`.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_topics(&self, start_level: u32, count: usize) -> Vec<Topic> {
    if count == 0 {
      return Vec::new();
    }
    let start_level = start_level.clamp(1, MAX_START_LEVEL);
    let key = topics_key(start_level, count);
    if let Some(cached) = self.cache.get::<Vec<Topic>>(&key).await {
      info!(target: "generation", kind = "topics", %key, outcome = "cache_hit", "Topics served");
      return cached;
    }

    let theme = theme_for_level(start_level);
    let difficulty = difficulty_for_level(start_level);
    let end_level = level_at(start_level, count - 1).unwrap_or(u32::MAX);
    let user = fill_template(
      &self.prompts.topics_user_template,
      &[
        ("count", count.to_string().as_str()),
        ("start", start_level.to_string().as_str()),
        ("end", end_level.to_string().as_str()),
        ("theme", theme),
        ("difficulty", difficulty.as_str()),
      ],
    );

    match self.request_batch::<TopicDraft>(&topic_schema(), user).await {
      Ok(drafts) => {
        let mut topics: Vec<Topic> = drafts
          .into_iter()
          .filter(|d| !d.name.trim().is_empty())
          .take(count)
          .zip((0..count).map_while(|i| level_at(start_level, i)))
          .map(|(d, level)| {
            Topic {
              id: format!("topic-{}", level),
              name: d.name.trim().to_string(),
              description: d.description,
              difficulty,
              icon: if d.icon.trim().is_empty() { "📘".into() } else { d.icon },
              is_locked: true,
              level_number: level,
              chapter_name: theme.to_string(),
            }
          })
          .collect();
        if topics.len() < count {
          let got = topics.len();
          topics.extend(synthesize::<Topic>(count - got, "", start_level as usize + got, 0));
          warn!(target: "generation", kind = "topics", %key, got, wanted = count, outcome = "backfilled", "Topic batch under-delivered; not cached");
          return topics;
        }
        self.cache.set(&key, &topics).await;
        info!(target: "generation", kind = "topics", %key, outcome = "generated", "Topics generated");
        topics
      }
      Err(e) => {
        warn!(target: "generation", kind = "topics", %key, error = %e, outcome = "fallback", "Topic generation failed");
        synthesize::<Topic>(count, "", start_level as usize, 0)
      }
    }
  }

  /// Exactly `count` questions. Never cached, so each battle gets fresh items.
  #[instrument(level = "info", skip(self, difficulty, distribution), fields(difficulty = difficulty.as_str()))]
  pub async fn fetch_questions(
    &self,
    topic: &str,
    difficulty: Difficulty,
    count: usize,
    distribution: Option<TypeDistribution>,
  ) -> Vec<Question> {
    if count == 0 {
      return Vec::new();
    }
    let token = self.ids.next_token();
    if topic.trim().is_empty() {
      warn!(target: "generation", kind = "questions", outcome = "fallback", "Empty topic");
      return synthesize::<Question>(count, topic, 0, token);
    }
    let user = fill_template(
      &self.prompts.questions_user_template,
      &[
        ("count", count.to_string().as_str()),
        ("topic", topic),
        ("cefr", difficulty.cefr_label()),
        ("difficulty", difficulty.as_str()),
        ("distribution", distribution_text(distribution, count).as_str()),
      ],
    );

    match self.request_batch::<Question>(&question_schema(), user).await {
      Ok(generated) => {
        let got = generated.len();
        let mut questions: Vec<Question> = generated
          .into_iter()
          .filter_map(finish_question)
          .take(count)
          .enumerate()
          .map(|(i, q)| Question { id: format!("q-{}-{}", token, i), ..q })
          .collect();
        if questions.len() < count {
          let have = questions.len();
          questions.extend(synthesize::<Question>(count - have, topic, have, token));
          warn!(target: "generation", kind = "questions", %topic, got, wanted = count, outcome = "backfilled", "Question batch backfilled");
        } else {
          info!(target: "generation", kind = "questions", %topic, got, wanted = count, outcome = "generated", "Questions generated");
        }
        questions
      }
      Err(e) => {
        warn!(target: "generation", kind = "questions", %topic, error = %e, outcome = "fallback", "Question generation failed");
        synthesize::<Question>(count, topic, 0, token)
      }
    }
  }

  /// Scene for `name`, cached under the normalized name.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_location(&self, name: &str) -> Location {
    if name.trim().is_empty() {
      warn!(target: "generation", kind = "location", outcome = "fallback", "Empty location name");
      return fallback_location(name, self.ids.next_token());
    }
    let key = location_key(name);
    if let Some(cached) = self.cache.get::<Location>(&key).await {
      info!(target: "generation", kind = "location", %key, outcome = "cache_hit", "Location served");
      return cached;
    }

    let token = self.ids.next_token();
    match self.generate_location(name, token).await {
      Ok(location) => {
        self.cache.set(&key, &location).await;
        info!(target: "generation", kind = "location", %key, items = location.items.len(), exits = location.exits.len(), outcome = "generated", "Location generated");
        location
      }
      Err(e) => {
        warn!(target: "generation", kind = "location", %key, error = %e, outcome = "fallback", "Location generation failed");
        fallback_location(name, token)
      }
    }
  }

  async fn generate_location(&self, name: &str, token: u64) -> Result<Location, GenerationError> {
    let s = &self.settings;
    let themes = BackgroundTheme::ALL.join(", ");
    let user = fill_template(
      &self.prompts.location_user_template,
      &[
        ("location", name.trim()),
        ("min_items", s.min_location_items.to_string().as_str()),
        ("max_items", s.max_location_items.to_string().as_str()),
        ("min_exits", s.min_location_exits.to_string().as_str()),
        ("max_exits", s.max_location_exits.to_string().as_str()),
        ("themes", themes.as_str()),
      ],
    );
    let schema = location_schema();
    let value = self.request_json(schema.object_schema(), schema.name, user).await?;
    // A one-element array around the scene is tolerated.
    let value = match value {
      Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
      other => other,
    };
    let record = match schema.normalize_record(&value) {
      Validated::Valid(record) => record,
      Validated::Invalid(reason) => return Err(GenerationError::Shape(reason)),
    };
    let draft: LocationDraft = serde_json::from_value(Value::Object(record))
      .map_err(|e| GenerationError::Shape(e.to_string()))?;

    let items: Vec<InteractableItem> = draft
      .items
      .into_iter()
      .filter_map(|v| serde_json::from_value::<ItemDraft>(v).ok())
      .enumerate()
      .map(|(i, d)| {
        let mut word_detail = d.word_detail;
        word_detail.ensure_usage_patterns();
        InteractableItem {
          id: format!("item-{}-{}", token, i),
          name: d.name,
          emoji: d.emoji,
          is_collected: false,
          word_detail,
        }
      })
      .collect();
    let exits: Vec<LocationExit> = draft
      .exits
      .into_iter()
      .filter_map(|v| serde_json::from_value::<LocationExit>(v).ok())
      .filter(|e| !e.target_location_name.trim().is_empty())
      .collect();
    if items.is_empty() && exits.is_empty() {
      return Err(GenerationError::Shape("location has neither items nor exits".into()));
    }

    let display_name = draft
      .name
      .map(|n| n.trim().to_string())
      .filter(|n| !n.is_empty())
      .unwrap_or_else(|| name.trim().to_string());
    Ok(Location {
      name: display_name,
      description: draft.description,
      items,
      exits,
      background_theme: draft.background_theme,
    })
  }

  /// Fictional leaderboard for a topic, ranked in response order.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_leaderboard(&self, topic: &str) -> Vec<LeaderboardEntry> {
    if topic.trim().is_empty() {
      warn!(target: "generation", kind = "leaderboard", outcome = "fallback", "Empty topic");
      return fallback_leaderboard();
    }
    let key = leaderboard_key(topic);
    if let Some(cached) = self.cache.get::<Vec<LeaderboardEntry>>(&key).await {
      info!(target: "generation", kind = "leaderboard", %key, outcome = "cache_hit", "Leaderboard served");
      return cached;
    }

    let size = self.settings.leaderboard_size.max(1);
    let user = fill_template(
      &self.prompts.leaderboard_user_template,
      &[("count", size.to_string().as_str()), ("topic", topic)],
    );
    match self.request_batch::<LeaderboardEntry>(&leaderboard_schema(), user).await {
      Ok(entries) if !entries.is_empty() => {
        let entries: Vec<LeaderboardEntry> = entries
          .into_iter()
          .take(size)
          .enumerate()
          .map(|(i, e)| LeaderboardEntry { rank: i as u32 + 1, ..e })
          .collect();
        self.cache.set(&key, &entries).await;
        info!(target: "generation", kind = "leaderboard", %key, entries = entries.len(), outcome = "generated", "Leaderboard generated");
        entries
      }
      Ok(_) => {
        warn!(target: "generation", kind = "leaderboard", %key, outcome = "fallback", "Empty leaderboard payload");
        fallback_leaderboard()
      }
      Err(e) => {
        warn!(target: "generation", kind = "leaderboard", %key, error = %e, outcome = "fallback", "Leaderboard generation failed");
        fallback_leaderboard()
      }
    }
  }
}
