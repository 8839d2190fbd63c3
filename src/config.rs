//! Loading agent configuration (prompts, cache and generation settings) from TOML.
//!
//! See `AgentConfig` and `Prompts` for expected schema. Every section is
//! optional; missing values fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub cache: CacheSettings,
  #[serde(default)]
  pub generation: GenerationSettings,
}

/// Prompts sent to the content model. `{key}` placeholders are filled per call.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub topics_user_template: String,
  pub questions_user_template: String,
  pub location_user_template: String,
  pub leaderboard_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are the content engine of LingoQuest, an RPG that teaches English to Vietnamese learners. Produce accurate, natural, age-appropriate English. Vietnamese translations must be natural Vietnamese. Respond ONLY with JSON matching the requested schema.".into(),
      topics_user_template: "Create {count} consecutive learning topics for levels {start} to {end} of the chapter \"{theme}\". Difficulty: {difficulty}. Each topic needs a short name, a one-sentence description and a single emoji icon. Topics must build on each other and not repeat.".into(),
      questions_user_template: "Create {count} English quiz questions about \"{topic}\" for a learner at CEFR level {cefr} ({difficulty}). {distribution} Reading and Listening questions have exactly 4 options and a correctAnswer equal to one option. Listening questions include listeningText, the sentence to be read aloud. Every question has a short explanation and a vietnameseTranslation of the question.".into(),
      location_user_template: "Describe the place \"{location}\" for an exploration game. Include between {min_items} and {max_items} everyday objects a learner could click on, each with an emoji and word details (english, vietnamese, IPA, partOfSpeech, 2-3 usagePatterns, short description). Include between {min_exits} and {max_exits} exits to nearby places. Pick backgroundTheme from: {themes}.".into(),
      leaderboard_user_template: "Invent {count} fictional players of an English-learning game who are studying \"{topic}\". Give each a name, an emoji avatar, an xp value between 500 and 6000, and a flag emoji for their country. Sort by xp, highest first.".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
  /// JSON file backing the persistent cache.
  pub path: String,
  /// Version prefix of every key. Changing it invalidates all older entries.
  pub prefix: String,
  /// `false` keeps the cache in memory for the lifetime of the process.
  pub persist: bool,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      path: "./data/lingoquest-cache.json".into(),
      prefix: "lingoquest_v3_".into(),
      persist: true,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub leaderboard_size: usize,
  pub temperature: f32,
  pub min_location_items: usize,
  pub max_location_items: usize,
  pub min_location_exits: usize,
  pub max_location_exits: usize,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      leaderboard_size: 10,
      temperature: 0.8,
      min_location_items: 15,
      max_location_items: 20,
      min_location_exits: 3,
      max_location_exits: 5,
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "lingoquest", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lingoquest", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lingoquest", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Config file (if any) with env overrides applied.
pub fn load_config() -> AgentConfig {
  let mut cfg = load_agent_config_from_env().unwrap_or_default();
  if let Ok(path) = std::env::var("CACHE_PATH") {
    cfg.cache.path = path;
  }
  cfg
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AgentConfig = toml::from_str(
      r#"
        [cache]
        prefix = "lingoquest_v4_"

        [generation]
        leaderboard_size = 5

        [prompts]
        system = "Be brief."
      "#,
    )
    .unwrap();
    assert_eq!(cfg.cache.prefix, "lingoquest_v4_");
    assert!(cfg.cache.persist);
    assert_eq!(cfg.generation.leaderboard_size, 5);
    assert_eq!(cfg.generation.max_location_items, 20);
    assert_eq!(cfg.prompts.system, "Be brief.");
    assert!(cfg.prompts.topics_user_template.contains("{theme}"));
  }

  #[test]
  fn empty_toml_is_all_defaults() {
    let cfg: AgentConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.cache.path, "./data/lingoquest-cache.json");
    assert_eq!(cfg.generation.leaderboard_size, 10);
  }
}
