//! Domain models served to the game UI: topics, questions, locations and leaderboard entries.
//!
//! JSON names are camelCase to match what the web client and the model payloads use.

use serde::{Deserialize, Serialize};

/// Difficulty tier of a topic and of the questions generated for it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Difficulty {
  #[serde(alias = "easy")]
  Easy,
  #[serde(alias = "medium")]
  Medium,
  #[serde(alias = "hard")]
  Hard,
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Easy }
}

impl Difficulty {
  /// CEFR band used to calibrate question wording.
  pub fn cefr_label(self) -> &'static str {
    match self {
      Difficulty::Easy => "A1-A2",
      Difficulty::Medium => "B1-B2",
      Difficulty::Hard => "C1-C2",
    }
  }

  /// Number of questions in one battle at this difficulty.
  pub fn battle_size(self) -> usize {
    match self {
      Difficulty::Easy => 10,
      Difficulty::Medium => 15,
      Difficulty::Hard => 20,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }

  /// Lenient parse for query strings ("easy", "HARD", ...).
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "easy" => Some(Difficulty::Easy),
      "medium" => Some(Difficulty::Medium),
      "hard" => Some(Difficulty::Hard),
      _ => None,
    }
  }
}

/// One unlockable stage on the world map.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
  pub id: String,
  pub name: String,
  pub description: String,
  pub difficulty: Difficulty,
  pub icon: String,
  pub is_locked: bool,
  pub level_number: u32,
  pub chapter_name: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestionType {
  #[serde(alias = "reading")]
  Reading,
  #[serde(alias = "listening")]
  Listening,
  #[serde(alias = "speaking")]
  Speaking,
  #[serde(alias = "writing")]
  Writing,
}

impl QuestionType {
  pub const ALL: [&'static str; 4] = ["Reading", "Listening", "Speaking", "Writing"];

  /// Reading and Listening are multiple choice; the others are open answers.
  pub fn has_options(self) -> bool {
    matches!(self, QuestionType::Reading | QuestionType::Listening)
  }
}

impl Default for QuestionType {
  fn default() -> Self { QuestionType::Reading }
}

/// One quiz item in a battle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  #[serde(default)]
  pub id: String,
  #[serde(default, rename = "type")]
  pub kind: QuestionType,
  pub question: String,
  #[serde(default)]
  pub options: Vec<String>,
  pub correct_answer: String,
  #[serde(default)]
  pub explanation: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vietnamese_translation: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub listening_text: Option<String>,
}

impl Question {
  /// Replace `correct_answer` with the canonical option text when it matches
  /// an option case-insensitively or names one by letter (A–D).
  ///
  /// Returns whether the answer is now one of the options.
  pub fn snap_answer(&mut self) -> bool {
    if self.options.is_empty() {
      return false;
    }
    let wanted = self.correct_answer.trim();
    if let Some(opt) = self.options.iter().find(|o| o.trim().eq_ignore_ascii_case(wanted)) {
      self.correct_answer = opt.clone();
      return true;
    }
    let mut chars = wanted.chars();
    if let (Some(letter), None) = (chars.next(), chars.next()) {
      let idx = match letter.to_ascii_uppercase() {
        'A' => Some(0),
        'B' => Some(1),
        'C' => Some(2),
        'D' => Some(3),
        _ => None,
      };
      if let Some(opt) = idx.and_then(|i| self.options.get(i)) {
        self.correct_answer = opt.clone();
        return true;
      }
    }
    false
  }
}

/// Vocabulary payload attached to an interactable item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordDetail {
  pub english: String,
  pub vietnamese: String,
  #[serde(default)]
  pub ipa: String,
  #[serde(default)]
  pub part_of_speech: String,
  /// Never empty once normalized.
  #[serde(default)]
  pub usage_patterns: Vec<String>,
  #[serde(default)]
  pub description: String,
  /// Older payloads carried a single example instead of `usage_patterns`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example_sentence: Option<String>,
}

impl WordDetail {
  /// Backfill `usage_patterns` from the legacy example sentence, or from the
  /// bare term when neither is present.
  pub fn ensure_usage_patterns(&mut self) {
    self.usage_patterns.retain(|p| !p.trim().is_empty());
    if !self.usage_patterns.is_empty() {
      return;
    }
    let sentence = self
      .example_sentence
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .unwrap_or_else(|| self.english.clone());
    self.usage_patterns.push(sentence);
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractableItem {
  pub id: String,
  pub name: String,
  pub emoji: String,
  #[serde(default)]
  pub is_collected: bool,
  pub word_detail: WordDetail,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationExit {
  pub direction: String,
  pub target_location_name: String,
  #[serde(default)]
  pub emoji: String,
}

/// Visual theme key for a scene. Unknown values decode as `Neutral`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundTheme {
  Home,
  Kitchen,
  Garden,
  Street,
  Market,
  School,
  Office,
  Park,
  Beach,
  Forest,
  #[serde(other)]
  Neutral,
}

impl BackgroundTheme {
  pub const ALL: [&'static str; 11] = [
    "home", "kitchen", "garden", "street", "market", "school", "office", "park", "beach", "forest", "neutral",
  ];
}

impl Default for BackgroundTheme {
  fn default() -> Self { BackgroundTheme::Neutral }
}

/// One explorable scene.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
  pub name: String,
  pub description: String,
  pub items: Vec<InteractableItem>,
  pub exits: Vec<LocationExit>,
  #[serde(default)]
  pub background_theme: BackgroundTheme,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
  #[serde(default)]
  pub rank: u32,
  pub name: String,
  #[serde(default)]
  pub avatar: String,
  pub xp: u64,
  #[serde(default)]
  pub country: String,
}

/// Sort by descending xp (stable, so ties keep their relative order) and
/// renumber ranks from 1.
pub fn rank_entries(entries: &mut [LeaderboardEntry]) {
  entries.sort_by(|a, b| b.xp.cmp(&a.xp));
  for (i, e) in entries.iter_mut().enumerate() {
    e.rank = i as u32 + 1;
  }
}

/// Append the live user to `entries`, rank everything and return the user's rank.
pub fn merge_and_rank(
  mut entries: Vec<LeaderboardEntry>,
  user: LeaderboardEntry,
) -> (Vec<LeaderboardEntry>, u32) {
  let user_pos = entries.len();
  entries.push(user);
  let mut order: Vec<usize> = (0..entries.len()).collect();
  order.sort_by(|&a, &b| entries[b].xp.cmp(&entries[a].xp));
  let user_rank = order.iter().position(|&i| i == user_pos).map(|p| p as u32 + 1).unwrap_or(0);
  rank_entries(&mut entries);
  (entries, user_rank)
}

/// Share of each question type in a batch; Writing takes the remainder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TypeDistribution {
  pub reading: f64,
  pub listening: f64,
  pub speaking: f64,
}

/// Realized per-type counts for one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypeCounts {
  pub reading: usize,
  pub listening: usize,
  pub speaking: usize,
  pub writing: usize,
}

#[allow(dead_code)]
impl TypeCounts {
  pub fn total(&self) -> usize {
    self.reading + self.listening + self.speaking + self.writing
  }
}

impl TypeDistribution {
  /// 30% Reading, 30% Listening, 20% Speaking, remainder Writing.
  pub const MIXED: TypeDistribution = TypeDistribution { reading: 0.3, listening: 0.3, speaking: 0.2 };

  /// floor(count * ratio) for the first three types, remainder to Writing.
  pub fn counts(&self, count: usize) -> TypeCounts {
    let part = |ratio: f64| ((count as f64) * ratio.clamp(0.0, 1.0)).floor() as usize;
    let reading = part(self.reading).min(count);
    let listening = part(self.listening).min(count - reading);
    let speaking = part(self.speaking).min(count - reading - listening);
    TypeCounts { reading, listening, speaking, writing: count - reading - listening - speaking }
  }
}

/// Chapter themes, one per band of 10 levels. Levels past the table stay on the last theme.
pub const CHAPTER_THEMES: [&str; 10] = [
  "Daily Life & Greetings",
  "Food & Dining",
  "Travel & Directions",
  "Shopping & Money",
  "Health & Body",
  "Work & Career",
  "Nature & Environment",
  "Technology & Media",
  "Culture & Society",
  "Science & Ideas",
];

/// Highest level a topic batch may start at. Keeps `start + offset` far from
/// `u32::MAX` for any batch size.
pub const MAX_START_LEVEL: u32 = 1_000_000;

/// Level `offset` steps after `start`, or `None` past `u32::MAX`.
pub fn level_at(start: u32, offset: usize) -> Option<u32> {
  u32::try_from(offset).ok().and_then(|o| start.checked_add(o))
}

pub fn theme_for_level(level: u32) -> &'static str {
  let band = (level.max(1) - 1) as usize / 10;
  CHAPTER_THEMES[band.min(CHAPTER_THEMES.len() - 1)]
}

/// Levels 1–20 are Easy, 21–50 Medium, the rest Hard.
pub fn difficulty_for_level(level: u32) -> Difficulty {
  match level {
    0..=20 => Difficulty::Easy,
    21..=50 => Difficulty::Medium,
    _ => Difficulty::Hard,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(name: &str, xp: u64) -> LeaderboardEntry {
    LeaderboardEntry { rank: 0, name: name.into(), avatar: String::new(), xp, country: String::new() }
  }

  #[test]
  fn mixed_distribution_sums_to_count() {
    for n in 1..=60 {
      let c = TypeDistribution::MIXED.counts(n);
      assert_eq!(c.total(), n, "count {n}");
      assert_eq!(c.reading, (n as f64 * 0.3).floor() as usize);
      assert_eq!(c.listening, (n as f64 * 0.3).floor() as usize);
      assert_eq!(c.speaking, (n as f64 * 0.2).floor() as usize);
      if n >= 5 {
        assert!(c.reading >= 1 && c.listening >= 1 && c.speaking >= 1);
      }
    }
  }

  #[test]
  fn themes_band_by_ten_and_clamp() {
    assert_eq!(theme_for_level(1), "Daily Life & Greetings");
    assert_eq!(theme_for_level(10), "Daily Life & Greetings");
    assert_eq!(theme_for_level(11), "Food & Dining");
    assert_eq!(theme_for_level(500), "Science & Ideas");
    assert_eq!(difficulty_for_level(20), Difficulty::Easy);
    assert_eq!(difficulty_for_level(21), Difficulty::Medium);
    assert_eq!(difficulty_for_level(51), Difficulty::Hard);
  }

  #[test]
  fn mixed_distribution_for_ten() {
    let c = TypeDistribution::MIXED.counts(10);
    assert_eq!(c, TypeCounts { reading: 3, listening: 3, speaking: 2, writing: 2 });
  }

  #[test]
  fn oversized_ratios_never_exceed_count() {
    let d = TypeDistribution { reading: 0.9, listening: 0.9, speaking: 0.9 };
    let c = d.counts(7);
    assert_eq!(c.total(), 7);
    assert_eq!(c.writing, 0);
  }

  #[test]
  fn merge_and_rank_breaks_ties_by_original_order() {
    let entries = vec![entry("a", 4500), entry("b", 100), entry("c", 4500), entry("d", 3000)];
    let (ranked, user_rank) = merge_and_rank(entries, entry("me", 4000));
    let names: Vec<_> = ranked.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a", "c", "me", "d", "b"]);
    assert_eq!(ranked.iter().map(|e| e.rank).collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    assert_eq!(user_rank, 3);
  }

  #[test]
  fn snap_answer_by_text_and_letter() {
    let mut q = Question {
      id: "q".into(),
      kind: QuestionType::Reading,
      question: "?".into(),
      options: vec!["Apple".into(), "Pear".into(), "Plum".into(), "Fig".into()],
      correct_answer: " pear".into(),
      explanation: String::new(),
      vietnamese_translation: None,
      listening_text: None,
    };
    assert!(q.snap_answer());
    assert_eq!(q.correct_answer, "Pear");
    q.correct_answer = "d".into();
    assert!(q.snap_answer());
    assert_eq!(q.correct_answer, "Fig");
    q.correct_answer = "Banana".into();
    assert!(!q.snap_answer());
    assert_eq!(q.correct_answer, "Banana");
  }

  #[test]
  fn level_offsets_stop_at_u32_max() {
    assert_eq!(level_at(21, 4), Some(25));
    assert_eq!(level_at(u32::MAX - 1, 1), Some(u32::MAX));
    assert_eq!(level_at(u32::MAX - 1, 2), None);
  }

  #[test]
  fn usage_patterns_backfilled_from_legacy_sentence() {
    let mut w = WordDetail {
      english: "kettle".into(),
      vietnamese: "ấm đun nước".into(),
      ipa: "/ˈket.əl/".into(),
      part_of_speech: "noun".into(),
      usage_patterns: vec![],
      description: String::new(),
      example_sentence: Some("Put the kettle on.".into()),
    };
    w.ensure_usage_patterns();
    assert_eq!(w.usage_patterns, ["Put the kettle on."]);
  }

  #[test]
  fn unknown_background_theme_is_neutral() {
    let t: BackgroundTheme = serde_json::from_str("\"volcano\"").unwrap();
    assert_eq!(t, BackgroundTheme::Neutral);
    let t: BackgroundTheme = serde_json::from_str("\"kitchen\"").unwrap();
    assert_eq!(t, BackgroundTheme::Kitchen);
  }
}
