//! Locally synthesized content used when generation fails or under-delivers.
//!
//! Everything here is a pure function of its inputs. The `token` argument only
//! ever reaches record ids, so two calls that differ only in token produce
//! records that differ only in id.

use crate::domain::{
  difficulty_for_level, level_at, theme_for_level, BackgroundTheme, InteractableItem, LeaderboardEntry, Location,
  LocationExit, Question, QuestionType, Topic, WordDetail,
};

/// Type rotation for backfilled questions.
const QUESTION_CYCLE: [QuestionType; 3] = [QuestionType::Reading, QuestionType::Listening, QuestionType::Writing];

const READING_BANK: [(&str, [&str; 4], &str); 4] = [
  ("Choose the correct word: \"She ___ to school every day.\"", ["go", "goes", "going", "gone"], "goes"),
  ("Which sentence is correct?", ["He don't like tea.", "He doesn't like tea.", "He not like tea.", "He no likes tea."], "He doesn't like tea."),
  ("Choose the opposite of \"difficult\".", ["hard", "easy", "heavy", "slow"], "easy"),
  ("Complete: \"I have lived here ___ 2019.\"", ["for", "since", "from", "at"], "since"),
];

const LISTENING_BANK: [(&str, [&str; 4], &str); 3] = [
  ("Could you tell me where the station is?", ["Asking for directions", "Ordering food", "Buying a ticket", "Saying goodbye"], "Asking for directions"),
  ("I'd like a cup of coffee, please.", ["Ordering a drink", "Asking the time", "Booking a room", "Paying a bill"], "Ordering a drink"),
  ("The meeting has been moved to Friday.", ["A schedule change", "A weather report", "A price list", "A greeting"], "A schedule change"),
];

const WRITING_BANK: [&str; 3] = [
  "Write one sentence about your favourite place related to {topic}.",
  "Describe what you did yesterday in two sentences, using the past tense.",
  "Write a short question you could ask a friend about {topic}.",
];

/// Placeholder topics for levels `start_level .. start_level + count`.
/// A start too close to `u32::MAX` is pulled down so the run still fits.
pub fn fallback_topics(start_level: u32, count: usize) -> Vec<Topic> {
  let last_offset = u32::try_from(count.saturating_sub(1)).unwrap_or(u32::MAX);
  let start_level = start_level.min(u32::MAX - last_offset).max(1);
  (0..count)
    .map_while(|i| level_at(start_level, i))
    .map(|level| {
      Topic {
        id: format!("topic-{}", level),
        name: format!("Zone {}", level),
        description: "Practice essential English words and phrases for this stage.".into(),
        difficulty: difficulty_for_level(level),
        icon: "📘".into(),
        is_locked: true,
        level_number: level,
        chapter_name: theme_for_level(level).to_string(),
      }
    })
    .collect()
}

/// `count` placeholder questions continuing the batch at `start_index`.
pub fn fallback_questions(topic: &str, count: usize, start_index: usize, token: u64) -> Vec<Question> {
  (0..count)
    .map(|i| {
      let index = start_index.saturating_add(i);
      let kind = QUESTION_CYCLE[index % QUESTION_CYCLE.len()];
      let id = format!("q-{}-{}", token, index);
      match kind {
        QuestionType::Listening => {
          let (text, options, answer) = LISTENING_BANK[index % LISTENING_BANK.len()];
          Question {
            id,
            kind,
            question: "Listen and choose what the speaker is doing.".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: answer.into(),
            explanation: format!("The speaker says: \"{}\"", text),
            vietnamese_translation: None,
            listening_text: Some(text.into()),
          }
        }
        QuestionType::Writing | QuestionType::Speaking => {
          let prompt = WRITING_BANK[index % WRITING_BANK.len()].replace("{topic}", topic);
          Question {
            id,
            kind,
            question: prompt,
            options: Vec::new(),
            correct_answer: String::new(),
            explanation: "Any clear, grammatical answer is accepted.".into(),
            vietnamese_translation: None,
            listening_text: None,
          }
        }
        QuestionType::Reading => {
          let (text, options, answer) = READING_BANK[index % READING_BANK.len()];
          Question {
            id,
            kind,
            question: text.into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: answer.into(),
            explanation: format!("The correct answer is \"{}\".", answer),
            vietnamese_translation: None,
            listening_text: None,
          }
        }
      }
    })
    .collect()
}

fn word(english: &str, vietnamese: &str, ipa: &str, pos: &str, example: &str, description: &str) -> WordDetail {
  WordDetail {
    english: english.into(),
    vietnamese: vietnamese.into(),
    ipa: ipa.into(),
    part_of_speech: pos.into(),
    usage_patterns: vec![example.into()],
    description: description.into(),
    example_sentence: None,
  }
}

/// Minimal scene with a few everyday items and a single exit.
pub fn fallback_location(name: &str, token: u64) -> Location {
  let name = match name.trim() {
    "" => "Home",
    n => n,
  };
  let words = [
    ("Chair", "🪑", word("chair", "cái ghế", "/tʃeər/", "noun", "Please sit on the chair.", "A seat for one person.")),
    ("Window", "🪟", word("window", "cửa sổ", "/ˈwɪn.dəʊ/", "noun", "Open the window, please.", "An opening in a wall that lets in light.")),
    ("Lamp", "💡", word("lamp", "cái đèn", "/læmp/", "noun", "Turn on the lamp.", "A device that gives light.")),
  ];
  let items = words
    .into_iter()
    .enumerate()
    .map(|(i, (label, emoji, detail))| InteractableItem {
      id: format!("item-{}-{}", token, i),
      name: label.into(),
      emoji: emoji.into(),
      is_collected: false,
      word_detail: detail,
    })
    .collect();
  let target = if name.eq_ignore_ascii_case("home") { "Street" } else { "Home" };
  Location {
    name: name.to_string(),
    description: "A quiet place. Look around and learn the names of the things you see.".into(),
    items,
    exits: vec![LocationExit {
      direction: "Back".into(),
      target_location_name: target.into(),
      emoji: "🚪".into(),
    }],
    background_theme: BackgroundTheme::Neutral,
  }
}

/// Small fixed illustrative leaderboard.
pub fn fallback_leaderboard() -> Vec<LeaderboardEntry> {
  [
    ("Minh Anh", "🦊", 5200, "🇻🇳"),
    ("Emily", "🐼", 4700, "🇬🇧"),
    ("Kenji", "🐯", 4100, "🇯🇵"),
    ("Lucas", "🦁", 3600, "🇧🇷"),
    ("Sofia", "🐨", 2900, "🇪🇸"),
  ]
  .into_iter()
  .enumerate()
  .map(|(i, (name, avatar, xp, country))| LeaderboardEntry {
    rank: i as u32 + 1,
    name: name.into(),
    avatar: avatar.into(),
    xp,
    country: country.into(),
  })
  .collect()
}

/// Record kinds the synthesizer can produce.
///
/// `context` is the topic name for questions and the location name for
/// locations; `start_index` is the first level for topics and the first
/// batch index for questions. `token` only reaches ids.
pub trait Synthesize: Sized {
  fn synthesize(count: usize, context: &str, start_index: usize, token: u64) -> Vec<Self>;
}

impl Synthesize for Topic {
  fn synthesize(count: usize, _context: &str, start_index: usize, _token: u64) -> Vec<Self> {
    fallback_topics(u32::try_from(start_index).unwrap_or(u32::MAX), count)
  }
}

impl Synthesize for Question {
  fn synthesize(count: usize, context: &str, start_index: usize, token: u64) -> Vec<Self> {
    fallback_questions(context, count, start_index, token)
  }
}

impl Synthesize for Location {
  fn synthesize(count: usize, context: &str, _start_index: usize, token: u64) -> Vec<Self> {
    (0..count).map(|_| fallback_location(context, token)).collect()
  }
}

impl Synthesize for LeaderboardEntry {
  fn synthesize(count: usize, _context: &str, _start_index: usize, _token: u64) -> Vec<Self> {
    fallback_leaderboard()
      .into_iter()
      .cycle()
      .take(count)
      .enumerate()
      .map(|(i, e)| LeaderboardEntry { rank: i as u32 + 1, ..e })
      .collect()
  }
}

/// Exactly `count` placeholder records of kind `T`.
pub fn synthesize<T: Synthesize>(count: usize, context: &str, start_index: usize, token: u64) -> Vec<T> {
  T::synthesize(count, context, start_index, token)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Serialize;
  use serde_json::Value;

  #[test]
  fn topics_are_contiguous_and_locked() {
    let topics = fallback_topics(18, 5);
    assert_eq!(topics.iter().map(|t| t.level_number).collect::<Vec<_>>(), [18, 19, 20, 21, 22]);
    assert!(topics.iter().all(|t| t.is_locked));
    assert_eq!(topics[0].name, "Zone 18");
    assert_eq!(topics[0].id, "topic-18");
    assert_eq!(topics[2].chapter_name, "Food & Dining");
    assert_eq!(topics[3].chapter_name, "Travel & Directions");
  }

  #[test]
  fn questions_rotate_types_from_start_index() {
    let qs = fallback_questions("Food", 4, 2, 9);
    let kinds: Vec<_> = qs.iter().map(|q| q.kind).collect();
    assert_eq!(
      kinds,
      [QuestionType::Writing, QuestionType::Reading, QuestionType::Listening, QuestionType::Writing]
    );
    assert_eq!(qs[0].id, "q-9-2");
    assert!(qs[2].listening_text.is_some());
    assert!(qs[1].options.contains(&qs[1].correct_answer));
  }

  #[test]
  fn topic_run_near_u32_max_stays_exact_and_contiguous() {
    let topics = fallback_topics(u32::MAX - 1, 5);
    let levels: Vec<_> = topics.iter().map(|t| t.level_number).collect();
    assert_eq!(levels, (u32::MAX - 4..=u32::MAX).collect::<Vec<_>>());
    assert_eq!(topics[4].id, format!("topic-{}", u32::MAX));
    let tail = synthesize::<Topic>(3, "", usize::MAX, 0);
    assert_eq!(tail.len(), 3);
    assert_eq!(tail[2].level_number, u32::MAX);
  }

  fn without_ids<T: Serialize>(records: Vec<T>) -> Vec<Value> {
    let mut values: Vec<Value> = records.into_iter().map(|r| serde_json::to_value(r).unwrap()).collect();
    values.iter_mut().for_each(strip_ids);
    values
  }

  fn assert_differ_only_in_ids<T: Synthesize + Serialize>(label: &str) {
    let a = synthesize::<T>(6, "Kitchen", 3, 100);
    let b = synthesize::<T>(6, "Kitchen", 3, 200);
    assert_eq!(a.len(), 6, "{label}");
    assert_eq!(b.len(), 6, "{label}");
    assert_eq!(without_ids(a), without_ids(b), "{label}");
  }

  #[test]
  fn same_inputs_differ_only_in_ids() {
    assert_differ_only_in_ids::<Topic>("topics");
    assert_differ_only_in_ids::<Question>("questions");
    assert_differ_only_in_ids::<Location>("locations");
    assert_differ_only_in_ids::<LeaderboardEntry>("leaderboard");
  }

  #[test]
  fn synthesized_leaderboard_has_exact_count_and_fresh_ranks() {
    let lb = synthesize::<LeaderboardEntry>(7, "", 0, 0);
    assert_eq!(lb.iter().map(|e| e.rank).collect::<Vec<_>>(), [1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(lb[5].name, lb[0].name);
  }

  fn strip_ids(v: &mut Value) {
    match v {
      Value::Object(obj) => {
        obj.remove("id");
        obj.values_mut().for_each(strip_ids);
      }
      Value::Array(items) => items.iter_mut().for_each(strip_ids),
      _ => {}
    }
  }

  #[test]
  fn location_has_single_exit_and_usage_patterns() {
    let loc = fallback_location("  Garden ", 1);
    assert_eq!(loc.name, "Garden");
    assert_eq!(loc.exits.len(), 1);
    assert_eq!(loc.exits[0].target_location_name, "Home");
    assert!(loc.items.iter().all(|i| !i.word_detail.usage_patterns.is_empty()));
    assert_eq!(fallback_location("home", 1).exits[0].target_location_name, "Street");
  }

  #[test]
  fn leaderboard_is_ranked() {
    let lb = fallback_leaderboard();
    assert_eq!(lb.iter().map(|e| e.rank).collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
  }
}
