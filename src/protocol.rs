//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{LeaderboardEntry, Location, Question, Topic};

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
    #[serde(rename = "modelEnabled")]
    pub model_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    pub start: Option<u32>,
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TopicsOut {
    pub topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    #[serde(default)]
    pub topic: String,
    pub difficulty: Option<String>,
    pub count: Option<usize>,
    /// Request the mixed Reading/Listening/Speaking/Writing split.
    #[serde(default)]
    pub mixed: bool,
}

#[derive(Debug, Serialize)]
pub struct QuestionsOut {
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LocationOut {
    pub location: Location,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub topic: String,
    pub user_name: Option<String>,
    pub user_xp: Option<u64>,
    pub user_avatar: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardOut {
    pub entries: Vec<LeaderboardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rank: Option<u32>,
}
