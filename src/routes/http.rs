//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! generation client. Handlers never fail: the client always yields content.

use std::sync::Arc;
use axum::{extract::{State, Query}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::{merge_and_rank, Difficulty, LeaderboardEntry, TypeDistribution, MAX_START_LEVEL};
use crate::protocol::*;
use crate::state::AppState;

const MAX_BATCH: usize = 50;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthOut { ok: true, model_enabled: state.generator.has_model() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_topics(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TopicsQuery>,
) -> impl IntoResponse {
    let start = q.start.unwrap_or(1).clamp(1, MAX_START_LEVEL);
    let count = q.count.unwrap_or(10).min(MAX_BATCH);
    let topics = state.generator.fetch_topics(start, count).await;
    info!(target: "lingoquest", start, count = topics.len(), "HTTP topics served");
    Json(TopicsOut { topics })
}

#[instrument(level = "info", skip(state), fields(topic = %q.topic))]
pub async fn http_get_questions(
    State(state): State<Arc<AppState>>,
    Query(q): Query<QuestionsQuery>,
) -> impl IntoResponse {
    let difficulty = q.difficulty.as_deref().and_then(Difficulty::parse).unwrap_or_default();
    let count = q.count.unwrap_or_else(|| difficulty.battle_size()).min(MAX_BATCH);
    let distribution = q.mixed.then_some(TypeDistribution::MIXED);
    let questions = state.generator.fetch_questions(&q.topic, difficulty, count, distribution).await;
    info!(target: "lingoquest", topic = %q.topic, difficulty = difficulty.as_str(), count = questions.len(), "HTTP questions served");
    Json(QuestionsOut { questions })
}

#[instrument(level = "info", skip(state), fields(name = %q.name))]
pub async fn http_get_location(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LocationQuery>,
) -> impl IntoResponse {
    let location = state.generator.fetch_location(&q.name).await;
    info!(target: "lingoquest", name = %location.name, items = location.items.len(), "HTTP location served");
    Json(LocationOut { location })
}

#[instrument(level = "info", skip(state), fields(topic = %q.topic))]
pub async fn http_get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    let entries = state.generator.fetch_leaderboard(&q.topic).await;
    let out = match q.user_xp {
        Some(xp) => {
            let user = LeaderboardEntry {
                rank: 0,
                name: q.user_name.clone().unwrap_or_else(|| "You".into()),
                avatar: q.user_avatar.clone().unwrap_or_else(|| "🧑‍🎓".into()),
                xp,
                country: "🇻🇳".into(),
            };
            let (entries, user_rank) = merge_and_rank(entries, user);
            LeaderboardOut { entries, user_rank: Some(user_rank) }
        }
        None => LeaderboardOut { entries, user_rank: None },
    };
    info!(target: "lingoquest", topic = %q.topic, entries = out.entries.len(), user_rank = ?out.user_rank, "HTTP leaderboard served");
    Json(out)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::AgentConfig;
    use crate::domain::MAX_START_LEVEL;
    use crate::routes::build_router;
    use crate::state::AppState;

    async fn get_json(uri: &str) -> Value {
        let mut cfg = AgentConfig::default();
        cfg.cache.persist = false;
        let state = std::sync::Arc::new(AppState::build(cfg, None).await);
        let res = build_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_model_state() {
        let v = get_json("/api/v1/health").await;
        assert_eq!(v["ok"], true);
        assert_eq!(v["modelEnabled"], false);
    }

    #[tokio::test]
    async fn topics_endpoint_returns_requested_count() {
        let v = get_json("/api/v1/topics?start=11&count=3").await;
        let topics = v["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 3);
        assert_eq!(topics[0]["levelNumber"], 11);
        assert_eq!(topics[0]["isLocked"], true);
    }

    #[tokio::test]
    async fn topics_start_is_clamped_to_level_ceiling() {
        let v = get_json("/api/v1/topics?start=4294967295&count=50").await;
        let topics = v["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 50);
        assert_eq!(topics[0]["levelNumber"], MAX_START_LEVEL);
        assert_eq!(topics[49]["levelNumber"], MAX_START_LEVEL + 49);
    }

    #[tokio::test]
    async fn missing_topic_and_name_still_get_content() {
        let v = get_json("/api/v1/questions?difficulty=easy").await;
        assert_eq!(v["questions"].as_array().unwrap().len(), 10);
        let v = get_json("/api/v1/location").await;
        assert_eq!(v["location"]["name"], "Home");
        let v = get_json("/api/v1/leaderboard").await;
        assert_eq!(v["entries"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn questions_default_to_battle_size() {
        let v = get_json("/api/v1/questions?topic=Food&difficulty=medium").await;
        assert_eq!(v["questions"].as_array().unwrap().len(), 15);
    }

    #[tokio::test]
    async fn location_endpoint_returns_scene() {
        let v = get_json("/api/v1/location?name=Garden").await;
        assert_eq!(v["location"]["name"], "Garden");
        assert_eq!(v["location"]["backgroundTheme"], "neutral");
    }

    #[tokio::test]
    async fn leaderboard_merges_live_user() {
        let v = get_json("/api/v1/leaderboard?topic=Food&userName=Me&userXp=4000").await;
        let entries = v["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(v["userRank"], 4);
        assert_eq!(entries[3]["name"], "Me");
        assert_eq!(entries[3]["rank"], 4);
    }
}
