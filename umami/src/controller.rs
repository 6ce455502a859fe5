//! The conversation state machine.
//!
//! One inbound event at a time per user: `handle_event` holds the
//! per-user session lock across the whole transition, replies with a
//! lightweight acknowledgement synchronously, and pushes the result of
//! heavy work (enrichment, persistence, nearby ranking) from a spawned
//! task. A task started under one session generation never applies its
//! result to a newer or cleared session.

use std::sync::Arc;

use crate::enrich::EnrichmentOrchestrator;
use crate::error::{Result, UmamiError};
use crate::models::{
    Candidate, EnrichedStore, Event, GeoPoint, OutboundMessage, PromptChoice, SessionMode,
    StoreCard,
};
use crate::places::PlaceDirectory;
use crate::port::ChatPort;
use crate::records::RecordStore;
use crate::scoring::rank_nearby;
use crate::session::SessionStore;
use crate::text;

/// How many candidates a surface is asked to show at once.
const MAX_CANDIDATES: usize = 10;
/// Character cap for card body text, the tightest surface limit.
const BODY_CHAR_LIMIT: usize = 1900;

const MSG_NOT_FOUND: &str = "❌ 店舗が見つかりませんでした。";
const MSG_PICK_ONE: &str = "🔎 どのお店にしますか？";
const MSG_ANALYZING: &str = "⏳ AI分析中です。少しお待ちください…";
const MSG_SAVING: &str = "💾 保存しています…";
const MSG_SEARCHING_NEARBY: &str = "🔎 近くのお店を探しています…";
const MSG_COMMENT_PROMPT: &str =
    "📝 感想を入力してください。\n不要な場合は「スキップ」と送ってください。";
const MSG_DECLINED: &str = "了解しました。また別のお店を検索してくださいね！";
const MSG_CANCELLED: &str = "キャンセルしました。";
const MSG_SEARCH_AGAIN: &str = "セッションが見つかりません。もう一度検索してください。";
const MSG_STALE_SELECTION: &str =
    "その候補は今の検索結果にありません。もう一度検索してください。";
const MSG_STILL_WORKING: &str = "⏳ まだ処理中です。少しお待ちください…";
const MSG_GENERIC_FAILURE: &str =
    "⚠️ 処理に失敗しました。少し時間をおいてもう一度お試しください。";
const MSG_ASK_LOCATION: &str = "📍 位置情報を送ってください。住所の入力でも大丈夫です。";
const MSG_ASK_SITUATION: &str = "どんなシーンで使いますか？（例：デート、仕事、一人）";
const MSG_GEOCODE_FAILED: &str = "❌ 現在地を解析できません。";
const MSG_NO_NEARBY_MATCH: &str = "❌ 条件に合う店がありません";
const MSG_SAVED: &str = "保存しました！";

const NEARBY_KEYWORD: &str = "近くのお店";

fn is_cancel_keyword(text: &str) -> bool {
    text == "キャンセル" || text.eq_ignore_ascii_case("cancel")
}

fn is_skip_keyword(text: &str) -> bool {
    text == "スキップ" || text.eq_ignore_ascii_case("skip")
}

#[derive(Clone)]
pub struct ConversationController {
    sessions: Arc<SessionStore>,
    places: Arc<dyn PlaceDirectory>,
    records: Arc<dyn RecordStore>,
    enricher: EnrichmentOrchestrator,
    port: Arc<dyn ChatPort>,
    /// API key for building card photo URLs; cards go photo-less
    /// without one.
    photo_api_key: Option<String>,
}

impl ConversationController {
    pub fn new(
        sessions: Arc<SessionStore>,
        places: Arc<dyn PlaceDirectory>,
        records: Arc<dyn RecordStore>,
        enricher: EnrichmentOrchestrator,
        port: Arc<dyn ChatPort>,
        photo_api_key: Option<String>,
    ) -> Self {
        Self {
            sessions,
            places,
            records,
            enricher,
            port,
            photo_api_key,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one inbound event for a user. Collaborator failures are
    /// absorbed here: the user gets a generic retry message, the
    /// session stays untouched, and the transport still sees success.
    pub async fn handle_event(&self, user_id: &str, event: Event) -> Result<()> {
        let _guard = self.sessions.lock_user(user_id).await;

        let outcome = self.dispatch(user_id, event).await;
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(user_id, error = %e, "transition failed");
                self.port
                    .deliver(user_id, &OutboundMessage::prompt(MSG_GENERIC_FAILURE))
                    .await
            }
        }
    }

    async fn dispatch(&self, user_id: &str, event: Event) -> Result<()> {
        match event {
            Event::Cancel => self.on_cancel(user_id).await,
            Event::FreeText { text } => {
                let trimmed = text.trim().to_string();
                if trimmed.is_empty() {
                    return Ok(());
                }
                if is_cancel_keyword(&trimmed) {
                    return self.on_cancel(user_id).await;
                }
                if trimmed == NEARBY_KEYWORD {
                    return self.on_nearby_request(user_id).await;
                }

                match self.sessions.get(user_id).await.map(|s| s.mode) {
                    Some(SessionMode::AwaitingComment) => {
                        self.on_comment(user_id, &trimmed).await
                    }
                    Some(SessionMode::AwaitingSituation) => {
                        self.on_situation(user_id, &trimmed).await
                    }
                    Some(SessionMode::AwaitingLocation) => {
                        self.on_location_text(user_id, &trimmed).await
                    }
                    _ => self.on_search(user_id, &trimmed, None).await,
                }
            }
            Event::Select { place_id } => self.on_select(user_id, &place_id).await,
            Event::AcceptWithComment => self.on_accept_with_comment(user_id).await,
            Event::AcceptNoComment => self.on_accept(user_id, String::new()).await,
            Event::Decline => self.on_decline(user_id).await,
            Event::Location { point } => self.on_location(user_id, point).await,
            Event::NearbyRequest => self.on_nearby_request(user_id).await,
        }
    }

    /// One-shot command surface: search with an optional pre-supplied
    /// comment that rides along to persistence without a decision step.
    pub async fn handle_save_command(
        &self,
        user_id: &str,
        query: &str,
        comment: Option<String>,
    ) -> Result<()> {
        let _guard = self.sessions.lock_user(user_id).await;

        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }

        match self.on_search(user_id, query, comment).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(user_id, error = %e, "save command failed");
                self.port
                    .deliver(user_id, &OutboundMessage::prompt(MSG_GENERIC_FAILURE))
                    .await
            }
        }
    }

    // ---- transitions ----

    async fn on_cancel(&self, user_id: &str) -> Result<()> {
        self.sessions.clear(user_id).await;
        self.send_text(user_id, MSG_CANCELLED).await
    }

    async fn on_search(
        &self,
        user_id: &str,
        query: &str,
        preset_comment: Option<String>,
    ) -> Result<()> {
        // Search before touching the session: a collaborator failure
        // must leave existing state for retry.
        let mut candidates = self.places.search(query).await?;

        if candidates.is_empty() {
            self.sessions.clear(user_id).await;
            return self.send_text(user_id, MSG_NOT_FOUND).await;
        }

        candidates.truncate(MAX_CANDIDATES);

        if candidates.len() == 1 {
            // Exactly one hit: skip the selection step entirely.
            let place_id = candidates[0].place_id.clone();
            let mut session = self.sessions.create(user_id, SessionMode::AwaitingSelection).await;
            session.candidates = candidates;
            session.preset_comment = preset_comment;
            session.work_in_flight = true;
            let generation = session.generation;
            self.sessions.set(user_id, session).await;

            self.send_text(user_id, MSG_ANALYZING).await?;
            self.spawn_enrichment(user_id, generation, place_id);
            return Ok(());
        }

        let choices = candidates
            .iter()
            .map(|c: &Candidate| PromptChoice {
                label: c.name.clone(),
                event: Event::Select {
                    place_id: c.place_id.clone(),
                },
            })
            .collect();

        let mut session = self.sessions.create(user_id, SessionMode::AwaitingSelection).await;
        session.candidates = candidates;
        session.preset_comment = preset_comment;
        self.sessions.set(user_id, session).await;

        self.port
            .deliver(user_id, &OutboundMessage::prompt_with(MSG_PICK_ONE, choices))
            .await
    }

    async fn on_select(&self, user_id: &str, place_id: &str) -> Result<()> {
        let Some(mut session) = self.sessions.get(user_id).await else {
            // Stale button after restart or a cleared session.
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        };

        if session.work_in_flight {
            return self.send_text(user_id, MSG_STILL_WORKING).await;
        }

        if session.mode != SessionMode::AwaitingSelection {
            tracing::debug!(user_id, mode = %session.mode, "select event out of mode");
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        }

        if !session.knows_candidate(place_id) {
            // Replayed button from a previous search; mode unchanged.
            return self.send_text(user_id, MSG_STALE_SELECTION).await;
        }

        session.work_in_flight = true;
        let generation = session.generation;
        self.sessions.set(user_id, session).await;

        self.send_text(user_id, MSG_ANALYZING).await?;
        self.spawn_enrichment(user_id, generation, place_id.to_string());
        Ok(())
    }

    async fn on_decline(&self, user_id: &str) -> Result<()> {
        let Some(session) = self.sessions.get(user_id).await else {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        };

        if session.mode != SessionMode::AwaitingSaveDecision {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        }

        self.sessions.clear(user_id).await;
        self.send_text(user_id, MSG_DECLINED).await
    }

    async fn on_accept_with_comment(&self, user_id: &str) -> Result<()> {
        let Some(mut session) = self.sessions.get(user_id).await else {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        };

        if session.mode != SessionMode::AwaitingSaveDecision || session.pending.is_none() {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        }

        session.mode = SessionMode::AwaitingComment;
        self.sessions.set(user_id, session).await;
        self.send_text(user_id, MSG_COMMENT_PROMPT).await
    }

    async fn on_comment(&self, user_id: &str, text: &str) -> Result<()> {
        // The literal skip keyword means "no comment", not the keyword.
        let comment = if is_skip_keyword(text) {
            String::new()
        } else {
            text.to_string()
        };
        self.on_accept(user_id, comment).await
    }

    async fn on_accept(&self, user_id: &str, comment: String) -> Result<()> {
        let Some(mut session) = self.sessions.get(user_id).await else {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        };

        let decision_mode = matches!(
            session.mode,
            SessionMode::AwaitingSaveDecision | SessionMode::AwaitingComment
        );
        if !decision_mode {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        }

        if session.work_in_flight {
            return self.send_text(user_id, MSG_STILL_WORKING).await;
        }

        let Some(mut store) = session.pending.clone() else {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        };
        store.comment = Some(comment);

        session.work_in_flight = true;
        let generation = session.generation;
        self.sessions.set(user_id, session).await;

        self.send_text(user_id, MSG_SAVING).await?;
        self.spawn_persist(user_id, generation, store);
        Ok(())
    }

    async fn on_nearby_request(&self, user_id: &str) -> Result<()> {
        self.sessions.create(user_id, SessionMode::AwaitingLocation).await;
        self.send_text(user_id, MSG_ASK_LOCATION).await
    }

    async fn on_location(&self, user_id: &str, point: GeoPoint) -> Result<()> {
        match self.sessions.get(user_id).await {
            Some(mut session) if session.mode == SessionMode::AwaitingLocation => {
                session.location = Some(point);
                session.mode = SessionMode::AwaitingSituation;
                self.sessions.set(user_id, session).await;
                self.send_text(user_id, MSG_ASK_SITUATION).await
            }
            None => {
                // A shared location with no session starts the nearby
                // flow directly at the situation step.
                let mut session = self.sessions.create(user_id, SessionMode::AwaitingSituation).await;
                session.location = Some(point);
                self.sessions.set(user_id, session).await;
                self.send_text(user_id, MSG_ASK_SITUATION).await
            }
            Some(session) => {
                tracing::debug!(user_id, mode = %session.mode, "location event out of mode");
                self.send_text(user_id, MSG_SEARCH_AGAIN).await
            }
        }
    }

    /// Free text while awaiting a location is treated as an address.
    async fn on_location_text(&self, user_id: &str, address: &str) -> Result<()> {
        let point = match self.places.geocode(address).await {
            Ok(point) => point,
            Err(UmamiError::NotFound(_)) => {
                return self.send_text(user_id, MSG_GEOCODE_FAILED).await;
            }
            Err(e) => return Err(e),
        };

        self.on_location(user_id, point).await
    }

    async fn on_situation(&self, user_id: &str, situation: &str) -> Result<()> {
        let Some(mut session) = self.sessions.get(user_id).await else {
            return self.send_text(user_id, MSG_SEARCH_AGAIN).await;
        };

        let Some(point) = session.location else {
            // Shouldn't happen: the situation mode is only entered with
            // coordinates. Recover by asking again.
            session.mode = SessionMode::AwaitingLocation;
            self.sessions.set(user_id, session).await;
            return self.send_text(user_id, MSG_ASK_LOCATION).await;
        };

        if session.work_in_flight {
            return self.send_text(user_id, MSG_STILL_WORKING).await;
        }

        session.situation = Some(situation.to_string());
        session.work_in_flight = true;
        let generation = session.generation;
        self.sessions.set(user_id, session).await;

        self.send_text(user_id, MSG_SEARCHING_NEARBY).await?;
        self.spawn_nearby(user_id, generation, point, situation.to_string());
        Ok(())
    }

    // ---- deferred work ----

    fn spawn_enrichment(&self, user_id: &str, generation: u64, place_id: String) {
        let controller = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            controller
                .run_enrichment(&user_id, generation, &place_id)
                .await;
        });
    }

    async fn run_enrichment(&self, user_id: &str, generation: u64, place_id: &str) {
        let result = self.enricher.enrich(place_id).await;

        let _guard = self.sessions.lock_user(user_id).await;
        if !self.sessions.is_current(user_id, generation).await {
            tracing::info!(user_id, place_id, "discarding stale enrichment result");
            return;
        }
        let Some(mut session) = self.sessions.get(user_id).await else {
            return;
        };

        match result {
            Ok(store) => {
                if let Some(comment) = session.preset_comment.clone() {
                    // One-shot flow: persist right away.
                    let mut store = store;
                    store.comment = Some(comment);
                    self.sessions.set(user_id, session).await;
                    self.persist_and_confirm(user_id, generation, store).await;
                    return;
                }

                let card = self.build_save_card(&store);
                session.pending = Some(store);
                session.mode = SessionMode::AwaitingSaveDecision;
                session.work_in_flight = false;
                self.sessions.set(user_id, session).await;

                if let Err(e) = self.port.deliver(user_id, &OutboundMessage::Card(card)).await {
                    tracing::error!(user_id, error = %e, "failed to deliver store card");
                }
            }
            Err(e) => {
                tracing::error!(user_id, place_id, error = %e, "enrichment failed");
                session.work_in_flight = false;
                self.sessions.set(user_id, session).await;
                let _ = self.send_text(user_id, MSG_GENERIC_FAILURE).await;
            }
        }
    }

    fn spawn_persist(&self, user_id: &str, generation: u64, store: EnrichedStore) {
        let controller = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            let _guard = controller.sessions.lock_user(&user_id).await;
            controller
                .persist_and_confirm(&user_id, generation, store)
                .await;
        });
    }

    /// Caller holds the user lock.
    async fn persist_and_confirm(&self, user_id: &str, generation: u64, store: EnrichedStore) {
        match self.records.upsert(&store).await {
            Ok(record_id) => {
                let link = self.records.record_url(&record_id);
                if !self.sessions.is_current(user_id, generation).await {
                    // Cancelled mid-save; the record exists but the
                    // conversation moved on.
                    tracing::info!(user_id, %record_id, "discarding stale save confirmation");
                    return;
                }
                self.sessions.clear(user_id).await;
                if let Err(e) = self
                    .port
                    .send_confirmation(user_id, MSG_SAVED, &link)
                    .await
                {
                    tracing::error!(user_id, error = %e, "failed to deliver confirmation");
                }
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "persistence failed");
                if let Some(mut session) = self.sessions.get(user_id).await {
                    if session.generation == generation {
                        session.work_in_flight = false;
                        self.sessions.set(user_id, session).await;
                    }
                }
                let _ = self.send_text(user_id, MSG_GENERIC_FAILURE).await;
            }
        }
    }

    fn spawn_nearby(&self, user_id: &str, generation: u64, point: GeoPoint, situation: String) {
        let controller = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            controller
                .run_nearby(&user_id, generation, point, &situation)
                .await;
        });
    }

    async fn run_nearby(&self, user_id: &str, generation: u64, point: GeoPoint, situation: &str) {
        let result = self.records.list_all().await;

        let _guard = self.sessions.lock_user(user_id).await;
        if !self.sessions.is_current(user_id, generation).await {
            tracing::info!(user_id, "discarding stale nearby ranking");
            return;
        }

        match result {
            Ok(records) => {
                let ranked = rank_nearby(records, point.lat, point.lng, situation);
                self.sessions.clear(user_id).await;

                if ranked.is_empty() {
                    let _ = self.send_text(user_id, MSG_NO_NEARBY_MATCH).await;
                    return;
                }

                for item in &ranked {
                    // Each card carries its own record's summary.
                    let card = StoreCard {
                        title: format!("📍 {}", item.record.name),
                        address: String::new(),
                        rating_line: text::rating_stars(item.record.rating),
                        price_line: text::price_band(item.record.price_level).to_string(),
                        type_line: format!(
                            "{} 店タイプ：{}",
                            text::type_icon(&item.record.store_type.kind),
                            item.record.store_type.kind
                        ),
                        subtype_line: format!(
                            "{} サブタイプ：{}",
                            text::subtype_icon(&item.record.store_type.subtype),
                            item.record.store_type.subtype
                        ),
                        tags_line: join_or(
                            item.record.tags.iter().cloned().collect::<Vec<_>>(),
                            "なし",
                        ),
                        recommendations_line: String::new(),
                        body: text::trim_to_limit(
                            &format!(
                                "距離：{:.2} km\nスコア：{:.2}\n\n{}",
                                item.distance_km, item.score, item.record.summary
                            ),
                            BODY_CHAR_LIMIT,
                        ),
                        photo_url: None,
                        link: Some(self.records.record_url(&item.record.record_id)),
                        choices: Vec::new(),
                    };
                    if let Err(e) = self.port.deliver(user_id, &OutboundMessage::Card(card)).await {
                        tracing::error!(user_id, error = %e, "failed to deliver nearby card");
                    }
                }
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "nearby ranking failed");
                if let Some(mut session) = self.sessions.get(user_id).await {
                    if session.generation == generation {
                        session.work_in_flight = false;
                        self.sessions.set(user_id, session).await;
                    }
                }
                let _ = self.send_text(user_id, MSG_GENERIC_FAILURE).await;
            }
        }
    }

    // ---- helpers ----

    fn build_save_card(&self, store: &EnrichedStore) -> StoreCard {
        let details = &store.details;
        StoreCard {
            title: format!("📍 {}", details.name),
            address: if details.address.is_empty() {
                "住所不明".to_string()
            } else {
                details.address.clone()
            },
            rating_line: text::rating_stars(details.rating),
            price_line: text::price_band(details.price_level).to_string(),
            type_line: format!(
                "{} 店タイプ：{}",
                text::type_icon(&store.store_type.kind),
                store.store_type.kind
            ),
            subtype_line: format!(
                "{} サブタイプ：{}",
                text::subtype_icon(&store.store_type.subtype),
                store.store_type.subtype
            ),
            tags_line: join_or(store.tags.iter().cloned().collect::<Vec<_>>(), "なし"),
            recommendations_line: join_or(store.recommendations.clone(), "不明"),
            body: text::trim_to_limit(&store.summary, BODY_CHAR_LIMIT),
            photo_url: match (&details.photo_reference, &self.photo_api_key) {
                (Some(reference), Some(key)) => Some(text::photo_url(reference, key)),
                _ => None,
            },
            link: details.map_url.clone(),
            choices: vec![
                PromptChoice {
                    label: "感想を書く".to_string(),
                    event: Event::AcceptWithComment,
                },
                PromptChoice {
                    label: "そのまま保存".to_string(),
                    event: Event::AcceptNoComment,
                },
                PromptChoice {
                    label: "保存しない".to_string(),
                    event: Event::Decline,
                },
            ],
        }
    }

    async fn send_text(&self, user_id: &str, message: &str) -> Result<()> {
        self.port
            .deliver(user_id, &OutboundMessage::prompt(message))
            .await
    }
}

fn join_or(values: Vec<String>, fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_keyword_exact_match_only() {
        assert!(is_cancel_keyword("キャンセル"));
        assert!(is_cancel_keyword("cancel"));
        assert!(is_cancel_keyword("CANCEL"));
        assert!(!is_cancel_keyword("キャンセルしたい"));
        assert!(!is_cancel_keyword("cancellation"));
    }

    #[test]
    fn test_skip_keyword_exact_match_only() {
        assert!(is_skip_keyword("スキップ"));
        assert!(is_skip_keyword("Skip"));
        assert!(!is_skip_keyword("スキップで"));
    }

    #[test]
    fn test_join_or_fallback() {
        assert_eq!(join_or(vec![], "なし"), "なし");
        assert_eq!(join_or(vec!["a".into(), "b".into()], "なし"), "a, b");
    }
}
