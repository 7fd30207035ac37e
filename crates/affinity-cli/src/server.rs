use std::sync::Arc;

use affinity_core::{CandidateItem, Category, Event, ProfileExport, RankingEngine, UserProfile};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::persist::PersistHandle;

#[derive(Clone)]
pub struct AffinityServer {
    state: Arc<Mutex<ServerState>>,
    persist: PersistHandle,
    tool_router: ToolRouter<Self>,
}

struct ServerState {
    user_id: String,
    profile: UserProfile,
    engine: RankingEngine,
    categories: Vec<Category>,
}

impl AffinityServer {
    pub fn new(
        user_id: &str,
        profile: UserProfile,
        engine: RankingEngine,
        categories: Vec<Category>,
        persist: PersistHandle,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                user_id: user_id.to_string(),
                profile,
                engine,
                categories,
            })),
            persist,
            tool_router: Self::tool_router(),
        }
    }

    fn summary_json(state: &ServerState) -> serde_json::Value {
        let p = &state.profile;
        serde_json::json!({
            "categories": p.category_affinity.len(),
            "views": p.view_history.len(),
            "likes": p.like_history.len(),
            "collects": p.collect_history.len(),
            "keywords": p.search_keywords.len(),
        })
    }

    /// Hand the current snapshot to the background writer.
    fn queue_save(&self, state: &ServerState) {
        self.persist.queue(&state.user_id, state.profile.clone());
    }
}

fn json_result(value: &serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct RecordRequest {
    /// Event kind: view, like, unlike, collect, uncollect or search
    kind: String,
    /// Item id (all kinds except search)
    item_id: Option<i64>,
    /// Category of the item (view, like, collect)
    category_id: Option<i64>,
    /// Search text (search only)
    keyword: Option<String>,
}

/// Same shape as a ranked item, so `affinity_rank` output can be fed back in.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CandidateParam {
    id: i64,
    category_id: i64,
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    collect_count: u64,
}

impl From<CandidateParam> for CandidateItem {
    fn from(c: CandidateParam) -> Self {
        CandidateItem::new(c.id, c.category_id).with_counts(
            c.view_count,
            c.like_count,
            c.collect_count,
        )
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RankRequest {
    /// Items to rank, with their global engagement counts
    candidates: Vec<CandidateParam>,
    /// Return only the top N; all candidates when omitted
    limit: Option<usize>,
}

#[tool_router]
impl AffinityServer {
    #[tool(
        description = "Record a user interaction (view, like, unlike, collect, uncollect, search). Updates the user's category affinity and history immediately; the profile is saved in the background."
    )]
    async fn affinity_record(
        &self,
        Parameters(req): Parameters<RecordRequest>,
    ) -> Result<CallToolResult, McpError> {
        let event = Event::from_parts(
            &req.kind,
            req.item_id,
            req.category_id,
            req.keyword.as_deref(),
        )
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let mut state = self.state.lock().await;
        let ServerState {
            profile, engine, ..
        } = &mut *state;
        let outcome = engine
            .record_event(profile, &event)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        if outcome.changed() {
            self.queue_save(&state);
        }

        let result = serde_json::json!({
            "kind": event.kind().as_str(),
            "changed": outcome.changed(),
            "affinity_bumped": outcome.affinity_bumped,
            "profile": Self::summary_json(&state),
        });
        Ok(json_result(&result))
    }

    #[tool(
        description = "Rank candidate items for this user. Items from categories the user engages with rise to the top; unseen items get a bonus; global popularity breaks the rest. Returns items in descending recommendScore order."
    )]
    async fn affinity_rank(
        &self,
        Parameters(req): Parameters<RankRequest>,
    ) -> Result<CallToolResult, McpError> {
        let candidates: Vec<CandidateItem> =
            req.candidates.into_iter().map(CandidateItem::from).collect();

        let state = self.state.lock().await;
        let ranked = match req.limit {
            Some(limit) => state.engine.rank_top(&state.profile, &candidates, limit),
            None => state.engine.rank(&state.profile, &candidates),
        };

        let result = serde_json::json!({
            "items": ranked,
            "count": ranked.len(),
        });
        Ok(json_result(&result))
    }

    #[tool(
        description = "Top categories (with catalog names when known) and most recent search keywords for this user."
    )]
    async fn affinity_recommend(&self) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        let categories = state
            .engine
            .recommended_category_names(&state.profile, &state.categories);
        let keywords = state.engine.recommended_keywords(&state.profile);

        let result = serde_json::json!({
            "categories": categories,
            "keywords": keywords,
        });
        Ok(json_result(&result))
    }

    #[tool(description = "Full stored profile for this user, in the export format.")]
    async fn affinity_profile(&self) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        let export = ProfileExport::new(&state.user_id, &state.profile);
        let value = serde_json::to_value(&export)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(json_result(&value))
    }

    #[tool(description = "Forget the user's search keywords. Affinity and histories are kept.")]
    async fn affinity_clear_keywords(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let ServerState {
            profile, engine, ..
        } = &mut *state;
        let cleared = engine.clear_keywords(profile);
        if cleared {
            self.queue_save(&state);
        }

        let result = serde_json::json!({
            "cleared": cleared,
            "profile": Self::summary_json(&state),
        });
        Ok(json_result(&result))
    }
}

#[tool_handler]
impl ServerHandler for AffinityServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Local personalization engine for one user.\n\n\
                 - Call affinity_record whenever the user views, likes, unlikes, collects, \
                   uncollects or searches for content.\n\
                 - Call affinity_rank with candidate items and their global counts to get them \
                   ordered for this user.\n\
                 - affinity_recommend returns the user's strongest categories and recent searches.\n\
                 - affinity_profile shows everything stored; affinity_clear_keywords forgets searches.\n\
                 Profiles live on this machine only."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{self, PersistWorker};
    use affinity_store::{MemoryProfileStore, ProfileStore};

    fn make_server() -> (AffinityServer, Arc<MemoryProfileStore>, PersistHandle, PersistWorker) {
        let store = Arc::new(MemoryProfileStore::new());
        let (handle, worker) = persist::spawn(Box::new(store.clone()));
        let catalog = vec![Category {
            id: 5,
            name: "Gardening".into(),
        }];
        let server = AffinityServer::new(
            "tester",
            UserProfile::new(),
            RankingEngine::default(),
            catalog,
            handle.clone(),
        );
        (server, store, handle, worker)
    }

    fn text_from_result(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn parse_result(result: &CallToolResult) -> serde_json::Value {
        let text = text_from_result(result);
        serde_json::from_str(&text).expect("handler should return valid JSON")
    }

    fn record(kind: &str, item: Option<i64>, cat: Option<i64>, kw: Option<&str>) -> Parameters<RecordRequest> {
        Parameters(RecordRequest {
            kind: kind.to_string(),
            item_id: item,
            category_id: cat,
            keyword: kw.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_record_updates_and_persists() {
        let (server, store, handle, worker) = make_server();

        let json = parse_result(
            &server
                .affinity_record(record("like", Some(10), Some(5), None))
                .await
                .unwrap(),
        );
        assert_eq!(json["kind"], "like");
        assert_eq!(json["changed"], true);
        assert_eq!(json["profile"]["likes"], 1);

        handle.flush().await;
        let saved = store.load("tester");
        assert!(saved.has_liked(10));
        assert_eq!(saved.affinity_for(5), Some(2.0));
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_record_rejects_bad_input() {
        let (server, store, handle, worker) = make_server();

        assert!(server.affinity_record(record("poke", Some(1), Some(1), None)).await.is_err());
        assert!(server.affinity_record(record("view", Some(1), None, None)).await.is_err());
        assert!(server.affinity_record(record("search", None, None, Some("   "))).await.is_err());

        handle.flush().await;
        assert!(store.raw("tester").is_none());
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_noop_record_is_not_queued() {
        let (server, store, handle, worker) = make_server();

        let json = parse_result(
            &server
                .affinity_record(record("unlike", Some(3), None, None))
                .await
                .unwrap(),
        );
        assert_eq!(json["changed"], false);

        handle.flush().await;
        assert!(store.raw("tester").is_none());
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_rank_prefers_affinity() {
        let (server, _store, handle, worker) = make_server();
        server
            .affinity_record(record("collect", Some(1), Some(5), None))
            .await
            .unwrap();

        let result = server
            .affinity_rank(Parameters(RankRequest {
                candidates: vec![
                    CandidateParam {
                        id: 2,
                        category_id: 9,
                        view_count: 1000,
                        like_count: 100,
                        collect_count: 50,
                    },
                    CandidateParam {
                        id: 3,
                        category_id: 5,
                        view_count: 0,
                        like_count: 0,
                        collect_count: 0,
                    },
                ],
                limit: None,
            }))
            .await
            .unwrap();
        let json = parse_result(&result);
        assert_eq!(json["count"], 2);
        assert_eq!(json["items"][0]["id"], 3);
        assert_eq!(json["items"][0]["recommendScore"], 35.0);
        assert_eq!(json["items"][1]["recommendScore"], 23.0);
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_rank_limit() {
        let (server, _store, handle, worker) = make_server();
        let candidates = (0..5)
            .map(|i| CandidateParam {
                id: i,
                category_id: 1,
                view_count: (i as u64) * 10,
                like_count: 0,
                collect_count: 0,
            })
            .collect();
        let json = parse_result(
            &server
                .affinity_rank(Parameters(RankRequest {
                    candidates,
                    limit: Some(2),
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["count"], 2);
        assert_eq!(json["items"][0]["id"], 4);
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_rank_accepts_its_own_output() {
        let (server, _store, handle, worker) = make_server();
        let req: RankRequest = serde_json::from_value(serde_json::json!({
            "candidates": [
                { "id": 1, "categoryId": 2, "viewCount": 500 },
                { "id": 2, "categoryId": 2, "viewCount": 900, "likeCount": 10 }
            ]
        }))
        .unwrap();
        let first = parse_result(&server.affinity_rank(Parameters(req)).await.unwrap());
        assert_eq!(first["items"][0]["id"], 2);

        let again: RankRequest = serde_json::from_value(serde_json::json!({
            "candidates": first["items"].clone(),
            "limit": 1
        }))
        .unwrap();
        let second = parse_result(&server.affinity_rank(Parameters(again)).await.unwrap());
        assert_eq!(second["count"], 1);
        assert_eq!(second["items"][0], first["items"][0]);
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_recommend_names_categories() {
        let (server, _store, handle, worker) = make_server();
        server
            .affinity_record(record("view", Some(1), Some(5), None))
            .await
            .unwrap();
        server
            .affinity_record(record("search", None, None, Some("  tomato   seeds ")))
            .await
            .unwrap();

        let json = parse_result(&server.affinity_recommend().await.unwrap());
        assert_eq!(json["categories"][0]["id"], 5);
        assert_eq!(json["categories"][0]["name"], "Gardening");
        assert_eq!(json["keywords"][0], "tomato seeds");
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_profile_and_clear_keywords() {
        let (server, store, handle, worker) = make_server();
        server
            .affinity_record(record("search", None, None, Some("rust")))
            .await
            .unwrap();

        let json = parse_result(&server.affinity_profile().await.unwrap());
        assert_eq!(json["version"], "1");
        assert_eq!(json["userId"], "tester");
        assert_eq!(json["profile"]["searchKeywords"][0], "rust");

        let cleared = parse_result(&server.affinity_clear_keywords().await.unwrap());
        assert_eq!(cleared["cleared"], true);
        assert_eq!(cleared["profile"]["keywords"], 0);
        let again = parse_result(&server.affinity_clear_keywords().await.unwrap());
        assert_eq!(again["cleared"], false);

        handle.flush().await;
        assert!(store.load("tester").search_keywords.is_empty());
        worker.shutdown(&handle).await;
    }

    #[tokio::test]
    async fn test_store_outage_keeps_serving() {
        let (server, store, handle, worker) = make_server();
        store.set_unavailable(true);

        server
            .affinity_record(record("like", Some(7), Some(5), None))
            .await
            .unwrap();
        handle.flush().await;

        let json = parse_result(&server.affinity_recommend().await.unwrap());
        assert_eq!(json["categories"][0]["id"], 5);
        store.set_unavailable(false);
        assert!(store.raw("tester").is_none());
        worker.shutdown(&handle).await;
    }
}
