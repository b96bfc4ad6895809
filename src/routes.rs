//! HTTP surface. Every data route builds one SPARQL query, sends it to the
//! backend and relays the JSON result set unchanged.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::{empty_result, SparqlBackend};
use crate::errors::{ApiError, ApiResult, IndexError, QueryError};
use crate::matcher::MatchOptions;
use crate::models::{FilterCategory, IndexStatus, MatchResult};
use crate::queries::{self, parse_exclude_trivial, AdvancedSearch, Page};
use crate::title_index::TitleIndex;
use crate::vocabulary::VocabularyStore;

/// Columns of a tune search result, used for the empty "no match" answer.
const TUNE_VARS: [&str; 5] = ["title", "tuneType", "key", "signature", "id"];

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn SparqlBackend>,
    pub titles: Arc<TitleIndex>,
    pub vocabulary: Arc<VocabularyStore>,
    pub match_options: MatchOptions,
}

impl AppState {
    pub fn new(backend: Arc<dyn SparqlBackend>, match_options: MatchOptions) -> Self {
        Self {
            backend,
            titles: Arc::new(TitleIndex::new()),
            vocabulary: Arc::new(VocabularyStore::new()),
            match_options,
        }
    }

    async fn run(&self, query: String) -> ApiResult<Json<Value>> {
        Ok(Json(self.backend.select(&query).await?))
    }

    /// Fuzzy-match `query` against the title index, loading it on first use.
    async fn title_matches(&self, query: &str) -> ApiResult<Vec<MatchResult>> {
        match self.titles.best_matches(query, self.match_options) {
            Err(IndexError::NotLoaded) => {
                // failure is already logged by the index
                if self.titles.ensure_loaded(self.backend.as_ref()).await.is_err() {
                    return Err(IndexError::NotLoaded.into());
                }
                Ok(self.titles.best_matches(query, self.match_options)?)
            }
            other => Ok(other?),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new().nest("/api", api_routes()).with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/titles/refresh", post(refresh_titles))
        .route("/search", get(search))
        .route("/similarity-measures", get(similarity_measures))
        .route("/patterns", get(patterns))
        .route("/common_patterns", get(common_patterns))
        .route("/neighbour_patterns", get(neighbour_patterns))
        .route("/neighbour_tunes", get(neighbour_tunes))
        .route("/neighbour_tunes_by_tune", get(neighbour_tunes_by_tune))
        .route("/tune_by_id", get(tune_by_id))
        .route("/tuneFamilyMembers", get(tune_family_members))
        .route("/corpora", get(corpora))
        .route("/keys", get(keys))
        .route("/time_signatures", get(time_signatures))
        .route("/tune_types", get(tune_types))
        .route("/kg_version", get(kg_version))
}

// ============================================================================
// Parameters
// ============================================================================

/// `Query` whose rejection is reported like every other bad parameter,
/// as a JSON 400.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(params)) => Ok(ApiQuery(params)),
            Err(rejection) => Err(QueryError::invalid("query", rejection.body_text()).into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    search_type: Option<String>,
    search_term: Option<String>,
    title: Option<String>,
    pattern: Option<String>,
    corpus: Option<String>,
    tune_type: Option<String>,
    key: Option<String>,
    time_signature: Option<String>,
}

impl SearchParams {
    fn advanced(&self) -> AdvancedSearch {
        AdvancedSearch::new(self.title.as_deref(), self.pattern.as_deref())
            .with_filter(FilterCategory::Corpus, self.corpus.as_deref())
            .with_filter(FilterCategory::TuneType, self.tune_type.as_deref())
            .with_filter(FilterCategory::Key, self.key.as_deref())
            .with_filter(FilterCategory::TimeSignature, self.time_signature.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuneParams {
    id: Option<String>,
    prev: Option<String>,
    pattern: Option<String>,
    family: Option<String>,
    click_num: Option<String>,
    exclude_trivial_patterns: Option<String>,
}

impl TuneParams {
    fn page(&self) -> Result<Page, QueryError> {
        Page::from_click(required(&self.click_num, "clickNum")?)
    }

    fn exclude_trivial(&self) -> Result<bool, QueryError> {
        parse_exclude_trivial(self.exclude_trivial_patterns.as_deref())
    }
}

/// A present, non-blank parameter value.
fn required<'a>(value: &'a Option<String>, param: &str) -> Result<&'a str, QueryError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| QueryError::MissingParameter(param.to_string()))
}

// ============================================================================
// Search
// ============================================================================

async fn search(State(state): State<AppState>, ApiQuery(params): ApiQuery<SearchParams>) -> ApiResult<Json<Value>> {
    match required(&params.search_type, "searchType")? {
        "title" => {
            let term = required(&params.search_term, "searchTerm")?;
            let matches = state.title_matches(term).await?;
            if matches.is_empty() {
                return Ok(Json(empty_result(&TUNE_VARS)));
            }
            state.run(queries::tune_by_title(&matches)).await
        }
        "pattern" => {
            let term = required(&params.search_term, "searchTerm")?;
            state.run(queries::pattern_search(term)).await
        }
        "advanced" => {
            let advanced = params.advanced();
            state.vocabulary.check(&advanced)?;
            let matches = match &advanced.title {
                Some(title) => {
                    let matches = state.title_matches(title).await?;
                    if matches.is_empty() {
                        return Ok(Json(empty_result(&TUNE_VARS)));
                    }
                    matches
                }
                None => Vec::new(),
            };
            state.run(queries::advanced_search(&advanced, &matches)).await
        }
        other => Err(QueryError::invalid(
            "searchType",
            format!("'{}' is not one of title, pattern, advanced", other),
        )
        .into()),
    }
}

/// Names of the measures combined by the title scorer.
async fn similarity_measures() -> Json<Value> {
    Json(json!(["ratio", "token_sort_ratio", "token_set_ratio"]))
}

// ============================================================================
// Patterns and Network
// ============================================================================

async fn patterns(State(state): State<AppState>, ApiQuery(params): ApiQuery<TuneParams>) -> ApiResult<Json<Value>> {
    let id = required(&params.id, "id")?;
    let query = queries::most_common_patterns(id, params.exclude_trivial()?);
    state.run(query).await
}

async fn common_patterns(State(state): State<AppState>, ApiQuery(params): ApiQuery<TuneParams>) -> ApiResult<Json<Value>> {
    let id = required(&params.id, "id")?;
    let prev = required(&params.prev, "prev")?;
    state.run(queries::common_patterns(id, prev)).await
}

async fn neighbour_patterns(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TuneParams>,
) -> ApiResult<Json<Value>> {
    let id = required(&params.id, "id")?;
    let query = queries::neighbour_patterns(id, params.page()?, params.exclude_trivial()?);
    state.run(query).await
}

async fn neighbour_tunes(State(state): State<AppState>, ApiQuery(params): ApiQuery<TuneParams>) -> ApiResult<Json<Value>> {
    let pattern = required(&params.pattern, "pattern")?;
    state.run(queries::neighbour_tunes_by_pattern(pattern, params.page()?)).await
}

async fn neighbour_tunes_by_tune(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TuneParams>,
) -> ApiResult<Json<Value>> {
    let id = required(&params.id, "id")?;
    state.run(queries::neighbour_tunes_by_tune(id, params.page()?)).await
}

// ============================================================================
// Tune Pages and Listings
// ============================================================================

async fn tune_by_id(State(state): State<AppState>, ApiQuery(params): ApiQuery<TuneParams>) -> ApiResult<Json<Value>> {
    let id = required(&params.id, "id")?;
    state.run(queries::tune_data(id)).await
}

async fn tune_family_members(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TuneParams>,
) -> ApiResult<Json<Value>> {
    let family = required(&params.family, "family")?;
    state.run(queries::tune_family_members(family)).await
}

async fn corpora(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.run(queries::corpus_list()).await
}

async fn keys(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.run(queries::keys_list()).await
}

async fn time_signatures(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.run(queries::time_signature_list()).await
}

async fn tune_types(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.run(queries::tune_type_list()).await
}

async fn kg_version(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.run(queries::kg_version()).await
}

// ============================================================================
// Index Lifecycle
// ============================================================================

async fn health(State(state): State<AppState>) -> Json<Value> {
    let titles: IndexStatus = state.titles.status();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "titles": titles,
        "vocabulary_loaded": state.vocabulary.get().is_some(),
    }))
}

/// Rebuild the title index and filter vocabulary now. A failed title
/// refresh fails the request; a failed vocabulary refresh is reported in
/// the body and the previous vocabulary stays in use.
async fn refresh_titles(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .titles
        .refresh(state.backend.as_ref())
        .await
        .map_err(IndexError::from)?;
    let vocabulary_refreshed = state.vocabulary.load(state.backend.as_ref()).await.is_ok();
    let titles: IndexStatus = state.titles.status();
    Ok(Json(json!({
        "titles": titles,
        "vocabulary_refreshed": vocabulary_refreshed,
        "vocabulary_loaded": state.vocabulary.get().is_some(),
    })))
}
