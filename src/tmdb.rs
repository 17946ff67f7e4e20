use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::fetch::{fetch_json, Notices, RetryPolicy};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
const LANGUAGE: &str = "en-US";
const MAX_RECOMMENDATIONS: usize = 5;

/// Catalog lookups behind an object-safe trait so the serving layer can be
/// tested with a fake. None of these raise to the caller: absence or
/// emptiness is the failure signal, and diagnostics have already been pushed
/// to the notices sink by the time they return.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn find_movie_id(&self, title: &str, notices: &mut Notices) -> Option<i64>;
    async fn recommendations(&self, movie_id: i64, notices: &mut Notices) -> Vec<MovieSummary>;
    async fn poster_url(&self, movie_id: i64, notices: &mut Notices) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct MovieSummary {
    pub id: i64,
    pub title: String,
    pub release_year: String,
    pub rating: f64,
    pub overview: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationEntry {
    id: i64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    overview: String,
}

impl From<RecommendationEntry> for MovieSummary {
    fn from(entry: RecommendationEntry) -> Self {
        let release_year = entry
            .release_date
            .as_deref()
            .map(|date| date.chars().take(4).collect())
            .unwrap_or_default();
        Self {
            id: entry.id,
            title: entry.title,
            release_year,
            rating: entry.vote_average,
            overview: entry.overview,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    image_base: String,
    policy: RetryPolicy,
}

#[derive(Debug, Default)]
pub struct TmdbClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    image_base: Option<String>,
    policy: RetryPolicy,
}

impl TmdbClientBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL (for a local mock server in tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn image_base(mut self, url: impl Into<String>) -> Self {
        self.image_base = Some(url.into());
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.policy.retry_delay = delay;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.policy.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<TmdbClient> {
        let api_key = self.api_key.context("api_key is required")?;
        if api_key.trim().is_empty() {
            bail!("API Key is missing! Please set it in your .env file.");
        }
        Ok(TmdbClient {
            client: Client::new(),
            api_key,
            base_url: self.base_url.unwrap_or_else(|| TMDB_BASE.to_string()),
            image_base: self.image_base.unwrap_or_else(|| IMAGE_BASE.to_string()),
            policy: self.policy,
        })
    }
}

impl TmdbClient {
    pub fn builder() -> TmdbClientBuilder {
        TmdbClientBuilder::default()
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        Self::builder().api_key(api_key).build()
    }

    fn base_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("api_key", self.api_key.clone()),
            ("language", LANGUAGE.to_string()),
        ]
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn find_movie_id(&self, title: &str, notices: &mut Notices) -> Option<i64> {
        #[derive(Deserialize)]
        struct SearchHit {
            id: i64,
        }
        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            results: Vec<SearchHit>,
        }

        let url = format!("{}/search/movie", self.base_url);
        let mut query = self.base_query();
        query.push(("query", title.to_string()));
        let found = fetch_json::<SearchResponse>(&self.client, &url, &query, &self.policy, notices)
            .await
            .ok()
            .and_then(|data| data.results.first().map(|hit| hit.id));
        if found.is_none() {
            notices.error("No movie found. Try another name.");
        }
        found
    }

    async fn recommendations(&self, movie_id: i64, notices: &mut Notices) -> Vec<MovieSummary> {
        #[derive(Deserialize)]
        struct RecommendationsResponse {
            #[serde(default)]
            results: Vec<RecommendationEntry>,
        }

        let url = format!("{}/movie/{}/recommendations", self.base_url, movie_id);
        let query = self.base_query();
        match fetch_json::<RecommendationsResponse>(&self.client, &url, &query, &self.policy, notices)
            .await
        {
            Ok(data) => data
                .results
                .into_iter()
                .take(MAX_RECOMMENDATIONS)
                .map(MovieSummary::from)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    async fn poster_url(&self, movie_id: i64, notices: &mut Notices) -> Option<String> {
        #[derive(Deserialize)]
        struct MovieDetail {
            #[serde(default)]
            poster_path: Option<String>,
        }

        let url = format!("{}/movie/{}", self.base_url, movie_id);
        let query = self.base_query();
        let detail = fetch_json::<MovieDetail>(&self.client, &url, &query, &self.policy, notices)
            .await
            .ok()?;
        detail
            .poster_path
            .filter(|path| !path.is_empty())
            .map(|path| format!("{}{}", self.image_base, path))
    }
}
