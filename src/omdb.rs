use crate::config::Config;
use crate::models::{MovieDetail, SearchResultSummary};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const NO_MOVIES_FOUND: &str = "No movies found";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong";

/// Outcome of a title search that reached the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<SearchResultSummary>),
    NotFound,
}

#[async_trait]
pub trait OmdbApi: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchOutcome>;
    async fn fetch_detail(&self, id: &str) -> Result<MovieDetail>;
}

#[derive(Debug, Clone)]
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("building HTTP client failed")?;
        Ok(Self {
            client,
            base_url: config.omdb_base_url.clone(),
            api_key: config.omdb_api_key.clone(),
        })
    }

    fn url(&self, param: &str, value: &str) -> String {
        format!(
            "{}?apikey={}&{param}={}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(value)
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        // reqwest errors carry the URL, which embeds the API key.
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!(e.without_url()))
            .context("request failed")?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| anyhow!(e.without_url()))
            .context("reading body failed")?;
        if !status.is_success() {
            debug!(%status, body = %text, "OMDb returned an error status");
            bail!(SOMETHING_WENT_WRONG);
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl OmdbApi for OmdbClient {
    async fn search(&self, query: &str) -> Result<SearchOutcome> {
        let data: SearchResponse = self.get_json(&self.url("s", query)).await?;
        data.into_outcome()
    }

    async fn fetch_detail(&self, id: &str) -> Result<MovieDetail> {
        let data: DetailResponse = self.get_json(&self.url("i", id)).await?;
        data.into_detail(id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResponse {
    search: Option<Vec<SearchRow>>,
    response: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "Poster", default)]
    poster: String,
}

impl SearchResponse {
    fn into_outcome(self) -> Result<SearchOutcome> {
        if is_false(self.response.as_deref()) {
            debug!(error = ?self.error, "OMDb search returned no results");
            return Ok(SearchOutcome::NotFound);
        }
        let rows = self
            .search
            .ok_or_else(|| anyhow!("unexpected search payload: missing Search"))?;
        Ok(SearchOutcome::Found(
            rows.into_iter()
                .map(|r| SearchResultSummary {
                    id: r.imdb_id,
                    title: r.title,
                    year: r.year,
                    poster_url: r.poster,
                })
                .collect(),
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DetailResponse {
    title: String,
    year: String,
    poster: String,
    runtime: String,
    #[serde(rename = "imdbRating")]
    imdb_rating: String,
    plot: String,
    released: String,
    actors: String,
    director: String,
    genre: String,
    response: Option<String>,
    error: Option<String>,
}

impl DetailResponse {
    fn into_detail(self, requested_id: &str) -> Result<MovieDetail> {
        if is_false(self.response.as_deref()) {
            bail!(
                "{}",
                self.error
                    .unwrap_or_else(|| format!("No movie found for id '{requested_id}'"))
            );
        }
        Ok(MovieDetail {
            // Keyed by what was selected, so watched-list lookups line up.
            id: requested_id.to_string(),
            title: self.title,
            year: self.year,
            poster_url: self.poster,
            runtime_minutes: self.runtime,
            imdb_rating: self.imdb_rating.trim().parse().unwrap_or(0.0),
            plot: self.plot,
            release_date: self.released,
            actors: self.actors,
            director: self.director,
            genre: self.genre,
        })
    }
}

fn is_false(response: Option<&str>) -> bool {
    response.is_some_and(|r| r.eq_ignore_ascii_case("false"))
}
