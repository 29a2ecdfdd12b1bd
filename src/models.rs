use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_USER_RATING: u8 = 1;
pub const MAX_USER_RATING: u8 = 10;

/// One row of a title search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultSummary {
    pub id: String,
    pub title: String,
    pub year: String,
    pub poster_url: String,
}

/// Full record for a single id, fetched fresh on every selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: String,
    pub title: String,
    pub year: String,
    pub poster_url: String,
    /// Raw gateway value, e.g. "148 min".
    pub runtime_minutes: String,
    pub imdb_rating: f64,
    pub plot: String,
    pub release_date: String,
    pub actors: String,
    pub director: String,
    pub genre: String,
}

/// A user-authored watched-list record. Field names match the persisted layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedEntry {
    #[serde(rename = "imdbID")]
    pub id: String,
    pub title: String,
    pub year: String,
    #[serde(rename = "poster")]
    pub poster_url: String,
    #[serde(rename = "imdbRating", default, deserialize_with = "lenient_rating")]
    pub imdb_rating: f64,
    #[serde(rename = "userRating")]
    pub user_rating: u8,
    #[serde(rename = "runtime", default, deserialize_with = "lenient_runtime")]
    pub runtime_minutes: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<N> {
    Number(N),
    Text(String),
}

// Older lists store runtime as text ("148") and an unknown rating as null.
fn lenient_runtime<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText<u32>>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => n,
        Some(NumberOrText::Text(s)) => parse_runtime_minutes(&s),
        None => 0,
    })
}

fn lenient_rating<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText<f64>>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => n,
        Some(NumberOrText::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    })
}

impl WatchedEntry {
    pub fn from_detail(detail: &MovieDetail, user_rating: u8) -> Result<Self> {
        if !(MIN_USER_RATING..=MAX_USER_RATING).contains(&user_rating) {
            bail!(
                "user rating must be between {} and {}, got {}",
                MIN_USER_RATING,
                MAX_USER_RATING,
                user_rating
            );
        }
        Ok(Self {
            id: detail.id.clone(),
            title: detail.title.clone(),
            year: detail.year.clone(),
            poster_url: detail.poster_url.clone(),
            imdb_rating: detail.imdb_rating,
            user_rating,
            runtime_minutes: parse_runtime_minutes(&detail.runtime_minutes),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WatchSummary {
    pub count: usize,
    pub mean_imdb_rating: f64,
    pub mean_user_rating: f64,
    pub mean_runtime_minutes: f64,
}

/// Leading integer of a runtime string ("148 min" -> 148). Anything else is 0.
pub fn parse_runtime_minutes(raw: &str) -> u32 {
    raw.split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail() -> MovieDetail {
        MovieDetail {
            id: "tt1375666".to_string(),
            title: "Inception".to_string(),
            year: "2010".to_string(),
            poster_url: "https://m.media-amazon.com/inception.jpg".to_string(),
            runtime_minutes: "148 min".to_string(),
            imdb_rating: 8.8,
            plot: "A thief who steals corporate secrets.".to_string(),
            release_date: "16 Jul 2010".to_string(),
            actors: "Leonardo DiCaprio".to_string(),
            director: "Christopher Nolan".to_string(),
            genre: "Action, Sci-Fi".to_string(),
        }
    }

    #[test]
    fn parses_runtime_prefix() {
        assert_eq!(parse_runtime_minutes("148 min"), 148);
        assert_eq!(parse_runtime_minutes("90"), 90);
        assert_eq!(parse_runtime_minutes("N/A"), 0);
        assert_eq!(parse_runtime_minutes(""), 0);
    }

    #[test]
    fn builds_entry_from_detail() {
        let entry = WatchedEntry::from_detail(&detail(), 9).unwrap();
        assert_eq!(entry.id, "tt1375666");
        assert_eq!(entry.runtime_minutes, 148);
        assert_eq!(entry.user_rating, 9);
        assert_eq!(entry.imdb_rating, 8.8);
    }

    #[test]
    fn rejects_out_of_range_rating() {
        assert!(WatchedEntry::from_detail(&detail(), 0).is_err());
        assert!(WatchedEntry::from_detail(&detail(), 11).is_err());
    }

    #[test]
    fn reads_entries_with_text_runtime_and_null_rating() {
        let raw = r#"{"imdbID":"tt1375666","title":"Inception","year":"2010","poster":"https://img/inception.jpg","imdbRating":null,"userRating":9,"runtime":"148"}"#;
        let entry: WatchedEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.runtime_minutes, 148);
        assert_eq!(entry.imdb_rating, 0.0);

        let raw = r#"{"imdbID":"tt1","title":"T","year":"2001","poster":"N/A","imdbRating":"7.1","userRating":5,"runtime":"N/A"}"#;
        let entry: WatchedEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.runtime_minutes, 0);
        assert_eq!(entry.imdb_rating, 7.1);
    }

    #[test]
    fn watched_entry_uses_storage_field_names() {
        let entry = WatchedEntry::from_detail(&detail(), 10).unwrap();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["imdbID"], "tt1375666");
        assert_eq!(value["userRating"], 10);
        assert_eq!(value["runtime"], 148);
        assert_eq!(value["poster"], "https://m.media-amazon.com/inception.jpg");
    }
}
