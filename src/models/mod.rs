use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod tmdb;

pub use tmdb::{
    TmdbCastMember, TmdbCredits, TmdbCrewMember, TmdbGenre, TmdbMovieDetails, TmdbMovieSummary,
    TmdbProviderItem, TmdbRegionProviders, TmdbSearchResponse, TmdbVideo, TmdbVideos,
    TmdbWatchProviders,
};

/// Year component of a `YYYY-MM-DD` release date
pub fn release_year(release_date: Option<&str>) -> Option<i32> {
    release_date?.get(..4)?.parse().ok()
}

// ============================================================================
// Identity
// ============================================================================

/// An authenticated identity as reported by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

/// A user mirrored into the local `users` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewMember {
    pub id: u64,
    pub name: String,
    pub job: String,
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub key: String,
    pub name: String,
    pub site: String,
    pub video_type: String,
    pub official: bool,
}

/// Full catalog record for one movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDetails {
    pub id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Vec<Genre>,
    pub crew: Vec<CrewMember>,
    pub cast: Vec<CastMember>,
    pub videos: Vec<Video>,
}

impl MovieDetails {
    /// Crew members credited with the `Director` job
    pub fn directing_crew(&self) -> impl Iterator<Item = &CrewMember> {
        self.crew.iter().filter(|member| member.job == "Director")
    }

    /// Converts the catalog record into the row stored in the local movie cache.
    ///
    /// The row is keyed by `external_id`, the id the movie was requested under,
    /// not by the catalog's own id. Later lookups use the requested id, so the
    /// two must agree or the cached row is never found again.
    pub fn to_new_movie(&self, external_id: &str) -> NewMovie {
        NewMovie {
            external_id: external_id.to_string(),
            title: self.title.clone(),
            poster_path: self.poster_path.clone(),
            overview: self.overview.clone(),
            release_date: self.release_date.clone(),
            runtime: self.runtime,
            genres: self.genres.iter().map(|g| g.name.clone()).collect(),
        }
    }
}

/// One search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieSummary {
    pub id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub release_year: Option<i32>,
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoviePage {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
    pub results: Vec<MovieSummary>,
}

impl MoviePage {
    pub fn empty() -> Self {
        Self {
            page: 1,
            total_pages: 0,
            total_results: 0,
            results: Vec::new(),
        }
    }
}

// ============================================================================
// Local movie cache and watchlist
// ============================================================================

/// Local denormalized copy of catalog metadata, keyed by external id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct CachedMovie {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the local movie cache
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub external_id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Vec<String>,
}

/// "User U has movie M saved"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    pub id: Uuid,
    pub user_id: String,
    pub movie: CachedMovie,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a watchlist toggle, reported as a value rather than an error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToggleResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_on_watchlist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchlist_item_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToggleResult {
    pub fn added(watchlist_item_id: Uuid) -> Self {
        Self {
            success: true,
            is_on_watchlist: Some(true),
            watchlist_item_id: Some(watchlist_item_id),
            error: None,
        }
    }

    pub fn removed() -> Self {
        Self {
            success: true,
            is_on_watchlist: Some(false),
            watchlist_item_id: None,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            is_on_watchlist: None,
            watchlist_item_id: None,
            error: Some(error.to_string()),
        }
    }
}

// ============================================================================
// Streaming availability
// ============================================================================

/// Shape shared by every kind of provider offer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderItem {
    pub provider_id: u64,
    pub provider_name: String,
    pub logo_url: Option<String>,
    pub display_priority: Option<i32>,
}

/// How a provider makes a movie available
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderOffer {
    Free(ProviderItem),
    Subscription(ProviderItem),
    Rent(ProviderItem),
    Buy(ProviderItem),
}

impl ProviderOffer {
    pub fn item(&self) -> &ProviderItem {
        match self {
            ProviderOffer::Free(item)
            | ProviderOffer::Subscription(item)
            | ProviderOffer::Rent(item)
            | ProviderOffer::Buy(item) => item,
        }
    }
}

/// Streaming availability for a single movie in one region
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingAvailability {
    pub external_id: String,
    pub region: String,
    pub link: Option<String>,
    pub offers: Vec<ProviderOffer>,
    pub cached_at: DateTime<Utc>,
}

// ============================================================================
// Read models
// ============================================================================

/// Resolved identity for the current request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user: Option<Principal>,
    pub is_authenticated: bool,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            user: None,
            is_authenticated: false,
        }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            user: Some(principal),
            is_authenticated: true,
        }
    }
}

/// Everything the movie detail page shows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieView {
    pub id: String,
    pub title: String,
    pub release_year: Option<i32>,
    pub director: String,
    pub runtime_label: Option<String>,
    pub genres: Vec<String>,
    pub overview: Option<String>,
    pub poster_url: String,
    pub trailer_url: Option<String>,
    pub cast: Vec<CastMember>,
    pub offers: Vec<ProviderOffer>,
    pub is_on_watchlist: bool,
    pub is_authenticated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> ProviderItem {
        ProviderItem {
            provider_id: 8,
            provider_name: name.to_string(),
            logo_url: None,
            display_priority: Some(1),
        }
    }

    #[test]
    fn test_provider_offer_serializes_with_kind_tag() {
        let offer = ProviderOffer::Subscription(item("Netflix"));
        let json = serde_json::to_value(&offer).unwrap();

        assert_eq!(json["kind"], "subscription");
        assert_eq!(json["provider_name"], "Netflix");

        let back: ProviderOffer = serde_json::from_value(json).unwrap();
        assert_eq!(back, offer);
    }

    #[test]
    fn test_provider_offer_item_shared_shape() {
        let offers = [
            ProviderOffer::Free(item("Tubi")),
            ProviderOffer::Rent(item("Apple TV")),
            ProviderOffer::Buy(item("Vudu")),
        ];
        let names: Vec<&str> = offers
            .iter()
            .map(|o| o.item().provider_name.as_str())
            .collect();
        assert_eq!(names, vec!["Tubi", "Apple TV", "Vudu"]);
    }

    #[test]
    fn test_to_new_movie_flattens_genres() {
        let details = MovieDetails {
            id: "238".to_string(),
            title: "The Godfather".to_string(),
            poster_path: Some("/godfather.jpg".to_string()),
            backdrop_path: None,
            overview: Some("Spanning the years 1945 to 1955".to_string()),
            release_date: Some("1972-03-14".to_string()),
            runtime: Some(175),
            genres: vec![
                Genre {
                    id: 18,
                    name: "Drama".to_string(),
                },
                Genre {
                    id: 80,
                    name: "Crime".to_string(),
                },
            ],
            crew: vec![],
            cast: vec![],
            videos: vec![],
        };

        let new_movie = details.to_new_movie("238");
        assert_eq!(new_movie.external_id, "238");
        assert_eq!(new_movie.genres, vec!["Drama", "Crime"]);
        assert_eq!(new_movie.runtime, Some(175));
    }

    #[test]
    fn test_toggle_result_failure_omits_state() {
        let json = serde_json::to_value(ToggleResult::failed("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("is_on_watchlist").is_none());
    }
}
