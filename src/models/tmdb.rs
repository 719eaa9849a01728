//! Raw TMDB API payloads and their conversion into catalog models.

use serde::Deserialize;

use super::{
    release_year, CastMember, CrewMember, Genre, MovieDetails, MoviePage, MovieSummary,
    ProviderItem, ProviderOffer, Video,
};

/// Response from GET /movie/{id}?append_to_response=credits,videos
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
    #[serde(default)]
    pub videos: Option<TmdbVideos>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCastMember {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCrewMember {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbVideos {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideo {
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
    #[serde(default)]
    pub official: bool,
}

impl From<TmdbMovieDetails> for MovieDetails {
    fn from(movie: TmdbMovieDetails) -> Self {
        let credits = movie.credits.unwrap_or_default();
        let videos = movie.videos.unwrap_or_default();

        MovieDetails {
            id: movie.id.to_string(),
            title: movie.title,
            poster_path: movie.poster_path,
            backdrop_path: movie.backdrop_path,
            overview: movie.overview,
            release_date: movie.release_date,
            runtime: movie.runtime,
            genres: movie
                .genres
                .into_iter()
                .map(|g| Genre {
                    id: g.id,
                    name: g.name,
                })
                .collect(),
            crew: credits
                .crew
                .into_iter()
                .map(|c| CrewMember {
                    id: c.id,
                    name: c.name,
                    job: c.job,
                    department: c.department,
                })
                .collect(),
            cast: credits
                .cast
                .into_iter()
                .map(|c| CastMember {
                    id: c.id,
                    name: c.name,
                    character: c.character,
                    profile_path: c.profile_path,
                    order: c.order,
                })
                .collect(),
            videos: videos
                .results
                .into_iter()
                .map(|v| Video {
                    key: v.key,
                    name: v.name,
                    site: v.site,
                    video_type: v.video_type,
                    official: v.official,
                })
                .collect(),
        }
    }
}

/// Response from GET /search/movie
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResponse {
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub results: Vec<TmdbMovieSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieSummary {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl From<TmdbMovieSummary> for MovieSummary {
    fn from(movie: TmdbMovieSummary) -> Self {
        let release_year = release_year(movie.release_date.as_deref());
        MovieSummary {
            id: movie.id.to_string(),
            title: movie.title,
            poster_path: movie.poster_path,
            overview: movie.overview,
            release_date: movie.release_date,
            release_year,
        }
    }
}

impl From<TmdbSearchResponse> for MoviePage {
    fn from(response: TmdbSearchResponse) -> Self {
        MoviePage {
            page: response.page,
            total_pages: response.total_pages,
            total_results: response.total_results,
            results: response.results.into_iter().map(MovieSummary::from).collect(),
        }
    }
}

/// Response from GET /movie/{id}/watch/providers
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbWatchProviders {
    #[serde(default)]
    pub results: std::collections::HashMap<String, TmdbRegionProviders>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbRegionProviders {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub flatrate: Vec<TmdbProviderItem>,
    #[serde(default)]
    pub free: Vec<TmdbProviderItem>,
    #[serde(default)]
    pub ads: Vec<TmdbProviderItem>,
    #[serde(default)]
    pub rent: Vec<TmdbProviderItem>,
    #[serde(default)]
    pub buy: Vec<TmdbProviderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProviderItem {
    pub provider_id: u64,
    pub provider_name: String,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub display_priority: Option<i32>,
}

impl TmdbProviderItem {
    fn into_item(self, image_url: &str) -> ProviderItem {
        ProviderItem {
            provider_id: self.provider_id,
            provider_name: self.provider_name,
            logo_url: self.logo_path.map(|path| format!("{}{}", image_url, path)),
            display_priority: self.display_priority,
        }
    }
}

impl TmdbRegionProviders {
    /// Flattens TMDB's per-kind lists into tagged offers, subscription first
    pub fn into_offers(self, image_url: &str) -> Vec<ProviderOffer> {
        let mut offers = Vec::new();
        offers.extend(
            self.flatrate
                .into_iter()
                .map(|p| ProviderOffer::Subscription(p.into_item(image_url))),
        );
        offers.extend(
            self.free
                .into_iter()
                .chain(self.ads)
                .map(|p| ProviderOffer::Free(p.into_item(image_url))),
        );
        offers.extend(
            self.rent
                .into_iter()
                .map(|p| ProviderOffer::Rent(p.into_item(image_url))),
        );
        offers.extend(
            self.buy
                .into_iter()
                .map(|p| ProviderOffer::Buy(p.into_item(image_url))),
        );
        offers
    }
}
