//! In-memory stand-ins for the external dependencies, so the router can be
//! exercised end to end without Postgres, Redis or TMDB.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use uuid::Uuid;

use cinelist_api::{
    db::{Cache, MovieCache, UserStore, WatchlistStore},
    error::{AppError, AppResult},
    middleware::HeaderIdentityProvider,
    models::{
        CachedMovie, CrewMember, Genre, MovieDetails, MoviePage, MovieSummary, NewMovie,
        Principal, ProviderItem, ProviderOffer, StreamingAvailability, User, WatchlistEntry,
    },
    routes::{create_router, AppState, Dependencies},
    services::{MovieCatalog, StreamingProvider},
};

pub const USER_HEADER: &str = "x-forwarded-user";
pub const EMAIL_HEADER: &str = "x-forwarded-email";
pub const SIGN_IN_URL: &str = "/api/auth/login";

// ============================================================================
// Catalog and streaming
// ============================================================================

#[derive(Default)]
pub struct FakeCatalog {
    movies: HashMap<String, MovieDetails>,
    pub lookups: AtomicUsize,
    pub failing: AtomicBool,
}

impl FakeCatalog {
    pub fn with_movies(movies: Vec<MovieDetails>) -> Self {
        Self {
            movies: movies.into_iter().map(|m| (m.id.clone(), m)).collect(),
            ..Default::default()
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MovieCatalog for FakeCatalog {
    async fn lookup(&self, external_id: &str) -> AppResult<Option<MovieDetails>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::ExternalApi("TMDB returned status 503".to_string()));
        }
        // TMDB resolves zero-padded ids to the canonical movie
        Ok(self.movies.get(external_id.trim_start_matches('0')).cloned())
    }

    async fn search(&self, query: &str, page: u32) -> AppResult<MoviePage> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(MoviePage::empty());
        }

        let mut results: Vec<MovieSummary> = self
            .movies
            .values()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .map(|m| MovieSummary {
                id: m.id.clone(),
                title: m.title.clone(),
                poster_path: m.poster_path.clone(),
                overview: m.overview.clone(),
                release_date: m.release_date.clone(),
                release_year: None,
            })
            .collect();
        results.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(MoviePage {
            page: page.max(1),
            total_pages: 1,
            total_results: results.len() as u32,
            results,
        })
    }

    fn name(&self) -> &'static str {
        "fake-catalog"
    }
}

pub struct FakeStreaming;

#[async_trait]
impl StreamingProvider for FakeStreaming {
    async fn fetch_availability(&self, external_id: &str) -> AppResult<StreamingAvailability> {
        Ok(StreamingAvailability {
            external_id: external_id.to_string(),
            region: "US".to_string(),
            link: None,
            offers: vec![ProviderOffer::Subscription(ProviderItem {
                provider_id: 8,
                provider_name: "Netflix".to_string(),
                logo_url: None,
                display_priority: Some(1),
            })],
            cached_at: Utc::now(),
        })
    }

    fn name(&self) -> &'static str {
        "fake-streaming"
    }
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Default)]
pub struct InMemoryMovies {
    rows: Mutex<Vec<CachedMovie>>,
}

impl InMemoryMovies {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn by_id(&self, id: Uuid) -> Option<CachedMovie> {
        self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned()
    }
}

#[async_trait]
impl MovieCache for InMemoryMovies {
    async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<CachedMovie>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.external_id == external_id)
            .cloned())
    }

    async fn insert(&self, movie: NewMovie) -> AppResult<CachedMovie> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|m| m.external_id == movie.external_id) {
            return Err(AppError::ConstraintViolation(format!(
                "movie {} already cached",
                movie.external_id
            )));
        }

        let cached = CachedMovie {
            id: Uuid::new_v4(),
            external_id: movie.external_id,
            title: movie.title,
            poster_path: movie.poster_path,
            overview: movie.overview,
            release_date: movie.release_date,
            runtime: movie.runtime,
            genres: movie.genres,
            created_at: Utc::now(),
        };
        rows.push(cached.clone());
        Ok(cached)
    }
}

struct EntryRow {
    id: Uuid,
    user_id: String,
    movie_id: Uuid,
    created_at: chrono::DateTime<Utc>,
}

pub struct InMemoryWatchlist {
    movies: Arc<InMemoryMovies>,
    rows: Mutex<Vec<EntryRow>>,
}

impl InMemoryWatchlist {
    pub fn new(movies: Arc<InMemoryMovies>) -> Self {
        Self {
            movies,
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn count_for(&self, user_id: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl WatchlistStore for InMemoryWatchlist {
    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>> {
        let rows = self.rows.lock().unwrap();
        let mut entries: Vec<WatchlistEntry> = rows
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| {
                self.movies.by_id(r.movie_id).map(|movie| WatchlistEntry {
                    id: r.id,
                    user_id: r.user_id.clone(),
                    movie,
                    created_at: r.created_at,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn add(&self, user_id: &str, movie_id: Uuid) -> AppResult<Uuid> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.user_id == user_id && r.movie_id == movie_id)
        {
            return Err(AppError::ConstraintViolation(
                "movie already on watchlist".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        rows.push(EntryRow {
            id,
            user_id: user_id.to_string(),
            movie_id,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn remove(&self, user_id: &str, movie_id: Uuid) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.user_id == user_id && r.movie_id == movie_id));
        if rows.len() == before {
            return Err(AppError::ConstraintViolation(
                "movie is not on watchlist".to_string(),
            ));
        }
        Ok(())
    }

    async fn exists(&self, user_id: &str, movie_id: Uuid) -> AppResult<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.user_id == user_id && r.movie_id == movie_id))
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    rows: Mutex<HashMap<String, User>>,
}

impl InMemoryUsers {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn ensure(&self, principal: &Principal) -> AppResult<User> {
        let mut rows = self.rows.lock().unwrap();
        let user = rows.entry(principal.id.clone()).or_insert_with(|| User {
            id: principal.id.clone(),
            email: principal.email.clone(),
            created_at: Utc::now(),
        });
        Ok(user.clone())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn godfather() -> MovieDetails {
    MovieDetails {
        id: "238".to_string(),
        title: "The Godfather".to_string(),
        poster_path: Some("/3bhkrj58Vtu7enYsRolD1fZdja1.jpg".to_string()),
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
        crew: vec![CrewMember {
            id: 1776,
            name: "Francis Ford Coppola".to_string(),
            job: "Director".to_string(),
            department: "Directing".to_string(),
        }],
        cast: vec![],
        videos: vec![],
    }
}

pub fn heat() -> MovieDetails {
    MovieDetails {
        id: "949".to_string(),
        title: "Heat".to_string(),
        poster_path: None,
        release_date: Some("1995-12-15".to_string()),
        runtime: Some(170),
        crew: vec![],
        ..godfather()
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub catalog: Arc<FakeCatalog>,
    pub movies: Arc<InMemoryMovies>,
    pub watchlist: Arc<InMemoryWatchlist>,
    pub users: Arc<InMemoryUsers>,
}

impl TestApp {
    pub fn new() -> Self {
        let catalog = Arc::new(FakeCatalog::with_movies(vec![godfather(), heat()]));
        let movies = Arc::new(InMemoryMovies::default());
        let watchlist = Arc::new(InMemoryWatchlist::new(movies.clone()));
        let users = Arc::new(InMemoryUsers::default());
        let identity = HeaderIdentityProvider::new(USER_HEADER, EMAIL_HEADER).unwrap();

        let state = Arc::new(AppState::new(Dependencies {
            catalog: catalog.clone(),
            streaming: Arc::new(FakeStreaming),
            movies: movies.clone(),
            watchlist: watchlist.clone(),
            users: users.clone(),
            identity: Arc::new(identity),
            cache: Cache::disabled().0,
            image_url: "https://image.tmdb.org/t/p/w400".to_string(),
            sign_in_url: SIGN_IN_URL.to_string(),
        }));

        Self {
            server: TestServer::new(create_router(state)).unwrap(),
            catalog,
            movies,
            watchlist,
            users,
        }
    }
}
