pub mod movies;
pub mod providers;
pub mod watchlist;

pub use movies::MovieViewService;
pub use providers::{MovieCatalog, StreamingProvider, TmdbProvider};
pub use watchlist::WatchlistService;
