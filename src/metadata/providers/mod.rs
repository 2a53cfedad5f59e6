pub mod tmdb;

pub use tmdb::TmdbProvider;
