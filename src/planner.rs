//! Destination path planning for the library tree.
//!
//! Pure mapping from (candidate, guess) to a canonical path under the
//! library root, in the layout Plex expects:
//!
//! - Movies: `Movies/Title (Year) {tmdb-ID}/Title (Year) {tmdb-ID}.ext`
//! - TV: `TV Shows/Show (Year)/Season NN/Show (Year) - sNNeMM - Episode Title.ext`

use std::path::{Path, PathBuf};

use crate::guess::{Guess, MediaKind};
use crate::metadata::Candidate;

/// Plans canonical destination paths under a library root.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    library_root: PathBuf,
}

impl PathPlanner {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
        }
    }

    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Plan the destination for a matched file.
    ///
    /// The candidate's title and year win over the guess; the guess supplies
    /// season/episode numbers and the original extension. `episode_title` is
    /// optional enrichment for TV names.
    pub fn plan(
        &self,
        candidate: &Candidate,
        guess: &Guess,
        episode_title: Option<&str>,
    ) -> PathBuf {
        let ext = Path::new(&guess.source_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());

        match candidate.media_kind {
            MediaKind::Movie => self.plan_movie(candidate, ext.as_deref()),
            MediaKind::Tv => self.plan_episode(candidate, guess, episode_title, ext.as_deref()),
        }
    }

    fn plan_movie(&self, candidate: &Candidate, ext: Option<&str>) -> PathBuf {
        let title = sanitize(&candidate.title);
        let stem = match candidate.year {
            Some(year) => format!("{title} ({year}) {{tmdb-{}}}", candidate.external_id),
            None => format!("{title} {{tmdb-{}}}", candidate.external_id),
        };

        self.library_root
            .join("Movies")
            .join(&stem)
            .join(with_ext(&stem, ext))
    }

    fn plan_episode(
        &self,
        candidate: &Candidate,
        guess: &Guess,
        episode_title: Option<&str>,
        ext: Option<&str>,
    ) -> PathBuf {
        let show = sanitize(&candidate.title);
        let show_dir = match candidate.year.or(guess.year) {
            Some(year) => format!("{show} ({year})"),
            None => show.clone(),
        };

        let season = guess.season.unwrap_or(1);
        let episode = guess.episode.unwrap_or(1);
        let marker = format!("s{season:02}e{episode:02}");

        let file_stem = match episode_title.map(sanitize).filter(|t| !t.is_empty()) {
            Some(ep_title) => format!("{show_dir} - {marker} - {ep_title}"),
            None => format!("{show_dir} - {marker}"),
        };

        self.library_root
            .join("TV Shows")
            .join(&show_dir)
            .join(format!("Season {season:02}"))
            .join(with_ext(&file_stem, ext))
    }
}

/// Remove filesystem-hostile characters and collapse whitespace.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn with_ext(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guess::guess_filename;

    fn matrix_candidate() -> Candidate {
        Candidate {
            external_id: 603,
            title: "The Matrix".to_string(),
            year: Some(1999),
            media_kind: MediaKind::Movie,
            vote_count: 26000,
            vote_average: 8.2,
        }
    }

    #[test]
    fn movie_layout() {
        let planner = PathPlanner::new("/data/media");
        let guess = guess_filename("The.Matrix.1999.1080p.BluRay.mkv");

        let dest = planner.plan(&matrix_candidate(), &guess, None);
        assert_eq!(
            dest,
            PathBuf::from(
                "/data/media/Movies/The Matrix (1999) {tmdb-603}/The Matrix (1999) {tmdb-603}.mkv"
            )
        );
    }

    #[test]
    fn episode_layout_with_title() {
        let planner = PathPlanner::new("/data/media");
        let guess = guess_filename("Breaking.Bad.S01E01.1080p.mkv");
        let candidate = Candidate {
            external_id: 1396,
            title: "Breaking Bad".to_string(),
            year: Some(2008),
            media_kind: MediaKind::Tv,
            vote_count: 12000,
            vote_average: 8.9,
        };

        let dest = planner.plan(&candidate, &guess, Some("Pilot"));
        assert_eq!(
            dest,
            PathBuf::from(
                "/data/media/TV Shows/Breaking Bad (2008)/Season 01/Breaking Bad (2008) - s01e01 - Pilot.mkv"
            )
        );
    }

    #[test]
    fn episode_layout_without_title_or_year() {
        let planner = PathPlanner::new("/data/media");
        let guess = guess_filename("Some.Show.S02E05.mkv");
        let candidate = Candidate {
            external_id: 42,
            title: "Some Show".to_string(),
            year: None,
            media_kind: MediaKind::Tv,
            vote_count: 10,
            vote_average: 7.0,
        };

        let dest = planner.plan(&candidate, &guess, None);
        assert_eq!(
            dest,
            PathBuf::from("/data/media/TV Shows/Some Show/Season 02/Some Show - s02e05.mkv")
        );
    }

    #[test]
    fn sanitize_strips_hostile_characters() {
        assert_eq!(sanitize("Face/Off: Part  2?"), "FaceOff Part 2");
        assert_eq!(sanitize("  spaced   out  "), "spaced out");
    }
}
