//! Filename parsing into a structured [`Guess`].
//!
//! [`guess_filename`] is pure and total: any string produces a guess, with
//! absent fields left empty rather than erroring. The tokenizer recognizes
//! release-name conventions (dot/underscore separation, a four-digit year,
//! `SxxEyy` or `NxMM` episode markers, a fixed quality vocabulary, trailing
//! release groups) and keeps everything before the first marker as the title.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Whether a guess or candidate refers to a movie or a TV show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Tv => write!(f, "tv"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "tv" | "episode" | "show" => Ok(Self::Tv),
            _ => Err(format!("Unknown media kind: {}", s)),
        }
    }
}

/// Structured fields extracted from a raw filename.
///
/// Immutable once produced; has no identity beyond its source filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guess {
    /// Cleaned title ready for metadata lookup.
    pub title: String,
    /// Release year if a plausible four-digit year token was found.
    pub year: Option<i32>,
    /// Movie / TV classification, `None` when the name carries no signal.
    pub media_kind: Option<MediaKind>,
    /// Season number (first if multiple).
    pub season: Option<u32>,
    /// Episode number (first if multiple).
    pub episode: Option<u32>,
    /// Recognized quality/source tokens, lowercased.
    pub quality_tags: BTreeSet<String>,
    /// The filename the guess was produced from.
    pub source_name: String,
}

/// Quality and source tokens recognized in release names.
const QUALITY_VOCAB: &[&str] = &[
    "2160p", "1080p", "720p", "480p", "4k", "uhd", "bluray", "blu-ray", "bdrip", "brrip",
    "webrip", "web-dl", "webdl", "hdtv", "dvdrip", "dvdscr", "remux", "x264", "x265",
    "h264", "h265", "hevc", "avc", "av1", "hdr", "hdr10", "dv", "10bit", "atmos", "dts",
    "ac3", "aac", "truehd", "proper", "repack", "extended", "uncut", "remastered", "imax",
];

/// File extensions treated as media containers when stripping.
const MEDIA_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts"];

/// Parse a filename into a [`Guess`]. Pure and total.
pub fn guess_filename(name: &str) -> Guess {
    let stem = strip_extension(name);
    let tokens = tokenize(stem);

    let mut season = None;
    let mut episode = None;
    let mut episode_idx = None;
    let mut quality_tags = BTreeSet::new();
    let mut first_quality_idx = None;
    let mut year = None;
    let mut year_idx = None;

    for (i, token) in tokens.iter().enumerate() {
        let lower = token.to_lowercase();

        if let Some((s, e)) = parse_episode_marker(&lower) {
            if season.is_none() {
                season = Some(s);
                episode = Some(e);
                episode_idx = Some(i);
            }
            continue;
        }

        if is_quality_token(&lower) {
            quality_tags.insert(canonical_quality(&lower));
            first_quality_idx.get_or_insert(i);
            continue;
        }
        // A hyphenated tail like "BluRay-GROUP" hides a quality token in
        // front of the release group.
        if lower.contains('-') {
            for part in lower.split('-') {
                if is_quality_token(part) {
                    quality_tags.insert(canonical_quality(part));
                    first_quality_idx.get_or_insert(i);
                }
            }
            if first_quality_idx == Some(i) {
                continue;
            }
        }

        // Prefer the last year-looking token that is not the leading one,
        // so titles that are themselves a year ("2012") survive.
        if i > 0 {
            if let Some(y) = parse_year(&lower) {
                year = Some(y);
                year_idx = Some(i);
            }
        }
    }

    let title_end = [year_idx, episode_idx, first_quality_idx]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(tokens.len());

    let mut title = tokens[..title_end].join(" ");
    if title.is_empty() && !tokens.is_empty() {
        title = tokens[0].clone();
    }

    let media_kind = if season.is_some() || episode.is_some() {
        Some(MediaKind::Tv)
    } else if year.is_some() || !quality_tags.is_empty() {
        Some(MediaKind::Movie)
    } else {
        None
    };

    Guess {
        title,
        year,
        media_kind,
        season,
        episode,
        quality_tags,
        source_name: name.to_string(),
    }
}

/// Check whether a path carries an allow-listed media extension.
pub fn is_media_file(path: &std::path::Path, extensions: &[String]) -> bool {
    if let Some(ext) = path.extension() {
        let ext_str = ext.to_string_lossy().to_lowercase();

        if extensions.is_empty() {
            return MEDIA_EXTENSIONS.contains(&ext_str.as_str());
        }

        return extensions.iter().any(|e| e.to_lowercase() == ext_str);
    }
    false
}

fn strip_extension(name: &str) -> &str {
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return stem;
        }
    }
    name
}

fn tokenize(stem: &str) -> Vec<String> {
    stem.split(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .map(|t| t.trim_matches(|c| matches!(c, '[' | ']' | '(' | ')')))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_year(token: &str) -> Option<i32> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = token.parse().ok()?;
    (1900..=2099).contains(&year).then_some(year)
}

/// Recognize `s01e02` and `1x02` style episode markers.
fn parse_episode_marker(token: &str) -> Option<(u32, u32)> {
    let split_digits = |s: &str, sep: char, max_season_digits: usize| -> Option<(u32, u32)> {
        let (a, b) = s.split_once(sep)?;
        if a.is_empty() || b.is_empty() || a.len() > max_season_digits || b.len() > 3 {
            return None;
        }
        if !a.bytes().all(|c| c.is_ascii_digit()) || !b.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some((a.parse().ok()?, b.parse().ok()?))
    };

    if let Some(rest) = token.strip_prefix('s') {
        return split_digits(rest, 'e', 2);
    }
    // The NxMM form caps at two season digits so resolutions like
    // 1920x1080 do not read as episode markers.
    split_digits(token, 'x', 2)
}

fn is_quality_token(token: &str) -> bool {
    QUALITY_VOCAB.contains(&token)
}

/// Collapse alias spellings so downstream consumers see one form.
fn canonical_quality(token: &str) -> String {
    match token {
        "blu-ray" => "bluray".to_string(),
        "webdl" => "web-dl".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_with_year_and_quality() {
        let guess = guess_filename("The.Matrix.1999.1080p.BluRay.mkv");
        assert_eq!(guess.title, "The Matrix");
        assert_eq!(guess.year, Some(1999));
        assert_eq!(guess.media_kind, Some(MediaKind::Movie));
        assert!(guess.quality_tags.contains("1080p"));
        assert!(guess.quality_tags.contains("bluray"));
        assert_eq!(guess.season, None);
    }

    #[test]
    fn tv_episode_marker() {
        let guess = guess_filename("Breaking.Bad.S01E01.1080p.BluRay-DEMAND.mkv");
        assert_eq!(guess.title, "Breaking Bad");
        assert_eq!(guess.media_kind, Some(MediaKind::Tv));
        assert_eq!(guess.season, Some(1));
        assert_eq!(guess.episode, Some(1));
        assert!(guess.quality_tags.contains("bluray"));
    }

    #[test]
    fn cross_format_episode_marker() {
        let guess = guess_filename("Show Name 1x02 HDTV.mkv");
        assert_eq!(guess.season, Some(1));
        assert_eq!(guess.episode, Some(2));
        assert_eq!(guess.title, "Show Name");
    }

    #[test]
    fn bare_title_has_no_signals() {
        let guess = guess_filename("The.Thing.mkv");
        assert_eq!(guess.title, "The Thing");
        assert_eq!(guess.year, None);
        assert_eq!(guess.media_kind, None);
        assert!(guess.quality_tags.is_empty());
    }

    #[test]
    fn leading_year_is_title_not_year() {
        let guess = guess_filename("2012.2009.1080p.mkv");
        assert_eq!(guess.title, "2012");
        assert_eq!(guess.year, Some(2009));
    }

    #[test]
    fn source_name_preserved() {
        let guess = guess_filename("Movie.2020.1080p.x264-GROUP.mkv");
        assert_eq!(guess.source_name, "Movie.2020.1080p.x264-GROUP.mkv");
        assert!(guess.quality_tags.contains("x264"));
    }

    #[test]
    fn media_file_allow_list() {
        use std::path::Path;
        assert!(is_media_file(Path::new("/in/a.mkv"), &[]));
        assert!(!is_media_file(Path::new("/in/a.nfo"), &[]));
        assert!(is_media_file(
            Path::new("/in/a.MP4"),
            &["mp4".to_string()]
        ));
        assert!(!is_media_file(Path::new("/in/noext"), &[]));
    }

    #[test]
    fn total_on_junk_input() {
        let guess = guess_filename("");
        assert_eq!(guess.title, "");
        assert_eq!(guess.media_kind, None);

        let guess = guess_filename("...___...");
        assert_eq!(guess.title, "");
    }
}
