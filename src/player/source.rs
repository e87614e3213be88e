//! Track resolution through the `yt-dlp` command line tool.

use super::track::{PlaylistRef, SearchMode, SearchOptions, SearchResult, Track};
use super::EngineError;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Hits requested for a text search; only the first is played.
const SEARCH_RESULTS: usize = 5;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:https?:)?//)?((?:www|m)\.)?((?:youtube(-nocookie)?\.com|youtu\.be))(/(?:[\w\-]+\?v=|embed/|v/)?)([\w\-]+)(\S+)?$",
    )
    .expect("youtube url pattern is valid")
});

pub fn is_youtube_url(query: &str) -> bool {
    YOUTUBE_URL.is_match(query)
}

pub fn looks_like_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://") || is_youtube_url(query)
}

/// Subset of the `yt-dlp -J` document we care about.
#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    entries: Vec<InfoJson>,
}

impl InfoJson {
    fn link(&self) -> Option<&str> {
        self.webpage_url
            .as_deref()
            .or(self.url.as_deref())
            .or(self.original_url.as_deref())
    }

    fn into_track(self, playlist: Option<&PlaylistRef>) -> Option<Track> {
        let url = self.link()?.to_string();
        Some(Track {
            title: self.title.unwrap_or_else(|| "Unknown title".to_string()),
            url,
            duration: self
                .duration
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
            playlist: playlist.cloned(),
        })
    }
}

/// Turns a `yt-dlp -J --flat-playlist` document into a search result.
/// Search pseudo-playlists (`ytsearchN:`) are flattened without a playlist reference.
pub fn parse_info(raw: &[u8], is_search: bool) -> Result<SearchResult, EngineError> {
    let info: InfoJson =
        serde_json::from_slice(raw).map_err(|e| EngineError::Resolve(e.to_string()))?;

    if info.kind.as_deref() != Some("playlist") {
        return Ok(SearchResult {
            tracks: info.into_track(None).into_iter().collect(),
            playlist: None,
        });
    }

    let playlist = if is_search {
        None
    } else {
        Some(PlaylistRef {
            title: info.title.clone().unwrap_or_else(|| "Untitled playlist".to_string()),
            url: info.link().unwrap_or_default().to_string(),
        })
    };

    let tracks = info
        .entries
        .into_iter()
        .filter_map(|entry| entry.into_track(playlist.as_ref()))
        .collect();

    Ok(SearchResult { tracks, playlist })
}

/// Search term used to find something similar to `title`.
pub fn related_query(title: &str) -> String {
    if let Some((artist, _)) = title.split_once(" - ") {
        return format!("{} music", artist.trim());
    }
    let words: Vec<&str> = title.split_whitespace().collect();
    if words.len() > 2 {
        words[..2].join(" ")
    } else {
        format!("{} music", title.trim())
    }
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: &'static str,
}

impl YtDlp {
    /// Built once at startup; the program name is leaked because songbird's
    /// stream inputs take a `&'static str`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: Box::leak(program.into().into_boxed_str()),
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Confirms the extractor is installed.
    pub async fn version(&self) -> Result<String, EngineError> {
        let output = Command::new(self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| EngineError::Resolve(format!("{}: {}", self.program, e)))?;
        if !output.status.success() {
            return Err(EngineError::Resolve(format!(
                "{} --version exited with {}",
                self.program, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, EngineError> {
        let is_search = match options.mode {
            SearchMode::Search => true,
            SearchMode::Auto => !looks_like_url(query),
        };

        let target = if is_search {
            format!("ytsearch{}:{}", SEARCH_RESULTS, query)
        } else {
            query.to_string()
        };

        let result = parse_info(&self.dump(&target).await?, is_search)?;
        debug!(
            "Resolved {:?} for {} to {} track(s), playlist: {}",
            query,
            options.requested_by,
            result.tracks.len(),
            result.playlist.is_some()
        );
        Ok(result)
    }

    /// Tracks similar to `seed`, used by autoplay.
    pub async fn related(&self, seed: &Track) -> Result<Vec<Track>, EngineError> {
        let options = SearchOptions {
            requested_by: "Autoplay".to_string(),
            mode: SearchMode::Search,
        };
        let result = self.search(&related_query(&seed.title), &options).await?;
        Ok(result
            .tracks
            .into_iter()
            .filter(|track| track.url != seed.url)
            .collect())
    }

    async fn dump(&self, target: &str) -> Result<Vec<u8>, EngineError> {
        let output = Command::new(self.program)
            .args(["-J", "--flat-playlist", "--no-warnings", target])
            .output()
            .await
            .map_err(|e| EngineError::Resolve(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Resolve(stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }
}
