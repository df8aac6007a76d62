use std::path::PathBuf;

use crate::{Res, config, types::Track};

/// The playlist being assembled locally before it is saved to Spotify.
pub const LIST_WORKING_PLAYLIST: &str = "playlist";
/// Results of the most recent search, so rows can be referred to by number.
pub const LIST_LAST_SEARCH: &str = "last_search";

/// An ordered, persisted list of tracks. Duplicates are allowed.
#[derive(Debug, Clone)]
pub struct TrackListManager {
    path: PathBuf,
    tracks: Vec<Track>,
}

impl TrackListManager {
    /// A list stored under `partymix/state/<name>.json` in the data dir.
    pub fn new(name: &str) -> Self {
        Self::at(config::data_dir().join("state").join(format!("{name}.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tracks: Vec::new(),
        }
    }

    /// Loads the named list. A list that was never stored is empty.
    pub async fn load(name: &str) -> Res<Self> {
        Self::new(name).reload().await
    }

    pub async fn reload(mut self) -> Res<Self> {
        self.tracks = match async_fs::read_to_string(&self.path).await {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(self)
    }

    pub async fn persist(&self) -> Res<()> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.tracks)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    /// Removes the track at the 1-based `row`.
    pub fn remove(&mut self, row: usize) -> Option<Track> {
        if row == 0 || row > self.tracks.len() {
            return None;
        }
        Some(self.tracks.remove(row - 1))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
