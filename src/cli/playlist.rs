use tabled::Table;

use crate::{
    error,
    management::{LIST_LAST_SEARCH, LIST_WORKING_PLAYLIST, TrackListManager},
    spotify, success,
    types::TrackTableRow,
    utils, warning,
};

async fn load(name: &str) -> TrackListManager {
    match TrackListManager::load(name).await {
        Ok(list) => list,
        Err(e) => error!("Failed to load {}: {}", name, e),
    }
}

async fn persist(list: &TrackListManager) {
    if let Err(e) = list.persist().await {
        error!("Failed to store playlist: {}", e);
    }
}

/// Appends rows of the last search result to the working playlist.
pub async fn add(rows: Vec<usize>) {
    let last_search = load(LIST_LAST_SEARCH).await;
    if last_search.is_empty() {
        error!("No search results. Run partymix search first.");
    }

    let picked = utils::pick_rows(last_search.tracks(), &rows);
    if picked.len() < rows.len() {
        warning!(
            "Skipped rows outside 1-{} of the last search.",
            last_search.len()
        );
    }

    let mut playlist = load(LIST_WORKING_PLAYLIST).await;
    for track in picked {
        success!("Added {} - {}", track.artist, track.title);
        playlist.add(track);
    }
    persist(&playlist).await;
}

pub async fn remove(row: usize) {
    let mut playlist = load(LIST_WORKING_PLAYLIST).await;
    match playlist.remove(row) {
        Some(track) => {
            persist(&playlist).await;
            success!("Removed {} - {}", track.artist, track.title);
        }
        None => warning!("There is no row {} in the playlist.", row),
    }
}

pub async fn show() {
    let playlist = load(LIST_WORKING_PLAYLIST).await;
    if playlist.is_empty() {
        warning!("The playlist is empty.");
        return;
    }

    let rows: Vec<TrackTableRow> = playlist
        .tracks()
        .iter()
        .enumerate()
        .map(|(i, t)| TrackTableRow::new(i + 1, t))
        .collect();
    println!("{}", Table::new(rows));

    let total_ms: u64 = playlist.tracks().iter().map(|t| t.duration_ms).sum();
    success!(
        "{} tracks, {} total.",
        playlist.len(),
        utils::format_duration(total_ms)
    );
}

pub async fn clear() {
    let mut playlist = load(LIST_WORKING_PLAYLIST).await;
    playlist.clear();
    persist(&playlist).await;
    success!("Playlist cleared.");
}

/// Saves the working playlist to the user's Spotify account.
pub async fn save(name: String, public: bool) {
    let playlist = load(LIST_WORKING_PLAYLIST).await;
    if playlist.is_empty() {
        warning!("The playlist is empty, nothing to save.");
        return;
    }

    let token = super::require_token().await;

    let user = match spotify::playlist::current_user(&token).await {
        Ok(user) => user,
        Err(e) => error!("Failed to load user profile: {}", e),
    };

    let created = match spotify::playlist::create(&token, &user.id, &name, public).await {
        Ok(created) => created,
        Err(e) => error!("Failed to create playlist: {}", e),
    };
    success!("Playlist {} created.", created.name);

    let uris: Vec<String> = playlist.tracks().iter().map(|t| t.uri.clone()).collect();
    match spotify::playlist::add_tracks(&token, &created.id, &uris).await {
        Ok(_) => success!("Added {} tracks to {}.", uris.len(), created.name),
        Err(e) => warning!("Failed to add tracks to playlist: {}", e),
    }
}
