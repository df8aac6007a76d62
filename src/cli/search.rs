use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table;

use crate::{
    error,
    error::Error,
    management::{LIST_LAST_SEARCH, TokenManager, TrackListManager},
    spotify, success,
    types::{SearchFilters, TrackTableRow},
    warning,
};

pub async fn search(query: String, filters: SearchFilters) {
    if query.trim().is_empty() {
        error!("Search query must not be empty.");
    }

    let token = super::require_token().await;

    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Searching for \"{}\"...", query.trim()));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );

    let result = spotify::search::search_tracks(&token, query.trim(), &filters).await;
    pb.finish_and_clear();

    let tracks = match result {
        Ok(tracks) => tracks,
        Err(Error::Auth(message)) => {
            if let Err(e) = TokenManager::clear().await {
                warning!("Failed to remove stored token: {}", e);
            }
            error!(
                "Authentication expired ({}). Please run partymix auth",
                message
            );
        }
        Err(e) => error!("Search failed: {}", e),
    };

    if tracks.is_empty() {
        warning!("No tracks found.");
    } else {
        let rows: Vec<TrackTableRow> = tracks
            .iter()
            .enumerate()
            .map(|(i, t)| TrackTableRow::new(i + 1, t))
            .collect();
        println!("{}", Table::new(rows));
        success!("Found {} tracks.", tracks.len());
    }

    let mut last_search = TrackListManager::new(LIST_LAST_SEARCH);
    last_search.replace(tracks);
    if let Err(e) = last_search.persist().await {
        warning!("Failed to store search results: {}", e);
    }
}
