use reqwest::Client;

use crate::{
    Res, config,
    types::{SearchFilters, SearchResponse, Track},
    utils,
};

/// Maximum number of tracks returned by one search.
pub const SEARCH_LIMIT: u32 = 20;

/// Searches the catalog for tracks.
///
/// `filters` are appended to `query` as Spotify field filters, see
/// [`utils::build_search_query`]. Results come back in Spotify's relevance
/// order.
///
/// # Errors
///
/// A rejected token yields [`crate::error::Error::Auth`]; the caller is
/// expected to drop its stored credentials in that case.
pub async fn search_tracks(token: &str, query: &str, filters: &SearchFilters) -> Res<Vec<Track>> {
    let q = utils::build_search_query(query, filters);
    log::debug!("searching tracks for {q:?}");

    let client = Client::new();
    let response = client
        .get(format!("{uri}/search", uri = config::spotify_apiurl()))
        .bearer_auth(token)
        .query(&[
            ("q", q.as_str()),
            ("type", "track"),
            ("limit", &SEARCH_LIMIT.to_string()),
        ])
        .send()
        .await?;

    let response = super::ensure_success(response).await?;
    let res = response.json::<SearchResponse>().await?;

    Ok(res.tracks.items.into_iter().map(Track::from).collect())
}
