use reqwest::Client;

use crate::{
    Res, config,
    types::{
        AddTrackToPlaylistRequest, AddTrackToPlaylistResponse, CreatePlaylistRequest,
        CreatePlaylistResponse, CurrentUser,
    },
};

pub const PLAYLIST_DESCRIPTION: &str = "Created with Party Mix Master";

/// Spotify accepts at most this many URIs per add request.
pub const TRACKS_PER_REQUEST: usize = 100;

pub async fn current_user(token: &str) -> Res<CurrentUser> {
    let client = Client::new();
    let response = client
        .get(format!("{uri}/me", uri = config::spotify_apiurl()))
        .bearer_auth(token)
        .send()
        .await?;

    let response = super::ensure_success(response).await?;
    Ok(response.json::<CurrentUser>().await?)
}

/// Creates an empty playlist owned by `user_id`.
pub async fn create(
    token: &str,
    user_id: &str,
    name: &str,
    public: bool,
) -> Res<CreatePlaylistResponse> {
    let body = CreatePlaylistRequest {
        name: name.to_string(),
        description: PLAYLIST_DESCRIPTION.to_string(),
        public,
    };

    let client = Client::new();
    let response = client
        .post(format!(
            "{uri}/users/{user_id}/playlists",
            uri = config::spotify_apiurl()
        ))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;

    let response = super::ensure_success(response).await?;
    Ok(response.json::<CreatePlaylistResponse>().await?)
}

/// Appends `uris` to the playlist in request-sized chunks, keeping order.
/// Returns the snapshot id of the last chunk.
pub async fn add_tracks(token: &str, playlist_id: &str, uris: &[String]) -> Res<Option<String>> {
    let client = Client::new();
    let url = format!(
        "{uri}/playlists/{playlist_id}/tracks",
        uri = config::spotify_apiurl()
    );

    let mut snapshot = None;
    for chunk in uris.chunks(TRACKS_PER_REQUEST) {
        let body = AddTrackToPlaylistRequest {
            uris: chunk.to_vec(),
        };
        let response = client.post(&url).bearer_auth(token).json(&body).send().await?;
        let response = super::ensure_success(response).await?;
        let added = response.json::<AddTrackToPlaylistResponse>().await?;
        log::debug!("added {} tracks to {playlist_id}", chunk.len());
        snapshot = Some(added.snapshot_id);
    }

    Ok(snapshot)
}
