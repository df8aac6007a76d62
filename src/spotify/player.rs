//! Connect player endpoints.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::{
    Res, config,
    playback::PlaybackApi,
    types::{CurrentPlaybackResponse, Device, DevicesResponse, StartPlaybackRequest},
};

fn player_url(path: &str) -> String {
    format!("{uri}/me/player{path}", uri = config::spotify_apiurl())
}

fn for_device(request: RequestBuilder, device_id: Option<&str>) -> RequestBuilder {
    match device_id {
        Some(id) => request.query(&[("device_id", id)]),
        None => request,
    }
}

/// Lists the user's available Connect devices.
pub async fn devices(token: &str) -> Res<Vec<Device>> {
    let client = Client::new();
    let response = client
        .get(player_url("/devices"))
        .bearer_auth(token)
        .send()
        .await?;

    let response = super::ensure_success(response).await?;
    Ok(response.json::<DevicesResponse>().await?.devices)
}

/// Picks the device named `preferred`, else the active one, else the first
/// one with an id. Devices without an id cannot be addressed and are
/// skipped.
pub fn choose_device<'a>(devices: &'a [Device], preferred: &str) -> Option<&'a Device> {
    let addressable = || devices.iter().filter(|d| d.id.is_some());

    addressable()
        .find(|d| d.name == preferred)
        .or_else(|| addressable().find(|d| d.is_active))
        .or_else(|| addressable().next())
}

/// Current playback, `None` when nothing is playing anywhere (`204`).
pub async fn current_playback(token: &str) -> Res<Option<CurrentPlaybackResponse>> {
    let client = Client::new();
    let response = client.get(player_url("")).bearer_auth(token).send().await?;

    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let response = super::ensure_success(response).await?;
    Ok(Some(response.json::<CurrentPlaybackResponse>().await?))
}

/// Starts `uris` on the given device.
pub async fn start_playback(token: &str, device_id: &str, uris: &[&str]) -> Res<()> {
    let body = StartPlaybackRequest {
        uris: uris.iter().map(|u| u.to_string()).collect(),
    };

    let client = Client::new();
    let request = client.put(player_url("/play")).bearer_auth(token).json(&body);
    let response = for_device(request, Some(device_id)).send().await?;

    super::ensure_success(response).await?;
    Ok(())
}

/// Resumes whatever is loaded.
pub async fn resume(token: &str, device_id: Option<&str>) -> Res<()> {
    let client = Client::new();
    let request = client.put(player_url("/play")).bearer_auth(token).body("");
    let response = for_device(request, device_id).send().await?;

    super::ensure_success(response).await?;
    Ok(())
}

pub async fn pause(token: &str, device_id: Option<&str>) -> Res<()> {
    let client = Client::new();
    let request = client.put(player_url("/pause")).bearer_auth(token).body("");
    let response = for_device(request, device_id).send().await?;

    super::ensure_success(response).await?;
    Ok(())
}

pub async fn seek(token: &str, device_id: Option<&str>, position_ms: u64) -> Res<()> {
    let client = Client::new();
    let request = client
        .put(player_url("/seek"))
        .bearer_auth(token)
        .query(&[("position_ms", position_ms)])
        .body("");
    let response = for_device(request, device_id).send().await?;

    super::ensure_success(response).await?;
    Ok(())
}

/// [`PlaybackApi`] over the Web API `play` endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebPlaybackApi;

#[async_trait]
impl PlaybackApi for WebPlaybackApi {
    async fn start_playback(&self, token: &str, device_id: &str, track_uri: &str) -> Res<()> {
        log::debug!("PUT play {track_uri} on {device_id}");
        start_playback(token, device_id, &[track_uri]).await
    }
}
