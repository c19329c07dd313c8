//! Typed request/response operations against the story service.
//!
//! Every failure is reported as a [`GatewayError`]; nothing is retried here.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AspectRatio, ExportFormat, StoryId},
    error::ApiError,
    protocol::{
        download_file_name, GenerateResponse, IllustrateRequest, IllustrateResponse,
        NextChapterRequest, OutlineRequest, OutlineResponse, StoryListResponse, StoryParameters,
        StoryResponse, StorySummary,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{GatewayError, GatewayResult, SettingsError},
    settings::{parse_server_url, ClientSettings, RouteStyle},
};

#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn generate_outline(&self, request: &OutlineRequest) -> GatewayResult<String>;
    /// The only operation that yields a new story id.
    async fn generate_story(&self, params: &StoryParameters) -> GatewayResult<GenerateResponse>;
    async fn fetch_session(&self, story_id: &StoryId) -> GatewayResult<StoryResponse>;
    /// Succeeds without chapter data; callers re-fetch the session afterwards.
    async fn advance_chapter(&self, story_id: &StoryId, user_direction: &str)
        -> GatewayResult<()>;
    async fn generate_illustration(
        &self,
        story_id: &StoryId,
        aspect_ratio: AspectRatio,
    ) -> GatewayResult<String>;
    async fn list_sessions(&self) -> GatewayResult<Vec<StorySummary>>;
    async fn delete_session(&self, story_id: &StoryId) -> GatewayResult<()>;
    /// Locator of an export resource. Fetched by navigation, not through this gateway.
    fn download_url(&self, story_id: &StoryId, format: ExportFormat) -> String;
}

pub struct HttpSessionGateway {
    http: Client,
    base: Url,
    route_style: RouteStyle,
}

impl HttpSessionGateway {
    pub fn new(server_url: &str, route_style: RouteStyle) -> Result<Self, SettingsError> {
        let normalized = parse_server_url(server_url)?;
        let base = Url::parse(&normalized).map_err(|source| SettingsError::ServerUrl {
            value: server_url.to_string(),
            source,
        })?;
        Ok(Self {
            http: Client::new(),
            base,
            route_style,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, SettingsError> {
        Self::new(&settings.server_url, settings.route_style)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Endpoints that exist both with and without the `/api` prefix.
    fn session_endpoint(&self, segments: &[&str]) -> Url {
        match self.route_style {
            RouteStyle::Legacy => self.endpoint(segments),
            RouteStyle::Api => {
                let mut prefixed = Vec::with_capacity(segments.len() + 1);
                prefixed.push("api");
                prefixed.extend_from_slice(segments);
                self.endpoint(&prefixed)
            }
        }
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "story service unreachable");
            GatewayError::Unreachable(err)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // An unreadable or non-JSON error body still counts as a rejection.
        let message = match response.bytes().await {
            Ok(body) => serde_json::from_slice::<ApiError>(&body)
                .ok()
                .and_then(|body| body.message().map(str::to_string)),
            Err(_) => None,
        };
        warn!(
            status = status.as_u16(),
            message = message.as_deref().unwrap_or_default(),
            "story service rejected request"
        );
        Err(GatewayError::rejected(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        response
            .json::<T>()
            .await
            .map_err(|source| GatewayError::MalformedResponse { status, source })
    }

    fn resolve(&self, link: &str) -> String {
        self.base
            .join(link)
            .map(String::from)
            .unwrap_or_else(|_| link.to_string())
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn generate_outline(&self, request: &OutlineRequest) -> GatewayResult<String> {
        let url = self.endpoint(&["api", "outline"]);
        debug!(%url, "requesting outline");
        let body: OutlineResponse = self.send_json(self.http.post(url).json(request)).await?;
        Ok(body.outline)
    }

    async fn generate_story(&self, params: &StoryParameters) -> GatewayResult<GenerateResponse> {
        let url = self.session_endpoint(&["generate"]);
        debug!(
            %url,
            characters = params.characters.len(),
            with_outline = params.outline.is_some(),
            "requesting story generation"
        );
        self.send_json(self.http.post(url).json(params)).await
    }

    async fn fetch_session(&self, story_id: &StoryId) -> GatewayResult<StoryResponse> {
        let url = self.session_endpoint(&["story", story_id.as_str()]);
        debug!(%url, "fetching story");
        self.send_json(self.http.get(url)).await
    }

    async fn advance_chapter(
        &self,
        story_id: &StoryId,
        user_direction: &str,
    ) -> GatewayResult<()> {
        let url = self.session_endpoint(&["next"]);
        debug!(%url, %story_id, "requesting next chapter");
        let request = NextChapterRequest {
            story_id: story_id.clone(),
            user_direction: user_direction.to_string(),
        };
        self.send(self.http.post(url).json(&request)).await?;
        Ok(())
    }

    async fn generate_illustration(
        &self,
        story_id: &StoryId,
        aspect_ratio: AspectRatio,
    ) -> GatewayResult<String> {
        let url = self.endpoint(&["api", "illustrate"]);
        debug!(%url, %story_id, %aspect_ratio, "requesting illustration");
        let request = IllustrateRequest {
            story_id: story_id.clone(),
            aspect_ratio,
        };
        let body: IllustrateResponse = self.send_json(self.http.post(url).json(&request)).await?;
        Ok(self.resolve(&body.image_url))
    }

    async fn list_sessions(&self) -> GatewayResult<Vec<StorySummary>> {
        let url = self.endpoint(&["api", "stories"]);
        debug!(%url, "listing stories");
        let body: StoryListResponse = self.send_json(self.http.get(url)).await?;
        Ok(body.items)
    }

    async fn delete_session(&self, story_id: &StoryId) -> GatewayResult<()> {
        let url = self.endpoint(&["api", "story", story_id.as_str()]);
        debug!(%url, "deleting story");
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    fn download_url(&self, story_id: &StoryId, format: ExportFormat) -> String {
        self.endpoint(&["download", &download_file_name(story_id, format)])
            .into()
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
