use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{config::SendGridConfig, errors::ProviderError};

/// The parts of a SendGrid template this server reads. Other fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderTemplate {
    #[serde(default)]
    pub versions: Vec<TemplateVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateVersion {
    #[serde(default)]
    pub html_content: String,
}

impl ProviderTemplate {
    /// Content of the last entry in `versions`, which is not necessarily the active one.
    pub fn current_html(&self) -> Option<&str> {
        self.versions
            .last()
            .map(|version| version.html_content.as_str())
    }
}

/// Body of `POST /v3/templates/{id}/versions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTemplateVersion {
    pub active: u8,
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub plain_content: String,
    pub generate_plain_content: bool,
    pub editor: String,
}

impl NewTemplateVersion {
    pub fn code(name: impl Into<String>, html_content: impl Into<String>) -> Self {
        Self {
            active: 1,
            name: name.into(),
            subject: String::new(),
            html_content: html_content.into(),
            plain_content: String::new(),
            generate_plain_content: true,
            editor: "code".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatsQuery {
    pub start_date: String,
    pub end_date: String,
    pub aggregated_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DailyStatRecord {
    pub date: String,
    #[serde(default)]
    pub stats: Vec<StatBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatBucket {
    #[serde(default)]
    pub metrics: StatMetrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatMetrics {
    pub delivered: u64,
    pub opens: u64,
    pub clicks: u64,
    pub bounces: u64,
    pub unsubscribes: u64,
}

#[derive(Debug, Deserialize)]
struct TemplateListResponse {
    #[serde(default)]
    templates: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedTemplate {
    id: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn list_templates(&self, generations: &str) -> Result<Vec<Value>, ProviderError>;

    async fn get_template(&self, template_id: &str) -> Result<ProviderTemplate, ProviderError>;

    /// Creates an empty dynamic template and returns its id.
    async fn create_dynamic_template(&self, name: &str) -> Result<String, ProviderError>;

    async fn add_template_version(
        &self,
        template_id: &str,
        version: &NewTemplateVersion,
    ) -> Result<(), ProviderError>;

    async fn aggregate_stats(
        &self,
        query: &StatsQuery,
    ) -> Result<Vec<DailyStatRecord>, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct HttpSendGridClient {
    client: Client,
    base_url: Url,
}

impl HttpSendGridClient {
    pub fn new(config: &SendGridConfig) -> Result<Self, ProviderError> {
        let mut headers = header::HeaderMap::new();
        let mut bearer = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| ProviderError::InvalidApiKey)?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut endpoint = self.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| {
                ProviderError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(endpoint)
    }
}

async fn read_expected(response: Response, expected: StatusCode) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;

    if status != expected {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

#[async_trait]
impl EmailProvider for HttpSendGridClient {
    async fn list_templates(&self, generations: &str) -> Result<Vec<Value>, ProviderError> {
        let url = self.endpoint(&["v3", "templates"])?;
        debug!(url = %url, generations, "listing templates");

        let response = self
            .client
            .get(url)
            .query(&[("generations", generations)])
            .send()
            .await?;
        let body = read_expected(response, StatusCode::OK).await?;
        let parsed: TemplateListResponse = serde_json::from_str(&body)?;
        Ok(parsed.templates)
    }

    async fn get_template(&self, template_id: &str) -> Result<ProviderTemplate, ProviderError> {
        let url = self.endpoint(&["v3", "templates", template_id])?;
        debug!(url = %url, "fetching template");

        let response = self.client.get(url).send().await?;
        let body = read_expected(response, StatusCode::OK).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn create_dynamic_template(&self, name: &str) -> Result<String, ProviderError> {
        let url = self.endpoint(&["v3", "templates"])?;
        debug!(url = %url, template_name = name, "creating dynamic template");

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "name": name,
                "generation": "dynamic",
            }))
            .send()
            .await?;
        let body = read_expected(response, StatusCode::CREATED).await?;
        let created: CreatedTemplate = serde_json::from_str(&body)?;
        Ok(created.id)
    }

    async fn add_template_version(
        &self,
        template_id: &str,
        version: &NewTemplateVersion,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["v3", "templates", template_id, "versions"])?;
        debug!(url = %url, "adding template version");

        let response = self.client.post(url).json(version).send().await?;
        read_expected(response, StatusCode::CREATED).await?;
        Ok(())
    }

    async fn aggregate_stats(
        &self,
        query: &StatsQuery,
    ) -> Result<Vec<DailyStatRecord>, ProviderError> {
        let url = self.endpoint(&["v3", "stats"])?;
        debug!(url = %url, ?query, "fetching aggregate stats");

        let response = self.client.get(url).query(query).send().await?;
        let body = read_expected(response, StatusCode::OK).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
