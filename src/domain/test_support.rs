//! In-memory `EmailProvider` used by unit and router tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    errors::ProviderError,
    sendgrid_client::{
        DailyStatRecord, EmailProvider, NewTemplateVersion, ProviderTemplate, StatsQuery,
        TemplateVersion,
    },
};

#[derive(Debug, Default)]
pub struct FakeProvider {
    pub templates: Vec<Value>,
    pub list_failure: Option<u16>,
    pub template: Option<ProviderTemplate>,
    pub created_id: Option<String>,
    pub version_failure: Option<u16>,
    pub stats: Vec<DailyStatRecord>,
    pub stats_failure: Option<u16>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

pub fn status_error(status: u16) -> ProviderError {
    ProviderError::Status {
        status,
        body: format!("{{\"errors\":[{{\"message\":\"status {status}\"}}]}}"),
    }
}

pub fn template_with_versions(contents: &[&str]) -> ProviderTemplate {
    ProviderTemplate {
        versions: contents
            .iter()
            .map(|html| TemplateVersion {
                html_content: html.to_string(),
            })
            .collect(),
    }
}

#[async_trait]
impl EmailProvider for FakeProvider {
    async fn list_templates(&self, generations: &str) -> Result<Vec<Value>, ProviderError> {
        self.record(format!("list_templates:{generations}"));
        match self.list_failure {
            Some(status) => Err(status_error(status)),
            None => Ok(self.templates.clone()),
        }
    }

    async fn get_template(&self, template_id: &str) -> Result<ProviderTemplate, ProviderError> {
        self.record(format!("get_template:{template_id}"));
        self.template.clone().ok_or_else(|| status_error(404))
    }

    async fn create_dynamic_template(&self, name: &str) -> Result<String, ProviderError> {
        self.record(format!("create_dynamic_template:{name}"));
        self.created_id.clone().ok_or_else(|| status_error(400))
    }

    async fn add_template_version(
        &self,
        template_id: &str,
        version: &NewTemplateVersion,
    ) -> Result<(), ProviderError> {
        self.record(format!("add_template_version:{template_id}:{}", version.name));
        match self.version_failure {
            Some(status) => Err(status_error(status)),
            None => Ok(()),
        }
    }

    async fn aggregate_stats(
        &self,
        query: &StatsQuery,
    ) -> Result<Vec<DailyStatRecord>, ProviderError> {
        self.record(format!(
            "aggregate_stats:{}:{}:{}",
            query.start_date, query.end_date, query.aggregated_by
        ));
        match self.stats_failure {
            Some(status) => Err(status_error(status)),
            None => Ok(self.stats.clone()),
        }
    }
}
