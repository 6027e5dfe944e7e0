//! Template operations built on top of the SendGrid client
//!
//! These return explicit results; the tool layer decides which failures are reported
//! to the caller and which are logged and swallowed.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    errors::ProviderError,
    sendgrid_client::{EmailProvider, NewTemplateVersion},
};

/// Result of the create-then-version sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub template_id: String,
    pub version_added: bool,
}

pub async fn list_email_templates(
    provider: &dyn EmailProvider,
    list_type: &str,
) -> Result<Vec<Value>, ProviderError> {
    provider.list_templates(list_type).await
}

pub async fn get_html_template_by_id(
    provider: &dyn EmailProvider,
    template_id: &str,
) -> Result<String, ProviderError> {
    let template = provider.get_template(template_id).await?;

    template
        .current_html()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::NoVersions {
            template_id: template_id.to_string(),
        })
}

/// Always creates a new dynamic template, then uploads `html` as its first active version.
/// A failed version upload does not undo the template; it is reported in the outcome.
pub async fn save_email_html_template(
    provider: &dyn EmailProvider,
    name: &str,
    html: &str,
) -> Result<SaveOutcome, ProviderError> {
    let template_id = provider.create_dynamic_template(name).await?;
    info!(template_id = %template_id, "dynamic template created");

    let version = NewTemplateVersion::code(name, html);
    let version_added = match provider.add_template_version(&template_id, &version).await {
        Ok(()) => {
            info!(template_id = %template_id, "template version added");
            true
        }
        Err(err) => {
            warn!(
                template_id = %template_id,
                status = ?err.status(),
                error = %err,
                "template created but adding its version failed"
            );
            false
        }
    };

    Ok(SaveOutcome {
        template_id,
        version_added,
    })
}
