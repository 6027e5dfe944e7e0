//! Interactive tools exposed via Model Context Protocol
//!
//! Declares the four SendGrid tools, resolves `tools/call` arguments, and routes each
//! call to its typed handler. Handler results are flattened to text content, with the
//! structured value attached alongside.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use rust_mcp_sdk::{
    macros,
    schema::{CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::domain::{
    stats::get_aggregate_email_stats,
    templates::{get_html_template_by_id, list_email_templates, save_email_html_template},
};
use crate::{
    errors::AppError,
    sendgrid_client::{EmailProvider, StatsQuery},
    AppState,
};

pub const INVALID_ARGUMENTS_MESSAGE: &str = "Invalid arguments: expected object or JSON string.";

#[macros::mcp_tool(
    name = "list_email_templates",
    description = "Fetches a list of email templates from the SendGrid API",
    read_only_hint = true
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListEmailTemplatesTool {
    /// The type of list to fetch: dynamic or legacy. Use dynamic if not specified.
    pub list_type: String,
}

#[macros::mcp_tool(
    name = "get_html_template_by_id",
    description = "Fetches the html of a SendGrid email template by id",
    read_only_hint = true
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetHtmlTemplateByIdTool {
    /// The id of the SendGrid email template to fetch the html for
    pub template_id: String,
}

#[macros::mcp_tool(
    name = "save_email_html_template",
    description = "Saves an html email template to SendGrid as a new dynamic template",
    read_only_hint = false
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SaveEmailHtmlTemplateTool {
    /// The id of the template to save, starting with d-, or TBD. A new template is always created.
    pub template_id: String,
    /// The name of the SendGrid email template to save
    pub template_name: String,
    /// The html for the template. Styling must be inlined.
    pub template_html: String,
}

#[macros::mcp_tool(
    name = "get_aggregate_email_stats",
    description = "Fetches aggregate email stats (delivered, opens, clicks, bounces, unsubscribes) for the SendGrid account, aggregated by day, week or month",
    read_only_hint = true
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetAggregateEmailStatsTool {
    /// Start of the period in YYYY-MM-DD format
    pub start_date: String,
    /// End of the period in YYYY-MM-DD format
    pub end_date: String,
    /// Aggregation bucket: day, week or month. Use day if not specified.
    pub aggregated_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ListEmailTemplates,
    GetHtmlTemplateById,
    SaveEmailHtmlTemplate,
    GetAggregateEmailStats,
}

impl ToolKind {
    /// Listing order of `tools/list`.
    pub const ALL: [Self; 4] = [
        Self::ListEmailTemplates,
        Self::GetHtmlTemplateById,
        Self::SaveEmailHtmlTemplate,
        Self::GetAggregateEmailStats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ListEmailTemplates => "list_email_templates",
            Self::GetHtmlTemplateById => "get_html_template_by_id",
            Self::SaveEmailHtmlTemplate => "save_email_html_template",
            Self::GetAggregateEmailStats => "get_aggregate_email_stats",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn descriptor(self) -> Tool {
        match self {
            Self::ListEmailTemplates => ListEmailTemplatesTool::tool(),
            Self::GetHtmlTemplateById => GetHtmlTemplateByIdTool::tool(),
            Self::SaveEmailHtmlTemplate => SaveEmailHtmlTemplateTool::tool(),
            Self::GetAggregateEmailStats => GetAggregateEmailStatsTool::tool(),
        }
    }
}

pub fn build_tools_list() -> Vec<Tool> {
    ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect()
}

/// Checks that every declared descriptor routes back to its own handler and that names
/// are unique. Run once before serving.
pub fn verify_tool_registry() -> Result<(), AppError> {
    let mut seen = HashSet::new();

    for kind in ToolKind::ALL {
        let descriptor = kind.descriptor();
        if ToolKind::from_name(&descriptor.name) != Some(kind) {
            return Err(AppError::internal(format!(
                "tool descriptor `{}` does not route to a handler",
                descriptor.name
            )));
        }
        if !seen.insert(descriptor.name.clone()) {
            return Err(AppError::internal(format!(
                "tool `{}` is declared more than once",
                descriptor.name
            )));
        }
    }

    Ok(())
}

/// `tools/call` arguments arrive either as an object or as a JSON-encoded object string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    Object(Map<String, Value>),
    Encoded(String),
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::Object(Map::new())
    }
}

impl ToolArguments {
    pub fn from_raw(raw: Option<Value>) -> Option<Self> {
        match raw {
            None | Some(Value::Null) => Some(Self::default()),
            Some(value) => serde_json::from_value(value).ok(),
        }
    }

    pub fn into_map(self) -> Option<Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            Self::Encoded(raw) => match serde_json::from_str::<Value>(&raw).ok()? {
                Value::Object(map) => Some(map),
                _ => None,
            },
        }
    }
}

/// `name` stays untyped so a missing or non-string name is reported as an unknown tool.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl ToolCallParams {
    fn tool_name(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => "None".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text {
        text: String,
        structured: Option<Map<String, Value>>,
    },
    /// The call produced no value. Not an error: the envelope stays a success.
    Empty { reason: String },
}

impl ToolOutput {
    pub fn text(text: impl Into<String>, structured: Value) -> Self {
        Self::Text {
            text: text.into(),
            structured: match structured {
                Value::Object(map) => Some(map),
                _ => None,
            },
        }
    }

    pub fn empty(reason: impl Into<String>) -> Self {
        Self::Empty {
            reason: reason.into(),
        }
    }

    pub fn into_call_tool_result(self) -> CallToolResult {
        let (text, structured_content) = match self {
            Self::Text { text, structured } => (text, structured),
            Self::Empty { reason } => (reason, None),
        };

        CallToolResult {
            content: vec![ContentBlock::from(TextContent::new(text, None, None))],
            is_error: None,
            meta: None,
            structured_content,
        }
    }
}

pub fn tool_error_result(message: impl Into<String>) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(message.into(), None, None))],
        is_error: Some(true),
        meta: None,
        structured_content: None,
    }
}

#[async_trait]
pub trait ToolHandler: DeserializeOwned + Send {
    async fn run(self, provider: &dyn EmailProvider) -> Result<ToolOutput, AppError>;
}

#[async_trait]
impl ToolHandler for ListEmailTemplatesTool {
    async fn run(self, provider: &dyn EmailProvider) -> Result<ToolOutput, AppError> {
        match list_email_templates(provider, &self.list_type).await {
            Ok(templates) if templates.is_empty() => {
                info!(list_type = %self.list_type, "no templates found");
                Ok(ToolOutput::empty("No templates found."))
            }
            Ok(templates) => {
                let listed = Value::Array(templates);
                Ok(ToolOutput::text(
                    listed.to_string(),
                    json!({ "templates": listed }),
                ))
            }
            Err(err) => {
                warn!(
                    list_type = %self.list_type,
                    status = ?err.status(),
                    error = %err,
                    "failed to fetch templates"
                );
                Ok(ToolOutput::empty("No templates returned."))
            }
        }
    }
}

#[async_trait]
impl ToolHandler for GetHtmlTemplateByIdTool {
    async fn run(self, provider: &dyn EmailProvider) -> Result<ToolOutput, AppError> {
        let html = get_html_template_by_id(provider, &self.template_id).await?;
        let structured = json!({
            "template_id": self.template_id,
            "html_content": html,
        });
        Ok(ToolOutput::text(html, structured))
    }
}

#[async_trait]
impl ToolHandler for SaveEmailHtmlTemplateTool {
    async fn run(self, provider: &dyn EmailProvider) -> Result<ToolOutput, AppError> {
        if !self.template_id.trim().is_empty() {
            debug!(
                template_id = %self.template_id,
                "supplied template_id is ignored, a new dynamic template is created"
            );
        }

        match save_email_html_template(provider, &self.template_name, &self.template_html).await {
            Ok(outcome) => Ok(ToolOutput::text(outcome.template_id.clone(), json!(outcome))),
            Err(err) => {
                warn!(status = ?err.status(), error = %err, "error creating template");
                Ok(ToolOutput::empty("Template could not be created."))
            }
        }
    }
}

#[async_trait]
impl ToolHandler for GetAggregateEmailStatsTool {
    async fn run(self, provider: &dyn EmailProvider) -> Result<ToolOutput, AppError> {
        let query = StatsQuery {
            start_date: self.start_date,
            end_date: self.end_date,
            aggregated_by: self.aggregated_by,
        };

        let report = get_aggregate_email_stats(provider, &query, Utc::now()).await?;
        let structured = json!({
            "query": query,
            "totals": report.totals,
            "rates": report.rates,
            "rows": report.rows,
        });
        Ok(ToolOutput::text(report.text, structured))
    }
}

async fn invoke<T: ToolHandler>(
    provider: &dyn EmailProvider,
    arguments: Map<String, Value>,
) -> Result<CallToolResult, AppError> {
    let tool: T = match serde_json::from_value(Value::Object(arguments)) {
        Ok(tool) => tool,
        Err(err) => return Ok(tool_error_result(format!("Invalid arguments: {err}"))),
    };

    Ok(tool.run(provider).await?.into_call_tool_result())
}

/// Argument and lookup failures come back as error envelopes; anything a handler
/// propagates is returned as `Err` for the transport to translate.
pub async fn dispatch(
    provider: &dyn EmailProvider,
    mut params: ToolCallParams,
) -> Result<CallToolResult, AppError> {
    let Some(arguments) =
        ToolArguments::from_raw(params.arguments.take()).and_then(ToolArguments::into_map)
    else {
        return Ok(tool_error_result(INVALID_ARGUMENTS_MESSAGE));
    };

    let Some(kind) = params.tool_name().and_then(ToolKind::from_name) else {
        return Ok(tool_error_result(format!(
            "Tool not found: {}",
            params.display_name()
        )));
    };

    match kind {
        ToolKind::ListEmailTemplates => invoke::<ListEmailTemplatesTool>(provider, arguments).await,
        ToolKind::GetHtmlTemplateById => {
            invoke::<GetHtmlTemplateByIdTool>(provider, arguments).await
        }
        ToolKind::SaveEmailHtmlTemplate => {
            invoke::<SaveEmailHtmlTemplateTool>(provider, arguments).await
        }
        ToolKind::GetAggregateEmailStats => {
            invoke::<GetAggregateEmailStatsTool>(provider, arguments).await
        }
    }
}

pub async fn handle_tools_call(
    state: &AppState,
    params: Option<Value>,
) -> Result<CallToolResult, AppError> {
    let Some(raw_params) = params else {
        return Err(AppError::bad_request(
            "missing_params",
            "tools/call requires params",
        ));
    };

    let tool_call: ToolCallParams = serde_json::from_value(raw_params).map_err(|_| {
        AppError::bad_request("invalid_tool_call", "tools/call params must be an object")
    })?;

    dispatch(state.email_provider.as_ref(), tool_call).await
}
