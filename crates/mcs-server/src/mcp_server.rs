//! MCP Server Implementation
//!
//! The rmcp `ServerHandler` for framed MCP sessions. Every message is
//! translated into dispatcher, registry, or selector calls on the shared
//! application context; the catalog itself stays dynamic underneath.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{
    AnnotateAble, CallToolRequestParam, CallToolResult, Content, GetPromptRequestParam,
    GetPromptResult, Implementation, ListPromptsResult, ListResourcesResult, ListToolsResult,
    PaginatedRequestParam, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
    ProtocolVersion, RawResource, ReadResourceRequestParam, ReadResourceResult, Resource,
    ResourceContents, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::ErrorData as McpError;
use rmcp::ServerHandler;
use serde_json::Value;

use mcs_application::dispatcher::RequestMeta;
use mcs_domain::capability::{CapabilityKind, CapabilityPayload};
use mcs_domain::error::{Error, ErrorKind};
use mcs_domain::value_objects::InvocationOutcome;
use mcs_infrastructure::AppContext;

use crate::claims::stdio_claims;
use crate::views;

/// Session label for the stdio transport
const STDIO_SESSION: &str = "stdio";

/// Core MCP server implementation
///
/// Holds the shared application context and receives all dependencies
/// through it; the handler itself is stateless.
#[derive(Clone)]
pub struct McpServer {
    app: Arc<AppContext>,
}

impl McpServer {
    /// Create a new MCP server over the application context
    pub fn new(app: Arc<AppContext>) -> Self {
        Self { app }
    }

    /// Access to the application context
    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    /// Build the rmcp tool list from the current catalog snapshot
    fn tool_list(&self) -> Result<Vec<Tool>, McpError> {
        self.app
            .registry
            .list(Some(CapabilityKind::Tool), &Default::default())
            .iter()
            .map(|capability| {
                let tool = capability
                    .as_tool()
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                let input_schema = tool
                    .input_schema
                    .as_object()
                    .cloned()
                    .ok_or_else(|| {
                        McpError::internal_error(
                            format!("schema for {} is not an object", capability.name),
                            None,
                        )
                    })?;
                let output_schema = tool
                    .output_schema
                    .as_ref()
                    .and_then(Value::as_object)
                    .cloned()
                    .map(Arc::new);

                Ok(Tool {
                    name: Cow::Owned(capability.name.clone()),
                    title: None,
                    description: Some(Cow::Owned(capability.description.clone())),
                    input_schema: Arc::new(input_schema),
                    output_schema,
                    annotations: None,
                    icons: None,
                    meta: Default::default(),
                })
            })
            .collect()
    }

    /// Build the rmcp prompt list from the current catalog snapshot
    fn prompt_list(&self) -> Vec<Prompt> {
        self.app
            .registry
            .list(Some(CapabilityKind::Prompt), &Default::default())
            .iter()
            .filter_map(|capability| {
                let prompt = match &capability.payload {
                    CapabilityPayload::Prompt(prompt) => prompt,
                    _ => return None,
                };
                let arguments = prompt
                    .arguments
                    .iter()
                    .map(|arg| PromptArgument {
                        name: arg.name.clone(),
                        title: None,
                        description: Some(arg.description.clone()),
                        required: Some(arg.required),
                    })
                    .collect::<Vec<_>>();
                Some(Prompt {
                    name: capability.name.clone(),
                    title: None,
                    description: Some(capability.description.clone()),
                    arguments: Some(arguments),
                    icons: None,
                    meta: Default::default(),
                })
            })
            .collect()
    }

    /// Build the rmcp resource list from the current catalog snapshot
    fn resource_list(&self) -> Vec<Resource> {
        self.app
            .registry
            .list(Some(CapabilityKind::Resource), &Default::default())
            .iter()
            .filter_map(|capability| {
                let resource = match &capability.payload {
                    CapabilityPayload::Resource(resource) => resource,
                    _ => return None,
                };
                let mut raw = RawResource::new(resource.uri.clone(), capability.name.clone());
                raw.description = Some(capability.description.clone());
                raw.mime_type = Some(resource.mime_type.clone());
                Some(raw.no_annotation())
            })
            .collect()
    }
}

/// Map a domain error onto an MCP protocol error
fn to_mcp_error(error: &Error) -> McpError {
    match error.kind() {
        ErrorKind::InvalidArgument | ErrorKind::NotFound => {
            McpError::invalid_params(error.to_string(), None)
        }
        ErrorKind::Denied => McpError::invalid_request(error.to_string(), None),
        _ => McpError::internal_error(error.to_string(), None),
    }
}

impl ServerHandler for McpServer {
    /// Get server information and capabilities
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: self.app.config.server.service_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Smart Capability Server\n\n\
                 A dynamic catalog of tools, prompts, and resources.\n\n\
                 Built-in tools:\n\
                 - echo: connectivity check\n\
                 - search_catalog: semantic search over the whole catalog\n"
                    .to_string(),
            ),
        }
    }

    /// List available tools
    async fn list_tools(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_list()?,
            meta: Default::default(),
            next_cursor: None,
        })
    }

    /// Call a tool
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = Value::Object(request.arguments.unwrap_or_default());
        let meta = RequestMeta::for_session(STDIO_SESSION).with_parent_cancel(context.ct.clone());

        let result = self
            .app
            .dispatcher
            .invoke_tool(&request.name, arguments, &stdio_claims(), meta)
            .await;

        match result.outcome {
            InvocationOutcome::Ok => {
                let value = result.value.unwrap_or(Value::Null);
                let content = views::tool_content(&value)
                    .into_iter()
                    .map(|item| {
                        Content::text(
                            item.get("text")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        )
                    })
                    .collect();
                Ok(CallToolResult::success(content))
            }
            InvocationOutcome::Failed => {
                let error = result
                    .error
                    .unwrap_or_else(|| Error::internal("invocation failed"));
                match error.kind() {
                    // Handler-level failures surface as tool error content
                    ErrorKind::Internal
                    | ErrorKind::UpstreamUnavailable
                    | ErrorKind::BudgetExhausted => {
                        Ok(CallToolResult::error(vec![Content::text(error.to_string())]))
                    }
                    _ => Err(to_mcp_error(&error)),
                }
            }
            _ => {
                let error = result
                    .error
                    .unwrap_or_else(|| Error::internal("invocation failed"));
                Err(to_mcp_error(&error))
            }
        }
    }

    /// List available prompts
    async fn list_prompts(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: self.prompt_list(),
            meta: Default::default(),
            next_cursor: None,
        })
    }

    /// Render a prompt with arguments
    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let arguments = request.arguments.unwrap_or_default();
        let meta = RequestMeta::for_session(STDIO_SESSION).with_parent_cancel(context.ct.clone());

        let text = self
            .app
            .dispatcher
            .render_prompt(&request.name, &arguments, &stdio_claims(), meta)
            .await
            .map_err(|e| to_mcp_error(&e))?;

        Ok(GetPromptResult {
            description: None,
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
        })
    }

    /// List available resources
    async fn list_resources(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.resource_list(),
            meta: Default::default(),
            next_cursor: None,
        })
    }

    /// Read a resource by URI
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let meta = RequestMeta::for_session(STDIO_SESSION).with_parent_cancel(context.ct.clone());

        let (capability, body) = self
            .app
            .dispatcher
            .read_resource(&request.uri, &stdio_claims(), meta)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    McpError::resource_not_found(e.to_string(), None)
                }
                _ => to_mcp_error(&e),
            })?;

        let resource = capability
            .as_resource()
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let contents = if resource.is_textual() {
            match String::from_utf8(body.bytes.clone()) {
                Ok(text) => ResourceContents::TextResourceContents {
                    uri: resource.uri.clone(),
                    mime_type: Some(resource.mime_type.clone()),
                    text,
                    meta: None,
                },
                Err(_) => blob_contents(&resource.uri, &resource.mime_type, &body.bytes),
            }
        } else {
            blob_contents(&resource.uri, &resource.mime_type, &body.bytes)
        };

        Ok(ReadResourceResult {
            contents: vec![contents],
        })
    }
}

/// Build base64 blob contents for binary resources
fn blob_contents(uri: &str, mime_type: &str, bytes: &[u8]) -> ResourceContents {
    use base64::Engine;
    ResourceContents::BlobResourceContents {
        uri: uri.to_string(),
        mime_type: Some(mime_type.to_string()),
        blob: base64::engine::general_purpose::STANDARD.encode(bytes),
        meta: None,
    }
}
