//! Stdio transport
//!
//! Serves the MCP protocol over stdin/stdout through rmcp. This is the
//! traditional transport for CLI tools and IDE integrations.

use rmcp::{transport::stdio, ServiceExt};
use tracing::info;

use crate::McpServer;

/// Extension trait serving an [`McpServer`] over stdio
pub trait StdioServerExt {
    /// Serve until the client disconnects or the process shuts down
    fn serve_stdio(
        self,
    ) -> impl std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;
}

impl StdioServerExt for McpServer {
    async fn serve_stdio(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("starting MCP stdio transport");
        let service = self.serve(stdio()).await?;
        info!("MCP stdio transport ready");
        service.waiting().await?;
        info!("MCP stdio transport finished");
        Ok(())
    }
}
