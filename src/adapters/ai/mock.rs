//! Mock completion client.
//!
//! Serves the deterministic canned persona reply when the service runs
//! without a provider: no key configured, a placeholder key, or a failed
//! startup credential probe. The reply is templated with the user's message
//! so conversations still feel addressed.

use async_trait::async_trait;
use futures::stream;

use crate::application::prompt;
use crate::ports::{CompletionClient, CompletionError, CompletionRequest, FragmentStream};

/// Completion client that answers from the canned persona reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCompletionClient;

impl MockCompletionClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        Ok(prompt::mock_reply(&request.user_message))
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, CompletionError> {
        let reply = prompt::mock_reply(&request.user_message);
        Ok(Box::pin(stream::once(async move {
            Ok::<_, CompletionError>(reply)
        })))
    }
}
