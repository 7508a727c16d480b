pub mod openai;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::prompt::ConversationMessage;

/// Abstract chat completion interface.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Generates a reply to the assembled message list.
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}
