use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tollgate_core::{ProviderBackend, ProviderReply, TollgateError};

/// Provider double that replays a scripted sequence of replies and records
/// which models were asked. For tests.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderReply, TollgateError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ProviderReply, TollgateError>>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: a script of successful `(text, cost_usd)` replies.
    pub fn replying(replies: Vec<(&str, f64)>) -> Self {
        Self::new(
            replies
                .into_iter()
                .map(|(text, cost_usd)| {
                    Ok(ProviderReply {
                        text: text.to_string(),
                        cost_usd,
                    })
                })
                .collect(),
        )
    }

    /// Model ids of every call made so far, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl ProviderBackend for ScriptedProvider {
    async fn execute(
        &self,
        model_id: &str,
        _payload: &str,
    ) -> Result<ProviderReply, TollgateError> {
        self.calls.lock().await.push(model_id.to_string());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                Err(TollgateError::Provider(
                    "scripted provider exhausted replies".to_string(),
                ))
            })
    }
}
