//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::ProviderError;
use crate::gateway::{Completion, CompletionProvider, CompletionRequest, GroundingReference};

enum Reply {
    Text(String, Vec<GroundingReference>),
    Fail,
}

/// Replays canned replies in order; repeats the last one once the script runs out.
pub(crate) struct StubClient {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubClient {
    fn with(reply: Reply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([reply])),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(text: impl Into<String>) -> Self {
        Self::with(Reply::Text(text.into(), Vec::new()))
    }

    pub(crate) fn replying_with_grounding(
        text: impl Into<String>,
        grounding: Vec<GroundingReference>,
    ) -> Self {
        Self::with(Reply::Text(text.into(), grounding))
    }

    pub(crate) fn failing() -> Self {
        Self::with(Reply::Fail)
    }

    pub(crate) fn then(self, text: impl Into<String>) -> Self {
        self.replies
            .lock()
            .expect("replies poisoned")
            .push_back(Reply::Text(text.into(), Vec::new()));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests poisoned").clone()
    }

    pub(crate) fn last_request(&self) -> CompletionRequest {
        self.requests().pop().expect("stub was never called")
    }
}

fn replay(reply: &Reply) -> Result<Completion, ProviderError> {
    match reply {
        Reply::Text(text, grounding) => Ok(Completion {
            text: text.clone(),
            grounding: grounding.clone(),
        }),
        Reply::Fail => Err(ProviderError::Transport("connection refused".into())),
    }
}

#[async_trait]
impl CompletionProvider for StubClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests poisoned")
            .push(request);

        let next = self.replies.lock().expect("replies poisoned").pop_front();
        let mut last = self.last.lock().expect("last reply poisoned");
        if let Some(reply) = next {
            *last = Some(reply);
        }
        match last.as_ref() {
            Some(reply) => replay(reply),
            None => Ok(Completion::default()),
        }
    }
}
