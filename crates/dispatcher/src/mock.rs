//! In-process sink and media fetcher for tests and dry runs

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    Attachment, ContractError, DeliveryUnit, EndpointKey, MediaFetcher, MediaKind, SinkResponse,
    WebhookSink,
};

type Rule = Box<dyn Fn(&DeliveryUnit) -> Option<SinkResponse> + Send + Sync>;

#[derive(Default)]
struct SinkState {
    attempts: Vec<DeliveryUnit>,
    delivered: Vec<DeliveryUnit>,
    script: VecDeque<Result<SinkResponse, ContractError>>,
}

/// Sink that records every unit and answers from a script.
///
/// Answers are taken, in order, from the scripted queue, then from the
/// first matching rule, else `204`. Clones share state.
#[derive(Clone)]
pub struct RecordingSink {
    name: String,
    key: EndpointKey,
    state: Arc<Mutex<SinkState>>,
    rules: Arc<Mutex<Vec<Rule>>>,
}

impl RecordingSink {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: EndpointKey::new(format!("POST:test:{name}")),
            name,
            state: Arc::default(),
            rules: Arc::default(),
        }
    }

    /// Use a specific rate limit key (to share buckets between sinks)
    pub fn with_key(mut self, key: EndpointKey) -> Self {
        self.key = key;
        self
    }

    /// Queue the answer for the next request
    pub fn push_response(&self, response: SinkResponse) {
        self.lock().script.push_back(Ok(response));
    }

    /// Queue a transport failure for the next request
    pub fn push_error(&self, error: ContractError) {
        self.lock().script.push_back(Err(error));
    }

    /// Answer matching units with `response`
    pub fn respond_when<F>(&self, rule: F)
    where
        F: Fn(&DeliveryUnit) -> Option<SinkResponse> + Send + Sync + 'static,
    {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Box::new(rule));
        }
    }

    /// Every request, including failed ones
    pub fn attempts(&self) -> Vec<DeliveryUnit> {
        self.lock().attempts.clone()
    }

    /// Units answered with 2xx, in order
    pub fn delivered(&self) -> Vec<DeliveryUnit> {
        self.lock().delivered.clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.lock().delivered.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn answer(&self, unit: &DeliveryUnit) -> Result<SinkResponse, ContractError> {
        if let Some(scripted) = self.lock().script.pop_front() {
            return scripted;
        }
        let rules = self.rules.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(rules
            .iter()
            .find_map(|rule| rule(unit))
            .unwrap_or_else(|| SinkResponse::new(204)))
    }
}

impl WebhookSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint_key(&self) -> &EndpointKey {
        &self.key
    }

    async fn send(&self, unit: &DeliveryUnit) -> Result<SinkResponse, ContractError> {
        self.lock().attempts.push(unit.clone());
        let answer = self.answer(unit);
        if let Ok(response) = &answer {
            if response.is_success() {
                self.lock().delivered.push(unit.clone());
            }
        }
        answer
    }
}

/// Media fetcher serving synthetic bytes; urls can be marked as failing.
#[derive(Clone, Default)]
pub struct ScriptedMediaFetcher {
    failing: Arc<Mutex<HashSet<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    requests: Arc<Mutex<HashMap<String, u32>>>,
}

impl ScriptedMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make downloads of `url` fail
    pub fn fail(&self, url: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(url.into());
        }
    }

    /// Make downloads of `url` take `delay`
    pub fn delay(&self, url: impl Into<String>, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(url.into(), delay);
        }
    }

    /// Number of downloads requested for `url`
    pub fn requests(&self, url: &str) -> u32 {
        self.requests
            .lock()
            .map(|requests| requests.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl MediaFetcher for ScriptedMediaFetcher {
    async fn fetch(&self, url: &str, kind: MediaKind) -> Result<Attachment, ContractError> {
        if let Ok(mut requests) = self.requests.lock() {
            *requests.entry(url.to_string()).or_default() += 1;
        }
        let delay = self
            .delays
            .lock()
            .ok()
            .and_then(|delays| delays.get(url).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(url))
            .unwrap_or(false);
        if failing {
            return Err(ContractError::media(url, "scripted failure"));
        }

        let name = url.rsplit('/').next().unwrap_or(url);
        Ok(Attachment::new(
            format!("{kind}_{name}"),
            kind.content_type(),
            url.as_bytes().to_vec(),
        ))
    }
}
