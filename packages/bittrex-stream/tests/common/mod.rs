//! In-memory hub transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bittrex_stream::infrastructure::bittrex::codec;
use bittrex_stream::{
    HubConnection, HubConnector, HubEndpoint, PushHandler, ServerPush, StreamClient,
    StreamSettings, TransportError,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

pub const HUB: &str = "c3";

/// One recorded `invoke` call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub hub: String,
    pub method: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct HubState {
    handler: Option<PushHandler>,
    disconnected: Option<CancellationToken>,
    connect_cancel: Option<CancellationToken>,
    invocations: Vec<Invocation>,
    responses: HashMap<String, Value>,
    stalled: HashSet<String>,
    connect_delay: Option<Duration>,
    connects: usize,
    closes: usize,
}

/// Fake hub: acts as connector, records calls, injects pushes.
#[derive(Clone, Default)]
pub struct FakeHub {
    state: Arc<Mutex<HubState>>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every connect by `delay`.
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.state.lock().connect_delay = Some(delay);
        self
    }

    /// Answer every `method` call with `response`.
    pub fn respond(&self, method: &str, response: Value) {
        self.state
            .lock()
            .responses
            .insert(method.to_string(), response);
    }

    /// Make every `method` call record itself and then never answer.
    pub fn stall(&self, method: &str) {
        self.state.lock().stalled.insert(method.to_string());
    }

    pub fn client(&self, settings: StreamSettings) -> StreamClient {
        StreamClient::new(Arc::new(self.clone()), settings)
    }

    /// Deliver a push through the registered handler.
    pub fn push(&self, hub: &str, method: &str, payloads: Vec<String>) {
        let handler = self
            .state
            .lock()
            .handler
            .clone()
            .expect("no connection registered a push handler");
        handler(ServerPush::new(hub, method, payloads));
    }

    /// Deliver a push whose payloads are JSON documents encoded like the hub does.
    pub fn push_json(&self, method: &str, documents: &[Value]) {
        let payloads = documents
            .iter()
            .map(|doc| codec::encode(doc.to_string().as_bytes()).unwrap())
            .collect();
        self.push(HUB, method, payloads);
    }

    /// Fire the transport's disconnect signal.
    pub fn disconnect(&self) {
        if let Some(token) = self.state.lock().disconnected.clone() {
            token.cancel();
        }
    }

    pub fn invocations(&self, method: &str) -> Vec<Invocation> {
        self.state
            .lock()
            .invocations
            .iter()
            .filter(|i| i.method == method)
            .cloned()
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn connect_cancelled(&self) -> bool {
        self.state
            .lock()
            .connect_cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Every recorded method name, in call order.
    pub fn methods(&self) -> Vec<String> {
        self.state
            .lock()
            .invocations
            .iter()
            .map(|i| i.method.clone())
            .collect()
    }

    /// Yield to the runtime until `method` has been invoked `count` times.
    pub async fn until_invoked(&self, method: &str, count: usize) {
        for _ in 0..10_000 {
            if self.invocations(method).len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("{method} was not invoked {count} times");
    }

    /// Yield to the runtime until `count` connections were closed.
    pub async fn until_closed(&self, count: usize) {
        for _ in 0..10_000 {
            if self.closes() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("{count} connections were not closed");
    }

    /// Yield to the runtime until the feed has subscribed.
    pub async fn until_subscribed(&self) {
        self.until_invoked("Subscribe", 1).await;
    }
}

#[async_trait]
impl HubConnector for FakeHub {
    async fn connect(
        &self,
        _endpoint: &HubEndpoint,
        on_push: PushHandler,
        cancel: CancellationToken,
    ) -> Result<Box<dyn HubConnection>, TransportError> {
        let delay = {
            let mut state = self.state.lock();
            state.connects += 1;
            state.connect_cancel = Some(cancel);
            state.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let disconnected = CancellationToken::new();
        {
            let mut state = self.state.lock();
            state.handler = Some(on_push);
            state.disconnected = Some(disconnected.clone());
        }
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
            disconnected,
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<HubState>>,
    disconnected: CancellationToken,
}

#[async_trait]
impl HubConnection for FakeConnection {
    async fn invoke(
        &self,
        hub: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let (response, stalled) = {
            let mut state = self.state.lock();
            let default = match method {
                "Subscribe" => {
                    let count = args
                        .first()
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    json!(vec![json!({"Success": true, "ErrorCode": null}); count])
                }
                _ => json!({"Success": true, "ErrorCode": null}),
            };
            let response = state.responses.get(method).cloned().unwrap_or(default);
            state.invocations.push(Invocation {
                hub: hub.to_string(),
                method: method.to_string(),
                args,
            });
            (response, state.stalled.contains(method))
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(response)
    }

    fn disconnected(&self) -> CancellationToken {
        self.disconnected.clone()
    }

    async fn close(&self) {
        self.state.lock().closes += 1;
    }
}
