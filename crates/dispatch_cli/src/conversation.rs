//! Routes incoming chat messages to the dispatch engine.
//!
//! Drivers are recognised by identity and only ever answer offers. Everyone
//! else is a client walking through a small menu: `taxi`, then a pickup
//! location, then the ride request.

use std::collections::HashMap;

use dispatch_core::{ClientId, DispatchEngine, DriverId, PickupLocation, ReplyDecision};
use parking_lot::Mutex;
use tracing::debug;

use crate::intent::{ClientIntent, DriverIntent};
use crate::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ClientStage {
    #[default]
    Idle,
    AwaitingLocation,
}

/// One parsed input line: `<identity>|<display name>|<message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub identity: String,
    pub display_name: String,
    pub text: String,
}

impl Incoming {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, '|');
        let identity = parts.next()?.trim();
        let display_name = parts.next()?.trim();
        let text = parts.next()?.trim();
        if identity.is_empty() {
            return None;
        }
        Some(Self {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            text: text.to_string(),
        })
    }
}

pub struct ChatAdapter {
    engine: DispatchEngine,
    stages: Mutex<HashMap<ClientId, ClientStage>>,
}

impl ChatAdapter {
    pub fn new(engine: DispatchEngine) -> Self {
        Self {
            engine,
            stages: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one message and return the direct answer for its sender.
    pub async fn handle(&self, message: &Incoming) -> String {
        if self.engine.is_driver(&message.identity) {
            self.handle_driver(DriverId::new(message.identity.as_str()), &message.text)
                .await
        } else {
            self.handle_client(message).await
        }
    }

    async fn handle_driver(&self, driver_id: DriverId, text: &str) -> String {
        let decision = match DriverIntent::parse(text) {
            DriverIntent::Accept => ReplyDecision::Accept,
            DriverIntent::Reject => ReplyDecision::Reject,
            DriverIntent::Finished => {
                return render::release_outcome(self.engine.release_driver(&driver_id));
            }
            DriverIntent::Unknown => {
                debug!(driver_id = %driver_id, "unrecognised driver message");
                return render::driver_help();
            }
        };
        let result = self.engine.handle_driver_reply(&driver_id, decision).await;
        render::reply_result(&result)
    }

    async fn handle_client(&self, message: &Incoming) -> String {
        let client_id = ClientId::new(message.identity.as_str());
        let intent = ClientIntent::parse(&message.text);

        let location = {
            let mut stages = self.stages.lock();
            let stage = stages.entry(client_id.clone()).or_default();
            match (intent, *stage) {
                (ClientIntent::Menu, _) => {
                    *stage = ClientStage::Idle;
                    return render::menu();
                }
                (ClientIntent::RequestTaxi, _) => {
                    *stage = ClientStage::AwaitingLocation;
                    return render::ask_location();
                }
                (ClientIntent::Text(_), ClientStage::Idle) => return render::menu(),
                (ClientIntent::Text(text), ClientStage::AwaitingLocation) => {
                    match PickupLocation::from_text(&text) {
                        Some(location) => {
                            *stage = ClientStage::Idle;
                            location
                        }
                        None => return render::ask_location(),
                    }
                }
            }
        };

        let result = self
            .engine
            .create_request(client_id, message.display_name.as_str(), Some(location))
            .await;
        render::create_result(&result)
    }
}
