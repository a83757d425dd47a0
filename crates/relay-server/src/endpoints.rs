/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Resolves a `webhook_id` against the live configuration snapshot,
//! bridging the Config Store to the Queue Processor's
//! [`relay_processor::EndpointLookup`] seam.

use std::sync::Arc;

use relay_config::Settings;
use relay_types::WebhookEndpoint;
use tokio::sync::watch;
use uuid::Uuid;

pub struct ConfigEndpointLookup {
    settings: watch::Receiver<Arc<Settings>>,
}

impl ConfigEndpointLookup {
    pub fn new(settings: watch::Receiver<Arc<Settings>>) -> Self {
        Self { settings }
    }
}

impl relay_processor::EndpointLookup for ConfigEndpointLookup {
    fn endpoint(&self, webhook_id: Uuid) -> Option<WebhookEndpoint> {
        self.settings
            .borrow()
            .subscriptions
            .iter()
            .flat_map(|s| s.webhooks.iter())
            .find(|w| w.webhook_id == webhook_id)
            .cloned()
    }
}
