//! Builds a [`ClientProxy`] from a set of `Medium` drivers and endpoint
//! manager tuning, the way `s2n-quic`'s `Server`/`Client` builders collect
//! an `io::Provider` plus limits before producing the runnable type.

use crate::ClientProxy;
use nearlink_core::Medium as MediumKind;
use nearlink_transport::medium_driver::Medium;
use nearlink_transport::EndpointManagerConfig;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ClientProxyBuilder {
    mediums: HashMap<MediumKind, Arc<dyn Medium>>,
    config: EndpointManagerConfig,
}

impl ClientProxyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver for `kind`. Replaces any driver previously
    /// registered for the same medium.
    pub fn with_medium(mut self, kind: MediumKind, medium: Arc<dyn Medium>) -> Self {
        self.mediums.insert(kind, medium);
        self
    }

    pub fn with_config(mut self, config: EndpointManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<ClientProxy> {
        ClientProxy::new(self.mediums, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_with_no_mediums_still_produces_a_client_proxy() {
        let client = ClientProxyBuilder::new().build();
        assert!(!client.local_endpoint_id().to_string().is_empty());
    }
}
