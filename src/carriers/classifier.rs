//! Carrier classification from email body text.

use std::sync::Arc;

use tracing::debug;

use crate::carriers::registry::{CarrierKey, CarrierRegistry};

/// Infers the carrier from free text by matching display names.
pub struct CarrierClassifier {
    registry: Arc<CarrierRegistry>,
    /// Lowercased display names, in registry order.
    needles: Vec<(CarrierKey, String)>,
}

impl CarrierClassifier {
    pub fn new(registry: Arc<CarrierRegistry>) -> Self {
        let needles = registry
            .profiles()
            .map(|p| (p.key, p.display_name.to_lowercase()))
            .collect();
        Self { registry, needles }
    }

    /// First carrier whose display name occurs in `body` (case-insensitive).
    /// Falls back to `autres` when nothing matches.
    pub fn classify(&self, body: &str) -> CarrierKey {
        let haystack = body.to_lowercase();
        if let Some((key, _)) = self
            .needles
            .iter()
            .find(|(_, needle)| haystack.contains(needle.as_str()))
        {
            return *key;
        }
        debug!("No carrier name found in body, using fallback");
        self.registry.fallback().key
    }
}
