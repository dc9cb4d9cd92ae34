//! Provider capabilities.

use crate::models::ResourceKind;

/// Describes what a market data provider can serve.
///
/// Used by the waterfall to skip providers that cannot answer a request
/// without spending a call on them.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Resource families this provider serves.
    pub resources: &'static [ResourceKind],
}

impl ProviderCapabilities {
    pub fn supports(&self, kind: ResourceKind) -> bool {
        self.resources.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        let caps = ProviderCapabilities {
            resources: &[ResourceKind::Quote, ResourceKind::Bars],
        };
        assert!(caps.supports(ResourceKind::Bars));
        assert!(!caps.supports(ResourceKind::OptionChain));
    }
}
