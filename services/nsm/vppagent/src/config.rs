//! Side-channel vpp-agent configuration carried by the call context.

use crate::proto::{Config, Interface};
use nsm_core::Context;
use std::sync::{Arc, Mutex};

/// Configuration accumulated by the handlers of one chain pass
#[derive(Debug, Default)]
pub struct VppAgentConfig {
    inner: Mutex<Config>,
}

impl VppAgentConfig {
    /// Mutate the accumulated configuration
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Config) -> R,
    {
        let mut config = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut config)
    }

    /// Append one interface
    pub fn add_interface(&self, interface: Interface) {
        self.update(|config| config.interfaces.push(interface));
    }

    /// Copy of the accumulated configuration
    pub fn snapshot(&self) -> Config {
        self.update(|config| config.clone())
    }

    /// Whether nothing was accumulated yet
    pub fn is_empty(&self) -> bool {
        self.update(|config| config.is_empty())
    }
}

/// Context guaranteed to carry a [`VppAgentConfig`].
///
/// Returns `ctx` itself when it already has one so that handlers further
/// down the chain keep adding to the same accumulator.
pub fn with_config(ctx: &Context) -> Context {
    if ctx.value::<VppAgentConfig>().is_some() {
        return ctx.clone();
    }
    ctx.with_value(VppAgentConfig::default())
}

/// Accumulator carried by `ctx`, if any
pub fn config(ctx: &Context) -> Option<Arc<VppAgentConfig>> {
    ctx.value::<VppAgentConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::InterfaceType;

    fn loopback(name: &str) -> Interface {
        Interface {
            name: name.to_string(),
            r#type: InterfaceType::SoftwareLoopback as i32,
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_background_has_no_config() {
        assert!(config(&Context::background()).is_none());
    }

    #[test]
    fn test_with_config_is_idempotent() {
        let ctx = with_config(&Context::background());
        config(&ctx).unwrap().add_interface(loopback("lo0"));

        let again = with_config(&ctx);
        let cfg = config(&again).unwrap();
        assert_eq!(cfg.snapshot().interfaces.len(), 1);
        assert!(Arc::ptr_eq(&cfg, &config(&ctx).unwrap()));
    }

    #[test]
    fn test_derived_contexts_share_accumulator() {
        let ctx = with_config(&Context::background());
        let child = ctx.with_value(42u32);
        config(&child).unwrap().add_interface(loopback("lo1"));

        let cfg = config(&ctx).unwrap();
        assert!(!cfg.is_empty());
        assert_eq!(cfg.snapshot().interfaces[0].name, "lo1");
    }
}
