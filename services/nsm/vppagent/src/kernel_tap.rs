//! Kernel interface mechanism backed by a VPP TAP.

use crate::config::{config, with_config};
use crate::error::CommitError;
use crate::proto::{Interface, InterfaceType, TapLink};
use async_trait::async_trait;
use nsm_api::{Connection, NetworkServiceRequest};
use nsm_core::{ChainError, Context, Handler, Next};
use tracing::{debug, warn};

/// Linux limit on interface names, without the trailing NUL
const MAX_HOST_IF_NAME: usize = 15;

/// Adds a TAP interface for the connection to the side-channel config
#[derive(Debug, Default, Clone)]
pub struct KernelTap {
    tap_version: u32,
}

impl KernelTap {
    /// Handler creating TAPv2 interfaces
    pub fn new() -> Self {
        Self { tap_version: 2 }
    }

    fn append(&self, ctx: &Context, conn: &Connection) -> Result<Context, ChainError> {
        if conn.id.is_empty() {
            warn!("Refusing to add a tap for a connection without id");
            return Err(ChainError::handler("kernel tap", CommitError::MissingConnectionId));
        }
        let ctx = with_config(ctx);
        if let Some(cfg) = config(&ctx) {
            let interface = self.interface(&conn.id);
            debug!("Adding tap {} for connection {}", interface.name, conn.id);
            cfg.add_interface(interface);
        }
        Ok(ctx)
    }

    fn interface(&self, id: &str) -> Interface {
        Interface {
            name: format!("server-{}", id),
            r#type: InterfaceType::Tap as i32,
            enabled: true,
            ip_addresses: Vec::new(),
            tap: Some(TapLink {
                version: self.tap_version,
                host_if_name: host_if_name(id),
            }),
        }
    }
}

fn host_if_name(id: &str) -> String {
    let mut end = id.len().min(MAX_HOST_IF_NAME);
    while !id.is_char_boundary(end) {
        end -= 1;
    }
    id[..end].to_string()
}

#[async_trait]
impl Handler for KernelTap {
    async fn request(
        &self,
        ctx: &Context,
        request: &NetworkServiceRequest,
        next: Next,
    ) -> Result<Connection, ChainError> {
        let conn = request.connection.clone().unwrap_or_default();
        let ctx = self.append(ctx, &conn)?;
        next.request(&ctx, request).await
    }

    async fn close(&self, ctx: &Context, conn: &Connection, next: Next) -> Result<(), ChainError> {
        let ctx = self.append(ctx, conn)?;
        next.close(&ctx, conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsm_core::Chain;
    use nsm_core::NetworkService;
    use std::sync::{Arc, Mutex};

    /// Captures the config seen at the end of the chain
    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<Interface>>,
    }

    #[async_trait]
    impl Handler for Capture {
        async fn request(
            &self,
            ctx: &Context,
            request: &NetworkServiceRequest,
            next: Next,
        ) -> Result<Connection, ChainError> {
            if let Some(cfg) = config(ctx) {
                self.seen.lock().unwrap().extend(cfg.snapshot().interfaces);
            }
            next.request(ctx, request).await
        }

        async fn close(&self, ctx: &Context, conn: &Connection, next: Next) -> Result<(), ChainError> {
            if let Some(cfg) = config(ctx) {
                self.seen.lock().unwrap().extend(cfg.snapshot().interfaces);
            }
            next.close(ctx, conn).await
        }
    }

    #[test]
    fn test_host_if_name_truncated() {
        assert_eq!(host_if_name("short"), "short");
        assert_eq!(host_if_name("0123456789abcdefghij"), "0123456789abcde");
        assert_eq!(host_if_name("ééééééééé").len(), 14);
    }

    #[tokio::test]
    async fn test_request_appends_tap_before_delegating() {
        let capture = Arc::new(Capture::default());
        let chain = Chain::new(vec![Arc::new(KernelTap::new()), capture.clone()]);

        let request = NetworkServiceRequest::new(Connection::new("conn-1"));
        chain.request(&Context::background(), &request).await.unwrap();

        let seen = capture.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "server-conn-1");
        assert_eq!(seen[0].r#type, InterfaceType::Tap as i32);
        assert_eq!(seen[0].tap.as_ref().unwrap().host_if_name, "conn-1");
    }

    #[tokio::test]
    async fn test_request_without_id_is_rejected() {
        let capture = Arc::new(Capture::default());
        let chain = Chain::new(vec![Arc::new(KernelTap::new()), capture.clone()]);

        let request = NetworkServiceRequest::new(Connection::default());
        let err = chain
            .request(&Context::background(), &request)
            .await
            .unwrap_err();

        assert!(matches!(
            err.find::<CommitError>(),
            Some(CommitError::MissingConnectionId)
        ));
        assert!(capture.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_appends_tap() {
        let capture = Arc::new(Capture::default());
        let chain = Chain::new(vec![Arc::new(KernelTap::new()), capture.clone()]);

        chain
            .close(&Context::background(), &Connection::new("conn-2"))
            .await
            .unwrap();

        assert_eq!(capture.seen.lock().unwrap()[0].name, "server-conn-2");
    }
}
