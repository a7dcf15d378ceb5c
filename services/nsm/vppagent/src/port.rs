//! Waiting for the vpp-agent to listen.

use crate::error::CommitError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout as within, Instant};
use tracing::{debug, info};

/// Poll `address` with TCP connects until one succeeds or `timeout` elapses
pub async fn wait_for_port_available(
    address: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), CommitError> {
    let started = Instant::now();
    let deadline = started + timeout;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match within(left, TcpStream::connect(address)).await {
            Ok(Ok(_)) => {
                info!("{} accepts connections after {:?}", address, started.elapsed());
                return Ok(());
            }
            Ok(Err(e)) => debug!("{} not reachable yet: {}", address, e),
            Err(_) => debug!("Connect to {} still pending at the deadline", address),
        }

        if Instant::now() + poll_interval > deadline {
            return Err(CommitError::PortUnavailable {
                address: address.to_string(),
                timeout,
            });
        }
        sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_bound_listener_is_available() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        wait_for_port_available(&address, Duration::from_secs(1), Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_port_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = wait_for_port_available(
            &address,
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommitError::PortUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unroutable_address_bounded_by_timeout() {
        let started = Instant::now();
        let err = wait_for_port_available(
            "10.255.255.1:9111",
            Duration::from_millis(200),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommitError::PortUnavailable { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
