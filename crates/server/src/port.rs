use crate::error::{Result, ServerError};
use tokio::net::TcpListener;

/// Probes `attempts` consecutive ports starting at `base` and returns the first
/// one on which both the HTTP listener and the push-channel listener can bind.
pub async fn find_available_port(host: &str, base: u16, attempts: u16) -> Result<u16> {
    let end = base.saturating_add(attempts.saturating_sub(1));
    if attempts == 0 {
        return Err(ServerError::PortRangeExhausted { start: base, end });
    }

    for port in base..=end {
        if probe(host, port).await {
            return Ok(port);
        }
    }
    Err(ServerError::PortRangeExhausted { start: base, end })
}

async fn probe(host: &str, port: u16) -> bool {
    // Both listeners end up on the same socket; binding twice in sequence
    // mirrors the two servers that will share it.
    for listener in ["http", "push"] {
        match TcpListener::bind((host, port)).await {
            Ok(socket) => drop(socket),
            Err(err) => {
                log::debug!("Port {port} unavailable for {listener} listener: {err}");
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_an_occupied_port() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let busy = taken.local_addr().unwrap().port();

        let port = find_available_port("127.0.0.1", busy, 20).await.unwrap();
        assert!(port > busy);
        assert!(port < busy + 20);
    }

    #[tokio::test]
    async fn exhaustion_reports_the_probed_range() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let busy = taken.local_addr().unwrap().port();

        let err = find_available_port("127.0.0.1", busy, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::PortRangeExhausted { start, end } if start == busy && end == busy
        ));
    }

    #[tokio::test]
    async fn zero_attempts_is_exhausted_immediately() {
        let err = find_available_port("127.0.0.1", 5000, 0).await.unwrap_err();
        assert!(matches!(err, ServerError::PortRangeExhausted { .. }));
    }
}
