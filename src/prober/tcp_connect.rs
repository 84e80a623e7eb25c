use super::{FailureReason, ProbeOutcome};
use crate::config::ProbeConfig;
use crate::resolver::{self, NameService};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::{timeout, Instant};
use tracing::debug;

/// One timed connect attempt. The clock covers name resolution as well as
/// the handshake, so the figure is an end-to-end reachability latency.
pub async fn probe_tcp<N: NameService>(names: &N, config: &ProbeConfig) -> ProbeOutcome {
    let start = Instant::now();
    let endpoint =
        resolver::resolve(names, &config.host, config.port, config.family, config.timeout()).await;
    let endpoint = match endpoint {
        Ok(endpoint) => endpoint,
        Err(e) => {
            debug!(host = %config.host, error = %e, "resolution failed");
            return ProbeOutcome::Failure { reason: FailureReason::from(&e) };
        }
    };

    let conn = connect(endpoint, config).await;
    let elapsed = start.elapsed();
    match conn {
        Ok(stream) => {
            drop(stream);
            ProbeOutcome::Success {
                address: endpoint.ip(),
                duration_ms: elapsed.as_secs_f64() * 1000.0,
            }
        }
        Err(e) => {
            debug!(%endpoint, error = %e, "connect failed");
            ProbeOutcome::Failure { reason: FailureReason::from(&e) }
        }
    }
}

async fn connect(endpoint: SocketAddr, config: &ProbeConfig) -> io::Result<TcpStream> {
    let socket = open_socket(endpoint)?;
    let conn_fut = socket.connect(endpoint);
    match config.timeout() {
        Some(limit) => timeout(limit, conn_fut)
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
        None => conn_fut.await,
    }
}

/// Fresh socket in the endpoint's family; never reused across attempts.
fn open_socket(endpoint: SocketAddr) -> io::Result<TcpSocket> {
    let socket = Socket::new(Domain::for_address(endpoint), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    Ok(TcpSocket::from_std_stream(socket.into()))
}
