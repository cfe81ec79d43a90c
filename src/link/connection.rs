use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::alert::debounce::{AlertDebouncer, AlertDecision};
use crate::alert::sink::AlertSink;
use crate::error::LinkError;
use crate::link::constants::CLOSE_DEADLINE;
use crate::link::interface::{list_interfaces, select_local_addr};
use crate::link::publisher::StatusPublisher;
use crate::link::types::{AngleReading, ConnectionState, InterfacePolicy, LinkConfig};
use crate::threshold::ThresholdStore;

type SensorStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum LinkState {
    Connecting,
    Connected {
        stream: SensorStream,
    },
    AwaitingReconnect,
    // connecting is impossible until something outside the link changes, wait for shutdown
    Idle,
    Stopped,
}

impl LinkState {
    fn status(&self) -> Option<ConnectionState> {
        match self {
            LinkState::Connecting => Some(ConnectionState::Connecting),
            LinkState::Connected { .. } => Some(ConnectionState::Connected),
            LinkState::AwaitingReconnect => Some(ConnectionState::AwaitingReconnect),
            LinkState::Idle | LinkState::Stopped => None,
        }
    }
}

struct LinkContext {
    config: LinkConfig,
    cancel: CancellationToken,
    thresholds: ThresholdStore,
    publisher: StatusPublisher,
    alert: Arc<dyn AlertSink>,
    debouncer: AlertDebouncer,
}

fn parse_endpoint(endpoint: &str) -> Result<(String, u16), LinkError> {
    let invalid = |reason: String| LinkError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let uri = endpoint.parse::<Uri>().map_err(|err| invalid(err.to_string()))?;
    if uri.scheme_str() != Some("ws") {
        return Err(invalid("only ws:// endpoints are supported".to_string()));
    }
    let host = uri.host().ok_or_else(|| invalid("missing host".to_string()))?;
    let port = uri.port_u16().unwrap_or(80);

    // IPv6 literals keep their brackets in the authority
    Ok((host.trim_start_matches('[').trim_end_matches(']').to_string(), port))
}

/// Parses one telemetry frame. The sensor sends a single decimal number per frame.
pub fn parse_reading(text: &str) -> Result<AngleReading, String> {
    let degrees = text.trim().parse::<f64>().map_err(|err| err.to_string())?;
    AngleReading::new(degrees).ok_or_else(|| "angle is not finite".to_string())
}

async fn open_connection(config: &LinkConfig) -> Result<SensorStream, LinkError> {
    let (host, port) = parse_endpoint(&config.endpoint)?;

    let remote = lookup_host((host.as_str(), port)).await?
        .next()
        .ok_or_else(|| LinkError::Unresolvable(host.clone()))?;

    // the sensor is its own access point without an uplink, so the OS may prefer another
    // interface for the route unless the socket is bound explicitly
    let interfaces = match config.interface {
        InterfacePolicy::Any => Vec::new(),
        _ => list_interfaces(),
    };
    let local = select_local_addr(&interfaces, &config.interface, remote.is_ipv4())?;

    let socket = if remote.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
    if let Some((name, addr)) = local {
        info!("Binding to interface {} ({})", name, addr);
        socket.bind(SocketAddr::new(addr, 0))?;
    }

    info!("Connecting to {} ({})...", config.endpoint, remote);
    let tcp_stream = socket.connect(remote).await?;
    tcp_stream.set_nodelay(true)?;

    let (stream, _response) = client_async(config.endpoint.as_str(), MaybeTlsStream::Plain(tcp_stream)).await?;
    Ok(stream)
}

impl LinkContext {
    fn handle_frame(&mut self, text: &str) {
        let reading = match parse_reading(text) {
            Ok(reading) => reading,
            Err(err) => {
                warn!("Discarding malformed reading {:?}: {}", text, err);
                return;
            },
        };
        debug!("Angle: {}", reading);

        let threshold = self.thresholds.get();
        match self.debouncer.evaluate(reading, threshold) {
            AlertDecision::Fire => self.alert.trigger(reading, threshold),
            AlertDecision::Suppressed => {},
            AlertDecision::Safe => self.alert.stop(),
        }

        self.publisher.publish_angle(reading);
    }
}

async fn close_stream(mut stream: SensorStream) {
    match timeout(Duration::from_millis(CLOSE_DEADLINE), stream.close(None)).await {
        Ok(Ok(())) => {},
        Ok(Err(err)) => debug!("Failed to close connection cleanly: {}", err),
        Err(_) => warn!("Sensor did not finish the close handshake in time"),
    }
}

async fn advance_state(state: LinkState, ctx: &mut LinkContext) -> LinkState {
    match state {
        LinkState::Connecting => {
            tokio::select! {
                _ = ctx.cancel.cancelled() => LinkState::Stopped,
                result = open_connection(&ctx.config) => match result {
                    Ok(stream) => {
                        info!("Connection established");
                        LinkState::Connected { stream }
                    },
                    Err(LinkError::NoInterface) => {
                        // there is nothing to retry against until the network changes
                        error!("No suitable network interface found for {:?}; not retrying", ctx.config.interface);
                        LinkState::Idle
                    },
                    Err(err) => {
                        warn!("Connecting failed: {}", err);
                        LinkState::AwaitingReconnect
                    },
                }
            }
        },
        LinkState::Connected { mut stream } => {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    info!("Closing connection");
                    close_stream(stream).await;
                    LinkState::Stopped
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        ctx.handle_frame(&text);
                        LinkState::Connected { stream }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        warn!("Connection closed by sensor: {:?}", frame);
                        LinkState::AwaitingReconnect
                    },
                    Some(Ok(_)) => LinkState::Connected { stream },
                    Some(Err(err)) => {
                        warn!("Connection lost: {}", err);
                        LinkState::AwaitingReconnect
                    },
                    None => {
                        warn!("Connection lost: stream ended");
                        LinkState::AwaitingReconnect
                    },
                }
            }
        },
        LinkState::AwaitingReconnect => {
            tokio::select! {
                _ = ctx.cancel.cancelled() => LinkState::Stopped,
                _ = sleep(ctx.config.reconnect_delay) => LinkState::Connecting,
            }
        },
        LinkState::Idle => {
            ctx.cancel.cancelled().await;
            LinkState::Stopped
        },
        LinkState::Stopped => LinkState::Stopped,
    }
}

async fn run_link(mut ctx: LinkContext) {
    let mut state = LinkState::Connecting;
    let mut previous_status: Option<ConnectionState> = None;

    loop {
        if let LinkState::Stopped = state {
            break;
        }

        if let Some(status) = state.status() {
            if previous_status != Some(status) {
                info!("Status: {}", status);
                ctx.publisher.publish_state(status);
                previous_status = Some(status);
            }
        }

        state = advance_state(state, &mut ctx).await;
    }

    info!("Telemetry link stopped");
}

/// Spawns the task that owns the sensor connection. The task keeps reconnecting until `cancel`
/// is cancelled.
pub fn spawn_link(
    config: LinkConfig,
    cancel: CancellationToken,
    thresholds: ThresholdStore,
    publisher: StatusPublisher,
    alert: Arc<dyn AlertSink>,
) -> JoinHandle<()> {
    let ctx = LinkContext {
        config,
        cancel,
        thresholds,
        publisher,
        alert,
        debouncer: AlertDebouncer::default(),
    };

    spawn(run_link(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn endpoint_host_and_port() {
        assert_eq!(parse_endpoint("ws://192.168.4.1:81/").unwrap(), ("192.168.4.1".to_string(), 81));
        assert_eq!(parse_endpoint("ws://sensor.local/").unwrap(), ("sensor.local".to_string(), 80));
        assert_eq!(parse_endpoint("ws://[::1]:9000/").unwrap(), ("::1".to_string(), 9000));
    }

    #[test]
    fn endpoint_rejects_other_schemes() {
        assert_matches!(parse_endpoint("wss://192.168.4.1:81/"), Err(LinkError::InvalidEndpoint { .. }));
        assert_matches!(parse_endpoint("http://192.168.4.1/"), Err(LinkError::InvalidEndpoint { .. }));
        assert_matches!(parse_endpoint("not an endpoint"), Err(LinkError::InvalidEndpoint { .. }));
    }

    #[test]
    fn readings() {
        assert_eq!(parse_reading("12.5").unwrap().degrees(), 12.5);
        assert_eq!(parse_reading("-3").unwrap().degrees(), -3.0);
        assert_eq!(parse_reading(" 7.25\r\n").unwrap().degrees(), 7.25);
        assert!(parse_reading("not-a-number").is_err());
        assert!(parse_reading("").is_err());
        assert!(parse_reading("NaN").is_err());
        assert!(parse_reading("inf").is_err());
    }
}
