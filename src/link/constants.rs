/**
 * WebSocket endpoint of the tilt sensor. The sensor runs its own access point, so this address
 * is only reachable over its Wi-Fi network.
 */
pub const DEFAULT_ENDPOINT: &str = "ws://192.168.4.1:81/";

/**
 * How long (milliseconds) to wait before reconnecting after the connection failed or was closed.
 */
pub const RECONNECT_DELAY: u64 = 5000;

/**
 * How long (milliseconds) to wait for the close handshake when shutting down. A sensor that never
 * answers must not hold up shutdown.
 */
pub const CLOSE_DEADLINE: u64 = 1000;

/**
 * Capacity of each status subscriber channel. Events are dropped for a subscriber whose channel
 * is full.
 */
pub const SUBSCRIBER_BUFFER: usize = 64;

/**
 * Interface name prefixes that are treated as wireless when the OS offers no better hint.
 */
pub const WIRELESS_NAME_PREFIXES: [&str; 6] = ["wlan", "wlp", "wlo", "wl", "wi-fi", "wifi"];
