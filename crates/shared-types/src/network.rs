//! # Network Identifiers
//!
//! Well-known network IDs understood by the node binary.

/// Main network.
pub const CAMINO_ID: u32 = 1000;
/// Columbus test network.
pub const COLUMBUS_ID: u32 = 1001;
/// Kopernikus development network.
pub const KOPERNIKUS_ID: u32 = 1002;
/// Unit-test network.
pub const UNIT_TEST_ID: u32 = 10;
/// Default local network.
pub const LOCAL_ID: u32 = 12345;

/// Human-readable name of a network ID, or `network-<id>` if unknown.
pub fn network_name(network_id: u32) -> String {
    match network_id {
        CAMINO_ID => "camino".to_string(),
        COLUMBUS_ID => "columbus".to_string(),
        KOPERNIKUS_ID => "kopernikus".to_string(),
        UNIT_TEST_ID => "testing".to_string(),
        LOCAL_ID => "local".to_string(),
        other => format!("network-{}", other),
    }
}

/// Parse a network ID from either its decimal form or a known name.
pub fn parse_network_id(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(id) = value.parse::<u32>() {
        return Some(id);
    }
    match value.to_ascii_lowercase().as_str() {
        "camino" => Some(CAMINO_ID),
        "columbus" => Some(COLUMBUS_ID),
        "kopernikus" => Some(KOPERNIKUS_ID),
        "testing" => Some(UNIT_TEST_ID),
        "local" => Some(LOCAL_ID),
        _ => None,
    }
}
