//! Communication protocol registry.
//!
//! A static, ordered table of the protocols devices can use to talk to each
//! other. Ranges are expressed in plan units (pixels) so they can be compared
//! directly with node distances; the table is built from metre ranges and the
//! configured metres-to-pixels scale.

use serde::Serialize;

/// Physical medium of a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    Wired,
    Wireless,
}

impl std::fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolMode::Wired => write!(f, "wired"),
            ProtocolMode::Wireless => write!(f, "wireless"),
        }
    }
}

/// A single protocol entry.
#[derive(Debug, Clone, Serialize)]
pub struct Protocol {
    /// Short name used by capabilities and links, e.g. "TSCH".
    pub nm: &'static str,
    /// Human readable name.
    pub name: &'static str,
    pub color: &'static str,
    /// Maximum link length in plan units.
    pub range: f64,
    pub mode: ProtocolMode,
    pub description: &'static str,
}

/// Range in metres for every built-in protocol, in display order.
const BUILTIN_PROTOCOLS: [(&str, &str, &str, f64, ProtocolMode, &str); 7] = [
    (
        "TSCH",
        "Time Slotted Channel Hopping (TSCH)",
        "#388e3c",
        10.0,
        ProtocolMode::Wireless,
        "TSCH is a network protocol for low-power wireless networks. It hops over multiple 2.4 GHz frequencies and offers longer range than BLE version 4.",
    ),
    (
        "BLE",
        "Bluetooth Low Energy (BLE)",
        "#bf360c",
        7.0,
        ProtocolMode::Wireless,
        "Bluetooth Low Energy is widely used in consumer electronics and applies adaptive frequency hopping to survive 2.4 GHz interference.",
    ),
    (
        "USB",
        "USB cable",
        "#666",
        // 5 m in reality; kept short so connected devices stay co-located
        3.0,
        ProtocolMode::Wired,
        "USB cables are widely used for short term wired connections. In this game, the cables are kept short.",
    ),
    ("433 MHz", "433 MHz wireless", "#dddddd", 20.0, ProtocolMode::Wireless, ""),
    ("PLC", "Power Line Comunications (PLC)", "#dddddd", 10.0, ProtocolMode::Wired, ""),
    (
        "WiFi",
        "WiFi (5 GHz)",
        "#ffa043",
        15.0,
        ProtocolMode::Wireless,
        "IEEE 802.11ac in the 5 GHz band; it does not interfere with TSCH or BLE.",
    ),
    (
        "3G",
        "3G (cellular connection)",
        "#ffa043",
        100.0,
        ProtocolMode::Wireless,
        "Cellular connection used only for system monitoring data.",
    ),
];

/// Ordered lookup table of protocols.
#[derive(Debug, Clone)]
pub struct ProtocolRegistry {
    protocols: Vec<Protocol>,
}

impl ProtocolRegistry {
    /// Build the built-in table with ranges scaled to plan units.
    pub fn builtin(distance_meters_to_pixels: f64) -> Self {
        let protocols = BUILTIN_PROTOCOLS
            .iter()
            .map(|&(nm, name, color, range_m, mode, description)| Protocol {
                nm,
                name,
                color,
                range: range_m * distance_meters_to_pixels,
                mode,
                description,
            })
            .collect();
        Self { protocols }
    }

    pub fn get(&self, nm: &str) -> Option<&Protocol> {
        self.protocols.iter().find(|p| p.nm == nm)
    }

    pub fn contains(&self, nm: &str) -> bool {
        self.get(nm).is_some()
    }

    /// All protocols in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_scaled_to_plan_units() {
        let registry = ProtocolRegistry::builtin(50.0);
        assert_eq!(registry.get("TSCH").unwrap().range, 500.0);
        assert_eq!(registry.get("BLE").unwrap().range, 350.0);
        assert_eq!(registry.get("USB").unwrap().range, 150.0);
        assert_eq!(registry.get("3G").unwrap().range, 5000.0);
        assert_eq!(registry.get("USB").unwrap().mode, ProtocolMode::Wired);
    }

    #[test]
    fn unknown_protocol_is_absent() {
        let registry = ProtocolRegistry::builtin(50.0);
        assert!(registry.get("Zigbee").is_none());
        assert!(registry.contains("433 MHz"));
        let names: Vec<&str> = registry.iter().map(|p| p.nm).collect();
        assert_eq!(names, vec!["TSCH", "BLE", "USB", "433 MHz", "PLC", "WiFi", "3G"]);
    }
}
