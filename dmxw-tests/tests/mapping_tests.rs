//! Integration Tests für die Zuordnungstabellen von Gateway und Node

mod common;

use std::collections::HashSet;

use common::{node, port_table};
use dmxw_core::{Address, GatewayMapping, GatewayRegistry, MapError, NodeRegistry};

struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (self.0 >> 16) as u8
    }
}

// ============================================================================
// Tests: Gateway
// ============================================================================

#[test]
fn test_map_then_lookup_returns_exact_record() {
    let mut registry = GatewayRegistry::new();
    registry.map_channel(3, 100, node(2), 1, true).unwrap();

    let record = registry.lookup(3).unwrap();
    assert_eq!(
        record,
        GatewayMapping {
            dmxw_chan: 3,
            dmx512_chan: 100,
            node: node(2),
            port: 1,
            logarithmic: true,
            value: 0,
        }
    );
}

#[test]
fn test_no_two_channels_share_a_port() {
    let mut registry = GatewayRegistry::new();
    let mut rng = Lcg(99);

    for _ in 0..5_000 {
        let chan = 1 + rng.next() % 48;
        if rng.next() % 3 == 0 {
            registry.unmap_channel(chan);
        } else {
            let target = node(2 + rng.next() % 3);
            let port = rng.next() % 4;
            let dmx512 = rng.next() as u16;
            let _ = registry.map_channel(chan, dmx512, target, port, rng.next() % 2 == 0);
        }

        let mut seen = HashSet::new();
        for mapping in registry.iter() {
            assert!(
                seen.insert((mapping.node, mapping.port)),
                "port {} of {} used twice",
                mapping.port,
                mapping.node
            );
        }
    }
}

#[test]
fn test_remap_after_clear_all() {
    let mut registry = GatewayRegistry::new();
    registry.map_channel(1, 1, node(2), 0, false).unwrap();
    assert_eq!(registry.map_channel(2, 2, node(2), 0, false), Err(MapError::Port));
    registry.clear_all(Address::Node(node(2)));
    registry.map_channel(2, 2, node(2), 0, false).unwrap();
    assert_eq!(registry.mappings_for(node(2)).count(), 1);
}

// ============================================================================
// Tests: Node
// ============================================================================

#[test]
fn test_node_ports_stay_exclusive() {
    let mut registry = NodeRegistry::new(port_table());
    let mut rng = Lcg(5);

    for _ in 0..5_000 {
        let chan = 1 + rng.next() % 48;
        if rng.next() % 3 == 0 {
            registry.clear_channel(chan).unwrap();
        } else {
            let port = rng.next() % 5;
            let is_output = registry.ports().is_output(port);
            let _ = registry.assign_port(chan, port, is_output, false);
        }

        let ports: Vec<u8> = (1..=48)
            .filter_map(|c| registry.lookup(c))
            .map(|m| m.port)
            .collect();
        let unique: HashSet<u8> = ports.iter().copied().collect();
        assert_eq!(unique.len(), ports.len(), "port mapped twice: {:?}", ports);
        // Port 2 und 3 teilen sich Pin 6
        assert!(!(unique.contains(&2) && unique.contains(&3)));
    }
}

#[test]
fn test_describe_reports_pin_details() {
    let mut registry = NodeRegistry::new(port_table());
    registry.assign_port(10, 3, true, false).unwrap();
    registry.set_channel_value(10, 180).unwrap();

    let report = registry.describe(10).unwrap();
    assert_eq!(report.chan, 10);
    assert_eq!(report.port, Some(3));
    assert_eq!(report.out_pin, Some(6));
    assert_eq!(report.conflict_port, Some(2));
    assert!(!report.is_analog);
    assert_eq!(report.value, 180);
}
