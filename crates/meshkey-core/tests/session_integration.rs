//! End-to-end tests of the session core.
//!
//! Several `MeshSession`s are wired together through a `SimulatedMesh` and
//! driven tick by tick, exercising the lifecycle, the binding handshake and
//! the stop-and-wait delivery together through the public API.

use meshkey_core::session::sim::{SimulatedLink, SimulatedMesh};
use meshkey_core::{
    LifecycleState, MeshEvent, MeshSession, NodeAddress, ServiceId, SessionConfig, SessionError,
};

const KEYBOARD: NodeAddress = NodeAddress(0x0015_8D00_0000_0001);
const DISPLAY: NodeAddress = NodeAddress(0x0015_8D00_0000_0002);

/// Upper bound on ticks any setup may take in these tests.
const MAX_TICKS: usize = 200;

struct Node {
    address: NodeAddress,
    session: MeshSession<SimulatedLink>,
    delivered: Vec<u8>,
}

struct Network {
    mesh: SimulatedMesh,
    nodes: Vec<Node>,
}

impl Network {
    fn new(mesh: SimulatedMesh, addresses: &[NodeAddress]) -> Self {
        let nodes = addresses
            .iter()
            .map(|&address| Node {
                address,
                session: MeshSession::new(mesh.attach(address), SessionConfig::default()),
                delivered: Vec::new(),
            })
            .collect();
        Self { mesh, nodes }
    }

    fn node(&self, address: NodeAddress) -> &Node {
        self.nodes
            .iter()
            .find(|n| n.address == address)
            .expect("node attached")
    }

    fn session(&mut self, address: NodeAddress) -> &mut MeshSession<SimulatedLink> {
        &mut self
            .nodes
            .iter_mut()
            .find(|n| n.address == address)
            .expect("node attached")
            .session
    }

    /// Delivers queued events until the mesh is quiet.
    fn pump(&mut self) {
        for _ in 0..100 {
            let events = self.mesh.drain();
            if events.is_empty() {
                return;
            }
            for (to, event) in events {
                let node = self
                    .nodes
                    .iter_mut()
                    .find(|n| n.address == to)
                    .expect("event for attached node");
                if let Some(byte) = node.session.handle_event(event) {
                    node.delivered.push(byte);
                }
            }
        }
        panic!("mesh never went quiet");
    }

    fn tick(&mut self) {
        for node in &mut self.nodes {
            node.session.handle_event(MeshEvent::Tick);
        }
        self.pump();
    }

    fn start(&mut self) {
        self.mesh.bring_up();
        self.pump();
    }

    /// Ticks until every node reports services up.
    fn settle(&mut self) {
        for _ in 0..MAX_TICKS {
            self.tick();
            if self.nodes.iter().all(|n| n.session.services_up()) {
                return;
            }
        }
        panic!("services never came up");
    }

    /// Sends one byte from `from` and ticks until it is acknowledged.
    fn type_byte(&mut self, from: NodeAddress, byte: u8) {
        for _ in 0..MAX_TICKS {
            match self.session(from).transmit_key(byte) {
                Ok(()) => break,
                Err(SessionError::AwaitingAck { .. }) => self.tick(),
                Err(e) => panic!("unexpected transmit error: {e}"),
            }
        }
        self.pump();
        for _ in 0..MAX_TICKS {
            if !self.session(from).transmitter().awaiting_ack() {
                return;
            }
            self.tick();
        }
        panic!("byte 0x{byte:02X} never acknowledged");
    }
}

fn id(raw: u8) -> ServiceId {
    ServiceId::new(raw).expect("valid id")
}

/// Keyboard and display both register and request service 1, so key codes
/// flow one way and acks the other.
fn keyboard_pair(mesh: SimulatedMesh) -> Network {
    let mut net = Network::new(mesh, &[KEYBOARD, DISPLAY]);
    for address in [KEYBOARD, DISPLAY] {
        let session = net.session(address);
        session.register_service(1, 1).expect("valid id");
        session.request_service(1, 1).expect("valid id");
    }
    net.start();
    net.settle();
    net
}

#[test]
fn test_registrant_and_requester_bind_service() {
    // Arrange – R only registers, Q only requests
    let mut net = Network::new(SimulatedMesh::new(), &[DISPLAY, KEYBOARD]);
    net.session(DISPLAY).register_service(1, 1).expect("valid id");
    net.session(KEYBOARD).request_service(1, 1).expect("valid id");

    // Act
    net.start();
    net.settle();

    // Assert
    let r = net.node(DISPLAY).session.services();
    let q = net.node(KEYBOARD).session.services();
    assert!(r.register.is_bound(id(1)));
    assert_eq!(r.register.bind_count(id(1)), 1);
    assert!(q.request.is_bound(id(1)));
    assert_eq!(q.request.bind_count(id(1)), 1);
    assert_eq!(
        net.node(KEYBOARD).session.lifecycle().state(),
        LifecycleState::Idle
    );
}

#[test]
fn test_key_is_delivered_and_sequence_advances() {
    // Arrange
    let mut net = keyboard_pair(SimulatedMesh::new());

    // Act
    net.session(KEYBOARD).transmit_key(0x41).expect("send");
    net.pump();

    // Assert
    assert_eq!(net.node(DISPLAY).delivered, vec![0x41]);
    assert_eq!(net.node(KEYBOARD).session.transmitter().sequence(), 0x81);
    assert!(!net.node(KEYBOARD).session.transmitter().awaiting_ack());
}

#[test]
fn test_lost_ack_is_recovered_by_retransmission() {
    // Arrange
    let mut net = keyboard_pair(SimulatedMesh::new());
    net.session(KEYBOARD).transmit_key(0x1C).expect("send");

    // Act – deliver the Data frame, then lose the Ack it produced
    for (to, event) in net.mesh.drain() {
        assert_eq!(to, DISPLAY);
        let node = net.nodes.iter_mut().find(|n| n.address == to).expect("display");
        if let Some(byte) = node.session.handle_event(event) {
            node.delivered.push(byte);
        }
    }
    let lost = net.mesh.drain();
    assert_eq!(lost.len(), 1, "display must have acked once");
    net.tick();
    net.tick();

    // Assert
    assert_eq!(net.node(DISPLAY).delivered, vec![0x1C], "delivered exactly once");
    assert_eq!(net.node(KEYBOARD).session.transmitter().sequence(), 0x81);
    assert!(!net.node(KEYBOARD).session.transmitter().awaiting_ack());
}

#[test]
fn test_out_of_range_query_is_dropped() {
    // Arrange
    let mut net = keyboard_pair(SimulatedMesh::new());
    let before = net.node(DISPLAY).session.services().clone();

    // Act
    net.session(DISPLAY).handle_event(MeshEvent::Data {
        from: KEYBOARD,
        payload: b"<Bq33>\0".to_vec(),
    });

    // Assert
    assert_eq!(net.mesh.queued(), 0, "no reply may be sent");
    assert_eq!(net.node(DISPLAY).session.services(), &before);
}

#[test]
fn test_text_survives_lossy_link_in_order() {
    // Arrange
    let mut net = keyboard_pair(SimulatedMesh::with_drop_every(3));
    let text = b"the quick brown fox";

    // Act
    for &byte in text {
        net.type_byte(KEYBOARD, byte);
    }

    // Assert
    assert_eq!(net.node(DISPLAY).delivered, text.to_vec());
    assert!(net.mesh.dropped_frames() > 0, "link must actually drop frames");
}

#[test]
fn test_fan_in_count_never_exceeds_limit() {
    // Arrange – one registrant with a single slot, two requesters
    let second = NodeAddress(0x0015_8D00_0000_0003);
    let mut net = Network::new(SimulatedMesh::new(), &[DISPLAY, KEYBOARD, second]);
    net.session(DISPLAY).register_service(1, 1).expect("valid id");
    net.session(KEYBOARD).request_service(1, 1).expect("valid id");
    net.session(second).request_service(1, 1).expect("valid id");

    // Act
    net.start();
    for _ in 0..MAX_TICKS {
        net.tick();
    }

    // Assert
    let register = &net.node(DISPLAY).session.services().register;
    assert_eq!(register.bind_count(id(1)), 1);
    assert!(register.bind_count(id(1)) <= register.bind_limit(id(1)));
}

#[test]
fn test_request_retries_after_timeout_until_registrant_appears() {
    // Arrange – the requester starts before anyone registers
    let mut net = Network::new(SimulatedMesh::new(), &[KEYBOARD, DISPLAY]);
    net.session(KEYBOARD).request_service(1, 1).expect("valid id");
    net.start();
    for _ in 0..35 {
        net.tick();
    }
    assert!(!net.node(KEYBOARD).session.is_request_bound(1));

    // Act
    net.session(DISPLAY).register_service(1, 0).expect("valid id");
    net.settle();

    // Assert
    assert!(net.node(KEYBOARD).session.is_request_bound(1));
    assert!(net.node(DISPLAY).session.is_register_bound(1));
}

#[test]
fn test_transmit_before_binding_is_rejected() {
    let mut net = Network::new(SimulatedMesh::new(), &[KEYBOARD]);
    net.session(KEYBOARD).request_service(1, 1).expect("valid id");
    net.start();
    net.tick();

    assert_eq!(
        net.session(KEYBOARD).transmit_key(0x1C),
        Err(SessionError::ServicesNotUp)
    );
}
