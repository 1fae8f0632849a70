//! An in-memory mesh for integration tests and the demonstration node.
//!
//! [`SimulatedMesh`] plays the part of the radio stack for any number of
//! attached nodes.  Each node talks to it through its own
//! [`SimulatedLink`], which implements [`MeshTransport`].  Nothing is
//! delivered immediately: every frame and response is queued, and the
//! owner moves them by calling [`SimulatedMesh::drain`] and handing each
//! event to the addressed node's session.  That keeps delivery order fully
//! deterministic.
//!
//! Behaviour:
//!
//! - `register_services` is always deferred; a `RegisterResponse` is queued
//!   for the caller.
//! - `request_services` is deferred; one `RequestResponse` is queued per
//!   other node that has registered an overlapping service.
//! - `bind_service` succeeds if the peer registered the service.
//! - `send_to_bound_service` fails with [`TransportError::InvalidParameter`]
//!   when nothing is bound.
//! - With `drop_every = n > 0`, every n-th bound-service frame is silently
//!   lost.  Binding frames are never dropped.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::trace;

use crate::domain::service::{ServiceId, ServiceMask};
use crate::session::transport::{
    MeshEvent, MeshTransport, NodeAddress, TransportError, TransportStatus,
};

#[derive(Debug, Default)]
struct MeshState {
    nodes: Vec<NodeAddress>,
    registered: HashMap<NodeAddress, ServiceMask>,
    bindings: HashMap<(NodeAddress, ServiceId), Vec<NodeAddress>>,
    queue: VecDeque<(NodeAddress, MeshEvent)>,
    drop_every: u32,
    service_frames: u64,
    dropped: u64,
}

impl MeshState {
    fn is_attached(&self, address: NodeAddress) -> bool {
        self.nodes.contains(&address)
    }

    /// Counts one bound-service frame and reports whether to lose it.
    fn should_drop(&mut self) -> bool {
        self.service_frames += 1;
        let drop = self.drop_every > 0 && self.service_frames % u64::from(self.drop_every) == 0;
        if drop {
            self.dropped += 1;
        }
        drop
    }
}

/// Shared handle to the simulated network.  Cloning it yields another
/// handle to the same network.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMesh {
    state: Rc<RefCell<MeshState>>,
}

impl SimulatedMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mesh that loses every `n`-th bound-service frame (0 = never).
    pub fn with_drop_every(n: u32) -> Self {
        let mesh = Self::new();
        mesh.set_drop_every(n);
        mesh
    }

    pub fn set_drop_every(&self, n: u32) {
        self.state.borrow_mut().drop_every = n;
    }

    /// Adds a node and returns its transport.
    pub fn attach(&self, address: NodeAddress) -> SimulatedLink {
        let mut state = self.state.borrow_mut();
        if !state.is_attached(address) {
            state.nodes.push(address);
        }
        SimulatedLink {
            address,
            state: Rc::clone(&self.state),
        }
    }

    /// Queues [`MeshEvent::NetworkUp`] for every attached node.
    pub fn bring_up(&self) {
        let mut state = self.state.borrow_mut();
        let nodes = state.nodes.clone();
        state
            .queue
            .extend(nodes.into_iter().map(|node| (node, MeshEvent::NetworkUp)));
    }

    /// Removes and returns every queued event with its destination.
    pub fn drain(&self) -> Vec<(NodeAddress, MeshEvent)> {
        self.state.borrow_mut().queue.drain(..).collect()
    }

    /// Number of events waiting to be drained.
    pub fn queued(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Bound-service frames lost so far.
    pub fn dropped_frames(&self) -> u64 {
        self.state.borrow().dropped
    }
}

/// One node's view of a [`SimulatedMesh`].
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    address: NodeAddress,
    state: Rc<RefCell<MeshState>>,
}

impl SimulatedLink {
    pub fn address(&self) -> NodeAddress {
        self.address
    }
}

impl MeshTransport for SimulatedLink {
    fn send_to(
        &mut self,
        address: NodeAddress,
        bytes: &[u8],
    ) -> Result<TransportStatus, TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.is_attached(address) {
            return Err(TransportError::InvalidParameter);
        }
        trace!(from = %self.address, to = %address, len = bytes.len(), "sim: data queued");
        state.queue.push_back((
            address,
            MeshEvent::Data {
                from: self.address,
                payload: bytes.to_vec(),
            },
        ));
        Ok(TransportStatus::Success)
    }

    fn send_to_bound_service(
        &mut self,
        service: ServiceId,
        bytes: &[u8],
    ) -> Result<TransportStatus, TransportError> {
        let mut state = self.state.borrow_mut();
        let peers = match state.bindings.get(&(self.address, service)) {
            Some(peers) if !peers.is_empty() => peers.clone(),
            _ => return Err(TransportError::InvalidParameter),
        };
        for peer in peers {
            if state.should_drop() {
                trace!(from = %self.address, to = %peer, %service, "sim: frame dropped");
                continue;
            }
            state.queue.push_back((
                peer,
                MeshEvent::DataToService {
                    from: self.address,
                    service: service.get(),
                    payload: bytes.to_vec(),
                },
            ));
        }
        Ok(TransportStatus::Success)
    }

    fn register_services(
        &mut self,
        services: ServiceMask,
    ) -> Result<TransportStatus, TransportError> {
        let mut state = self.state.borrow_mut();
        *state.registered.entry(self.address).or_default() |= services;
        state
            .queue
            .push_back((self.address, MeshEvent::RegisterResponse { services }));
        Ok(TransportStatus::Deferred)
    }

    fn request_services(
        &mut self,
        services: ServiceMask,
    ) -> Result<TransportStatus, TransportError> {
        let mut state = self.state.borrow_mut();
        let responses: Vec<(NodeAddress, MeshEvent)> = state
            .nodes
            .iter()
            .filter(|&&peer| peer != self.address)
            .filter_map(|&peer| {
                let registered = state.registered.get(&peer).copied().unwrap_or_default();
                (!registered.intersection(services).is_empty()).then_some((
                    self.address,
                    MeshEvent::RequestResponse {
                        from: peer,
                        services: registered,
                    },
                ))
            })
            .collect();
        state.queue.extend(responses);
        Ok(TransportStatus::Deferred)
    }

    fn bind_service(
        &mut self,
        service: ServiceId,
        address: NodeAddress,
    ) -> Result<TransportStatus, TransportError> {
        let mut state = self.state.borrow_mut();
        let registered = state.registered.get(&address).copied().unwrap_or_default();
        if !registered.contains(service) {
            return Err(TransportError::InvalidParameter);
        }
        let peers = state.bindings.entry((self.address, service)).or_default();
        if !peers.contains(&address) {
            peers.push(address);
        }
        Ok(TransportStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NodeAddress = NodeAddress(1);
    const B: NodeAddress = NodeAddress(2);

    fn id(raw: u8) -> ServiceId {
        ServiceId::new(raw).expect("valid id")
    }

    #[test]
    fn test_send_to_queues_data_for_destination() {
        // Arrange
        let mesh = SimulatedMesh::new();
        let mut a = mesh.attach(A);
        mesh.attach(B);

        // Act
        let status = a.send_to(B, b"hi");

        // Assert
        assert_eq!(status, Ok(TransportStatus::Success));
        assert_eq!(
            mesh.drain(),
            vec![(
                B,
                MeshEvent::Data {
                    from: A,
                    payload: b"hi".to_vec()
                }
            )]
        );
    }

    #[test]
    fn test_send_to_unknown_address_fails() {
        let mesh = SimulatedMesh::new();
        let mut a = mesh.attach(A);
        assert_eq!(a.send_to(B, b"x"), Err(TransportError::InvalidParameter));
    }

    #[test]
    fn test_register_is_deferred_with_response() {
        let mesh = SimulatedMesh::new();
        let mut a = mesh.attach(A);

        let status = a.register_services(id(1).mask());

        assert_eq!(status, Ok(TransportStatus::Deferred));
        assert_eq!(
            mesh.drain(),
            vec![(
                A,
                MeshEvent::RegisterResponse {
                    services: id(1).mask()
                }
            )]
        );
    }

    #[test]
    fn test_request_answers_from_registered_peers_only() {
        // Arrange
        let mesh = SimulatedMesh::new();
        let mut a = mesh.attach(A);
        let mut b = mesh.attach(B);
        mesh.attach(NodeAddress(3));
        b.register_services(ServiceMask::from_bits(0b11))
            .expect("register");
        mesh.drain();

        // Act
        a.request_services(id(2).mask()).expect("request");

        // Assert
        assert_eq!(
            mesh.drain(),
            vec![(
                A,
                MeshEvent::RequestResponse {
                    from: B,
                    services: ServiceMask::from_bits(0b11)
                }
            )]
        );
    }

    #[test]
    fn test_bound_service_routes_to_peer() {
        // Arrange
        let mesh = SimulatedMesh::new();
        let mut a = mesh.attach(A);
        let mut b = mesh.attach(B);
        b.register_services(id(1).mask()).expect("register");
        a.bind_service(id(1), B).expect("bind");
        mesh.drain();

        // Act
        a.send_to_bound_service(id(1), &[b'K', 0x80, 0x1C])
            .expect("send");

        // Assert
        assert_eq!(
            mesh.drain(),
            vec![(
                B,
                MeshEvent::DataToService {
                    from: A,
                    service: 1,
                    payload: vec![b'K', 0x80, 0x1C]
                }
            )]
        );
    }

    #[test]
    fn test_bind_to_unregistered_service_fails() {
        let mesh = SimulatedMesh::new();
        let mut a = mesh.attach(A);
        mesh.attach(B);
        assert_eq!(
            a.bind_service(id(1), B),
            Err(TransportError::InvalidParameter)
        );
        assert_eq!(
            a.send_to_bound_service(id(1), b"x"),
            Err(TransportError::InvalidParameter)
        );
    }

    #[test]
    fn test_drop_every_loses_every_nth_service_frame() {
        // Arrange
        let mesh = SimulatedMesh::with_drop_every(3);
        let mut a = mesh.attach(A);
        let mut b = mesh.attach(B);
        b.register_services(id(1).mask()).expect("register");
        a.bind_service(id(1), B).expect("bind");
        mesh.drain();

        // Act
        for _ in 0..6 {
            a.send_to_bound_service(id(1), b"K\x80\x00").expect("send");
        }

        // Assert
        assert_eq!(mesh.drain().len(), 4);
        assert_eq!(mesh.dropped_frames(), 2);
    }

    #[test]
    fn test_bring_up_notifies_every_node() {
        let mesh = SimulatedMesh::new();
        mesh.attach(A);
        mesh.attach(B);

        mesh.bring_up();

        assert_eq!(
            mesh.drain(),
            vec![(A, MeshEvent::NetworkUp), (B, MeshEvent::NetworkUp)]
        );
    }
}
