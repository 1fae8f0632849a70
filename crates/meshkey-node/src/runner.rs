//! [`NodePair`]: a transmitter and a receiver node on one simulated mesh.
//!
//! # One step (for beginners)
//!
//! Real nodes each have their own timer interrupt and radio callbacks.
//! Here both nodes live in one process, so [`NodePair::step`] plays the
//! part of the hardware for one tick period:
//!
//! 1. Deliver a `Tick` to both sessions (timeouts, lifecycle, retries).
//! 2. Move every queued mesh event to its destination node, repeatedly,
//!    until the mesh is quiet.  Handshakes and Ack round trips complete
//!    within the same step.
//! 3. Offer the next scan code from the keyboard to the transmitter.
//! 4. Move mesh events again so the Data frame and its Ack go through.
//!
//! Codes accepted by the receiver's ARQ are rendered as they arrive.

use std::io::Write;

use meshkey_core::session::sim::{SimulatedLink, SimulatedMesh};
use meshkey_core::{MeshEvent, MeshSession, NodeAddress, SessionError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::render_keys::{RenderError, TextRenderer};
use crate::application::type_keys::{FeedOutcome, KeyboardFeeder};
use crate::infrastructure::indicator::LogIndicator;
use crate::infrastructure::storage::config::{ConfigError, NodeConfig};

/// Error type for running the node pair.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("session: {0}")]
    Session(#[from] SessionError),

    #[error("display: {0}")]
    Render(#[from] RenderError),
}

type NodeSession = MeshSession<SimulatedLink, LogIndicator>;

/// Two nodes, their collaborators and the mesh between them.
pub struct NodePair<W> {
    mesh: SimulatedMesh,
    tx_address: NodeAddress,
    rx_address: NodeAddress,
    transmitter: NodeSession,
    receiver: NodeSession,
    keyboard: KeyboardFeeder,
    display: TextRenderer<W>,
    ticks: u64,
}

impl<W: Write> NodePair<W> {
    /// Builds both nodes and queues the keyboard service on each of them.
    ///
    /// Both nodes register and request the same service, so each ends up
    /// bound to the other in both directions.
    ///
    /// # Errors
    ///
    /// [`NodeError::Config`] if the configuration cannot be turned into a
    /// session config or the node addresses collide.
    pub fn new(config: &NodeConfig, out: W) -> Result<Self, NodeError> {
        let session_config = config.to_session_config()?;
        let (tx_address, rx_address) = config.node_addresses()?;
        let mesh = SimulatedMesh::with_drop_every(config.simulation.drop_every);

        let mut transmitter = MeshSession::with_indicator(
            mesh.attach(tx_address),
            LogIndicator::new("tx"),
            session_config,
        );
        let mut receiver = MeshSession::with_indicator(
            mesh.attach(rx_address),
            LogIndicator::new("rx"),
            session_config,
        );

        let service = config.service.keyboard_service;
        for session in [&mut transmitter, &mut receiver] {
            session.register_service(service, config.service.register_limit)?;
            session.request_service(service, config.service.request_limit)?;
        }

        info!(
            tx = %tx_address,
            rx = %rx_address,
            service,
            drop_every = config.simulation.drop_every,
            "node pair created"
        );

        Ok(Self {
            mesh,
            tx_address,
            rx_address,
            transmitter,
            receiver,
            keyboard: KeyboardFeeder::new(),
            display: TextRenderer::new(out),
            ticks: 0,
        })
    }

    /// Reports the network up to both nodes.
    ///
    /// # Errors
    ///
    /// [`NodeError::Render`] if a key delivered during the exchange cannot
    /// be written.
    pub fn start(&mut self) -> Result<(), NodeError> {
        self.mesh.bring_up();
        self.pump()?;
        Ok(())
    }

    /// Queues `text` on the transmitter's keyboard.  Returns the number of
    /// characters queued.
    pub fn type_text(&mut self, text: &str) -> usize {
        self.keyboard.push_text(text)
    }

    /// Advances both nodes by one tick.  Returns the number of scan codes
    /// the receiver accepted during the step.
    ///
    /// # Errors
    ///
    /// [`NodeError::Render`] if the display cannot be written, or
    /// [`NodeError::Session`] if the transmitter refuses a key for a reason
    /// other than "not ready yet".
    pub fn step(&mut self) -> Result<usize, NodeError> {
        self.ticks += 1;
        self.transmitter.handle_event(MeshEvent::Tick);
        self.receiver.handle_event(MeshEvent::Tick);
        let mut delivered = self.pump()?;

        if let FeedOutcome::Sent(code) = self.keyboard.pump(&mut self.transmitter)? {
            debug!(tick = self.ticks, code, "scan code in flight");
        }
        delivered += self.pump()?;
        Ok(delivered)
    }

    /// Delivers queued mesh events until none are left.
    fn pump(&mut self) -> Result<usize, NodeError> {
        let mut delivered = 0;
        loop {
            let events = self.mesh.drain();
            if events.is_empty() {
                return Ok(delivered);
            }
            for (to, event) in events {
                if to == self.rx_address {
                    if let Some(code) = self.receiver.handle_event(event) {
                        self.display.on_scan_code(code)?;
                        delivered += 1;
                    }
                } else if to == self.tx_address {
                    if let Some(code) = self.transmitter.handle_event(event) {
                        debug!(code, "key arrived at transmitter; ignored");
                    }
                } else {
                    warn!(%to, "event for unknown node dropped");
                }
            }
        }
    }

    /// `true` when both nodes have both roles up.
    pub fn services_up(&self) -> bool {
        self.transmitter.services_up() && self.receiver.services_up()
    }

    /// `true` when every typed key has been sent and acknowledged.
    pub fn is_idle(&self) -> bool {
        self.keyboard.is_empty() && !self.transmitter.transmitter().awaiting_ack()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn transmitter(&self) -> &NodeSession {
        &self.transmitter
    }

    pub fn receiver(&self) -> &NodeSession {
        &self.receiver
    }

    pub fn keyboard(&self) -> &KeyboardFeeder {
        &self.keyboard
    }

    pub fn display(&self) -> &TextRenderer<W> {
        &self.display
    }

    pub fn mesh(&self) -> &SimulatedMesh {
        &self.mesh
    }
}
