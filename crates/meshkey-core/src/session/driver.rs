//! [`MeshSession`]: the single-threaded driver for one node.
//!
//! The session owns the two service directories, the lifecycle state
//! machine, the ARQ transmitter and receiver, and the transport.  Its owner
//! feeds it [`MeshEvent`]s (ticks included) one at a time and calls
//! [`MeshSession::transmit_key`] when the keyboard produces a byte.
//!
//! # Gates
//!
//! - No bulk register/request call is made until the transport reports
//!   [`MeshEvent::NetworkUp`].
//! - Key transmission, retransmission and acceptance of inbound Data frames
//!   all wait until both roles are up.
//! - Frames are only sent on services bound in the Request directory and
//!   only accepted on services bound in the Register directory.
//!
//! # Tick order
//!
//! 1. Lifecycle countdown (may time out and re-queue).
//! 2. Indicator flash countdowns.
//! 3. While the network is up: lifecycle poll, then mark roles up.
//! 4. ARQ retry countdown and retransmission.

use tracing::{debug, info, trace, warn};

use crate::domain::directory::ServiceTable;
use crate::domain::service::{ServiceId, ServiceRole};
use crate::protocol::codec::{decode_delivery, encode_delivery, is_binding_frame, PayloadText};
use crate::protocol::messages::{DeliveryKind, DeliveryMessage};
use crate::protocol::sequence::INITIAL_SEQUENCE;
use crate::session::arq::{ArqReceiver, ArqTransmitter, DEFAULT_RETRY_TICKS};
use crate::session::binding::handle_binding_frame;
use crate::session::error::SessionError;
use crate::session::lifecycle::{LifecycleTimeouts, ServiceLifecycle};
use crate::session::transport::{
    MeshEvent, MeshTransport, NoIndicator, NodeAddress, StatusIndicator, TransportStatus,
};

/// Default number of ticks an indicator stays lit for one frame.
pub const DEFAULT_FLASH_TICKS: u8 = 2;

/// Tunables for one [`MeshSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// The service key codes are sent on.
    pub delivery_service: ServiceId,
    pub timeouts: LifecycleTimeouts,
    /// Ticks to wait for an Ack before retransmitting.
    pub retry_ticks: u8,
    /// First sequence number used by both the transmitter and receiver.
    pub initial_sequence: u8,
    pub flash_ticks: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delivery_service: ServiceId::MIN,
            timeouts: LifecycleTimeouts::default(),
            retry_ticks: DEFAULT_RETRY_TICKS,
            initial_sequence: INITIAL_SEQUENCE,
            flash_ticks: DEFAULT_FLASH_TICKS,
        }
    }
}

/// The session/transport core of one node.
pub struct MeshSession<T, I = NoIndicator> {
    transport: T,
    indicator: I,
    config: SessionConfig,
    services: ServiceTable,
    lifecycle: ServiceLifecycle,
    transmitter: ArqTransmitter,
    receiver: ArqReceiver,
    network_up: bool,
    rx_flash: u8,
    tx_flash: u8,
}

impl<T: MeshTransport> MeshSession<T, NoIndicator> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self::with_indicator(transport, NoIndicator, config)
    }
}

impl<T: MeshTransport, I: StatusIndicator> MeshSession<T, I> {
    pub fn with_indicator(transport: T, indicator: I, config: SessionConfig) -> Self {
        Self {
            transport,
            indicator,
            config,
            services: ServiceTable::new(),
            lifecycle: ServiceLifecycle::new(config.timeouts),
            transmitter: ArqTransmitter::new(config.initial_sequence, config.retry_ticks),
            receiver: ArqReceiver::new(config.initial_sequence),
            network_up: false,
            rx_flash: 0,
            tx_flash: 0,
        }
    }

    // ── Service setup ─────────────────────────────────────────────────────────

    /// Queues `service` for registration with a fan-in limit (0 = unlimited).
    ///
    /// Returns `Ok(false)` if the service is already known to the Register
    /// directory.
    ///
    /// # Errors
    ///
    /// [`SessionError::ServiceOutOfRange`] if `service` is not in `1..=32`.
    pub fn register_service(&mut self, service: u8, fan_limit: u8) -> Result<bool, SessionError> {
        self.add_service(ServiceRole::Register, service, fan_limit)
    }

    /// Queues `service` to be requested, aiming for `fan_limit` bindings.
    ///
    /// # Errors
    ///
    /// [`SessionError::ServiceOutOfRange`] if `service` is not in `1..=32`.
    pub fn request_service(&mut self, service: u8, fan_limit: u8) -> Result<bool, SessionError> {
        self.add_service(ServiceRole::Request, service, fan_limit)
    }

    fn add_service(
        &mut self,
        role: ServiceRole,
        service: u8,
        fan_limit: u8,
    ) -> Result<bool, SessionError> {
        let id = ServiceId::try_from(service)?;
        let added = self.services.directory_mut(role).add_service(id, fan_limit);
        if added {
            debug!(%role, service = %id, fan_limit, "service queued");
            self.indicator.set(role, true);
        }
        Ok(added)
    }

    /// Clears both directories and returns the lifecycle to Idle.  For a
    /// cold reconfiguration only; existing bindings are forgotten.
    pub fn reset_services(&mut self) {
        self.services.reset();
        self.lifecycle.force_idle();
        info!("service directories reset");
    }

    // ── Events ────────────────────────────────────────────────────────────────

    /// Processes one event.  Returns the payload byte accepted by the ARQ
    /// receiver, if this event delivered one.
    pub fn handle_event(&mut self, event: MeshEvent) -> Option<u8> {
        match event {
            MeshEvent::NetworkUp => {
                if !self.network_up {
                    info!("network up");
                }
                self.network_up = true;
                None
            }
            MeshEvent::RegisterResponse { services } => {
                self.lifecycle.on_register_response(&mut self.services, services);
                None
            }
            MeshEvent::RequestResponse { from, services } => {
                self.lifecycle.on_request_response(
                    &mut self.services,
                    &mut self.transport,
                    from,
                    services,
                );
                None
            }
            MeshEvent::DataToService {
                from,
                service,
                payload,
            } => self.on_service_data(from, service, &payload),
            MeshEvent::Data { from, payload } => {
                self.on_data(from, &payload);
                None
            }
            MeshEvent::Tick => {
                self.on_tick();
                None
            }
        }
    }

    fn on_tick(&mut self) {
        self.lifecycle.count_down(&mut self.services);
        self.count_down_flashes();

        if self.network_up {
            self.lifecycle.poll(&mut self.services, &mut self.transport);
            for role in [ServiceRole::Register, ServiceRole::Request] {
                if self.services.directory_mut(role).mark_up_if_settled() {
                    info!(%role, "services up");
                    self.indicator.set(role, false);
                }
            }
        }

        self.transmitter.count_down();
        if self.services.is_up() {
            if let Some(frame) = self.transmitter.due_retransmission() {
                self.send_delivery(self.config.delivery_service, frame);
            }
        }
    }

    fn on_data(&mut self, from: NodeAddress, payload: &[u8]) {
        if is_binding_frame(payload) {
            handle_binding_frame(
                &mut self.services,
                &mut self.lifecycle,
                &mut self.transport,
                from,
                payload,
            );
        } else {
            debug!(%from, payload = %PayloadText(payload), "unhandled data dropped");
        }
    }

    fn on_service_data(&mut self, from: NodeAddress, service: u8, payload: &[u8]) -> Option<u8> {
        let id = match ServiceId::new(service) {
            Some(id) if self.services.register.is_bound(id) => id,
            _ => {
                debug!(%from, service, "data for unbound service dropped");
                return None;
            }
        };
        self.flash(ServiceRole::Register);
        trace!(%from, service = %id, payload = %PayloadText(payload), "service data received");

        let msg = match decode_delivery(payload) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%from, service = %id, error = %e, "dropping malformed delivery frame");
                return None;
            }
        };
        match msg.kind {
            DeliveryKind::Data => self.on_delivery_data(id, &msg),
            DeliveryKind::Ack => {
                self.transmitter.on_ack(&msg);
                None
            }
        }
    }

    fn on_delivery_data(&mut self, service: ServiceId, msg: &DeliveryMessage) -> Option<u8> {
        if !self.services.is_up() {
            debug!(sequence = msg.sequence, "data before services up ignored");
            return None;
        }
        let receipt = self.receiver.on_data(msg);
        self.send_delivery(service, receipt.ack);
        receipt.delivered
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    /// Hands one key code to the ARQ transmitter.
    ///
    /// Once this returns `Ok` the code is in flight and will be retransmitted
    /// until acknowledged, even if the first send fails at the transport.
    ///
    /// # Errors
    ///
    /// - [`SessionError::ServicesNotUp`] until both roles are up.
    /// - [`SessionError::ServiceNotBound`] if the delivery service has no
    ///   binding.
    /// - [`SessionError::AwaitingAck`] while the previous code is in flight.
    pub fn transmit_key(&mut self, code: u8) -> Result<(), SessionError> {
        if !self.services.is_up() {
            return Err(SessionError::ServicesNotUp);
        }
        let service = self.config.delivery_service;
        if !self.services.request.is_bound(service) {
            return Err(SessionError::ServiceNotBound(service.get()));
        }
        let frame = self.transmitter.send(code)?;
        self.send_delivery(service, frame);
        Ok(())
    }

    /// Sends raw bytes on a bound requested service.
    ///
    /// # Errors
    ///
    /// [`SessionError::ServiceOutOfRange`], [`SessionError::ServiceNotBound`]
    /// or the transport's own error.
    pub fn send_to_service(
        &mut self,
        service: u8,
        bytes: &[u8],
    ) -> Result<TransportStatus, SessionError> {
        let id = ServiceId::try_from(service)?;
        self.send_bound(id, bytes)
    }

    fn send_delivery(&mut self, service: ServiceId, frame: DeliveryMessage) {
        if let Err(e) = self.send_bound(service, &encode_delivery(&frame)) {
            warn!(%service, kind = ?frame.kind, sequence = frame.sequence, error = %e, "delivery frame not sent");
        }
    }

    fn send_bound(&mut self, service: ServiceId, bytes: &[u8]) -> Result<TransportStatus, SessionError> {
        if !self.services.request.is_bound(service) {
            return Err(SessionError::ServiceNotBound(service.get()));
        }
        self.flash(ServiceRole::Request);
        let status = self.transport.send_to_bound_service(service, bytes)?;
        trace!(%service, payload = %PayloadText(bytes), ?status, "service data sent");
        Ok(status)
    }

    // ── Indicators ────────────────────────────────────────────────────────────

    fn flash(&mut self, role: ServiceRole) {
        match role {
            ServiceRole::Register => self.rx_flash = self.config.flash_ticks,
            ServiceRole::Request => self.tx_flash = self.config.flash_ticks,
        }
        self.indicator.set(role, true);
    }

    fn count_down_flashes(&mut self) {
        for role in [ServiceRole::Register, ServiceRole::Request] {
            let timer = match role {
                ServiceRole::Register => &mut self.rx_flash,
                ServiceRole::Request => &mut self.tx_flash,
            };
            if *timer == 0 {
                continue;
            }
            *timer -= 1;
            if *timer == 0 && self.services.directory(role).is_up() {
                self.indicator.set(role, false);
            }
        }
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn network_up(&self) -> bool {
        self.network_up
    }

    /// `true` when both roles are up.
    pub fn services_up(&self) -> bool {
        self.services.is_up()
    }

    pub fn register_up(&self) -> bool {
        self.services.register.is_up()
    }

    pub fn request_up(&self) -> bool {
        self.services.request.is_up()
    }

    /// `true` if `service` has a confirmed incoming binding.  `false` for
    /// ids outside `1..=32`.
    pub fn is_register_bound(&self, service: u8) -> bool {
        ServiceId::new(service).is_some_and(|id| self.services.register.is_bound(id))
    }

    /// `true` if this node has bound `service` to a peer.  `false` for ids
    /// outside `1..=32`.
    pub fn is_request_bound(&self, service: u8) -> bool {
        ServiceId::new(service).is_some_and(|id| self.services.request.is_bound(id))
    }

    pub fn services(&self) -> &ServiceTable {
        &self.services
    }

    pub fn lifecycle(&self) -> &ServiceLifecycle {
        &self.lifecycle
    }

    pub fn transmitter(&self) -> &ArqTransmitter {
        &self.transmitter
    }

    pub fn receiver(&self) -> &ArqReceiver {
        &self.receiver
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
