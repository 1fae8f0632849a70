//! The Query / Accept / Bound binding handshake.
//!
//! No per-peer state is kept.  Each inbound message is checked against the
//! local directories and their bind counts, which makes every step safe to
//! repeat:
//!
//! - **Query(id)** from a requester: reply Accept if `id` is registered
//!   here and below its fan-in limit.  Nothing is counted yet.
//! - **Accept(id)** from a registrant: if `id` is still being requested
//!   here and below its binding target, bind to the sender.  On success
//!   count the binding, mark `id` ready and bound, stop pursuing `id` once
//!   the target is reached (returning the lifecycle to Idle), and reply
//!   Bound.
//! - **Bound(id)** from a requester: count the confirmed binding against
//!   the registered service.
//!
//! Two requesters racing for the last registered slot can both be
//! accepted before either Bound arrives.  The registrant then has one more
//! binding than its limit; its count stops at the limit.

use tracing::{debug, info, warn};

use crate::domain::directory::ServiceTable;
use crate::domain::service::ServiceId;
use crate::protocol::codec::{decode_binding, encode_binding, PayloadText};
use crate::protocol::messages::{BindingCommand, BindingMessage};
use crate::session::lifecycle::ServiceLifecycle;
use crate::session::transport::{MeshTransport, NodeAddress, TransportError, TransportStatus};

/// What an inbound binding frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOutcome {
    /// The frame did not decode.
    Malformed,
    /// The frame named a service this node is not in a position to act on.
    Ignored(BindingCommand, ServiceId),
    /// A Query was accepted.
    Accepted(ServiceId),
    /// An Accept led to a successful bind; `satisfied` is `true` when the
    /// binding target was reached.
    Bound { service: ServiceId, satisfied: bool },
    /// An Accept could not be bound by the transport.
    BindFailed(ServiceId),
    /// A Bound confirmation was counted.
    Confirmed(ServiceId),
}

/// Sends one binding message to `to`.
pub fn send_binding<T: MeshTransport>(
    transport: &mut T,
    to: NodeAddress,
    msg: BindingMessage,
) -> Result<TransportStatus, TransportError> {
    let frame = encode_binding(&msg);
    let result = transport.send_to(to, &frame);
    match &result {
        Ok(_) => debug!(%to, command = %msg.command, service = %msg.service, "binding frame sent"),
        Err(e) => warn!(%to, command = %msg.command, service = %msg.service, error = %e, "binding frame send failed"),
    }
    result
}

/// Processes one inbound binding frame from `from`.
///
/// Malformed frames and frames for services outside `1..=32` are dropped
/// without side effects.
pub fn handle_binding_frame<T: MeshTransport>(
    table: &mut ServiceTable,
    lifecycle: &mut ServiceLifecycle,
    transport: &mut T,
    from: NodeAddress,
    bytes: &[u8],
) -> BindingOutcome {
    let msg = match decode_binding(bytes) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(%from, payload = %PayloadText(bytes), error = %e, "dropping malformed binding frame");
            return BindingOutcome::Malformed;
        }
    };
    debug!(%from, command = %msg.command, service = %msg.service, "binding frame received");

    match msg.command {
        BindingCommand::Query => on_query(table, transport, from, msg.service),
        BindingCommand::Accept => on_accept(table, lifecycle, transport, from, msg.service),
        BindingCommand::Bound => on_bound(table, from, msg.service),
    }
}

fn on_query<T: MeshTransport>(
    table: &ServiceTable,
    transport: &mut T,
    from: NodeAddress,
    service: ServiceId,
) -> BindingOutcome {
    let register = &table.register;
    if !register.is_ready(service) || !register.has_capacity(service) {
        return BindingOutcome::Ignored(BindingCommand::Query, service);
    }
    // Accept is not counted; the requester's Bound does that.
    let _ = send_binding(transport, from, BindingMessage::accept(service));
    BindingOutcome::Accepted(service)
}

fn on_accept<T: MeshTransport>(
    table: &mut ServiceTable,
    lifecycle: &mut ServiceLifecycle,
    transport: &mut T,
    from: NodeAddress,
    service: ServiceId,
) -> BindingOutcome {
    let request = &mut table.request;
    if !request.is_pending(service) || !request.has_capacity(service) {
        return BindingOutcome::Ignored(BindingCommand::Accept, service);
    }

    match transport.bind_service(service, from) {
        Ok(TransportStatus::Success) => {}
        Ok(TransportStatus::Deferred) => {
            warn!(%from, %service, "bind did not complete");
            return BindingOutcome::BindFailed(service);
        }
        Err(e) => {
            warn!(%from, %service, error = %e, "bind failed");
            return BindingOutcome::BindFailed(service);
        }
    }

    let satisfied = request.record_binding(service);
    info!(%from, %service, count = request.bind_count(service), limit = request.bind_limit(service), "service bound");
    if satisfied {
        request.settle_pending(service);
        lifecycle.force_idle();
    }

    let _ = send_binding(transport, from, BindingMessage::bound(service));
    BindingOutcome::Bound { service, satisfied }
}

fn on_bound(table: &mut ServiceTable, from: NodeAddress, service: ServiceId) -> BindingOutcome {
    let register = &mut table.register;
    if !register.is_ready(service) {
        return BindingOutcome::Ignored(BindingCommand::Bound, service);
    }
    register.record_binding(service);
    info!(%from, %service, count = register.bind_count(service), limit = register.bind_limit(service), "binding confirmed by requester");
    BindingOutcome::Confirmed(service)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::lifecycle::LifecycleState;
    use crate::session::transport::MockMeshTransport;
    use mockall::predicate::eq;

    const REQUESTER: NodeAddress = NodeAddress(0x0A);
    const REGISTRANT: NodeAddress = NodeAddress(0x0B);

    fn id(raw: u8) -> ServiceId {
        ServiceId::new(raw).expect("valid id")
    }

    /// A table with `service` registered and committed.
    fn registered(service: ServiceId, limit: u8) -> ServiceTable {
        let mut table = ServiceTable::new();
        table.register.add_service(service, limit);
        table.register.begin_bulk();
        table.register.commit_pending();
        table
    }

    /// A table with `service` requested and in flight, and a lifecycle in
    /// Requesting.
    fn requesting(service: ServiceId, limit: u8) -> (ServiceTable, ServiceLifecycle) {
        let mut table = ServiceTable::new();
        table.request.add_service(service, limit);
        let mut transport = MockMeshTransport::new();
        transport
            .expect_request_services()
            .returning(|_| Ok(TransportStatus::Deferred));
        let mut lifecycle = ServiceLifecycle::default();
        lifecycle.poll(&mut table, &mut transport);
        (table, lifecycle)
    }

    #[test]
    fn test_query_for_ready_service_replies_accept() {
        // Arrange
        let mut table = registered(id(1), 1);
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();
        transport
            .expect_send_to()
            .withf(|to, bytes| *to == REQUESTER && bytes == b"<By01>\0")
            .times(1)
            .returning(|_, _| Ok(TransportStatus::Success));

        // Act
        let outcome =
            handle_binding_frame(&mut table, &mut lifecycle, &mut transport, REQUESTER, b"<Bq01>\0");

        // Assert
        assert_eq!(outcome, BindingOutcome::Accepted(id(1)));
        assert_eq!(table.register.bind_count(id(1)), 0, "accept must not count");
    }

    #[test]
    fn test_query_withheld_when_limit_reached() {
        // Arrange
        let mut table = registered(id(1), 1);
        table.register.record_binding(id(1));
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();
        transport.expect_send_to().never();

        // Act
        let outcome =
            handle_binding_frame(&mut table, &mut lifecycle, &mut transport, REQUESTER, b"<Bq01>\0");

        // Assert
        assert_eq!(outcome, BindingOutcome::Ignored(BindingCommand::Query, id(1)));
    }

    #[test]
    fn test_query_for_unregistered_service_is_ignored() {
        let mut table = ServiceTable::new();
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();
        transport.expect_send_to().never();

        let outcome =
            handle_binding_frame(&mut table, &mut lifecycle, &mut transport, REQUESTER, b"<Bq02>\0");

        assert_eq!(outcome, BindingOutcome::Ignored(BindingCommand::Query, id(2)));
    }

    #[test]
    fn test_query_out_of_range_is_dropped_without_reply() {
        // Arrange
        let mut table = registered(id(1), 0);
        let before = table.clone();
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();
        transport.expect_send_to().never();
        transport.expect_bind_service().never();

        // Act
        let outcome =
            handle_binding_frame(&mut table, &mut lifecycle, &mut transport, REQUESTER, b"<Bq33>\0");

        // Assert
        assert_eq!(outcome, BindingOutcome::Malformed);
        assert_eq!(table, before);
    }

    #[test]
    fn test_accept_binds_reaches_target_and_replies_bound() {
        // Arrange
        let (mut table, mut lifecycle) = requesting(id(1), 1);
        let mut transport = MockMeshTransport::new();
        transport
            .expect_bind_service()
            .with(eq(id(1)), eq(REGISTRANT))
            .times(1)
            .returning(|_, _| Ok(TransportStatus::Success));
        transport
            .expect_send_to()
            .withf(|to, bytes| *to == REGISTRANT && bytes == b"<Bb01>\0")
            .times(1)
            .returning(|_, _| Ok(TransportStatus::Success));

        // Act
        let outcome = handle_binding_frame(
            &mut table,
            &mut lifecycle,
            &mut transport,
            REGISTRANT,
            b"<By01>\0",
        );

        // Assert
        assert_eq!(
            outcome,
            BindingOutcome::Bound {
                service: id(1),
                satisfied: true
            }
        );
        assert_eq!(table.request.bind_count(id(1)), 1);
        assert!(table.request.is_bound(id(1)));
        assert!(table.request.is_ready(id(1)));
        assert!(!table.request.is_pending(id(1)));
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
    }

    #[test]
    fn test_accept_below_target_keeps_requesting() {
        // Arrange
        let (mut table, mut lifecycle) = requesting(id(3), 2);
        let mut transport = MockMeshTransport::new();
        transport
            .expect_bind_service()
            .returning(|_, _| Ok(TransportStatus::Success));
        transport
            .expect_send_to()
            .returning(|_, _| Ok(TransportStatus::Success));

        // Act
        let outcome = handle_binding_frame(
            &mut table,
            &mut lifecycle,
            &mut transport,
            REGISTRANT,
            b"<By03>\0",
        );

        // Assert
        assert_eq!(
            outcome,
            BindingOutcome::Bound {
                service: id(3),
                satisfied: false
            }
        );
        assert!(table.request.is_pending(id(3)));
        assert_eq!(lifecycle.state(), LifecycleState::Requesting);
    }

    #[test]
    fn test_accept_for_unrequested_service_is_ignored() {
        let mut table = ServiceTable::new();
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();
        transport.expect_bind_service().never();

        let outcome = handle_binding_frame(
            &mut table,
            &mut lifecycle,
            &mut transport,
            REGISTRANT,
            b"<By01>\0",
        );

        assert_eq!(outcome, BindingOutcome::Ignored(BindingCommand::Accept, id(1)));
    }

    #[test]
    fn test_failed_bind_sends_nothing() {
        // Arrange
        let (mut table, mut lifecycle) = requesting(id(1), 1);
        let mut transport = MockMeshTransport::new();
        transport
            .expect_bind_service()
            .returning(|_, _| Err(TransportError::StackResources));
        transport.expect_send_to().never();

        // Act
        let outcome = handle_binding_frame(
            &mut table,
            &mut lifecycle,
            &mut transport,
            REGISTRANT,
            b"<By01>\0",
        );

        // Assert
        assert_eq!(outcome, BindingOutcome::BindFailed(id(1)));
        assert!(!table.request.is_bound(id(1)));
        assert_eq!(table.request.bind_count(id(1)), 0);
    }

    #[test]
    fn test_bound_counts_registered_binding() {
        // Arrange
        let mut table = registered(id(1), 1);
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();

        // Act
        let outcome =
            handle_binding_frame(&mut table, &mut lifecycle, &mut transport, REQUESTER, b"<Bb01>\0");

        // Assert
        assert_eq!(outcome, BindingOutcome::Confirmed(id(1)));
        assert_eq!(table.register.bind_count(id(1)), 1);
        assert!(table.register.is_bound(id(1)));
    }

    #[test]
    fn test_racing_bounds_never_exceed_limit() {
        // Arrange – two requesters both got Accept for the last slot
        let mut table = registered(id(1), 1);
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();

        // Act
        handle_binding_frame(&mut table, &mut lifecycle, &mut transport, REQUESTER, b"<Bb01>\0");
        handle_binding_frame(&mut table, &mut lifecycle, &mut transport, NodeAddress(0x0C), b"<Bb01>\0");

        // Assert
        assert_eq!(table.register.bind_count(id(1)), 1);
    }

    #[test]
    fn test_bound_for_unregistered_service_is_ignored() {
        let mut table = ServiceTable::new();
        let mut lifecycle = ServiceLifecycle::default();
        let mut transport = MockMeshTransport::new();

        let outcome =
            handle_binding_frame(&mut table, &mut lifecycle, &mut transport, REQUESTER, b"<Bb04>\0");

        assert_eq!(outcome, BindingOutcome::Ignored(BindingCommand::Bound, id(4)));
        assert!(!table.register.is_bound(id(4)));
    }
}
