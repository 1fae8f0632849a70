//! Errors returned to owners of a [`MeshSession`](super::driver::MeshSession).
//!
//! Inbound protocol problems never show up here: malformed frames are
//! dropped and timeouts are retried inside the session.  These variants
//! cover calls an owner made that could not be carried out.

use thiserror::Error;

use crate::domain::service::ServiceIdOutOfRange;
use crate::session::transport::TransportError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The owner passed a service id outside `1..=32`.
    #[error(transparent)]
    ServiceOutOfRange(#[from] ServiceIdOutOfRange),

    /// A payload is already in flight; wait for its acknowledgement.
    #[error("a payload is already awaiting acknowledgement (sequence 0x{sequence:02X})")]
    AwaitingAck { sequence: u8 },

    /// Registered and requested services are not both up yet.
    #[error("services are not up yet")]
    ServicesNotUp,

    /// The requested service has no confirmed binding.
    #[error("service {0} is not bound")]
    ServiceNotBound(u8),

    /// The mesh stack refused the call.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
