//! Wire formats and the wrapping sequence counter.
//!
//! Two bit-exact frame formats travel over the mesh:
//!
//! - **Binding frames** (7 bytes) carry the Query / Accept / Bound handshake
//!   and are sent to a peer address.
//! - **Delivery frames** (3 bytes) carry one key code or its acknowledgement
//!   and are sent over a bound service.

pub mod codec;
pub mod messages;
pub mod sequence;

pub use codec::{
    decode_binding, decode_delivery, encode_binding, encode_delivery, is_binding_frame,
    PayloadText, ProtocolError,
};
pub use messages::*;
pub use sequence::Sequence;
