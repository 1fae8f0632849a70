//! Application layer for the demonstration node.
//!
//! - **`type_keys`** – [`KeyboardFeeder`]: queues PS/2 scan codes produced
//!   from text and hands them to the session one at a time, never faster
//!   than the ARQ can acknowledge them.
//! - **`render_keys`** – [`TextRenderer`]: decodes scan codes accepted by
//!   the receiver session and writes the resulting text.
//!
//! [`KeyboardFeeder`]: type_keys::KeyboardFeeder
//! [`TextRenderer`]: render_keys::TextRenderer

pub mod render_keys;
pub mod type_keys;
