//! Domain types for the service directory.
//!
//! - **`service`** – [`ServiceId`] (an integer in `1..=32`), [`ServiceMask`]
//!   (a 32-bit set of ids) and [`ServiceRole`].
//! - **`directory`** – [`ServiceDirectory`], the per-role bookkeeping of
//!   which services are queued, pending, ready and bound, and
//!   [`ServiceTable`], which holds one directory per role.
//!
//! Nothing in this module performs I/O.  State changes that need the radio
//! (bulk register/request, bind) are driven from the `session` layer.
//!
//! [`ServiceId`]: service::ServiceId
//! [`ServiceMask`]: service::ServiceMask
//! [`ServiceRole`]: service::ServiceRole
//! [`ServiceDirectory`]: directory::ServiceDirectory
//! [`ServiceTable`]: directory::ServiceTable

pub mod directory;
pub mod service;
