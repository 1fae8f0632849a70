//! Per-role service directory.
//!
//! Each node keeps two directories: one for the services it **registers**
//! (can receive on) and one for the services it **requests** (wants to
//! transmit on).  A directory tracks every service through four stages:
//!
//! ```text
//!   add_service()      bulk call issued      response / bind
//!  ───────────────▶ to_add ───────────▶ pending ─────────────▶ ready ──▶ bound
//!                     ▲                    │
//!                     └──── timeout ───────┘
//! ```
//!
//! - `to_add`  – queued; the next idle lifecycle tick will include it in a
//!   bulk register/request call.
//! - `pending` – the bulk call is in flight.
//! - `ready`   – registered (Register role) or bound at least once
//!   (Request role).
//! - `bound`   – at least one binding has been confirmed.
//!
//! Entries are never removed individually.  Once bound, a service stays
//! bound until the whole directory is [`reset`](ServiceDirectory::reset).
//!
//! # Fan limits
//!
//! Every service carries a `bind_limit` and a `bind_count`.  For the
//! Register role the limit caps how many requesters may bind (0 means
//! unlimited and is stored as [`UNLIMITED_BINDINGS`]).  For the Request
//! role the limit is the number of bindings to make before the request is
//! considered satisfied; it is stored exactly as given.  In both roles
//! `bind_count <= bind_limit` always holds.

use crate::domain::service::{ServiceId, ServiceMask, ServiceRole, SERVICE_COUNT};

/// Stored limit for a registered service added with a fan limit of 0.
pub const UNLIMITED_BINDINGS: u8 = u8::MAX;

/// Lifecycle bookkeeping for one role's services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDirectory {
    role: ServiceRole,
    to_add: ServiceMask,
    pending: ServiceMask,
    ready: ServiceMask,
    bound: ServiceMask,
    bind_limit: [u8; SERVICE_COUNT],
    bind_count: [u8; SERVICE_COUNT],
    /// `true` once nothing is queued or in flight for this role.
    up: bool,
}

impl ServiceDirectory {
    /// Creates an empty directory for `role`.  The role starts "not up".
    pub fn new(role: ServiceRole) -> Self {
        Self {
            role,
            to_add: ServiceMask::EMPTY,
            pending: ServiceMask::EMPTY,
            ready: ServiceMask::EMPTY,
            bound: ServiceMask::EMPTY,
            bind_limit: [0; SERVICE_COUNT],
            bind_count: [0; SERVICE_COUNT],
            up: false,
        }
    }

    pub fn role(&self) -> ServiceRole {
        self.role
    }

    /// Queues `id` for the next bulk register/request call.
    ///
    /// Returns `false` without changing anything if the service is already
    /// known to this directory in any stage.  On success the role is marked
    /// not up; the caller is responsible for signalling the activity
    /// indicator.
    pub fn add_service(&mut self, id: ServiceId, fan_limit: u8) -> bool {
        if self.tracked().contains(id) {
            return false;
        }
        self.to_add.insert(id);
        self.bind_limit[id.index()] = self.normalise_limit(fan_limit);
        self.up = false;
        true
    }

    fn normalise_limit(&self, fan_limit: u8) -> u8 {
        match (self.role, fan_limit) {
            (ServiceRole::Register, 0) => UNLIMITED_BINDINGS,
            _ => fan_limit,
        }
    }

    /// Every service this directory knows about, whatever its stage.
    pub fn tracked(&self) -> ServiceMask {
        self.to_add | self.pending | self.ready | self.bound
    }

    pub fn to_add(&self) -> ServiceMask {
        self.to_add
    }

    pub fn pending(&self) -> ServiceMask {
        self.pending
    }

    pub fn ready(&self) -> ServiceMask {
        self.ready
    }

    pub fn bound(&self) -> ServiceMask {
        self.bound
    }

    pub fn is_pending(&self, id: ServiceId) -> bool {
        self.pending.contains(id)
    }

    pub fn is_ready(&self, id: ServiceId) -> bool {
        self.ready.contains(id)
    }

    pub fn is_bound(&self, id: ServiceId) -> bool {
        self.bound.contains(id)
    }

    pub fn bind_limit(&self, id: ServiceId) -> u8 {
        self.bind_limit[id.index()]
    }

    pub fn bind_count(&self, id: ServiceId) -> u8 {
        self.bind_count[id.index()]
    }

    /// `true` while another binding for `id` would stay within the limit.
    pub fn has_capacity(&self, id: ServiceId) -> bool {
        self.bind_count(id) < self.bind_limit(id)
    }

    /// `true` while anything is queued or in flight.
    pub fn has_outstanding(&self) -> bool {
        !self.to_add.is_empty() || !self.pending.is_empty()
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Clears every mask, limit and count.  Used only for a cold
    /// reconfiguration of the node.
    pub fn reset(&mut self) {
        *self = Self::new(self.role);
    }

    // ── Transitions driven by the session layer ───────────────────────────────

    /// Moves everything queued into `pending` and returns the new pending
    /// mask, which is what the bulk register/request call should carry.
    pub(crate) fn begin_bulk(&mut self) -> ServiceMask {
        self.pending |= self.to_add;
        self.to_add = ServiceMask::EMPTY;
        self.pending
    }

    /// A bulk call succeeded: everything pending becomes ready.
    pub(crate) fn commit_pending(&mut self) -> ServiceMask {
        let committed = self.pending;
        self.ready |= committed;
        self.pending = ServiceMask::EMPTY;
        committed
    }

    /// A bulk call timed out: everything pending goes back on the queue.
    pub(crate) fn requeue_pending(&mut self) -> ServiceMask {
        let requeued = self.pending;
        self.to_add |= requeued;
        self.pending = ServiceMask::EMPTY;
        requeued
    }

    /// Stops pursuing `id` (its request has been satisfied).
    pub(crate) fn settle_pending(&mut self, id: ServiceId) {
        self.pending.remove(id);
    }

    /// Records a confirmed binding for `id`.
    ///
    /// The count never passes the limit; a binding that arrives when the
    /// count is already at the limit still marks the service bound.
    /// Returns `true` when the count has reached the limit.
    pub(crate) fn record_binding(&mut self, id: ServiceId) -> bool {
        let index = id.index();
        if self.bind_count[index] < self.bind_limit[index] {
            self.bind_count[index] += 1;
        }
        self.ready.insert(id);
        self.bound.insert(id);
        self.bind_count[index] == self.bind_limit[index]
    }

    /// Marks the role up if it is not already and nothing is outstanding.
    /// Returns `true` only on the tick the role comes up.
    pub(crate) fn mark_up_if_settled(&mut self) -> bool {
        if self.up || self.has_outstanding() {
            return false;
        }
        self.up = true;
        true
    }
}

/// Both directories of a node, one per role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTable {
    pub register: ServiceDirectory,
    pub request: ServiceDirectory,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self {
            register: ServiceDirectory::new(ServiceRole::Register),
            request: ServiceDirectory::new(ServiceRole::Request),
        }
    }

    pub fn directory(&self, role: ServiceRole) -> &ServiceDirectory {
        match role {
            ServiceRole::Register => &self.register,
            ServiceRole::Request => &self.request,
        }
    }

    pub fn directory_mut(&mut self, role: ServiceRole) -> &mut ServiceDirectory {
        match role {
            ServiceRole::Register => &mut self.register,
            ServiceRole::Request => &mut self.request,
        }
    }

    /// The node's services are up when both roles are up.
    pub fn is_up(&self) -> bool {
        self.register.is_up() && self.request.is_up()
    }

    pub fn reset(&mut self) {
        self.register.reset();
        self.request.reset();
    }
}

impl Default for ServiceTable {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
