//! History windowing.
//!
//! Large logs render only a tail window; everything before it is deferred
//! and materialized in turn-boundary-snapped batches when the user scrolls
//! near the top. The deferred slice is always a prefix of the log ending at
//! a user message (when one exists in range), so a group never splits across
//! the window edge.

use skein_core::{Message, Role};
use tracing::debug;

/// Newest messages rendered eagerly on a full rebuild
pub const INITIAL_RENDER_MAX: usize = 20;

/// Deferred messages materialized per older-batch load
pub const OLDER_BATCH_SIZE: usize = 15;

/// Scroll offset (display lines) below which an older load triggers
pub const LOAD_OLDER_THRESHOLD: f32 = 100.0;

/// Render counts above this yield once before building, so a large rebuild
/// does not stall the frame it started on
pub const LOADING_YIELD_THRESHOLD: usize = 6;

/// First eagerly-rendered index for a full rebuild
///
/// Past the size cap, the start advances to the next user message; if none
/// exists before the end of the log, the unsnapped start is kept.
pub fn initial_window_start(messages: &[Message]) -> usize {
    let count = messages.len();
    if count <= INITIAL_RENDER_MAX {
        return 0;
    }
    let unsnapped = count - INITIAL_RENDER_MAX;
    let mut start = unsnapped;
    while start < count && messages[start].role != Role::User {
        start += 1;
    }
    if start >= count { unsnapped } else { start }
}

/// Deferred-history bookkeeping for one transcript
///
/// Invariants: the deferred slice is never `Some` and empty, and at most one
/// older load is in flight.
#[derive(Debug, Default)]
pub struct VirtualizationState {
    deferred: Option<Vec<Message>>,
    loading_older: bool,
}

impl VirtualizationState {
    /// Replace the deferred prefix (full rebuild)
    pub fn set_deferred(&mut self, messages: Vec<Message>) {
        self.deferred = if messages.is_empty() { None } else { Some(messages) };
        self.loading_older = false;
    }

    pub fn reset(&mut self) {
        self.deferred = None;
        self.loading_older = false;
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn is_loading(&self) -> bool {
        self.loading_older
    }

    /// Whether a scroll position this close to the top should load more
    pub fn wants_older(&self, scroll_offset: f32) -> bool {
        scroll_offset < LOAD_OLDER_THRESHOLD && !self.loading_older && self.has_deferred()
    }

    /// Claim the in-flight slot; false when a load is already running or
    /// nothing is deferred
    pub fn begin_load(&mut self) -> bool {
        if self.loading_older || !self.has_deferred() {
            return false;
        }
        self.loading_older = true;
        true
    }

    pub fn end_load(&mut self) {
        self.loading_older = false;
    }

    /// Detach the next older batch, snapped back to a turn boundary
    ///
    /// Takes the last [`OLDER_BATCH_SIZE`] deferred messages, then walks the
    /// batch start backward to the nearest user message (or the front of the
    /// deferred slice).
    pub fn take_batch(&mut self) -> Vec<Message> {
        let Some(deferred) = self.deferred.as_mut() else {
            return Vec::new();
        };
        let mut start = deferred.len().saturating_sub(OLDER_BATCH_SIZE);
        while start > 0 && deferred[start].role != Role::User {
            start -= 1;
        }
        let batch = deferred.split_off(start);
        if deferred.is_empty() {
            self.deferred = None;
        }
        debug!(batch = batch.len(), remaining = self.deferred_len(), "older batch detached");
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::Message;

    fn log(roles: &[Role]) -> Vec<Message> {
        roles
            .iter()
            .enumerate()
            .map(|(i, role)| {
                let id = i as u64 + 1;
                match role {
                    Role::User => Message::user(id, format!("u{}", id)),
                    Role::Assistant => Message::assistant(id, format!("a{}", id)),
                    _ => Message::tool(id, "lumi_search", "{}"),
                }
            })
            .collect()
    }

    #[test]
    fn test_initial_window_small_log_renders_all() {
        let messages = log(&[Role::User, Role::Assistant]);
        assert_eq!(initial_window_start(&messages), 0);
    }

    #[test]
    fn test_initial_window_snaps_forward_to_user() {
        // 30 messages; unsnapped start would be 10 (a tool message), the
        // next user message is at 12.
        let mut roles = vec![Role::Tool; 30];
        roles[12] = Role::User;
        roles[5] = Role::User;
        let messages = log(&roles);
        assert_eq!(initial_window_start(&messages), 12);
        assert_eq!(messages[12].role, Role::User);
    }

    #[test]
    fn test_initial_window_falls_back_when_no_boundary() {
        let roles = vec![Role::Tool; 30];
        let messages = log(&roles);
        assert_eq!(initial_window_start(&messages), 10);
    }

    #[test]
    fn test_initial_window_start_already_on_user() {
        let mut roles = vec![Role::Tool; 25];
        roles[5] = Role::User;
        let messages = log(&roles);
        assert_eq!(initial_window_start(&messages), 5);
    }

    #[test]
    fn test_set_deferred_never_empty_some() {
        let mut state = VirtualizationState::default();
        state.set_deferred(Vec::new());
        assert!(!state.has_deferred());

        state.set_deferred(log(&[Role::User]));
        assert!(state.has_deferred());
        assert_eq!(state.deferred_len(), 1);
    }

    #[test]
    fn test_wants_older_gating() {
        let mut state = VirtualizationState::default();
        assert!(!state.wants_older(0.0));

        state.set_deferred(log(&[Role::User, Role::Assistant]));
        assert!(state.wants_older(50.0));
        assert!(!state.wants_older(150.0));

        assert!(state.begin_load());
        assert!(!state.wants_older(50.0));
        assert!(!state.begin_load());
        state.end_load();
        assert!(state.wants_older(50.0));
    }

    #[test]
    fn test_take_batch_snaps_back_to_user() {
        // 20 deferred; a plain take would start at 5 (tool); user boundary
        // sits at 3.
        let mut roles = vec![Role::Tool; 20];
        roles[3] = Role::User;
        let mut state = VirtualizationState::default();
        state.set_deferred(log(&roles));

        let batch = state.take_batch();
        assert_eq!(batch.len(), 17);
        assert_eq!(batch[0].role, Role::User);
        assert_eq!(state.deferred_len(), 3);
    }

    #[test]
    fn test_take_batch_without_boundary_takes_all_the_way_back() {
        let roles = vec![Role::Tool; 18];
        let mut state = VirtualizationState::default();
        state.set_deferred(log(&roles));

        let batch = state.take_batch();
        assert_eq!(batch.len(), 18);
        assert!(!state.has_deferred());
    }

    #[test]
    fn test_take_batch_drains_to_none() {
        let mut state = VirtualizationState::default();
        state.set_deferred(log(&[Role::User, Role::Assistant]));
        let batch = state.take_batch();
        assert_eq!(batch.len(), 2);
        assert!(!state.has_deferred());
        assert!(state.take_batch().is_empty());
    }
}
