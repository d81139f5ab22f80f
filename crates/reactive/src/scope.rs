//! Change scope accounting.

/// Counts open content scopes and topology holds.
///
/// Content scopes bracket store transactions (`will-change` .. `did-change`); topology
/// holds bracket store attach/detach. Deferred work (launching a refetch, signaling
/// its completion) waits until both reach zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeScope {
    content: usize,
    topology: usize,
}

impl ChangeScope {
    pub const fn new() -> Self {
        Self {
            content: 0,
            topology: 0,
        }
    }

    /// Opens a content scope. Returns true if it is the outermost one.
    pub fn begin_content(&mut self) -> bool {
        self.content += 1;
        self.content == 1
    }

    /// Closes a content scope.
    ///
    /// Returns `None` if no content scope was open, otherwise whether the content
    /// scopes are now all closed.
    pub fn end_content(&mut self) -> Option<bool> {
        if self.content == 0 {
            return None;
        }
        self.content -= 1;
        Some(self.content == 0)
    }

    pub fn hold_topology(&mut self) {
        self.topology += 1;
    }

    /// Releases a topology hold. Returns false if none was held.
    pub fn release_topology(&mut self) -> bool {
        if self.topology == 0 {
            return false;
        }
        self.topology -= 1;
        true
    }

    #[inline]
    pub fn content_depth(&self) -> usize {
        self.content
    }

    #[inline]
    pub fn topology_holds(&self) -> usize {
        self.topology
    }

    #[inline]
    pub fn is_content_open(&self) -> bool {
        self.content > 0
    }

    /// True when no content scope and no topology hold is open.
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.content == 0 && self.topology == 0
    }
}
