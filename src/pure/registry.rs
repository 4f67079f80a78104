//! A registry of forms split in place into visible and hidden partitions
//!
//! All known entries live in a single `Vec`. Indices `[0, visible)` hold the visible entries and
//! `[visible, len)` the hidden ones, so moving an entry between partitions is a single swap with
//! the element sitting on the boundary.
use std::fmt;
use tracing::error;

/// Something that can be stored in a [Registry].
pub trait Entry {
    /// The identifier used to look entries up
    type Key: Copy + PartialEq + fmt::Debug;

    /// The identifier of this entry
    fn key(&self) -> Self::Key;

    /// Whether this entry currently contains automatic (self polling) members.
    fn has_automatic(&self) -> bool {
        false
    }
}

/// Visible and hidden entries held in a single partitioned `Vec`.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Vec<T>,
    visible: usize,
    auto_count: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            visible: 0,
            auto_count: 0,
        }
    }
}

impl<T: Entry> Registry<T> {
    /// Create a new empty Registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new entry to the hidden partition.
    pub fn insert(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// The number of visible entries.
    pub fn n_visible(&self) -> usize {
        self.visible
    }

    /// The number of hidden entries.
    pub fn n_hidden(&self) -> usize {
        self.entries.len() - self.visible
    }

    /// The total number of known entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether or not there are any known entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of visible entries that contain automatic members.
    pub fn auto_count(&self) -> usize {
        self.auto_count
    }

    fn position(&self, k: T::Key) -> Option<usize> {
        self.entries.iter().position(|e| e.key() == k)
    }

    /// Whether the entry with the given key is in the visible partition.
    pub fn is_visible(&self, k: T::Key) -> bool {
        matches!(self.position(k), Some(ix) if ix < self.visible)
    }

    /// Whether the given key is known to this registry.
    pub fn contains(&self, k: T::Key) -> bool {
        self.position(k).is_some()
    }

    /// Look up an entry by key in either partition.
    pub fn get(&self, k: T::Key) -> Option<&T> {
        self.entries.iter().find(|e| e.key() == k)
    }

    /// Look up an entry by key in either partition.
    pub fn get_mut(&mut self, k: T::Key) -> Option<&mut T> {
        self.entries.iter_mut().find(|e| e.key() == k)
    }

    /// Linear scan of the visible partition only.
    pub fn find_visible<F>(&self, pred: F) -> Option<&T>
    where
        F: Fn(&T) -> bool,
    {
        self.entries[..self.visible].iter().find(|e| pred(e))
    }

    /// Iterate over the visible entries.
    pub fn iter_visible(&self) -> impl Iterator<Item = &T> {
        self.entries[..self.visible].iter()
    }

    /// Iterate over the hidden entries.
    pub fn iter_hidden(&self) -> impl Iterator<Item = &T> {
        self.entries[self.visible..].iter()
    }

    /// Iterate over all entries, visible first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Iterate mutably over all entries, visible first.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut()
    }

    /// Move an entry from the hidden partition to the visible one.
    ///
    /// Returns `false` if the entry was not found among the hidden entries.
    pub fn show(&mut self, k: T::Key) -> bool {
        let ix = match self.position(k) {
            Some(ix) if ix >= self.visible => ix,
            _ => {
                error!(key = ?k, "entry to show is not in the hidden partition");
                return false;
            }
        };

        self.entries.swap(ix, self.visible);
        self.visible += 1;

        if self.entries[self.visible - 1].has_automatic() {
            self.auto_count += 1;
        }

        true
    }

    /// Move an entry from the visible partition to the hidden one.
    ///
    /// Returns `false` if the entry was not found among the visible entries.
    pub fn hide(&mut self, k: T::Key) -> bool {
        let ix = match self.position(k) {
            Some(ix) if ix < self.visible => ix,
            _ => {
                error!(key = ?k, "entry to hide is not in the visible partition");
                return false;
            }
        };

        let last = self.visible - 1;
        self.entries.swap(ix, last);
        self.visible -= 1;

        if self.entries[last].has_automatic() {
            self.release_auto();
        }

        true
    }

    /// Remove a hidden entry from the registry entirely.
    ///
    /// Visible entries must be hidden first: `None` is returned if the key is unknown or the
    /// entry is still visible.
    pub fn remove(&mut self, k: T::Key) -> Option<T> {
        match self.position(k) {
            Some(ix) if ix >= self.visible => Some(self.entries.swap_remove(ix)),
            Some(_) => {
                error!(key = ?k, "attempt to remove a visible entry");
                None
            }
            None => None,
        }
    }

    /// Record that a visible entry gained its first automatic member.
    pub fn acquire_auto(&mut self) {
        self.auto_count += 1;
    }

    /// Record that a visible entry lost its last automatic member.
    ///
    /// The count is clamped at zero: going negative indicates a bookkeeping bug elsewhere.
    pub fn release_auto(&mut self) {
        if self.auto_count == 0 {
            error!("automatic entry count would go negative: clamping at zero");
            return;
        }
        self.auto_count -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use simple_test_case::test_case;

    #[derive(Debug, Clone, PartialEq)]
    struct E(u8, bool);

    impl Entry for E {
        type Key = u8;

        fn key(&self) -> u8 {
            self.0
        }

        fn has_automatic(&self) -> bool {
            self.1
        }
    }

    fn registry(n: u8) -> Registry<E> {
        let mut r = Registry::new();
        for i in 0..n {
            r.insert(E(i, i % 2 == 0));
        }

        r
    }

    #[test]
    fn new_entries_are_hidden() {
        let r = registry(3);

        assert_eq!(r.n_visible(), 0);
        assert_eq!(r.n_hidden(), 3);
        assert!(!r.is_visible(1));
    }

    #[test]
    fn show_and_hide_move_between_partitions() {
        let mut r = registry(4);

        assert!(r.show(2));
        assert!(r.show(3));
        assert!(r.is_visible(2) && r.is_visible(3));
        assert_eq!(r.auto_count(), 1);

        assert!(r.hide(2));
        assert!(!r.is_visible(2));
        assert!(r.is_visible(3));
        assert_eq!(r.auto_count(), 0);
        assert_eq!(r.n_visible() + r.n_hidden(), r.len());
    }

    #[test_case(true; "already visible")]
    #[test_case(false; "unknown key")]
    #[test]
    fn invalid_show_is_refused(known: bool) {
        let mut r = registry(2);
        r.show(0);
        let k = if known { 0 } else { 42 };

        assert!(!r.show(k));
        assert_eq!(r.n_visible(), 1);
    }

    #[test]
    fn remove_refuses_visible_entries() {
        let mut r = registry(2);
        r.show(1);

        assert_eq!(r.remove(1), None);
        assert_eq!(r.remove(0), Some(E(0, true)));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn auto_count_is_clamped_at_zero() {
        let mut r = registry(1);
        r.release_auto();

        assert_eq!(r.auto_count(), 0);
    }

    #[test]
    fn find_visible_ignores_hidden_entries() {
        let mut r = registry(3);
        r.show(1);

        assert!(r.find_visible(|e| e.0 == 1).is_some());
        assert!(r.find_visible(|e| e.0 == 2).is_none());
    }

    // Each op is (key, show?) applied in sequence: the partition flags must always agree with
    // the counts regardless of how many of the operations are invalid.
    #[quickcheck]
    fn partition_counts_always_agree(ops: Vec<(u8, bool)>) -> bool {
        let mut r = registry(8);
        let mut visible = [false; 8];

        for (k, show) in ops {
            let k = k % 10;
            if show {
                if r.show(k) {
                    visible[k as usize] = true;
                }
            } else if r.hide(k) {
                visible[k as usize] = false;
            }

            let n = visible.iter().filter(|&&v| v).count();
            if n != r.n_visible() || r.n_visible() + r.n_hidden() != r.len() {
                return false;
            }
            if (0..8).any(|i| r.is_visible(i) != visible[i as usize]) {
                return false;
            }
        }

        true
    }
}
