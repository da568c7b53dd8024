//! Friend color assignment
//!
//! Gives each friend a stable, visually distinct marker/badge color for
//! the session. Colors come from a fixed ordered palette; an assignment
//! never changes once made, and new friends consume the first unused
//! palette entry. Collisions only become possible once the palette is
//! exhausted and indices wrap around.

use std::collections::HashMap;

use uuid::Uuid;

/// Ordered display palette for friend markers
pub const PALETTE: [&str; 15] = [
    "#1fcece", // teal (app accent)
    "#e74c3c", // red
    "#3498db", // blue
    "#2ecc71", // green
    "#9b59b6", // purple
    "#e67e22", // orange
    "#f1c40f", // yellow
    "#e91e8c", // magenta
    "#16a085", // dark teal
    "#c0392b", // dark red
    "#2980b9", // dark blue
    "#27ae60", // dark green
    "#8e44ad", // dark purple
    "#d35400", // burnt orange
    "#7f8c8d", // gray
];

/// Session-scoped friend-to-color mapping
#[derive(Debug, Clone, Default)]
pub struct FriendColors {
    assigned: HashMap<Uuid, usize>,
}

impl FriendColors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for a friend, assigning one on first sight
    pub fn color_for(&mut self, friend: Uuid) -> &'static str {
        if let Some(index) = self.assigned.get(&friend) {
            return PALETTE[index % PALETTE.len()];
        }

        let index = (0..PALETTE.len())
            .find(|candidate| {
                !self
                    .assigned
                    .values()
                    .any(|used| used % PALETTE.len() == *candidate)
            })
            // palette exhausted: wrap around
            .unwrap_or(self.assigned.len());

        self.assigned.insert(friend, index);
        PALETTE[index % PALETTE.len()]
    }

    /// Colors already handed out, keyed by friend
    pub fn snapshot(&self) -> HashMap<Uuid, String> {
        self.assigned
            .iter()
            .map(|(id, index)| (*id, PALETTE[index % PALETTE.len()].to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_stable_as_friends_are_added() {
        let mut colors = FriendColors::new();
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let ca = colors.color_for(a);
        let cb = colors.color_for(b);
        let cc = colors.color_for(c);

        let cd = colors.color_for(d);

        assert_eq!(colors.color_for(a), ca);
        assert_eq!(colors.color_for(b), cb);
        assert_eq!(colors.color_for(c), cc);
        assert_eq!(cd, PALETTE[3], "new friend takes the first unused color");
    }

    #[test]
    fn first_three_friends_take_palette_head() {
        let mut colors = FriendColors::new();
        assert_eq!(colors.color_for(Uuid::new_v4()), PALETTE[0]);
        assert_eq!(colors.color_for(Uuid::new_v4()), PALETTE[1]);
        assert_eq!(colors.color_for(Uuid::new_v4()), PALETTE[2]);
    }

    #[test]
    fn wraps_after_palette_exhaustion() {
        let mut colors = FriendColors::new();
        for _ in 0..PALETTE.len() {
            colors.color_for(Uuid::new_v4());
        }
        assert_eq!(colors.len(), PALETTE.len());

        // 16th friend wraps to the head of the palette
        assert_eq!(colors.color_for(Uuid::new_v4()), PALETTE[0]);
    }

    #[test]
    fn repeat_lookup_does_not_consume_slots() {
        let mut colors = FriendColors::new();
        let a = Uuid::new_v4();
        colors.color_for(a);
        colors.color_for(a);
        colors.color_for(a);
        assert_eq!(colors.len(), 1);
    }
}
