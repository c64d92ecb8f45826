//! Core ID types for keyframes and their fragments.

/// Unique identifier of a KeyFrame, as assigned by the upstream tracker.
///
/// Ids are monotonic within a session. They key the fragment log, so a fragment
/// can be found again when the tracker later reports a corrected pose for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyFrameId(pub u64);

impl KeyFrameId {
    /// Create a new KeyFrameId with the given value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// True when this keyframe is selected by an `id % modulus == 0` decimation.
    ///
    /// A modulus of 0 or 1 selects every keyframe.
    pub fn is_multiple_of(&self, modulus: u64) -> bool {
        modulus <= 1 || self.0 % modulus == 0
    }
}

impl std::fmt::Display for KeyFrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KF{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyframe_id_equality() {
        let id1 = KeyFrameId::new(42);
        let id2 = KeyFrameId::new(42);
        let id3 = KeyFrameId::new(43);

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_keyframe_id_display() {
        assert_eq!(format!("{}", KeyFrameId::new(123)), "KF123");
    }

    #[test]
    fn test_decimation_selection() {
        let selected: Vec<u64> = (0..12)
            .map(KeyFrameId::new)
            .filter(|id| id.is_multiple_of(5))
            .map(|id| id.0)
            .collect();
        assert_eq!(selected, vec![0, 5, 10]);

        assert!(KeyFrameId::new(7).is_multiple_of(1));
        assert!(KeyFrameId::new(7).is_multiple_of(0));
    }
}
