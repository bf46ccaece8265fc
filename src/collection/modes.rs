use std::time::Duration;

/// A named capture condition with its own filename prefix and quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionMode {
    pub name: &'static str,
    pub prefix: &'static str,
}

/// Capture conditions, in collection order
pub const COLLECTION_MODES: &[CollectionMode] = &[
    CollectionMode {
        name: "right_hand_good_light",
        prefix: "md_lb",
    },
    CollectionMode {
        name: "right_hand_poor_light",
        prefix: "md_ls",
    },
];

/// Originals to collect per (class, mode)
pub const TARGET_PER_MODE: usize = 1000;

/// Minimum interval between two saves
pub const SAVE_COOLDOWN: Duration = Duration::from_millis(25);

/// Collector parameters; the binary always uses [`CollectorSettings::default`]
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub modes: Vec<CollectionMode>,
    pub target: usize,
    pub cooldown: Duration,
}

impl CollectorSettings {
    pub fn mode(&self, index: usize) -> CollectionMode {
        self.modes[index % self.modes.len()]
    }

    /// Files needed to complete a class: every mode, originals plus mirrors
    pub fn total_needed(&self) -> usize {
        self.modes.len() * self.target * 2
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            modes: COLLECTION_MODES.to_vec(),
            target: TARGET_PER_MODE,
            cooldown: SAVE_COOLDOWN,
        }
    }
}
