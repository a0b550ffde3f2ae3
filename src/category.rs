use std::fmt;

/// Number of wheel categories
pub const NUM_CATEGORIES: usize = 8;

/// Background track played while the wheel spins
pub const SPIN_MUSIC: &str = "si_music.mp3";

/// Wheel segment selected by the dominant motion axis.
///
/// The order matches the classifier's averages: index 0 is whole-x linear
/// acceleration, 1..=4 the signed y/z halves, 5..=7 the angular rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Environmental,
    Emotional,
    Physical,
    Financial,
    Spiritual,
    Intellectual,
    Social,
    Occupational,
}

impl Category {
    pub const ALL: [Category; NUM_CATEGORIES] = [
        Category::Environmental,
        Category::Emotional,
        Category::Physical,
        Category::Financial,
        Category::Spiritual,
        Category::Intellectual,
        Category::Social,
        Category::Occupational,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Environmental => "environmental",
            Self::Emotional => "emotional",
            Self::Physical => "physical",
            Self::Financial => "financial",
            Self::Spiritual => "spiritual",
            Self::Intellectual => "intellectual",
            Self::Social => "social",
            Self::Occupational => "occupational",
        }
    }

    /// Indicator angle in whole degrees, measured clockwise from the home mark
    pub fn stop_angle(self) -> u32 {
        match self {
            Self::Environmental => 26,
            Self::Emotional => 70,
            Self::Physical => 114,
            Self::Financial => 158,
            Self::Spiritual => 202,
            Self::Intellectual => 246,
            Self::Social => 290,
            Self::Occupational => 334,
        }
    }

    /// Audio cue file announcing this category
    pub fn cue(self) -> &'static str {
        match self {
            Self::Environmental => "Environmental.mp3",
            Self::Emotional => "Emotional.mp3",
            Self::Physical => "Physical.mp3",
            Self::Financial => "Financial.mp3",
            Self::Spiritual => "Spiritual.mp3",
            Self::Intellectual => "Intellectual.mp3",
            Self::Social => "Social.mp3",
            Self::Occupational => "Occupational.mp3",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
