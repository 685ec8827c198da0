use serde::{Deserialize, Serialize};

/// Level text read from a card, e.g. "23/80".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelReading {
    pub level: u32,
    /// Maximum level rounded to the nearest multiple of ten
    pub max_level: u32,
    /// The item has passed an ascension cap below its current maximum
    pub ascended: bool,
}

/// One catalogued weapon.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponRecord {
    /// Position in scan order
    pub id: u32,
    pub name: Option<String>,
    pub level: Option<u32>,
    pub ascended: bool,
    pub refinement: Option<u32>,
    pub equipped_owner: Option<String>,
    /// 1-5 stars; `None` if the rarity color wasn't recognized
    pub rarity: Option<u8>,
}

impl WeaponRecord {
    pub fn is_equipped(&self) -> bool {
        self.equipped_owner.is_some()
    }
}
