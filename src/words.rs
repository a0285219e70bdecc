//! Word catalog and board generation.
//!
//! Boards are a pure draw from the selected packs plus the room's custom
//! words: 25 distinct normalized words, 9 for the starting team, 8 for the
//! other, 7 neutral and 1 trap, both draws shuffled.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rand::{Rng, rng, seq::SliceRandom};
use thiserror::Error;

use crate::dao::models::{CardKind, Team};
use crate::state::room::{BOARD_SIZE, BoardCard};

/// Cards assigned to the team that opens the game.
const STARTING_TEAM_CARDS: usize = 9;
/// Cards assigned to the team that goes second.
const SECOND_TEAM_CARDS: usize = 8;
/// Cards that belong to neither team.
const NEUTRAL_CARDS: usize = 7;

const STANDARD_PACK: &[&str] = &[
    "anchor", "apple", "arm", "bank", "barrel", "beach", "bear", "bell", "belt", "board", "bolt",
    "bomb", "bottle", "bow", "bridge", "brush", "button", "camp", "candle", "cap", "car", "card",
    "castle", "cell", "chain", "chair", "charge", "chest", "circle", "cliff", "cloud", "club",
    "coach", "coast", "comb", "compass", "copper", "court", "cover", "crane", "cross", "crown",
    "cycle", "dance", "deck", "diamond", "dice", "draft", "dragon", "dress", "drill", "drop",
    "duck", "eagle", "engine", "fair", "fall", "fan", "field", "figure", "file", "film", "fire",
    "fish", "flag", "flute", "fork", "frame", "game", "gate", "giant", "glass", "glove", "gold",
    "grace", "ground", "hand", "harbor", "hawk", "head", "horn", "horse", "ice", "iron", "jam",
    "key", "king", "kite", "knight", "lab", "lap", "laser", "lead", "lemon", "light", "line",
    "lion", "lock", "log", "march", "mark", "mass", "match", "mill", "mine", "mint", "model",
    "moon", "mount", "mouse", "nail", "needle", "net", "note", "nut", "oil", "olive", "opera",
    "orange", "organ", "palm", "pan", "parachute", "park", "part", "pass", "paste", "pilot",
    "pipe", "pitch", "plane", "plate", "play", "plot", "point", "pool", "port", "post", "pound",
    "press", "pupil", "pyramid", "queen", "rabbit", "racket", "ray", "ring", "robot", "rock",
    "root", "rose", "round", "row", "ruler", "satellite", "scale", "school", "scorpion", "screen",
    "seal", "shadow", "shark", "ship", "shoe", "shop", "shot", "sink", "slip", "snow", "sound",
    "space", "spell", "spider", "spike", "spring", "spy", "stadium", "staff", "star", "state",
    "stick", "stock", "straw", "stream", "strike", "string", "switch", "table", "tail", "tap",
    "telescope", "temple", "theater", "tie", "tiger", "time", "tooth", "torch", "tower", "track",
    "train", "trip", "trunk", "tube", "turkey", "wake", "wall", "watch", "wave", "well", "whale",
    "wheel", "wind", "witch", "yard",
];

const SCIENCE_PACK: &[&str] = &[
    "atom", "axis", "beaker", "carbon", "circuit", "comet", "crystal", "current", "eclipse",
    "electron", "element", "energy", "enzyme", "fossil", "fusion", "galaxy", "gene", "gravity",
    "helium", "lens", "magnet", "meteor", "microscope", "molecule", "nebula", "neuron", "neutron",
    "orbit", "oxygen", "particle", "photon", "plasma", "prism", "proton", "quark", "reactor",
    "rocket", "spectrum", "vaccine", "vacuum", "virus", "volt",
];

const MYTHOLOGY_PACK: &[&str] = &[
    "altar", "cyclops", "centaur", "griffin", "hydra", "kraken", "labyrinth", "medusa", "mermaid",
    "minotaur", "nymph", "oracle", "pegasus", "phantom", "phoenix", "relic", "rune", "siren",
    "sphinx", "sprite", "titan", "trident", "troll", "unicorn", "valkyrie", "wizard", "wraith",
    "yeti",
];

/// Board generation failed before any drawing happened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// A selected pack id does not exist in the catalog.
    #[error("unknown word pack `{0}`")]
    UnknownPack(String),
    /// The union of the selected packs and custom words is too small.
    #[error("need at least {need} distinct words, have {have}")]
    NotEnoughWords { have: usize, need: usize },
}

/// Named word packs available to rooms, keyed by pack id.
#[derive(Debug, Clone)]
pub struct WordCatalog {
    packs: IndexMap<String, Vec<String>>,
}

impl WordCatalog {
    /// Catalog holding only the packs shipped with the binary.
    pub fn builtin() -> Self {
        let mut catalog = Self {
            packs: IndexMap::new(),
        };
        catalog.add_pack("standard", STANDARD_PACK.iter().map(|w| (*w).to_string()));
        catalog.add_pack("science", SCIENCE_PACK.iter().map(|w| (*w).to_string()));
        catalog.add_pack("mythology", MYTHOLOGY_PACK.iter().map(|w| (*w).to_string()));
        catalog
    }

    /// Register or replace a pack. Words are normalized and deduplicated.
    pub fn add_pack(&mut self, id: &str, words: impl IntoIterator<Item = String>) {
        let mut seen = BTreeSet::new();
        let mut normalized = Vec::new();
        for word in words {
            let word = normalize_word(&word);
            if !word.is_empty() && seen.insert(word.clone()) {
                normalized.push(word);
            }
        }
        self.packs.insert(id.to_string(), normalized);
    }

    /// Whether `id` names a pack in this catalog.
    pub fn has_pack(&self, id: &str) -> bool {
        self.packs.contains_key(id)
    }

    /// Ids of every registered pack, in registration order.
    pub fn pack_ids(&self) -> impl Iterator<Item = &str> {
        self.packs.keys().map(String::as_str)
    }

    /// Draw a fresh 25-card board from the selected packs and custom words.
    pub fn generate_board(
        &self,
        packs: &[String],
        custom_words: &[String],
        starting_team: Team,
    ) -> Result<Vec<BoardCard>, BoardError> {
        self.generate_board_with(&mut rng(), packs, custom_words, starting_team)
    }

    /// Same draw with a caller-supplied RNG.
    pub fn generate_board_with(
        &self,
        rng: &mut impl Rng,
        packs: &[String],
        custom_words: &[String],
        starting_team: Team,
    ) -> Result<Vec<BoardCard>, BoardError> {
        let mut pool = BTreeSet::new();
        for id in packs {
            let pack = self
                .packs
                .get(id)
                .ok_or_else(|| BoardError::UnknownPack(id.clone()))?;
            pool.extend(pack.iter().cloned());
        }
        for word in custom_words {
            let word = normalize_word(word);
            if !word.is_empty() {
                pool.insert(word);
            }
        }

        if pool.len() < BOARD_SIZE {
            return Err(BoardError::NotEnoughWords {
                have: pool.len(),
                need: BOARD_SIZE,
            });
        }

        let mut words: Vec<String> = pool.into_iter().collect();
        words.shuffle(rng);
        words.truncate(BOARD_SIZE);

        let mut kinds = Vec::with_capacity(BOARD_SIZE);
        kinds.extend(std::iter::repeat_n(
            CardKind::for_team(starting_team),
            STARTING_TEAM_CARDS,
        ));
        kinds.extend(std::iter::repeat_n(
            CardKind::for_team(starting_team.opposing()),
            SECOND_TEAM_CARDS,
        ));
        kinds.extend(std::iter::repeat_n(CardKind::Neutral, NEUTRAL_CARDS));
        kinds.push(CardKind::Trap);
        kinds.shuffle(rng);

        Ok(words
            .into_iter()
            .zip(kinds)
            .map(|(word, kind)| BoardCard::new(word, kind))
            .collect())
    }
}

/// Canonical form used for board words and clue comparisons.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn standard() -> Vec<String> {
        vec!["standard".to_string()]
    }

    #[test]
    fn board_has_the_right_kind_split() {
        let catalog = WordCatalog::builtin();
        for starting in [Team::Red, Team::Blue] {
            let board = catalog
                .generate_board(&standard(), &[], starting)
                .expect("board");
            assert_eq!(board.len(), BOARD_SIZE);

            let count = |kind: CardKind| board.iter().filter(|c| c.kind == kind).count();
            assert_eq!(count(CardKind::for_team(starting)), STARTING_TEAM_CARDS);
            assert_eq!(
                count(CardKind::for_team(starting.opposing())),
                SECOND_TEAM_CARDS
            );
            assert_eq!(count(CardKind::Neutral), NEUTRAL_CARDS);
            assert_eq!(count(CardKind::Trap), 1);
        }
    }

    #[test]
    fn board_words_are_distinct_and_normalized() {
        let catalog = WordCatalog::builtin();
        let board = catalog
            .generate_board(&standard(), &["  echo chamber  ".to_string()], Team::Red)
            .expect("board");

        let words: BTreeSet<&str> = board.iter().map(|c| c.word.as_str()).collect();
        assert_eq!(words.len(), BOARD_SIZE);
        for word in &words {
            assert_eq!(**word, normalize_word(word));
        }
    }

    #[test]
    fn unknown_pack_is_rejected() {
        let catalog = WordCatalog::builtin();
        let err = catalog
            .generate_board(&["nonsense".to_string()], &[], Team::Red)
            .unwrap_err();
        assert_eq!(err, BoardError::UnknownPack("nonsense".to_string()));
    }

    #[test]
    fn too_small_a_pool_is_rejected() {
        let catalog = WordCatalog::builtin();
        let custom: Vec<String> = (0..10).map(|i| format!("word{i}")).collect();
        let err = catalog.generate_board(&[], &custom, Team::Blue).unwrap_err();
        assert_eq!(
            err,
            BoardError::NotEnoughWords {
                have: 10,
                need: BOARD_SIZE
            }
        );
    }

    #[test]
    fn custom_words_overlapping_a_pack_count_once() {
        let mut catalog = WordCatalog::builtin();
        catalog.add_pack("tiny", (0..24).map(|i| format!("word{i}")));

        // 24 pack words + 1 duplicate custom word stays below the minimum.
        let duplicate = vec!["WORD0".to_string()];
        let err = catalog
            .generate_board(&["tiny".to_string()], &duplicate, Team::Red)
            .unwrap_err();
        assert_eq!(
            err,
            BoardError::NotEnoughWords {
                have: 24,
                need: BOARD_SIZE
            }
        );

        // One genuinely new word tips it over.
        let fresh = vec!["word24".to_string()];
        let board = catalog
            .generate_board(&["tiny".to_string()], &fresh, Team::Red)
            .expect("board");
        assert_eq!(board.len(), BOARD_SIZE);
    }

    #[test]
    fn draw_is_deterministic_for_a_seed_and_varies_across_seeds() {
        let catalog = WordCatalog::builtin();
        let draw = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            catalog
                .generate_board_with(&mut rng, &standard(), &[], Team::Red)
                .expect("board")
        };

        let first = draw(7);
        assert_eq!(first, draw(7));

        let words = |board: &[BoardCard]| {
            board
                .iter()
                .map(|c| c.word.clone())
                .collect::<Vec<String>>()
        };
        assert_ne!(words(&first), words(&draw(8)));
    }
}
