//! Special-state transitions (spec.md §4.2): the N-B-{L,G}-...-E-J/C-T frame
//! that sits outside the per-position M/I/D lanes.
use std::fmt;

/// A special state that owns a `[LOOP, MOVE]` transition pair in `xsc`.
///
/// `B`'s pair is reused to mean "enter local" / "enter glocal" rather than
/// literal looping, matching spec.md §4.2 ("B distributes probability
/// between L and G via xsc[B][0] and xsc[B][1]"). `E`'s pair is reused the
/// same way: `xsc[E][Loop]` is `E -> J` (another domain follows) and
/// `xsc[E][Move]` is `E -> C` (terminal flank). Unihit profiles fix
/// `xsc[E][Loop] = -inf`, `xsc[E][Move] = 0.0` so the split is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SpecialState {
    N = 0,
    E = 1,
    J = 2,
    B = 3,
    C = 4,
}

pub const NUM_SPECIAL_STATES: usize = 5;

impl fmt::Display for SpecialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecialState::N => "N",
            SpecialState::E => "E",
            SpecialState::J => "J",
            SpecialState::B => "B",
            SpecialState::C => "C",
        })
    }
}

/// Slot within a special state's transition pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XscSlot {
    /// `N`/`C`/`J`: stay in the flank, absorbing a residue. `B`: enter the
    /// local lane.
    Loop = 0,
    /// `N`/`C`/`J`: leave the flank toward `B`/`T`. `B`: enter the glocal
    /// lane.
    Move = 1,
}

/// `xsc[s][slot]`, a dense `5 x 2` table of special-state transition scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecialTransitions {
    table: [[f32; 2]; NUM_SPECIAL_STATES],
}

impl SpecialTransitions {
    #[must_use]
    pub fn new(table: [[f32; 2]; NUM_SPECIAL_STATES]) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn get(&self, state: SpecialState, slot: XscSlot) -> f32 {
        self.table[state as usize][slot as usize]
    }

    pub fn set(&mut self, state: SpecialState, slot: XscSlot, value: f32) {
        self.table[state as usize][slot as usize] = value;
    }

    /// `xsc[B][Loop]`: the `B -> L` (enter local lane) log-odds score.
    #[must_use]
    pub fn enter_local(&self) -> f32 {
        self.get(SpecialState::B, XscSlot::Loop)
    }

    /// `xsc[B][Move]`: the `B -> G` (enter glocal lane) log-odds score.
    #[must_use]
    pub fn enter_glocal(&self) -> f32 {
        self.get(SpecialState::B, XscSlot::Move)
    }

    /// `xsc[E][Loop]`: the `E -> J` (another domain follows) log-odds score.
    #[must_use]
    pub fn loop_to_j(&self) -> f32 {
        self.get(SpecialState::E, XscSlot::Loop)
    }

    /// `xsc[E][Move]`: the `E -> C` (terminal flank) log-odds score.
    #[must_use]
    pub fn move_to_c(&self) -> f32 {
        self.get(SpecialState::E, XscSlot::Move)
    }
}
