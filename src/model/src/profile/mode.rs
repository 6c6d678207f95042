//! Alignment mode: the independent axes spec.md §3 bundles into one `mode`
//! tag (`{local-only, glocal-only, dual, unihit, multihit, length-L,
//! length-0}`).
//!
//! Open Question (recorded per spec.md §9 / DESIGN.md): the legacy `mode`
//! tag conflates three independent choices. We decompose it into three
//! explicit fields rather than guess at a single flat enum's encoding, since
//! the spec never states that e.g. `dual` and `multihit` are mutually
//! exclusive (they are not -- a profile can be both).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    LocalOnly,
    GlocalOnly,
    Dual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    /// At most one domain per target sequence.
    Unihit,
    /// Any number of domains (the `J`-state reconnection loop is live).
    Multihit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthModel {
    /// Geometric length distribution calibrated to a specific target length.
    LengthL,
    /// Degenerate length-0 model used by the enumerable brute-force tests
    /// (spec.md §8 P5/S2/S5).
    LengthZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mode {
    pub topology: Topology,
    pub multiplicity: Multiplicity,
    pub length_model: LengthModel,
}

impl Mode {
    #[must_use]
    pub fn new(topology: Topology, multiplicity: Multiplicity, length_model: LengthModel) -> Self {
        Self { topology, multiplicity, length_model }
    }

    #[must_use]
    pub fn allows_local(&self) -> bool {
        !matches!(self.topology, Topology::GlocalOnly)
    }

    #[must_use]
    pub fn allows_glocal(&self) -> bool {
        !matches!(self.topology, Topology::LocalOnly)
    }

    #[must_use]
    pub fn is_multihit(&self) -> bool {
        matches!(self.multiplicity, Multiplicity::Multihit)
    }
}
