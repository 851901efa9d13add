//! In-memory patch-graph model shared by the survey builder and the
//! adversarial generators.
//!
//! A [`PatchGraph`] is append-only: patches receive dense sequential ids and
//! are never removed, links are always emitted as mirrored directed pairs,
//! and restoration actions may only reference patches that already exist.
//! The whole model for one run is assembled in memory and then serialized
//! once; there is no mutation after that point.

use std::collections::HashMap;
use std::fmt;

use crate::error::ModelError;

/// Identifier assigned to a patch.
///
/// Ids are dense and zero-based within one graph; once assigned they are
/// never reused.
///
/// # Examples
/// ```
/// use landgraph_core::PatchId;
///
/// let id = PatchId::new(3);
/// assert_eq!(id.get(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId(u64);

impl PatchId {
    /// Creates a new patch identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// Returns the underlying numeric identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A habitat unit node in the connectivity graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Dense zero-based identifier.
    pub id: PatchId,
    /// Quality/area contribution to the downstream connectivity objective.
    pub weight: f64,
    /// Planar x coordinate.
    pub x: f64,
    /// Planar y coordinate.
    pub y: f64,
}

/// A directed dispersal edge with a success probability.
///
/// Every physical adjacency is stored as two `Link` rows with swapped
/// endpoints and identical probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Patch the dispersal starts from.
    pub source: PatchId,
    /// Patch the dispersal arrives at.
    pub target: PatchId,
    /// Dispersal success probability in `[0, 1]`.
    pub probability: f64,
}

/// One purchasable element of a [`RestorationAction`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionElement {
    /// Adds `gain` to the named patch's weight if the action is funded.
    NodeGain {
        /// Patch whose quality is restored.
        patch: PatchId,
        /// Quality added when funded.
        gain: f64,
    },
    /// Enables the named directed arc with the given capacity if funded.
    ArcCapacity {
        /// Source of the enabled arc.
        source: PatchId,
        /// Target of the enabled arc.
        target: PatchId,
        /// Capacity granted to the arc (always 1 in current producers).
        capacity: u64,
    },
}

/// A priced bundle of quality gains and arc activations offered to the
/// downstream optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorationAction {
    /// Price of funding the whole bundle.
    pub cost: u64,
    /// Elements granted together when the action is funded.
    pub elements: Vec<ActionElement>,
}

/// Append-only container for patches, links, and restoration actions.
///
/// # Examples
/// ```
/// use landgraph_core::PatchGraph;
///
/// let mut graph = PatchGraph::new();
/// let a = graph.add_patch(1.0, 0.0, 0.0)?;
/// let b = graph.add_patch(2.5, 1.0, 0.0)?;
/// graph.add_link_pair(a, b, 0.8)?;
/// assert_eq!(graph.patches().len(), 2);
/// assert_eq!(graph.links().len(), 2);
/// graph.validate()?;
/// # Ok::<(), landgraph_core::ModelError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchGraph {
    patches: Vec<Patch>,
    links: Vec<Link>,
    actions: Vec<RestorationAction>,
}

impl PatchGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a patch, assigning the next dense id.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidWeight`] when `weight` is negative or not
    /// finite.
    pub fn add_patch(&mut self, weight: f64, x: f64, y: f64) -> Result<PatchId, ModelError> {
        let id = PatchId::new(self.patches.len() as u64);
        if !weight.is_finite() || weight < 0.0 {
            return Err(ModelError::InvalidWeight { id, weight });
        }
        self.patches.push(Patch { id, weight, x, y });
        Ok(id)
    }

    /// Appends both directions of an undirected adjacency with one shared
    /// probability.
    ///
    /// # Errors
    /// Returns [`ModelError::SelfLoop`] when `a == b`,
    /// [`ModelError::DanglingReference`] when either endpoint has not been
    /// emitted, and [`ModelError::ProbabilityOutOfRange`] when `probability`
    /// is outside `[0, 1]`.
    pub fn add_link_pair(
        &mut self,
        a: PatchId,
        b: PatchId,
        probability: f64,
    ) -> Result<(), ModelError> {
        if a == b {
            return Err(ModelError::SelfLoop { id: a });
        }
        for id in [a, b] {
            if !self.contains(id) {
                return Err(ModelError::DanglingReference { id });
            }
        }
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ModelError::ProbabilityOutOfRange {
                from: a,
                to: b,
                probability,
            });
        }
        self.links.push(Link {
            source: a,
            target: b,
            probability,
        });
        self.links.push(Link {
            source: b,
            target: a,
            probability,
        });
        Ok(())
    }

    /// Appends a restoration action.
    ///
    /// # Errors
    /// Returns [`ModelError::ZeroCostAction`] for a free action,
    /// [`ModelError::EmptyAction`] for an element-less one, and
    /// [`ModelError::DanglingReference`] when an element names a patch that
    /// has not been emitted.
    pub fn add_action(&mut self, action: RestorationAction) -> Result<(), ModelError> {
        let index = self.actions.len();
        if action.cost == 0 {
            return Err(ModelError::ZeroCostAction { index });
        }
        if action.elements.is_empty() {
            return Err(ModelError::EmptyAction { index });
        }
        for element in &action.elements {
            for id in element.referenced_ids() {
                if !self.contains(id) {
                    return Err(ModelError::DanglingReference { id });
                }
            }
        }
        self.actions.push(action);
        Ok(())
    }

    /// Appends a single directed link without its mirror.
    ///
    /// Only the file-set reader uses this; [`Self::validate`] restores the
    /// symmetry guarantee afterwards.
    pub(crate) fn push_raw_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Returns whether `id` names an emitted patch.
    #[must_use]
    pub fn contains(&self, id: PatchId) -> bool {
        id.get() < self.patches.len() as u64
    }

    /// Patches in emission (and id) order.
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Directed links in emission order.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Restoration actions in emission order.
    #[must_use]
    pub fn actions(&self) -> &[RestorationAction] {
        &self.actions
    }

    /// Re-checks every structural invariant on a finished graph.
    ///
    /// The append operations already reject invalid rows; this pass exists
    /// for graphs reconstructed from files and as a test oracle. It verifies
    /// dense ascending ids, weight and probability ranges, referential
    /// integrity, and that every directed link has a mirror row with equal
    /// probability.
    ///
    /// # Errors
    /// Returns the first [`ModelError`] encountered, in emission order.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (position, patch) in self.patches.iter().enumerate() {
            let expected = PatchId::new(position as u64);
            if patch.id != expected {
                return Err(ModelError::NonDenseIds {
                    expected,
                    found: patch.id,
                });
            }
            if !patch.weight.is_finite() || patch.weight < 0.0 {
                return Err(ModelError::InvalidWeight {
                    id: patch.id,
                    weight: patch.weight,
                });
            }
        }

        let mut directed: HashMap<(u64, u64, u64), usize> = HashMap::new();
        for link in &self.links {
            if link.source == link.target {
                return Err(ModelError::SelfLoop { id: link.source });
            }
            for id in [link.source, link.target] {
                if !self.contains(id) {
                    return Err(ModelError::DanglingReference { id });
                }
            }
            if !link.probability.is_finite() || !(0.0..=1.0).contains(&link.probability) {
                return Err(ModelError::ProbabilityOutOfRange {
                    from: link.source,
                    to: link.target,
                    probability: link.probability,
                });
            }
            *directed
                .entry((
                    link.source.get(),
                    link.target.get(),
                    link.probability.to_bits(),
                ))
                .or_insert(0) += 1;
        }
        for link in &self.links {
            let key = (
                link.source.get(),
                link.target.get(),
                link.probability.to_bits(),
            );
            let mirror = (key.1, key.0, key.2);
            if directed.get(&key) != directed.get(&mirror) {
                return Err(ModelError::AsymmetricLink {
                    from: link.source,
                    to: link.target,
                });
            }
        }

        for (index, action) in self.actions.iter().enumerate() {
            if action.cost == 0 {
                return Err(ModelError::ZeroCostAction { index });
            }
            if action.elements.is_empty() {
                return Err(ModelError::EmptyAction { index });
            }
            for element in &action.elements {
                for id in element.referenced_ids() {
                    if !self.contains(id) {
                        return Err(ModelError::DanglingReference { id });
                    }
                }
            }
        }

        Ok(())
    }
}

impl ActionElement {
    /// Patch ids this element refers to.
    #[must_use]
    pub fn referenced_ids(&self) -> Vec<PatchId> {
        match *self {
            Self::NodeGain { patch, .. } => vec![patch],
            Self::ArcCapacity { source, target, .. } => vec![source, target],
        }
    }
}
