//! Adversarial instance generator.
//!
//! Synthesizes small [`PatchGraph`] instances whose topology defeats
//! single-step marginal-gain greedy restoration policies under a fixed
//! budget, for regression-testing downstream solvers. No threat splitting
//! happens here; the difficulty comes purely from where weight sits and
//! which zero-probability links gate it.

use tracing::info;

use crate::error::{GeneratorError, ModelError};
use crate::model::{ActionElement, PatchGraph, PatchId, RestorationAction};

/// Default weight for decoy and relay patches, and the keystone's bonus.
pub const DEFAULT_EPSILON: f64 = 1e-4;

/// Which greedy weakness the generated instance exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorstCaseKind {
    /// Defeats a greedy policy that adds elements under a growing budget.
    Incremental,
    /// Defeats a greedy policy that removes elements from the full graph.
    Decremental,
    /// One instance challenging both policies at once, sharing a hub.
    Combined,
}

/// Configures and runs the adversarial instance construction.
///
/// All three kinds share the same primitives: patches with dense ids, and
/// undirected probability-0 links each paired with a cost-1 restoration
/// action enabling both directions.
///
/// # Examples
/// ```
/// use landgraph_core::{WorstCaseGenerator, WorstCaseKind};
///
/// let graph = WorstCaseGenerator::new(WorstCaseKind::Incremental)
///     .with_budget(2)
///     .generate()?;
/// assert_eq!(graph.patches().len(), 7);
/// graph.validate()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct WorstCaseGenerator {
    kind: WorstCaseKind,
    budget: u64,
    epsilon: f64,
}

impl WorstCaseGenerator {
    /// Creates a generator with budget 1 and the default epsilon.
    #[must_use]
    pub fn new(kind: WorstCaseKind) -> Self {
        Self {
            kind,
            budget: 1,
            epsilon: DEFAULT_EPSILON,
        }
    }

    /// Sets the greedy budget the construction is scaled to.
    #[must_use]
    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = budget;
        self
    }

    /// Overrides the decoy/relay weight (and the keystone's bonus).
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Returns the configured kind.
    #[must_use]
    pub fn kind(&self) -> WorstCaseKind {
        self.kind
    }

    /// Builds the instance.
    ///
    /// Identical parameters always produce an identical graph.
    ///
    /// # Errors
    /// Returns [`GeneratorError`] when the budget is zero, epsilon is
    /// outside `(0, 1)`, or a model invariant is violated while assembling
    /// the instance.
    #[tracing::instrument(skip_all, fields(kind = ?self.kind, budget = self.budget))]
    pub fn generate(&self) -> Result<PatchGraph, GeneratorError> {
        if self.budget == 0 {
            return Err(GeneratorError::InvalidBudget { got: self.budget });
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 || self.epsilon >= 1.0 {
            return Err(GeneratorError::InvalidEpsilon { got: self.epsilon });
        }

        let mut instance = Instance::default();
        match self.kind {
            WorstCaseKind::Incremental => self.incremental(&mut instance)?,
            WorstCaseKind::Decremental => self.decremental(&mut instance)?,
            WorstCaseKind::Combined => self.combined(&mut instance)?,
        }

        let graph = instance.graph;
        info!(
            patches = graph.patches().len(),
            links = graph.links().len(),
            "worst-case instance generated"
        );
        Ok(graph)
    }

    /// Hub, an alternating ring of real (weight 1) and decoy (weight ε)
    /// patches, and weight-0 gates so that every real patch sits behind a
    /// hub -> gate -> real two-hop path with no partial payoff.
    fn incremental(&self, instance: &mut Instance) -> Result<(), ModelError> {
        let budget = self.budget;
        let hub = instance.add_patch(1.0, 0.0, 0.0)?;
        for (i, (x, y)) in regular_vertices(2 * budget, 2.0).into_iter().enumerate() {
            if i % 2 == 0 {
                instance.add_patch(1.0, x, y)?;
            } else {
                let decoy = instance.add_patch(self.epsilon, x / 2.0, y / 2.0)?;
                instance.add_link(hub, decoy)?;
            }
        }
        for (i, (x, y)) in regular_vertices(2 * budget, 1.0).into_iter().enumerate() {
            if i % 2 == 0 {
                let gate = instance.add_patch(0.0, x, y)?;
                instance.add_link(hub, gate)?;
                instance.add_link(gate, PatchId::new(1 + i as u64))?;
            }
        }
        Ok(())
    }

    /// Hub plus satellites on a circle, one of them a keystone worth
    /// `1 + ε`, reachable only through a relay chain whose members each look
    /// individually worthless to a remove-the-least-valuable policy.
    fn decremental(&self, instance: &mut Instance) -> Result<(), ModelError> {
        let budget = self.budget;
        let hub = instance.add_patch(1.0, 0.0, 0.0)?;
        let mut keystone = hub;
        for (i, (x, y)) in regular_vertices(budget + 1, budget as f64)
            .into_iter()
            .enumerate()
        {
            if i == 0 {
                keystone = instance.add_patch(1.0 + self.epsilon, x, y)?;
            } else {
                let satellite = instance.add_patch(1.0, x, y)?;
                instance.add_link(hub, satellite)?;
            }
        }
        let mut previous = hub;
        for i in 0..budget.saturating_sub(1) {
            let relay = instance.add_patch(0.0, (i + 1) as f64, 0.0)?;
            instance.add_link(previous, relay)?;
            previous = relay;
        }
        instance.add_link(previous, keystone)?;
        Ok(())
    }

    /// Both constructions composed around one hub: the keystone's relay
    /// chain scaled to `2·budget − 1` hops and gated satellites on an inner
    /// ring.
    fn combined(&self, instance: &mut Instance) -> Result<(), ModelError> {
        let budget = self.budget;
        let scale = budget as f64;
        let hub = instance.add_patch(1.0, 0.0, 0.0)?;
        let mut keystone = hub;
        for (i, (x, y)) in regular_vertices(budget + 1, 2.0 * scale)
            .into_iter()
            .enumerate()
        {
            if i == 0 {
                keystone = instance.add_patch(1.0 + self.epsilon, x, y)?;
            } else {
                instance.add_patch(1.0, x / scale, y / scale)?;
            }
        }
        let mut previous = hub;
        for i in 0..(2 * budget - 1) {
            let relay = instance.add_patch(self.epsilon, (i + 1) as f64, 0.0)?;
            instance.add_link(previous, relay)?;
            previous = relay;
        }
        instance.add_link(previous, keystone)?;
        for (i, (x, y)) in regular_vertices(budget + 1, scale).into_iter().enumerate() {
            if i != 0 {
                let gate = instance.add_patch(0.0, x / scale, y / scale)?;
                instance.add_link(hub, gate)?;
                instance.add_link(gate, PatchId::new(i as u64 + 1))?;
            }
        }
        Ok(())
    }
}

/// Shared emission state for one generated instance.
#[derive(Debug, Default)]
struct Instance {
    graph: PatchGraph,
}

impl Instance {
    fn add_patch(&mut self, weight: f64, x: f64, y: f64) -> Result<PatchId, ModelError> {
        self.graph.add_patch(weight, x, y)
    }

    /// Mirrored probability-0 pair plus the cost-1 action enabling both
    /// directions; every link in a generated instance goes through here so
    /// the link/action pairing cannot drift between kinds.
    fn add_link(&mut self, a: PatchId, b: PatchId) -> Result<(), ModelError> {
        self.graph.add_link_pair(a, b, 0.0)?;
        self.graph.add_action(RestorationAction {
            cost: 1,
            elements: vec![
                ActionElement::ArcCapacity {
                    source: a,
                    target: b,
                    capacity: 1,
                },
                ActionElement::ArcCapacity {
                    source: b,
                    target: a,
                    capacity: 1,
                },
            ],
        })
    }
}

/// Places `n` points evenly on a circle of the given radius, 0-indexed by
/// angle `2π·i/n`.
#[must_use]
pub fn regular_vertices(n: u64, radius: f64) -> Vec<(f64, f64)> {
    let angle = 2.0 * std::f64::consts::PI / n as f64;
    (0..n)
        .map(|i| {
            let theta = i as f64 * angle;
            (radius * theta.cos(), radius * theta.sin())
        })
        .collect()
}
