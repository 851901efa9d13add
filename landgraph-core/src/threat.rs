//! Threat-splitting graph builder.
//!
//! Consumes raw survey vertices and edges and emits a [`PatchGraph`] in
//! which threatened patches are degraded and, for fully threatened ones,
//! doubled into a split-node pair: the base patch keeps the degraded weight
//! while a zero-weight twin is wired to it by a probability-0 link whose
//! activation (bundled with the quality gain) is sold to the optimizer as a
//! single cost-2 restoration action.

use tracing::{debug, info, warn};

use crate::error::ThreatError;
use crate::model::{ActionElement, PatchGraph, PatchId, RestorationAction};
use crate::survey::{Bounds, SurveyEdge, SurveyVertex, filter_vertices};

/// Default positional offset applied to split-node coordinates.
///
/// Purely cosmetic: it keeps the twin from sitting exactly on top of the
/// base patch in downstream plots.
pub const DEFAULT_SPLIT_OFFSET: f64 = 0.01;

/// Threat classification of one surviving survey vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ThreatState {
    /// `menace == 0`: the patch is emitted untouched.
    Intact,
    /// `0 < menace < 100`: degraded in place, restorable for cost 1.
    Partial {
        /// Quality restored when the action is funded.
        gain: f64,
    },
    /// `menace == 100`: degraded and doubled into a split-node pair.
    Split {
        /// Id reserved for the zero-weight twin.
        internal: PatchId,
    },
}

/// Configures and runs the threat-splitting transformation.
///
/// # Examples
/// ```
/// use landgraph_core::{ThreatGraphBuilder, SurveyVertex};
///
/// let vertices = vec![SurveyVertex {
///     external: 1,
///     area: 10.0,
///     count2050: 4.0,
///     menace: 100.0,
///     x: 0.0,
///     y: 0.0,
/// }];
/// let graph = ThreatGraphBuilder::new().build_graph(&vertices, &[])?;
/// assert_eq!(graph.patches().len(), 2);
/// assert_eq!(graph.actions().len(), 1);
/// # Ok::<(), landgraph_core::ThreatError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ThreatGraphBuilder {
    split_offset: f64,
    bounds: Option<Bounds>,
}

impl Default for ThreatGraphBuilder {
    fn default() -> Self {
        Self {
            split_offset: DEFAULT_SPLIT_OFFSET,
            bounds: None,
        }
    }
}

impl ThreatGraphBuilder {
    /// Creates a builder with the default split offset and no bounding
    /// window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the positional offset applied to split-node coordinates.
    #[must_use]
    pub fn with_split_offset(mut self, offset: f64) -> Self {
        self.split_offset = offset;
        self
    }

    /// Restricts the survey to vertices inside `bounds` before building.
    ///
    /// Surviving vertices are renumbered densely; edges touching a filtered
    /// vertex are dropped.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Returns the configured split offset.
    #[must_use]
    pub fn split_offset(&self) -> f64 {
        self.split_offset
    }

    /// Runs the transformation over one survey.
    ///
    /// Output is a pure function of input row order: patches are emitted in
    /// vertex order (split twins appended after all base patches), links in
    /// edge order (the connecting probability-0 pairs last), and actions in
    /// vertex order with the cost-2 split actions last.
    ///
    /// # Errors
    /// Returns [`ThreatError`] for an invalid configuration, an edge naming
    /// a vertex absent from the survey, or a model invariant violation.
    #[tracing::instrument(skip_all, fields(vertices = vertices.len(), edges = edges.len()))]
    pub fn build_graph(
        &self,
        vertices: &[SurveyVertex],
        edges: &[SurveyEdge],
    ) -> Result<PatchGraph, ThreatError> {
        if !self.split_offset.is_finite() {
            return Err(ThreatError::NonFiniteOffset {
                got: self.split_offset,
            });
        }

        let (kept, ids) = filter_vertices(vertices, self.bounds.as_ref());
        let base_count = kept.len() as u64;
        let mut graph = PatchGraph::new();

        // Base patches, classified; split twins get ids after all base ids.
        let mut states = Vec::with_capacity(kept.len());
        let mut recorded_splits = 0u64;
        for row in &kept {
            let state = if row.menace == 0.0 {
                graph.add_patch(row.area, row.x, row.y)?;
                ThreatState::Intact
            } else {
                let gain = row.area - row.count2050;
                if gain < 0.0 {
                    warn!(
                        external = row.external,
                        gain, "2050 projection exceeds present quality; negative gain"
                    );
                }
                graph.add_patch(row.count2050, row.x, row.y)?;
                if row.menace < 100.0 {
                    ThreatState::Partial { gain }
                } else {
                    let internal = PatchId::new(base_count + recorded_splits);
                    recorded_splits += 1;
                    ThreatState::Split { internal }
                }
            };
            states.push(state);
        }

        // Partial-threat actions, in vertex order.
        for (dense, state) in states.iter().enumerate() {
            if let ThreatState::Partial { gain } = *state {
                graph.add_action(RestorationAction {
                    cost: 1,
                    elements: vec![ActionElement::NodeGain {
                        patch: PatchId::new(dense as u64),
                        gain,
                    }],
                })?;
            }
        }

        // Split twins, in vertex order, so their ids follow the base block.
        for (row, state) in kept.iter().zip(&states) {
            if let ThreatState::Split { internal } = *state {
                let assigned = graph.add_patch(0.0, row.x + self.split_offset, row.y)?;
                debug_assert_eq!(assigned, internal);
            }
        }

        // Survey edges; each endpoint is redirected to its twin when split.
        for edge in edges {
            let from = ids.resolve(edge.from)?;
            let to = ids.resolve(edge.to)?;
            let (Some(from), Some(to)) = (from, to) else {
                debug!(from = edge.from, to = edge.to, "dropping edge to filtered vertex");
                continue;
            };
            let a = effective_endpoint(from, &states);
            let b = effective_endpoint(to, &states);
            graph.add_link_pair(a, b, edge.probability)?;
        }

        // Connecting links and cost-2 actions for every split pair.
        let mut finalized = 0u64;
        for (dense, state) in states.iter().enumerate() {
            let ThreatState::Split { internal } = *state else {
                continue;
            };
            let base = PatchId::new(dense as u64);
            let row = kept[dense];
            graph.add_link_pair(internal, base, 0.0)?;
            graph.add_action(RestorationAction {
                cost: 2,
                elements: vec![
                    ActionElement::NodeGain {
                        patch: base,
                        gain: row.area - row.count2050,
                    },
                    ActionElement::ArcCapacity {
                        source: internal,
                        target: base,
                        capacity: 1,
                    },
                ],
            })?;
            finalized += 1;
        }
        if finalized != recorded_splits {
            return Err(ThreatError::SplitStateMismatch {
                recorded: recorded_splits as usize,
                finalized: finalized as usize,
            });
        }

        info!(
            patches = graph.patches().len(),
            links = graph.links().len(),
            actions = graph.actions().len(),
            splits = finalized,
            "threat-splitting transform complete"
        );
        Ok(graph)
    }
}

/// Resolves a dense vertex id to the endpoint links should use.
fn effective_endpoint(id: PatchId, states: &[ThreatState]) -> PatchId {
    match states.get(id.get() as usize) {
        Some(ThreatState::Split { internal }) => *internal,
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use rstest::rstest;

    fn vertex(
        external: u64,
        area: f64,
        count2050: f64,
        menace: f64,
        x: f64,
        y: f64,
    ) -> SurveyVertex {
        SurveyVertex {
            external,
            area,
            count2050,
            menace,
            x,
            y,
        }
    }

    fn edge(from: u64, to: u64, probability: f64) -> SurveyEdge {
        SurveyEdge {
            from,
            to,
            probability,
        }
    }

    #[test]
    fn fully_threatened_vertex_becomes_split_pair() {
        let vertices = vec![vertex(1, 10.0, 4.0, 100.0, 0.0, 0.0)];
        let graph = ThreatGraphBuilder::new()
            .build_graph(&vertices, &[])
            .expect("build");

        let patches: Vec<(u64, f64, f64, f64)> = graph
            .patches()
            .iter()
            .map(|p| (p.id.get(), p.weight, p.x, p.y))
            .collect();
        assert_eq!(patches, vec![(0, 4.0, 0.0, 0.0), (1, 0.0, 0.01, 0.0)]);

        let links: Vec<(u64, u64, f64)> = graph
            .links()
            .iter()
            .map(|l| (l.source.get(), l.target.get(), l.probability))
            .collect();
        assert!(links.contains(&(0, 1, 0.0)));
        assert!(links.contains(&(1, 0, 0.0)));
        assert_eq!(links.len(), 2);

        assert_eq!(graph.actions().len(), 1);
        let action = &graph.actions()[0];
        assert_eq!(action.cost, 2);
        assert_eq!(
            action.elements,
            vec![
                ActionElement::NodeGain {
                    patch: PatchId::new(0),
                    gain: 6.0,
                },
                ActionElement::ArcCapacity {
                    source: PatchId::new(1),
                    target: PatchId::new(0),
                    capacity: 1,
                },
            ]
        );
    }

    #[test]
    fn untouched_survey_replays_as_a_no_op() {
        let vertices = vec![
            vertex(1, 10.0, 4.0, 0.0, 0.0, 0.0),
            vertex(2, 7.0, 7.0, 0.0, 1.0, 1.0),
        ];
        let edges = vec![edge(1, 2, 0.8)];
        let graph = ThreatGraphBuilder::new()
            .build_graph(&vertices, &edges)
            .expect("build");

        assert_eq!(graph.patches().len(), 2);
        assert_eq!(graph.patches()[0].weight, 10.0);
        assert_eq!(graph.patches()[1].weight, 7.0);
        assert!(graph.actions().is_empty());
        let links: Vec<(u64, u64, f64)> = graph
            .links()
            .iter()
            .map(|l| (l.source.get(), l.target.get(), l.probability))
            .collect();
        assert_eq!(links, vec![(0, 1, 0.8), (1, 0, 0.8)]);
        graph.validate().expect("valid");
    }

    #[test]
    fn partially_threatened_vertex_degrades_in_place() {
        let vertices = vec![vertex(1, 10.0, 4.0, 40.0, 2.0, 3.0)];
        let graph = ThreatGraphBuilder::new()
            .build_graph(&vertices, &[])
            .expect("build");

        assert_eq!(graph.patches().len(), 1);
        assert_eq!(graph.patches()[0].weight, 4.0);
        assert!(graph.links().is_empty());
        assert_eq!(graph.actions().len(), 1);
        let action = &graph.actions()[0];
        assert_eq!(action.cost, 1);
        assert_eq!(
            action.elements,
            vec![ActionElement::NodeGain {
                patch: PatchId::new(0),
                gain: 6.0,
            }]
        );
    }

    #[test]
    fn negative_gain_is_accepted() {
        // count2050 above area is suspicious but not rejected.
        let vertices = vec![vertex(1, 4.0, 10.0, 50.0, 0.0, 0.0)];
        let graph = ThreatGraphBuilder::new()
            .build_graph(&vertices, &[])
            .expect("build");
        assert_eq!(
            graph.actions()[0].elements,
            vec![ActionElement::NodeGain {
                patch: PatchId::new(0),
                gain: -6.0,
            }]
        );
    }

    #[test]
    fn split_count_matches_cost_two_action_count() {
        let vertices = vec![
            vertex(1, 10.0, 4.0, 100.0, 0.0, 0.0),
            vertex(2, 8.0, 8.0, 0.0, 1.0, 0.0),
            vertex(3, 6.0, 2.0, 100.0, 2.0, 0.0),
            vertex(4, 9.0, 5.0, 30.0, 3.0, 0.0),
        ];
        let graph = ThreatGraphBuilder::new()
            .build_graph(&vertices, &[])
            .expect("build");
        let full_threats = vertices.iter().filter(|v| v.menace == 100.0).count();
        let cost_two = graph.actions().iter().filter(|a| a.cost == 2).count();
        assert_eq!(full_threats, 2);
        assert_eq!(cost_two, full_threats);
        // Twins are numbered after every base id, in vertex order.
        assert_eq!(graph.patches()[4].x, 0.01);
        assert_eq!(graph.patches()[5].x, 2.01);
    }

    #[test]
    fn edges_are_redirected_to_split_twins() {
        let vertices = vec![
            vertex(1, 10.0, 10.0, 0.0, 0.0, 0.0),
            vertex(2, 10.0, 4.0, 100.0, 1.0, 0.0),
        ];
        let edges = vec![edge(1, 2, 0.7)];
        let graph = ThreatGraphBuilder::new()
            .build_graph(&vertices, &edges)
            .expect("build");

        // Twin of vertex 2 is patch 2; the survey edge attaches to it.
        let links: Vec<(u64, u64, f64)> = graph
            .links()
            .iter()
            .map(|l| (l.source.get(), l.target.get(), l.probability))
            .collect();
        assert_eq!(
            links,
            vec![(0, 2, 0.7), (2, 0, 0.7), (2, 1, 0.0), (1, 2, 0.0)]
        );
        graph.validate().expect("valid");
    }

    #[test]
    fn edge_between_two_split_twins_redirects_both_ends() {
        let vertices = vec![
            vertex(1, 10.0, 4.0, 100.0, 0.0, 0.0),
            vertex(2, 8.0, 3.0, 100.0, 1.0, 0.0),
        ];
        let edges = vec![edge(1, 2, 0.5)];
        let graph = ThreatGraphBuilder::new()
            .build_graph(&vertices, &edges)
            .expect("build");
        let survey_links: Vec<(u64, u64)> = graph
            .links()
            .iter()
            .filter(|l| l.probability == 0.5)
            .map(|l| (l.source.get(), l.target.get()))
            .collect();
        assert_eq!(survey_links, vec![(2, 3), (3, 2)]);
    }

    #[test]
    fn edges_touching_filtered_vertices_are_dropped() {
        let vertices = vec![
            vertex(1, 10.0, 10.0, 0.0, 0.0, 0.0),
            vertex(2, 10.0, 10.0, 0.0, 50.0, 50.0),
        ];
        let edges = vec![edge(1, 2, 0.9)];
        let window = Bounds {
            x_min: 0.0,
            x_max: 1.0,
            y_min: 0.0,
            y_max: 1.0,
        };
        let graph = ThreatGraphBuilder::new()
            .with_bounds(window)
            .build_graph(&vertices, &edges)
            .expect("build");
        assert_eq!(graph.patches().len(), 1);
        assert!(graph.links().is_empty());
    }

    #[test]
    fn edges_to_unknown_vertices_are_fatal() {
        let vertices = vec![vertex(1, 10.0, 10.0, 0.0, 0.0, 0.0)];
        let edges = vec![edge(1, 9, 0.9)];
        let err = ThreatGraphBuilder::new()
            .build_graph(&vertices, &edges)
            .expect_err("unknown endpoint must fail");
        assert!(matches!(
            err,
            ThreatError::Survey(crate::error::SurveyError::UnknownVertex { external: 9 })
        ));
    }

    #[test]
    fn bounding_window_renumbers_survivors() {
        let vertices = vec![
            vertex(1, 1.0, 1.0, 0.0, 0.0, 0.0),
            vertex(2, 2.0, 2.0, 0.0, 50.0, 50.0),
            vertex(3, 3.0, 3.0, 0.0, 1.0, 1.0),
        ];
        let window = Bounds {
            x_min: 0.0,
            x_max: 2.0,
            y_min: 0.0,
            y_max: 2.0,
        };
        let graph = ThreatGraphBuilder::new()
            .with_bounds(window)
            .build_graph(&vertices, &[])
            .expect("build");
        let weights: Vec<f64> = graph.patches().iter().map(|p| p.weight).collect();
        assert_eq!(weights, vec![1.0, 3.0]);
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn non_finite_split_offset_is_rejected(#[case] offset: f64) {
        let err = ThreatGraphBuilder::new()
            .with_split_offset(offset)
            .build_graph(&[], &[])
            .expect_err("offset must be rejected");
        assert!(matches!(err, ThreatError::NonFiniteOffset { .. }));
    }

    #[test]
    fn output_is_deterministic_for_identical_input() {
        let vertices = vec![
            vertex(1, 10.0, 4.0, 100.0, 0.0, 0.0),
            vertex(2, 8.0, 6.0, 50.0, 1.0, 0.0),
            vertex(3, 5.0, 5.0, 0.0, 2.0, 0.0),
        ];
        let edges = vec![edge(1, 2, 0.4), edge(2, 3, 0.6)];
        let builder = ThreatGraphBuilder::new();
        let first = builder.build_graph(&vertices, &edges).expect("first run");
        let second = builder.build_graph(&vertices, &edges).expect("second run");
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn random_surveys_produce_valid_graphs(
            rows in prop::collection::vec((0u8..3, 0.0f64..100.0, 0.0f64..50.0), 1..16),
            edge_seeds in prop::collection::vec((0usize..16, 0usize..16, 0.0f64..=1.0), 0..24),
        ) {
            let vertices: Vec<SurveyVertex> = rows
                .iter()
                .enumerate()
                .map(|(i, &(kind, area, count2050))| {
                    let menace = match kind {
                        0 => 0.0,
                        1 => 50.0,
                        _ => 100.0,
                    };
                    vertex(i as u64 + 1, area, count2050, menace, i as f64, 0.0)
                })
                .collect();
            let n = vertices.len();
            let edges: Vec<SurveyEdge> = edge_seeds
                .iter()
                .filter_map(|&(f, t, probability)| {
                    let from = (f % n) as u64 + 1;
                    let to = (t % n) as u64 + 1;
                    (from != to).then_some(edge(from, to, probability))
                })
                .collect();

            let graph = ThreatGraphBuilder::new()
                .build_graph(&vertices, &edges)
                .expect("build");
            graph.validate().expect("structural invariants hold");

            let full_threats = vertices.iter().filter(|v| v.menace == 100.0).count();
            let cost_two = graph.actions().iter().filter(|a| a.cost == 2).count();
            prop_assert_eq!(full_threats, cost_two);
            prop_assert_eq!(graph.patches().len(), n + full_threats);
        }
    }
}
