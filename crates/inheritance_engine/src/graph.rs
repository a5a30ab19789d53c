//! Inheritance graph construction and cycle detection.
//!
//! The graph is derived state: it is rebuilt on demand from the current
//! store contents and never persisted. Nodes live in an arena-indexed table
//! and refer to each other by index, so every traversal in this module is an
//! explicit work-stack loop rather than recursion, so depth computation and
//! cycle detection stay safe on graphs with tens of thousands of nodes and
//! on graphs containing cycles.
//!
//! Dependencies are collected from three sources per template: the explicit
//! `inherits_from` list, template-name-shaped references inside evaluation
//! expressions, and the same pattern inside condition predicates and
//! branches. The text scanning is isolated behind [`ReferenceExtractor`] so
//! it can be replaced by a real expression parser without touching the
//! graph or resolution algorithms.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::TemplateStore;

/// Extracts implicit template references from free-text expression strings.
pub trait ReferenceExtractor: Send + Sync {
    /// Returns every template identifier referenced by `text`.
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Pattern-based extractor matching identifiers ending in `Template`.
///
/// This reproduces the established naming convention for referencing
/// templates inside expressions (`baseTemplate`, `urbanMacroTemplate`).
/// Unrelated text that happens to match the pattern yields a false-positive
/// reference; such references only become edges when a template with that
/// id actually exists, which bounds the damage to spurious edges between
/// real templates.
pub struct RegexReferenceExtractor {
    pattern: Regex,
}

impl RegexReferenceExtractor {
    pub fn new() -> Self {
        Self {
            // Identifier ending in the fixed `Template` suffix.
            pattern: Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*Template\b")
                .expect("reference pattern is valid"),
        }
    }
}

impl Default for RegexReferenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceExtractor for RegexReferenceExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|found| found.as_str().to_string())
            .collect()
    }
}

/// One node of the derived inheritance graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Template this node represents.
    pub template_id: String,
    /// Template priority, copied for cheap chain sorting.
    pub priority: u32,
    /// `1 + max(depth of parents)`; 1 for templates with no parents; 0 for
    /// branches cut by cycle protection.
    pub depth: usize,
    /// Arena indices of resolved parents.
    pub parents: Vec<usize>,
    /// Arena indices of resolved children.
    pub children: Vec<usize>,
    /// Declared or referenced parent ids absent from the store.
    pub missing_parents: Vec<String>,
}

/// Severity of a cycle report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleSeverity {
    /// A real back-edge: the inheritance chain contains a loop.
    Error,
    /// The traversal depth limit was exceeded before the walk finished.
    Warning,
}

/// One finding of the cycle detector.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// The full cycle path, first node repeated at the end for error
    /// reports; the over-deep path for warning reports.
    pub path: Vec<String>,
    pub severity: CycleSeverity,
    /// Suggested remediation, `break_cycle` for real cycles.
    pub suggested_resolution: String,
    pub description: String,
}

/// Derived, rebuild-on-demand inheritance graph.
#[derive(Debug, Clone, Default)]
pub struct InheritanceGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
}

impl InheritanceGraph {
    /// Node for a template id.
    pub fn node(&self, template_id: &str) -> Option<&GraphNode> {
        self.index.get(template_id).map(|&i| &self.nodes[i])
    }

    /// Arena index for a template id.
    pub fn index_of(&self, template_id: &str) -> Option<usize> {
        self.index.get(template_id).copied()
    }

    /// Node at an arena index.
    pub fn node_at(&self, index: usize) -> &GraphNode {
        &self.nodes[index]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computed depth for a template id.
    pub fn depth_of(&self, template_id: &str) -> Option<usize> {
        self.node(template_id).map(|node| node.depth)
    }

    /// Detects circular dependencies reachable from `template_id`.
    ///
    /// Iterative depth-first walk along parent edges with an explicit
    /// recursion stack. A back-edge to a node currently on the stack is
    /// reported as an `Error` cycle with its full path. Walks deeper than
    /// `max_depth` are cut and reported as `Warning`s, never errors.
    ///
    /// An unknown `template_id` yields no reports; absence is the
    /// resolver's concern.
    pub fn detect_circular_dependencies(
        &self,
        template_id: &str,
        max_depth: usize,
    ) -> Vec<CycleReport> {
        let Some(start) = self.index_of(template_id) else {
            return Vec::new();
        };

        let mut reports = Vec::new();
        // (node, index of the next parent edge to follow)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        let mut on_stack = vec![false; self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        on_stack[start] = true;
        visited[start] = true;

        while let Some((node, edge)) = stack.last().copied() {
            if stack.len() > max_depth {
                reports.push(CycleReport {
                    path: self.stack_path(&stack),
                    severity: CycleSeverity::Warning,
                    suggested_resolution: "increase_max_depth".to_string(),
                    description: format!(
                        "Inheritance chain from '{}' exceeds maximum depth {}",
                        self.nodes[start].template_id, max_depth
                    ),
                });
                on_stack[node] = false;
                stack.pop();
                continue;
            }

            match self.nodes[node].parents.get(edge).copied() {
                Some(parent) => {
                    stack.last_mut().expect("stack is non-empty").1 += 1;
                    if on_stack[parent] {
                        // Back-edge: slice the current path from the first
                        // occurrence of the parent and close the loop.
                        let mut path = self.stack_path(&stack);
                        let loop_start = path
                            .iter()
                            .position(|id| id == &self.nodes[parent].template_id)
                            .unwrap_or(0);
                        path.drain(..loop_start);
                        path.push(self.nodes[parent].template_id.clone());
                        reports.push(CycleReport {
                            description: format!(
                                "Circular inheritance detected: {}",
                                path.join(" -> ")
                            ),
                            path,
                            severity: CycleSeverity::Error,
                            suggested_resolution: "break_cycle".to_string(),
                        });
                    } else if !visited[parent] {
                        visited[parent] = true;
                        on_stack[parent] = true;
                        stack.push((parent, 0));
                    }
                }
                None => {
                    on_stack[node] = false;
                    stack.pop();
                }
            }
        }

        reports
    }

    /// True when an `Error`-severity cycle is reachable from the id.
    pub fn has_cycle_from(&self, template_id: &str, max_depth: usize) -> bool {
        self.detect_circular_dependencies(template_id, max_depth)
            .iter()
            .any(|report| report.severity == CycleSeverity::Error)
    }

    fn stack_path(&self, stack: &[(usize, usize)]) -> Vec<String> {
        stack
            .iter()
            .map(|&(node, _)| self.nodes[node].template_id.clone())
            .collect()
    }
}

/// Builds the inheritance graph from the current store contents.
pub struct GraphBuilder {
    extractor: Arc<dyn ReferenceExtractor>,
}

impl GraphBuilder {
    /// Builder with the default pattern-based reference extractor.
    pub fn new() -> Self {
        Self {
            extractor: Arc::new(RegexReferenceExtractor::new()),
        }
    }

    /// Builder with a caller-supplied reference extractor.
    pub fn with_extractor(extractor: Arc<dyn ReferenceExtractor>) -> Self {
        Self { extractor }
    }

    /// Scans every stored template and produces a fully populated graph.
    ///
    /// No errors are raised here; cycles are reported by
    /// [`InheritanceGraph::detect_circular_dependencies`] and missing
    /// parents surface as resolver warnings.
    pub fn build(&self, store: &TemplateStore) -> InheritanceGraph {
        let mut ids: Vec<String> = store.ids();
        ids.sort();

        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.clone(), position))
            .collect();

        let mut nodes: Vec<GraphNode> = ids
            .iter()
            .map(|id| {
                let template = store.get(id).expect("id came from the store");
                GraphNode {
                    template_id: id.clone(),
                    priority: template.priority,
                    depth: 0,
                    parents: Vec::new(),
                    children: Vec::new(),
                    missing_parents: Vec::new(),
                }
            })
            .collect();

        for id in &ids {
            let template = store.get(id).expect("id came from the store");
            let node = index[id];

            let mut dependencies: Vec<String> = template.inherits_from.clone();
            for text in template.reference_texts() {
                dependencies.extend(self.extractor.extract(text));
            }

            let mut seen: Vec<String> = Vec::new();
            for dependency in dependencies {
                if seen.contains(&dependency) {
                    continue;
                }
                seen.push(dependency.clone());

                match index.get(&dependency) {
                    Some(&parent) => {
                        if !nodes[node].parents.contains(&parent) {
                            nodes[node].parents.push(parent);
                            nodes[parent].children.push(node);
                        }
                    }
                    None => {
                        tracing::debug!(
                            template_id = %id,
                            reference = %dependency,
                            "referenced template not in store"
                        );
                        nodes[node].missing_parents.push(dependency);
                    }
                }
            }
        }

        let mut graph = InheritanceGraph { nodes, index };
        compute_depths(&mut graph);
        graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth pass over the whole graph.
///
/// Iterative post-order walk. Nodes are marked `Visiting` while their
/// parents are being computed; re-entering a `Visiting` node means the walk
/// crossed a cycle, and that branch contributes depth 0 instead of
/// diverging. The pass therefore terminates on any input.
fn compute_depths(graph: &mut InheritanceGraph) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let node_count = graph.nodes.len();
    let mut marks = vec![Mark::Unvisited; node_count];
    let mut depths = vec![0usize; node_count];

    for root in 0..node_count {
        if marks[root] == Mark::Done {
            continue;
        }

        // (node, parent edges already expanded?)
        let mut stack: Vec<(usize, bool)> = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                let parent_depth = graph.nodes[node]
                    .parents
                    .iter()
                    .filter(|&&parent| marks[parent] == Mark::Done)
                    .map(|&parent| depths[parent])
                    .max();
                // No computable parent (root, or every parent on a cycle)
                // bottoms the branch out at depth 1.
                depths[node] = parent_depth.map_or(1, |max| 1 + max);
                marks[node] = Mark::Done;
                continue;
            }

            if marks[node] == Mark::Done {
                continue;
            }
            if marks[node] == Mark::Visiting {
                // Cycle re-entry; leave depth 0 for this branch.
                continue;
            }
            marks[node] = Mark::Visiting;
            stack.push((node, true));
            for &parent in &graph.nodes[node].parents {
                if marks[parent] == Mark::Unvisited {
                    stack.push((parent, false));
                }
            }
        }
    }

    for (node, depth) in depths.into_iter().enumerate() {
        graph.nodes[node].depth = depth;
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
