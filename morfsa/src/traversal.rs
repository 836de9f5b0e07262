//! Whole-automaton traversals.
//!
//! States are shared between many paths, so every traversal keeps a visited
//! set keyed by state identity and walks with an explicit stack; nothing
//! here recurses.
use hashbrown::{HashMap, HashSet};
use serde::Serialize;

use crate::fsa::Fsa;
use crate::types::{ArcIndex, NodeIndex};

/// Visit every reachable state once, parents before children.
///
/// Stops early when `visitor` returns `false`.
pub fn visit_pre_order<F, V>(fsa: &F, mut visitor: V)
where
    F: Fsa + ?Sized,
    V: FnMut(NodeIndex) -> bool,
{
    let root = match fsa.root_node() {
        Some(root) => root,
        None => return,
    };

    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        if !visitor(node) {
            return;
        }
        for arc in fsa.arcs(node) {
            if let Some(target) = fsa.end_node(arc) {
                if !visited.contains(&target) {
                    stack.push(target);
                }
            }
        }
    }
}

/// Visit every reachable state once, children before parents.
///
/// Stops early when `visitor` returns `false`.
pub fn visit_post_order<F, V>(fsa: &F, mut visitor: V)
where
    F: Fsa + ?Sized,
    V: FnMut(NodeIndex) -> bool,
{
    let root = match fsa.root_node() {
        Some(root) => root,
        None => return,
    };

    let mut visited = HashSet::new();
    visited.insert(root);

    // (state, next arc of that state still to descend into)
    let mut stack: Vec<(NodeIndex, Option<ArcIndex>)> = vec![(root, fsa.first_arc(root))];
    while let Some(&(node, cursor)) = stack.last() {
        match cursor {
            Some(arc) => {
                let top = stack.len() - 1;
                stack[top].1 = fsa.next_arc(arc);
                if let Some(target) = fsa.end_node(arc) {
                    if visited.insert(target) {
                        stack.push((target, fsa.first_arc(target)));
                    }
                }
            }
            None => {
                stack.pop();
                if !visitor(node) {
                    return;
                }
            }
        }
    }
}

/// Number of sequences accepted from each reachable state.
#[derive(Debug, Clone, Default)]
pub struct RightLanguageCounts {
    counts: HashMap<NodeIndex, u32>,
}

impl RightLanguageCounts {
    /// Count the right language of every state reachable from the root.
    ///
    /// Saturates at `u32::MAX`, which no supported layout can address anyway.
    pub fn compute<F: Fsa + ?Sized>(fsa: &F) -> RightLanguageCounts {
        let mut counts: HashMap<NodeIndex, u32> = HashMap::new();
        visit_post_order(fsa, |node| {
            let mut count: u32 = 0;
            for arc in fsa.arcs(node) {
                if fsa.is_arc_final(arc) {
                    count = count.saturating_add(1);
                }
                if let Some(target) = fsa.end_node(arc) {
                    count = count.saturating_add(counts[&target]);
                }
            }
            counts.insert(node, count);
            true
        });
        RightLanguageCounts { counts }
    }

    /// The count for `node`, if it is reachable.
    #[inline]
    pub fn get(&self, node: NodeIndex) -> Option<u32> {
        self.counts.get(&node).copied()
    }

    /// Number of counted states.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no state was counted, i.e. the language is empty.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Shorthand for [`RightLanguageCounts::compute`].
pub fn right_language_counts<F: Fsa + ?Sized>(fsa: &F) -> RightLanguageCounts {
    RightLanguageCounts::compute(fsa)
}

/// Size statistics of an automaton.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FsaInfo {
    /// Reachable states, the epsilon state excluded.
    pub states: usize,
    /// Arcs of the reachable states.
    pub arcs: usize,
    /// Arcs that complete a sequence.
    pub final_arcs: usize,
    /// Arcs leading to the terminal sink.
    pub terminal_arcs: usize,
    /// Accepted sequences.
    pub sequences: u64,
}

impl FsaInfo {
    /// Walk the automaton and collect its statistics.
    pub fn compute<F: Fsa + ?Sized>(fsa: &F) -> FsaInfo {
        let mut info = FsaInfo::default();
        let mut counts: HashMap<NodeIndex, u64> = HashMap::new();

        visit_post_order(fsa, |node| {
            info.states += 1;
            let mut count = 0u64;
            for arc in fsa.arcs(node) {
                info.arcs += 1;
                if fsa.is_arc_final(arc) {
                    info.final_arcs += 1;
                    count += 1;
                }
                match fsa.end_node(arc) {
                    Some(target) => count += counts[&target],
                    None => info.terminal_arcs += 1,
                }
            }
            counts.insert(node, count);
            true
        });

        info.sequences = fsa
            .root_node()
            .and_then(|root| counts.get(&root).copied())
            .unwrap_or(0);
        info
    }
}

/// Iterator over accepted sequences in lexicographic order.
///
/// Created by [`Fsa::sequences`] and [`Fsa::sequences_from`].
pub struct Sequences<'a, F: Fsa + ?Sized> {
    fsa: &'a F,
    buffer: Vec<u8>,
    // One cursor per depth: the next arc to take at that depth.
    arcs: Vec<Option<ArcIndex>>,
}

impl<'a, F: Fsa + ?Sized> Sequences<'a, F> {
    pub(crate) fn new(fsa: &'a F, node: Option<NodeIndex>) -> Sequences<'a, F> {
        let arcs = match node {
            Some(node) => vec![fsa.first_arc(node)],
            None => vec![],
        };
        Sequences {
            fsa,
            buffer: vec![],
            arcs,
        }
    }
}

impl<'a, F: Fsa + ?Sized> Iterator for Sequences<'a, F> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        while let Some(&cursor) = self.arcs.last() {
            let arc = match cursor {
                Some(arc) => arc,
                None => {
                    self.arcs.pop();
                    continue;
                }
            };

            let depth = self.arcs.len() - 1;
            self.arcs[depth] = self.fsa.next_arc(arc);
            self.buffer.truncate(depth);
            self.buffer.push(self.fsa.arc_label(arc));

            if let Some(target) = self.fsa.end_node(arc) {
                self.arcs.push(self.fsa.first_arc(target));
            }
            if self.fsa.is_arc_final(arc) {
                return Some(self.buffer.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FsaBuilder;

    #[test]
    fn right_language_of_sample() {
        let fsa = FsaBuilder::build(["a", "ab", "abc", "b"]).unwrap();
        let counts = right_language_counts(&fsa);
        let root = fsa.root_node().unwrap();
        assert_eq!(counts.get(root), Some(4));

        // "a" -> state accepting {"b", "bc"}
        let a = fsa.arc(root, b'a').unwrap();
        let after_a = fsa.end_node(a).unwrap();
        assert_eq!(counts.get(after_a), Some(2));

        let b = fsa.arc(after_a, b'b').unwrap();
        let after_ab = fsa.end_node(b).unwrap();
        assert_eq!(counts.get(after_ab), Some(1));
    }

    #[test]
    fn counts_match_enumeration() {
        let words = ["ba", "bb", "ca", "cb", "cba", "da", "db", "dba", "dbb"];
        let fsa = FsaBuilder::build(words).unwrap();
        let counts = right_language_counts(&fsa);
        visit_pre_order(&fsa, |node| {
            let enumerated = fsa.sequences_from(node).count() as u32;
            assert_eq!(counts.get(node), Some(enumerated));
            true
        });
    }

    #[test]
    fn post_order_visits_children_first() {
        let fsa = FsaBuilder::build(["abc", "abd", "bc", "bd"]).unwrap();
        let mut seen: Vec<NodeIndex> = vec![];
        visit_post_order(&fsa, |node| {
            for arc in fsa.arcs(node) {
                if let Some(target) = fsa.end_node(arc) {
                    assert!(seen.contains(&target));
                }
            }
            seen.push(node);
            true
        });
        assert_eq!(seen.last().copied(), fsa.root_node());

        let mut pre = vec![];
        visit_pre_order(&fsa, |node| {
            pre.push(node);
            true
        });
        assert_eq!(pre.len(), seen.len());
        assert_eq!(pre.first().copied(), fsa.root_node());
    }

    #[test]
    fn visitor_can_stop() {
        let fsa = FsaBuilder::build(["abc", "abd", "bc"]).unwrap();
        let mut n = 0;
        visit_post_order(&fsa, |_| {
            n += 1;
            false
        });
        assert_eq!(n, 1);
    }

    #[test]
    fn info() {
        let fsa = FsaBuilder::build(["a", "ab", "abc", "b"]).unwrap();
        let info = FsaInfo::compute(&fsa);
        assert_eq!(info.states, 3);
        assert_eq!(info.arcs, 4);
        assert_eq!(info.final_arcs, 4);
        assert_eq!(info.terminal_arcs, 2);
        assert_eq!(info.sequences, 4);
    }

    #[test]
    fn empty_language() {
        let fsa = FsaBuilder::new().complete().unwrap();
        assert!(right_language_counts(&fsa).is_empty());
        assert_eq!(FsaInfo::compute(&fsa), FsaInfo::default());
        assert_eq!(fsa.sequences().count(), 0);
    }
}
