//! Comparing a prefix chain against another chain or against a key.

use smallvec::SmallVec;

use super::prefix_index;
use crate::art::Art;
use crate::error::Result;
use crate::key::ArtKey;
use crate::node::NodeRef;

/// One of the two chains in a [`ChainComparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// How two chains relate at the point where their walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Both chains ended together with every byte equal.
    Equal,
    /// The current nodes differ at `position`.
    Mismatch { position: usize },
    /// The shorter side ran out after `position` bytes of the longer side's
    /// current node.
    Contained { position: usize, longer: Side },
}

/// Result of [`Art::compare_chains`].
///
/// The comparison itself frees nothing. The nodes of the released side that
/// were matched in full are recorded here and handed back with
/// [`Art::release_matched`] once the caller has decided to merge.
#[derive(Debug, Clone)]
pub struct ChainComparison {
    pub outcome: ChainOutcome,
    /// Bytes matched across both chains before the outcome.
    pub matched: usize,
    /// Side whose matched nodes become redundant on a merge: the longer side
    /// for [`ChainOutcome::Contained`], otherwise the right side.
    pub release: Side,
    /// Left cursor where the walk stopped.
    pub left: NodeRef,
    /// Right cursor where the walk stopped.
    pub right: NodeRef,
    head: NodeRef,
    consumed: Seen,
}

type Seen = SmallVec<[NodeRef; 4]>;

impl ChainComparison {
    fn new(
        outcome: ChainOutcome,
        matched: usize,
        heads: (NodeRef, NodeRef),
        cursors: (NodeRef, NodeRef),
        seen: (Seen, Seen),
    ) -> Self {
        let release = match outcome {
            ChainOutcome::Contained { longer, .. } => longer,
            _ => Side::Right,
        };
        let (head, consumed) = match release {
            Side::Left => (heads.0, seen.0),
            Side::Right => (heads.1, seen.1),
        };
        Self {
            outcome,
            matched,
            release,
            left: cursors.0,
            right: cursors.1,
            head,
            consumed,
        }
    }

    /// Offset within the current node pair where the chains stop agreeing,
    /// or `None` when they are equal throughout.
    pub fn position(&self) -> Option<usize> {
        match self.outcome {
            ChainOutcome::Equal => None,
            ChainOutcome::Mismatch { position } | ChainOutcome::Contained { position, .. } => {
                Some(position)
            }
        }
    }

    /// Matched nodes of the released side.
    pub fn consumed(&self) -> &[NodeRef] {
        &self.consumed
    }

    /// Cursor of the released side.
    pub fn divergence(&self) -> NodeRef {
        match self.release {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

impl Art {
    /// Walk two chains in lock step and describe where they stop agreeing.
    ///
    /// Both heads are materialized in place and every successor followed is
    /// materialized in its node. When one side's node is a strict prefix of
    /// the other's, the shorter side's cursor moves to its successor and the
    /// longer side's stays on the node holding the remaining bytes.
    ///
    /// # Panics
    /// Panics unless both heads are prefix nodes.
    pub fn compare_chains(
        &mut self,
        left: &mut NodeRef,
        right: &mut NodeRef,
    ) -> Result<ChainComparison> {
        self.materialize(left)?;
        self.materialize(right)?;
        assert!(
            left.is_prefix() && right.is_prefix(),
            "compare_chains needs two prefix chains, got {left:?} and {right:?}"
        );

        let mut l_cursor = *left;
        let mut r_cursor = *right;
        let mut l_seen = Seen::new();
        let mut r_seen = Seen::new();
        let mut matched = 0;

        while l_cursor.is_prefix() && r_cursor.is_prefix() {
            let l_index = prefix_index(l_cursor);
            let r_index = prefix_index(r_cursor);
            let l_node = *self.prefix(l_index);
            let r_node = *self.prefix(r_index);
            let max = l_node.count().min(r_node.count());

            if let Some(position) = (0..max).find(|&i| l_node.bytes()[i] != r_node.bytes()[i]) {
                return Ok(ChainComparison::new(
                    ChainOutcome::Mismatch { position },
                    matched + position,
                    (*left, *right),
                    (l_cursor, r_cursor),
                    (l_seen, r_seen),
                ));
            }
            matched += max;

            if l_node.count() == r_node.count() {
                l_seen.push(l_cursor);
                r_seen.push(r_cursor);
                l_cursor = self.resolve_next(l_index)?;
                r_cursor = self.resolve_next(r_index)?;
                continue;
            }

            let longer = if l_node.count() == max {
                l_seen.push(l_cursor);
                l_cursor = self.resolve_next(l_index)?;
                Side::Right
            } else {
                r_seen.push(r_cursor);
                r_cursor = self.resolve_next(r_index)?;
                Side::Left
            };
            return Ok(ChainComparison::new(
                ChainOutcome::Contained { position: max, longer },
                matched,
                (*left, *right),
                (l_cursor, r_cursor),
                (l_seen, r_seen),
            ));
        }

        let outcome = match (l_cursor.is_prefix(), r_cursor.is_prefix()) {
            (false, false) => ChainOutcome::Equal,
            (true, _) => ChainOutcome::Contained { position: 0, longer: Side::Left },
            (_, true) => ChainOutcome::Contained { position: 0, longer: Side::Right },
        };
        Ok(ChainComparison::new(
            outcome,
            matched,
            (*left, *right),
            (l_cursor, r_cursor),
            (l_seen, r_seen),
        ))
    }

    /// Free the released side's matched nodes and point its head at the
    /// divergence cursor. Only the matched nodes themselves are freed; what
    /// follows them stays owned by the new head.
    ///
    /// `head` must be the released side's head as passed to
    /// [`compare_chains`](Art::compare_chains).
    pub fn release_matched(&mut self, comparison: &ChainComparison, head: &mut NodeRef) {
        assert_eq!(
            *head, comparison.head,
            "release_matched called with a head the comparison did not start from"
        );
        for &node in comparison.consumed() {
            self.nodes.prefixes.free(prefix_index(node));
        }
        *head = comparison.divergence();
    }

    /// Match the chain at `cursor` against `key` starting at `depth`.
    ///
    /// Returns the offset of the first mismatching byte within the node the
    /// cursor stops on, or `None` when the whole chain matched. `depth`
    /// advances by one for every matched byte; a key that ends inside the
    /// chain mismatches at the first missing byte. On a full match the cursor
    /// is left on the node following the chain.
    pub fn traverse_key(
        &mut self,
        cursor: &mut NodeRef,
        key: &ArtKey,
        depth: &mut usize,
    ) -> Result<Option<usize>> {
        self.materialize(cursor)?;
        while cursor.is_prefix() {
            let index = prefix_index(*cursor);
            let node = *self.prefix(index);
            for (i, &byte) in node.bytes().iter().enumerate() {
                if key.get(*depth) != Some(byte) {
                    return Ok(Some(i));
                }
                *depth += 1;
            }
            *cursor = self.resolve_next(index)?;
        }
        Ok(None)
    }
}
