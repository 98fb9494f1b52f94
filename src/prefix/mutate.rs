//! Structural rewrites of prefix chains driven by tree inserts and deletes.

use tracing::trace;

use super::{prefix_index, PrefixNode};
use crate::art::Art;
use crate::error::Result;
use crate::node::NodeRef;

impl Art {
    /// Drop the first `n + 1` bytes of the prefix node at `node`.
    ///
    /// If that empties the node it is freed and `node` becomes its successor.
    /// Otherwise the remaining bytes move to the front and the successor
    /// chain is folded back in, so a reduced node is refilled from the nodes
    /// behind it instead of staying short.
    ///
    /// # Panics
    /// Panics unless `node` is a prefix node holding more than `n` bytes.
    pub fn reduce(&mut self, node: &mut NodeRef, n: usize) -> Result<()> {
        self.materialize(node)?;
        let index = prefix_index(*node);
        let count = self.prefix(index).count();
        assert!(
            n < count,
            "cannot drop {} bytes from a prefix node holding {count}",
            n + 1
        );
        trace!(index, n, count, "reducing prefix");

        if n + 1 == count {
            *node = self.nodes.prefixes.free(index).successor();
            return Ok(());
        }

        let next = {
            let prefix = self.prefix_mut(index);
            prefix.bytes.copy_within(n + 1..count, 0);
            prefix.count = (count - n - 1) as u8;
            prefix.next.take()
        };
        self.append_chain(*node, next)
    }

    /// Split the prefix node at `node` around the byte at `position`.
    ///
    /// Bytes before `position` stay in the node. Bytes after it, followed by
    /// the node's old successor, become the returned child chain. The byte at
    /// `position` itself belongs to neither; the caller turns it into the key
    /// of a new branch. The retained node is left without a successor for the
    /// caller to fill in with [`set_successor`](Art::set_successor); when
    /// `position` is 0 nothing is retained, the node is freed and `node` is
    /// unset.
    ///
    /// # Panics
    /// Panics unless `node` is a prefix node and `position` is below its count.
    pub fn split(&mut self, node: &mut NodeRef, position: usize) -> Result<NodeRef> {
        self.materialize(node)?;
        let index = prefix_index(*node);
        let source = *self.prefix(index);
        let count = source.count();
        assert!(
            position < count,
            "split position {position} outside prefix node of {count} bytes"
        );
        trace!(index, position, count, "splitting prefix");

        self.prefix_mut(index).next = NodeRef::Unset;
        let child = if position + 1 < count {
            let rest = &source.bytes()[position + 1..];
            let child = self.alloc_prefix(PrefixNode::from_bytes(rest, NodeRef::Unset));
            self.append_chain(child, source.next)?;
            child
        } else {
            source.next
        };

        if position == 0 {
            self.nodes.prefixes.free(index);
            node.reset();
        } else {
            self.prefix_mut(index).count = position as u8;
        }
        Ok(child)
    }

    /// Append `byte` and then the chain `child` to the chain at `parent`.
    ///
    /// A prefix `parent` is extended at its tail, replacing the tail's
    /// successor. Any other `parent` is overwritten with a new one-byte
    /// prefix node; the caller must already have detached what it pointed
    /// at. A prefix `child` is folded in node by node, anything else becomes
    /// the final successor.
    pub fn concatenate(&mut self, parent: &mut NodeRef, byte: u8, child: NodeRef) -> Result<()> {
        self.materialize(parent)?;
        trace!(parent = ?*parent, byte, "concatenating prefix");

        if parent.is_prefix() {
            let tail = self.chain_tail(*parent)?;
            let tail = self.append_byte(tail, byte);
            return self.append_chain(tail, child);
        }

        let head = self.new_prefix_with_byte(byte, NodeRef::Unset);
        self.append_chain(head, child)?;
        *parent = head;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtConfig;
    use crate::key::ArtKey;

    fn art(capacity: usize) -> Art {
        Art::new(ArtConfig::default().with_prefix_capacity(capacity)).unwrap()
    }

    fn chain(art: &mut Art, bytes: &[u8]) -> (NodeRef, NodeRef) {
        let leaf = art.new_leaf(0);
        let head = art.new_prefix_from_key(&ArtKey::from_bytes(bytes), 0, bytes.len(), leaf);
        (head, leaf)
    }

    #[test]
    fn test_reduce_scenario() {
        let mut art = art(4);
        let (mut head, leaf) = chain(&mut art, &[10, 20, 30, 40, 50, 60]);
        art.reduce(&mut head, 1).unwrap();

        assert_eq!(art.chain_bytes(&mut head).unwrap(), vec![30, 40, 50, 60]);
        assert_eq!(art.chain_len(&mut head).unwrap(), 1);
        assert_eq!(art.successor(head), leaf);
        assert_eq!(art.stats().prefix_nodes, 1);
    }

    #[test]
    fn test_reduce_whole_node() {
        let mut art = art(4);
        let (mut head, _) = chain(&mut art, &[1, 2, 3, 4, 5]);
        let second = art.successor(head);
        art.reduce(&mut head, 3).unwrap();
        assert_eq!(head, second);
        assert_eq!(art.chain_bytes(&mut head).unwrap(), vec![5]);
    }

    #[test]
    fn test_reduce_last_byte_of_chain() {
        let mut art = art(4);
        let (mut head, leaf) = chain(&mut art, &[7]);
        art.reduce(&mut head, 0).unwrap();
        assert_eq!(head, leaf);
        assert_eq!(art.stats().prefix_nodes, 0);
    }

    #[test]
    #[should_panic(expected = "cannot drop")]
    fn test_reduce_past_count() {
        let mut art = art(4);
        let (mut head, _) = chain(&mut art, &[1, 2]);
        let _ = art.reduce(&mut head, 2);
    }

    #[test]
    fn test_split_middle() {
        let mut art = art(4);
        let (mut head, leaf) = chain(&mut art, &[1, 2, 3, 4, 5, 6]);
        let mut child = art.split(&mut head, 1).unwrap();

        assert_eq!(art.prefix_node(head).unwrap().bytes(), &[1]);
        assert_eq!(art.successor(head), NodeRef::Unset);
        assert_eq!(art.chain_bytes(&mut child).unwrap(), vec![3, 4, 5, 6]);
        assert_eq!(art.chain_len(&mut child).unwrap(), 1);
        assert_eq!(art.successor(child), leaf);
    }

    #[test]
    fn test_split_last_byte() {
        let mut art = art(4);
        let (mut head, _) = chain(&mut art, &[1, 2, 3, 4, 5]);
        let second = art.successor(head);
        let child = art.split(&mut head, 3).unwrap();

        assert_eq!(child, second);
        assert_eq!(art.prefix_node(head).unwrap().bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_split_at_zero_frees_node() {
        let mut art = art(4);
        let (mut head, leaf) = chain(&mut art, &[9]);
        let child = art.split(&mut head, 0).unwrap();
        assert_eq!(head, NodeRef::Unset);
        assert_eq!(child, leaf);
        assert_eq!(art.stats().prefix_nodes, 0);
    }

    #[test]
    fn test_split_then_concatenate_restores_bytes() {
        let mut art = art(4);
        let original = [1, 2, 3, 4, 5, 6, 7];
        for position in 0..4 {
            let (mut head, leaf) = chain(&mut art, &original);
            let byte = original[position];
            let child = art.split(&mut head, position).unwrap();
            art.concatenate(&mut head, byte, child).unwrap();

            assert_eq!(art.chain_bytes(&mut head).unwrap(), original);
            let tail = art.chain_tail(head).unwrap();
            assert_eq!(art.successor(tail), leaf);
            art.free(&mut head);
        }
        assert_eq!(art.stats().live_nodes(), 0);
    }

    #[test]
    fn test_concatenate_onto_non_prefix() {
        let mut art = art(4);
        let leaf = art.new_leaf(3);

        let mut parent = NodeRef::Unset;
        art.concatenate(&mut parent, 8, leaf).unwrap();
        assert_eq!(art.prefix_node(parent).unwrap().bytes(), &[8]);
        assert_eq!(art.successor(parent), leaf);

        let (child, _) = chain(&mut art, &[1, 2, 3, 4]);
        let mut parent = NodeRef::Unset;
        art.concatenate(&mut parent, 0, child).unwrap();
        assert_eq!(art.chain_bytes(&mut parent).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(art.chain_len(&mut parent).unwrap(), 2);
    }

    #[test]
    fn test_concatenate_full_tail() {
        let mut art = art(4);
        let (mut head, mut leaf) = chain(&mut art, &[1, 2, 3, 4]);
        art.set_successor(head, NodeRef::Unset);
        art.free(&mut leaf);

        let other = art.new_leaf(5);
        art.concatenate(&mut head, 9, other).unwrap();
        assert_eq!(art.chain_bytes(&mut head).unwrap(), vec![1, 2, 3, 4, 9]);
        let tail = art.chain_tail(head).unwrap();
        assert_eq!(art.successor(tail), other);
    }
}
