use super::*;

use std::sync::Arc;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::storage::MemoryBlockManager;

const ROW_ID: u64 = 7;

fn art(capacity: usize) -> Art {
    let blocks = Arc::new(MemoryBlockManager::new(64).unwrap());
    Art::with_block_manager(ArtConfig::default().with_prefix_capacity(capacity), blocks).unwrap()
}

fn chain(art: &mut Art, bytes: &[u8]) -> NodeRef {
    let leaf = art.new_leaf(ROW_ID);
    art.new_prefix_from_key(&ArtKey::from_bytes(bytes), 0, bytes.len(), leaf)
}

/// Node that ends the chain at `head`, loading the chain as needed.
fn terminal(art: &mut Art, head: &mut NodeRef) -> NodeRef {
    art.materialize(head).unwrap();
    if !head.is_prefix() {
        return *head;
    }
    let tail = art.chain_tail(*head).unwrap();
    art.successor(tail)
}

fn validate_chain(art: &mut Art, head: &mut NodeRef) {
    let capacity = art.prefix_capacity();
    art.materialize(head).unwrap();
    let mut cursor = *head;
    let mut nodes = 0;
    while cursor.is_prefix() {
        let count = art.prefix_node(cursor).unwrap().count();
        assert!(
            (1..=capacity).contains(&count),
            "prefix node count {count} outside 1..={capacity}"
        );
        nodes += 1;
        let mut next = art.successor(cursor);
        art.materialize(&mut next).unwrap();
        art.set_successor(cursor, next);
        cursor = next;
    }
    let leaf = art.leaf(cursor).expect("chain must end in the leaf");
    assert_eq!(leaf.row_ids(), &[ROW_ID]);

    let stats = art.stats();
    assert_eq!(stats.prefix_nodes, nodes, "unreachable prefix nodes");
    assert_eq!(stats.leaf_nodes, 1);
}

/// Checkpoint `head` and hand back an unloaded reference to the copy.
fn reload(art: &mut Art, head: &mut NodeRef) -> NodeRef {
    let location = art.checkpoint(*head).unwrap();
    art.free(head);
    art.load(location)
}

fn bytes_strategy(max: usize) -> impl Strategy<Value = Vec<u8>> + Clone {
    prop::collection::vec(any::<u8>(), 1..=max)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    Reduce(#[proptest(strategy = "0usize..16")] usize),
    SplitRejoin(#[proptest(strategy = "0usize..16")] usize),
    Extend(u8, #[proptest(strategy = "prop::collection::vec(any::<u8>(), 0..24)")] Vec<u8>),
    AppendByte(u8),
    Checkpoint,
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_from_key_then_traverse(
        capacity in 1usize..=15,
        key in prop::collection::vec(any::<u8>(), 0..64),
        start in 0usize..64,
        len in 0usize..64,
    ) {
        let start = start.min(key.len());
        let len = len.min(key.len() - start);
        let mut art = art(capacity);
        let key = ArtKey::from_bytes(&key);
        let leaf = art.new_leaf(ROW_ID);
        let mut head = art.new_prefix_from_key(&key, start, len, leaf);

        prop_assert_eq!(art.chain_len(&mut head).unwrap(), len.div_ceil(capacity));

        let mut cursor = head;
        let mut depth = start;
        prop_assert_eq!(art.traverse_key(&mut cursor, &key, &mut depth).unwrap(), None);
        prop_assert_eq!(depth, start + len);
        prop_assert_eq!(cursor, leaf);
    }

    #[test]
    fn prop_append_overflows_once(capacity in 1usize..=15, bytes in bytes_strategy(16)) {
        let mut art = art(capacity);
        let leaf = art.new_leaf(ROW_ID);
        let mut head = art.new_prefix();
        art.set_successor(head, leaf);

        let mut tail = head;
        for i in 0..=capacity {
            tail = art.append_byte(tail, bytes[i % bytes.len()]);
        }
        prop_assert_eq!(art.chain_len(&mut head).unwrap(), 2);
        prop_assert_eq!(art.prefix_node(head).unwrap().count(), capacity);
        prop_assert_eq!(art.prefix_node(tail).unwrap().count(), 1);
        prop_assert_eq!(art.successor(tail), leaf);
    }

    #[test]
    fn prop_split_concatenate_roundtrip(capacity in 1usize..=15, bytes in bytes_strategy(48)) {
        let mut art = art(capacity);
        let first = bytes.len().min(capacity);
        for position in 0..first {
            let mut head = chain(&mut art, &bytes);
            let child = art.split(&mut head, position).unwrap();
            art.concatenate(&mut head, bytes[position], child).unwrap();

            prop_assert_eq!(&art.chain_bytes(&mut head).unwrap(), &bytes);
            validate_chain(&mut art, &mut head);
            art.free(&mut head);
        }
    }

    #[test]
    fn prop_reduce_drops_leading_bytes(
        capacity in 1usize..=15,
        bytes in bytes_strategy(48),
        n in 0usize..15,
    ) {
        let mut art = art(capacity);
        let mut head = chain(&mut art, &bytes);
        let n = n % bytes.len().min(capacity);
        art.reduce(&mut head, n).unwrap();

        prop_assert_eq!(&art.chain_bytes(&mut head).unwrap()[..], &bytes[n + 1..]);
        validate_chain(&mut art, &mut head);
    }

    #[test]
    fn prop_compare_identical_chains(capacity in 1usize..=15, bytes in bytes_strategy(48)) {
        let mut art = art(capacity);
        let mut left = chain(&mut art, &bytes);
        let mut right = chain(&mut art, &bytes);

        let cmp = art.compare_chains(&mut left, &mut right).unwrap();
        prop_assert_eq!(cmp.outcome, ChainOutcome::Equal);
        prop_assert_eq!(cmp.matched, bytes.len());
        prop_assert!(art.leaf(cmp.left).is_some() && art.leaf(cmp.right).is_some());

        art.release_matched(&cmp, &mut right);
        prop_assert_eq!(art.stats().prefix_nodes, bytes.len().div_ceil(capacity));
        prop_assert!(art.leaf(right).is_some());
    }

    #[test]
    fn prop_compare_finds_absolute_mismatch(
        capacity in 1usize..=15,
        bytes in bytes_strategy(48),
        at in any::<prop::sample::Index>(),
        delta in 1u8..=255,
        loaded in any::<bool>(),
    ) {
        let k = at.index(bytes.len());
        let mut other = bytes.clone();
        other[k] = other[k].wrapping_add(delta);

        let mut art = art(capacity);
        let mut left = chain(&mut art, &bytes);
        let mut right = chain(&mut art, &other);
        if loaded {
            left = reload(&mut art, &mut left);
            right = reload(&mut art, &mut right);
        }

        let cmp = art.compare_chains(&mut left, &mut right).unwrap();
        prop_assert_eq!(cmp.outcome, ChainOutcome::Mismatch { position: k % capacity });
        prop_assert_eq!(cmp.matched, k);
        prop_assert_eq!(cmp.consumed().len(), k / capacity);

        let live = art.stats().prefix_nodes;
        art.release_matched(&cmp, &mut right);
        prop_assert_eq!(art.stats().prefix_nodes, live - k / capacity);
        let rest = &other[k / capacity * capacity..];
        prop_assert_eq!(&art.chain_bytes(&mut right).unwrap()[..], rest);
        prop_assert_eq!(&art.chain_bytes(&mut left).unwrap(), &bytes);
    }

    #[test]
    fn prop_compare_contained_chain(
        capacity in 1usize..=15,
        bytes in prop::collection::vec(any::<u8>(), 2..=48),
        cut in any::<prop::sample::Index>(),
    ) {
        let m = 1 + cut.index(bytes.len() - 1);
        let mut art = art(capacity);
        let mut left = chain(&mut art, &bytes);
        let mut right = chain(&mut art, &bytes[..m]);

        let cmp = art.compare_chains(&mut left, &mut right).unwrap();
        prop_assert_eq!(
            cmp.outcome,
            ChainOutcome::Contained { position: m % capacity, longer: Side::Left }
        );
        prop_assert_eq!(cmp.matched, m);
        prop_assert_eq!(cmp.consumed().len(), m / capacity);
        prop_assert!(art.leaf(cmp.right).is_some());

        art.release_matched(&cmp, &mut left);
        let rest = &bytes[m / capacity * capacity..];
        prop_assert_eq!(&art.chain_bytes(&mut left).unwrap()[..], rest);
    }

    #[test]
    fn prop_serialize_roundtrip(
        capacity in 1usize..=15,
        block_size in 32usize..=96,
        seed in any::<u64>(),
    ) {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let bytes: Vec<u8> = (0..3 * capacity + 2).map(|_| rng.gen()).collect();

        let blocks = Arc::new(MemoryBlockManager::new(block_size).unwrap());
        let config = ArtConfig::default().with_prefix_capacity(capacity);
        let mut art = Art::with_block_manager(config, blocks).unwrap();
        let mut head = chain(&mut art, &bytes);
        let nodes = art.chain_len(&mut head).unwrap();

        let location = art.checkpoint(head).unwrap();
        art.free(&mut head);

        let mut loaded = art.load(location);
        prop_assert_eq!(art.chain_bytes(&mut loaded).unwrap(), bytes);
        prop_assert_eq!(art.chain_len(&mut loaded).unwrap(), nodes);
        validate_chain(&mut art, &mut loaded);
    }

    #[test]
    fn prop_mutations_match_model(
        capacity in 1usize..=15,
        initial in bytes_strategy(40),
        ops in prop::collection::vec(any::<Op>(), 0..64),
    ) {
        let mut art = art(capacity);
        let mut head = chain(&mut art, &initial);
        let mut model = initial;

        for op in ops {
            // Only the head; after a checkpoint its successors stay on disk
            // until an operation follows them.
            art.materialize(&mut head).unwrap();
            match op {
                Op::Reduce(n) => {
                    if !head.is_prefix() {
                        continue;
                    }
                    let n = n % art.prefix_node(head).unwrap().count();
                    art.reduce(&mut head, n).unwrap();
                    model.drain(..=n);
                }
                Op::SplitRejoin(position) => {
                    if !head.is_prefix() {
                        continue;
                    }
                    let node = *art.prefix_node(head).unwrap();
                    let position = position % node.count();
                    let child = art.split(&mut head, position).unwrap();
                    art.concatenate(&mut head, node.bytes()[position], child).unwrap();
                }
                Op::Extend(byte, extra) => {
                    let end = terminal(&mut art, &mut head);
                    let key = ArtKey::from_bytes(&extra);
                    let child = art.new_prefix_from_key(&key, 0, extra.len(), end);
                    art.concatenate(&mut head, byte, child).unwrap();
                    model.push(byte);
                    model.extend_from_slice(&extra);
                }
                Op::AppendByte(byte) => {
                    if !head.is_prefix() {
                        continue;
                    }
                    let tail = art.chain_tail(head).unwrap();
                    art.append_byte(tail, byte);
                    model.push(byte);
                }
                Op::Checkpoint => {
                    prop_assert_eq!(&art.chain_bytes(&mut head).unwrap(), &model);
                    validate_chain(&mut art, &mut head);
                    head = reload(&mut art, &mut head);
                    continue;
                }
            }

            prop_assert_eq!(&art.chain_bytes(&mut head).unwrap(), &model);
            validate_chain(&mut art, &mut head);
        }

        prop_assert_eq!(&art.chain_bytes(&mut head).unwrap(), &model);
        validate_chain(&mut art, &mut head);
    }
}
