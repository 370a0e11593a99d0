//! Huffman tree construction and code assignment.
//!
//! The tree is never stored in an archive. Writer and reader both call
//! [`HuffmanTree::build`] on the same per-symbol weights, and the merge order
//! below is fixed so that both sides arrive at the same tree, bit for bit.
//!
//! Construction works on a list of 256 leaves in ascending symbol order:
//!
//! 1. find `p1`, the earliest node of minimum weight, and `p2`, the earliest
//!    node of minimum weight other than `p1`;
//! 2. if `p1` weighs zero, drop it from the list;
//! 3. otherwise replace it with a new internal node whose bit-0 child is the
//!    node at `p2` and whose bit-1 child is the node at `p1`, then remove `p2`;
//! 4. repeat until one node remains.

use crate::bit_stream::BitReader;
use crate::frequency::{FrequencyTable, ALPHABET_SIZE};
use log::trace;
use std::fmt;

/// Longest codeword a [`Codeword`] can hold.
///
/// Weights total at most `u64::MAX`, which bounds the tree depth near 92
/// (a Fibonacci-weighted alphabet), so real trees never get here.
pub const MAX_CODE_LEN: usize = u128::BITS as usize;

/// A bit string assigned to one symbol, first bit most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Codeword {
    bits: u128,
    len: u8,
}

impl Codeword {
    /// Create a codeword from the low `len` bits of `bits`.
    pub fn new(bits: u128, len: usize) -> Self {
        debug_assert!(len <= MAX_CODE_LEN);
        let bits = if len >= MAX_CODE_LEN {
            bits
        } else {
            bits & ((1u128 << len) - 1)
        };
        Self {
            bits,
            len: len as u8,
        }
    }

    /// The zero-length codeword of a single-symbol tree.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn value(&self) -> u128 {
        self.bits
    }

    /// The bits in transmission order.
    pub fn bits(&self) -> impl Iterator<Item = bool> {
        let bits = self.bits;
        (0..self.len).rev().map(move |shift| (bits >> shift) & 1 == 1)
    }

    /// This codeword followed by one more bit.
    fn push(&self, bit: bool) -> Self {
        Self {
            bits: (self.bits << 1) | bit as u128,
            len: self.len + 1,
        }
    }

    /// Parse the digit field of a header record.
    ///
    /// Accepts the zero-padded form written by this crate (`"0011"` for length
    /// 4) and the unpadded form of older writers (`"11"`). The empty codeword
    /// is written as `"0"`.
    pub fn parse(digits: &str, len: usize) -> Option<Self> {
        if digits.is_empty() || len > MAX_CODE_LEN {
            return None;
        }
        if !digits.bytes().all(|b| b == b'0' || b == b'1') {
            return None;
        }
        let significant = digits.trim_start_matches('0');
        if significant.len() > len {
            return None;
        }
        let bits = if significant.is_empty() {
            0
        } else {
            u128::from_str_radix(significant, 2).ok()?
        };
        Some(Self::new(bits, len))
    }
}

impl fmt::Display for Codeword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            return f.write_str("0");
        }
        write!(f, "{:0width$b}", self.bits, width = self.len as usize)
    }
}

/// A node of the Huffman tree. Each node owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf {
        symbol: u8,
        weight: u64,
    },
    Internal {
        weight: u64,
        /// Child reached by bit 0.
        zero: Box<Node>,
        /// Child reached by bit 1.
        one: Box<Node>,
    },
}

impl Node {
    pub fn weight(&self) -> u64 {
        match self {
            Node::Leaf { weight, .. } | Node::Internal { weight, .. } => *weight,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    fn merge(zero: Node, one: Node) -> Node {
        Node::Internal {
            weight: zero.weight() + one.weight(),
            zero: Box::new(zero),
            one: Box::new(one),
        }
    }
}

/// Symbol to codeword map produced by walking a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    codes: [Option<Codeword>; ALPHABET_SIZE],
}

impl Alphabet {
    fn new() -> Self {
        Self {
            codes: [None; ALPHABET_SIZE],
        }
    }

    pub fn get(&self, symbol: u8) -> Option<Codeword> {
        self.codes[symbol as usize]
    }

    /// Coded symbols in ascending byte order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, Codeword)> + '_ {
        self.codes
            .iter()
            .enumerate()
            .filter_map(|(symbol, code)| code.map(|code| (symbol as u8, code)))
    }

    /// Number of coded symbols.
    pub fn len(&self) -> usize {
        self.codes.iter().filter(|code| code.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the packed body in bits: the sum of weight times code length.
    pub fn encoded_bits(&self, frequencies: &FrequencyTable) -> u128 {
        self.iter()
            .map(|(symbol, code)| frequencies.count(symbol) as u128 * code.len() as u128)
            .sum()
    }

    fn assign(&mut self, node: &Node, prefix: Codeword) {
        match node {
            Node::Leaf { symbol, .. } => self.codes[*symbol as usize] = Some(prefix),
            Node::Internal { zero, one, .. } => {
                self.assign(zero, prefix.push(false));
                self.assign(one, prefix.push(true));
            }
        }
    }
}

/// A Huffman tree over the symbols of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    root: Node,
    leaf_count: usize,
}

impl HuffmanTree {
    /// Build the tree for `frequencies`.
    /// Returns `None` when no symbol has a nonzero weight.
    pub fn build(frequencies: &FrequencyTable) -> Option<Self> {
        let mut nodes: Vec<Node> = frequencies
            .counts()
            .iter()
            .enumerate()
            .map(|(symbol, &weight)| Node::Leaf {
                symbol: symbol as u8,
                weight,
            })
            .collect();

        while let Some((p1, p2)) = two_smallest(&nodes) {
            if nodes[p1].weight() == 0 {
                nodes.remove(p1);
            } else {
                merge_at(&mut nodes, p1, p2);
            }
        }

        let root = nodes.pop()?;
        if root.weight() == 0 {
            return None;
        }
        let tree = Self {
            root,
            leaf_count: frequencies.distinct(),
        };
        trace!(
            "built Huffman tree: {} leaves, weight {}",
            tree.leaf_count,
            tree.weight()
        );
        Some(tree)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Total weight of all leaves.
    pub fn weight(&self) -> u64 {
        self.root.weight()
    }

    /// True when the tree is one leaf and every code is zero bits long.
    pub fn is_single_leaf(&self) -> bool {
        self.root.is_leaf()
    }

    /// Assign a codeword to every leaf, depth first, bit 0 before bit 1.
    pub fn alphabet(&self) -> Alphabet {
        let mut alphabet = Alphabet::new();
        alphabet.assign(&self.root, Codeword::empty());
        alphabet
    }

    /// A decoder positioned at the root.
    pub fn decoder(&self) -> SymbolDecoder<'_> {
        SymbolDecoder {
            root: &self.root,
            node: &self.root,
        }
    }
}

/// Walks a [`HuffmanTree`] one bit per edge.
///
/// The position in the tree survives between calls, so a codeword may be
/// split across several [`BitReader`]s over consecutive chunks of a body.
#[derive(Debug, Clone)]
pub struct SymbolDecoder<'t> {
    root: &'t Node,
    node: &'t Node,
}

impl<'t> SymbolDecoder<'t> {
    /// Continue the walk until a leaf is reached and return its symbol.
    /// Returns `None` if `reader` runs out of bits first; the partial walk is
    /// kept for the next reader.
    pub fn next_symbol(&mut self, reader: &mut BitReader) -> Option<u8> {
        loop {
            match self.node {
                Node::Leaf { symbol, .. } => {
                    self.node = self.root;
                    return Some(*symbol);
                }
                Node::Internal { zero, one, .. } => {
                    self.node = if reader.read_bit()? { one } else { zero };
                }
            }
        }
    }

    /// True when the walk has left the root without reaching a leaf.
    pub fn in_codeword(&self) -> bool {
        !std::ptr::eq(self.node, self.root)
    }
}

/// Indices of the earliest minimum-weight node and of the earliest
/// minimum-weight node other than it. `None` once fewer than two nodes remain.
fn two_smallest(nodes: &[Node]) -> Option<(usize, usize)> {
    if nodes.len() < 2 {
        return None;
    }
    let p1 = earliest_minimum(nodes, None)?;
    let p2 = earliest_minimum(nodes, Some(p1))?;
    Some((p1, p2))
}

fn earliest_minimum(nodes: &[Node], skip: Option<usize>) -> Option<usize> {
    // min_by_key keeps the first of equal elements.
    nodes
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != skip)
        .min_by_key(|(_, node)| node.weight())
        .map(|(index, _)| index)
}

/// Replace the node at `p1` with the merge of the nodes at `p2` (bit 0) and
/// `p1` (bit 1), then remove the node at `p2`.
fn merge_at(nodes: &mut Vec<Node>, p1: usize, p2: usize) {
    let (first, second) = if p1 < p2 {
        let at_p2 = nodes.remove(p2);
        let at_p1 = nodes.remove(p1);
        (at_p1, at_p2)
    } else {
        let at_p1 = nodes.remove(p1);
        let at_p2 = nodes.remove(p2);
        (at_p1, at_p2)
    };
    // After removing p2, everything behind it shifts left by one.
    let slot = if p2 < p1 { p1 - 1 } else { p1 };
    nodes.insert(slot, Node::merge(second, first));
}
