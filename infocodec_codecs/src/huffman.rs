//! Canonical Huffman coding of 8-bit symbols.
//!
//! Code lengths come from the classic two-lowest merge; codes are then
//! reassigned canonically, ordered by `(length, symbol)`, so the codebook is
//! fully determined by the symbol frequencies. Bits are packed MSB-first and
//! the final byte is zero-padded; metadata records the exact bit count.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use infocodec_core::codec::{alloc_pixels, capture_shape, restore_shape, Codec, CodecStats, StatsDetail};
use infocodec_core::format::{Codebook, Metadata, Method, MethodParams};
use infocodec_core::metrics::{entropy, histogram};
use infocodec_core::{Error, Image, Result};
use tracing::debug;

/// Longest code the packer can emit.
pub const MAX_CODE_LEN: u32 = 64;

#[derive(Debug, Default, Clone)]
pub struct HuffmanCodec {
    stats: Option<CodecStats>,
}

// ── Code construction ───────────────────────────────────────────────────────

/// `(symbol, code length)` for every symbol with a nonzero count.
///
/// Ties between equal frequencies go to the node inserted first: leaves in
/// ascending symbol order, then internal nodes in creation order.
pub fn code_lengths(counts: &[u64; 256]) -> Vec<(u8, u32)> {
    // children[i] is `None` for leaves.
    let mut children: Vec<Option<(usize, usize)>> = Vec::new();
    let mut symbols: Vec<u8> = Vec::new();
    let mut heap = BinaryHeap::new();

    for (sym, &count) in counts.iter().enumerate() {
        if count > 0 {
            let id = children.len();
            children.push(None);
            symbols.push(sym as u8);
            heap.push(Reverse((count, id)));
        }
    }
    match symbols.len() {
        0 => return Vec::new(),
        1 => return vec![(symbols[0], 1)],
        _ => {}
    }

    while heap.len() > 1 {
        let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        let id = children.len();
        children.push(Some((a, b)));
        heap.push(Reverse((fa + fb, id)));
    }

    // Depth-first walk from the root (the last node created).
    let mut depth = vec![0u32; children.len()];
    let mut lengths = Vec::with_capacity(symbols.len());
    let mut stack = vec![children.len() - 1];
    while let Some(node) = stack.pop() {
        match children[node] {
            Some((a, b)) => {
                depth[a] = depth[node] + 1;
                depth[b] = depth[node] + 1;
                stack.push(a);
                stack.push(b);
            }
            // Leaves were created first, so their id is their index in `symbols`.
            None => lengths.push((symbols[node], depth[node])),
        }
    }
    lengths.sort_unstable_by_key(|&(sym, _)| sym);
    lengths
}

/// Assign canonical codes: `(symbol → (code, length))`.
pub fn canonical_codes(lengths: &[(u8, u32)]) -> BTreeMap<u8, (u64, u32)> {
    let mut ordered = lengths.to_vec();
    ordered.sort_unstable_by_key(|&(sym, len)| (len, sym));

    let mut codes = BTreeMap::new();
    let mut code = 0u64;
    let mut prev_len = 0u32;
    for (i, &(sym, len)) in ordered.iter().enumerate() {
        if i > 0 {
            code = (code + 1) << (len - prev_len);
        }
        codes.insert(sym, (code, len));
        prev_len = len;
    }
    codes
}

fn code_string(code: u64, len: u32) -> String {
    (0..len)
        .rev()
        .map(|bit| if (code >> bit) & 1 == 1 { '1' } else { '0' })
        .collect()
}

// ── Bit I/O ─────────────────────────────────────────────────────────────────

/// MSB-first bit packer.
struct BitWriter {
    out: Vec<u8>,
    current: u8,
    filled: u32,
    bits: u64,
}

impl BitWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            out: Vec::with_capacity(bytes),
            current: 0,
            filled: 0,
            bits: 0,
        }
    }

    fn write(&mut self, code: u64, len: u32) {
        for bit in (0..len).rev() {
            self.current = (self.current << 1) | ((code >> bit) & 1) as u8;
            self.filled += 1;
            if self.filled == 8 {
                self.out.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }
        self.bits += len as u64;
    }

    fn finish(mut self) -> (Vec<u8>, u64) {
        if self.filled > 0 {
            self.out.push(self.current << (8 - self.filled));
        }
        (self.out, self.bits)
    }
}

// ── Decode tree ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct DecodeNode {
    children: [Option<u32>; 2],
    symbol: Option<u8>,
}

/// Binary trie over the codebook's bit strings.
struct DecodeTree {
    nodes: Vec<DecodeNode>,
}

impl DecodeTree {
    fn from_codebook(book: &Codebook) -> Result<Self> {
        if book.is_empty() {
            return Err(Error::corrupt("huffman codebook is empty"));
        }
        let mut nodes = vec![DecodeNode::default()];
        for (symbol, code) in book.iter() {
            if code.is_empty() {
                return Err(Error::corrupt(format!("symbol {symbol} has an empty code")));
            }
            let mut node = 0usize;
            for ch in code.chars() {
                let bit = match ch {
                    '0' => 0,
                    '1' => 1,
                    other => {
                        return Err(Error::corrupt(format!(
                            "code for symbol {symbol} contains non-binary character '{other}'"
                        )))
                    }
                };
                if nodes[node].symbol.is_some() {
                    return Err(not_prefix_free(symbol));
                }
                node = match nodes[node].children[bit] {
                    Some(next) => next as usize,
                    None => {
                        let next = nodes.len();
                        nodes.push(DecodeNode::default());
                        nodes[node].children[bit] = Some(next as u32);
                        next
                    }
                };
            }
            let leaf = &mut nodes[node];
            if leaf.symbol.is_some() || leaf.children.iter().any(Option::is_some) {
                return Err(not_prefix_free(symbol));
            }
            leaf.symbol = Some(symbol);
        }
        Ok(Self { nodes })
    }

    fn decode(&self, payload: &[u8], bit_count: u64, expected: usize) -> Result<Vec<u8>> {
        let available = payload.len() as u64 * 8;
        if available < bit_count {
            return Err(Error::decode(
                "huffman",
                format!("payload holds {available} bits, metadata declares {bit_count}"),
            ));
        }
        if bit_count.div_ceil(8) != payload.len() as u64 {
            return Err(Error::decode(
                "huffman",
                format!("{} trailing bytes after {bit_count} bits", payload.len() as u64 - bit_count.div_ceil(8)),
            ));
        }

        if expected as u64 > bit_count {
            return Err(Error::decode(
                "huffman",
                format!("{bit_count} bits cannot hold {expected} symbols of at least one bit each"),
            ));
        }

        let mut out = alloc_pixels(expected)?;
        let mut node = 0usize;
        for i in 0..bit_count {
            let byte = payload[(i / 8) as usize];
            let bit = ((byte >> (7 - (i % 8))) & 1) as usize;
            node = match self.nodes[node].children[bit] {
                Some(next) => next as usize,
                None => {
                    return Err(Error::decode(
                        "huffman",
                        format!("bit {i} follows a branch absent from the codebook"),
                    ))
                }
            };
            if let Some(symbol) = self.nodes[node].symbol {
                if out.len() == expected {
                    return Err(Error::shape_mismatch(expected, expected + 1));
                }
                out.push(symbol);
                node = 0;
            }
        }
        if node != 0 {
            return Err(Error::decode("huffman", "bit stream ends inside a code"));
        }
        Ok(out)
    }
}

fn not_prefix_free(symbol: u8) -> Error {
    Error::corrupt(format!("codebook is not prefix-free at symbol {symbol}"))
}

// ── Codec ───────────────────────────────────────────────────────────────────

impl Codec for HuffmanCodec {
    fn method(&self) -> Method {
        Method::Huffman
    }

    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)> {
        let data = image.pixels();
        let counts = histogram(data);
        let lengths = code_lengths(&counts);
        if let Some(&(sym, len)) = lengths.iter().find(|&&(_, len)| len > MAX_CODE_LEN) {
            return Err(Error::invalid_parameter(
                "huffman",
                format!("symbol {sym} needs a {len}-bit code, limit is {MAX_CODE_LEN}"),
            ));
        }
        let codes = canonical_codes(&lengths);

        let mut table = [(0u64, 0u32); 256];
        for (&sym, &code) in &codes {
            table[sym as usize] = code;
        }
        let mut writer = BitWriter::with_capacity(data.len() / 2);
        for &b in data {
            let (code, len) = table[b as usize];
            writer.write(code, len);
        }
        let (payload, bit_count) = writer.finish();

        let codebook = Codebook(
            codes
                .iter()
                .map(|(&sym, &(code, len))| (sym, code_string(code, len)))
                .collect(),
        );
        let symbols = codebook.len();
        let average_code_length = bit_count as f64 / data.len() as f64;
        let coding_efficiency_percent = if average_code_length > 0.0 {
            entropy(data) / average_code_length * 100.0
        } else {
            0.0
        };

        let metadata = Metadata::new(capture_shape(image), MethodParams::Huffman { codebook, bit_count })
            .with_checksum(&payload);
        self.stats = Some(CodecStats::measure(
            Method::Huffman,
            image,
            payload.len(),
            StatsDetail::Huffman {
                symbols,
                average_code_length,
                coding_efficiency_percent,
            },
        ));
        debug!(symbols, bit_count, average_code_length, "huffman compress");
        Ok((payload, metadata))
    }

    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image> {
        let MethodParams::Huffman { codebook, bit_count } = &metadata.params else {
            return Err(Error::corrupt(format!(
                "metadata is for method '{}', not 'huffman'",
                metadata.method()
            )));
        };
        let shape = metadata.shape()?;
        let tree = DecodeTree::from_codebook(codebook)?;
        let pixels = tree.decode(payload, *bit_count, shape.len())?;
        restore_shape(pixels, shape)
    }

    fn stats(&self) -> Option<&CodecStats> {
        self.stats.as_ref()
    }
}
