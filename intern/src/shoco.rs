//! Short-string coder for the `Shoco` compression selector.
//!
//! Frequent ASCII bigrams pack into a single code byte with the high bit
//! set; plain ASCII passes through unchanged; bytes with the high bit set
//! are escaped. The coder is a pure function pair: `decompress(compress(b))`
//! always yields `b`, and inputs with no packable bigrams (or many high
//! bytes) may expand.
//!
//! Output grammar:
//!
//! ```text
//! 0x00..=0x7F          literal byte
//! 0x80 + i             bigram PAIRS[i], i < PAIRS.len()
//! 0xFF <byte>          escaped literal (byte >= 0x80)
//! ```

/// Escape prefix for bytes outside the literal range.
const ESCAPE: u8 = 0xFF;

/// First bigram code point.
const PAIR_BASE: u8 = 0x80;

/// Packable bigrams, sorted so codes can be resolved by binary search.
///
/// The set covers the most frequent English letter pairs, which dominate
/// metric names, tag keys, and label values.
const PAIRS: &[[u8; 2]] = &[
    *b"ab", *b"ac", *b"ad", *b"al", *b"am", *b"an", *b"ar", *b"as", *b"at",
    *b"be", *b"bl", *b"ca", *b"ce", *b"ch", *b"co", *b"ct", *b"de", *b"di",
    *b"do", *b"ea", *b"ec", *b"ed", *b"ee", *b"el", *b"em", *b"en", *b"er",
    *b"es", *b"et", *b"ex", *b"fi", *b"fo", *b"fr", *b"ge", *b"gr", *b"ha",
    *b"he", *b"hi", *b"ho", *b"ia", *b"ic", *b"id", *b"ie", *b"ig", *b"il",
    *b"im", *b"in", *b"io", *b"ir", *b"is", *b"it", *b"iv", *b"la", *b"ld",
    *b"le", *b"li", *b"ll", *b"lo", *b"ly", *b"ma", *b"me", *b"mi", *b"mo",
    *b"mp", *b"na", *b"nc", *b"nd", *b"ne", *b"ng", *b"ni", *b"no", *b"ns",
    *b"nt", *b"of", *b"ol", *b"om", *b"on", *b"oo", *b"op", *b"or", *b"os",
    *b"ot", *b"ou", *b"ow", *b"pa", *b"pe", *b"pl", *b"po", *b"pr", *b"ra",
    *b"rd", *b"re", *b"ri", *b"ro", *b"rs", *b"rt", *b"ry", *b"sa", *b"se",
    *b"sh", *b"si", *b"so", *b"sp", *b"ss", *b"st", *b"su", *b"ta", *b"te",
    *b"th", *b"ti", *b"to", *b"tr", *b"ts", *b"ty", *b"ul", *b"un", *b"ur",
    *b"us", *b"ut", *b"ve", *b"vi", *b"wa", *b"we", *b"wh", *b"wi", *b"wo",
];

/// Look up the code byte for a bigram, if the pair is in the table.
#[inline]
fn pair_code(a: u8, b: u8) -> Option<u8> {
    PAIRS
        .binary_search(&[a, b])
        .ok()
        .map(|i| PAIR_BASE + i as u8)
}

/// Compress `src` with greedy bigram packing.
pub fn compress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if i + 1 < src.len() {
            if let Some(code) = pair_code(src[i], src[i + 1]) {
                out.push(code);
                i += 2;
                continue;
            }
        }
        let b = src[i];
        if b < 0x80 {
            out.push(b);
        } else {
            out.push(ESCAPE);
            out.push(b);
        }
        i += 1;
    }
    out
}

/// Decompress `src`, or `None` if the input is not valid coder output.
///
/// Invalid inputs: a code byte past the bigram table, or an escape prefix
/// at the end of the input.
pub fn decompress(src: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(src.len() * 2);
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b < PAIR_BASE {
            out.push(b);
            i += 1;
        } else if b == ESCAPE {
            out.push(*src.get(i + 1)?);
            i += 2;
        } else {
            let pair = PAIRS.get((b - PAIR_BASE) as usize)?;
            out.extend_from_slice(pair);
            i += 1;
        }
    }
    Some(out)
}
