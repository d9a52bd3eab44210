//! Residue packing tables and expansion routines
//!
//! Nucleotide sequences are stored 2 bits per base (`NA2`, A=0 C=1 G=2 T=3),
//! four bases per byte, first base in the high bits. The last byte of every
//! sequence stores up to three bases in its high bits and, in its low two bits,
//! how many of those slots are used.
//!
//! Decoding expands to one of:
//! * `NA4`: NCBI4na codes, two per byte (high nibble first)
//! * `NA8`: NCBI4na codes, one per byte
//! * blast-native `NA8`: `NA8` remapped through [`NCBI4NA_TO_BLASTNA`], framed by sentinels
//!
//! The expansion tables are computed at compile time.

/// Sentinel byte framing blast-native nucleotide buffers
pub const NUCLEOTIDE_SENTINEL: u8 = 15;

/// Number of bases packed into one byte
pub const BASES_PER_BYTE: usize = 4;

/// NCBI4na codes indexed by residue letter order `-ACMGRSVTWYHKDBN`
pub const NCBI4NA_TO_IUPAC: &[u8; 16] = b"-ACMGRSVTWYHKDBN";

/// NCBIstdaa codes to IUPAC amino-acid letters
pub const NCBISTDAA_TO_IUPAC: &[u8; 28] = b"-ABCDEFGHIKLMNPQRSTVWXYZU*OJ";

/// NCBI4na code to blast-native nucleotide code
pub const NCBI4NA_TO_BLASTNA: [u8; 16] = [
    15, // gap
    0,  // A
    1,  // C
    6,  // M
    2,  // G
    4,  // R
    9,  // S
    13, // V
    3,  // T
    8,  // W
    5,  // Y
    12, // H
    7,  // K
    11, // D
    10, // B
    14, // N
];

/// NCBI4na code of a 2-bit base
#[inline]
#[must_use]
pub const fn na2_to_na4_code(base: u8) -> u8 {
    1 << (base & 0x3)
}

const fn build_na2_to_na8() -> [[u8; 4]; 256] {
    let mut table = [[0u8; 4]; 256];
    let mut byte = 0;
    while byte < 256 {
        let b = byte as u8;
        table[byte] = [
            na2_to_na4_code(b >> 6),
            na2_to_na4_code(b >> 4),
            na2_to_na4_code(b >> 2),
            na2_to_na4_code(b),
        ];
        byte += 1;
    }
    table
}

const fn build_na2_to_na4() -> [[u8; 2]; 256] {
    let mut table = [[0u8; 2]; 256];
    let mut byte = 0;
    while byte < 256 {
        let b = byte as u8;
        table[byte] = [
            (na2_to_na4_code(b >> 6) << 4) | na2_to_na4_code(b >> 4),
            (na2_to_na4_code(b >> 2) << 4) | na2_to_na4_code(b),
        ];
        byte += 1;
    }
    table
}

/// One packed byte to four `NA8` bytes
pub static NA2_TO_NA8: [[u8; 4]; 256] = build_na2_to_na8();

/// One packed byte to two `NA4` bytes (512 entries)
pub static NA2_TO_NA4: [[u8; 2]; 256] = build_na2_to_na4();

/// Exact base count of a packed sequence region (including its final byte).
///
/// Returns `None` for an empty region, which cannot carry the remainder byte.
#[inline]
#[must_use]
pub fn na2_length_exact(packed: &[u8]) -> Option<usize> {
    let (&last, whole) = packed.split_last()?;
    Some(whole.len() * BASES_PER_BYTE + usize::from(last & 0x3))
}

/// Approximate base count that avoids reading the final byte.
///
/// The remainder is estimated as `oid & 3`, which is unbiased over many
/// sequences but not exact for any particular one.
#[inline]
#[must_use]
pub fn na2_length_approx(packed_len: usize, oid: usize) -> usize {
    packed_len.saturating_sub(1) * BASES_PER_BYTE + (oid & 0x3)
}

/// Expands `len` bases of a packed sequence into one NCBI4na code per byte.
///
/// # Example
///
/// ```
/// use seqdb::nuc;
///
/// // "ACGT" followed by a remainder byte holding "GA" and a count of 2
/// let packed = [0b00_01_10_11, 0b10_00_00_10];
/// let mut out = Vec::new();
/// nuc::expand_na8(&packed, 6, &mut out);
/// assert_eq!(out, [1, 2, 4, 8, 4, 1]);
/// ```
pub fn expand_na8(packed: &[u8], len: usize, out: &mut Vec<u8>) {
    out.reserve(len);
    let whole = len / BASES_PER_BYTE;
    for &byte in &packed[..whole] {
        out.extend_from_slice(&NA2_TO_NA8[byte as usize]);
    }
    let rem = len % BASES_PER_BYTE;
    if rem > 0 {
        out.extend_from_slice(&NA2_TO_NA8[packed[whole] as usize][..rem]);
    }
}

/// Expands `len` bases of a packed sequence into NCBI4na codes, two per byte.
///
/// An odd final base occupies the high nibble of the last byte.
pub fn expand_na4(packed: &[u8], len: usize, out: &mut Vec<u8>) {
    out.reserve(len.div_ceil(2));
    let whole = len / BASES_PER_BYTE;
    for &byte in &packed[..whole] {
        out.extend_from_slice(&NA2_TO_NA4[byte as usize]);
    }
    let rem = len % BASES_PER_BYTE;
    if rem > 0 {
        let pair = NA2_TO_NA4[packed[whole] as usize];
        match rem {
            1 => out.push(pair[0] & 0xF0),
            2 => out.push(pair[0]),
            _ => out.extend_from_slice(&[pair[0], pair[1] & 0xF0]),
        }
    }
}

/// Remaps NCBI4na codes in place to blast-native codes
pub fn to_blastna(buf: &mut [u8]) {
    for code in buf {
        *code = NCBI4NA_TO_BLASTNA[(*code & 0xF) as usize];
    }
}

/// Translates one-per-byte NCBI4na codes to IUPAC letters
#[must_use]
pub fn na8_to_iupac(codes: &[u8]) -> Vec<u8> {
    codes
        .iter()
        .map(|&c| NCBI4NA_TO_IUPAC[(c & 0xF) as usize])
        .collect()
}

/// Translates NCBIstdaa codes to IUPAC letters; unknown codes become `X`
#[must_use]
pub fn stdaa_to_iupac(codes: &[u8]) -> Vec<u8> {
    codes
        .iter()
        .map(|&c| NCBISTDAA_TO_IUPAC.get(c as usize).copied().unwrap_or(b'X'))
        .collect()
}

/// Reads the NCBI4na code of base `pos` from an `NA4` buffer
#[inline]
#[must_use]
pub fn na4_get(buf: &[u8], pos: usize) -> u8 {
    let byte = buf[pos / 2];
    if pos % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

/// Writes the NCBI4na code of base `pos` into an `NA4` buffer
#[inline]
pub fn na4_set(buf: &mut [u8], pos: usize, code: u8) {
    let byte = &mut buf[pos / 2];
    if pos % 2 == 0 {
        *byte = (*byte & 0x0F) | (code << 4);
    } else {
        *byte = (*byte & 0xF0) | (code & 0x0F);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packs ACGT text the way the sequence file stores it
    fn pack(seq: &[u8]) -> Vec<u8> {
        crate::testing::pack_na2(seq)
    }

    #[test]
    fn test_tables_agree() {
        for byte in 0..=255usize {
            let na8 = NA2_TO_NA8[byte];
            let na4 = NA2_TO_NA4[byte];
            assert_eq!(na4[0] >> 4, na8[0]);
            assert_eq!(na4[0] & 0xF, na8[1]);
            assert_eq!(na4[1] >> 4, na8[2]);
            assert_eq!(na4[1] & 0xF, na8[3]);
        }
    }

    #[test]
    fn test_length_exact() {
        for len in 0..12 {
            let seq = b"ACGTTGCAACGT";
            let packed = pack(&seq[..len]);
            assert_eq!(na2_length_exact(&packed), Some(len));
        }
        assert_eq!(na2_length_exact(&[]), None);
    }

    #[test]
    fn test_length_approx_bias() {
        let packed = pack(b"ACGTACG");
        assert_eq!(na2_length_approx(packed.len(), 0), 4);
        assert_eq!(na2_length_approx(packed.len(), 3), 7);
        assert_eq!(na2_length_approx(packed.len(), 7), 7);
        assert_eq!(na2_length_approx(0, 2), 2);
    }

    #[test]
    fn test_expand_na8() {
        let seq = b"ACGTTGCAA";
        let packed = pack(seq);
        let mut out = Vec::new();
        expand_na8(&packed, seq.len(), &mut out);
        assert_eq!(na8_to_iupac(&out), seq.to_vec());
    }

    #[test]
    fn test_expand_na4_matches_na8() {
        let seq = b"ACGTTGCAACG";
        let packed = pack(seq);
        for len in 0..=seq.len() {
            let mut na8 = Vec::new();
            let mut na4 = Vec::new();
            expand_na8(&packed, len, &mut na8);
            expand_na4(&packed, len, &mut na4);
            assert_eq!(na4.len(), len.div_ceil(2));
            for (pos, &code) in na8.iter().enumerate() {
                assert_eq!(na4_get(&na4, pos), code);
            }
        }
    }

    #[test]
    fn test_blastna_table() {
        let mut buf = [1, 2, 4, 8, 9, 15, 0];
        to_blastna(&mut buf);
        assert_eq!(buf, [0, 1, 2, 3, 8, 14, 15]);
    }

    #[test]
    fn test_na4_set() {
        let mut buf = vec![0x12, 0x48];
        na4_set(&mut buf, 1, 0xF);
        na4_set(&mut buf, 2, 0x9);
        assert_eq!(buf, [0x1F, 0x98]);
    }

    #[test]
    fn test_stdaa_to_iupac() {
        assert_eq!(stdaa_to_iupac(&[1, 3, 25, 200]), b"AC*X".to_vec());
    }
}
