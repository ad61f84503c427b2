// kernel/fs/src/iso9660/names.rs
// Joliet and plain ISO9660 name decoding
// ============================================================================
// Copyright (c) 2025 Cartesian School - Siergej Sobolewski
// SPDX-License-Identifier: BSD-3-Clause

use crate::name::Name;

/// Big-endian UCS-2 to ASCII. Stops at the `;` version separator; code
/// points outside ASCII become `_`.
pub fn joliet_name(raw: &[u8], out: &mut Name) {
    out.clear();
    for pair in raw.chunks_exact(2) {
        let ch = u16::from_be_bytes([pair[0], pair[1]]);
        match ch {
            // U+0000 would end the name as a C string; never store it
            0 => break,
            0x3B => break,
            1..=0x7F => {
                out.push(ch as u8);
            }
            _ => {
                out.push(b'_');
            }
        }
    }
}

/// `README.TXT;1` -> `readme.txt`, `DOCS.;1` -> `docs`.
pub fn plain_name(raw: &[u8], out: &mut Name) {
    out.clear();
    let end = raw.iter().position(|&b| b == b';').unwrap_or(raw.len());
    out.extend(&raw[..end]);
    if out.as_bytes().last() == Some(&b'.') {
        out.pop();
    }
    out.make_ascii_lowercase();
}
