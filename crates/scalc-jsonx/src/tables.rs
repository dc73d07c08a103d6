//! Byte classification tables used by the scanners

const fn table(members: &[u8]) -> [bool; 256] {
    let mut t = [false; 256];
    let mut i = 0;
    while i < members.len() {
        t[members[i] as usize] = true;
        i += 1;
    }
    t
}

const fn with_range(mut t: [bool; 256], from: u8, to: u8) -> [bool; 256] {
    let mut c = from;
    while c <= to {
        t[c as usize] = true;
        c += 1;
    }
    t
}

const WHITESPACE: [bool; 256] = table(b" \t\n\r");
const STRUCTURAL: [bool; 256] = table(b"{}[]:,");
const IDENT_START: [bool; 256] = with_range(with_range(table(b"_$"), b'A', b'Z'), b'a', b'z');
const IDENT_PART: [bool; 256] = with_range(IDENT_START, b'0', b'9');

#[inline]
pub(crate) fn is_ws(b: u8) -> bool {
    WHITESPACE[b as usize]
}

/// `{ } [ ] : ,`
#[inline]
pub(crate) fn is_structural(b: u8) -> bool {
    STRUCTURAL[b as usize]
}

#[inline]
pub(crate) fn is_ident_start(b: u8) -> bool {
    IDENT_START[b as usize]
}

#[inline]
pub(crate) fn is_ident_part(b: u8) -> bool {
    IDENT_PART[b as usize]
}
