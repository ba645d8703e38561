//! A1-style address codec.
//!
//! Rows and columns are 0-based internally. Columns use bijective base-26
//! letters (A..Z, AA, AB, ...), rows are printed 1-based.

use crate::area::{CellArea, CellPos};

/// Error for addresses that do not match `^[A-Z]+[0-9]+$`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid cell address '{0}': expected letters followed by a row number (e.g. A1)")]
    Malformed(String),
    #[error("invalid cell address '{0}': row numbers start at 1")]
    ZeroRow(String),
    #[error("invalid cell address '{0}': coordinate out of range")]
    Overflow(String),
}

/// Convert 0-based column index to Excel-style letter(s).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters back to a 0-based index. Letters must be uppercase A-Z.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for b in letters.bytes() {
        if !b.is_ascii_uppercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add((b - b'A') as usize + 1)?;
    }
    Some(n - 1)
}

/// 0-based (row, col) to "A1".
pub fn to_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row as u128 + 1)
}

/// "A1" to 0-based (row, col).
pub fn parse_address(address: &str) -> Result<CellPos, AddressError> {
    let split = address
        .find(|c: char| !c.is_ascii_uppercase())
        .ok_or_else(|| AddressError::Malformed(address.to_string()))?;
    let (letters, digits) = address.split_at(split);

    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::Malformed(address.to_string()));
    }

    let col = letters_to_col(letters).ok_or_else(|| AddressError::Overflow(address.to_string()))?;
    let row_1based: usize = digits
        .parse()
        .map_err(|_| AddressError::Overflow(address.to_string()))?;
    if row_1based == 0 {
        return Err(AddressError::ZeroRow(address.to_string()));
    }

    Ok(CellPos::new(row_1based - 1, col))
}

/// Parse "A1:C5" (or a bare "B2") into an area.
///
/// Returns `None` on anything that doesn't parse; callers use this in
/// best-effort paths where a bad range is skipped rather than fatal.
/// Reversed corners ("C5:A1") are normalized.
pub fn parse_range(range: &str) -> Option<CellArea> {
    let (start, end) = match range.split_once(':') {
        Some((a, b)) => (parse_address(a).ok()?, parse_address(b).ok()?),
        None => {
            let p = parse_address(range).ok()?;
            (p, p)
        }
    };
    Some(CellArea::from_corners(start, end))
}

/// Format an area back to "A1:C5" ("A1" for single cells).
pub fn format_range(area: &CellArea) -> String {
    let start = to_address(area.row, area.col);
    if area.is_single_cell() {
        return start;
    }
    format!("{}:{}", start, to_address(area.end_row(), area.end_col()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_col_to_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(27), "AB");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
    }

    #[test]
    fn test_to_address() {
        assert_eq!(to_address(0, 0), "A1");
        assert_eq!(to_address(0, 26), "AA1");
        assert_eq!(to_address(9, 1), "B10");
        assert_eq!(to_address(usize::MAX, 0), format!("A{}", usize::MAX as u128 + 1));
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("A1").unwrap(), CellPos::new(0, 0));
        assert_eq!(parse_address("AA1").unwrap(), CellPos::new(0, 26));
        assert_eq!(parse_address("B10").unwrap(), CellPos::new(9, 1));
    }

    #[test]
    fn test_parse_address_rejects_malformed() {
        for bad in ["", "A", "1", "a1", "1A", "A1B", "A-1", "A 1", "A1:B2"] {
            assert!(
                matches!(parse_address(bad), Err(AddressError::Malformed(_))),
                "expected malformed for {bad:?}"
            );
        }
        assert_eq!(parse_address("A0"), Err(AddressError::ZeroRow("A0".into())));
    }

    #[test]
    fn test_parse_range() {
        let area = parse_range("A1:C5").unwrap();
        assert_eq!(area, CellArea::new(0, 0, 5, 3));
        assert_eq!(parse_range("B2").unwrap(), CellArea::new(1, 1, 1, 1));
        assert_eq!(parse_range("C5:A1").unwrap(), CellArea::new(0, 0, 5, 3));
        assert_eq!(parse_range("A1:"), None);
        assert_eq!(parse_range("nonsense"), None);
    }

    #[test]
    fn test_format_range() {
        assert_eq!(format_range(&CellArea::new(0, 0, 5, 3)), "A1:C5");
        assert_eq!(format_range(&CellArea::new(2, 2, 1, 1)), "C3");
    }

    proptest! {
        #[test]
        fn address_round_trip(row in 0usize..1_048_576, col in 0usize..16_384) {
            let addr = to_address(row, col);
            prop_assert_eq!(parse_address(&addr).unwrap(), CellPos::new(row, col));
        }

        #[test]
        fn range_round_trip(row in 0usize..10_000, col in 0usize..1_000, rows in 1usize..50, cols in 1usize..50) {
            let area = CellArea::new(row, col, rows, cols);
            prop_assert_eq!(parse_range(&format_range(&area)), Some(area));
        }
    }
}
