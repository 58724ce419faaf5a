//! Parser for single-cell references of the form `'Sheet Name'!$B$3`,
//! `Sheet1!B3` or `$B$3`.
//!
//! Grammar:
//!
//! ```text
//! reference := ["="] [sheet "!"] ["$"] letters ["$"] digits
//! sheet     := "'" (char | "''")+ "'" | (char - "!")+
//! ```

use crate::error::SheetError;
use crate::range::CellCoord;

/// A parsed reference; `sheet` is `None` when no prefix was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReference {
    pub sheet: Option<String>,
    pub coord: CellCoord,
}

pub fn parse_reference(input: &str) -> Result<SheetReference, SheetError> {
    let body = input.trim();
    let body = body.strip_prefix('=').unwrap_or(body);
    if body.is_empty() {
        return Err(SheetError::invalid_reference(input, "reference is empty"));
    }

    let (sheet, cell) = split_sheet(input, body)?;
    let coord = parse_cell(input, cell)?;
    Ok(SheetReference { sheet, coord })
}

/// Split off an optional sheet prefix, returning the sheet and the cell part
fn split_sheet<'a>(
    input: &str,
    body: &'a str,
) -> Result<(Option<String>, &'a str), SheetError> {
    if let Some(rest) = body.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                name.push('\'');
                continue;
            }
            let after = &rest[idx + 1..];
            let cell = after.strip_prefix('!').ok_or_else(|| {
                SheetError::invalid_reference(input, "expected '!' after quoted sheet name")
            })?;
            if name.is_empty() {
                return Err(SheetError::invalid_reference(input, "sheet name is empty"));
            }
            return Ok((Some(name), cell));
        }
        return Err(SheetError::invalid_reference(input, "unterminated quoted sheet name"));
    }

    match body.split_once('!') {
        Some(("", _)) => Err(SheetError::invalid_reference(input, "sheet name is empty")),
        Some((sheet, cell)) => Ok((Some(sheet.to_string()), cell)),
        None => Ok((None, body)),
    }
}

fn parse_cell(input: &str, cell: &str) -> Result<CellCoord, SheetError> {
    let rest = cell.strip_prefix('$').unwrap_or(cell);

    let letters_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let (letters, rest) = rest.split_at(letters_end);
    if letters.is_empty() {
        return Err(SheetError::invalid_reference(input, "expected column letters"));
    }

    let rest = rest.strip_prefix('$').unwrap_or(rest);
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, trailing) = rest.split_at(digits_end);
    if digits.is_empty() {
        return Err(SheetError::invalid_reference(input, "expected row digits"));
    }
    if trailing.starts_with(':') {
        return Err(SheetError::invalid_reference(
            input,
            "range references are not supported",
        ));
    }
    if !trailing.is_empty() {
        return Err(SheetError::invalid_reference(
            input,
            format!("unexpected trailing characters {trailing:?}"),
        ));
    }

    CellCoord::from_a1(&format!("{letters}{digits}"))
        .ok_or_else(|| SheetError::invalid_reference(input, "cell is outside the sheet bounds"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(input: &str) -> String {
        match parse_reference(input) {
            Err(SheetError::InvalidReference { reason, .. }) => reason,
            other => panic!("expected InvalidReference for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_cells() {
        let r = parse_reference("B3").unwrap();
        assert_eq!(r.sheet, None);
        assert_eq!(r.coord, CellCoord::new(2, 1));

        let r = parse_reference("$d$5").unwrap();
        assert_eq!(r.sheet, None);
        assert_eq!(r.coord.to_a1(), "D5");

        assert_eq!(parse_reference("A$1").unwrap().coord, CellCoord::new(0, 0));
        assert_eq!(parse_reference("=$A1").unwrap().coord, CellCoord::new(0, 0));
    }

    #[test]
    fn test_sheet_prefixes() {
        let r = parse_reference("Sheet2!$D$5").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Sheet2"));
        assert_eq!(r.coord.to_a1(), "D5");

        let r = parse_reference("'Q1 Report'!B3").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Q1 Report"));

        let r = parse_reference("'Bob''s Sheet'!$A$1").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Bob's Sheet"));

        let r = parse_reference("'Data!Raw'!C7").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Data!Raw"));
    }

    #[test]
    fn test_diagnostics() {
        assert_eq!(reason(""), "reference is empty");
        assert_eq!(reason("TotalSales"), "expected row digits");
        assert_eq!(reason("123"), "expected column letters");
        assert_eq!(reason("Sheet1!$A$1:$B$2"), "range references are not supported");
        assert_eq!(reason("A1B"), "unexpected trailing characters \"B\"");
        assert_eq!(reason("'Sheet1!A1"), "unterminated quoted sheet name");
        assert_eq!(reason("'Sheet1'A1"), "expected '!' after quoted sheet name");
        assert_eq!(reason("!A1"), "sheet name is empty");
        assert_eq!(reason("''!A1"), "sheet name is empty");
        assert_eq!(reason("A0"), "cell is outside the sheet bounds");
        assert_eq!(reason("$$A1"), "expected column letters");
    }

    #[test]
    fn test_error_carries_input() {
        let err = parse_reference("Sheet1!").unwrap_err();
        assert_eq!(
            err,
            SheetError::InvalidReference {
                reference: "Sheet1!".into(),
                reason: "expected column letters".into(),
            }
        );
    }
}
