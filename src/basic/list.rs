use std::collections::BTreeMap;

use log::warn;

use crate::basic::tokens::{TokenKind, TOKEN_TABLE};
use crate::error::TapeError;

/// Length of the program image header.
pub const HDR_LEN: usize = 8;

/// Parsed program image header: four big-endian words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub chkword: u16,
    pub line_table_start: u16,
    pub line_table_end: u16,
    pub memory_end: u16,
}

impl ImageHeader {
    /// Bit 15 of the check word marks an Extended BASIC protected program.
    /// Informational only; it does not affect listing.
    pub fn protected(&self) -> bool {
        self.chkword & 0x8000 != 0
    }
}

/// One listed program line. `text` is `None` when the line body could not
/// be decoded; the failure is logged and the rest of the program is still
/// listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedLine {
    pub number: u16,
    pub text: Option<String>,
}

/// Parse and validate the 8-byte image header.
pub fn parse_header(image: &[u8]) -> Result<ImageHeader, TapeError> {
    if image.len() < HDR_LEN {
        return Err(TapeError::ImageTooShort { len: image.len() });
    }
    let word = |i: usize| u16::from_be_bytes([image[i], image[i + 1]]);
    let header = ImageHeader {
        chkword: word(0),
        line_table_start: word(2),
        line_table_end: word(4),
        memory_end: word(6),
    };

    if header.line_table_start ^ header.line_table_end != header.chkword & 0x7FFF {
        return Err(TapeError::HeaderChecksum {
            expected: header.chkword & 0x7FFF,
            actual: header.line_table_start ^ header.line_table_end,
        });
    }
    Ok(header)
}

/// Walk the line-number table and return line number → image offset of the
/// line's length byte, in ascending line-number order.
///
/// The table grows downward in memory, so `line_table_start` is its highest
/// address and `line_table_end` its lowest; both are inclusive. Entry
/// pointers are machine addresses; the origin is chosen so the table's last
/// byte maps to `HDR_LEN + table_len - 1`, and one is subtracted to land on
/// the length byte that precedes each line body.
pub fn parse_line_table(
    image: &[u8],
    header: &ImageHeader,
) -> Result<BTreeMap<u16, usize>, TapeError> {
    let start = usize::from(header.line_table_start);
    let end = usize::from(header.line_table_end);
    if end > start {
        return Err(TapeError::LineTableLength { len: 0 });
    }
    let lt_len = start + 1 - end;
    if lt_len + HDR_LEN > image.len() {
        return Err(TapeError::LineTableOutOfBounds {
            table_len: lt_len,
            image_len: image.len(),
        });
    }
    if lt_len == 0 || lt_len % 4 != 0 {
        return Err(TapeError::LineTableLength { len: lt_len });
    }

    let mut table = BTreeMap::new();
    let mut i = 0;
    while i < lt_len {
        let at = HDR_LEN + lt_len - 4 - i;
        let line_no = u16::from_be_bytes([image[at], image[at + 1]]);
        let ptr = u16::from_be_bytes([image[at + 2], image[at + 3]]);

        let offset = i64::from(ptr) - (start as i64 + 1) + (HDR_LEN + lt_len) as i64 - 1;
        if offset < 0 || offset as usize >= image.len() {
            warn!("line {}: body pointer 0x{:04X} outside the image", line_no, ptr);
        } else {
            table.insert(line_no, offset as usize);
        }
        i += 4;
    }
    Ok(table)
}

/// Decode one tokenized line body starting at its length byte.
pub fn decode_line(image: &[u8], addr: usize) -> Result<String, TapeError> {
    if addr >= image.len() {
        return Err(TapeError::TruncatedLine { offset: addr });
    }
    let line_len = usize::from(image[addr]);
    if addr + line_len >= image.len() {
        return Err(TapeError::TruncatedLine { offset: addr });
    }
    if image[addr + line_len] != 0x00 {
        return Err(TapeError::InvalidLineEnd {
            offset: addr + line_len,
            found: image[addr + line_len],
        });
    }

    let mut line = String::new();
    let mut off = 1usize;
    while off < line_len {
        let token = image[addr + off];
        off += 1;
        let entry = &TOKEN_TABLE[usize::from(token)];
        match entry.kind {
            TokenKind::Simple => line.push_str(entry.text),
            TokenKind::RestOfLine => {
                line.push_str(entry.text);
                line.extend(image[addr + off..addr + line_len].iter().map(|&b| b as char));
                off = line_len;
            }
            TokenKind::QuotedString | TokenKind::UnquotedString => {
                if off + 1 > line_len {
                    return Err(TapeError::TruncatedLine { offset: addr + off });
                }
                let arg_len = usize::from(image[addr + off]);
                off += 1;
                if off + arg_len > line_len {
                    return Err(TapeError::TruncatedLine { offset: addr + off });
                }
                let text: String = image[addr + off..addr + off + arg_len]
                    .iter()
                    .map(|&b| b as char)
                    .collect();
                if entry.kind == TokenKind::QuotedString {
                    line.push('"');
                    line.push_str(&text);
                    line.push_str("\" ");
                } else {
                    line.push_str(&text);
                    line.push(' ');
                }
                off += arg_len;
            }
            TokenKind::LineNumber => {
                if off + 2 > line_len {
                    return Err(TapeError::TruncatedLine { offset: addr + off });
                }
                let number = i16::from_be_bytes([image[addr + off], image[addr + off + 1]]);
                line.push_str(&number.to_string());
                off += 2;
            }
            TokenKind::IdentifierChar => {
                line.push(token as char);
                if token != b'$' {
                    while off < line_len {
                        let next = image[addr + off];
                        if TOKEN_TABLE[usize::from(next)].kind != TokenKind::IdentifierChar {
                            break;
                        }
                        line.push(next as char);
                        off += 1;
                        if next == b'$' {
                            break;
                        }
                    }
                }
                line.push(' ');
            }
            TokenKind::Invalid => {
                return Err(TapeError::InvalidToken {
                    offset: addr + off - 1,
                    token,
                });
            }
        }
    }

    Ok(line)
}

/// List a complete program image in ascending line-number order.
///
/// Undecodable lines are logged and listed with `text: None`; only header
/// or line-table damage fails the whole image.
pub fn list_program(image: &[u8]) -> Result<Vec<ListedLine>, TapeError> {
    let header = parse_header(image)?;
    let table = parse_line_table(image, &header)?;

    let mut lines = Vec::with_capacity(table.len());
    for (&number, &addr) in &table {
        match decode_line(image, addr) {
            Ok(text) => lines.push(ListedLine {
                number,
                text: Some(text),
            }),
            Err(e) => {
                warn!("line {}: {}", number, e);
                lines.push(ListedLine { number, text: None });
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an image from line bodies, generating a consistent header and
    /// a downward-growing line table.
    fn build_image(lines: &[(u16, &[u8])]) -> Vec<u8> {
        let lt_len = lines.len() * 4;
        let line_table_start: u16 = 0x37F3 + lt_len as u16 - 1;
        let line_table_end: u16 = 0x37F3;
        let chkword = line_table_start ^ line_table_end;

        let mut image = Vec::new();
        image.extend_from_slice(&chkword.to_be_bytes());
        image.extend_from_slice(&line_table_start.to_be_bytes());
        image.extend_from_slice(&line_table_end.to_be_bytes());
        image.extend_from_slice(&0x37FFu16.to_be_bytes());

        // Bodies go after the table; entry pointers address the byte after
        // each length byte.
        let mut offsets = Vec::new();
        let mut at = HDR_LEN + lt_len;
        for (_, body) in lines {
            offsets.push(at);
            at += body.len();
        }

        // Table entries in reverse order (the table grows down).
        for (i, (number, _)) in lines.iter().enumerate().rev() {
            let offset = offsets[i];
            let ptr = (offset as i64 + 1 - (HDR_LEN + lt_len) as i64
                + i64::from(line_table_start)
                + 1) as u16;
            image.extend_from_slice(&number.to_be_bytes());
            image.extend_from_slice(&ptr.to_be_bytes());
        }
        for (_, body) in lines {
            image.extend_from_slice(body);
        }
        image
    }

    #[test]
    fn print_hi_listing() {
        let image = build_image(&[(10, &[0x06, 0x9C, 0xC7, 0x02, 0x48, 0x49, 0x00])]);
        let lines = list_program(&image).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].number, 10);
        assert_eq!(
            format!("{:5} {}", lines[0].number, lines[0].text.as_ref().unwrap()),
            "   10 PRINT \"HI\" "
        );
    }

    #[test]
    fn header_checksum_failure_rejects_image() {
        let mut image = build_image(&[(10, &[0x02, 0x8B, 0x00])]);
        image[0] ^= 0x40;
        assert!(matches!(
            list_program(&image),
            Err(TapeError::HeaderChecksum { .. })
        ));
    }

    #[test]
    fn protected_flag_does_not_break_checksum() {
        let mut image = build_image(&[(10, &[0x02, 0x8B, 0x00])]);
        image[0] |= 0x80; // set bit 15 of chkword
        let header = parse_header(&image).unwrap();
        assert!(header.protected());
        assert_eq!(list_program(&image).unwrap().len(), 1);
    }

    #[test]
    fn lines_listed_in_ascending_order() {
        let image = build_image(&[
            (30, &[0x02, 0x8B, 0x00]),                   // 30 END
            (10, &[0x05, 0x86, 0xC9, 0x00, 0x1E, 0x00]), // 10 GOTO 30
            (20, &[0x03, 0x9C, 0x41, 0x00]),             // 20 PRINT A
        ]);
        let lines = list_program(&image).unwrap();
        let numbers: Vec<u16> = lines.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![10, 20, 30]);
        assert_eq!(lines[0].text.as_deref(), Some("GOTO 30"));
        assert_eq!(lines[1].text.as_deref(), Some("PRINT A "));
        assert_eq!(lines[2].text.as_deref(), Some("END "));
    }

    #[test]
    fn rem_consumes_rest_of_line() {
        let body = [0x05, 0x9A, b'H', b'I', b'!', 0x00];
        let image = build_image(&[(100, &body)]);
        let lines = list_program(&image).unwrap();
        assert_eq!(lines[0].text.as_deref(), Some("REM HI!"));
    }

    #[test]
    fn identifier_run_terminates_on_dollar() {
        // 10 LET A$=CHR$(66)
        let body = [
            0x0C, 0x8D, b'A', b'$', 0xBE, 0xD6, 0xB7, 0xC8, 0x02, b'6', b'6', 0xB6, 0x00,
        ];
        let image = build_image(&[(10, &body)]);
        let lines = list_program(&image).unwrap();
        assert_eq!(lines[0].text.as_deref(), Some("LET A$ = CHR$ ( 66 ) "));
    }

    #[test]
    fn invalid_token_fails_only_that_line() {
        let image = build_image(&[
            (10, &[0x02, 0xB9, 0x00]), // 0xB9 is not a token
            (20, &[0x02, 0x8B, 0x00]),
        ]);
        let lines = list_program(&image).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, None);
        assert_eq!(lines[1].text.as_deref(), Some("END "));
    }

    #[test]
    fn bad_eol_byte_is_rejected() {
        let image = build_image(&[(10, &[0x02, 0x8B, 0x55])]);
        let lines = list_program(&image).unwrap();
        assert_eq!(lines[0].text, None);
    }

    #[test]
    fn line_table_must_be_multiple_of_four() {
        let mut image = build_image(&[(10, &[0x02, 0x8B, 0x00])]);
        // Stretch the table by one byte and fix the checksum up.
        let start = u16::from_be_bytes([image[2], image[3]]) + 1;
        image[2..4].copy_from_slice(&start.to_be_bytes());
        let end = u16::from_be_bytes([image[4], image[5]]);
        let chk = start ^ end;
        image[0..2].copy_from_slice(&chk.to_be_bytes());
        assert!(matches!(
            list_program(&image),
            Err(TapeError::LineTableLength { .. })
        ));
    }
}
