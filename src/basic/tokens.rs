/// How the lister treats a token byte inside a program line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Fixed listing text.
    Simple,
    /// Length-prefixed string, listed inside double quotes.
    QuotedString,
    /// Length-prefixed literal (numeric constants and the like).
    UnquotedString,
    /// 16-bit big-endian line number operand.
    LineNumber,
    /// Consumes the remainder of the line as literal text.
    RestOfLine,
    /// Part of an identifier run.
    IdentifierChar,
    /// Not valid inside a program line.
    Invalid,
}

/// One token table entry. `text` is empty for identifier characters (the
/// byte itself is emitted) and for invalid bytes.
#[derive(Debug, Clone, Copy)]
pub struct TokenEntry {
    pub text: &'static str,
    pub kind: TokenKind,
}

const fn simple(text: &'static str) -> TokenEntry {
    TokenEntry {
        text,
        kind: TokenKind::Simple,
    }
}

/// The complete TI BASIC / Extended BASIC token table.
///
/// Tokens below 0x80 are plain characters; of those, only identifier
/// characters may appear in a line body. Statement and function tokens live
/// in 0x81-0xFE with a handful of gaps that never occur in valid programs.
pub static TOKEN_TABLE: [TokenEntry; 256] = {
    let mut table = [TokenEntry {
        text: "",
        kind: TokenKind::Invalid,
    }; 256];

    // Identifier characters: A-Z a-z 0-9 @ _ [ ] \ $
    // '\', '[' and ']' aren't in the TI-99/4 manual, but the machine
    // accepts them.
    let ident = TokenEntry {
        text: "",
        kind: TokenKind::IdentifierChar,
    };
    let mut c = b'A' as usize;
    while c <= b'Z' as usize {
        table[c] = ident;
        c += 1;
    }
    let mut c = b'a' as usize;
    while c <= b'z' as usize {
        table[c] = ident;
        c += 1;
    }
    let mut c = b'0' as usize;
    while c <= b'9' as usize {
        table[c] = ident;
        c += 1;
    }
    table[b'@' as usize] = ident;
    table[b'_' as usize] = ident;
    table[b'[' as usize] = ident;
    table[b']' as usize] = ident;
    table[b'\\' as usize] = ident;
    table[b'$' as usize] = ident;

    // Statements
    table[0x81] = simple("ELSE ");
    table[0x82] = simple(" :: ");
    table[0x83] = TokenEntry { text: " ! ", kind: TokenKind::RestOfLine };
    table[0x84] = simple("IF ");
    table[0x85] = simple("GO ");
    table[0x86] = simple("GOTO ");
    table[0x87] = simple("GOSUB ");
    table[0x88] = simple("RETURN ");
    table[0x89] = simple("DEF ");
    table[0x8A] = simple("DIM ");
    table[0x8B] = simple("END ");
    table[0x8C] = simple("FOR ");
    table[0x8D] = simple("LET ");
    table[0x8E] = simple("BREAK ");
    table[0x8F] = simple("UNBREAK ");
    table[0x90] = simple("TRACE ");
    table[0x91] = simple("UNTRACE ");
    table[0x92] = simple("INPUT ");
    table[0x93] = simple("DATA ");
    table[0x94] = simple("RESTORE ");
    table[0x95] = simple("RANDOMIZE ");
    table[0x96] = simple("NEXT ");
    table[0x97] = simple("READ ");
    table[0x98] = simple("STOP ");
    table[0x99] = simple("DELETE ");
    table[0x9A] = TokenEntry { text: "REM ", kind: TokenKind::RestOfLine };
    table[0x9B] = simple("ON ");
    table[0x9C] = simple("PRINT ");
    table[0x9D] = simple("CALL ");
    table[0x9E] = simple("OPTION ");
    table[0x9F] = simple("OPEN ");
    table[0xA0] = simple("CLOSE ");
    table[0xA1] = simple("SUB ");
    table[0xA2] = simple("DISPLAY ");
    table[0xA3] = simple("IMAGE ");
    table[0xA4] = simple("ACCEPT ");
    table[0xA5] = simple("ERROR ");
    table[0xA6] = simple("WARNING ");
    table[0xA7] = simple("SUBEXIT ");
    table[0xA8] = simple("SUBEND ");
    table[0xA9] = simple("RUN ");
    table[0xAA] = simple("LINPUT ");

    // Operators and separators
    table[0xB0] = simple("THEN ");
    table[0xB1] = simple("TO ");
    table[0xB2] = simple("STEP ");
    table[0xB3] = simple(", ");
    table[0xB4] = simple(" ; ");
    table[0xB5] = simple(" : ");
    table[0xB6] = simple(") ");
    table[0xB7] = simple("( ");
    table[0xB8] = simple("& ");
    table[0xBA] = simple("OR ");
    table[0xBB] = simple("AND ");
    table[0xBC] = simple("XOR ");
    table[0xBD] = simple("NOT ");
    table[0xBE] = simple("= ");
    table[0xBF] = simple("< ");
    table[0xC0] = simple("> ");
    table[0xC1] = simple("+ ");
    table[0xC2] = simple("- ");
    table[0xC3] = simple("* ");
    table[0xC4] = simple("/ ");
    table[0xC5] = simple("^ ");

    // Operand-carrying tokens
    table[0xC7] = TokenEntry { text: "", kind: TokenKind::QuotedString };
    table[0xC8] = TokenEntry { text: "", kind: TokenKind::UnquotedString };
    table[0xC9] = TokenEntry { text: "", kind: TokenKind::LineNumber };

    // Functions
    table[0xCA] = simple("EOF ");
    table[0xCB] = simple("ABS ");
    table[0xCC] = simple("ATN ");
    table[0xCD] = simple("COS ");
    table[0xCE] = simple("EXP ");
    table[0xCF] = simple("INT ");
    table[0xD0] = simple("LOG ");
    table[0xD1] = simple("SGN ");
    table[0xD2] = simple("SIN ");
    table[0xD3] = simple("SQR ");
    table[0xD4] = simple("TAN ");
    table[0xD5] = simple("LEN ");
    table[0xD6] = simple("CHR$ ");
    table[0xD7] = simple("RND ");
    table[0xD8] = simple("SEG$ ");
    table[0xD9] = simple("POS ");
    table[0xDA] = simple("VAL ");
    table[0xDB] = simple("STR$ ");
    table[0xDC] = simple("ASC ");
    table[0xDD] = simple("PI ");
    table[0xDE] = simple("REC ");
    table[0xDF] = simple("MAX ");
    table[0xE0] = simple("MIN ");
    table[0xE1] = simple("RPT$ ");

    // I/O attributes
    table[0xE8] = simple("NUMERIC ");
    table[0xE9] = simple("DIGIT ");
    table[0xEA] = simple("UALPHA ");
    table[0xEB] = simple("SIZE ");
    table[0xEC] = simple("ALL ");
    table[0xED] = simple("USING ");
    table[0xEE] = simple("BEEP ");
    table[0xEF] = simple("ERASE ");
    table[0xF0] = simple("AT ");
    table[0xF1] = simple("BASE ");
    table[0xF3] = simple("VARIABLE ");
    table[0xF4] = simple("RELATIVE ");
    table[0xF5] = simple("INTERNAL ");
    table[0xF6] = simple("SEQUENTIAL ");
    table[0xF7] = simple("OUTPUT ");
    table[0xF8] = simple("UPDATE ");
    table[0xF9] = simple("APPEND ");
    table[0xFA] = simple("FIXED ");
    table[0xFB] = simple("PERMANENT ");
    table[0xFC] = simple("TAB ");
    table[0xFD] = simple("# ");
    table[0xFE] = simple("VALIDATE ");

    table
};

/// Whether `byte` can be part of an identifier run.
pub fn is_identifier_char(byte: u8) -> bool {
    matches!(
        TOKEN_TABLE[byte as usize].kind,
        TokenKind::IdentifierChar
    )
}
