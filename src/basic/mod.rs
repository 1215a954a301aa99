pub mod list;
pub mod tokens;

pub use list::{
    decode_line, list_program, parse_header, parse_line_table, ImageHeader, ListedLine, HDR_LEN,
};
pub use tokens::{TokenEntry, TokenKind, TOKEN_TABLE};
