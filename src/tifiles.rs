/// TIFILES container: a 128-byte header followed by the file image padded
/// to whole 256-byte sectors. Used to archive recovered tape dumps for
/// disk-manager tools and emulators.

/// Sector size of the container.
pub const SECTOR_LEN: usize = 256;

/// Header size.
pub const HEADER_LEN: usize = 128;

/// Wrap a raw tape dump as a TIFILES program file.
///
/// `name` is truncated or space-padded to 10 bytes. Timestamps are zeroed.
pub fn wrap_tifiles(name: &str, data: &[u8]) -> Vec<u8> {
    let sect_cnt = (data.len() + SECTOR_LEN - 1) / SECTOR_LEN;
    let eof_off = (data.len() % SECTOR_LEN) as u8;

    let mut out = Vec::with_capacity(HEADER_LEN + sect_cnt * SECTOR_LEN);
    out.push(0x07);
    out.extend_from_slice(b"TIFILES");
    out.extend_from_slice(&(sect_cnt as u16).to_be_bytes()); // total sectors
    out.push(0x01); // flags: program
    out.push(0x00); // records per sector
    out.push(eof_off); // EOF offset
    out.push(0x00); // logical record length
    out.extend_from_slice(&[0x00, 0x00]); // L3 record count

    let mut filename = [b' '; 10];
    for (dst, src) in filename.iter_mut().zip(name.bytes()) {
        *dst = src;
    }
    out.extend_from_slice(&filename);

    out.push(0x00); // MXT: last file
    out.push(0x00); // reserved
    out.extend_from_slice(&[0x00, 0x00]); // no extended header
    out.extend_from_slice(&[0x00; 4]); // creation timestamp
    out.extend_from_slice(&[0x00; 4]); // update timestamp
    out.resize(HEADER_LEN, 0x00);

    out.extend_from_slice(data);
    out.resize(HEADER_LEN + sect_cnt * SECTOR_LEN, 0x00);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let data = vec![0xAAu8; 300];
        let out = wrap_tifiles("TESTFILE", &data);

        assert_eq!(out[0], 0x07);
        assert_eq!(&out[1..8], b"TIFILES");
        assert_eq!(u16::from_be_bytes([out[8], out[9]]), 2); // sectors
        assert_eq!(out[0x0A], 0x01); // program flag
        assert_eq!(out[0x0C], (300 % 256) as u8); // EOF offset
        assert_eq!(&out[0x10..0x1A], b"TESTFILE  ");
        assert!(out[0x1A..HEADER_LEN].iter().all(|&b| b == 0));
    }

    #[test]
    fn data_padded_to_sector_boundary() {
        let data = vec![0x55u8; 100];
        let out = wrap_tifiles("X", &data);
        assert_eq!(out.len(), HEADER_LEN + SECTOR_LEN);
        assert_eq!(&out[HEADER_LEN..HEADER_LEN + 100], &data[..]);
        assert!(out[HEADER_LEN + 100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn exact_sector_needs_no_padding() {
        let data = vec![0x11u8; SECTOR_LEN];
        let out = wrap_tifiles("FULL", &data);
        assert_eq!(out.len(), HEADER_LEN + SECTOR_LEN);
        assert_eq!(out[0x0C], 0); // EOF offset
    }

    #[test]
    fn long_names_are_truncated() {
        let out = wrap_tifiles("AVERYLONGFILENAME", &[0u8; 1]);
        assert_eq!(&out[0x10..0x1A], b"AVERYLONGF");
    }
}
