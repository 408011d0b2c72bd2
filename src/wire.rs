//! Small helpers for the NUL-terminated strings and little-endian fields
//! that show up throughout command payloads.

pub fn read_cstr(buf: &[u8], offset: &mut usize) -> Option<String> {
    if *offset > buf.len() {
        return None;
    }
    let nul = buf[*offset..].iter().position(|&b| b == 0)?;
    let s = String::from_utf8_lossy(&buf[*offset..*offset + nul]).into_owned();
    *offset += nul + 1;
    Some(s)
}

pub fn write_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_cstr() {
        let mut out = Vec::new();
        write_cstr(&mut out, "hello");
        let mut offset = 0;
        let s = read_cstr(&out, &mut offset).unwrap();
        assert_eq!(s, "hello");
        assert_eq!(offset, out.len());
    }

    #[test]
    fn missing_terminator_is_none() {
        assert_eq!(read_cstr(b"no terminator", &mut 0), None);
    }
}
