//! AX.25 header wire codec.

use crate::ax25::addr::{Addr, FLAG_DIGI, FLAG_LAST, MAX_DIGIS};
use crate::ax25::fbuf::FrameBuf;

/// Control field for an UI frame.
pub const FTYPE_UI: u8 = 0x03;
/// PID: no layer 3 protocol.
pub const PID_NO_L3: u8 = 0xF0;

const ASCII_SPC: u8 = 0x20;

/// Header length for a frame with `ndigis` digipeaters (addresses
/// plus control and PID).
pub const fn header_len(ndigis: usize) -> usize {
    14 + 2 + 7 * ndigis
}

/// Encode an AX.25 header into `b`. A path longer than seven digis
/// is cut at seven. The PID field is written only for I and UI
/// frames.
pub fn encode_header(
    b: &mut FrameBuf,
    from: &Addr,
    to: &Addr,
    digis: &[Addr],
    ctrl: u8,
    pid: u8,
) {
    let digis = &digis[..digis.len().min(MAX_DIGIS)];
    encode_addr(b, to, 0);
    encode_addr(b, from, if digis.is_empty() { FLAG_LAST } else { 0 });
    for (i, d) in digis.iter().enumerate() {
        let last = if i + 1 == digis.len() { FLAG_LAST } else { 0 };
        encode_addr(b, d, d.flags() | last);
    }
    b.put_u8(ctrl);
    if (ctrl & 0x01) == 0 || ctrl == FTYPE_UI {
        b.put_u8(pid);
    }
}

/// Decoded AX.25 header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub from: Addr,
    pub to: Addr,
    pub digis: Vec<Addr>,
    pub ctrl: u8,
    pub pid: u8,
}

/// Decode a header from the buffer's read cursor. Stops the digi
/// scan at the extension bit or after seven entries, whichever comes
/// first; control and PID are read unconditionally, so the cursor is
/// left at the start of the payload for I and UI frames.
pub fn decode_header(b: &mut FrameBuf) -> Header {
    let mut h = Header::default();
    decode_addr(b, &mut h.to);
    let from_flags = decode_addr(b, &mut h.from);
    if from_flags & FLAG_LAST == 0 {
        for _ in 0..MAX_DIGIS {
            let mut d = Addr::default();
            let flags = decode_addr(b, &mut d);
            h.digis.push(d);
            if flags & FLAG_LAST != 0 {
                break;
            }
        }
    }
    h.ctrl = b.get_u8();
    h.pid = b.get_u8();
    h
}

fn encode_addr(b: &mut FrameBuf, a: &Addr, flags: u8) {
    let mut chars = a.call.bytes();
    for _ in 0..6 {
        let c = chars.next().unwrap_or(ASCII_SPC);
        b.put_u8(c << 1);
    }
    b.put_u8(((a.ssid & 0x0F) << 1) | (flags & 0x81) | 0x60);
}

fn decode_addr(b: &mut FrameBuf, a: &mut Addr) -> u8 {
    let mut call = String::with_capacity(6);
    for _ in 0..6 {
        let c = b.get_u8() >> 1;
        if c != ASCII_SPC {
            call.push(c as char);
        }
    }
    let x = b.get_u8();
    a.call = call;
    a.ssid = (x & 0x1E) >> 1;
    a.digipeated = x & FLAG_DIGI != 0;
    x & 0x81
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ax25::addr::parse_path;

    fn roundtrip(from: &Addr, to: &Addr, digis: &[Addr], ctrl: u8, pid: u8) -> Header {
        let mut b = FrameBuf::new();
        encode_header(&mut b, from, to, digis, ctrl, pid);
        b.reset();
        decode_header(&mut b)
    }

    #[test]
    fn test_roundtrip_no_digis() {
        let from = Addr::new("LD5ZS", 1);
        let to = Addr::new("APRS", 0);
        let h = roundtrip(&from, &to, &[], FTYPE_UI, PID_NO_L3);
        assert_eq!(h.from, from);
        assert_eq!(h.to, to);
        assert!(h.digis.is_empty());
        assert_eq!(h.ctrl, FTYPE_UI);
        assert_eq!(h.pid, PID_NO_L3);
    }

    #[test]
    fn test_roundtrip_with_path() {
        let from = Addr::new("LD5ZS", 9);
        let to = Addr::new("APRS", 0);
        let digis = parse_path("WIDE1-1,WIDE2-2");
        let h = roundtrip(&from, &to, &digis, FTYPE_UI, PID_NO_L3);
        assert_eq!(h.digis, digis);
    }

    #[test]
    fn test_digipeated_bit_survives() {
        let from = Addr::new("LD5ZS", 0);
        let to = Addr::new("APRS", 0);
        let mut digis = parse_path("WIDE1-1,WIDE2-2");
        digis[0].digipeated = true;
        let h = roundtrip(&from, &to, &digis, FTYPE_UI, PID_NO_L3);
        assert!(h.digis[0].digipeated);
        assert!(!h.digis[1].digipeated);
    }

    #[test]
    fn test_long_path_cut_at_seven() {
        let from = Addr::new("LD5ZS", 0);
        let to = Addr::new("APRS", 0);
        let digis: Vec<Addr> = (0..9).map(|i| Addr::new("DIGI", i)).collect();
        let mut b = FrameBuf::new();
        encode_header(&mut b, &from, &to, &digis, FTYPE_UI, PID_NO_L3);
        assert_eq!(b.len(), header_len(7));
        b.reset();
        let h = decode_header(&mut b);
        assert_eq!(h.digis.len(), 7);
        assert_eq!(h.digis[6].ssid, 6);
    }

    #[test]
    fn test_header_len_matches_wire() {
        for n in 0..=7usize {
            let digis: Vec<Addr> = (0..n).map(|i| Addr::new("WIDE", i as u8)).collect();
            let mut b = FrameBuf::new();
            encode_header(&mut b, &Addr::new("A", 0), &Addr::new("B", 0), &digis, FTYPE_UI, 0xF0);
            assert_eq!(b.len(), header_len(n));
        }
    }

    #[test]
    fn test_pid_skipped_for_supervisory() {
        let mut b = FrameBuf::new();
        // RR frame, S format: no PID field.
        encode_header(&mut b, &Addr::new("A", 0), &Addr::new("B", 0), &[], 0x11, PID_NO_L3);
        assert_eq!(b.len(), 14 + 1);
    }

    #[test]
    fn test_payload_follows_header() {
        let from = Addr::new("LD5ZS", 2);
        let to = Addr::new("APRS", 0);
        let mut b = FrameBuf::new();
        encode_header(&mut b, &from, &to, &[], FTYPE_UI, PID_NO_L3);
        b.put_bytes(b"!6012.00N/00512.00E>");
        b.reset();
        let h = decode_header(&mut b);
        assert_eq!(h.from, from);
        assert_eq!(b.get_u8(), b'!');
    }

    #[test]
    fn test_short_callsigns_space_padded() {
        let h = roundtrip(&Addr::new("A", 1), &Addr::new("ID", 0), &[], FTYPE_UI, PID_NO_L3);
        assert_eq!(h.from.call, "A");
        assert_eq!(h.to.call, "ID");
    }
}
