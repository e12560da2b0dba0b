//! AX.25 station addresses and digipeater paths.

use std::fmt;

/// Address extension bit: set on the last address of the header.
pub const FLAG_LAST: u8 = 0x01;
/// Has-been-digipeated bit.
pub const FLAG_DIGI: u8 = 0x80;

/// Longest digipeater path the address field can carry.
pub const MAX_DIGIS: usize = 7;

/// A station address: up to six character callsign plus SSID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Addr {
    pub call: String,
    pub ssid: u8,
    pub digipeated: bool,
}

impl Addr {
    pub fn new(call: &str, ssid: u8) -> Self {
        Self {
            call: call.to_uppercase(),
            ssid: ssid & 0x0f,
            digipeated: false,
        }
    }

    /// Parse `CALL` or `CALL-SSID`. The callsign is uppercased and
    /// cut at six characters, the SSID masked to 0..=15.
    pub fn parse(s: &str, digipeated: bool) -> Self {
        let (call, ssid) = match s.split_once('-') {
            Some((c, rest)) => {
                // Leading digits only, like atoi.
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                (c, digits.parse::<u8>().unwrap_or(0))
            }
            None => (s, 0),
        };
        let call: String = call.chars().take(6).map(|c| c.to_ascii_uppercase()).collect();
        Self {
            call,
            ssid: ssid & 0x0f,
            digipeated,
        }
    }

    /// Same station, ignoring the digipeated bit.
    pub fn same_station(&self, other: &Addr) -> bool {
        self.call == other.call && self.ssid == other.ssid
    }

    /// Wire flags byte (without the extension bit).
    pub fn flags(&self) -> u8 {
        if self.digipeated {
            FLAG_DIGI
        } else {
            0
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.call)
        } else {
            write!(f, "{}-{}", self.call, self.ssid)
        }
    }
}

/// Format a digipeater path. With `trunc` the common WIDEn-n
/// aliases are shortened so the path fits a small display.
pub fn path_to_string(digis: &[Addr], trunc: bool) -> String {
    if digis.is_empty() {
        return "<EMPTY>".to_string();
    }
    let mut parts = Vec::with_capacity(digis.len());
    for d in digis {
        let s = d.to_string();
        let s = if trunc {
            if s == "WIDE1-1" {
                "W1".to_string()
            } else if s == "WIDE2-2" {
                "W2".to_string()
            } else if let Some(rest) = s.strip_prefix("WIDE") {
                format!("W{rest}")
            } else {
                s
            }
        } else {
            s
        };
        parts.push(s);
    }
    parts.join(",")
}

/// Parse a comma-separated digipeater path, keeping at most
/// [`MAX_DIGIS`] entries.
pub fn parse_path(s: &str) -> Vec<Addr> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .take(MAX_DIGIS)
        .map(|p| Addr::parse(p, false))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let a = Addr::parse("n0call", false);
        assert_eq!(a.call, "N0CALL");
        assert_eq!(a.ssid, 0);
        assert!(!a.digipeated);
    }

    #[test]
    fn test_parse_with_ssid() {
        let a = Addr::parse("LD5ZS-12", false);
        assert_eq!(a.call, "LD5ZS");
        assert_eq!(a.ssid, 12);
    }

    #[test]
    fn test_parse_masks_ssid() {
        let a = Addr::parse("CALL-99", false);
        // atoi-style read of "99", masked to four bits.
        assert_eq!(a.ssid, 99u8 & 0x0f);
    }

    #[test]
    fn test_parse_cuts_long_call() {
        let a = Addr::parse("TOOLONGCALL-3", false);
        assert_eq!(a.call, "TOOLON");
        assert_eq!(a.ssid, 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(Addr::new("N0CALL", 0).to_string(), "N0CALL");
        assert_eq!(Addr::new("N0CALL", 5).to_string(), "N0CALL-5");
    }

    #[test]
    fn test_same_station_ignores_digi_bit() {
        let mut a = Addr::new("LD5ZS", 2);
        let b = Addr::new("LD5ZS", 2);
        a.digipeated = true;
        assert!(a.same_station(&b));
        assert!(!a.same_station(&Addr::new("LD5ZS", 3)));
    }

    #[test]
    fn test_path_to_string_empty() {
        assert_eq!(path_to_string(&[], false), "<EMPTY>");
    }

    #[test]
    fn test_path_to_string_truncated() {
        let path = parse_path("WIDE1-1,WIDE2-2,WIDE3-3,LD5ZS-1");
        assert_eq!(path_to_string(&path, true), "W1,W2,W3-3,LD5ZS-1");
        assert_eq!(
            path_to_string(&path, false),
            "WIDE1-1,WIDE2-2,WIDE3-3,LD5ZS-1"
        );
    }

    #[test]
    fn test_parse_path_caps_at_seven() {
        let path = parse_path("A,B,C,D,E,F,G,H,I");
        assert_eq!(path.len(), MAX_DIGIS);
        assert_eq!(path[6].call, "G");
    }
}
