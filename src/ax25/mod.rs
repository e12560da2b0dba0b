//! AX.25 addressing and header codec.

pub mod addr;
pub mod fbuf;
pub mod frame;

pub use addr::{parse_path, path_to_string, Addr, FLAG_DIGI, FLAG_LAST, MAX_DIGIS};
pub use fbuf::FrameBuf;
pub use frame::{decode_header, encode_header, header_len, Header, FTYPE_UI, PID_NO_L3};
