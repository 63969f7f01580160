//! Reply envelope encoder (spec §4.6).
//!
//! Wire format: `sender_id SPACE <netstring of space-separated conn_ids>
//! SPACE <payload>`. An empty payload with a valid id list is the
//! "close these connections" command. One logical reply is always one
//! transport message — the encoder never fragments.

use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;

/// Connection ids for one reply. `SmallVec` avoids a heap allocation for
/// the overwhelmingly common unicast case; broadcast to many connections
/// spills to the heap transparently.
pub type ConnIds = SmallVec<[u64; 4]>;

pub fn encode_reply(sender_id: &str, conn_ids: &ConnIds, payload: &[u8]) -> Bytes {
    let ids_str = {
        let mut s = String::new();
        for (i, id) in conn_ids.iter().enumerate() {
            if i > 0 {
                s.push(' ');
            }
            let mut buf = itoa::Buffer::new();
            s.push_str(buf.format(*id));
        }
        s
    };

    let mut out = BytesMut::new();
    out.put_slice(sender_id.as_bytes());
    out.put_u8(b' ');
    let mut len_buf = itoa::Buffer::new();
    out.put_slice(len_buf.format(ids_str.len() as u64).as_bytes());
    out.put_u8(b':');
    out.put_slice(ids_str.as_bytes());
    out.put_slice(b", ");
    out.put_slice(payload);
    out.freeze()
}

/// Build a "close these connections" command: same envelope, empty payload.
pub fn encode_close(sender_id: &str, conn_ids: &ConnIds) -> Bytes {
    encode_reply(sender_id, conn_ids, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_connection_reply_matches_scenario_1() {
        let conn_ids: ConnIds = smallvec::smallvec![42];
        let payload = b"HTTP/1.1 204 No Content\r\n\r\n";
        let frame = encode_reply("abc", &conn_ids, payload);
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("abc 2:42, HTTP/1.1 204 No Content\r\n"));
    }

    #[test]
    fn broadcast_reply_joins_ids_with_spaces() {
        let conn_ids: ConnIds = smallvec::smallvec![1, 2, 3];
        let frame = encode_reply("abc", &conn_ids, b"x");
        let text = String::from_utf8(frame.to_vec()).unwrap();
        // "1 2 3" is 5 bytes
        assert_eq!(text, "abc 5:1 2 3, x");
    }

    #[test]
    fn close_command_has_empty_payload() {
        let conn_ids: ConnIds = smallvec::smallvec![7];
        let frame = encode_close("abc", &conn_ids);
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert_eq!(text, "abc 1:7, ");
    }
}
