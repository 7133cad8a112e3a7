//! Landscape spawn stream.
//!
//! ```text
//! repeat:
//!   id_delta   incr smart   (0 ends the stream; id starts at -1)
//!   repeat:
//!     pos_delta  unsigned smart  (0 ends this id; pos starts at 0, adds delta - 1)
//!     attributes u8             type = b >> 2, rotation = b & 3
//! pos: plane << 12 | local_x << 6 | local_y
//! ```

use serde::Serialize;

use crate::buffer::{put_unsigned_smart, Buffer};
use crate::error::{Result, SceneError};

/// One decoded placement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Spawn {
    pub id: u32,
    pub kind: u8,
    pub rotation: u8,
    pub local_x: u8,
    pub local_y: u8,
    pub plane: u8,
}

impl Spawn {
    fn unpack(id: u32, pos: u32, attributes: u8) -> Spawn {
        Spawn {
            id,
            kind: attributes >> 2,
            rotation: attributes & 3,
            local_x: (pos >> 6 & 63) as u8,
            local_y: (pos & 63) as u8,
            plane: (pos >> 12) as u8,
        }
    }
}

pub fn decode_spawns(data: &[u8]) -> Result<Vec<Spawn>> {
    let mut buf = Buffer::new(data);
    let mut spawns = Vec::new();
    let mut id: i64 = -1;
    loop {
        let id_delta = buf.read_incr_smart()?;
        if id_delta == 0 {
            break;
        }
        id += id_delta as i64;
        let def_id = u32::try_from(id)
            .map_err(|_| SceneError::corrupt("landscape", format!("object id {id}")))?;

        let mut pos: u32 = 0;
        loop {
            let pos_delta = buf.read_unsigned_smart()?;
            if pos_delta == 0 {
                break;
            }
            pos = pos.checked_add(pos_delta as u32 - 1).ok_or_else(|| {
                SceneError::corrupt("landscape", format!("position of object {def_id} overflows"))
            })?;
            let attributes = buf.read_u8()?;
            spawns.push(Spawn::unpack(def_id, pos, attributes));
        }
    }
    if buf.remaining() != 0 {
        return Err(SceneError::corrupt(
            "landscape",
            format!("{} bytes after the end marker", buf.remaining()),
        ));
    }
    Ok(spawns)
}

/// Write `spawns` back into the stream format. Spawns must be sorted by id
/// and, within an id, by packed position. Repeated positions are allowed.
pub fn encode_spawns(spawns: &[Spawn]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut last_id: i64 = -1;
    let mut i = 0;
    while i < spawns.len() {
        let id = spawns[i].id as i64;
        let delta = id - last_id;
        if delta <= 0 {
            return Err(SceneError::corrupt("landscape", "spawns are not sorted by id"));
        }
        put_incr_smart(&mut out, delta as u32);
        last_id = id;

        let mut last_pos: i64 = 0;
        while i < spawns.len() && spawns[i].id as i64 == id {
            let s = &spawns[i];
            let pos = (s.plane as i64) << 12 | (s.local_x as i64) << 6 | s.local_y as i64;
            let delta = pos - last_pos + 1;
            if !(1..=32767).contains(&delta) {
                return Err(SceneError::corrupt("landscape", "spawn positions are not sorted"));
            }
            put_unsigned_smart(&mut out, delta as u16);
            out.push(s.kind << 2 | s.rotation & 3);
            last_pos = pos;
            i += 1;
        }
        out.push(0);
    }
    out.push(0);
    Ok(out)
}

fn put_incr_smart(out: &mut Vec<u8>, mut value: u32) {
    while value >= 32767 {
        put_unsigned_smart(out, 32767);
        value -= 32767;
    }
    put_unsigned_smart(out, value as u16);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_spawn() {
        let spawns = decode_spawns(&[6, 1, 0b0000_0101, 0, 0]).unwrap();
        assert_eq!(
            spawns,
            vec![Spawn {
                id: 5,
                kind: 1,
                rotation: 1,
                local_x: 0,
                local_y: 0,
                plane: 0,
            }]
        );
    }

    #[test]
    fn positions_and_ids_accumulate() {
        // id 2 at (1, 3) plane 0 and (1, 4) plane 1; then id 3 at (0, 0)
        let pos_a = 1 << 6 | 3;
        let pos_b = 1 << 12 | 1 << 6 | 4;
        let bytes = [
            3,
            (pos_a + 1) as u8,
            10 << 2,
            0x80 | ((pos_b - pos_a + 1) >> 8) as u8,
            ((pos_b - pos_a + 1) & 0xff) as u8,
            22 << 2 | 3,
            0,
            1,
            1,
            0,
            0,
            0,
        ];
        let spawns = decode_spawns(&bytes).unwrap();
        assert_eq!(spawns.len(), 3);
        assert_eq!((spawns[0].id, spawns[0].local_x, spawns[0].local_y), (2, 1, 3));
        assert_eq!(spawns[0].kind, 10);
        assert_eq!((spawns[1].plane, spawns[1].local_y), (1, 4));
        assert_eq!((spawns[1].kind, spawns[1].rotation), (22, 3));
        assert_eq!(spawns[2].id, 3);
    }

    #[test]
    fn truncated_stream_fails() {
        assert!(decode_spawns(&[6, 1]).is_err());
        assert!(decode_spawns(&[0, 9]).is_err());
    }

    #[test]
    fn runaway_position_is_corrupt() {
        let mut bytes = vec![1];
        // each 32767 delta advances the position by 32766
        for _ in 0..(u32::MAX / 32766 + 1) {
            put_unsigned_smart(&mut bytes, 32767);
            bytes.push(0);
        }
        bytes.extend_from_slice(&[0, 0]);
        let err = decode_spawns(&bytes).unwrap_err();
        assert!(matches!(err, SceneError::CorruptAsset { what: "landscape", .. }), "{err}");
    }

    #[test]
    fn encoder_matches_decoder() {
        let spawns = vec![
            Spawn { id: 40_000, kind: 10, rotation: 2, local_x: 63, local_y: 0, plane: 3 },
            Spawn { id: 40_000, kind: 0, rotation: 1, local_x: 63, local_y: 1, plane: 3 },
            Spawn { id: 40_001, kind: 22, rotation: 0, local_x: 0, local_y: 0, plane: 0 },
        ];
        let bytes = encode_spawns(&spawns).unwrap();
        assert_eq!(decode_spawns(&bytes).unwrap(), spawns);
    }
}
