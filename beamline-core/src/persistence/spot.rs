//! Spot-diagram binary dump (spec §6): four little-endian `int32` header
//! fields (dim, reserved, count, lost), then four `dim`-length `float64`
//! arrays (min, max, mean, sigma), then `dim × count` `float64` spot values.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::diagnostics::Diagram;
use crate::error::{Error, Result};

pub fn write(diagram: &Diagram) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + diagram.dim * (4 + diagram.count) * 8);
    out.write_i32::<LittleEndian>(diagram.dim as i32).unwrap();
    out.write_i32::<LittleEndian>(0).unwrap();
    out.write_i32::<LittleEndian>(diagram.count as i32).unwrap();
    out.write_i32::<LittleEndian>(diagram.lost as i32).unwrap();
    for arr in [&diagram.min, &diagram.max, &diagram.mean, &diagram.sigma] {
        for v in arr {
            out.write_f64::<LittleEndian>(*v).unwrap();
        }
    }
    for v in &diagram.data {
        out.write_f64::<LittleEndian>(*v).unwrap();
    }
    out
}

pub fn read(bytes: &[u8]) -> Result<Diagram> {
    let mut cursor = std::io::Cursor::new(bytes);
    let bad = |e: std::io::Error| Error::IoFailure(format!("truncated spot dump: {e}"));
    let dim = cursor.read_i32::<LittleEndian>().map_err(bad)? as usize;
    let _reserved = cursor.read_i32::<LittleEndian>().map_err(bad)?;
    let count = cursor.read_i32::<LittleEndian>().map_err(bad)? as usize;
    let lost = cursor.read_i32::<LittleEndian>().map_err(bad)? as usize;

    let mut read_array = |n: usize| -> Result<Vec<f64>> {
        (0..n).map(|_| cursor.read_f64::<LittleEndian>().map_err(bad)).collect()
    };
    let min = read_array(dim)?;
    let max = read_array(dim)?;
    let mean = read_array(dim)?;
    let sigma = read_array(dim)?;
    let data = read_array(dim * count)?;

    Ok(Diagram {
        dim,
        data,
        min,
        max,
        mean,
        sigma,
        count,
        lost,
        dropped: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_spot_dump() {
        let diagram = Diagram {
            dim: 2,
            data: vec![1.0, 2.0, 3.0, 4.0],
            min: vec![1.0, 2.0],
            max: vec![3.0, 4.0],
            mean: vec![2.0, 3.0],
            sigma: vec![1.0, 1.0],
            count: 2,
            lost: 1,
            dropped: 0,
        };
        let bytes = write(&diagram);
        let read_back = read(&bytes).unwrap();
        assert_eq!(read_back.dim, 2);
        assert_eq!(read_back.count, 2);
        assert_eq!(read_back.lost, 1);
        assert_eq!(read_back.data, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(read_back.mean, vec![2.0, 3.0]);
    }

    #[test]
    fn rejects_a_truncated_buffer() {
        assert!(read(&[0, 0, 0]).is_err());
    }
}
