use crate::math::{abs, round_half_away};
use crate::parse::*;
use crate::table::loca::GlyphLocation;
use crate::FontResult;
use alloc::vec::*;

// Microsoft: https://docs.microsoft.com/en-us/typography/opentype/spec/gvar

/// Bit 15 of the tuple variation count word: point numbers shared by every tuple follow the
/// count in the serialized data block.
const SHARED_POINT_NUMBERS: u16 = 0x8000;
const TUPLE_COUNT_MASK: u16 = 0x0FFF;

/// Bits of the tupleIndex word in each tuple variation header.
const EMBEDDED_PEAK_TUPLE: u16 = 0x8000;
const INTERMEDIATE_REGION: u16 = 0x4000;
const PRIVATE_POINT_NUMBERS: u16 = 0x2000;
const TUPLE_INDEX_MASK: u16 = 0x0FFF;

/// Per-glyph point deltas for TrueType variable fonts.
pub struct TableGvar<'a> {
    data: &'a [u8],
    pub axis_count: u16,
    /// Peak tuples referenced by index from headers without an embedded peak.
    shared_tuples: Vec<Vec<f32>>,
    /// Indexed by glyph id. Byte ranges into the glyph variation data array.
    glyph_data: Vec<GlyphLocation>,
}

impl<'a> TableGvar<'a> {
    pub fn new(gvar: &'a [u8]) -> FontResult<TableGvar<'a>> {
        let mut stream = Stream::new(gvar);
        let mut header = || stream.read_u16().ok_or("Font.gvar: Table too short");
        let major = header()?;
        if major != 1 {
            return Err("Font.gvar: Unknown table version");
        }
        let _minor = header()?;
        let axis_count = header()?;
        let shared_tuple_count = header()?;
        let shared_tuples_offset = stream.read_u32().ok_or("Font.gvar: Table too short")? as usize;
        let glyph_count = stream.read_u16().ok_or("Font.gvar: Table too short")? as usize;
        let flags = stream.read_u16().ok_or("Font.gvar: Table too short")?;
        let data_array_offset = stream.read_u32().ok_or("Font.gvar: Table too short")? as usize;

        // The offset array has the loca shape: glyph_count + 1 entries, short offsets halved.
        let long_offsets = flags & 0x0001 != 0;
        let mut read_offset = || -> Option<usize> {
            if long_offsets {
                Some(stream.read_u32()? as usize)
            } else {
                Some(stream.read_u16()? as usize * 2)
            }
        };
        let mut glyph_data = Vec::with_capacity(glyph_count);
        let mut offset = read_offset().ok_or("Font.gvar: Offset array too short")?;
        for _ in 0..glyph_count {
            let next_offset = read_offset().ok_or("Font.gvar: Offset array too short")?;
            if next_offset < offset {
                return Err("Font.gvar: Offsets are not monotonic");
            }
            glyph_data.push(GlyphLocation {
                offset: data_array_offset + offset,
                length: next_offset - offset,
            });
            offset = next_offset;
        }

        let mut shared_tuples = Vec::with_capacity(shared_tuple_count as usize);
        let mut tuples = Stream::new(gvar);
        tuples.seek(shared_tuples_offset);
        for _ in 0..shared_tuple_count {
            let mut tuple = Vec::with_capacity(axis_count as usize);
            for _ in 0..axis_count {
                tuple.push(tuples.read_f2dot14().ok_or("Font.gvar: Shared tuples too short")?);
            }
            shared_tuples.push(tuple);
        }

        Ok(TableGvar {
            data: gvar,
            axis_count,
            shared_tuples,
            glyph_data,
        })
    }

    /// Accumulated (dx, dy) for every point of a glyph at the given normalized coordinates.
    /// Always returns num_points entries; glyphs without variation data get zeros.
    pub fn glyph_deltas(&self, glyph_id: u16, num_points: usize, axis_coords: &[f32]) -> Vec<(i32, i32)> {
        let mut accumulated = Vec::new();
        accumulated.resize(num_points, (0.0f32, 0.0f32));
        // A glyph without usable variation data keeps its zeros.
        let _ = self.accumulate(glyph_id, axis_coords, &mut accumulated);
        accumulated
            .into_iter()
            .map(|(dx, dy)| (round_half_away(dx), round_half_away(dy)))
            .collect()
    }

    fn accumulate(&self, glyph_id: u16, coords: &[f32], accumulated: &mut [(f32, f32)]) -> Option<()> {
        let location = self.glyph_data.get(glyph_id as usize)?;
        if location.length == 0 {
            return None;
        }
        let end = location.offset.checked_add(location.length)?;
        let data = self.data.get(location.offset..end)?;
        let mut headers = Stream::new(data);
        let count_word = headers.read_u16()?;
        let serialized_offset = headers.read_u16()? as usize;
        let tuple_count = (count_word & TUPLE_COUNT_MASK) as usize;

        let mut serialized = Stream::new(data);
        serialized.seek(serialized_offset);
        let shared_points = if count_word & SHARED_POINT_NUMBERS != 0 {
            Some(read_packed_points(&mut serialized)?)
        } else {
            None
        };

        for _ in 0..tuple_count {
            let data_size = headers.read_u16()? as usize;
            let tuple_index = headers.read_u16()?;
            let peak = if tuple_index & EMBEDDED_PEAK_TUPLE != 0 {
                let mut peak = Vec::with_capacity(self.axis_count as usize);
                for _ in 0..self.axis_count {
                    peak.push(headers.read_f2dot14()?);
                }
                Some(peak)
            } else {
                self.shared_tuples.get((tuple_index & TUPLE_INDEX_MASK) as usize).cloned()
            };
            let intermediate = if tuple_index & INTERMEDIATE_REGION != 0 {
                let mut start = Vec::with_capacity(self.axis_count as usize);
                let mut end = Vec::with_capacity(self.axis_count as usize);
                for _ in 0..self.axis_count {
                    start.push(headers.read_f2dot14()?);
                }
                for _ in 0..self.axis_count {
                    end.push(headers.read_f2dot14()?);
                }
                Some((start, end))
            } else {
                None
            };
            // The serialized block for this tuple is consumed even when the tuple is skipped,
            // so the next tuple starts in the right place.
            let tuple_data = serialized.read_bytes(data_size)?;

            let peak = match peak {
                Some(peak) => peak,
                None => continue,
            };
            if peak.iter().all(|&p| p == 0.0) {
                continue;
            }
            let scalar = Self::tuple_scalar(
                &peak,
                coords,
                intermediate.as_ref().map(|(s, e)| (s.as_slice(), e.as_slice())),
            );
            if scalar == 0.0 {
                continue;
            }

            let mut deltas = Stream::new(tuple_data);
            let points = if tuple_index & PRIVATE_POINT_NUMBERS != 0 {
                match read_packed_points(&mut deltas) {
                    Some(points) => points,
                    None => continue,
                }
            } else {
                match &shared_points {
                    Some(points) => points.clone(),
                    None => PackedPoints::All,
                }
            };
            let delta_count = match &points {
                PackedPoints::All => accumulated.len(),
                PackedPoints::Subset(list) => list.len(),
            };
            let dxs = read_packed_deltas(&mut deltas, delta_count);
            let dys = read_packed_deltas(&mut deltas, delta_count);
            match points {
                PackedPoints::All => {
                    for (i, (dx, dy)) in dxs.iter().zip(dys.iter()).enumerate() {
                        if i >= accumulated.len() {
                            break;
                        }
                        accumulated[i].0 += *dx as f32 * scalar;
                        accumulated[i].1 += *dy as f32 * scalar;
                    }
                }
                PackedPoints::Subset(list) => {
                    for ((&point, dx), dy) in list.iter().zip(dxs.iter()).zip(dys.iter()) {
                        if let Some(entry) = accumulated.get_mut(point as usize) {
                            entry.0 += *dx as f32 * scalar;
                            entry.1 += *dy as f32 * scalar;
                        }
                    }
                }
            }
        }
        Some(())
    }

    /// How much one variation tuple applies at the given coordinates. 1 at the peak, 0 outside
    /// the region, linear in between.
    pub fn tuple_scalar(
        peak: &[f32],
        coords: &[f32],
        intermediate: Option<(&[f32], &[f32])>,
    ) -> f32 {
        let mut scalar = 1.0f32;
        for (i, &p) in peak.iter().enumerate() {
            let c = coords.get(i).copied().unwrap_or(0.0);
            if p == 0.0 {
                continue;
            }
            if c == 0.0 {
                return 0.0;
            }
            if let Some((start, end)) = intermediate {
                let s = start.get(i).copied().unwrap_or(0.0);
                let e = end.get(i).copied().unwrap_or(0.0);
                if c < s || c > e {
                    return 0.0;
                }
                if c < p && p != s {
                    scalar *= (c - s) / (p - s);
                } else if c > p && e != p {
                    scalar *= (e - c) / (e - p);
                }
            } else {
                if (c < 0.0) != (p < 0.0) {
                    return 0.0;
                }
                if abs(c) < abs(p) {
                    scalar *= c / p;
                }
            }
        }
        scalar
    }
}

#[derive(Clone)]
enum PackedPoints {
    /// The tuple applies to every point.
    All,
    Subset(Vec<u16>),
}

/// Point numbers are stored as a count then runs of ascending deltas. A count of zero means
/// every point.
fn read_packed_points(stream: &mut Stream) -> Option<PackedPoints> {
    let first = stream.read_u8()?;
    if first == 0 {
        return Some(PackedPoints::All);
    }
    let count = if first & 0x80 != 0 {
        (((first & 0x7F) as usize) << 8) | stream.read_u8()? as usize
    } else {
        first as usize
    };
    let mut points = Vec::with_capacity(count);
    let mut last = 0u16;
    while points.len() < count {
        let control = stream.read_u8()?;
        let words = control & 0x80 != 0;
        let run_count = (control & 0x7F) as usize + 1;
        for _ in 0..run_count {
            if points.len() >= count {
                break;
            }
            let delta = if words {
                stream.read_u16()?
            } else {
                stream.read_u8()? as u16
            };
            last = last.wrapping_add(delta);
            points.push(last);
        }
    }
    Some(PackedPoints::Subset(points))
}

/// Deltas are stored as runs: a zero run, a run of bytes, or a run of words. A truncated stream
/// yields the deltas read so far.
fn read_packed_deltas(stream: &mut Stream, count: usize) -> Vec<i32> {
    let mut deltas = Vec::with_capacity(count);
    while deltas.len() < count {
        let control = match stream.read_u8() {
            Some(control) => control,
            None => break,
        };
        let run_count = (control & 0x3F) as usize + 1;
        if control & 0x80 != 0 {
            for _ in 0..run_count {
                if deltas.len() >= count {
                    break;
                }
                deltas.push(0);
            }
        } else if control & 0x40 != 0 {
            for _ in 0..run_count {
                if deltas.len() >= count {
                    break;
                }
                match stream.read_i16() {
                    Some(delta) => deltas.push(delta as i32),
                    None => return deltas,
                }
            }
        } else {
            for _ in 0..run_count {
                if deltas.len() >= count {
                    break;
                }
                match stream.read_i8() {
                    Some(delta) => deltas.push(delta as i32),
                    None => return deltas,
                }
            }
        }
    }
    deltas
}
