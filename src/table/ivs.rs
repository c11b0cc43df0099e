use crate::parse::*;
use crate::FontResult;
use alloc::vec::*;

// Microsoft: https://docs.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats#item-variation-store

/// One axis of a variation region. The scalar contribution is 1 at the peak, 0 outside
/// [start, end], and linear in between.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegionAxis {
    pub start: f32,
    pub peak: f32,
    pub end: f32,
}

/// The shared variation backing for CFF2 blend. Region scalars are looked up through a
/// per-subtable local region index list, selected by the charstring's vsindex.
#[derive(Debug, PartialEq)]
pub struct ItemVariationStore {
    /// The global region list. Each region spans every axis.
    regions: Vec<Vec<RegionAxis>>,
    /// Local to global region index mappings, one per item variation data subtable.
    region_indexes: Vec<Vec<u16>>,
}

impl ItemVariationStore {
    pub fn new(data: &[u8]) -> FontResult<ItemVariationStore> {
        let mut stream = Stream::new(data);
        let format = stream.read_u16().ok_or("Font.ivs: Store too short")?;
        if format != 1 {
            return Err("Font.ivs: Unknown store format");
        }
        let region_list_offset = stream.read_u32().ok_or("Font.ivs: Store too short")? as usize;
        let data_count = stream.read_u16().ok_or("Font.ivs: Store too short")?;
        let mut data_offsets = Vec::with_capacity(data_count as usize);
        for _ in 0..data_count {
            data_offsets.push(stream.read_u32().ok_or("Font.ivs: Store too short")? as usize);
        }

        let mut region_stream = Stream::new(data);
        region_stream.seek(region_list_offset);
        let axis_count = region_stream.read_u16().ok_or("Font.ivs: Region list too short")?;
        let region_count = region_stream.read_u16().ok_or("Font.ivs: Region list too short")?;
        let mut regions = Vec::with_capacity(region_count as usize);
        for _ in 0..region_count {
            let mut axes = Vec::with_capacity(axis_count as usize);
            for _ in 0..axis_count {
                let start = region_stream.read_f2dot14();
                let peak = region_stream.read_f2dot14();
                let end = region_stream.read_f2dot14();
                match (start, peak, end) {
                    (Some(start), Some(peak), Some(end)) => axes.push(RegionAxis {
                        start,
                        peak,
                        end,
                    }),
                    _ => return Err("Font.ivs: Region list too short"),
                }
            }
            regions.push(axes);
        }

        let mut region_indexes = Vec::with_capacity(data_count as usize);
        for offset in data_offsets {
            let mut subtable = Stream::new(data);
            subtable.seek(offset);
            let _item_count = subtable.read_u16().ok_or("Font.ivs: Subtable too short")?;
            let _word_delta_count = subtable.read_u16().ok_or("Font.ivs: Subtable too short")?;
            let index_count = subtable.read_u16().ok_or("Font.ivs: Subtable too short")?;
            let mut indexes = Vec::with_capacity(index_count as usize);
            for _ in 0..index_count {
                indexes.push(subtable.read_u16().ok_or("Font.ivs: Subtable too short")?);
            }
            region_indexes.push(indexes);
        }

        Ok(ItemVariationStore {
            regions,
            region_indexes,
        })
    }

    /// How many regions the vsindex'th subtable blends over. Blend pops this many deltas per
    /// default operand.
    pub fn region_count(&self, vsindex: u16) -> usize {
        self.region_indexes.get(vsindex as usize).map(|indexes| indexes.len()).unwrap_or(0)
    }

    /// The scalar for one of the vsindex'th subtable's regions at the given normalized
    /// coordinates. Unknown indexes contribute nothing.
    pub fn region_scalar(&self, vsindex: u16, region_index: usize, axis_coords: &[f32]) -> f32 {
        let global = match self
            .region_indexes
            .get(vsindex as usize)
            .and_then(|indexes| indexes.get(region_index))
        {
            Some(&global) => global,
            None => return 0.0,
        };
        let axes = match self.regions.get(global as usize) {
            Some(axes) => axes,
            None => return 0.0,
        };
        let mut scalar = 1.0f32;
        for (i, axis) in axes.iter().enumerate() {
            let c = axis_coords.get(i).copied().unwrap_or(0.0);
            if axis.peak == 0.0 {
                continue;
            }
            if c == 0.0 {
                return 0.0;
            }
            if c < axis.start || c > axis.end {
                return 0.0;
            }
            if c < axis.peak && axis.peak != axis.start {
                scalar *= (c - axis.start) / (axis.peak - axis.start);
            } else if c > axis.peak && axis.end != axis.peak {
                scalar *= (axis.end - c) / (axis.end - axis.peak);
            }
        }
        scalar
    }
}
