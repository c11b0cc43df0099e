use crate::parse::*;
use crate::FontResult;
use alloc::vec::*;

// Apple: https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6loca.html
// Microsoft: https://docs.microsoft.com/en-us/typography/opentype/spec/loca

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlyphLocation {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, PartialEq)]
pub struct TableLoca {
    /// Indexed by glyph id.
    pub locations: Vec<GlyphLocation>,
}

impl TableLoca {
    pub fn new(loca: &[u8], index_to_loc_format: i16, num_glyphs: u16) -> FontResult<TableLoca> {
        if index_to_loc_format < 0 || index_to_loc_format > 1 {
            return Err("Font.loca: Unknown index_to_loc_format");
        }
        let mut stream = Stream::new(loca);
        let mut read_offset = || -> Option<usize> {
            if index_to_loc_format == 0 {
                // The short format stores half offsets.
                Some(stream.read_u16()? as usize * 2)
            } else {
                Some(stream.read_u32()? as usize)
            }
        };
        let mut locations = Vec::with_capacity(num_glyphs as usize);
        let mut offset = read_offset().ok_or("Font.loca: Table too short")?;
        for _ in 0..num_glyphs {
            let next_offset = read_offset().ok_or("Font.loca: Table too short")?;
            if next_offset < offset {
                return Err("Font.loca: Offsets are not monotonic");
            }
            locations.push(GlyphLocation {
                offset,
                length: next_offset - offset,
            });
            offset = next_offset;
        }
        Ok(TableLoca {
            locations,
        })
    }

    /// The byte range a glyph occupies in the glyf table. None for out of range glyph ids and
    /// for glyphs with no data.
    #[inline]
    pub fn get(&self, glyph_id: u16) -> Option<GlyphLocation> {
        let location = *self.locations.get(glyph_id as usize)?;
        if location.length == 0 {
            None
        } else {
            Some(location)
        }
    }

    #[inline]
    pub fn num_glyphs(&self) -> usize {
        self.locations.len()
    }
}
