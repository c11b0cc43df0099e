use crate::charstring;
use crate::outline::Contour;
use crate::parse::*;
use crate::table::cff::{parse_fd_subrs, Dict, FdSelect, Index, CHAR_STRINGS, FD_ARRAY, FD_SELECT, VSTORE};
use crate::table::ivs::ItemVariationStore;
use crate::FontResult;
use alloc::vec::*;

// Microsoft: https://docs.microsoft.com/en-us/typography/opentype/spec/cff2

/// A parsed CFF2 table. CFF2 dropped the CFF FontSet framing: one font, a fixed width model,
/// and variation data in an embedded Item Variation Store.
pub struct TableCff2<'a> {
    charstrings: Index<'a>,
    global_subrs: Index<'a>,
    fd_select: Option<FdSelect>,
    fd_local_subrs: Vec<Option<Index<'a>>>,
    ivs: Option<ItemVariationStore>,
}

impl<'a> TableCff2<'a> {
    pub fn new(cff2: &'a [u8]) -> FontResult<TableCff2<'a>> {
        let mut stream = Stream::new(cff2);
        let major = stream.read_u8().ok_or("Font.cff2: Table too short")?;
        if major != 2 {
            return Err("Font.cff2: Unknown table version");
        }
        let _minor = stream.read_u8().ok_or("Font.cff2: Table too short")?;
        let header_size = stream.read_u8().ok_or("Font.cff2: Table too short")?;
        let top_dict_length = stream.read_u16().ok_or("Font.cff2: Table too short")? as usize;

        let top_dict_start = header_size as usize;
        let top_dict_data = cff2
            .get(top_dict_start..top_dict_start + top_dict_length)
            .ok_or("Font.cff2: Top DICT out of bounds")?;
        let top = Dict::parse(top_dict_data);

        let mut global_stream = Stream::new(cff2);
        global_stream.seek(top_dict_start + top_dict_length);
        let global_subrs = Index::parse(&mut global_stream, true)
            .ok_or("Font.cff2: Malformed Global Subr INDEX")?;

        let charstrings_offset = top
            .usize_operand(CHAR_STRINGS)
            .ok_or("Font.cff2: Missing CharStrings offset")?;
        let mut charstrings_stream = Stream::new(cff2);
        charstrings_stream.seek(charstrings_offset);
        let charstrings = Index::parse(&mut charstrings_stream, true)
            .ok_or("Font.cff2: Malformed CharStrings INDEX")?;

        let fd_local_subrs = match top.usize_operand(FD_ARRAY) {
            Some(offset) => {
                parse_fd_subrs(cff2, offset, true).ok_or("Font.cff2: Malformed FDArray")?
            }
            None => Vec::new(),
        };
        let fd_select = match top.usize_operand(FD_SELECT) {
            Some(offset) => {
                let mut select_stream = Stream::new(cff2);
                select_stream.seek(offset);
                Some(
                    FdSelect::parse(&mut select_stream, charstrings.len())
                        .ok_or("Font.cff2: Malformed FDSelect")?,
                )
            }
            None => None,
        };

        // The variation store is length prefixed; the store data follows the u16.
        let ivs = match top.usize_operand(VSTORE) {
            Some(offset) => {
                let mut vstore_stream = Stream::new(cff2);
                vstore_stream.seek(offset);
                let length = vstore_stream
                    .read_u16()
                    .ok_or("Font.cff2: Variation store too short")? as usize;
                let store = vstore_stream
                    .read_bytes(length)
                    .ok_or("Font.cff2: Variation store too short")?;
                Some(ItemVariationStore::new(store)?)
            }
            None => None,
        };

        Ok(TableCff2 {
            charstrings,
            global_subrs,
            fd_select,
            fd_local_subrs,
            ivs,
        })
    }

    /// The number of charstrings, which is the number of glyphs.
    pub fn num_glyphs(&self) -> usize {
        self.charstrings.len()
    }

    pub fn variation_store(&self) -> Option<&ItemVariationStore> {
        self.ivs.as_ref()
    }

    /// Executes a glyph's charstring, blending at the given normalized coordinates. None when
    /// the glyph id has no charstring.
    pub fn outline(&self, glyph_id: u16, axis_coords: Option<&[f32]>) -> Option<Vec<Contour>> {
        let program = self.charstrings.get(glyph_id as usize)?;
        let local_subrs = match &self.fd_select {
            Some(select) => select
                .fd_for_glyph(glyph_id)
                .and_then(|fd| self.fd_local_subrs.get(fd as usize))
                .and_then(|subrs| subrs.as_ref()),
            // Without FDSelect every glyph uses the first font dict.
            None => self.fd_local_subrs.get(0).and_then(|subrs| subrs.as_ref()),
        };
        Some(charstring::execute(
            program,
            &self.global_subrs,
            local_subrs,
            charstring::Variant::Cff2 {
                ivs: self.ivs.as_ref(),
                coords: axis_coords.unwrap_or(&[]),
            },
        ))
    }
}
