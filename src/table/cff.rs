use crate::charstring;
use crate::outline::Contour;
use crate::parse::*;
use crate::FontResult;
use alloc::vec::*;

// Adobe CFF: https://adobe-type-tools.github.io/font-tech-notes/pdfs/5176.CFF.pdf
// Adobe Type 2: https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf

/// Dict operator codes. Two byte operators carry the 12 escape in the high byte.
mod dict_op {
    pub const CHAR_STRINGS: u16 = 17;
    pub const PRIVATE: u16 = 18;
    pub const SUBRS: u16 = 19;
    pub const VSTORE: u16 = 24;
    pub const ROS: u16 = 0x0C1E;
    pub const FD_ARRAY: u16 = 0x0C24;
    pub const FD_SELECT: u16 = 0x0C25;
}
pub(crate) use dict_op::*;

/// A CFF INDEX: a packed array of variable length byte objects. Offsets are 1-based and sized
/// by offSize.
#[derive(Copy, Clone)]
pub(crate) struct Index<'a> {
    count: usize,
    off_size: u8,
    offsets: &'a [u8],
    data: &'a [u8],
}

impl<'a> Index<'a> {
    pub fn empty() -> Index<'a> {
        Index {
            count: 0,
            off_size: 1,
            offsets: &[],
            data: &[],
        }
    }

    /// Parses an INDEX at the stream position and advances past it. CFF2 widened the count
    /// field to 32 bits.
    pub fn parse(stream: &mut Stream<'a>, long_count: bool) -> Option<Index<'a>> {
        let count = if long_count {
            stream.read_u32()? as usize
        } else {
            stream.read_u16()? as usize
        };
        if count == 0 {
            return Some(Index::empty());
        }
        let off_size = stream.read_u8()?;
        if off_size < 1 || off_size > 4 {
            return None;
        }
        let offsets = stream.read_bytes(count.checked_add(1)?.checked_mul(off_size as usize)?)?;
        let mut last = Stream::new(offsets);
        last.seek(count * off_size as usize);
        let data_length = (last.read_offset(off_size)? as usize).checked_sub(1)?;
        let data = stream.read_bytes(data_length)?;
        Some(Index {
            count,
            off_size,
            offsets,
            data,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.count {
            return None;
        }
        let start = self.offset_at(index)?.checked_sub(1)?;
        let end = self.offset_at(index + 1)?.checked_sub(1)?;
        if end < start {
            return None;
        }
        self.data.get(start..end)
    }

    fn offset_at(&self, index: usize) -> Option<usize> {
        let mut stream = Stream::new(self.offsets);
        stream.seek(index * self.off_size as usize);
        Some(stream.read_offset(self.off_size)? as usize)
    }

    /// The offset added to operands of callsubr/callgsubr before indexing this table.
    pub fn bias(&self) -> i32 {
        if self.count < 1240 {
            107
        } else if self.count < 33900 {
            1131
        } else {
            32768
        }
    }
}

/// A decoded DICT: operator codes with their operand lists, in file order.
pub(crate) struct Dict {
    entries: Vec<(u16, Vec<f64>)>,
}

impl Dict {
    pub fn parse(data: &[u8]) -> Dict {
        let mut entries = Vec::new();
        let mut operands: Vec<f64> = Vec::new();
        let mut stream = Stream::new(data);
        while stream.remaining() > 0 {
            let b0 = match stream.read_u8() {
                Some(b0) => b0,
                None => break,
            };
            match b0 {
                28 => match stream.read_i16() {
                    Some(value) => operands.push(value as f64),
                    None => break,
                },
                29 => match stream.read_i32() {
                    Some(value) => operands.push(value as f64),
                    None => break,
                },
                30 => match read_real(&mut stream) {
                    Some(value) => operands.push(value),
                    None => break,
                },
                32..=246 => operands.push(b0 as f64 - 139.0),
                247..=250 => match stream.read_u8() {
                    Some(b1) => operands.push((b0 as f64 - 247.0) * 256.0 + b1 as f64 + 108.0),
                    None => break,
                },
                251..=254 => match stream.read_u8() {
                    Some(b1) => operands.push(-(b0 as f64 - 251.0) * 256.0 - b1 as f64 - 108.0),
                    None => break,
                },
                12 => match stream.read_u8() {
                    Some(b1) => {
                        let taken = core::mem::replace(&mut operands, Vec::new());
                        entries.push((0x0C00 | b1 as u16, taken));
                    }
                    None => break,
                },
                // Everything else below 32 is an operator code. CFF stops at 21; CFF2 extends
                // through vstore (24).
                0..=31 => {
                    let taken = core::mem::replace(&mut operands, Vec::new());
                    entries.push((b0 as u16, taken));
                }
                _ => break,
            }
        }
        Dict {
            entries,
        }
    }

    pub fn contains(&self, op: u16) -> bool {
        self.entries.iter().any(|(code, _)| *code == op)
    }

    pub fn operands(&self, op: u16) -> Option<&[f64]> {
        self.entries
            .iter()
            .find(|(code, _)| *code == op)
            .map(|(_, operands)| operands.as_slice())
    }

    /// The single integer operand of an entry, usually an offset.
    pub fn usize_operand(&self, op: u16) -> Option<usize> {
        let operands = self.operands(op)?;
        let value = *operands.last()?;
        if value < 0.0 {
            return None;
        }
        Some(value as usize)
    }

    /// The (size, offset) operand pair of a Private entry.
    pub fn range_operands(&self, op: u16) -> Option<(usize, usize)> {
        let operands = self.operands(op)?;
        if operands.len() != 2 || operands[0] < 0.0 || operands[1] < 0.0 {
            return None;
        }
        Some((operands[0] as usize, operands[1] as usize))
    }
}

/// Nibble encoded real number. 0xa is the decimal point, 0xb/0xc enter the exponent, 0xe
/// negates, 0xf terminates.
fn read_real(stream: &mut Stream) -> Option<f64> {
    let mut value = 0.0f64;
    let mut fraction_scale = 0.0f64;
    let mut exponent = 0i32;
    let mut exponent_sign = 1i32;
    let mut in_exponent = false;
    let mut negative = false;
    'outer: loop {
        let byte = stream.read_u8()?;
        for &nibble in &[byte >> 4, byte & 0x0F] {
            match nibble {
                0..=9 => {
                    if in_exponent {
                        exponent = exponent.saturating_mul(10).saturating_add(nibble as i32);
                    } else if fraction_scale > 0.0 {
                        value += nibble as f64 * fraction_scale;
                        fraction_scale *= 0.1;
                    } else {
                        value = value * 10.0 + nibble as f64;
                    }
                }
                0xA => fraction_scale = 0.1,
                0xB => in_exponent = true,
                0xC => {
                    in_exponent = true;
                    exponent_sign = -1;
                }
                0xE => negative = true,
                0xF => break 'outer,
                _ => return None,
            }
        }
    }
    if negative {
        value = -value;
    }
    let exponent = exponent * exponent_sign;
    let mut scale = 1.0f64;
    for _ in 0..exponent.abs() {
        scale *= 10.0;
    }
    if exponent < 0 {
        value /= scale;
    } else {
        value *= scale;
    }
    Some(value)
}

/// Glyph id to font dict mapping for CID keyed fonts.
pub(crate) enum FdSelect {
    /// One font dict index per glyph.
    Format0(Vec<u8>),
    /// Ranges of glyphs sharing a font dict.
    Format3(Vec<(u16, u8)>, u16),
}

impl FdSelect {
    pub fn parse(stream: &mut Stream, num_glyphs: usize) -> Option<FdSelect> {
        match stream.read_u8()? {
            0 => {
                let mut fds = Vec::with_capacity(num_glyphs);
                for _ in 0..num_glyphs {
                    fds.push(stream.read_u8()?);
                }
                Some(FdSelect::Format0(fds))
            }
            3 => {
                let range_count = stream.read_u16()?;
                let mut ranges = Vec::with_capacity(range_count as usize);
                for _ in 0..range_count {
                    let first = stream.read_u16()?;
                    let fd = stream.read_u8()?;
                    ranges.push((first, fd));
                }
                let sentinel = stream.read_u16()?;
                Some(FdSelect::Format3(ranges, sentinel))
            }
            _ => None,
        }
    }

    pub fn fd_for_glyph(&self, glyph_id: u16) -> Option<u8> {
        match self {
            FdSelect::Format0(fds) => fds.get(glyph_id as usize).copied(),
            FdSelect::Format3(ranges, sentinel) => {
                if glyph_id >= *sentinel {
                    return None;
                }
                let position = ranges
                    .iter()
                    .rposition(|(first, _)| *first <= glyph_id)?;
                Some(ranges[position].1)
            }
        }
    }
}

/// The local subroutines reachable from a Private DICT located at an absolute offset. Subrs
/// offsets are relative to the Private DICT start.
fn parse_private_subrs<'a>(
    cff: &'a [u8],
    offset: usize,
    size: usize,
    long_count: bool,
) -> Option<Index<'a>> {
    let private = cff.get(offset..offset.checked_add(size)?)?;
    let dict = Dict::parse(private);
    let subrs_offset = dict.usize_operand(SUBRS)?;
    let mut stream = Stream::new(cff);
    stream.seek(offset.checked_add(subrs_offset)?);
    Index::parse(&mut stream, long_count)
}

/// Parses an FDArray INDEX of font dicts into per-dict local subroutine tables.
pub(crate) fn parse_fd_subrs<'a>(
    cff: &'a [u8],
    fd_array_offset: usize,
    long_count: bool,
) -> Option<Vec<Option<Index<'a>>>> {
    let mut stream = Stream::new(cff);
    stream.seek(fd_array_offset);
    let fd_array = Index::parse(&mut stream, long_count)?;
    let mut subrs = Vec::with_capacity(fd_array.len());
    for i in 0..fd_array.len() {
        let dict = Dict::parse(fd_array.get(i)?);
        match dict.range_operands(PRIVATE) {
            Some((size, offset)) => {
                subrs.push(parse_private_subrs(cff, offset, size, long_count));
            }
            None => subrs.push(None),
        }
    }
    Some(subrs)
}

/// A parsed CFF table. Enough structure to execute charstrings: the CharStrings INDEX, the
/// subroutine tables, and the CID font dict selector.
pub struct TableCff<'a> {
    charstrings: Index<'a>,
    global_subrs: Index<'a>,
    local_subrs: Option<Index<'a>>,
    fd_select: Option<FdSelect>,
    fd_local_subrs: Vec<Option<Index<'a>>>,
}

impl<'a> TableCff<'a> {
    pub fn new(cff: &'a [u8]) -> FontResult<TableCff<'a>> {
        Self::with_font_index(cff, 0)
    }

    /// A CFF FontSet can carry several fonts; font_index picks the Top DICT.
    pub fn with_font_index(cff: &'a [u8], font_index: usize) -> FontResult<TableCff<'a>> {
        let mut stream = Stream::new(cff);
        let _major = stream.read_u8().ok_or("Font.cff: Table too short")?;
        let _minor = stream.read_u8().ok_or("Font.cff: Table too short")?;
        let header_size = stream.read_u8().ok_or("Font.cff: Table too short")?;
        let _off_size = stream.read_u8().ok_or("Font.cff: Table too short")?;
        stream.seek(header_size as usize);

        let _names = Index::parse(&mut stream, false).ok_or("Font.cff: Malformed Name INDEX")?;
        let top_dicts =
            Index::parse(&mut stream, false).ok_or("Font.cff: Malformed Top DICT INDEX")?;
        let _strings = Index::parse(&mut stream, false).ok_or("Font.cff: Malformed String INDEX")?;
        let global_subrs =
            Index::parse(&mut stream, false).ok_or("Font.cff: Malformed Global Subr INDEX")?;

        let top = Dict::parse(top_dicts.get(font_index).ok_or("Font.cff: Missing Top DICT")?);
        let charstrings_offset = top
            .usize_operand(CHAR_STRINGS)
            .ok_or("Font.cff: Missing CharStrings offset")?;
        let mut charstrings_stream = Stream::new(cff);
        charstrings_stream.seek(charstrings_offset);
        let charstrings = Index::parse(&mut charstrings_stream, false)
            .ok_or("Font.cff: Malformed CharStrings INDEX")?;

        let local_subrs = top
            .range_operands(PRIVATE)
            .and_then(|(size, offset)| parse_private_subrs(cff, offset, size, false));

        // CID keyed fonts route local subrs through FDSelect and the FDArray font dicts.
        let mut fd_select = None;
        let mut fd_local_subrs = Vec::new();
        if top.contains(ROS) {
            if let Some(offset) = top.usize_operand(FD_ARRAY) {
                fd_local_subrs = parse_fd_subrs(cff, offset, false)
                    .ok_or("Font.cff: Malformed FDArray")?;
            }
            if let Some(offset) = top.usize_operand(FD_SELECT) {
                let mut select_stream = Stream::new(cff);
                select_stream.seek(offset);
                fd_select = Some(
                    FdSelect::parse(&mut select_stream, charstrings.len())
                        .ok_or("Font.cff: Malformed FDSelect")?,
                );
            }
        }

        Ok(TableCff {
            charstrings,
            global_subrs,
            local_subrs,
            fd_select,
            fd_local_subrs,
        })
    }

    /// The number of charstrings, which is the number of glyphs.
    pub fn num_glyphs(&self) -> usize {
        self.charstrings.len()
    }

    /// Executes a glyph's charstring. None when the glyph id has no charstring.
    pub fn outline(&self, glyph_id: u16) -> Option<Vec<Contour>> {
        let program = self.charstrings.get(glyph_id as usize)?;
        let local_subrs = match &self.fd_select {
            Some(select) => select
                .fd_for_glyph(glyph_id)
                .and_then(|fd| self.fd_local_subrs.get(fd as usize))
                .and_then(|subrs| subrs.as_ref()),
            None => self.local_subrs.as_ref(),
        };
        Some(charstring::execute(
            program,
            &self.global_subrs,
            local_subrs,
            charstring::Variant::Cff,
        ))
    }
}
