use crate::math::round_half_away;
use crate::outline::{Bounds, Contour, Point};
use crate::parse::*;
use crate::table::gvar::TableGvar;
use crate::table::loca::TableLoca;
use alloc::collections::VecDeque;
use alloc::vec::*;
use hashbrown::HashMap;

// Apple: https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6glyf.html
// Microsoft: https://docs.microsoft.com/en-us/typography/opentype/spec/glyf

#[allow(non_snake_case)]
pub mod SimpleFlags {
    pub const ON_CURVE: u8 = 0x01;
    pub const X_SHORT: u8 = 0x02;
    pub const Y_SHORT: u8 = 0x04;
    pub const REPEAT: u8 = 0x08;
    pub const X_DUAL: u8 = 0x10;
    pub const Y_DUAL: u8 = 0x20;
    pub const OVERLAP_SIMPLE: u8 = 0x40;

    pub const X_SHORT_AND_DUAL: u8 = X_SHORT | X_DUAL;
    pub const Y_SHORT_AND_DUAL: u8 = Y_SHORT | Y_DUAL;
}

#[allow(non_snake_case)]
pub mod CompoundFlags {
    pub const ARGS_ARE_WORDS: u16 = 0x0001;
    pub const ARGS_ARE_XY_VALUES: u16 = 0x0002;
    pub const ROUND_XY_TO_GRID: u16 = 0x0004;
    pub const WE_HAVE_A_SCALE: u16 = 0x0008;
    pub const MORE_COMPONENTS: u16 = 0x0020;
    pub const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
    pub const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
    pub const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;
    pub const USE_MY_METRICS: u16 = 0x0200;
    pub const OVERLAP_COMPOUND: u16 = 0x0400;
    pub const SCALED_COMPONENT_OFFSET: u16 = 0x0800;
    pub const UNSCALED_COMPONENT_OFFSET: u16 = 0x1000;
}

/// Composite nesting beyond this depth resolves to nothing.
const MAX_COMPOSITE_DEPTH: u32 = 32;

/// How many flattened composites the outline cache retains.
const CACHE_CAPACITY: usize = 256;

/// One component reference inside a composite glyph.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    pub glyph_id: u16,
    pub flags: u16,
    /// X offset in design units when ARGS_ARE_XY_VALUES is set. Otherwise a point index into
    /// the assembled glyph; point alignment is recognized but resolved as a zero offset.
    pub arg1: i32,
    /// Y offset, or a point index into this component's glyph. Same caveat as arg1.
    pub arg2: i32,
    /// Column major 2x2 transform [a, b, c, d]. Identity unless one of the scale flags was set.
    pub transform: [f32; 4],
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimpleGlyph {
    pub bounds: Bounds,
    pub contours: Vec<Contour>,
    /// Raw hinting program. Preserved, never executed.
    pub instructions: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeGlyph {
    pub bounds: Bounds,
    pub components: Vec<Component>,
    /// Raw hinting program. Preserved, never executed.
    pub instructions: Vec<u8>,
}

/// A decoded glyf table entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Glyph {
    /// No outline data. Space-like glyphs and anything whose data was unreadable.
    Empty,
    Simple(SimpleGlyph),
    Composite(CompositeGlyph),
}

// Truetype is a marvelous format.

fn parse_simple(stream: &mut Stream, bounds: Bounds, num_contours: usize) -> Glyph {
    let mut end_points = Vec::with_capacity(num_contours);
    for _ in 0..num_contours {
        match stream.read_u16() {
            Some(end_point) => end_points.push(end_point),
            None => return Glyph::Empty,
        }
    }
    // Since end points index by point, the last one is the point count minus 1.
    let num_points = end_points[num_contours - 1] as usize + 1;

    let instructions = match stream.read_u16().and_then(|length| stream.read_bytes(length as usize)) {
        Some(instructions) => instructions.to_vec(),
        None => return Glyph::Empty,
    };

    // Flags can repeat. They're not stored as literal repeats; a flag with the repeat bit is
    // followed by a count of extra copies.
    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = match stream.read_u8() {
            Some(flag) => flag,
            None => break,
        };
        flags.push(flag);
        if flag_u8(flag, SimpleFlags::REPEAT) {
            let count = match stream.read_u8() {
                Some(count) => count,
                None => break,
            };
            for _ in 0..count {
                if flags.len() >= num_points {
                    break;
                }
                flags.push(flag);
            }
        }
    }

    // X coordinates are deltas from the last position. A truncated stream yields as many whole
    // points as could be read.
    let mut xs = Vec::with_capacity(flags.len());
    let mut last_x = 0i32;
    for &flag in &flags {
        let delta = match flag & SimpleFlags::X_SHORT_AND_DUAL {
            SimpleFlags::X_SHORT_AND_DUAL => stream.read_u8().map(|v| v as i32),
            SimpleFlags::X_SHORT => stream.read_u8().map(|v| -(v as i32)),
            SimpleFlags::X_DUAL => Some(0),
            _ => stream.read_i16().map(|v| v as i32),
        };
        match delta {
            Some(delta) => {
                last_x += delta;
                xs.push(last_x);
            }
            None => break,
        }
    }

    // Y coordinates follow, same encoding with the y flag bits.
    let mut ys = Vec::with_capacity(flags.len());
    let mut last_y = 0i32;
    for &flag in &flags[..xs.len()] {
        let delta = match flag & SimpleFlags::Y_SHORT_AND_DUAL {
            SimpleFlags::Y_SHORT_AND_DUAL => stream.read_u8().map(|v| v as i32),
            SimpleFlags::Y_SHORT => stream.read_u8().map(|v| -(v as i32)),
            SimpleFlags::Y_DUAL => Some(0),
            _ => stream.read_i16().map(|v| v as i32),
        };
        match delta {
            Some(delta) => {
                last_y += delta;
                ys.push(last_y);
            }
            None => break,
        }
    }

    let num_valid = ys.len();
    let mut contours = Vec::with_capacity(num_contours);
    let mut start = 0usize;
    for &end_point in &end_points {
        let end = (end_point as usize + 1).min(num_valid);
        if start >= end {
            break;
        }
        let mut contour = Vec::with_capacity(end - start);
        for i in start..end {
            contour.push(Point {
                x: xs[i],
                y: ys[i],
                on_curve: flag_u8(flags[i], SimpleFlags::ON_CURVE),
                cubic: false,
            });
        }
        contours.push(contour);
        start = end;
    }

    Glyph::Simple(SimpleGlyph {
        bounds,
        contours,
        instructions,
    })
}

fn parse_compound(stream: &mut Stream, bounds: Bounds) -> Glyph {
    let mut components = Vec::new();
    let mut instructions = Vec::new();
    let mut more = true;
    while more {
        let (flags, glyph_id) = match (stream.read_u16(), stream.read_u16()) {
            (Some(flags), Some(glyph_id)) => (flags, glyph_id),
            // A truncated component list keeps whatever parsed before it.
            _ => break,
        };
        more = flag_u16(flags, CompoundFlags::MORE_COMPONENTS);

        // Arguments are words or bytes, and signed only when they're XY offsets. Point indices
        // are unsigned.
        let xy = flag_u16(flags, CompoundFlags::ARGS_ARE_XY_VALUES);
        let args = if flag_u16(flags, CompoundFlags::ARGS_ARE_WORDS) {
            match (stream.read_u16(), stream.read_u16()) {
                (Some(arg1), Some(arg2)) if xy => Some((arg1 as i16 as i32, arg2 as i16 as i32)),
                (Some(arg1), Some(arg2)) => Some((arg1 as i32, arg2 as i32)),
                _ => None,
            }
        } else {
            match (stream.read_u8(), stream.read_u8()) {
                (Some(arg1), Some(arg2)) if xy => Some((arg1 as i8 as i32, arg2 as i8 as i32)),
                (Some(arg1), Some(arg2)) => Some((arg1 as i32, arg2 as i32)),
                _ => None,
            }
        };
        let (arg1, arg2) = match args {
            Some(args) => args,
            None => break,
        };

        let mut transform = [1.0, 0.0, 0.0, 1.0];
        let read = if flag_u16(flags, CompoundFlags::WE_HAVE_A_SCALE) {
            stream.read_f2dot14().map(|scale| {
                transform[0] = scale;
                transform[3] = scale;
            })
        } else if flag_u16(flags, CompoundFlags::WE_HAVE_AN_X_AND_Y_SCALE) {
            match (stream.read_f2dot14(), stream.read_f2dot14()) {
                (Some(a), Some(d)) => {
                    transform[0] = a;
                    transform[3] = d;
                    Some(())
                }
                _ => None,
            }
        } else if flag_u16(flags, CompoundFlags::WE_HAVE_A_TWO_BY_TWO) {
            let values = (
                stream.read_f2dot14(),
                stream.read_f2dot14(),
                stream.read_f2dot14(),
                stream.read_f2dot14(),
            );
            match values {
                (Some(a), Some(b), Some(c), Some(d)) => {
                    transform = [a, b, c, d];
                    Some(())
                }
                _ => None,
            }
        } else {
            Some(())
        };
        if read.is_none() {
            break;
        }

        components.push(Component {
            glyph_id,
            flags,
            arg1,
            arg2,
            transform,
        });

        if !more && flag_u16(flags, CompoundFlags::WE_HAVE_INSTRUCTIONS) {
            if let Some(bytes) = stream.read_u16().and_then(|length| stream.read_bytes(length as usize)) {
                instructions = bytes.to_vec();
            }
        }
    }

    Glyph::Composite(CompositeGlyph {
        bounds,
        components,
        instructions,
    })
}

/// A lazy view over the glyf table. Glyphs decode on access; flattened composites are retained
/// in a bounded cache.
pub struct TableGlyf<'a> {
    data: &'a [u8],
    cache: OutlineCache,
}

impl<'a> TableGlyf<'a> {
    pub fn new(glyf: &'a [u8]) -> TableGlyf<'a> {
        TableGlyf {
            data: glyf,
            cache: OutlineCache::new(),
        }
    }

    /// Decodes one glyph. Unreadable headers come back as Glyph::Empty; truncated point or
    /// component streams yield whatever parsed cleanly before the end.
    pub fn parse(&self, loca: &TableLoca, glyph_id: u16) -> Glyph {
        let location = match loca.get(glyph_id) {
            Some(location) => location,
            None => return Glyph::Empty,
        };
        let glyph = match location
            .offset
            .checked_add(location.length)
            .and_then(|end| self.data.get(location.offset..end))
        {
            Some(glyph) => glyph,
            None => return Glyph::Empty,
        };
        let mut stream = Stream::new(glyph);
        let header = (
            stream.read_i16(),
            stream.read_i16(),
            stream.read_i16(),
            stream.read_i16(),
            stream.read_i16(),
        );
        let (num_contours, bounds) = match header {
            (Some(n), Some(xmin), Some(ymin), Some(xmax), Some(ymax)) => (
                n,
                Bounds {
                    xmin,
                    ymin,
                    xmax,
                    ymax,
                },
            ),
            _ => return Glyph::Empty,
        };
        if num_contours == 0 {
            Glyph::Simple(SimpleGlyph {
                bounds,
                contours: Vec::new(),
                instructions: Vec::new(),
            })
        } else if num_contours > 0 {
            parse_simple(&mut stream, bounds, num_contours as usize)
        } else {
            parse_compound(&mut stream, bounds)
        }
    }

    /// The bounding box from the glyph header. None for empty glyphs.
    pub fn bounds(&self, loca: &TableLoca, glyph_id: u16) -> Option<Bounds> {
        let location = loca.get(glyph_id)?;
        let end = location.offset.checked_add(location.length)?;
        let glyph = self.data.get(location.offset..end)?;
        let mut stream = Stream::new(glyph);
        stream.read_i16()?; // numberOfContours
        Some(Bounds {
            xmin: stream.read_i16()?,
            ymin: stream.read_i16()?,
            xmax: stream.read_i16()?,
            ymax: stream.read_i16()?,
        })
    }

    /// The glyph's contours with composites flattened.
    pub fn outline(&mut self, loca: &TableLoca, glyph_id: u16) -> Vec<Contour> {
        self.outline_inner(loca, None, glyph_id)
    }

    pub fn outline_with_bounds(
        &mut self,
        loca: &TableLoca,
        glyph_id: u16,
    ) -> (Vec<Contour>, Option<Bounds>) {
        let bounds = self.bounds(loca, glyph_id);
        (self.outline(loca, glyph_id), bounds)
    }

    /// Like outline, but applies gvar deltas at the given normalized axis coordinates. Simple
    /// components are deltaed before their component transform so composition sees the varied
    /// points. The cache is bypassed whenever coordinates are in effect.
    pub fn outline_with_variation(
        &mut self,
        loca: &TableLoca,
        gvar: Option<&TableGvar>,
        glyph_id: u16,
        axis_coords: Option<&[f32]>,
    ) -> Vec<Contour> {
        let variation = match (gvar, axis_coords) {
            (Some(gvar), Some(coords)) if !coords.is_empty() => Some((gvar, coords)),
            _ => None,
        };
        self.outline_inner(loca, variation, glyph_id)
    }

    fn outline_inner(
        &mut self,
        loca: &TableLoca,
        variation: Option<(&TableGvar, &[f32])>,
        glyph_id: u16,
    ) -> Vec<Contour> {
        match self.parse(loca, glyph_id) {
            Glyph::Empty => Vec::new(),
            Glyph::Simple(simple) => {
                let mut contours = simple.contours;
                if let Some((gvar, coords)) = variation {
                    apply_deltas(gvar, glyph_id, coords, &mut contours);
                }
                contours
            }
            Glyph::Composite(compound) => {
                if variation.is_none() {
                    if let Some(cached) = self.cache.get(glyph_id) {
                        return cached.clone();
                    }
                }
                let contours = self.flatten(loca, &compound.components, 0, variation);
                if variation.is_none() {
                    self.cache.insert(glyph_id, contours.clone());
                }
                contours
            }
        }
    }

    fn flatten(
        &self,
        loca: &TableLoca,
        components: &[Component],
        depth: u32,
        variation: Option<(&TableGvar, &[f32])>,
    ) -> Vec<Contour> {
        if depth > MAX_COMPOSITE_DEPTH {
            return Vec::new();
        }
        let mut result = Vec::new();
        for component in components {
            let mut contours = match self.parse(loca, component.glyph_id) {
                Glyph::Empty => continue,
                Glyph::Simple(simple) => {
                    let mut contours = simple.contours;
                    if let Some((gvar, coords)) = variation {
                        apply_deltas(gvar, component.glyph_id, coords, &mut contours);
                    }
                    contours
                }
                Glyph::Composite(inner) => {
                    self.flatten(loca, &inner.components, depth + 1, variation)
                }
            };
            let (dx, dy) = if flag_u16(component.flags, CompoundFlags::ARGS_ARE_XY_VALUES) {
                (component.arg1 as f32, component.arg2 as f32)
            } else {
                // Point alignment mode. The args are matched point indices; anchor resolution
                // is not performed and the component lands untranslated.
                (0.0, 0.0)
            };
            let [a, b, c, d] = component.transform;
            for point in contours.iter_mut().flat_map(|contour| contour.iter_mut()) {
                let px = point.x as f32;
                let py = point.y as f32;
                point.x = round_half_away(a * px + c * py + dx);
                point.y = round_half_away(b * px + d * py + dy);
            }
            result.append(&mut contours);
        }
        result
    }
}

fn apply_deltas(gvar: &TableGvar, glyph_id: u16, coords: &[f32], contours: &mut [Contour]) {
    let num_points: usize = contours.iter().map(|contour| contour.len()).sum();
    if num_points == 0 {
        return;
    }
    // The variation data also covers the four phantom points; request them and drop them.
    let deltas = gvar.glyph_deltas(glyph_id, num_points + 4, coords);
    let mut index = 0;
    for point in contours.iter_mut().flat_map(|contour| contour.iter_mut()) {
        let (dx, dy) = deltas[index];
        point.x += dx;
        point.y += dy;
        index += 1;
    }
}

/// Bounded glyph id to flattened outline map. Eviction drops the oldest insertion.
struct OutlineCache {
    map: HashMap<u16, Vec<Contour>>,
    order: VecDeque<u16>,
}

impl OutlineCache {
    fn new() -> OutlineCache {
        OutlineCache {
            map: HashMap::with_capacity(CACHE_CAPACITY),
            order: VecDeque::with_capacity(CACHE_CAPACITY),
        }
    }

    fn get(&self, glyph_id: u16) -> Option<&Vec<Contour>> {
        self.map.get(&glyph_id)
    }

    fn insert(&mut self, glyph_id: u16, contours: Vec<Contour>) {
        if self.map.contains_key(&glyph_id) {
            self.map.insert(glyph_id, contours);
            return;
        }
        if self.map.len() >= CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.map.insert(glyph_id, contours);
        self.order.push_back(glyph_id);
    }
}
