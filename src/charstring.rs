//! The Type 2 charstring interpreter. Executes the stack machine programs that describe CFF and
//! CFF2 glyph outlines.
//!
//! Adobe Type 2: https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf
//! Microsoft CFF2: https://docs.microsoft.com/en-us/typography/opentype/spec/cff2charstr
//!
//! Malformed programs never escape as errors. Operand underflow, bad indices, missing
//! subroutines, and truncated streams all terminate the current frame and keep whatever
//! geometry was already produced; real fonts trip strict interpreters constantly.

use crate::math;
use crate::outline::{Builder, Contour};
use crate::parse::Stream;
use crate::table::cff::Index;
use crate::table::ivs::ItemVariationStore;
use alloc::vec::*;

/// CFF2 raised the operand limit from 48 to accommodate blend.
const STACK_LIMIT: usize = 513;
/// Slots addressable by put and get.
const TRANSIENT_SIZE: usize = 32;
/// Appendix B of the Type 2 spec.
const NESTING_LIMIT: u32 = 10;

mod op {
    pub const HSTEM: u8 = 1;
    pub const VSTEM: u8 = 3;
    pub const VMOVETO: u8 = 4;
    pub const RLINETO: u8 = 5;
    pub const HLINETO: u8 = 6;
    pub const VLINETO: u8 = 7;
    pub const RRCURVETO: u8 = 8;
    pub const CALLSUBR: u8 = 10;
    pub const RETURN: u8 = 11;
    pub const ESCAPE: u8 = 12;
    pub const ENDCHAR: u8 = 14;
    pub const VSINDEX: u8 = 15;
    pub const BLEND: u8 = 16;
    pub const HSTEMHM: u8 = 18;
    pub const HINTMASK: u8 = 19;
    pub const CNTRMASK: u8 = 20;
    pub const RMOVETO: u8 = 21;
    pub const HMOVETO: u8 = 22;
    pub const VSTEMHM: u8 = 23;
    pub const RCURVELINE: u8 = 24;
    pub const RLINECURVE: u8 = 25;
    pub const VVCURVETO: u8 = 26;
    pub const HHCURVETO: u8 = 27;
    pub const CALLGSUBR: u8 = 29;
    pub const VHCURVETO: u8 = 30;
    pub const HVCURVETO: u8 = 31;

    // Two byte operators behind the 12 escape.
    pub const DOTSECTION: u8 = 0;
    pub const AND: u8 = 3;
    pub const OR: u8 = 4;
    pub const NOT: u8 = 5;
    pub const ABS: u8 = 9;
    pub const ADD: u8 = 10;
    pub const SUB: u8 = 11;
    pub const DIV: u8 = 12;
    pub const NEG: u8 = 14;
    pub const EQ: u8 = 15;
    pub const DROP: u8 = 18;
    pub const PUT: u8 = 20;
    pub const GET: u8 = 21;
    pub const IFELSE: u8 = 22;
    pub const RANDOM: u8 = 23;
    pub const MUL: u8 = 24;
    pub const SQRT: u8 = 26;
    pub const DUP: u8 = 27;
    pub const EXCH: u8 = 28;
    pub const INDEX: u8 = 29;
    pub const ROLL: u8 = 30;
    pub const HFLEX: u8 = 34;
    pub const FLEX: u8 = 35;
    pub const HFLEX1: u8 = 36;
    pub const FLEX1: u8 = 37;
}

/// Which charstring dialect is executing.
pub(crate) enum Variant<'a> {
    Cff,
    Cff2 {
        ivs: Option<&'a ItemVariationStore>,
        coords: &'a [f32],
    },
}

/// The operand stack. Arithmetic pops from the top; path operators read from the bottom with
/// an index, which keeps long operand lists linear.
struct Stack {
    values: [f32; STACK_LIMIT],
    top: usize,
}

impl Stack {
    fn new() -> Stack {
        Stack {
            values: [0.0; STACK_LIMIT],
            top: 0,
        }
    }

    #[inline]
    fn push(&mut self, value: f32) -> Option<()> {
        if self.top >= STACK_LIMIT {
            return None;
        }
        self.values[self.top] = value;
        self.top += 1;
        Some(())
    }

    #[inline]
    fn pop(&mut self) -> Option<f32> {
        if self.top == 0 {
            return None;
        }
        self.top -= 1;
        Some(self.values[self.top])
    }

    #[inline]
    fn get(&self, index: usize) -> Option<f32> {
        if index >= self.top {
            return None;
        }
        Some(self.values[index])
    }

    #[inline]
    fn set(&mut self, index: usize, value: f32) {
        if index < self.top {
            self.values[index] = value;
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.top
    }

    #[inline]
    fn clear(&mut self) {
        self.top = 0;
    }

    #[inline]
    fn truncate(&mut self, len: usize) {
        if len < self.top {
            self.top = len;
        }
    }

    #[inline]
    fn slice_mut(&mut self) -> &mut [f32] {
        &mut self.values[..self.top]
    }
}

/// What an operator did to control flow.
enum Flow {
    /// Keep executing the current frame.
    Step,
    /// The return operator: leave the current frame.
    Return,
    /// The endchar operator: unwind the whole program.
    Done,
}

/// Executes a charstring and returns its contours. This is the only entry point; subroutine
/// frames share the machine state.
pub(crate) fn execute(
    program: &[u8],
    global_subrs: &Index,
    local_subrs: Option<&Index>,
    variant: Variant,
) -> Vec<Contour> {
    let cff2 = matches!(&variant, Variant::Cff2 { .. });
    let mut machine = Machine {
        global_subrs,
        local_subrs,
        variant,
        stack: Stack::new(),
        transient: [0.0; TRANSIENT_SIZE],
        x: 0.0,
        y: 0.0,
        n_stems: 0,
        // CFF2 dropped the leading width operand; CFF decides at the first eligible operator.
        have_width: cff2,
        width: None,
        vsindex: 0,
        region_scalars: None,
        rng: 0x2F6E_2B1D,
        builder: Builder::new(),
    };
    machine.run(program, 0);
    machine.builder.finish()
}

struct Machine<'a, 'b> {
    global_subrs: &'b Index<'a>,
    local_subrs: Option<&'b Index<'a>>,
    variant: Variant<'b>,
    stack: Stack,
    transient: [f32; TRANSIENT_SIZE],
    x: f32,
    y: f32,
    /// Cumulative stem hint count across the whole execution. Decides the hintmask width.
    n_stems: u32,
    have_width: bool,
    width: Option<f32>,
    vsindex: u16,
    /// Region scalars for the active vsindex, computed on first blend.
    region_scalars: Option<Vec<f32>>,
    rng: u32,
    builder: Builder,
}

impl<'a, 'b> Machine<'a, 'b> {
    /// Runs one frame. Returns true when endchar fired, which unwinds the caller frames too.
    fn run(&mut self, program: &[u8], depth: u32) -> bool {
        if depth > NESTING_LIMIT {
            return false;
        }
        let mut stream = Stream::new(program);
        while stream.remaining() > 0 {
            let b0 = match stream.read_u8() {
                Some(b0) => b0,
                None => break,
            };
            match self.operator(b0, &mut stream, depth) {
                Some(Flow::Step) => {}
                Some(Flow::Return) => break,
                Some(Flow::Done) => return true,
                // Malformed: abort this frame, keep the geometry.
                None => break,
            }
        }
        false
    }

    fn operator(&mut self, b0: u8, stream: &mut Stream, depth: u32) -> Option<Flow> {
        match b0 {
            // Operand encodings.
            28 => {
                let value = stream.read_i16()?;
                self.stack.push(value as f32)?;
            }
            255 => {
                // 16.16 fixed point.
                let value = stream.read_i32()?;
                self.stack.push(value as f32 / 65536.0)?;
            }
            32..=246 => {
                self.stack.push(b0 as f32 - 139.0)?;
            }
            247..=250 => {
                let b1 = stream.read_u8()?;
                self.stack.push((b0 as f32 - 247.0) * 256.0 + b1 as f32 + 108.0)?;
            }
            251..=254 => {
                let b1 = stream.read_u8()?;
                self.stack.push(-(b0 as f32 - 251.0) * 256.0 - b1 as f32 - 108.0)?;
            }

            op::ESCAPE => {
                let b1 = stream.read_u8()?;
                return self.escaped_operator(b1);
            }

            // Hints.
            op::HSTEM | op::VSTEM | op::HSTEMHM | op::VSTEMHM => {
                let start = self.leading_width(self.stack.len() % 2 == 1);
                self.n_stems += ((self.stack.len() - start) / 2) as u32;
                self.stack.clear();
            }
            op::HINTMASK | op::CNTRMASK => {
                // Residual operands are an implied vstemhm. The mask length depends on the
                // stem count after that update.
                let start = self.leading_width(self.stack.len() % 2 == 1);
                self.n_stems += ((self.stack.len() - start) / 2) as u32;
                self.stack.clear();
                let mask_length = (self.n_stems as usize + 7) / 8;
                stream.read_bytes(mask_length)?;
            }

            // Path construction.
            op::RMOVETO => {
                let i = self.leading_width(self.stack.len() > 2);
                let dx = self.stack.get(i)?;
                let dy = self.stack.get(i + 1)?;
                self.x += dx;
                self.y += dy;
                self.builder.move_to(self.x, self.y);
                self.stack.clear();
            }
            op::HMOVETO => {
                let i = self.leading_width(self.stack.len() > 1);
                self.x += self.stack.get(i)?;
                self.builder.move_to(self.x, self.y);
                self.stack.clear();
            }
            op::VMOVETO => {
                let i = self.leading_width(self.stack.len() > 1);
                self.y += self.stack.get(i)?;
                self.builder.move_to(self.x, self.y);
                self.stack.clear();
            }
            op::RLINETO => {
                let mut i = 0;
                while i + 2 <= self.stack.len() {
                    self.x += self.stack.get(i)?;
                    self.y += self.stack.get(i + 1)?;
                    self.builder.line_to(self.x, self.y);
                    i += 2;
                }
                self.stack.clear();
            }
            op::HLINETO | op::VLINETO => {
                let mut horizontal = b0 == op::HLINETO;
                for i in 0..self.stack.len() {
                    let delta = self.stack.get(i)?;
                    if horizontal {
                        self.x += delta;
                    } else {
                        self.y += delta;
                    }
                    horizontal = !horizontal;
                    self.builder.line_to(self.x, self.y);
                }
                self.stack.clear();
            }
            op::RRCURVETO => {
                let mut i = 0;
                while i + 6 <= self.stack.len() {
                    i = self.curve(i)?;
                }
                self.stack.clear();
            }
            op::RCURVELINE => {
                let mut i = 0;
                while i + 6 <= self.stack.len() {
                    i = self.curve(i)?;
                }
                self.x += self.stack.get(i)?;
                self.y += self.stack.get(i + 1)?;
                self.builder.line_to(self.x, self.y);
                self.stack.clear();
            }
            op::RLINECURVE => {
                let line_end = self.stack.len().checked_sub(6)?;
                let mut i = 0;
                while i + 2 <= line_end {
                    self.x += self.stack.get(i)?;
                    self.y += self.stack.get(i + 1)?;
                    self.builder.line_to(self.x, self.y);
                    i += 2;
                }
                self.curve(i)?;
                self.stack.clear();
            }
            op::VVCURVETO => {
                let mut i = 0;
                if self.stack.len() % 2 == 1 {
                    self.x += self.stack.get(0)?;
                    i = 1;
                }
                while i + 4 <= self.stack.len() {
                    let x1 = self.x;
                    let y1 = self.y + self.stack.get(i)?;
                    let x2 = x1 + self.stack.get(i + 1)?;
                    let y2 = y1 + self.stack.get(i + 2)?;
                    self.x = x2;
                    self.y = y2 + self.stack.get(i + 3)?;
                    self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
                    i += 4;
                }
                self.stack.clear();
            }
            op::HHCURVETO => {
                let mut i = 0;
                if self.stack.len() % 2 == 1 {
                    self.y += self.stack.get(0)?;
                    i = 1;
                }
                while i + 4 <= self.stack.len() {
                    let x1 = self.x + self.stack.get(i)?;
                    let y1 = self.y;
                    let x2 = x1 + self.stack.get(i + 1)?;
                    let y2 = y1 + self.stack.get(i + 2)?;
                    self.x = x2 + self.stack.get(i + 3)?;
                    self.y = y2;
                    self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
                    i += 4;
                }
                self.stack.clear();
            }
            op::HVCURVETO | op::VHCURVETO => {
                let count = self.stack.len();
                let mut horizontal = b0 == op::HVCURVETO;
                let mut i = 0;
                while i + 4 <= count {
                    // Five remaining operands means the last curve carries an extra delta on
                    // the other axis.
                    let last = count - i == 5;
                    let (x1, y1, x2, y2, x3, y3);
                    if horizontal {
                        x1 = self.x + self.stack.get(i)?;
                        y1 = self.y;
                        x2 = x1 + self.stack.get(i + 1)?;
                        y2 = y1 + self.stack.get(i + 2)?;
                        y3 = y2 + self.stack.get(i + 3)?;
                        x3 = if last { x2 + self.stack.get(i + 4)? } else { x2 };
                    } else {
                        x1 = self.x;
                        y1 = self.y + self.stack.get(i)?;
                        x2 = x1 + self.stack.get(i + 1)?;
                        y2 = y1 + self.stack.get(i + 2)?;
                        x3 = x2 + self.stack.get(i + 3)?;
                        y3 = if last { y2 + self.stack.get(i + 4)? } else { y2 };
                    }
                    self.builder.curve_to(x1, y1, x2, y2, x3, y3);
                    self.x = x3;
                    self.y = y3;
                    horizontal = !horizontal;
                    i += 4;
                }
                self.stack.clear();
            }

            // Subroutines.
            op::CALLSUBR | op::CALLGSUBR => {
                let subrs = if b0 == op::CALLSUBR {
                    match self.local_subrs {
                        Some(subrs) => subrs,
                        // No local subr table; the call is dropped.
                        None => {
                            self.stack.pop()?;
                            return Some(Flow::Step);
                        }
                    }
                } else {
                    self.global_subrs
                };
                let index = self.stack.pop()? as i32 + subrs.bias();
                if index < 0 {
                    return Some(Flow::Step);
                }
                match subrs.get(index as usize) {
                    Some(subr) => {
                        if self.run(subr, depth + 1) {
                            return Some(Flow::Done);
                        }
                    }
                    // Missing subroutine; the call is dropped.
                    None => {}
                }
            }
            op::RETURN => return Some(Flow::Return),
            op::ENDCHAR => {
                self.leading_width(self.stack.len() > 0);
                self.stack.clear();
                self.builder.close();
                return Some(Flow::Done);
            }

            // CFF2 variation.
            op::VSINDEX => match self.variant {
                Variant::Cff2 { .. } => {
                    let index = self.stack.pop()? as i32;
                    if index < 0 {
                        return None;
                    }
                    self.vsindex = index as u16;
                    self.region_scalars = None;
                }
                Variant::Cff => return None,
            },
            op::BLEND => match self.variant {
                Variant::Cff2 { .. } => self.blend()?,
                Variant::Cff => return None,
            },

            // Reserved codes abort the frame.
            _ => return None,
        }
        Some(Flow::Step)
    }

    fn escaped_operator(&mut self, b1: u8) -> Option<Flow> {
        match b1 {
            op::DOTSECTION => {
                // Deprecated hint hysteresis control; accepted and ignored.
            }

            // Flex: two curves in one operator. Emitted unconditionally, like FreeType; the
            // flex depth operand is ignored.
            op::FLEX => {
                let x1 = self.x + self.stack.get(0)?;
                let y1 = self.y + self.stack.get(1)?;
                let x2 = x1 + self.stack.get(2)?;
                let y2 = y1 + self.stack.get(3)?;
                let x3 = x2 + self.stack.get(4)?;
                let y3 = y2 + self.stack.get(5)?;
                let x4 = x3 + self.stack.get(6)?;
                let y4 = y3 + self.stack.get(7)?;
                let x5 = x4 + self.stack.get(8)?;
                let y5 = y4 + self.stack.get(9)?;
                self.x = x5 + self.stack.get(10)?;
                self.y = y5 + self.stack.get(11)?;
                self.builder.curve_to(x1, y1, x2, y2, x3, y3);
                self.builder.curve_to(x4, y4, x5, y5, self.x, self.y);
                self.stack.clear();
            }
            op::HFLEX => {
                let x1 = self.x + self.stack.get(0)?;
                let y1 = self.y;
                let x2 = x1 + self.stack.get(1)?;
                let y2 = y1 + self.stack.get(2)?;
                let x3 = x2 + self.stack.get(3)?;
                let y3 = y2;
                let x4 = x3 + self.stack.get(4)?;
                let y4 = y2;
                let x5 = x4 + self.stack.get(5)?;
                let y5 = self.y;
                self.x = x5 + self.stack.get(6)?;
                self.builder.curve_to(x1, y1, x2, y2, x3, y3);
                self.builder.curve_to(x4, y4, x5, y5, self.x, self.y);
                self.stack.clear();
            }
            op::HFLEX1 => {
                let x1 = self.x + self.stack.get(0)?;
                let y1 = self.y + self.stack.get(1)?;
                let x2 = x1 + self.stack.get(2)?;
                let y2 = y1 + self.stack.get(3)?;
                let x3 = x2 + self.stack.get(4)?;
                let y3 = y2;
                let x4 = x3 + self.stack.get(5)?;
                let y4 = y2;
                let x5 = x4 + self.stack.get(6)?;
                let y5 = y4 + self.stack.get(7)?;
                self.x = x5 + self.stack.get(8)?;
                self.builder.curve_to(x1, y1, x2, y2, x3, y3);
                self.builder.curve_to(x4, y4, x5, y5, self.x, self.y);
                self.stack.clear();
            }
            op::FLEX1 => {
                let start_x = self.x;
                let start_y = self.y;
                let x1 = self.x + self.stack.get(0)?;
                let y1 = self.y + self.stack.get(1)?;
                let x2 = x1 + self.stack.get(2)?;
                let y2 = y1 + self.stack.get(3)?;
                let x3 = x2 + self.stack.get(4)?;
                let y3 = y2 + self.stack.get(5)?;
                let x4 = x3 + self.stack.get(6)?;
                let y4 = y3 + self.stack.get(7)?;
                let x5 = x4 + self.stack.get(8)?;
                let y5 = y4 + self.stack.get(9)?;
                // The final delta lands on whichever axis moved more; the other axis returns
                // to the start.
                if math::abs(x5 - start_x) > math::abs(y5 - start_y) {
                    self.x = x5 + self.stack.get(10)?;
                    self.y = start_y;
                } else {
                    self.x = start_x;
                    self.y = y5 + self.stack.get(10)?;
                }
                self.builder.curve_to(x1, y1, x2, y2, x3, y3);
                self.builder.curve_to(x4, y4, x5, y5, self.x, self.y);
                self.stack.clear();
            }

            // Arithmetic. Two operand forms pop b then a, where a was pushed first.
            op::AND => {
                let (a, b) = self.pop_pair()?;
                self.stack.push(if a != 0.0 && b != 0.0 { 1.0 } else { 0.0 })?;
            }
            op::OR => {
                let (a, b) = self.pop_pair()?;
                self.stack.push(if a != 0.0 || b != 0.0 { 1.0 } else { 0.0 })?;
            }
            op::NOT => {
                let value = self.stack.pop()?;
                self.stack.push(if value == 0.0 { 1.0 } else { 0.0 })?;
            }
            op::ABS => {
                let value = self.stack.pop()?;
                self.stack.push(math::abs(value))?;
            }
            op::ADD => {
                let (a, b) = self.pop_pair()?;
                self.stack.push(a + b)?;
            }
            op::SUB => {
                let (a, b) = self.pop_pair()?;
                self.stack.push(a - b)?;
            }
            op::DIV => {
                let (a, b) = self.pop_pair()?;
                if b == 0.0 {
                    return None;
                }
                self.stack.push(a / b)?;
            }
            op::NEG => {
                let value = self.stack.pop()?;
                self.stack.push(-value)?;
            }
            op::EQ => {
                let (a, b) = self.pop_pair()?;
                self.stack.push(if a == b { 1.0 } else { 0.0 })?;
            }
            op::DROP => {
                self.stack.pop()?;
            }
            op::PUT => {
                let index = self.stack.pop()? as i32;
                let value = self.stack.pop()?;
                if index < 0 || index as usize >= TRANSIENT_SIZE {
                    return None;
                }
                self.transient[index as usize] = value;
            }
            op::GET => {
                let index = self.stack.pop()? as i32;
                if index < 0 || index as usize >= TRANSIENT_SIZE {
                    return None;
                }
                self.stack.push(self.transient[index as usize])?;
            }
            op::IFELSE => {
                let v2 = self.stack.pop()?;
                let v1 = self.stack.pop()?;
                let s2 = self.stack.pop()?;
                let s1 = self.stack.pop()?;
                self.stack.push(if v1 <= v2 { s1 } else { s2 })?;
            }
            op::RANDOM => {
                self.rng = self.rng.wrapping_mul(1664525).wrapping_add(1013904223);
                // Strictly inside (0, 1).
                let value = ((self.rng >> 8) | 1) as f32 / 16_777_216.0;
                self.stack.push(value)?;
            }
            op::MUL => {
                let (a, b) = self.pop_pair()?;
                self.stack.push(a * b)?;
            }
            op::SQRT => {
                let value = self.stack.pop()?;
                if value < 0.0 {
                    return None;
                }
                self.stack.push(math::sqrt(value))?;
            }
            op::DUP => {
                let value = self.stack.get(self.stack.len().checked_sub(1)?)?;
                self.stack.push(value)?;
            }
            op::EXCH => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                self.stack.push(b)?;
                self.stack.push(a)?;
            }
            op::INDEX => {
                let index = self.stack.pop()? as i32;
                let len = self.stack.len();
                let value = if index < 0 {
                    // A negative index duplicates the top element.
                    self.stack.get(len.checked_sub(1)?)?
                } else {
                    self.stack.get(len.checked_sub(1 + index as usize)?)?
                };
                self.stack.push(value)?;
            }
            op::ROLL => {
                let shift = self.stack.pop()? as i32;
                let count = self.stack.pop()? as i32;
                if count <= 0 || count as usize > self.stack.len() {
                    return None;
                }
                let count = count as usize;
                let start = self.stack.len() - count;
                let shift = shift.rem_euclid(count as i32) as usize;
                // Positive shifts rotate toward the top of the stack.
                self.stack.slice_mut()[start..].rotate_right(shift);
            }

            _ => return None,
        }
        Some(Flow::Step)
    }

    /// One cubic segment read from the stack at i. Returns the next read position.
    fn curve(&mut self, i: usize) -> Option<usize> {
        let x1 = self.x + self.stack.get(i)?;
        let y1 = self.y + self.stack.get(i + 1)?;
        let x2 = x1 + self.stack.get(i + 2)?;
        let y2 = y1 + self.stack.get(i + 3)?;
        self.x = x2 + self.stack.get(i + 4)?;
        self.y = y2 + self.stack.get(i + 5)?;
        self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
        Some(i + 6)
    }

    /// CFF charstrings may lead with the glyph's advance width. The first eligible operator
    /// decides, exactly once: an operand count inconsistent with the widthless form means the
    /// bottom operand is the width. CFF2 starts with have_width set and never consumes one.
    fn leading_width(&mut self, inconsistent: bool) -> usize {
        if self.have_width {
            return 0;
        }
        self.have_width = true;
        if inconsistent {
            self.width = self.stack.get(0);
            1
        } else {
            0
        }
    }

    fn pop_pair(&mut self) -> Option<(f32, f32)> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        Some((a, b))
    }

    /// Blends the stack in place: n defaults followed by n deltas per region collapse into n
    /// final values. With no variation store the deltas are absent and the defaults stand.
    fn blend(&mut self) -> Option<()> {
        let n = self.stack.pop()? as i32;
        if n < 0 {
            return None;
        }
        let n = n as usize;
        let (ivs, coords) = match self.variant {
            Variant::Cff2 { ivs: Some(ivs), coords } => (ivs, coords),
            _ => return Some(()),
        };
        if self.region_scalars.is_none() {
            let count = ivs.region_count(self.vsindex);
            let mut scalars = Vec::with_capacity(count);
            for region in 0..count {
                scalars.push(ivs.region_scalar(self.vsindex, region, coords));
            }
            self.region_scalars = Some(scalars);
        }
        let scalars = self.region_scalars.as_ref()?;
        let region_count = scalars.len();
        let needed = n.checked_mul(region_count + 1)?;
        if self.stack.len() < needed {
            return None;
        }
        let base = self.stack.len() - needed;
        for i in 0..n {
            let mut value = self.stack.get(base + i)?;
            for region in 0..region_count {
                value += self.stack.get(base + n + i * region_count + region)? * scalars[region];
            }
            self.stack.set(base + i, value);
        }
        self.stack.truncate(base + n);
        Some(())
    }
}
