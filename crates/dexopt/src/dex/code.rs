use std::collections::HashMap;

use super::instruction::{DexRef, Instruction, literal_fits, reg_fits};
use super::opcode::{Format, Opcode};

/// Packed method body: a position-addressed sequence of 16-bit code units.
/// Not editable; `balloon` it first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedCode {
    units: Vec<u16>,
}

impl PackedCode {
    #[must_use]
    pub const fn new(units: Vec<u16>) -> Self {
        Self { units }
    }

    #[must_use]
    pub fn units(&self) -> &[u16] {
        &self.units
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Entry in a materialized method body. The `Entry` and `Exit` sentinels
/// anchor control flow at the boundaries of the instruction span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodItem {
    Entry,
    Insn(Instruction),
    Exit,
}

/// Materialized method body: an ordered, editable list of owned instructions
/// bracketed by entry/exit sentinels.
///
/// Mutation is restricted to appending during construction and contiguous
/// span replacement during rewriting; branch targets are instruction indices
/// and are remapped whenever a span replacement shifts positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionList {
    items: Vec<MethodItem>,
}

impl InstructionList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: vec![MethodItem::Entry, MethodItem::Exit],
        }
    }

    #[must_use]
    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        let mut items = Vec::with_capacity(instructions.len() + 2);
        items.push(MethodItem::Entry);
        items.extend(instructions.into_iter().map(MethodItem::Insn));
        items.push(MethodItem::Exit);
        Self { items }
    }

    /// Number of instructions, sentinels excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len() - 2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an instruction before the exit sentinel.
    pub fn push(&mut self, insn: Instruction) {
        let exit = self.items.len() - 1;
        self.items.insert(exit, MethodItem::Insn(insn));
    }

    #[must_use]
    pub fn insn(&self, i: usize) -> &Instruction {
        match &self.items[i + 1] {
            MethodItem::Insn(insn) => insn,
            MethodItem::Entry | MethodItem::Exit => unreachable!("sentinel inside instruction span"),
        }
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.items.iter().filter_map(|item| match item {
            MethodItem::Insn(insn) => Some(insn),
            MethodItem::Entry | MethodItem::Exit => None,
        })
    }

    #[must_use]
    pub fn to_instructions(&self) -> Vec<Instruction> {
        self.instructions().cloned().collect()
    }

    /// Replace the `len` instructions starting at `start` with `replacement`.
    ///
    /// Branch targets elsewhere in the list are remapped: targets past the
    /// span shift by the size delta, targets into the span collapse to its
    /// first replacement instruction. Replacement instructions must not carry
    /// branch targets of their own.
    pub fn replace_span(&mut self, start: usize, len: usize, replacement: Vec<Instruction>) {
        assert!(start + len <= self.len(), "replaced span out of bounds");
        assert!(
            replacement.iter().all(|insn| insn.target().is_none()),
            "replacement instructions must not branch"
        );
        let repl_len = replacement.len();
        for (idx, item) in self.items.iter_mut().enumerate() {
            // idx 0 is the entry sentinel
            let insn_idx = idx.wrapping_sub(1);
            if let MethodItem::Insn(insn) = item
                && let Some(t) = insn.target()
                && !(insn_idx >= start && insn_idx < start + len)
            {
                let mapped = if t < start {
                    t
                } else if t < start + len {
                    start
                } else {
                    t - len + repl_len
                };
                insn.set_target(mapped);
            }
        }
        let at = start + 1; // skip the entry sentinel
        self.items
            .splice(at..at + len, replacement.into_iter().map(MethodItem::Insn));
    }
}

impl Default for InstructionList {
    fn default() -> Self {
        Self::new()
    }
}

/// A method body, tracked by representation.
///
/// Exactly one canonical representation is active at a time: code is never
/// mutated while packed, and the packed form is stale while materialized.
/// `balloon` and `sync` are the only transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DexCode {
    Packed(PackedCode),
    Materialized(InstructionList),
}

impl DexCode {
    #[must_use]
    pub const fn empty() -> Self {
        Self::Packed(PackedCode::new(Vec::new()))
    }

    #[must_use]
    pub const fn from_units(units: Vec<u16>) -> Self {
        Self::Packed(PackedCode::new(units))
    }

    #[must_use]
    pub const fn is_packed(&self) -> bool {
        matches!(self, Self::Packed(_))
    }

    /// Decode the packed body into an editable instruction list.
    ///
    /// Panics on malformed input (unknown opcode, truncated encoding, branch
    /// into the middle of an instruction): corrupt packed code means a bug
    /// upstream of this pass, and continuing would emit wrong code.
    pub fn balloon(&mut self) {
        let Self::Packed(packed) = self else {
            panic!("balloon() on a materialized body");
        };
        let list = InstructionList::from_instructions(decode_units(packed.units()));
        *self = Self::Materialized(list);
    }

    /// Re-encode the instruction list into packed form, recomputing branch
    /// offsets from instruction positions. Idempotent with `balloon` when no
    /// instruction changed.
    pub fn sync(&mut self) {
        let Self::Materialized(list) = self else {
            panic!("sync() on a packed body");
        };
        let units = encode_instructions(&list.to_instructions());
        *self = Self::Packed(PackedCode::new(units));
    }

    #[must_use]
    pub fn list(&self) -> &InstructionList {
        match self {
            Self::Materialized(list) => list,
            Self::Packed(_) => panic!("instruction list of a packed body"),
        }
    }

    pub fn list_mut(&mut self) -> &mut InstructionList {
        match self {
            Self::Materialized(list) => list,
            Self::Packed(_) => panic!("instruction list of a packed body"),
        }
    }

    #[must_use]
    pub fn units(&self) -> &[u16] {
        match self {
            Self::Packed(packed) => packed.units(),
            Self::Materialized(_) => panic!("code units of a materialized body"),
        }
    }

    /// Decode and hand out the instructions of a packed body for inspection,
    /// leaving the body empty. Test harnesses use this to compare rewrite
    /// output without keeping the method alive.
    pub fn release_instructions(&mut self) -> Vec<Instruction> {
        let Self::Packed(packed) = self else {
            panic!("release_instructions() on a materialized body");
        };
        let instructions = decode_units(packed.units());
        *self = Self::empty();
        instructions
    }

    /// Reset to an empty packed body.
    pub fn reset_instructions(&mut self) {
        *self = Self::empty();
    }
}

const fn sign_extend_nibble(nibble: u16) -> i64 {
    (((nibble as i8) << 4) >> 4) as i64
}

fn make_ref(opcode: Opcode, idx: u16) -> DexRef {
    match opcode {
        Opcode::ConstString => DexRef::String(u32::from(idx)),
        Opcode::InvokeVirtual => DexRef::Method(u32::from(idx)),
        _ => unreachable!("opcode carries no reference"),
    }
}

fn ref_index(reference: DexRef) -> u16 {
    let (DexRef::String(idx) | DexRef::Type(idx) | DexRef::Field(idx) | DexRef::Method(idx)) =
        reference;
    u16::try_from(idx).expect("reference index exceeds 16-bit pool encoding")
}

/// Decode a unit stream into instructions, resolving branch offsets to
/// instruction indices. Panics on any malformed encoding.
fn decode_units(units: &[u16]) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut unit_of_insn = Vec::new();
    let mut insn_at_unit = HashMap::new();
    // branch instruction index -> code-unit offset, resolved after the scan
    let mut pending_branches = Vec::new();

    let mut pos = 0usize;
    while pos < units.len() {
        let word = units[pos];
        let byte = (word & 0xff) as u8;
        let opcode = Opcode::from_u8(byte)
            .unwrap_or_else(|| panic!("corrupt code: unknown opcode {byte:#04x} at unit {pos}"));
        let format = opcode.format();
        assert!(
            pos + format.units() <= units.len(),
            "corrupt code: truncated {} at unit {pos}",
            opcode.mnemonic()
        );
        let hi = word >> 8;
        let insn = match format {
            Format::F10x => {
                assert_eq!(hi, 0, "corrupt code: junk operand bits in {}", opcode.mnemonic());
                Instruction::plain(opcode)
            }
            Format::F12x => Instruction::unary(opcode, hi & 0xf, hi >> 4),
            Format::F11n => Instruction::const_lit(opcode, hi & 0xf, sign_extend_nibble(hi >> 4)),
            Format::F20t => {
                assert_eq!(hi, 0, "corrupt code: junk operand bits in {}", opcode.mnemonic());
                pending_branches.push((instructions.len(), units[pos + 1] as i16));
                Instruction::goto(0)
            }
            Format::F21s => Instruction::const_lit(opcode, hi, i64::from(units[pos + 1] as i16)),
            Format::F21c => {
                let reference = make_ref(opcode, units[pos + 1]);
                match reference {
                    DexRef::String(idx) => Instruction::const_string(hi, idx),
                    _ => unreachable!("unexpected F21c payload"),
                }
            }
            Format::F21t => {
                pending_branches.push((instructions.len(), units[pos + 1] as i16));
                Instruction::if_eqz(hi, 0)
            }
            Format::F22b => {
                let operands = units[pos + 1];
                Instruction::lit(
                    opcode,
                    hi,
                    operands & 0xff,
                    i64::from((operands >> 8) as u8 as i8),
                )
            }
            Format::F22s => Instruction::lit(
                opcode,
                hi & 0xf,
                hi >> 4,
                i64::from(units[pos + 1] as i16),
            ),
            Format::F23x => {
                let operands = units[pos + 1];
                Instruction::binary(opcode, hi, operands & 0xff, operands >> 8)
            }
            Format::F32x => {
                assert_eq!(hi, 0, "corrupt code: junk operand bits in {}", opcode.mnemonic());
                Instruction::unary(opcode, units[pos + 1], units[pos + 2])
            }
            Format::F35c => {
                let argc = usize::from(hi >> 4);
                assert!(
                    argc <= 4 && hi & 0xf == 0,
                    "corrupt code: bad invoke argument count at unit {pos}"
                );
                let regs = units[pos + 2];
                let args = (0..argc).map(|i| (regs >> (4 * i)) & 0xf).collect();
                match make_ref(opcode, units[pos + 1]) {
                    DexRef::Method(idx) => Instruction::invoke(idx, args),
                    _ => unreachable!("unexpected F35c payload"),
                }
            }
        };
        unit_of_insn.push(pos);
        insn_at_unit.insert(pos, instructions.len());
        instructions.push(insn);
        pos += format.units();
    }

    for (idx, offset) in pending_branches {
        let base = unit_of_insn[idx];
        let target_unit = base
            .checked_add_signed(isize::from(offset))
            .unwrap_or_else(|| panic!("corrupt code: branch offset {offset} out of range"));
        let target = *insn_at_unit
            .get(&target_unit)
            .unwrap_or_else(|| panic!("corrupt code: branch into the middle of an instruction"));
        instructions[idx].set_target(target);
    }
    instructions
}

/// Encode instructions back into code units, recomputing branch offsets.
/// Panics if an operand does not fit its format — rewrite rules are required
/// to check widths before substituting narrow encodings.
fn encode_instructions(instructions: &[Instruction]) -> Vec<u16> {
    let mut unit_of_insn = Vec::with_capacity(instructions.len());
    let mut pos = 0usize;
    for insn in instructions {
        unit_of_insn.push(pos);
        pos += insn.opcode().format().units();
    }

    let mut units = Vec::with_capacity(pos);
    for (idx, insn) in instructions.iter().enumerate() {
        let opcode = insn.opcode();
        let format = opcode.format();
        let op = u16::from(opcode as u8);
        check_widths(insn, format);
        match format {
            Format::F10x => units.push(op),
            Format::F12x => {
                units.push(op | (insn.dest().unwrap() << 8) | (insn.src(0) << 12));
            }
            Format::F11n => {
                let lit = (insn.literal().unwrap() as u16) & 0xf;
                units.push(op | (insn.dest().unwrap() << 8) | (lit << 12));
            }
            Format::F20t | Format::F21t => {
                if format == Format::F21t {
                    units.push(op | (insn.src(0) << 8));
                } else {
                    units.push(op);
                }
                let target = insn.target().unwrap();
                let offset = unit_of_insn[target] as i64 - unit_of_insn[idx] as i64;
                assert!(
                    literal_fits(offset, 16),
                    "branch offset {offset} exceeds 16-bit encoding"
                );
                units.push(offset as i16 as u16);
            }
            Format::F21s => {
                units.push(op | (insn.dest().unwrap() << 8));
                units.push(insn.literal().unwrap() as i16 as u16);
            }
            Format::F21c => {
                units.push(op | (insn.dest().unwrap() << 8));
                units.push(ref_index(insn.reference().unwrap()));
            }
            Format::F22b => {
                units.push(op | (insn.dest().unwrap() << 8));
                let lit = (insn.literal().unwrap() as u16) & 0xff;
                units.push(insn.src(0) | (lit << 8));
            }
            Format::F22s => {
                units.push(op | (insn.dest().unwrap() << 8) | (insn.src(0) << 12));
                units.push(insn.literal().unwrap() as i16 as u16);
            }
            Format::F23x => {
                units.push(op | (insn.dest().unwrap() << 8));
                units.push(insn.src(0) | (insn.src(1) << 8));
            }
            Format::F32x => {
                units.push(op);
                units.push(insn.dest().unwrap());
                units.push(insn.src(0));
            }
            Format::F35c => {
                let argc = insn.srcs_size() as u16;
                units.push(op | (argc << 12));
                units.push(ref_index(insn.reference().unwrap()));
                let mut regs = 0u16;
                for (i, &arg) in insn.srcs().iter().enumerate() {
                    regs |= arg << (4 * i);
                }
                units.push(regs);
            }
        }
    }
    units
}

fn check_widths(insn: &Instruction, format: Format) {
    if let (Some(dest), Some(bits)) = (insn.dest(), format.dest_bits()) {
        assert!(
            reg_fits(dest, bits),
            "{}: destination v{dest} exceeds {bits}-bit register encoding",
            insn.opcode().mnemonic()
        );
    }
    if let Some(bits) = format.src_bits() {
        for &src in insn.srcs() {
            assert!(
                reg_fits(src, bits),
                "{}: source v{src} exceeds {bits}-bit register encoding",
                insn.opcode().mnemonic()
            );
        }
    }
    if let (Some(lit), Some(bits)) = (insn.literal(), format.literal_bits()) {
        assert!(
            literal_fits(lit, bits),
            "{}: literal {lit} exceeds {bits}-bit encoding",
            insn.opcode().mnemonic()
        );
    }
}
