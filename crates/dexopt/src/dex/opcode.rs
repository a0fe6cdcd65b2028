/// Instruction encoding format.
///
/// Each format fixes the number of 16-bit code units an instruction occupies
/// and the bit widths available for its register and literal operands. The
/// names follow the DEX convention: digit = unit count, then one character
/// per operand kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `op` — no operands.
    F10x,
    /// `op vA, vB` — two 4-bit registers in one unit.
    F12x,
    /// `op vA, #+B` — 4-bit register, 4-bit signed literal.
    F11n,
    /// `op +AAAA` — 16-bit signed branch offset.
    F20t,
    /// `op vAA, #+BBBB` — 8-bit register, 16-bit signed literal.
    F21s,
    /// `op vAA, ref@BBBB` — 8-bit register, 16-bit reference index.
    F21c,
    /// `op vAA, +BBBB` — 8-bit register, 16-bit signed branch offset.
    F21t,
    /// `op vAA, vBB, #+CC` — two 8-bit registers, 8-bit signed literal.
    F22b,
    /// `op vA, vB, #+CCCC` — two 4-bit registers, 16-bit signed literal.
    F22s,
    /// `op vAA, vBB, vCC` — three 8-bit registers.
    F23x,
    /// `op vAAAA, vBBBB` — two 16-bit registers.
    F32x,
    /// `op {vC..vF}, ref@BBBB` — up to four 4-bit argument registers.
    F35c,
}

impl Format {
    /// Number of 16-bit code units occupied by instructions of this format.
    #[must_use]
    pub const fn units(self) -> usize {
        match self {
            Self::F10x | Self::F12x | Self::F11n => 1,
            Self::F20t | Self::F21s | Self::F21c | Self::F21t | Self::F22b | Self::F22s
            | Self::F23x => 2,
            Self::F32x | Self::F35c => 3,
        }
    }

    /// Bit width of the destination register field, if the format has one.
    #[must_use]
    pub const fn dest_bits(self) -> Option<u32> {
        match self {
            Self::F12x | Self::F11n | Self::F22s => Some(4),
            Self::F21s | Self::F21c | Self::F22b | Self::F23x => Some(8),
            Self::F32x => Some(16),
            Self::F10x | Self::F20t | Self::F21t | Self::F35c => None,
        }
    }

    /// Bit width of the source register fields, if the format has any.
    #[must_use]
    pub const fn src_bits(self) -> Option<u32> {
        match self {
            Self::F12x | Self::F22s | Self::F35c => Some(4),
            Self::F21t | Self::F22b | Self::F23x => Some(8),
            Self::F32x => Some(16),
            Self::F10x | Self::F11n | Self::F20t | Self::F21s | Self::F21c => None,
        }
    }

    /// Bit width of the embedded literal, if the format carries one.
    #[must_use]
    pub const fn literal_bits(self) -> Option<u32> {
        match self {
            Self::F11n => Some(4),
            Self::F22b => Some(8),
            Self::F21s | Self::F22s => Some(16),
            _ => None,
        }
    }

    /// Number of source registers the format encodes. `F35c` is variable
    /// (0..=4) and reports its maximum.
    #[must_use]
    pub const fn src_count(self) -> usize {
        match self {
            Self::F10x | Self::F11n | Self::F20t | Self::F21s | Self::F21c => 0,
            Self::F12x | Self::F21t | Self::F22b | Self::F22s | Self::F32x => 1,
            Self::F23x => 2,
            Self::F35c => 4,
        }
    }
}

/// DEX opcodes understood by the optimizer. Discriminants are the DEX
/// opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    Move = 0x01,
    Move16 = 0x03,
    ReturnVoid = 0x0e,
    Const4 = 0x12,
    Const16 = 0x13,
    ConstString = 0x1a,
    Goto16 = 0x29,
    IfEqz = 0x38,
    InvokeVirtual = 0x6e,
    NegInt = 0x7b,
    AddInt = 0x90,
    AddIntLit16 = 0xd0,
    MulIntLit16 = 0xd2,
    DivIntLit16 = 0xd3,
    RemIntLit16 = 0xd4,
    AddIntLit8 = 0xd8,
    MulIntLit8 = 0xda,
    DivIntLit8 = 0xdb,
    RemIntLit8 = 0xdc,
}

impl Opcode {
    /// Decode an opcode byte. `None` for bytes outside the supported set,
    /// which the caller treats as corrupt input.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Nop,
            0x01 => Self::Move,
            0x03 => Self::Move16,
            0x0e => Self::ReturnVoid,
            0x12 => Self::Const4,
            0x13 => Self::Const16,
            0x1a => Self::ConstString,
            0x29 => Self::Goto16,
            0x38 => Self::IfEqz,
            0x6e => Self::InvokeVirtual,
            0x7b => Self::NegInt,
            0x90 => Self::AddInt,
            0xd0 => Self::AddIntLit16,
            0xd2 => Self::MulIntLit16,
            0xd3 => Self::DivIntLit16,
            0xd4 => Self::RemIntLit16,
            0xd8 => Self::AddIntLit8,
            0xda => Self::MulIntLit8,
            0xdb => Self::DivIntLit8,
            0xdc => Self::RemIntLit8,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn format(self) -> Format {
        match self {
            Self::Nop | Self::ReturnVoid => Format::F10x,
            Self::Move | Self::NegInt => Format::F12x,
            Self::Move16 => Format::F32x,
            Self::Const4 => Format::F11n,
            Self::Const16 => Format::F21s,
            Self::ConstString => Format::F21c,
            Self::Goto16 => Format::F20t,
            Self::IfEqz => Format::F21t,
            Self::InvokeVirtual => Format::F35c,
            Self::AddInt => Format::F23x,
            Self::AddIntLit16 | Self::MulIntLit16 | Self::DivIntLit16 | Self::RemIntLit16 => {
                Format::F22s
            }
            Self::AddIntLit8 | Self::MulIntLit8 | Self::DivIntLit8 | Self::RemIntLit8 => {
                Format::F22b
            }
        }
    }

    /// True for opcodes whose encoding embeds an immediate constant.
    #[must_use]
    pub const fn has_literal(self) -> bool {
        self.format().literal_bits().is_some()
    }

    /// True for opcodes carrying a branch offset.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self.format(), Format::F20t | Format::F21t)
    }

    /// True for opcodes carrying a constant-pool reference.
    #[must_use]
    pub const fn has_reference(self) -> bool {
        matches!(self.format(), Format::F21c | Format::F35c)
    }

    /// True for opcodes that define a value in a destination register.
    #[must_use]
    pub const fn has_dest(self) -> bool {
        self.format().dest_bits().is_some()
    }

    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Move => "move",
            Self::Move16 => "move/16",
            Self::ReturnVoid => "return-void",
            Self::Const4 => "const/4",
            Self::Const16 => "const/16",
            Self::ConstString => "const-string",
            Self::Goto16 => "goto/16",
            Self::IfEqz => "if-eqz",
            Self::InvokeVirtual => "invoke-virtual",
            Self::NegInt => "neg-int",
            Self::AddInt => "add-int",
            Self::AddIntLit16 => "add-int/lit16",
            Self::MulIntLit16 => "mul-int/lit16",
            Self::DivIntLit16 => "div-int/lit16",
            Self::RemIntLit16 => "rem-int/lit16",
            Self::AddIntLit8 => "add-int/lit8",
            Self::MulIntLit8 => "mul-int/lit8",
            Self::DivIntLit8 => "div-int/lit8",
            Self::RemIntLit8 => "rem-int/lit8",
        }
    }
}
