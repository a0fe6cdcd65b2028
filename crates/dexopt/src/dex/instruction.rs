use std::fmt;

use super::opcode::{Format, Opcode};

/// Constant-pool reference carried by reference-payload opcodes.
///
/// A closed tagged variant instead of an instruction subclass hierarchy;
/// the index points into the session [`DexContext`](super::program::DexContext)
/// pool of the matching kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DexRef {
    String(u32),
    Type(u32),
    Field(u32),
    Method(u32),
}

/// One decoded bytecode instruction.
///
/// Equality is full structural equality: opcode, registers, literal,
/// reference payload and branch target all participate. Clones are deep and
/// share no mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    dest: Option<u16>,
    srcs: Vec<u16>,
    literal: Option<i64>,
    reference: Option<DexRef>,
    /// Branch target as an instruction index into the materialized stream.
    /// Only meaningful between `balloon` and `sync`; the packed form stores
    /// a code-unit offset instead.
    target: Option<usize>,
}

/// True if `reg` is representable in a `bits`-wide register field.
#[must_use]
pub fn reg_fits(reg: u16, bits: u32) -> bool {
    u32::from(reg) < (1u32 << bits)
}

/// True if `literal` is representable as a `bits`-wide signed immediate.
#[must_use]
pub fn literal_fits(literal: i64, bits: u32) -> bool {
    let half = 1i64 << (bits - 1);
    (-half..half).contains(&literal)
}

impl Instruction {
    fn new(
        opcode: Opcode,
        dest: Option<u16>,
        srcs: Vec<u16>,
        literal: Option<i64>,
        reference: Option<DexRef>,
        target: Option<usize>,
    ) -> Self {
        let format = opcode.format();
        assert_eq!(
            dest.is_some(),
            format.dest_bits().is_some(),
            "{}: destination operand mismatch",
            opcode.mnemonic()
        );
        if format == Format::F35c {
            assert!(srcs.len() <= format.src_count(), "invoke argument overflow");
        } else {
            assert_eq!(
                srcs.len(),
                format.src_count(),
                "{}: source operand arity mismatch",
                opcode.mnemonic()
            );
        }
        assert_eq!(
            literal.is_some(),
            format.literal_bits().is_some(),
            "{}: literal operand mismatch",
            opcode.mnemonic()
        );
        assert_eq!(
            reference.is_some(),
            opcode.has_reference(),
            "{}: reference payload mismatch",
            opcode.mnemonic()
        );
        assert_eq!(
            target.is_some(),
            opcode.is_branch(),
            "{}: branch target mismatch",
            opcode.mnemonic()
        );
        Self {
            opcode,
            dest,
            srcs,
            literal,
            reference,
            target,
        }
    }

    /// Operand-less instruction (`nop`, `return-void`).
    #[must_use]
    pub fn plain(opcode: Opcode) -> Self {
        Self::new(opcode, None, Vec::new(), None, None, None)
    }

    /// One-source instruction with a destination (`move`, `move/16`, `neg-int`).
    #[must_use]
    pub fn unary(opcode: Opcode, dest: u16, src: u16) -> Self {
        Self::new(opcode, Some(dest), vec![src], None, None, None)
    }

    /// Three-register instruction (`add-int`).
    #[must_use]
    pub fn binary(opcode: Opcode, dest: u16, src1: u16, src2: u16) -> Self {
        Self::new(opcode, Some(dest), vec![src1, src2], None, None, None)
    }

    /// Register/literal arithmetic (`add-int/lit8`, `mul-int/lit16`, ...).
    #[must_use]
    pub fn lit(opcode: Opcode, dest: u16, src: u16, literal: i64) -> Self {
        Self::new(opcode, Some(dest), vec![src], Some(literal), None, None)
    }

    /// Constant load (`const/4`, `const/16`).
    #[must_use]
    pub fn const_lit(opcode: Opcode, dest: u16, literal: i64) -> Self {
        Self::new(opcode, Some(dest), Vec::new(), Some(literal), None, None)
    }

    /// String-pool load (`const-string`).
    #[must_use]
    pub fn const_string(dest: u16, string_idx: u32) -> Self {
        Self::new(
            Opcode::ConstString,
            Some(dest),
            Vec::new(),
            None,
            Some(DexRef::String(string_idx)),
            None,
        )
    }

    /// Virtual call (`invoke-virtual`) with up to four argument registers.
    #[must_use]
    pub fn invoke(method_idx: u32, args: Vec<u16>) -> Self {
        Self::new(
            Opcode::InvokeVirtual,
            None,
            args,
            None,
            Some(DexRef::Method(method_idx)),
            None,
        )
    }

    /// Unconditional branch to the instruction at `target`.
    #[must_use]
    pub fn goto(target: usize) -> Self {
        Self::new(Opcode::Goto16, None, Vec::new(), None, None, Some(target))
    }

    /// Branch to `target` if the register is zero.
    #[must_use]
    pub fn if_eqz(src: u16, target: usize) -> Self {
        Self::new(Opcode::IfEqz, None, vec![src], None, None, Some(target))
    }

    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    #[must_use]
    pub const fn dest(&self) -> Option<u16> {
        self.dest
    }

    #[must_use]
    pub fn src(&self, i: usize) -> u16 {
        self.srcs[i]
    }

    #[must_use]
    pub fn srcs(&self) -> &[u16] {
        &self.srcs
    }

    #[must_use]
    pub fn srcs_size(&self) -> usize {
        self.srcs.len()
    }

    #[must_use]
    pub const fn has_literal(&self) -> bool {
        self.literal.is_some()
    }

    #[must_use]
    pub const fn literal(&self) -> Option<i64> {
        self.literal
    }

    #[must_use]
    pub const fn reference(&self) -> Option<DexRef> {
        self.reference
    }

    #[must_use]
    pub const fn target(&self) -> Option<usize> {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: usize) {
        assert!(self.opcode.is_branch(), "target on a non-branch instruction");
        self.target = Some(target);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        let mut sep = " ";
        if let Some(dest) = self.dest {
            write!(f, "{sep}v{dest}")?;
            sep = ", ";
        }
        for &src in &self.srcs {
            write!(f, "{sep}v{src}")?;
            sep = ", ";
        }
        if let Some(lit) = self.literal {
            write!(f, "{sep}#{lit}")?;
        }
        if let Some(reference) = self.reference {
            let (kind, idx) = match reference {
                DexRef::String(idx) => ("string", idx),
                DexRef::Type(idx) => ("type", idx),
                DexRef::Field(idx) => ("field", idx),
                DexRef::Method(idx) => ("method", idx),
            };
            write!(f, "{sep}{kind}@{idx}")?;
        }
        if let Some(target) = self.target {
            write!(f, "{sep}->{target}")?;
        }
        Ok(())
    }
}
