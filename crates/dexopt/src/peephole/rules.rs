use crate::dex::Opcode;

/// Symbolic binding slot. Register and literal slots live in separate
/// namespaces; a slot bound once must unify with every later occurrence in
/// the same pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(pub usize);

/// Number of binding slots available to a rule.
pub const MAX_SLOTS: usize = 4;

/// Literal operand pattern.
#[derive(Debug, Clone, Copy)]
pub enum LitPat {
    /// Match only this exact constant.
    Exactly(i64),
    /// Bind (or unify) the constant into a literal slot.
    Bind(Slot),
}

/// Shape template for one instruction position of a pattern.
#[derive(Debug, Clone)]
pub struct InsnPattern {
    /// Opcode class: any listed opcode matches.
    pub opcodes: Vec<Opcode>,
    pub dest: Option<Slot>,
    pub srcs: Vec<Slot>,
    pub literal: Option<LitPat>,
}

/// Side condition on bound values, checked after the shape unifies.
/// An unsatisfied constraint is not an error; the rule just does not apply.
#[derive(Debug, Clone, Copy)]
pub enum Constraint {
    /// The register bound to `slot` must fit a `bits`-wide register field.
    RegFits { slot: Slot, bits: u32 },
}

/// Literal operand of a replacement template.
#[derive(Debug, Clone, Copy)]
pub enum LitTemplate {
    FromSlot(Slot),
    Value(i64),
}

/// Replacement instruction built from the pattern's bindings.
#[derive(Debug, Clone)]
pub struct InsnTemplate {
    pub opcode: Opcode,
    pub dest: Option<Slot>,
    pub srcs: Vec<Slot>,
    pub literal: Option<LitTemplate>,
}

/// One rewrite rule: pattern, side constraints, replacement.
///
/// The rule author establishes that the replacement is observationally
/// equivalent to the pattern for every binding satisfying the constraints;
/// the engine does not verify equivalence.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub pattern: Vec<InsnPattern>,
    pub constraints: Vec<Constraint>,
    pub replacement: Vec<InsnTemplate>,
}

/// Ordered rule catalogue. Registration order is the tie-break order: when
/// several rules match at one position, the earliest registered wins.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalogue {
    rules: Vec<Rule>,
}

impl RuleCatalogue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalogue, fixed at build time.
    #[must_use]
    pub fn with_default_rules() -> Self {
        let mut catalogue = Self::new();
        // x = a + 0  =>  x = a
        catalogue.register(arith_identity(
            "add_lit8_zero_to_move",
            Opcode::AddIntLit8,
            0,
            move16(),
            vec![],
        ));
        catalogue.register(arith_identity(
            "add_lit16_zero_to_move",
            Opcode::AddIntLit16,
            0,
            move16(),
            vec![],
        ));
        // x = a * 1  =>  x = a
        catalogue.register(arith_identity(
            "mul_lit8_one_to_move",
            Opcode::MulIntLit8,
            1,
            move16(),
            vec![],
        ));
        catalogue.register(arith_identity(
            "mul_lit16_one_to_move",
            Opcode::MulIntLit16,
            1,
            move16(),
            vec![],
        ));
        // x = a * -1  =>  x = -a, when both registers fit neg-int's
        // 4-bit fields
        catalogue.register(arith_identity(
            "mul_lit8_neg1_to_neg",
            Opcode::MulIntLit8,
            -1,
            neg_int(),
            narrow_unary_constraints(),
        ));
        catalogue.register(arith_identity(
            "mul_lit16_neg1_to_neg",
            Opcode::MulIntLit16,
            -1,
            neg_int(),
            narrow_unary_constraints(),
        ));
        // x = a / -1  =>  x = -a, same width constraint
        catalogue.register(arith_identity(
            "div_lit8_neg1_to_neg",
            Opcode::DivIntLit8,
            -1,
            neg_int(),
            narrow_unary_constraints(),
        ));
        catalogue.register(arith_identity(
            "div_lit16_neg1_to_neg",
            Opcode::DivIntLit16,
            -1,
            neg_int(),
            narrow_unary_constraints(),
        ));
        // move/16 a, b ; move/16 a, b  =>  move/16 a, b
        catalogue.register(Rule {
            name: "dedup_identical_move",
            pattern: vec![move16_pattern(), move16_pattern()],
            constraints: vec![],
            replacement: vec![move16()],
        });
        catalogue
    }

    pub fn register(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

const DEST: Slot = Slot(0);
const SRC: Slot = Slot(1);

fn arith_identity(
    name: &'static str,
    opcode: Opcode,
    literal: i64,
    replacement: InsnTemplate,
    constraints: Vec<Constraint>,
) -> Rule {
    Rule {
        name,
        pattern: vec![InsnPattern {
            opcodes: vec![opcode],
            dest: Some(DEST),
            srcs: vec![SRC],
            literal: Some(LitPat::Exactly(literal)),
        }],
        constraints,
        replacement: vec![replacement],
    }
}

fn move16_pattern() -> InsnPattern {
    InsnPattern {
        opcodes: vec![Opcode::Move16],
        dest: Some(DEST),
        srcs: vec![SRC],
        literal: None,
    }
}

fn move16() -> InsnTemplate {
    InsnTemplate {
        opcode: Opcode::Move16,
        dest: Some(DEST),
        srcs: vec![SRC],
        literal: None,
    }
}

fn neg_int() -> InsnTemplate {
    InsnTemplate {
        opcode: Opcode::NegInt,
        dest: Some(DEST),
        srcs: vec![SRC],
        literal: None,
    }
}

fn narrow_unary_constraints() -> Vec<Constraint> {
    let bits = Opcode::NegInt
        .format()
        .dest_bits()
        .expect("neg-int has a destination");
    vec![
        Constraint::RegFits { slot: DEST, bits },
        Constraint::RegFits { slot: SRC, bits },
    ]
}
