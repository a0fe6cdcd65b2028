//! Greedy, leftmost, single-pass pattern matcher.
//!
//! At each position the rules are tried in registration order; the first
//! whose pattern unifies and whose constraints hold replaces the matched
//! span. The scan then resumes after the replacement, so rewritten
//! instructions are not re-matched within the same invocation.

use crate::dex::{Instruction, InstructionList, reg_fits};

use super::rules::{
    Constraint, InsnPattern, InsnTemplate, LitPat, LitTemplate, MAX_SLOTS, Rule, RuleCatalogue,
    Slot,
};

/// Register and literal bindings accumulated while unifying one pattern.
#[derive(Debug, Default, Clone)]
struct Bindings {
    regs: [Option<u16>; MAX_SLOTS],
    lits: [Option<i64>; MAX_SLOTS],
}

impl Bindings {
    /// Bind `reg` to the slot, or check consistency with an earlier binding.
    fn unify_reg(&mut self, slot: Slot, reg: u16) -> bool {
        match self.regs[slot.0] {
            None => {
                self.regs[slot.0] = Some(reg);
                true
            }
            Some(bound) => bound == reg,
        }
    }

    fn unify_lit(&mut self, slot: Slot, literal: i64) -> bool {
        match self.lits[slot.0] {
            None => {
                self.lits[slot.0] = Some(literal);
                true
            }
            Some(bound) => bound == literal,
        }
    }

    fn reg(&self, slot: Slot) -> u16 {
        self.regs[slot.0].expect("replacement uses an unbound register slot")
    }

    fn lit(&self, slot: Slot) -> i64 {
        self.lits[slot.0].expect("replacement uses an unbound literal slot")
    }
}

/// Per-invocation rewrite statistics: fire count per catalogue rule, in
/// registration order, plus the net instruction count reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteStats {
    pub fired: Vec<u64>,
    pub instructions_removed: u64,
    pub methods_rewritten: u64,
}

impl RewriteStats {
    #[must_use]
    pub fn new(rule_count: usize) -> Self {
        Self {
            fired: vec![0; rule_count],
            instructions_removed: 0,
            methods_rewritten: 0,
        }
    }

    #[must_use]
    pub fn total_fired(&self) -> u64 {
        self.fired.iter().sum()
    }

    /// Merge partial counts from another worker.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        assert_eq!(self.fired.len(), other.fired.len(), "mismatched catalogues");
        for (mine, theirs) in self.fired.iter_mut().zip(other.fired) {
            *mine += theirs;
        }
        self.instructions_removed += other.instructions_removed;
        self.methods_rewritten += other.methods_rewritten;
        self
    }
}

fn unify_insn(pattern: &InsnPattern, insn: &Instruction, bindings: &mut Bindings) -> bool {
    if !pattern.opcodes.contains(&insn.opcode()) {
        return false;
    }
    match (pattern.dest, insn.dest()) {
        (Some(slot), Some(reg)) => {
            if !bindings.unify_reg(slot, reg) {
                return false;
            }
        }
        (None, None) => {}
        _ => return false,
    }
    if pattern.srcs.len() != insn.srcs_size() {
        return false;
    }
    for (&slot, &reg) in pattern.srcs.iter().zip(insn.srcs()) {
        if !bindings.unify_reg(slot, reg) {
            return false;
        }
    }
    match (pattern.literal, insn.literal()) {
        (Some(LitPat::Exactly(expected)), Some(literal)) => literal == expected,
        (Some(LitPat::Bind(slot)), Some(literal)) => bindings.unify_lit(slot, literal),
        (None, None) => true,
        _ => false,
    }
}

fn constraints_hold(constraints: &[Constraint], bindings: &Bindings) -> bool {
    constraints.iter().all(|constraint| match *constraint {
        Constraint::RegFits { slot, bits } => reg_fits(bindings.reg(slot), bits),
    })
}

/// Unify `rule` against the instructions starting at `at`. Returns the
/// bindings on success.
fn match_at(rule: &Rule, list: &InstructionList, at: usize) -> Option<Bindings> {
    if at + rule.pattern.len() > list.len() {
        return None;
    }
    let mut bindings = Bindings::default();
    for (offset, pattern) in rule.pattern.iter().enumerate() {
        if !unify_insn(pattern, list.insn(at + offset), &mut bindings) {
            return None;
        }
    }
    constraints_hold(&rule.constraints, &bindings).then_some(bindings)
}

fn instantiate_one(template: &InsnTemplate, bindings: &Bindings) -> Instruction {
    let dest = template.dest.map(|slot| bindings.reg(slot));
    let literal = template.literal.map(|lit| match lit {
        LitTemplate::FromSlot(slot) => bindings.lit(slot),
        LitTemplate::Value(value) => value,
    });
    match (dest, template.srcs.as_slice(), literal) {
        (Some(d), &[src], None) => {
            Instruction::unary(template.opcode, d, bindings.reg(src))
        }
        (Some(d), &[src], Some(lit)) => {
            Instruction::lit(template.opcode, d, bindings.reg(src), lit)
        }
        (Some(d), &[s1, s2], None) => {
            Instruction::binary(template.opcode, d, bindings.reg(s1), bindings.reg(s2))
        }
        (Some(d), &[], Some(lit)) => Instruction::const_lit(template.opcode, d, lit),
        (None, &[], None) => Instruction::plain(template.opcode),
        _ => panic!("unsupported replacement template shape for {}", template.opcode.mnemonic()),
    }
}

fn instantiate(rule: &Rule, bindings: &Bindings) -> Vec<Instruction> {
    rule.replacement
        .iter()
        .map(|template| instantiate_one(template, bindings))
        .collect()
}

/// Run the catalogue over one materialized method body.
pub fn run(list: &mut InstructionList, catalogue: &RuleCatalogue) -> RewriteStats {
    let mut stats = RewriteStats::new(catalogue.len());
    let mut at = 0;
    while at < list.len() {
        let matched = catalogue
            .rules()
            .iter()
            .enumerate()
            .find_map(|(index, rule)| match_at(rule, list, at).map(|b| (index, rule, b)));
        let Some((index, rule, bindings)) = matched else {
            at += 1;
            continue;
        };
        let replacement = instantiate(rule, &bindings);
        let span = rule.pattern.len();
        assert!(
            replacement.len() <= span,
            "rule {} grows the instruction stream",
            rule.name
        );
        stats.fired[index] += 1;
        stats.instructions_removed += (span - replacement.len()) as u64;
        let advance = replacement.len();
        list.replace_span(at, span, replacement);
        // Advance past the replacement: rewritten output is not re-matched
        // in this invocation. An empty replacement leaves `at` in place; the
        // list shrank, so the scan still terminates.
        at += advance;
    }
    if stats.total_fired() > 0 {
        stats.methods_rewritten = 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use crate::dex::Opcode;
    use crate::peephole::rules::InsnPattern;

    use super::*;

    fn lit_rule(
        name: &'static str,
        opcode: Opcode,
        literal: i64,
        replacement_opcode: Opcode,
    ) -> Rule {
        Rule {
            name,
            pattern: vec![InsnPattern {
                opcodes: vec![opcode],
                dest: Some(Slot(0)),
                srcs: vec![Slot(1)],
                literal: Some(LitPat::Exactly(literal)),
            }],
            constraints: vec![],
            replacement: vec![InsnTemplate {
                opcode: replacement_opcode,
                dest: Some(Slot(0)),
                srcs: vec![Slot(1)],
                literal: None,
            }],
        }
    }

    #[test]
    fn rewrites_single_match() {
        let mut list = InstructionList::from_instructions(vec![
            Instruction::const_lit(Opcode::Const16, 0, 42),
            Instruction::lit(Opcode::AddIntLit8, 1, 0, 0),
        ]);
        let catalogue = RuleCatalogue::with_default_rules();
        let stats = run(&mut list, &catalogue);
        assert_eq!(stats.total_fired(), 1);
        assert_eq!(
            list.to_instructions(),
            vec![
                Instruction::const_lit(Opcode::Const16, 0, 42),
                Instruction::unary(Opcode::Move16, 1, 0),
            ]
        );
    }

    #[test]
    fn no_match_is_a_noop() {
        let body = vec![
            Instruction::const_lit(Opcode::Const16, 0, 42),
            Instruction::lit(Opcode::AddIntLit8, 1, 0, 15),
            Instruction::plain(Opcode::ReturnVoid),
        ];
        let mut list = InstructionList::from_instructions(body.clone());
        let stats = run(&mut list, &RuleCatalogue::with_default_rules());
        assert_eq!(stats.total_fired(), 0);
        assert_eq!(stats.methods_rewritten, 0);
        assert_eq!(list.to_instructions(), body);
    }

    #[test]
    fn earlier_registered_rule_wins() {
        // Two rules match the same mul-by-one; the first registered must fire.
        let mut catalogue = RuleCatalogue::new();
        catalogue.register(lit_rule("first", Opcode::MulIntLit8, 1, Opcode::Move16));
        catalogue.register(lit_rule("second", Opcode::MulIntLit8, 1, Opcode::NegInt));
        let mut list = InstructionList::from_instructions(vec![Instruction::lit(
            Opcode::MulIntLit8,
            1,
            0,
            1,
        )]);
        let stats = run(&mut list, &catalogue);
        assert_eq!(stats.fired, vec![1, 0]);
        assert_eq!(
            list.to_instructions(),
            vec![Instruction::unary(Opcode::Move16, 1, 0)]
        );
    }

    #[test]
    fn width_constraint_blocks_narrow_replacement() {
        let body = vec![Instruction::lit(Opcode::MulIntLit8, 17, 0, -1)];
        let mut list = InstructionList::from_instructions(body.clone());
        let stats = run(&mut list, &RuleCatalogue::with_default_rules());
        assert_eq!(stats.total_fired(), 0);
        assert_eq!(list.to_instructions(), body);
    }

    #[test]
    fn rewritten_output_is_not_rematched() {
        // mul v1, v0, 1 becomes move/16 v1, v0; together with the following
        // identical move it would form the dedup pattern, but a single pass
        // must not re-match its own output.
        let mut list = InstructionList::from_instructions(vec![
            Instruction::lit(Opcode::MulIntLit8, 1, 0, 1),
            Instruction::unary(Opcode::Move16, 1, 0),
        ]);
        let catalogue = RuleCatalogue::with_default_rules();
        let stats = run(&mut list, &catalogue);
        assert_eq!(stats.total_fired(), 1);
        assert_eq!(
            list.to_instructions(),
            vec![
                Instruction::unary(Opcode::Move16, 1, 0),
                Instruction::unary(Opcode::Move16, 1, 0),
            ]
        );
    }

    #[test]
    fn multi_instruction_pattern_unifies_across_positions() {
        let mut list = InstructionList::from_instructions(vec![
            Instruction::unary(Opcode::Move16, 1, 0),
            Instruction::unary(Opcode::Move16, 1, 0),
            // different source register, must survive
            Instruction::unary(Opcode::Move16, 1, 2),
        ]);
        let stats = run(&mut list, &RuleCatalogue::with_default_rules());
        assert_eq!(stats.instructions_removed, 1);
        assert_eq!(
            list.to_instructions(),
            vec![
                Instruction::unary(Opcode::Move16, 1, 0),
                Instruction::unary(Opcode::Move16, 1, 2),
            ]
        );
    }

    #[test]
    fn determinism() {
        let body = vec![
            Instruction::const_lit(Opcode::Const16, 0, 42),
            Instruction::lit(Opcode::MulIntLit16, 1, 0, -1),
            Instruction::lit(Opcode::AddIntLit16, 2, 1, 0),
            Instruction::plain(Opcode::ReturnVoid),
        ];
        let catalogue = RuleCatalogue::with_default_rules();
        let mut first = InstructionList::from_instructions(body.clone());
        let mut second = InstructionList::from_instructions(body);
        let stats_first = run(&mut first, &catalogue);
        let stats_second = run(&mut second, &catalogue);
        assert_eq!(first, second);
        assert_eq!(stats_first, stats_second);
    }
}
