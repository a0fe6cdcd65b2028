use rayon::prelude::*;

use crate::config::JsonConfig;
use crate::dex::{DexCode, DexProgram};
use crate::pass::{Pass, PassStats};

use super::matcher::{self, RewriteStats};
use super::rules::RuleCatalogue;

/// The peephole optimization pass.
///
/// For every method with a code body: balloon, run the rule catalogue once
/// over the materialized stream, sync. Methods are independent, so they are
/// processed on a worker pool; each worker accumulates partial rewrite
/// counts which are merged into the pass report at the end. The catalogue is
/// fixed at construction and read-only during the run; the pass takes no
/// configuration.
pub struct PeepholePass {
    catalogue: RuleCatalogue,
}

impl PeepholePass {
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalogue(RuleCatalogue::with_default_rules())
    }

    #[must_use]
    pub fn with_catalogue(catalogue: RuleCatalogue) -> Self {
        Self { catalogue }
    }

    fn optimize_method(&self, code: &mut DexCode) -> RewriteStats {
        code.balloon();
        let stats = matcher::run(code.list_mut(), &self.catalogue);
        code.sync();
        stats
    }
}

impl Default for PeepholePass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for PeepholePass {
    fn name(&self) -> &'static str {
        "PeepholePass"
    }

    fn run(&self, program: &mut DexProgram, _config: &JsonConfig) -> PassStats {
        let merged = program
            .classes
            .par_iter_mut()
            .flat_map(|class| class.methods.par_iter_mut())
            .filter_map(|method| method.code.as_mut())
            .map(|code| self.optimize_method(code))
            .reduce(|| RewriteStats::new(self.catalogue.len()), RewriteStats::merge);

        tracing::debug!(
            rules_fired = merged.total_fired(),
            instructions_removed = merged.instructions_removed,
            methods_rewritten = merged.methods_rewritten,
            "peephole finished"
        );

        let mut stats = PassStats::new();
        for (rule, &count) in self.catalogue.rules().iter().zip(&merged.fired) {
            stats.incr(rule.name, count);
        }
        stats.incr("instructions_removed", merged.instructions_removed);
        stats.incr("methods_rewritten", merged.methods_rewritten);
        stats
    }
}

#[cfg(test)]
mod tests {
    use crate::dex::{DexClass, DexMethod, Instruction, Opcode};

    use super::*;

    fn method_with(body: &[Instruction]) -> DexMethod {
        let mut code = DexCode::empty();
        code.balloon();
        for insn in body {
            code.list_mut().push(insn.clone());
        }
        code.sync();
        DexMethod::new("m", Some(code))
    }

    #[test]
    fn rewrites_across_classes_and_reports_counts() {
        let mut program = DexProgram::new();
        for name in ["La;", "Lb;"] {
            let mut class = DexClass::new(name);
            class.add_method(method_with(&[
                Instruction::const_lit(Opcode::Const16, 0, 42),
                Instruction::lit(Opcode::AddIntLit8, 1, 0, 0),
            ]));
            class.add_method(DexMethod::abstract_method("no_code"));
            program.add_class(class);
        }

        let pass = PeepholePass::new();
        let stats = pass.run(&mut program, &JsonConfig::default());
        assert_eq!(stats.get("add_lit8_zero_to_move"), 2);
        assert_eq!(stats.get("methods_rewritten"), 2);

        for class in &program.classes {
            let code = class.methods[0].code.as_ref().unwrap();
            assert!(code.is_packed());
        }
    }

    #[test]
    fn untouched_method_roundtrips_exactly() {
        let body = vec![
            Instruction::const_lit(Opcode::Const16, 0, 42),
            Instruction::lit(Opcode::AddIntLit8, 1, 0, 15),
            Instruction::plain(Opcode::ReturnVoid),
        ];
        let mut class = DexClass::new("Lc;");
        class.add_method(method_with(&body));
        let before = class.methods[0].code.as_ref().unwrap().units().to_vec();
        let mut program = DexProgram::new();
        program.add_class(class);

        let stats = PeepholePass::new().run(&mut program, &JsonConfig::default());
        assert!(stats.is_empty());
        let after = program.classes[0].methods[0].code.as_ref().unwrap();
        assert_eq!(after.units(), &before[..]);
    }
}
