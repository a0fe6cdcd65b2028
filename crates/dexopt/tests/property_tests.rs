//! Property-based tests for the code representation and the peephole pass.
//!
//! Uses `proptest` to generate well-formed method bodies and verify:
//! - the packed/materialized round-trip law (`sync . balloon` is identity)
//! - re-encoding stability (`sync` output is reproducible)
//! - determinism of the peephole pass
//! - that the pass never corrupts a body (output always decodes)

use dexopt::dex::{DexClass, DexCode, DexMethod, DexProgram, Instruction, Opcode};
use dexopt::{JsonConfig, PeepholePass};
use dexopt::pass::Pass;
use proptest::prelude::*;

fn insn_strategy() -> impl Strategy<Value = Instruction> {
    let nib = 0u16..16;
    let byte = 0u16..256;
    let lit8 = -128i64..128;
    let lit16 = -32768i64..32768;

    prop_oneof![
        Just(Instruction::plain(Opcode::Nop)),
        Just(Instruction::plain(Opcode::ReturnVoid)),
        (nib.clone(), nib.clone()).prop_map(|(d, s)| Instruction::unary(Opcode::Move, d, s)),
        (any::<u16>(), any::<u16>()).prop_map(|(d, s)| Instruction::unary(Opcode::Move16, d, s)),
        (nib.clone(), nib.clone()).prop_map(|(d, s)| Instruction::unary(Opcode::NegInt, d, s)),
        (nib.clone(), -8i64..8).prop_map(|(d, l)| Instruction::const_lit(Opcode::Const4, d, l)),
        (byte.clone(), lit16.clone())
            .prop_map(|(d, l)| Instruction::const_lit(Opcode::Const16, d, l)),
        (byte.clone(), any::<u16>())
            .prop_map(|(d, s)| Instruction::const_string(d, u32::from(s))),
        (byte.clone(), byte.clone(), byte.clone())
            .prop_map(|(d, s1, s2)| Instruction::binary(Opcode::AddInt, d, s1, s2)),
        (0u8..4, byte.clone(), byte.clone(), lit8).prop_map(|(kind, d, s, l)| {
            let opcode = match kind {
                0 => Opcode::AddIntLit8,
                1 => Opcode::MulIntLit8,
                2 => Opcode::DivIntLit8,
                _ => Opcode::RemIntLit8,
            };
            Instruction::lit(opcode, d, s, l)
        }),
        (0u8..4, nib.clone(), nib.clone(), lit16).prop_map(|(kind, d, s, l)| {
            let opcode = match kind {
                0 => Opcode::AddIntLit16,
                1 => Opcode::MulIntLit16,
                2 => Opcode::DivIntLit16,
                _ => Opcode::RemIntLit16,
            };
            Instruction::lit(opcode, d, s, l)
        }),
        (any::<u16>(), prop::collection::vec(nib, 0..=4))
            .prop_map(|(m, args)| Instruction::invoke(u32::from(m), args)),
    ]
}

/// A straight-line body plus a conditional and an unconditional branch at the
/// end, each targeting some instruction of the straight-line prefix.
fn body_with_branches() -> impl Strategy<Value = Vec<Instruction>> {
    prop::collection::vec(insn_strategy(), 1..16).prop_flat_map(|body| {
        let len = body.len();
        (Just(body), 0..len, 0..len, 0u16..256).prop_map(|(mut body, t1, t2, reg)| {
            body.push(Instruction::if_eqz(reg, t1));
            body.push(Instruction::goto(t2));
            body
        })
    })
}

fn materialize(body: &[Instruction]) -> DexCode {
    let mut code = DexCode::empty();
    code.balloon();
    for insn in body {
        code.list_mut().push(insn.clone());
    }
    code
}

fn single_method_program(body: &[Instruction]) -> DexProgram {
    let mut code = materialize(body);
    code.sync();
    let mut class = DexClass::new("Lprop/Test;");
    class.add_method(DexMethod::new("m", Some(code)));
    let mut program = DexProgram::new();
    program.add_class(class);
    program
}

proptest! {
    #[test]
    fn packed_roundtrip(body in prop::collection::vec(insn_strategy(), 0..32)) {
        let mut code = materialize(&body);
        code.sync();
        let units = code.units().to_vec();

        code.balloon();
        prop_assert_eq!(code.list().to_instructions(), body);

        // sync is stable when nothing changed
        code.sync();
        prop_assert_eq!(code.units(), &units[..]);
    }

    #[test]
    fn branch_targets_roundtrip(body in body_with_branches()) {
        let mut code = materialize(&body);
        code.sync();
        code.balloon();
        prop_assert_eq!(code.list().to_instructions(), body);
    }

    #[test]
    fn peephole_is_deterministic(body in prop::collection::vec(insn_strategy(), 0..32)) {
        let pass = PeepholePass::new();
        let mut first = single_method_program(&body);
        let mut second = single_method_program(&body);
        let stats_first = pass.run(&mut first, &JsonConfig::default());
        let stats_second = pass.run(&mut second, &JsonConfig::default());
        prop_assert_eq!(stats_first, stats_second);
        prop_assert_eq!(
            first.classes[0].methods[0].code.as_ref().unwrap().units(),
            second.classes[0].methods[0].code.as_ref().unwrap().units()
        );
    }

    #[test]
    fn peephole_output_always_decodes(body in body_with_branches()) {
        let mut program = single_method_program(&body);
        PeepholePass::new().run(&mut program, &JsonConfig::default());
        let code = program.classes[0].methods[0].code.as_mut().unwrap();
        // balloon panics on corrupt code, so this is the assertion
        code.balloon();
        prop_assert!(code.list().len() <= body.len());
    }

    #[test]
    fn untouched_bodies_are_byte_identical(
        // const-string never matches any rule, so these bodies must come
        // back byte for byte
        body in prop::collection::vec(
            (0u16..256, any::<u16>())
                .prop_map(|(d, s)| Instruction::const_string(d, u32::from(s))),
            0..16,
        )
    ) {
        let mut program = single_method_program(&body);
        let before = program.classes[0].methods[0].code.as_ref().unwrap().units().to_vec();
        let stats = PeepholePass::new().run(&mut program, &JsonConfig::default());
        prop_assert!(stats.is_empty());
        let after = program.classes[0].methods[0].code.as_ref().unwrap();
        prop_assert_eq!(after.units(), &before[..]);
    }
}
