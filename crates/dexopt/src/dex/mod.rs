// Code-unit packing uses explicit 'as' casts for nibble and byte fields.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

mod code;
mod instruction;
mod opcode;
mod program;

pub use code::{DexCode, InstructionList, MethodItem, PackedCode};
pub use instruction::{DexRef, Instruction, literal_fits, reg_fits};
pub use opcode::{Format, Opcode};
pub use program::{DexClass, DexContext, DexMethod, DexProgram, FieldRef, MethodRef};
