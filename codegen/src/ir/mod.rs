//! The typed SSA intermediate representation.
//!
//! Split the way `cranelift_codegen::ir` is split — entities, instruction
//! shapes, immediates, block/instruction ordering, and the top-level
//! container are separate modules that `Function` ties together — but sized
//! to this project's much smaller, fixed instruction set rather than a
//! meta-DSL-generated one.

pub mod builder;
pub mod entities;
pub mod function;
pub mod immediates;
pub mod instructions;
pub mod layout;
pub mod parse;
pub mod serialize;
pub mod types;

pub use builder::FuncCursor;
pub use entities::{Block, Frame, Inst, Var};
pub use function::{Arg, CodeBlock, Function, FrameSlot, Variable};
pub use immediates::Const;
pub use instructions::{BinaryOp, Insn, MemBase, MemRef, Operand, PhiEdge, ReturnTy, UnaryOp};
pub use parse::{parse_function, ParseError};
pub use serialize::{to_string, write_function};
pub use types::PrimType;
