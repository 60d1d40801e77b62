//! Machine-instruction prototypes: the payload a [`crate::ir::instructions::Insn::Machine`]
//! carries once instruction selection has matched a pattern.
//!
//! A prototype names a RISC-V mnemonic and its operand layout; the actual
//! bit encoding (opcode/funct3/funct7/funct12 and instruction format) lives
//! alongside it so a later binary-emission stage has everything it needs
//! without re-deriving it from the mnemonic string. This crate stops at
//! `Insn::Machine` plus its textual rendering — no encoder is implemented,
//! matching the non-goal of emitting object code.

use std::fmt;

/// RISC-V base instruction formats, per the unprivileged ISA spec. Each
/// variant captures exactly the immediate/field shape instruction selection
/// and (eventually) emission need; it does not model compressed (`C`)
/// encodings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InsnFormat {
    R,
    I,
    S,
    B,
    U,
    J,
    /// Not a hardware-encoded instruction at all — a pseudo-op the selector
    /// emits (e.g. a call-sequence marker) that a later stage expands.
    Pseudo,
}

/// The static encoding fields of one matched instruction prototype.
///
/// `funct7`/`funct12` are `None` for formats that don't carry one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Encoding {
    pub format: InsnFormat,
    pub opcode: u8,
    pub funct3: Option<u8>,
    pub funct7: Option<u8>,
    pub funct12: Option<u16>,
}

impl Encoding {
    pub const fn r(opcode: u8, funct3: u8, funct7: u8) -> Self {
        Encoding { format: InsnFormat::R, opcode, funct3: Some(funct3), funct7: Some(funct7), funct12: None }
    }

    pub const fn i(opcode: u8, funct3: u8) -> Self {
        Encoding { format: InsnFormat::I, opcode, funct3: Some(funct3), funct7: None, funct12: None }
    }

    pub const fn i_system(funct12: u16) -> Self {
        Encoding { format: InsnFormat::I, opcode: 0b1110011, funct3: Some(0), funct7: None, funct12: Some(funct12) }
    }

    pub const fn s(opcode: u8, funct3: u8) -> Self {
        Encoding { format: InsnFormat::S, opcode, funct3: Some(funct3), funct7: None, funct12: None }
    }

    pub const fn b(funct3: u8) -> Self {
        Encoding { format: InsnFormat::B, opcode: 0b1100011, funct3: Some(funct3), funct7: None, funct12: None }
    }

    pub const fn u(opcode: u8) -> Self {
        Encoding { format: InsnFormat::U, opcode, funct3: None, funct7: None, funct12: None }
    }

    pub const fn j(opcode: u8) -> Self {
        Encoding { format: InsnFormat::J, opcode, funct3: None, funct7: None, funct12: None }
    }

    pub const fn pseudo() -> Self {
        Encoding { format: InsnFormat::Pseudo, opcode: 0, funct3: None, funct7: None, funct12: None }
    }
}

/// The operand-count shape a prototype expects, for cheap sanity checks when
/// the selector materializes a matched pattern into an `Insn::Machine`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandShape {
    /// `rd = op`: one operand, a destination.
    Unary,
    /// `rd = op1, op2`.
    Binary,
    /// `rd = op1` where `op1` is the only source (e.g. `lui`).
    UnaryImm,
    /// No destination (store, branch).
    NoDest,
    /// Variable arity (e.g. a call-sequence pseudo-op).
    Variadic,
}

/// A matched machine-instruction prototype: mnemonic, encoding, and operand
/// shape. Cheap to clone (the mnemonic is `'static`, everything else is
/// `Copy`), so it can live directly in [`crate::ir::instructions::Insn::Machine`]
/// without an extra indirection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InsnProto {
    pub name: &'static str,
    pub encoding: Encoding,
    pub shape: OperandShape,
}

impl InsnProto {
    pub const fn new(name: &'static str, encoding: Encoding, shape: OperandShape) -> Self {
        InsnProto { name, encoding, shape }
    }
}

impl fmt::Display for InsnProto {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}
