//! Instruction and operand shapes.
//!
//! Mirrors `cranelift_codegen::ir::instructions`'s role (one tagged sum type
//! per instruction, Rust's answer to the C original's struct-with-union and
//! function-pointer-table dispatch), but with the much smaller, fixed set of
//! opcodes this IR actually needs instead of a target-independent opcode
//! list generated from a meta DSL.

use std::fmt;

use super::entities::{Block, Frame, Inst, Var};
use super::immediates::Const;
use crate::isa::riscv::encoding::InsnProto;
use smallvec::SmallVec;

/// Unary operators. `mov` doubles as a value-preserving cast between
/// differently-typed variables; the constant interpreter never sees it
/// (`Const::calc1` treats `mov` as a bug — folding a `mov` is just a rename).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Mov,
    Neg,
    Bitcast,
    /// Set-if-non-zero: produces `bool`.
    Snez,
    /// Set-if-zero: produces `bool`.
    Seqz,
    /// Bitwise negation.
    Bneg,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Mov => "mov",
            UnaryOp::Neg => "neg",
            UnaryOp::Bitcast => "bitcast",
            UnaryOp::Snez => "snez",
            UnaryOp::Seqz => "seqz",
            UnaryOp::Bneg => "bneg",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary operators. Comparisons (`seq`..`sge`) always produce `bool`; their
/// semantics otherwise follow the operand primitive (signed vs. unsigned
/// ordering for `slt`/`sle`/`sgt`/`sge`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Band,
    Bor,
    Bxor,
    Seq,
    Sne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Band => "band",
            BinaryOp::Bor => "bor",
            BinaryOp::Bxor => "bxor",
            BinaryOp::Seq => "seq",
            BinaryOp::Sne => "sne",
            BinaryOp::Slt => "slt",
            BinaryOp::Sle => "sle",
            BinaryOp::Sgt => "sgt",
            BinaryOp::Sge => "sge",
        }
    }

    /// Is this operator commutative (operand order doesn't change the
    /// result)? Drives the codegen driver's operand-order normalization.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::Band | BinaryOp::Bor | BinaryOp::Bxor
        )
    }

    /// Order-invariant comparisons: the codegen driver may still swap their
    /// operands (with the operator itself mirrored) to put the variable
    /// operand first; unlike arithmetic commutativity, `slt`/`sgt` etc. flip
    /// meaning under a swap, which is why isel patterns must cover both
    /// orientations rather than relying on this flag to fold them.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Seq
                | BinaryOp::Sne
                | BinaryOp::Slt
                | BinaryOp::Sle
                | BinaryOp::Sgt
                | BinaryOp::Sge
        )
    }

    pub fn produces_bool(self) -> bool {
        self.is_comparison()
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One operand to an instruction: a variable reference, a constant, or a
/// memory reference.
#[derive(Clone, Debug)]
pub enum Operand {
    Var(Var),
    Const(Const),
    Mem(MemRef),
}

impl Operand {
    pub fn as_var(&self) -> Option<Var> {
        match self {
            Operand::Var(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<&Const> {
        match self {
            Operand::Const(c) => Some(c),
            _ => None,
        }
    }
}

/// The base a [`MemRef`] is anchored to.
#[derive(Clone, Debug)]
pub enum MemBase {
    /// An absolute address, known at compile time.
    Absolute(u64),
    /// Relative to the start of a stack frame.
    Frame(Frame),
    /// A variable holding a pointer value.
    Var(Var),
    /// The label of a code block (address-of-block).
    BlockLabel(Block),
    /// An externally-defined symbolic label (e.g. a function or global).
    Symbol(String),
}

/// A memory reference: `base + index * scale + offset`.
#[derive(Clone, Debug)]
pub struct MemRef {
    pub base: MemBase,
    /// Optional scaled index.
    pub index: Option<(Var, u32)>,
    pub offset: i64,
}

/// One `{predecessor block, operand}` incoming edge of a `combinator` (phi).
#[derive(Clone, Debug)]
pub struct PhiEdge {
    pub pred: Block,
    pub value: Operand,
}

/// Return-type descriptor for a call or a function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnTy {
    Void,
    Prim(super::types::PrimType),
    Struct(Frame),
}

/// A single IR instruction.
///
/// This is the Rust sum-type rendering of the original's tagged
/// struct-with-union: one variant per kind instead of a shared tag field
/// plus payload union.
#[derive(Clone, Debug)]
pub enum Insn {
    /// Unary expression: one destination, one operand.
    Expr1 { dest: Var, op: UnaryOp, value: Operand },
    /// Binary expression: one destination, two operands.
    Expr2 { dest: Var, op: BinaryOp, lhs: Operand, rhs: Operand },
    /// Phi ("combinator"): selects, per incoming edge, which predecessor's
    /// value binds to `dest`.
    Combinator { dest: Var, edges: Vec<PhiEdge> },
    /// A destination explicitly bound to "no value" (e.g. after a deleted
    /// variable's uses are severed).
    Undefined { dest: Var },
    Load { dest: Var, addr: MemRef },
    Store { value: Operand, addr: MemRef },
    /// Materializes the address of a stack frame into `dest`.
    LeaStack { dest: Var, frame: Frame },
    /// Materializes the address of a symbolic label into `dest`.
    LeaSymbol { dest: Var, symbol: String },
    Jump { target: Block },
    Branch { cond: Operand, target: Block },
    Call {
        dest: Option<Var>,
        /// `None` for indirect calls through `target_var`.
        target: Option<String>,
        target_var: Option<Var>,
        args: SmallVec<[Operand; 4]>,
        ret_ty: ReturnTy,
    },
    Return { value: Option<Operand> },
    Memcpy { dest: MemRef, src: MemRef, len: u64 },
    /// Marks a set of physical registers as killed at this program point
    /// (inserted by the ABI expander around calls).
    Clobber { regs: Vec<&'static str> },
    /// A target-specific instruction, produced by the instruction selector.
    /// Carries the matched operands in prototype-defined order. `target` is
    /// `Some` exactly when the original instruction was a `jump`/`branch`,
    /// since a machine prototype's `operands` has no slot for "the block
    /// this instruction transfers control to" — that lives here instead, so
    /// `targets()` keeps working after selection.
    Machine {
        proto: InsnProto,
        dest: Option<Var>,
        operands: SmallVec<[Operand; 4]>,
        target: Option<Block>,
    },
}

impl Insn {
    /// The variable this instruction assigns, if any.
    pub fn dest(&self) -> Option<Var> {
        match self {
            Insn::Expr1 { dest, .. }
            | Insn::Expr2 { dest, .. }
            | Insn::Combinator { dest, .. }
            | Insn::Undefined { dest }
            | Insn::Load { dest, .. }
            | Insn::LeaStack { dest, .. }
            | Insn::LeaSymbol { dest, .. } => Some(*dest),
            Insn::Call { dest, .. } => *dest,
            Insn::Machine { dest, .. } => *dest,
            _ => None,
        }
    }

    /// All variables used (read) by this instruction, not counting `dest`.
    pub fn used_vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        let mut push_operand = |o: &Operand, out: &mut Vec<Var>| {
            match o {
                Operand::Var(v) => out.push(*v),
                Operand::Mem(m) => {
                    if let MemBase::Var(v) = &m.base {
                        out.push(*v);
                    }
                    if let Some((idx, _)) = m.index {
                        out.push(idx);
                    }
                }
                Operand::Const(_) => {}
            }
        };
        match self {
            Insn::Expr1 { value, .. } => push_operand(value, &mut out),
            Insn::Expr2 { lhs, rhs, .. } => {
                push_operand(lhs, &mut out);
                push_operand(rhs, &mut out);
            }
            Insn::Combinator { edges, .. } => {
                for e in edges {
                    push_operand(&e.value, &mut out);
                }
            }
            Insn::Load { addr, .. } => push_operand(&Operand::Mem(addr.clone()), &mut out),
            Insn::Store { value, addr } => {
                push_operand(value, &mut out);
                push_operand(&Operand::Mem(addr.clone()), &mut out);
            }
            Insn::Branch { cond, .. } => push_operand(cond, &mut out),
            Insn::Call { args, target_var, .. } => {
                if let Some(v) = target_var {
                    out.push(*v);
                }
                for a in args {
                    push_operand(a, &mut out);
                }
            }
            Insn::Return { value: Some(v) } => push_operand(v, &mut out),
            Insn::Memcpy { dest, src, .. } => {
                push_operand(&Operand::Mem(dest.clone()), &mut out);
                push_operand(&Operand::Mem(src.clone()), &mut out);
            }
            Insn::Machine { operands, .. } => {
                for o in operands {
                    push_operand(o, &mut out);
                }
            }
            _ => {}
        }
        out
    }

    /// Is this a control-flow instruction (participates in pred/succ sets)?
    pub fn is_control_flow(&self) -> bool {
        match self {
            Insn::Jump { .. } | Insn::Branch { .. } | Insn::Return { .. } => true,
            Insn::Machine { target, .. } => target.is_some(),
            _ => false,
        }
    }

    /// The block(s) this instruction transfers control to, if any.
    pub fn targets(&self) -> SmallVec<[Block; 2]> {
        match self {
            Insn::Jump { target } => SmallVec::from_slice(&[*target]),
            Insn::Branch { target, .. } => SmallVec::from_slice(&[*target]),
            Insn::Machine { target: Some(target), .. } => SmallVec::from_slice(&[*target]),
            _ => SmallVec::new(),
        }
    }

    pub fn is_machine(&self) -> bool {
        matches!(self, Insn::Machine { .. })
    }

    pub fn is_combinator(&self) -> bool {
        matches!(self, Insn::Combinator { .. })
    }
}
