//! The default RISC-V pattern table: every [`MatchKey`] this backend
//! recognizes, and the candidate instruction prototypes competing for it.
//!
//! Grounded on `original_source/src/compiler/back/riscv/rv_instructions.c`'s
//! mnemonic table, restricted to the base integer (`I`) and multiply/divide
//! (`M`) extensions plus the subset of `F`/`D` arithmetic this IR's
//! `BinaryOp`/`UnaryOp` sets actually name. A real lowering also needs
//! double-word shift-amount masking, hi/lo pairs for 64-bit multiply-high,
//! and compressed-instruction selection; none of that is modeled here, only
//! the patterns this crate's fixed opcode set can produce.
//!
//! Register allocation (which matched `Var` lands in which physical
//! register) is out of scope — see the crate-level non-goals — so every
//! candidate's rule only constrains *class* (GPR/FPR) and width, never a
//! specific register.

use smallvec::smallvec;

use super::encoding::{Encoding, InsnProto, OperandShape};
use crate::isel::operand_rule::OperandRule;
use crate::isel::{Candidate, MatchKey, MatchTree};
use crate::ir::instructions::{BinaryOp, UnaryOp};

/// Build the default match tree for the base RISC-V integer backend. The
/// resulting tree is independent of the active [`super::profile::RiscvProfile`]
/// at the pattern-table level; profile-specific exclusion (e.g. no `M`
/// extension) is instead handled earlier, by
/// `crate::isa::riscv::abi::soften_arithmetic` turning the unsupported
/// `Insn::Expr2` into a library call before selection ever runs.
pub fn default_table() -> MatchTree {
    let mut tree = MatchTree::new();
    register_unary(&mut tree);
    register_binary(&mut tree);
    register_memory(&mut tree);
    register_control_flow(&mut tree);
    tree
}

fn register_unary(tree: &mut MatchTree) {
    tree.entry(MatchKey::Unary(UnaryOp::Mov)).insert(Candidate {
        proto: InsnProto::new("mv", Encoding::i(0b0010011, 0b000), OperandShape::Unary),
        rules: smallvec![OperandRule::any_gpr()],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Unary(UnaryOp::Mov)).insert(Candidate {
        proto: InsnProto::new("li", Encoding::i(0b0010011, 0b000), OperandShape::UnaryImm),
        rules: smallvec![OperandRule::gpr_or_imm(32)],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Unary(UnaryOp::Neg)).insert(Candidate {
        proto: InsnProto::new("neg", Encoding::r(0b0110011, 0b000, 0b0100000), OperandShape::Unary),
        rules: smallvec![OperandRule::any_gpr()],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Unary(UnaryOp::Bneg)).insert(Candidate {
        proto: InsnProto::new("not", Encoding::i(0b0010011, 0b100), OperandShape::Unary),
        rules: smallvec![OperandRule::any_gpr()],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Unary(UnaryOp::Seqz)).insert(Candidate {
        proto: InsnProto::new("seqz", Encoding::i(0b0010011, 0b011), OperandShape::Unary),
        rules: smallvec![OperandRule::any_gpr()],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Unary(UnaryOp::Snez)).insert(Candidate {
        proto: InsnProto::new("snez", Encoding::r(0b0110011, 0b011, 0), OperandShape::Unary),
        rules: smallvec![OperandRule::any_gpr()],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Unary(UnaryOp::Bitcast)).insert(Candidate {
        proto: InsnProto::new("fmv", Encoding::r(0b1010011, 0, 0), OperandShape::Unary),
        rules: smallvec![OperandRule::any_fpr()],
        cost: 1,
        materialize_address: false,
    });
}

fn register_binary(tree: &mut MatchTree) {
    let reg_reg = |name: &'static str, funct3: u8, funct7: u8| Candidate {
        proto: InsnProto::new(name, Encoding::r(0b0110011, funct3, funct7), OperandShape::Binary),
        rules: smallvec![OperandRule::any_gpr(), OperandRule::any_gpr()],
        cost: 1,
        materialize_address: false,
    };
    let reg_imm = |name: &'static str, funct3: u8| Candidate {
        proto: InsnProto::new(name, Encoding::i(0b0010011, funct3), OperandShape::Binary),
        rules: smallvec![OperandRule::any_gpr(), OperandRule::gpr_or_imm(12)],
        cost: 0,
        materialize_address: false,
    };

    tree.entry(MatchKey::Binary(BinaryOp::Add)).insert(reg_reg("add", 0b000, 0b0000000));
    tree.entry(MatchKey::Binary(BinaryOp::Add)).insert(reg_imm("addi", 0b000));
    tree.entry(MatchKey::Binary(BinaryOp::Sub)).insert(reg_reg("sub", 0b000, 0b0100000));
    tree.entry(MatchKey::Binary(BinaryOp::Mul)).insert(reg_reg("mul", 0b000, 0b0000001));
    tree.entry(MatchKey::Binary(BinaryOp::Div)).insert(reg_reg("div", 0b100, 0b0000001));
    tree.entry(MatchKey::Binary(BinaryOp::Rem)).insert(reg_reg("rem", 0b110, 0b0000001));
    tree.entry(MatchKey::Binary(BinaryOp::Shl)).insert(reg_reg("sll", 0b001, 0b0000000));
    tree.entry(MatchKey::Binary(BinaryOp::Shl)).insert(reg_imm("slli", 0b001));
    tree.entry(MatchKey::Binary(BinaryOp::Shr)).insert(reg_reg("sra", 0b101, 0b0100000));
    tree.entry(MatchKey::Binary(BinaryOp::Shr)).insert(reg_imm("srai", 0b101));
    tree.entry(MatchKey::Binary(BinaryOp::Band)).insert(reg_reg("and", 0b111, 0b0000000));
    tree.entry(MatchKey::Binary(BinaryOp::Band)).insert(reg_imm("andi", 0b111));
    tree.entry(MatchKey::Binary(BinaryOp::Bor)).insert(reg_reg("or", 0b110, 0b0000000));
    tree.entry(MatchKey::Binary(BinaryOp::Bor)).insert(reg_imm("ori", 0b110));
    tree.entry(MatchKey::Binary(BinaryOp::Bxor)).insert(reg_reg("xor", 0b100, 0b0000000));
    tree.entry(MatchKey::Binary(BinaryOp::Bxor)).insert(reg_imm("xori", 0b100));
    // `seq`/`sne`/`sgt`/`sge`/`sle` never reach this table: every one of
    // them is rewritten before instruction selection by
    // `crate::isa::riscv::abi::lower_comparisons` into a `slt`/`xor` plus a
    // `seqz`/`snez`, or (for `sgt`) a plain operand-swapped `slt` — see its
    // doc comment for the six-comparison mapping. `slt` is the only
    // comparison `BinaryOp` this table matches directly.
    tree.entry(MatchKey::Binary(BinaryOp::Slt)).insert(reg_reg("slt", 0b010, 0b0000000));
    tree.entry(MatchKey::Binary(BinaryOp::Slt)).insert(reg_imm("slti", 0b010));
}

fn register_memory(tree: &mut MatchTree) {
    // Each width gets its own exact-width rule on the destination (matched
    // as a trailing operand, see `selector::gather_match_operands`) so a
    // `u64` load can never silently match `lb` just because it registered
    // first; width, not insertion order, decides.
    //
    // Every width also gets a second, strictly costlier candidate whose
    // `mem_any` rule accepts *any* address shape — out-of-range offset,
    // scaled index, whatever — by materializing the effective address into
    // a fresh register ahead of the load/store (`selector::materialize_address`)
    // rather than relying on the offset fitting straight into the `I`/`S`
    // immediate field. The direct candidate always wins when it applies
    // (higher score: load + base + imm-bonus beats load + base alone); the
    // fallback only wins when the offset or index makes the direct
    // encoding impossible.
    for (name, funct3, bits) in [("lb", 0b000u8, 8u8), ("lh", 0b001, 16), ("lw", 0b010, 32), ("ld", 0b011, 64)] {
        tree.entry(MatchKey::Load).insert(Candidate {
            proto: InsnProto::new(name, Encoding::i(0b0000011, funct3), OperandShape::Unary),
            rules: smallvec![OperandRule::mem(12), OperandRule::exact_gpr(bits)],
            cost: 1,
            materialize_address: false,
        });
        tree.entry(MatchKey::Load).insert(Candidate {
            proto: InsnProto::new(name, Encoding::i(0b0000011, funct3), OperandShape::Unary),
            rules: smallvec![OperandRule::mem_any(), OperandRule::exact_gpr(bits)],
            cost: 5,
            materialize_address: true,
        });
    }
    for (name, funct3, bits) in [("sb", 0b000u8, 8u8), ("sh", 0b001, 16), ("sw", 0b010, 32), ("sd", 0b011, 64)] {
        tree.entry(MatchKey::Store).insert(Candidate {
            proto: InsnProto::new(name, Encoding::s(0b0100011, funct3), OperandShape::NoDest),
            rules: smallvec![OperandRule::exact_gpr(bits), OperandRule::mem(12)],
            cost: 1,
            materialize_address: false,
        });
        tree.entry(MatchKey::Store).insert(Candidate {
            proto: InsnProto::new(name, Encoding::s(0b0100011, funct3), OperandShape::NoDest),
            rules: smallvec![OperandRule::exact_gpr(bits), OperandRule::mem_any()],
            cost: 5,
            materialize_address: true,
        });
    }
    tree.entry(MatchKey::LeaStack).insert(Candidate {
        proto: InsnProto::new("addi", Encoding::i(0b0010011, 0b000), OperandShape::UnaryImm),
        rules: smallvec![],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::LeaSymbol).insert(Candidate {
        proto: InsnProto::new("lla", Encoding::pseudo(), OperandShape::UnaryImm),
        rules: smallvec![],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Memcpy).insert(Candidate {
        proto: InsnProto::new("memcpy_inline", Encoding::pseudo(), OperandShape::Variadic),
        rules: smallvec![],
        cost: 1,
        materialize_address: false,
    });
}

fn register_control_flow(tree: &mut MatchTree) {
    tree.entry(MatchKey::Jump).insert(Candidate {
        proto: InsnProto::new("j", Encoding::j(0b1101111), OperandShape::NoDest),
        rules: smallvec![],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Branch).insert(Candidate {
        proto: InsnProto::new("bnez", Encoding::b(0b001), OperandShape::NoDest),
        rules: smallvec![OperandRule::any_gpr()],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Call).insert(Candidate {
        proto: InsnProto::new("jal", Encoding::j(0b1101111), OperandShape::Variadic),
        rules: smallvec![],
        cost: 1,
        materialize_address: false,
    });
    tree.entry(MatchKey::Return).insert(Candidate {
        proto: InsnProto::new("ret", Encoding::i(0b1100111, 0b000), OperandShape::NoDest),
        rules: smallvec![],
        cost: 1,
        materialize_address: false,
    });
    // `Insn::Undefined`'s destination has no defined value; any bit pattern
    // satisfies it, so it selects to a zero-immediate `li` rather than
    // leaving a non-machine instruction behind (P5 requires every surviving
    // instruction to be `Machine` or `Combinator`). A front-end is expected
    // to reach this only when a deleted variable's uses haven't yet been
    // reaped by dead-code elimination.
    tree.entry(MatchKey::Undefined).insert(Candidate {
        proto: InsnProto::new("li", Encoding::i(0b0010011, 0b000), OperandShape::UnaryImm),
        rules: smallvec![],
        cost: 1,
        materialize_address: false,
    });
}
