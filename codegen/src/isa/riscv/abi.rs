//! ABI expansion: turning calling-convention-visible constructs (argument
//! binding, struct returns, call sequences) into plain IR the selector can
//! match.
//!
//! The register/stack classification logic is the Rust counterpart of
//! `original_source/src/compiler/back/riscv/rv_abi.c`'s `rv_ccstate_t`: a
//! small piece of state threaded through the argument list in order, handing
//! back one [`ArgLoc`] per scalar (or, for a struct, one per
//! register/stack-sized chunk it shreds into).

use smallvec::{smallvec, SmallVec};

use super::profile::RiscvProfile;
use super::regs::{caller_saved, FPR_ARGS, GPR_ARGS};
use crate::ir::builder::FuncCursor;
use crate::ir::entities::{Block, Frame, Inst, Var};
use crate::ir::function::{Arg, Function};
use crate::ir::instructions::{BinaryOp, Insn, MemBase, MemRef, Operand, ReturnTy, UnaryOp};
use crate::ir::types::PrimType;

/// Where one argument (or one shredded piece of a struct argument) lives
/// after calling-convention classification.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArgLoc {
    Gpr(&'static str),
    Fpr(&'static str),
    /// Byte offset from the incoming stack pointer, for the overflow area.
    Stack(i64),
}

/// Threads GPR/FPR/stack-offset allocation across one argument list, in
/// calling-convention order. One `CallConvState` covers exactly one
/// function's entry, one call's arguments, or one return's result — it does
/// not persist across them.
pub struct CallConvState {
    profile: RiscvProfile,
    next_gpr: usize,
    next_fpr: usize,
    stack_offset: i64,
}

impl CallConvState {
    pub fn new(profile: RiscvProfile) -> Self {
        CallConvState { profile, next_gpr: 0, next_fpr: 0, stack_offset: 0 }
    }

    fn xlen_bytes(&self) -> u64 {
        (self.profile.xlen() / 8) as u64
    }

    fn take_gpr(&mut self) -> Option<&'static str> {
        let max = self.profile.abi.gpr_arg_count();
        if self.next_gpr < max {
            let r = GPR_ARGS[self.next_gpr];
            self.next_gpr += 1;
            Some(r)
        } else {
            None
        }
    }

    fn take_fpr(&mut self) -> Option<&'static str> {
        if self.next_fpr < FPR_ARGS.len() {
            let r = FPR_ARGS[self.next_fpr];
            self.next_fpr += 1;
            Some(r)
        } else {
            None
        }
    }

    fn take_stack(&mut self, size: u64, align: u64) -> i64 {
        let align = align.max(self.xlen_bytes()) as i64;
        let size = size.max(self.xlen_bytes() as i64 as u64);
        self.stack_offset = (self.stack_offset + align - 1) / align * align;
        let off = self.stack_offset;
        self.stack_offset += size as i64;
        off
    }

    /// Classify one scalar argument, widened to the ABI's float-register
    /// eligibility.
    pub fn classify_scalar(&mut self, ty: PrimType) -> ArgLoc {
        if ty.is_float() && self.profile.has_hardware_float() && (ty.bits() as u32) <= self.profile.flen() {
            if let Some(r) = self.take_fpr() {
                return ArgLoc::Fpr(r);
            }
        }
        if let Some(r) = self.take_gpr() {
            return ArgLoc::Gpr(r);
        }
        ArgLoc::Stack(self.take_stack(ty.size() as u64, ty.size() as u64))
    }

    /// Shred a struct argument into `xlen`-sized chunks, each independently
    /// classified as if it were a scalar GPR-sized integer. Structs that fit
    /// in two `xlen` chunks are passed this way rather than by reference;
    /// larger ones are demoted to a pointer in [`classify_struct`]'s caller.
    pub fn classify_struct(&mut self, size: u64, align: u64) -> Vec<ArgLoc> {
        let xlen = self.xlen_bytes();
        if size > 2 * xlen {
            return vec![self.by_reference()];
        }
        let chunks = size.div_ceil(xlen).max(1);
        let mut out = Vec::with_capacity(chunks as usize);
        for _ in 0..chunks {
            out.push(self.classify_scalar(int_of_width(xlen)));
        }
        let _ = align;
        out
    }

    fn by_reference(&mut self) -> ArgLoc {
        if let Some(r) = self.take_gpr() {
            ArgLoc::Gpr(r)
        } else {
            ArgLoc::Stack(self.take_stack(self.xlen_bytes(), self.xlen_bytes()))
        }
    }
}

fn int_of_width(bytes: u64) -> PrimType {
    if bytes <= 4 {
        PrimType::U32
    } else {
        PrimType::U64
    }
}

/// Struct-return threshold: structs at or under two `xlen`-sized registers
/// come back by value (shredded across `a0`/`a1`); anything larger is
/// returned through a hidden pointer argument the caller supplies.
fn returns_by_value(profile: RiscvProfile, size: u64) -> bool {
    size <= 2 * (profile.xlen() / 8) as u64
}

/// The primitive width an arbitrary call-argument or return-value operand
/// occupies once it is in a register: `Var`/`Const` give their own type
/// directly, and a bare pointer-valued `Mem` operand (never the
/// whole-aggregate convention documented on [`expand_call`]) is assumed
/// pointer-sized.
fn operand_ty(profile: RiscvProfile, func: &Function, op: &Operand) -> PrimType {
    match op {
        Operand::Var(v) => func.vars[*v].ty,
        Operand::Const(c) => c.ty,
        Operand::Mem(_) => int_of_width((profile.xlen() / 8) as u64),
    }
}

/// Does this operand represent a whole struct passed or returned by value,
/// before ABI expansion shreds it? By convention (there being no aggregate
/// [`Operand`] variant) that is a bare `Mem` reference to offset `0` of its
/// backing frame — see [`expand_call`] and [`expand_returns`].
fn struct_frame_operand(op: &Operand) -> Option<Frame> {
    match op {
        Operand::Mem(MemRef { base: MemBase::Frame(f), offset: 0, index: None }) => Some(*f),
        _ => None,
    }
}

/// Materialize one classified argument location: register locations become
/// a `mov` into a synthetic `$reg`-named variable (the call's operand list
/// then references that variable, symmetric with [`bind_one`] on the entry
/// side); stack locations are stored directly into the outgoing-argument
/// area and contribute nothing to the call's own operand list, since
/// nothing downstream reads an outgoing stack slot through a `Var`.
fn materialize_arg(cursor: &mut FuncCursor, loc: ArgLoc, value: Operand, ty: PrimType) -> Option<Operand> {
    match loc {
        ArgLoc::Gpr(reg) | ArgLoc::Fpr(reg) => {
            let dest = cursor.func.make_var(format!("${reg}"), ty);
            cursor.add_expr1(dest, UnaryOp::Mov, value);
            Some(Operand::Var(dest))
        }
        ArgLoc::Stack(offset) => {
            cursor.add_store(value, MemRef { base: MemBase::Symbol("$outgoing_args".into()), index: None, offset });
            None
        }
    }
}

/// Classify a function's incoming arguments. Does not mutate `func`; callers
/// combine this with [`bind_entry_locations`] to actually bind the function
/// body to its calling convention.
pub fn classify_entry(profile: RiscvProfile, func: &Function) -> Vec<ArgLoc> {
    let mut state = CallConvState::new(profile);
    let mut locs = Vec::new();
    for arg in &func.args {
        match arg {
            Arg::Var(v) => locs.push(state.classify_scalar(func.vars[*v].ty)),
            Arg::Ignored(ty) => locs.push(state.classify_scalar(*ty)),
            Arg::Frame(f) => locs.extend(state.classify_struct(func.frames[*f].size, func.frames[*f].align)),
        }
    }
    locs
}

/// Bind each incoming argument variable to its classified location by
/// materializing a `mov` from a synthetic physical-register source variable
/// at the top of the entry block. Register-passed struct arguments are
/// stored down into their frame slot instead, since nothing downstream
/// reads a struct through a bare `Var`.
pub fn bind_entry_locations(profile: RiscvProfile, func: &mut Function, entry: Block) {
    let locs = classify_entry(profile, func);
    let mut cursor = crate::ir::builder::FuncCursor::before(
        func,
        func.layout.first_inst(entry).expect("[BUG] entry block has no instructions to bind arguments before"),
    );
    let mut loc_iter = locs.into_iter();
    let args = cursor.func.args.clone();
    for arg in args {
        match arg {
            Arg::Var(v) => {
                if let Some(loc) = loc_iter.next() {
                    bind_one(&mut cursor, v, loc);
                }
            }
            Arg::Ignored(_) => {
                let _ = loc_iter.next();
            }
            Arg::Frame(f) => {
                let chunks = cursor.func.frames[f].size.div_ceil((profile.xlen() / 8) as u64).max(1);
                for i in 0..chunks {
                    if let Some(loc) = loc_iter.next() {
                        bind_frame_chunk(&mut cursor, f, i, loc);
                    }
                }
            }
        }
    }
}

fn bind_one(cursor: &mut crate::ir::builder::FuncCursor, dest: Var, loc: ArgLoc) {
    match loc {
        ArgLoc::Gpr(reg) | ArgLoc::Fpr(reg) => {
            let ty = cursor.func.vars[dest].ty;
            let src = cursor.func.make_var(format!("${reg}"), ty);
            cursor.add_expr1(dest, UnaryOp::Mov, Operand::Var(src));
        }
        ArgLoc::Stack(offset) => {
            let ty = cursor.func.vars[dest].ty;
            cursor.add_load(
                dest,
                MemRef { base: MemBase::Symbol("$incoming_args".into()), index: None, offset },
            );
            let _ = ty;
        }
    }
}

fn bind_frame_chunk(cursor: &mut crate::ir::builder::FuncCursor, frame: Frame, chunk: u64, loc: ArgLoc) {
    let xlen_bytes = 8u64;
    match loc {
        ArgLoc::Gpr(reg) | ArgLoc::Fpr(reg) => {
            let src = cursor.func.make_var(format!("${reg}"), PrimType::U64);
            cursor.add_store(
                Operand::Var(src),
                MemRef { base: MemBase::Frame(frame), index: None, offset: (chunk * xlen_bytes) as i64 },
            );
        }
        ArgLoc::Stack(offset) => {
            let tmp = cursor.func.make_var("", PrimType::U64);
            cursor.add_load(
                tmp,
                MemRef { base: MemBase::Symbol("$incoming_args".into()), index: None, offset },
            );
            cursor.add_store(
                Operand::Var(tmp),
                MemRef { base: MemBase::Frame(frame), index: None, offset: (chunk * xlen_bytes) as i64 },
            );
        }
    }
}

/// Expand one `call` instruction's arguments, result, and clobbers in place.
///
/// Each argument operand is classified and materialized (see
/// [`materialize_arg`]); a struct argument — conventionally a bare `Mem`
/// reference to offset `0` of its backing frame, there being no aggregate
/// `Operand` variant — is read out chunk by chunk (or passed by reference,
/// for anything over two `xlen` chunks) instead of as a single scalar. The
/// rewritten `Insn::Call` keeps only the register-materialized operands;
/// stack-passed arguments are stored ahead of the call and drop out of its
/// operand list entirely. A scalar-typed call result is bound from `a0`/
/// `fa0` right after the call; struct results are left for
/// [`expand_returns`]'s sibling handling at the callee, since this pass
/// cannot know whether the caller even wants the value materialized
/// anywhere without a destination frame, which `Insn::Call` does not carry.
/// Finally, a `clobber` records every caller-saved register the callee is
/// free to overwrite.
pub fn expand_call(profile: RiscvProfile, func: &mut Function, call: Inst) {
    let (dest, target, target_var, args, ret_ty) = match func.insts[call].clone() {
        Insn::Call { dest, target, target_var, args, ret_ty } => (dest, target, target_var, args, ret_ty),
        _ => panic!("[BUG] expand_call called on a non-call instruction"),
    };

    let mut state = CallConvState::new(profile);
    let mut new_args: SmallVec<[Operand; 4]> = SmallVec::new();
    {
        let mut cursor = FuncCursor::before(func, call);
        for arg in &args {
            if let Some(frame) = struct_frame_operand(arg) {
                let size = cursor.func.frames[frame].size;
                let align = cursor.func.frames[frame].align;
                let locs = state.classify_struct(size, align);
                let by_reference = locs.len() == 1 && size > 2 * state.xlen_bytes();
                if by_reference {
                    let ptr_ty = int_of_width(state.xlen_bytes());
                    let ptr = cursor.func.make_var("", ptr_ty);
                    cursor.add_lea_stack(ptr, frame);
                    if let Some(op) = materialize_arg(&mut cursor, locs[0], Operand::Var(ptr), ptr_ty) {
                        new_args.push(op);
                    }
                } else {
                    let chunk_ty = int_of_width(state.xlen_bytes());
                    for (i, loc) in locs.into_iter().enumerate() {
                        let tmp = cursor.func.make_var("", chunk_ty);
                        let offset = (i as u64 * state.xlen_bytes()) as i64;
                        cursor.add_load(tmp, MemRef { base: MemBase::Frame(frame), index: None, offset });
                        if let Some(op) = materialize_arg(&mut cursor, loc, Operand::Var(tmp), chunk_ty) {
                            new_args.push(op);
                        }
                    }
                }
                continue;
            }
            let ty = operand_ty(profile, cursor.func, arg);
            let loc = state.classify_scalar(ty);
            if let Some(op) = materialize_arg(&mut cursor, loc, arg.clone(), ty) {
                new_args.push(op);
            }
        }
    }

    // The old call's `dest` (if scalar) is no longer bound by the call
    // itself — the value lands in `a0`/`fa0` and a `mov` below rebinds it —
    // so the rewritten instruction replaces the old one entirely rather
    // than being patched in place, the same remove-then-reinsert shape
    // `soften_arithmetic` uses, keeping def/use bookkeeping correct.
    let next = func.layout.next_inst(call);
    let block = func.layout.inst_block(call).expect("[BUG] call instruction not in layout");
    crate::ir::builder::remove_inst(func, call);
    let new_call = match next {
        Some(after) => FuncCursor::before(func, after).add_call(None, target, target_var, new_args, ret_ty.clone()),
        None => FuncCursor::at_end(func, block).add_call(None, target, target_var, new_args, ret_ty.clone()),
    };

    if let (Some(dest), ReturnTy::Prim(ty)) = (dest, &ret_ty) {
        let reg = if ty.is_float() && profile.has_hardware_float() && (ty.bits() as u32) <= profile.flen() {
            "fa0"
        } else {
            "a0"
        };
        let mut cursor = match func.layout.next_inst(new_call) {
            Some(after) => FuncCursor::before(func, after),
            None => FuncCursor::at_end(func, block),
        };
        let src = cursor.func.make_var(format!("${reg}"), *ty);
        cursor.add_expr1(dest, UnaryOp::Mov, Operand::Var(src));
    }

    let clobbered: Vec<&'static str> = caller_saved().collect();
    match func.layout.next_inst(new_call) {
        Some(after) => FuncCursor::before(func, after).add_clobber(clobbered),
        None => FuncCursor::at_end(func, block).add_clobber(clobbered),
    };
}

/// Rewrite struct-valued `return`s larger than the by-value threshold to
/// copy through a hidden out-pointer argument instead. The out-pointer is
/// appended to `func.args` the first time this runs for such a function;
/// every `return <frame-backed value>` becomes a `memcpy` into `*out` and a
/// bare `return` (the pointer itself, per the psABI, also comes back in
/// `a0`, which instruction selection's return-sequence pattern supplies).
pub fn expand_struct_returns(profile: RiscvProfile, func: &mut Function) {
    let ReturnTy::Struct(frame) = func.ret_ty else { return };
    if returns_by_value(profile, func.frames[frame].size) {
        return;
    }
    let out_ptr = func.make_var("$sret", int_of_width((profile.xlen() / 8) as u64));
    func.args.insert(0, Arg::Var(out_ptr));

    for inst in func.all_insts() {
        if matches!(func.insts[inst], Insn::Return { .. }) {
            let mut cursor = crate::ir::builder::FuncCursor::before(func, inst);
            cursor.add_memcpy(
                MemRef { base: MemBase::Var(out_ptr), index: None, offset: 0 },
                MemRef { base: MemBase::Frame(frame), index: None, offset: 0 },
                cursor.func.frames[frame].size,
            );
        }
    }
    for inst in func.all_insts() {
        if let Insn::Return { value } = &mut func.insts[inst] {
            *value = None;
        }
    }
}

/// Bind every remaining `return`'s value to its result register(s): a
/// scalar value moves into `a0` (or `fa0`, if the profile passes its
/// primitive kind in an FPR); a small struct — the same whole-frame `Mem`
/// convention [`expand_call`] uses for by-value arguments — is read out in
/// `xlen` chunks into `a0`/`a1`. Large structs were already rewritten to a
/// bare `return` by [`expand_struct_returns`] and are skipped here (their
/// `value` is `None`). Run after [`expand_struct_returns`], since that pass
/// is what clears the large-struct case this one would otherwise also try
/// to shred.
pub fn expand_returns(profile: RiscvProfile, func: &mut Function) {
    let returns: Vec<Inst> = func
        .all_insts()
        .into_iter()
        .filter(|&inst| matches!(func.insts[inst], Insn::Return { value: Some(_) }))
        .collect();

    for inst in returns {
        let Insn::Return { value: Some(value) } = func.insts[inst].clone() else { unreachable!() };

        if let Some(frame) = struct_frame_operand(&value) {
            let size = func.frames[frame].size;
            let xlen = (profile.xlen() / 8) as u64;
            let chunk_ty = int_of_width(xlen);
            let chunks = size.div_ceil(xlen).max(1);
            let regs = GPR_ARGS;
            let mut cursor = FuncCursor::before(func, inst);
            for i in 0..chunks.min(2) {
                let tmp = cursor.func.make_var("", chunk_ty);
                cursor.add_load(
                    tmp,
                    MemRef { base: MemBase::Frame(frame), index: None, offset: (i * xlen) as i64 },
                );
                let dest = cursor.func.make_var(format!("${}", regs[i as usize]), chunk_ty);
                cursor.add_expr1(dest, UnaryOp::Mov, Operand::Var(tmp));
            }
            func.insts[inst] = Insn::Return { value: None };
            continue;
        }

        let ty = operand_ty(profile, func, &value);
        let reg = if ty.is_float() && profile.has_hardware_float() && (ty.bits() as u32) <= profile.flen() {
            "fa0"
        } else {
            "a0"
        };
        let mut cursor = FuncCursor::before(func, inst);
        let dest = cursor.func.make_var(format!("${reg}"), ty);
        cursor.add_expr1(dest, UnaryOp::Mov, value);
        func.insts[inst] = Insn::Return { value: Some(Operand::Var(dest)) };
    }
}

/// Run the full ABI expansion pipeline over `func`. [`expand_struct_returns`]
/// runs first: it is the one pass that can prepend a hidden out-pointer to
/// `func.args`, and entry binding must see that prepended argument to put it
/// in `a0` and shift every visible argument over by one register: a struct-
/// returning entry reserves `a0` for the return-struct pointer, so its
/// first visible argument lands in `a1` instead. Then the entry's own
/// incoming arguments are bound,
/// every call site is expanded, and finally whatever is left of this
/// function's own `return`s is bound to result registers.
pub fn expand_abi(profile: RiscvProfile, func: &mut Function) {
    expand_struct_returns(profile, func);
    if let Some(entry) = func.entry {
        bind_entry_locations(profile, func, entry);
    }
    for inst in func.all_insts() {
        if matches!(func.insts[inst], Insn::Call { .. }) {
            expand_call(profile, func, inst);
        }
    }
    expand_returns(profile, func);
}

/// Soften a binary operation unsupported by the target profile — integer
/// multiply/divide/remainder without the `M` extension, or any arithmetic on
/// a float width the profile has no hardware for — into a library call to
/// `__lily_<op>_<prim>`. Leaves the instruction alone if the profile already
/// supports it directly.
pub fn mangled_libcall_name(op: BinaryOp, ty: PrimType) -> String {
    format!("__lily_{}_{}", op.name(), ty.name())
}

pub fn needs_libcall(profile: RiscvProfile, op: BinaryOp, ty: PrimType) -> bool {
    if ty.is_float() {
        return !profile.has_hardware_arith(ty)
            && matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div);
    }
    !profile.has_m_ext && matches!(op, BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem)
}

/// Does converting from `from` to `to` via `mov` (§3: "mov ... doubles as a
/// value-preserving cast") require a library call on this profile? Only
/// conversions that touch a floating-point width the profile lacks hardware
/// for do; plain integer widening/narrowing and bitcast are never softened.
pub fn needs_conv_libcall(profile: RiscvProfile, from: PrimType, to: PrimType) -> bool {
    if from == to {
        return false;
    }
    (from.is_float() && !profile.has_hardware_arith(from)) || (to.is_float() && !profile.has_hardware_arith(to))
}

/// Mangle a float-to-float, int-to-float, or float-to-int conversion's
/// library-routine name per §6: `__lily_fconv_<to>` for float widening/
/// narrowing, `__lily_itof_<to>_<from>` / `__lily_ftoi_<from>_<to>` for the
/// mixed directions.
pub fn mangled_conv_libcall_name(from: PrimType, to: PrimType) -> String {
    match (from.is_float(), to.is_float()) {
        (true, true) => format!("__lily_fconv_{}", to.name()),
        (false, true) => format!("__lily_itof_{}_{}", to.name(), from.name()),
        (true, false) => format!("__lily_ftoi_{}_{}", from.name(), to.name()),
        (false, false) => unreachable!("[BUG] needs_conv_libcall only returns true for float-involving conversions"),
    }
}

/// Replace every `mov`-as-cast whose source/destination widths cross a
/// float boundary the profile has no hardware for with a call to its
/// mangled conversion routine. Companion to [`soften_arithmetic`]; run in
/// the same driver pass.
pub fn soften_conversions(profile: RiscvProfile, func: &mut Function) {
    for inst in func.all_insts() {
        let (dest, value, from, to) = match &func.insts[inst] {
            Insn::Expr1 { dest, op: UnaryOp::Mov, value } => {
                let to = func.vars[*dest].ty;
                let from = operand_ty(profile, func, value);
                if !needs_conv_libcall(profile, from, to) {
                    continue;
                }
                (*dest, value.clone(), from, to)
            }
            _ => continue,
        };
        let name = mangled_conv_libcall_name(from, to);
        let block = func.layout.inst_block(inst).expect("[BUG] instruction not in layout");
        let next = func.layout.next_inst(inst);
        crate::ir::builder::remove_inst(func, inst);
        match next {
            Some(after) => crate::ir::builder::FuncCursor::before(func, after)
                .add_call(Some(dest), Some(name), None, smallvec![value], ReturnTy::Prim(to)),
            None => crate::ir::builder::FuncCursor::at_end(func, block)
                .add_call(Some(dest), Some(name), None, smallvec![value], ReturnTy::Prim(to)),
        };
    }
}

/// Replace every unsupported binary op in `func` with a call to its mangled
/// library routine.
pub fn soften_arithmetic(profile: RiscvProfile, func: &mut Function) {
    for inst in func.all_insts() {
        let (dest, op, lhs, rhs, ty) = match &func.insts[inst] {
            Insn::Expr2 { dest, op, lhs, rhs } if needs_libcall(profile, *op, func.vars[*dest].ty) => {
                (*dest, *op, lhs.clone(), rhs.clone(), func.vars[*dest].ty)
            }
            _ => continue,
        };
        let name = mangled_libcall_name(op, ty);
        let block = func.layout.inst_block(inst).expect("[BUG] instruction not in layout");
        let next = func.layout.next_inst(inst);
        crate::ir::builder::remove_inst(func, inst);
        match next {
            Some(after) => crate::ir::builder::FuncCursor::before(func, after)
                .add_call(Some(dest), Some(name), None, smallvec![lhs, rhs], ReturnTy::Prim(ty)),
            None => crate::ir::builder::FuncCursor::at_end(func, block)
                .add_call(Some(dest), Some(name), None, smallvec![lhs, rhs], ReturnTy::Prim(ty)),
        };
    }
}

/// Rewrite every comparison `BinaryOp` the pattern table can't match
/// directly into the two-instruction sequence RISC-V actually needs, using
/// `seqz`/`snez` (already registered in `patterns::register_unary`) to turn
/// a raw `xor`/`slt` result into a proper `bool`:
/// - `seq(a, b)` -> `seqz(xor(a, b))`
/// - `sne(a, b)` -> `snez(xor(a, b))`
/// - `sgt(a, b)` -> `slt(b, a)`, a plain operand swap since `a > b` is `b < a`
/// - `sge(a, b)` -> `seqz(slt(a, b))`, since `a >= b` is `!(a < b)`
/// - `sle(a, b)` -> `seqz(slt(b, a))`, since `a <= b` is `!(b < a)`
///
/// `slt` itself already selects to a single `slt`/`slti` and needs no
/// rewrite.
pub fn lower_comparisons(profile: RiscvProfile, func: &mut Function) {
    for inst in func.all_insts() {
        let (dest, op, lhs, rhs) = match &func.insts[inst] {
            Insn::Expr2 { dest, op, lhs, rhs }
                if matches!(op, BinaryOp::Seq | BinaryOp::Sne | BinaryOp::Sgt | BinaryOp::Sge | BinaryOp::Sle) =>
            {
                (*dest, *op, lhs.clone(), rhs.clone())
            }
            _ => continue,
        };
        if op == BinaryOp::Sgt {
            func.insts[inst] = Insn::Expr2 { dest, op: BinaryOp::Slt, lhs: rhs, rhs: lhs };
            continue;
        }
        let (inner_op, a, b, outer_op) = match op {
            BinaryOp::Seq => (BinaryOp::Bxor, lhs, rhs, UnaryOp::Seqz),
            BinaryOp::Sne => (BinaryOp::Bxor, lhs, rhs, UnaryOp::Snez),
            BinaryOp::Sge => (BinaryOp::Slt, lhs, rhs, UnaryOp::Seqz),
            BinaryOp::Sle => (BinaryOp::Slt, rhs, lhs, UnaryOp::Seqz),
            _ => unreachable!("[BUG] Sgt handled above, Slt never matches this arm's guard"),
        };
        let inner_ty = operand_ty(profile, func, &a);
        let tmp = func.make_var(format!("{}.cmp", dest.index()), inner_ty);
        let block = func.layout.inst_block(inst).expect("[BUG] instruction not in layout");
        let next = func.layout.next_inst(inst);
        crate::ir::builder::remove_inst(func, inst);
        match next {
            Some(after) => {
                let mut cur = FuncCursor::before(func, after);
                cur.add_expr2(tmp, inner_op, a, b);
                cur.add_expr1(dest, outer_op, Operand::Var(tmp));
            }
            None => {
                let mut cur = FuncCursor::at_end(func, block);
                cur.add_expr2(tmp, inner_op, a, b);
                cur.add_expr1(dest, outer_op, Operand::Var(tmp));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::riscv::profile::RiscvAbi;

    #[test]
    fn first_four_ints_land_in_a0_a3() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let mut state = CallConvState::new(profile);
        assert_eq!(state.classify_scalar(PrimType::S32), ArgLoc::Gpr("a0"));
        assert_eq!(state.classify_scalar(PrimType::S32), ArgLoc::Gpr("a1"));
        assert_eq!(state.classify_scalar(PrimType::S32), ArgLoc::Gpr("a2"));
        assert_eq!(state.classify_scalar(PrimType::S32), ArgLoc::Gpr("a3"));
    }

    #[test]
    fn ninth_int_spills_to_stack() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let mut state = CallConvState::new(profile);
        for _ in 0..8 {
            state.classify_scalar(PrimType::S64);
        }
        assert!(matches!(state.classify_scalar(PrimType::S64), ArgLoc::Stack(_)));
    }

    #[test]
    fn small_struct_shreds_across_two_gprs() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let mut state = CallConvState::new(profile);
        let locs = state.classify_struct(12, 8);
        assert_eq!(locs.len(), 2);
        assert_eq!(locs[0], ArgLoc::Gpr("a0"));
        assert_eq!(locs[1], ArgLoc::Gpr("a1"));
    }

    #[test]
    fn large_struct_passed_by_reference() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let mut state = CallConvState::new(profile);
        let locs = state.classify_struct(64, 8);
        assert_eq!(locs.len(), 1);
        assert_eq!(locs[0], ArgLoc::Gpr("a0"));
    }

    #[test]
    fn soft_float_without_d_extension_softens_f64_add() {
        let mut profile = RiscvProfile::new(RiscvAbi::Lp64);
        profile.has_d_ext = false;
        assert!(needs_libcall(profile, BinaryOp::Add, PrimType::F64));
        assert!(!needs_libcall(profile, BinaryOp::Add, PrimType::S32));
    }

    #[test]
    fn soften_arithmetic_rewrites_f64_mul_into_libcall() {
        let mut profile = RiscvProfile::new(RiscvAbi::Lp64);
        profile.has_d_ext = false;
        let mut f = Function::new("f");
        let a = f.make_var("a", PrimType::F64);
        let b = f.make_var("b", PrimType::F64);
        let prod = f.make_var("prod", PrimType::F64);
        let entry = f.make_block("entry");
        {
            let mut cur = crate::ir::builder::FuncCursor::at_end(&mut f, entry);
            cur.add_expr2(prod, BinaryOp::Mul, Operand::Var(a), Operand::Var(b));
            cur.add_return(Some(Operand::Var(prod)));
        }
        soften_arithmetic(profile, &mut f);
        let first = f.layout.first_inst(entry).unwrap();
        match &f.insts[first] {
            Insn::Call { target: Some(name), .. } => assert_eq!(name, "__lily_mul_f64"),
            other => panic!("expected a libcall, got {other:?}"),
        }
    }

    #[test]
    fn soft_float_itof_conversion_is_softened() {
        let mut profile = RiscvProfile::new(RiscvAbi::Lp64);
        profile.has_d_ext = false;
        assert!(needs_conv_libcall(profile, PrimType::S32, PrimType::F64));
        assert_eq!(mangled_conv_libcall_name(PrimType::S32, PrimType::F64), "__lily_itof_f64_s32");
    }

    #[test]
    fn hardware_float_conversion_is_not_softened() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64D);
        assert!(!needs_conv_libcall(profile, PrimType::S32, PrimType::F64));
        assert!(!needs_conv_libcall(profile, PrimType::F32, PrimType::F64));
    }

    #[test]
    fn plain_integer_widening_is_never_softened() {
        let profile = RiscvProfile::new(RiscvAbi::Ilp32);
        assert!(!needs_conv_libcall(profile, PrimType::S32, PrimType::S64));
    }

    #[test]
    fn soften_conversions_rewrites_ftoi_into_libcall() {
        let mut profile = RiscvProfile::new(RiscvAbi::Lp64);
        profile.has_d_ext = false;
        let mut f = Function::new("f");
        let src = f.make_var("src", PrimType::F64);
        let dest = f.make_var("dest", PrimType::S32);
        let entry = f.make_block("entry");
        {
            let mut cur = crate::ir::builder::FuncCursor::at_end(&mut f, entry);
            cur.add_expr1(dest, UnaryOp::Mov, Operand::Var(src));
            cur.add_return(Some(Operand::Var(dest)));
        }
        soften_conversions(profile, &mut f);
        let first = f.layout.first_inst(entry).unwrap();
        match &f.insts[first] {
            Insn::Call { target: Some(name), .. } => assert_eq!(name, "__lily_ftoi_f64_s32"),
            other => panic!("expected a libcall, got {other:?}"),
        }
    }

    #[test]
    fn expand_call_shreds_small_struct_argument_into_two_gprs() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let mut f = Function::new("f");
        let frame = f.make_frame("pair", 12, 8);
        let entry = f.make_block("entry");
        let call_inst;
        {
            let mut cur = crate::ir::builder::FuncCursor::at_end(&mut f, entry);
            call_inst = cur.add_call(
                None,
                Some("callee".into()),
                None,
                smallvec![Operand::Mem(MemRef { base: MemBase::Frame(frame), index: None, offset: 0 })],
                ReturnTy::Void,
            );
            cur.add_return(None);
        }
        expand_call(profile, &mut f, call_inst);
        let Insn::Call { args, .. } = &f.insts[call_inst] else { panic!("call instruction vanished") };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn expand_returns_binds_scalar_result_to_a0() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let mut f = Function::new("f");
        f.ret_ty = ReturnTy::Prim(PrimType::S32);
        let v = f.make_var("v", PrimType::S32);
        let entry = f.make_block("entry");
        {
            let mut cur = crate::ir::builder::FuncCursor::at_end(&mut f, entry);
            cur.add_return(Some(Operand::Var(v)));
        }
        expand_returns(profile, &mut f);
        let last = f.layout.last_inst(entry).unwrap();
        match &f.insts[last] {
            Insn::Return { value: Some(Operand::Var(dest)) } => {
                assert_eq!(f.vars[*dest].name, "$a0");
            }
            other => panic!("expected return of the $a0 binding, got {other:?}"),
        }
    }

    fn build_comparison(op: BinaryOp) -> (Function, Var) {
        let mut f = Function::new("f");
        let a = f.make_var("a", PrimType::S32);
        let b = f.make_var("b", PrimType::S32);
        let dest = f.make_var("dest", PrimType::Bool);
        let entry = f.make_block("entry");
        {
            let mut cur = crate::ir::builder::FuncCursor::at_end(&mut f, entry);
            cur.add_expr2(dest, op, Operand::Var(a), Operand::Var(b));
            cur.add_return(Some(Operand::Var(dest)));
        }
        (f, dest)
    }

    #[test]
    fn seq_lowers_to_xor_then_seqz() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let (mut f, dest) = build_comparison(BinaryOp::Seq);
        lower_comparisons(profile, &mut f);
        let entry = f.layout.blocks().next().unwrap();
        let insts: Vec<_> = f.layout.block_insts(entry).collect();
        match &f.insts[insts[0]] {
            Insn::Expr2 { op: BinaryOp::Bxor, dest: tmp, .. } => match &f.insts[insts[1]] {
                Insn::Expr1 { op: UnaryOp::Seqz, dest: d, value: Operand::Var(v) } => {
                    assert_eq!(*d, dest);
                    assert_eq!(v, tmp);
                }
                other => panic!("expected seqz second, got {other:?}"),
            },
            other => panic!("expected xor first, got {other:?}"),
        }
    }

    #[test]
    fn sne_lowers_to_xor_then_snez() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let (mut f, dest) = build_comparison(BinaryOp::Sne);
        lower_comparisons(profile, &mut f);
        let entry = f.layout.blocks().next().unwrap();
        let insts: Vec<_> = f.layout.block_insts(entry).collect();
        match (&f.insts[insts[0]], &f.insts[insts[1]]) {
            (Insn::Expr2 { op: BinaryOp::Bxor, .. }, Insn::Expr1 { op: UnaryOp::Snez, dest: d, .. }) => {
                assert_eq!(*d, dest);
            }
            other => panic!("expected xor then snez, got {other:?}"),
        }
    }

    #[test]
    fn sgt_swaps_operands_into_a_plain_slt() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let (mut f, _dest) = build_comparison(BinaryOp::Sgt);
        lower_comparisons(profile, &mut f);
        let entry = f.layout.blocks().next().unwrap();
        let first = f.layout.first_inst(entry).unwrap();
        match &f.insts[first] {
            Insn::Expr2 { op: BinaryOp::Slt, lhs: Operand::Var(lhs), rhs: Operand::Var(rhs), .. } => {
                assert_eq!(f.vars[*lhs].name, "b");
                assert_eq!(f.vars[*rhs].name, "a");
            }
            other => panic!("expected a single operand-swapped slt, got {other:?}"),
        }
        assert_eq!(f.layout.block_insts(entry).count(), 2, "sgt must not grow into two instructions");
    }

    #[test]
    fn sge_lowers_to_slt_then_seqz() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let (mut f, dest) = build_comparison(BinaryOp::Sge);
        lower_comparisons(profile, &mut f);
        let entry = f.layout.blocks().next().unwrap();
        let insts: Vec<_> = f.layout.block_insts(entry).collect();
        match (&f.insts[insts[0]], &f.insts[insts[1]]) {
            (
                Insn::Expr2 { op: BinaryOp::Slt, lhs: Operand::Var(lhs), rhs: Operand::Var(rhs), .. },
                Insn::Expr1 { op: UnaryOp::Seqz, dest: d, .. },
            ) => {
                assert_eq!(f.vars[*lhs].name, "a");
                assert_eq!(f.vars[*rhs].name, "b");
                assert_eq!(*d, dest);
            }
            other => panic!("expected slt(a, b) then seqz, got {other:?}"),
        }
    }

    #[test]
    fn sle_lowers_to_swapped_slt_then_seqz() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let (mut f, dest) = build_comparison(BinaryOp::Sle);
        lower_comparisons(profile, &mut f);
        let entry = f.layout.blocks().next().unwrap();
        let insts: Vec<_> = f.layout.block_insts(entry).collect();
        match (&f.insts[insts[0]], &f.insts[insts[1]]) {
            (
                Insn::Expr2 { op: BinaryOp::Slt, lhs: Operand::Var(lhs), rhs: Operand::Var(rhs), .. },
                Insn::Expr1 { op: UnaryOp::Seqz, dest: d, .. },
            ) => {
                assert_eq!(f.vars[*lhs].name, "b");
                assert_eq!(f.vars[*rhs].name, "a");
                assert_eq!(*d, dest);
            }
            other => panic!("expected slt(b, a) then seqz, got {other:?}"),
        }
    }

    #[test]
    fn slt_is_left_untouched() {
        let profile = RiscvProfile::new(RiscvAbi::Lp64);
        let (mut f, _dest) = build_comparison(BinaryOp::Slt);
        lower_comparisons(profile, &mut f);
        let entry = f.layout.blocks().next().unwrap();
        assert_eq!(f.layout.block_insts(entry).count(), 2);
        let first = f.layout.first_inst(entry).unwrap();
        assert!(matches!(&f.insts[first], Insn::Expr2 { op: BinaryOp::Slt, .. }));
    }
}
