//! Textual IR serialization.
//!
//! Emits one line per instruction in the fixed, parseable grammar consumed
//! by [`super::parse`]. Kept deliberately simple (`write!` into anything
//! `fmt::Write`) rather than pulling in a templating dependency.

use std::fmt::{self, Write};

use super::function::Function;
use super::instructions::{Insn, MemBase, Operand};

pub fn write_function(out: &mut impl Write, func: &Function) -> fmt::Result {
    if func.enforce_ssa {
        write!(out, "ssa_")?;
    }
    writeln!(out, "function {}", func.name)?;

    for (var, data) in func.vars.iter() {
        writeln!(out, "    var %{} {}", data.name, data.ty)?;
        let _ = var;
    }
    for arg in &func.args {
        match arg {
            super::function::Arg::Var(v) => writeln!(out, "    arg %{}", func.vars[*v].name)?,
            super::function::Arg::Frame(f) => {
                writeln!(out, "    arg %{}", func.frames[*f].name)?
            }
            super::function::Arg::Ignored(ty) => writeln!(out, "    arg _ {ty}")?,
        }
    }
    for (_, frame) in func.frames.iter() {
        writeln!(out, "    frame %{} u64'{:#x} u64'{:#x}", frame.name, frame.size, frame.align)?;
    }

    for block in func.layout.blocks().collect::<Vec<_>>() {
        writeln!(out, "code %{}", func.blocks[block].name)?;
        for inst in func.layout.block_insts(block).collect::<Vec<_>>() {
            write!(out, "    ")?;
            write_insn(out, func, &func.insts[inst])?;
        }
    }
    Ok(())
}

fn write_operand(out: &mut impl Write, func: &Function, operand: &Operand) -> fmt::Result {
    match operand {
        Operand::Var(v) => write!(out, "%{}", func.vars[*v].name),
        Operand::Const(c) => write!(out, "{c}"),
        Operand::Mem(m) => write_memref(out, func, m),
    }
}

fn write_memref(out: &mut impl Write, func: &Function, m: &super::instructions::MemRef) -> fmt::Result {
    match &m.base {
        MemBase::Absolute(addr) => write!(out, "[0x{addr:x}")?,
        MemBase::Frame(f) => write!(out, "[%{}", func.frames[*f].name)?,
        MemBase::Var(v) => write!(out, "[%{}", func.vars[*v].name)?,
        MemBase::BlockLabel(b) => write!(out, "[%{}", func.blocks[*b].name)?,
        MemBase::Symbol(s) => write!(out, "[{s}")?,
    }
    if let Some((idx, scale)) = m.index {
        write!(out, " + %{}*{}", func.vars[idx].name, scale)?;
    }
    if m.offset != 0 {
        write!(out, " + {}", m.offset)?;
    }
    write!(out, "]")
}

fn write_insn(out: &mut impl Write, func: &Function, insn: &Insn) -> fmt::Result {
    match insn {
        Insn::Expr1 { dest, op, value } => {
            write!(out, "{op} %{}, ", func.vars[*dest].name)?;
            write_operand(out, func, value)?;
            writeln!(out)
        }
        Insn::Expr2 { dest, op, lhs, rhs } => {
            write!(out, "{op} %{}, ", func.vars[*dest].name)?;
            write_operand(out, func, lhs)?;
            write!(out, ", ")?;
            write_operand(out, func, rhs)?;
            writeln!(out)
        }
        Insn::Combinator { dest, edges } => {
            write!(out, "phi %{}", func.vars[*dest].name)?;
            for edge in edges {
                write!(out, ", %{} ", func.blocks[edge.pred].name)?;
                write_operand(out, func, &edge.value)?;
            }
            writeln!(out)
        }
        Insn::Undefined { dest } => writeln!(out, "undefined %{}", func.vars[*dest].name),
        Insn::Load { dest, addr } => {
            write!(out, "load %{}, ", func.vars[*dest].name)?;
            write_memref(out, func, addr)?;
            writeln!(out)
        }
        Insn::Store { value, addr } => {
            write!(out, "store ")?;
            write_operand(out, func, value)?;
            write!(out, ", ")?;
            write_memref(out, func, addr)?;
            writeln!(out)
        }
        Insn::LeaStack { dest, frame } => {
            writeln!(out, "lea_stack %{}, %{}", func.vars[*dest].name, func.frames[*frame].name)
        }
        Insn::LeaSymbol { dest, symbol } => {
            writeln!(out, "lea_symbol %{}, {symbol}", func.vars[*dest].name)
        }
        Insn::Jump { target } => writeln!(out, "jump %{}", func.blocks[*target].name),
        Insn::Branch { cond, target } => {
            write!(out, "branch ")?;
            write_operand(out, func, cond)?;
            writeln!(out, ", %{}", func.blocks[*target].name)
        }
        Insn::Call { dest, target, target_var, args, .. } => {
            if let Some(dest) = dest {
                write!(out, "call %{}, ", func.vars[*dest].name)?;
            } else {
                write!(out, "call _, ")?;
            }
            match (target, target_var) {
                (Some(sym), _) => write!(out, "{sym}")?,
                (None, Some(v)) => write!(out, "%{}", func.vars[*v].name)?,
                (None, None) => write!(out, "<unknown>")?,
            }
            for a in args {
                write!(out, ", ")?;
                write_operand(out, func, a)?;
            }
            writeln!(out)
        }
        Insn::Return { value } => {
            write!(out, "return")?;
            if let Some(v) = value {
                write!(out, " ")?;
                write_operand(out, func, v)?;
            }
            writeln!(out)
        }
        Insn::Memcpy { dest, src, len } => {
            write!(out, "memcpy ")?;
            write_memref(out, func, dest)?;
            write!(out, ", ")?;
            write_memref(out, func, src)?;
            writeln!(out, ", u64'{len:#x}")
        }
        Insn::Clobber { regs } => writeln!(out, "clobber {}", regs.join(", ")),
        Insn::Machine { proto, dest, operands, target } => {
            if let Some(dest) = dest {
                write!(out, "{} %{}", proto.name, func.vars[*dest].name)?;
            } else {
                write!(out, "{}", proto.name)?;
            }
            for o in operands {
                write!(out, ", ")?;
                write_operand(out, func, o)?;
            }
            if let Some(target) = target {
                write!(out, ", %{}", func.blocks[*target].name)?;
            }
            writeln!(out)
        }
    }
}

pub fn to_string(func: &Function) -> String {
    let mut s = String::new();
    write_function(&mut s, func).expect("writing to a String cannot fail");
    s
}
