//! A real textual-IR parser, reading the grammar `serialize` writes.
//!
//! The original project leaves its deserializer "sketched but unfinished"
//! (see the design notes); property R1 (serialize/deserialize round-trip)
//! is treated here as a goal rather than a stretch, so this is a complete,
//! if small, hand-written lexer and recursive-descent parser — no external
//! parser-generator dependency, matching the crate's "minimal dependencies"
//! stance.
//!
//! Supports every instruction kind the IR builder can produce *before*
//! instruction selection (`Insn::Machine` is an opaque, target-specific
//! payload and is intentionally not round-trippable through text).

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::CharIndices;

use super::entities::{Block, Frame, Var};
use super::function::{Arg, Function};
use super::immediates::Const;
use super::instructions::{BinaryOp, MemBase, MemRef, Operand, PhiEdge, ReturnTy, UnaryOp};
use super::types::PrimType;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    Eof,
    #[error("unexpected token {found:?}, expected {expected}")]
    Unexpected { found: String, expected: &'static str },
    #[error("unknown identifier `{0}`")]
    UnknownIdent(String),
    #[error("reference to undefined %{0}")]
    UndefinedRef(String),
}

type Result<T> = std::result::Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Var(String),
    Block(String),
    Int(u128),
    Str(String),
    Punct(char),
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, chars: src.char_indices().peekable() }
    }

    fn tokenize(mut self) -> Result<Vec<Tok>> {
        let mut out = Vec::new();
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            if c == '/' && self.src[i..].starts_with("/*") {
                self.chars.next();
                self.chars.next();
                while let Some(&(j, c2)) = self.chars.peek() {
                    if c2 == '*' && self.src[j..].starts_with("*/") {
                        self.chars.next();
                        self.chars.next();
                        break;
                    }
                    self.chars.next();
                }
                continue;
            }
            if c == '%' {
                self.chars.next();
                out.push(Tok::Var(self.take_ident()));
                continue;
            }
            if c == '<' {
                self.chars.next();
                let name = self.take_while(|c| c != '>');
                self.chars.next();
                out.push(Tok::Block(name));
                continue;
            }
            if c.is_ascii_digit() || (c == '-' && self.src[i..].chars().nth(1).is_some_and(|c| c.is_ascii_digit())) {
                out.push(self.take_number()?);
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                out.push(Tok::Ident(self.take_ident()));
                continue;
            }
            if "[]{}(),:+*'".contains(c) {
                self.chars.next();
                out.push(Tok::Punct(c));
                continue;
            }
            return Err(ParseError::Unexpected { found: c.to_string(), expected: "token" });
        }
        Ok(out)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if pred(c) {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    fn take_ident(&mut self) -> String {
        self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '.')
    }

    fn take_number(&mut self) -> Result<Tok> {
        let neg = if self.chars.peek().map(|&(_, c)| c) == Some('-') {
            self.chars.next();
            true
        } else {
            false
        };
        let start = self.chars.peek().map(|&(i, _)| i).unwrap_or(self.src.len());
        if self.src[start..].starts_with("0x") {
            self.chars.next();
            self.chars.next();
            let hex_start = start + 2;
            let digits = self.take_while(|c| c.is_ascii_hexdigit());
            let val = u128::from_str_radix(&digits, 16).unwrap_or(0);
            let _ = hex_start;
            return Ok(Tok::Int(val));
        }
        let digits = self.take_while(|c| c.is_ascii_digit());
        let val: i128 = digits.parse().unwrap_or(0);
        Ok(Tok::Int(if neg { (-val) as u128 } else { val as u128 }))
    }
}

/// Parses the textual IR grammar `write_function` emits into a fresh
/// [`Function`].
pub struct Parser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    vars_by_name: HashMap<String, Var>,
    blocks_by_name: HashMap<String, Block>,
    frames_by_name: HashMap<String, Frame>,
    func: Function,
    src: &'a str,
}

pub fn parse_function(src: &str) -> Result<Function> {
    let toks = Lexer::new(src).tokenize()?;
    let mut p = Parser {
        toks,
        pos: 0,
        vars_by_name: HashMap::new(),
        blocks_by_name: HashMap::new(),
        frames_by_name: HashMap::new(),
        func: Function::new(""),
        src,
    };
    p.parse_function()?;
    Ok(p.func)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Result<Tok> {
        let t = self.toks.get(self.pos).cloned().ok_or(ParseError::Eof)?;
        self.pos += 1;
        Ok(t)
    }

    fn expect_ident(&mut self, want: &str) -> Result<()> {
        match self.bump()? {
            Tok::Ident(s) if s == want => Ok(()),
            other => Err(ParseError::Unexpected { found: format!("{other:?}"), expected: want }),
        }
    }

    fn expect_punct(&mut self, want: char) -> Result<()> {
        match self.bump()? {
            Tok::Punct(c) if c == want => Ok(()),
            other => Err(ParseError::Unexpected {
                found: format!("{other:?}"),
                expected: "punctuation",
            }),
        }
    }

    fn take_var_name(&mut self) -> Result<String> {
        match self.bump()? {
            Tok::Var(s) => Ok(s),
            other => Err(ParseError::Unexpected { found: format!("{other:?}"), expected: "%var" }),
        }
    }

    fn take_ident_any(&mut self) -> Result<String> {
        match self.bump()? {
            Tok::Ident(s) => Ok(s),
            other => Err(ParseError::Unexpected { found: format!("{other:?}"), expected: "ident" }),
        }
    }

    fn var(&mut self, name: &str) -> Result<Var> {
        self.vars_by_name.get(name).copied().ok_or_else(|| ParseError::UndefinedRef(name.into()))
    }

    fn block(&mut self, name: &str) -> Block {
        *self.blocks_by_name.entry(name.to_string()).or_insert_with(|| {
            let b = self.func.make_block(name.to_string());
            b
        })
    }

    fn parse_prim(&mut self) -> Result<PrimType> {
        let name = self.take_ident_any()?;
        PrimType::parse(&name).ok_or(ParseError::UnknownIdent(name))
    }

    fn parse_function(&mut self) -> Result<()> {
        let mut enforce_ssa = false;
        if matches!(self.peek(), Some(Tok::Ident(s)) if s == "ssa") {
            self.bump()?;
            enforce_ssa = true;
        }
        self.expect_ident("function")?;
        let name = self.take_ident_any()?;
        self.func.name = name;

        loop {
            match self.peek() {
                Some(Tok::Ident(s)) if s == "var" => {
                    self.bump()?;
                    let ty = self.parse_prim()?;
                    let name = self.take_var_name()?;
                    let v = self.func.make_var(name.clone(), ty);
                    self.vars_by_name.insert(name, v);
                }
                Some(Tok::Ident(s)) if s == "arg" => {
                    self.bump()?;
                    let name = self.take_var_name()?;
                    let v = self.var(&name)?;
                    self.func.args.push(Arg::Var(v));
                }
                Some(Tok::Ident(s)) if s == "frame" => {
                    self.bump()?;
                    let name = self.take_var_name()?;
                    let size = self.parse_u64_literal()?;
                    let align = self.parse_u64_literal()?;
                    let f = self.func.make_frame(name.clone(), size, align);
                    self.frames_by_name.insert(name, f);
                }
                _ => break,
            }
        }
        self.func.enforce_ssa = enforce_ssa;

        while matches!(self.peek(), Some(Tok::Ident(s)) if s == "code") {
            self.bump()?;
            let name = self.take_block_label()?;
            let block = self.block(&name);
            self.parse_block_body(block)?;
        }
        Ok(())
    }

    fn take_block_label(&mut self) -> Result<String> {
        match self.bump()? {
            Tok::Block(s) => Ok(s),
            other => Err(ParseError::Unexpected { found: format!("{other:?}"), expected: "<block>" }),
        }
    }

    fn parse_u64_literal(&mut self) -> Result<u64> {
        let _ty = self.parse_prim()?;
        self.expect_punct('\'')?;
        match self.bump()? {
            Tok::Int(v) => Ok(v as u64),
            other => Err(ParseError::Unexpected { found: format!("{other:?}"), expected: "int" }),
        }
    }

    fn parse_block_body(&mut self, block: Block) -> Result<()> {
        loop {
            match self.peek() {
                None => break,
                Some(Tok::Ident(s)) if s == "code" => break,
                Some(Tok::Ident(op)) => {
                    let op = op.clone();
                    self.bump()?;
                    self.parse_insn(block, &op)?;
                }
                other => {
                    return Err(ParseError::Unexpected {
                        found: format!("{other:?}"),
                        expected: "instruction mnemonic",
                    })
                }
            }
        }
        Ok(())
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        match self.peek().cloned() {
            Some(Tok::Var(name)) => {
                self.bump()?;
                Ok(Operand::Var(self.var(&name)?))
            }
            Some(Tok::Ident(s)) if s == "true" || s == "false" => {
                self.bump()?;
                Ok(Operand::Const(Const::bool(s == "true")))
            }
            Some(Tok::Ident(_)) => {
                let ty = self.parse_prim()?;
                self.expect_punct('\'')?;
                match self.bump()? {
                    Tok::Int(bits) => Ok(Operand::Const(Const::from_bits(ty, bits))),
                    other => Err(ParseError::Unexpected { found: format!("{other:?}"), expected: "int" }),
                }
            }
            Some(Tok::Punct('[')) => Ok(Operand::Mem(self.parse_memref()?)),
            other => Err(ParseError::Unexpected {
                found: format!("{other:?}"),
                expected: "operand",
            }),
        }
    }

    fn parse_memref(&mut self) -> Result<MemRef> {
        self.expect_punct('[')?;
        let base = match self.bump()? {
            Tok::Var(name) => {
                if let Some(f) = self.frames_by_name.get(&name).copied() {
                    MemBase::Frame(f)
                } else {
                    MemBase::Var(self.var(&name)?)
                }
            }
            Tok::Ident(s) => MemBase::Symbol(s),
            Tok::Int(v) => MemBase::Absolute(v as u64),
            other => {
                return Err(ParseError::Unexpected {
                    found: format!("{other:?}"),
                    expected: "memref base",
                })
            }
        };
        let mut index = None;
        let mut offset = 0i64;
        while !matches!(self.peek(), Some(Tok::Punct(']'))) {
            self.expect_punct('+')?;
            match self.peek().cloned() {
                Some(Tok::Var(name)) => {
                    self.bump()?;
                    self.expect_punct('*')?;
                    let scale = match self.bump()? {
                        Tok::Int(v) => v as u32,
                        other => {
                            return Err(ParseError::Unexpected {
                                found: format!("{other:?}"),
                                expected: "scale",
                            })
                        }
                    };
                    index = Some((self.var(&name)?, scale));
                }
                Some(Tok::Int(v)) => {
                    self.bump()?;
                    offset = v as i64;
                }
                other => {
                    return Err(ParseError::Unexpected {
                        found: format!("{other:?}"),
                        expected: "memref term",
                    })
                }
            }
        }
        self.expect_punct(']')?;
        Ok(MemRef { base, index, offset })
    }

    fn unary_op(name: &str) -> Option<UnaryOp> {
        Some(match name {
            "mov" => UnaryOp::Mov,
            "neg" => UnaryOp::Neg,
            "bitcast" => UnaryOp::Bitcast,
            "snez" => UnaryOp::Snez,
            "seqz" => UnaryOp::Seqz,
            "bneg" => UnaryOp::Bneg,
            _ => return None,
        })
    }

    fn binary_op(name: &str) -> Option<BinaryOp> {
        Some(match name {
            "add" => BinaryOp::Add,
            "sub" => BinaryOp::Sub,
            "mul" => BinaryOp::Mul,
            "div" => BinaryOp::Div,
            "rem" => BinaryOp::Rem,
            "shl" => BinaryOp::Shl,
            "shr" => BinaryOp::Shr,
            "band" => BinaryOp::Band,
            "bor" => BinaryOp::Bor,
            "bxor" => BinaryOp::Bxor,
            "seq" => BinaryOp::Seq,
            "sne" => BinaryOp::Sne,
            "slt" => BinaryOp::Slt,
            "sle" => BinaryOp::Sle,
            "sgt" => BinaryOp::Sgt,
            "sge" => BinaryOp::Sge,
            _ => return None,
        })
    }

    fn parse_insn(&mut self, block: Block, mnemonic: &str) -> Result<()> {
        use crate::ir::builder::FuncCursor;
        let mut cur = FuncCursor::at_end(&mut self.func, block);
        if let Some(op) = Self::unary_op(mnemonic) {
            let dest = self.var(&self.take_var_name()?)?;
            self.expect_punct(',')?;
            let value = self.parse_operand()?;
            cur.add_expr1(dest, op, value);
            return Ok(());
        }
        if let Some(op) = Self::binary_op(mnemonic) {
            let dest = self.var(&self.take_var_name()?)?;
            self.expect_punct(',')?;
            let lhs = self.parse_operand()?;
            self.expect_punct(',')?;
            let rhs = self.parse_operand()?;
            cur.add_expr2(dest, op, lhs, rhs);
            return Ok(());
        }
        match mnemonic {
            "phi" => {
                let dest_name = self.take_var_name()?;
                let dest = self.var(&dest_name)?;
                let mut edges = Vec::new();
                while matches!(self.peek(), Some(Tok::Punct(','))) {
                    self.bump()?;
                    let pred_name = self.take_block_label_or_var()?;
                    let pred = self.block(&pred_name);
                    let value = self.parse_operand()?;
                    edges.push(PhiEdge { pred, value });
                }
                cur.add_combinator(dest, edges);
            }
            "undefined" => {
                let dest = self.var(&self.take_var_name()?)?;
                cur.add_undefined(dest);
            }
            "load" => {
                let dest = self.var(&self.take_var_name()?)?;
                self.expect_punct(',')?;
                let addr = self.parse_memref()?;
                cur.add_load(dest, addr);
            }
            "store" => {
                let value = self.parse_operand()?;
                self.expect_punct(',')?;
                let addr = self.parse_memref()?;
                cur.add_store(value, addr);
            }
            "lea_stack" => {
                let dest = self.var(&self.take_var_name()?)?;
                self.expect_punct(',')?;
                let name = self.take_var_name()?;
                let frame = *self.frames_by_name.get(&name).ok_or(ParseError::UndefinedRef(name))?;
                cur.add_lea_stack(dest, frame);
            }
            "lea_symbol" => {
                let dest = self.var(&self.take_var_name()?)?;
                self.expect_punct(',')?;
                let sym = self.take_ident_any()?;
                cur.add_lea_symbol(dest, sym);
            }
            "jump" => {
                let name = self.take_block_label_or_var()?;
                let target = self.block(&name);
                cur.add_jump(target);
            }
            "branch" => {
                let cond = self.parse_operand()?;
                self.expect_punct(',')?;
                let name = self.take_block_label_or_var()?;
                let target = self.block(&name);
                cur.add_branch(cond, target);
            }
            "return" => {
                let value = if matches!(self.peek(), Some(Tok::Ident(s)) if s == "code") || self.peek().is_none() {
                    None
                } else {
                    Some(self.parse_operand()?)
                };
                cur.add_return(value);
            }
            "memcpy" => {
                let dest = self.parse_memref()?;
                self.expect_punct(',')?;
                let src = self.parse_memref()?;
                self.expect_punct(',')?;
                let len = self.parse_u64_literal()?;
                cur.add_memcpy(dest, src, len);
            }
            "clobber" => {
                // Regs are free-form identifiers; not round-tripped precisely
                // since `Insn::Clobber` stores `&'static str`s. Skip to end
                // of line by consuming idents/commas.
                while matches!(self.peek(), Some(Tok::Ident(_)) | Some(Tok::Punct(','))) {
                    self.bump()?;
                }
            }
            "call" => {
                let dest = match self.peek().cloned() {
                    Some(Tok::Var(name)) => {
                        self.bump()?;
                        Some(self.var(&name)?)
                    }
                    Some(Tok::Ident(s)) if s == "_" => {
                        self.bump()?;
                        None
                    }
                    _ => None,
                };
                self.expect_punct(',')?;
                let (target, target_var) = match self.peek().cloned() {
                    Some(Tok::Var(name)) => {
                        self.bump()?;
                        (None, Some(self.var(&name)?))
                    }
                    Some(Tok::Ident(s)) => {
                        self.bump()?;
                        (Some(s), None)
                    }
                    other => {
                        return Err(ParseError::Unexpected {
                            found: format!("{other:?}"),
                            expected: "call target",
                        })
                    }
                };
                let mut args = smallvec::SmallVec::new();
                while matches!(self.peek(), Some(Tok::Punct(','))) {
                    self.bump()?;
                    args.push(self.parse_operand()?);
                }
                cur.add_call(dest, target, target_var, args, ReturnTy::Void);
            }
            other => return Err(ParseError::UnknownIdent(other.to_string())),
        }
        Ok(())
    }

    fn take_block_label_or_var(&mut self) -> Result<String> {
        match self.peek().cloned() {
            Some(Tok::Block(s)) => {
                self.bump()?;
                Ok(s)
            }
            Some(Tok::Var(s)) => {
                self.bump()?;
                Ok(s)
            }
            other => Err(ParseError::Unexpected {
                found: format!("{other:?}"),
                expected: "block label",
            }),
        }
    }
}
