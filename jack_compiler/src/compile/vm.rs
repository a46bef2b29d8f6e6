//! VM command serialization.
use std::fmt::{self, Write as FmtWrite};

/// Named memory region referenced by push/pop commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl fmt::Display for Segment {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Segment as S;
        match self {
            S::Constant => write!(f, "constant"),
            S::Argument => write!(f, "argument"),
            S::Local    => write!(f, "local"),
            S::Static   => write!(f, "static"),
            S::This     => write!(f, "this"),
            S::That     => write!(f, "that"),
            S::Pointer  => write!(f, "pointer"),
            S::Temp     => write!(f, "temp"),
        }
    }
}

/// Arithmetic and logic commands of the stack machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl fmt::Display for VmOp {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use VmOp as Op;
        match self {
            Op::Add => write!(f, "add"),
            Op::Sub => write!(f, "sub"),
            Op::Neg => write!(f, "neg"),
            Op::Eq  => write!(f, "eq"),
            Op::Gt  => write!(f, "gt"),
            Op::Lt  => write!(f, "lt"),
            Op::And => write!(f, "and"),
            Op::Or  => write!(f, "or"),
            Op::Not => write!(f, "not"),
        }
    }
}

/// Serializes VM commands, one per line, to the given writer.
///
/// The writer makes no decisions of its own. Callers hand it fully
/// formed commands in emission order and the command text appears in
/// that same order.
pub struct VmWriter<W> {
    out: W,
}

impl<W: FmtWrite> VmWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Take back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn push(&mut self, segment: Segment, index: u16) -> fmt::Result {
        writeln!(self.out, "push {} {}", segment, index)
    }

    pub fn pop(&mut self, segment: Segment, index: u16) -> fmt::Result {
        writeln!(self.out, "pop {} {}", segment, index)
    }

    pub fn arithmetic(&mut self, op: VmOp) -> fmt::Result {
        writeln!(self.out, "{}", op)
    }

    pub fn label(&mut self, name: &str) -> fmt::Result {
        writeln!(self.out, "label {}", name)
    }

    pub fn goto(&mut self, name: &str) -> fmt::Result {
        writeln!(self.out, "goto {}", name)
    }

    pub fn if_goto(&mut self, name: &str) -> fmt::Result {
        writeln!(self.out, "if-goto {}", name)
    }

    pub fn call(&mut self, name: &str, n_args: u16) -> fmt::Result {
        writeln!(self.out, "call {} {}", name, n_args)
    }

    pub fn function(&mut self, name: &str, n_locals: u16) -> fmt::Result {
        writeln!(self.out, "function {} {}", name, n_locals)
    }

    pub fn ret(&mut self) -> fmt::Result {
        writeln!(self.out, "return")
    }
}
