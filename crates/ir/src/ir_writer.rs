//! Textual form of a function, used for debugging and test expectations.
//!
//! ```text
//! func %name(v0.f32, v1.f32) {
//!     block0:
//!         v2.f32 = fadd v0 -v1;
//!         return v2;
//! }
//! ```
use std::{fmt, io};

use crate::{
    inst::{InstData, Opcode, Src, SrcMod},
    BlockId, Function, InstId, Module, Value, ValueId,
};

pub struct ModuleWriter<'a> {
    module: &'a Module,
}

impl<'a> ModuleWriter<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }

    pub fn write(&self, mut w: impl io::Write) -> io::Result<()> {
        write!(w, "{self}")
    }
}

impl fmt::Display for ModuleWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut delim = "";
        for func in self.module.funcs.values() {
            write!(f, "{delim}{}", FuncWriter::new(func))?;
            delim = "\n";
        }
        Ok(())
    }
}

pub struct FuncWriter<'a> {
    func: &'a Function,
}

impl<'a> FuncWriter<'a> {
    pub fn new(func: &'a Function) -> Self {
        Self { func }
    }

    pub fn write(&self, mut w: impl io::Write) -> io::Result<()> {
        write!(w, "{self}")
    }

    pub fn dump_string(&self) -> String {
        self.to_string()
    }

    fn write_value(&self, f: &mut fmt::Formatter<'_>, value: ValueId) -> fmt::Result {
        match self.func.dfg.value(value) {
            Value::Immediate { imm, .. } => write!(f, "{imm}"),
            _ => write!(f, "{value}"),
        }
    }

    fn write_src(&self, f: &mut fmt::Formatter<'_>, src: Src) -> fmt::Result {
        match src.modifier {
            SrcMod::None => self.write_value(f, src.value),
            SrcMod::Neg => {
                f.write_str("-")?;
                self.write_value(f, src.value)
            }
            SrcMod::Abs => {
                f.write_str("|")?;
                self.write_value(f, src.value)?;
                f.write_str("|")
            }
            SrcMod::NegAbs => {
                f.write_str("-|")?;
                self.write_value(f, src.value)?;
                f.write_str("|")
            }
            SrcMod::Not => {
                f.write_str("!")?;
                self.write_value(f, src.value)
            }
        }
    }

    fn write_inst(&self, f: &mut fmt::Formatter<'_>, inst: InstId) -> fmt::Result {
        let results = self.func.dfg.inst_results(inst);
        if !results.is_empty() {
            let mut delim = "";
            for &result in results {
                let ty = self.func.dfg.value_ty(result);
                write!(f, "{delim}{result}.{ty}")?;
                delim = " ";
            }
            f.write_str(" = ")?;
        }

        let data: &InstData = self.func.dfg.inst(inst);
        write!(f, "{}", data.opcode)?;

        if data.opcode == Opcode::Phi {
            for (src, block) in data.phi_incoming() {
                f.write_str(" (")?;
                self.write_src(f, src)?;
                write!(f, " {block})")?;
            }
        } else {
            for &src in &data.srcs {
                f.write_str(" ")?;
                self.write_src(f, src)?;
            }
            for block in data.branch_dests() {
                write!(f, " {block}")?;
            }
        }

        let payload = data.payload.to_string();
        let payload = payload.trim();
        if !payload.is_empty() {
            write!(f, " [{payload}]")?;
        }
        f.write_str(";")
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, block: BlockId) -> fmt::Result {
        writeln!(f, "    {block}:")?;
        for inst in self.func.layout.iter_inst(block) {
            f.write_str("        ")?;
            self.write_inst(f, inst)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for FuncWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func %{}(", self.func.name)?;
        let mut delim = "";
        for &arg in &self.func.arg_values {
            let ty = self.func.dfg.value_ty(arg);
            write!(f, "{delim}{arg}.{ty}")?;
            delim = ", ";
        }
        writeln!(f, ") {{")?;

        let mut delim = "";
        for block in self.func.layout.iter_block() {
            f.write_str(delim)?;
            self.write_block(f, block)?;
            delim = "\n";
        }

        writeln!(f, "}}")
    }
}
