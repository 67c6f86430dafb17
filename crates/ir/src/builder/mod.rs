//! Whole-function construction for front ends and tests.
use crate::{
    func_cursor::{CursorLocation, FuncCursor, InstInserter},
    inst::{AluOp, InstData, Intrinsic, Payload},
    BlockId, Function, Immediate, InstId, Type, ValueId, VarData, VarId,
};

pub struct FunctionBuilder<C = InstInserter> {
    pub func: Function,
    pub cursor: C,
}

impl<C> FunctionBuilder<C>
where
    C: FuncCursor,
{
    pub fn new(name: &str, args: &[Type]) -> Self {
        Self {
            func: Function::new(name, args),
            cursor: C::at_location(CursorLocation::NoWhere),
        }
    }

    pub fn finish(self) -> Function {
        self.func
    }

    pub fn arg(&self, idx: usize) -> ValueId {
        self.func.arg_values[idx]
    }

    pub fn append_block(&mut self) -> BlockId {
        let block = self.cursor.make_block(&mut self.func);
        self.cursor.append_block(&mut self.func, block);
        block
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.cursor.position_at_bottom(block);
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.cursor.block(&self.func)
    }

    pub fn declare_var(&mut self, var: VarData) -> VarId {
        self.func.declare_var(var)
    }

    pub fn imm<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<Immediate>,
    {
        self.func.dfg.make_imm_value(imm)
    }

    pub fn insert(&mut self, data: InstData, dest_tys: &[Type]) -> InstId {
        self.cursor.emit(&mut self.func, data, dest_tys)
    }

    pub fn insert_value(&mut self, data: InstData, ty: Type) -> ValueId {
        self.cursor.emit_value(&mut self.func, data, ty)
    }

    pub fn insert_effect(&mut self, data: InstData) -> InstId {
        self.cursor.emit_effect(&mut self.func, data)
    }

    pub fn alu(&mut self, op: AluOp, args: &[ValueId], ty: Type) -> ValueId {
        self.cursor.alu(&mut self.func, op, args, ty)
    }

    pub fn intrinsic(
        &mut self,
        intr: Intrinsic,
        args: &[ValueId],
        payload: Payload,
        ty: Type,
    ) -> ValueId {
        self.cursor.intrinsic(&mut self.func, intr, args, payload, ty)
    }

    pub fn deref_var(&mut self, var: VarId) -> ValueId {
        self.intrinsic(Intrinsic::DerefVar, &[], Payload::Deref(var), Type::HANDLE)
    }

    pub fn deref_array(&mut self, parent: ValueId, index: ValueId) -> ValueId {
        self.intrinsic(
            Intrinsic::DerefArray,
            &[parent, index],
            Payload::None,
            Type::HANDLE,
        )
    }

    pub fn phi(&mut self, ty: Type, incoming: &[(ValueId, BlockId)]) -> ValueId {
        self.insert_value(InstData::phi(incoming), ty)
    }

    pub fn append_phi_arg(&mut self, phi: ValueId, value: ValueId, block: BlockId) {
        let inst = self
            .func
            .dfg
            .value_inst(phi)
            .expect("`phi` should be a result of phi inst");
        self.func.dfg.append_phi_arg(inst, value, block);
    }

    pub fn jump(&mut self, dest: BlockId) {
        self.insert_effect(InstData::jump(dest));
    }

    pub fn br(&mut self, cond: ValueId, then: BlockId, else_: BlockId) {
        self.insert_effect(InstData::br(cond, then, else_));
    }

    pub fn ret(&mut self, values: &[ValueId]) {
        self.insert_effect(InstData::ret(values));
    }
}

pub mod test_util {
    use super::*;

    use crate::ir_writer::FuncWriter;

    /// Returns a builder for a function named `test_func`.
    pub fn func_builder(args: &[Type]) -> FunctionBuilder {
        FunctionBuilder::new("test_func", args)
    }

    pub fn dump_func(func: &Function) -> String {
        FuncWriter::new(func).dump_string()
    }
}
