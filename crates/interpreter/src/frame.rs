use cadenza_ir::{BlockId, Function, Value, ValueId};
use cranelift_entity::SecondaryMap;

use crate::value::EvalValue;

#[derive(Default)]
pub struct Frame {
    locals: SecondaryMap<ValueId, EvalValue>,
    /// The block control arrived from, used to pick phi operands.
    pub prev_block: Option<BlockId>,
}

impl Frame {
    pub fn new(func: &Function, args: &[EvalValue]) -> Self {
        assert_eq!(
            func.arg_values.len(),
            args.len(),
            "`{}` takes {} arguments",
            func.name,
            func.arg_values.len()
        );

        let mut frame = Self {
            locals: SecondaryMap::default(),
            prev_block: None,
        };
        for (&arg, value) in func.arg_values.iter().zip(args) {
            frame.map_val(arg, value.clone());
        }
        frame
    }

    pub fn map_val(&mut self, value: ValueId, e_val: EvalValue) {
        self.locals[value] = e_val;
    }

    /// Returns the value of `value`. Values that have not been computed yet
    /// read as undefined.
    pub fn lookup_val(&self, func: &Function, value: ValueId) -> EvalValue {
        match func.dfg.value(value) {
            Value::Immediate { imm, .. } => EvalValue::from_imm(*imm),
            _ => self.locals[value].clone(),
        }
    }
}
