use cadenza_ir::{
    inst::{AtomicOp, CompareFunc, ImagePayload, Intrinsic, Payload, TexPayload},
    BlockId, Function, ImageDim, InstId, Opcode, Type,
};
use smallvec::SmallVec;

use crate::{
    alu::eval_alu,
    frame::Frame,
    state::{texel_address, Env, Event, Memory},
    value::{wrap_int, EvalValue},
};

const DEFAULT_FUEL: usize = 1 << 20;

#[derive(Debug)]
enum Action {
    Continue,
    JumpTo(BlockId),
    Return(Vec<EvalValue>),
}

/// Executes a single function for one fragment invocation.
pub struct Machine<'a> {
    func: &'a Function,
    env: Env,
    memory: Memory,
    frame: Frame,
    fuel: usize,
}

impl<'a> Machine<'a> {
    pub fn new(func: &'a Function, env: Env) -> Self {
        Self {
            func,
            env,
            memory: Memory::new(),
            frame: Frame::default(),
            fuel: DEFAULT_FUEL,
        }
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = memory;
        self
    }

    /// Limits the number of instructions a single run may execute.
    pub fn with_fuel(mut self, fuel: usize) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn events(&self) -> &[Event] {
        self.memory.events()
    }

    pub fn into_memory(self) -> Memory {
        self.memory
    }

    /// Runs the function from its entry block and returns the values it
    /// returns.
    pub fn run(&mut self, args: &[EvalValue]) -> Vec<EvalValue> {
        let func = self.func;
        let _span = tracing::debug_span!("interpret", func = %func.name).entered();

        self.frame = Frame::new(func, args);
        let Some(entry) = func.layout.entry_block() else {
            panic!("`{}` has no entry block", func.name);
        };

        let mut fuel = self.fuel;
        let mut block = entry;
        let mut pc = self.enter_block(entry);
        loop {
            let Some(inst) = pc else {
                panic!("control falls off the end of `{block}`");
            };
            fuel = match fuel.checked_sub(1) {
                Some(fuel) => fuel,
                None => panic!("`{}` ran out of fuel", func.name),
            };

            match self.eval_inst(inst) {
                Action::Continue => pc = func.layout.next_inst_of(inst),
                Action::JumpTo(dest) => {
                    self.frame.prev_block = Some(func.layout.inst_block(inst));
                    block = dest;
                    pc = self.enter_block(dest);
                }
                Action::Return(values) => {
                    tracing::debug!(events = self.memory.events().len(), "returned");
                    return values;
                }
            }
        }
    }

    /// Evaluates the phis at the top of `block` as one parallel copy and
    /// returns the first instruction after them.
    fn enter_block(&mut self, block: BlockId) -> Option<InstId> {
        let func = self.func;
        let mut incoming = Vec::new();

        let mut next = func.layout.first_inst_of(block);
        while let Some(inst) = next {
            let data = func.dfg.inst(inst);
            if !data.is_phi() {
                break;
            }
            let Some(prev) = self.frame.prev_block else {
                panic!("phi `{inst}` is reached without a predecessor");
            };
            let Some((src, _)) = data.phi_incoming().find(|&(_, from)| from == prev) else {
                panic!("phi `{inst}` has no value for `{prev}`");
            };
            let value = self.frame.lookup_val(func, src.value).modify(src.modifier);
            incoming.push((func.dfg.inst_results(inst)[0], value));
            next = func.layout.next_inst_of(inst);
        }

        for (result, value) in incoming {
            self.frame.map_val(result, value);
        }
        next
    }

    fn eval_inst(&mut self, inst: InstId) -> Action {
        let func = self.func;
        let data = func.dfg.inst(inst);
        let args: SmallVec<[EvalValue; 4]> = data
            .srcs
            .iter()
            .map(|src| self.frame.lookup_val(func, src.value).modify(src.modifier))
            .collect();
        let results = func.dfg.inst_results(inst);
        let result_ty = results.first().map(|&result| func.dfg.value_ty(result));
        tracing::trace!(%inst, opcode = %data.opcode, "eval");

        match data.opcode {
            Opcode::Alu(op) => {
                let ty = result_ty.unwrap_or_else(|| panic!("`{inst}` has no destination"));
                let values = eval_alu(op, &args, ty);
                for (&result, value) in results.iter().zip(values) {
                    self.frame.map_val(result, value);
                }
                Action::Continue
            }

            Opcode::Intrinsic(intr) => {
                let value = self.eval_intrinsic(inst, intr, &args, &data.payload, result_ty);
                if let Some(&result) = results.first() {
                    self.frame.map_val(result, value);
                }
                Action::Continue
            }

            Opcode::Phi => panic!("phi `{inst}` follows a non-phi instruction"),

            Opcode::Jump => Action::JumpTo(data.blocks[0]),

            Opcode::Br => match args[0].as_bool() {
                Some(true) => Action::JumpTo(data.blocks[0]),
                Some(false) => Action::JumpTo(data.blocks[1]),
                None => panic!("`{inst}` branches on an undefined condition"),
            },

            Opcode::Return => Action::Return(args.into_vec()),
        }
    }

    fn eval_intrinsic(
        &mut self,
        inst: InstId,
        intr: Intrinsic,
        args: &[EvalValue],
        payload: &Payload,
        result_ty: Option<Type>,
    ) -> EvalValue {
        let ty = || result_ty.unwrap_or_else(|| panic!("`{inst}` has no destination"));

        match intr {
            Intrinsic::FragCoord => {
                let [x, y] = self.env.frag_coord;
                let lanes = ty().lanes as usize;
                if lanes == 1 {
                    EvalValue::F(x)
                } else {
                    EvalValue::Vec(
                        [x, y, 0.0, 1.0]
                            .into_iter()
                            .chain(std::iter::repeat(0.0))
                            .take(lanes)
                            .map(EvalValue::F)
                            .collect(),
                    )
                }
            }
            Intrinsic::LayerId => EvalValue::I(self.env.layer as i64),
            Intrinsic::ViewId => EvalValue::I(self.env.view as i64),
            Intrinsic::IsHelper => EvalValue::B(self.env.is_helper),

            Intrinsic::Load => match word_address(&args[0]) {
                Some(addr) => self.memory.load(addr, ty()),
                None => EvalValue::Undef,
            },
            Intrinsic::Store => {
                let addr = self.expect_address(inst, word_address(&args[0]));
                self.memory.store(addr, &args[1]);
                EvalValue::Undef
            }
            Intrinsic::GlobalAtomic => {
                let op = match payload {
                    Payload::Atomic { op, .. } => *op,
                    _ => panic!("`{inst}` carries no atomic operation"),
                };
                let addr = self.expect_address(inst, word_address(&args[0]));
                self.memory.atomic(addr, op, &args[1..], ty())
            }

            Intrinsic::ImageLoad => {
                let image = image_payload(inst, payload);
                match self.texel(image, &args[0], &args[1]) {
                    Some(addr) => self.memory.load(addr, ty()),
                    None => EvalValue::Undef,
                }
            }
            Intrinsic::ImageStore => {
                let image = image_payload(inst, payload);
                let addr = self.texel(image, &args[0], &args[1]);
                let addr = self.expect_address(inst, addr);
                self.memory.store(addr, &args[3]);
                EvalValue::Undef
            }
            Intrinsic::ImageAtomic => {
                let image = image_payload(inst, payload);
                let op: AtomicOp = match image.atomic {
                    Some(op) => op,
                    None => panic!("`{inst}` carries no atomic operation"),
                };
                let addr = self.texel(image, &args[0], &args[1]);
                let addr = self.expect_address(inst, addr);
                self.memory.atomic(addr, op, &args[3..], ty())
            }
            Intrinsic::ImageTexelAddress => {
                let image = image_payload(inst, payload);
                match self.texel(image, &args[0], &args[1]) {
                    Some(addr) => EvalValue::I(wrap_int(addr as i64, ty().bits)),
                    None => EvalValue::Undef,
                }
            }

            Intrinsic::DerefVar => match payload {
                Payload::Deref(var) => EvalValue::Handle(self.func.vars[*var].binding),
                _ => panic!("`{inst}` names no variable"),
            },
            Intrinsic::DerefArray => match (args[0].as_i64(), args[1].as_i64()) {
                (Some(base), Some(index)) => EvalValue::Handle((base + index) as u32),
                _ => EvalValue::Undef,
            },
            Intrinsic::BindlessHandle => match args[0].as_i64() {
                Some(slot) => EvalValue::Handle(slot as u32),
                None => EvalValue::Undef,
            },

            Intrinsic::Tex => {
                let tex = match payload {
                    Payload::Tex(tex) => tex,
                    _ => panic!("`{inst}` carries no texture payload"),
                };
                self.sample(tex, args, ty())
            }
        }
    }

    /// Returns the address of the texel an image operation refers to.
    fn texel(&self, image: &ImagePayload, handle: &EvalValue, coord: &EvalValue) -> Option<u64> {
        let binding = handle.as_i64()? as u64;
        let coord = coord_lanes(coord)?;

        if image.dim.is_subpass() {
            // Subpass coordinates are offsets from the current fragment.
            let [x, y] = self.env.frag_coord.map(|c| c as i64);
            let lane = |idx: usize| coord.get(idx).copied().unwrap_or_default();
            return Some(texel_address(binding, x + lane(0), y + lane(1), 0));
        }
        let (x, y, layer) = texel_coords(image.dim, image.arrayed, &coord);
        Some(texel_address(binding, x, y, layer))
    }

    fn sample(&self, tex: &TexPayload, args: &[EvalValue], ty: Type) -> EvalValue {
        let Some(binding) = args[0].as_i64() else {
            return EvalValue::Undef;
        };
        let Some(coord) = coord_lanes(&args[1]) else {
            return EvalValue::Undef;
        };
        let (x, y, layer) = texel_coords(tex.dim, tex.arrayed, &coord);
        let addr = texel_address(binding as u64, x, y, layer);

        let Some(compare) = tex.compare else {
            return self.memory.load(addr, ty);
        };
        let depth = f32::from_bits(self.memory.read(addr));
        let Some(reference) = args[2].as_f32() else {
            return EvalValue::Undef;
        };
        let passed = match compare {
            CompareFunc::Never => false,
            CompareFunc::Less => reference < depth,
            CompareFunc::Equal => reference == depth,
            CompareFunc::LessEqual => reference <= depth,
            CompareFunc::Greater => reference > depth,
            CompareFunc::NotEqual => reference != depth,
            CompareFunc::GreaterEqual => reference >= depth,
            CompareFunc::Always => true,
        };
        EvalValue::F(if passed { 1.0 } else { 0.0 })
    }

    fn expect_address(&self, inst: InstId, addr: Option<u64>) -> u64 {
        match addr {
            Some(addr) => addr,
            None => panic!("`{inst}` writes through an undefined address"),
        }
    }
}

fn image_payload(inst: InstId, payload: &Payload) -> &ImagePayload {
    match payload.image() {
        Some(image) => image,
        None => panic!("`{inst}` carries no image payload"),
    }
}

/// Interprets an address operand as a 32-bit word address.
fn word_address(value: &EvalValue) -> Option<u64> {
    value.as_i64().map(|addr| addr as u64 & 0xffff_ffff)
}

/// Integer coordinates of every lane. Float coordinates are truncated.
fn coord_lanes(coord: &EvalValue) -> Option<SmallVec<[i64; 4]>> {
    coord
        .lanes()
        .iter()
        .map(|lane| lane.as_f32().map(|f| f as i64).or_else(|| lane.as_i64()))
        .collect()
}

fn texel_coords(dim: ImageDim, arrayed: bool, coord: &[i64]) -> (i64, i64, i64) {
    let spatial = match dim {
        ImageDim::Dim1D | ImageDim::Buffer => 1,
        ImageDim::Dim3D | ImageDim::Cube => 3,
        ImageDim::Dim2D | ImageDim::Subpass | ImageDim::SubpassMs => 2,
    };
    let lane = |idx: usize| coord.get(idx).copied().unwrap_or_default();

    let x = lane(0);
    let y = if spatial >= 2 { lane(1) } else { 0 };
    let layer = if arrayed {
        lane(spatial)
    } else if spatial == 3 {
        lane(2)
    } else {
        0
    };
    (x, y, layer)
}
