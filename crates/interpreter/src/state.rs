use cadenza_ir::{inst::AtomicOp, Type};
use rustc_hash::FxHashMap;

use crate::value::EvalValue;

/// Per-invocation inputs of a fragment shader.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Env {
    pub is_helper: bool,
    pub frag_coord: [f32; 2],
    pub layer: u32,
    pub view: u32,
}

/// A memory side effect, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Store {
        addr: u64,
        value: u32,
    },
    Atomic {
        addr: u64,
        op: AtomicOp,
        old: u32,
        new: u32,
    },
}

/// Word-addressed memory shared by buffers and image texels.
///
/// Unwritten words read as zero. A texel of image binding `b` lives at
/// `b << 24 | layer << 16 | y << 8 | x`.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    words: FxHashMap<u64, u32>,
    events: Vec<Event>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a word without recording an event.
    pub fn init(&mut self, addr: u64, value: u32) {
        self.words.insert(addr, value);
    }

    pub fn read(&self, addr: u64) -> u32 {
        self.words.get(&addr).copied().unwrap_or_default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Loads a value of type `ty`. Vector lanes occupy consecutive words.
    pub fn load(&self, addr: u64, ty: Type) -> EvalValue {
        if ty.is_vector() {
            let elem = ty.elem();
            EvalValue::Vec(
                (0..ty.lanes as u64)
                    .map(|lane| EvalValue::from_bits(self.read(addr + lane), elem))
                    .collect(),
            )
        } else {
            EvalValue::from_bits(self.read(addr), ty)
        }
    }

    /// Stores every defined lane of `value`. Undefined lanes leave memory
    /// untouched.
    pub fn store(&mut self, addr: u64, value: &EvalValue) {
        for (lane, value) in value.lanes().iter().enumerate() {
            let Some(bits) = value.to_bits() else {
                continue;
            };
            let addr = addr + lane as u64;
            self.words.insert(addr, bits);
            self.events.push(Event::Store { addr, value: bits });
        }
    }

    /// Performs `op` on the word at `addr` and returns the old value.
    pub fn atomic(&mut self, addr: u64, op: AtomicOp, data: &[EvalValue], ty: Type) -> EvalValue {
        assert_eq!(
            data.len(),
            op.num_data(),
            "`{op:?}` takes {} data operands",
            op.num_data()
        );
        let operand = |idx: usize| -> u32 {
            match data[idx].to_bits() {
                Some(bits) => bits,
                None => panic!("atomic `{op:?}` on undefined data"),
            }
        };

        let old = self.read(addr);
        let new = match op {
            AtomicOp::Add => old.wrapping_add(operand(0)),
            AtomicOp::Min => (old as i32).min(operand(0) as i32) as u32,
            AtomicOp::Max => (old as i32).max(operand(0) as i32) as u32,
            AtomicOp::And => old & operand(0),
            AtomicOp::Or => old | operand(0),
            AtomicOp::Xor => old ^ operand(0),
            AtomicOp::Xchg => operand(0),
            AtomicOp::CmpXchg => {
                if old == operand(0) {
                    operand(1)
                } else {
                    old
                }
            }
        };

        self.words.insert(addr, new);
        self.events.push(Event::Atomic { addr, op, old, new });
        EvalValue::from_bits(old, ty)
    }
}

/// Packs a texel position into its memory address.
pub fn texel_address(binding: u64, x: i64, y: i64, layer: i64) -> u64 {
    let field = |v: i64| (v as u64) & 0xff;
    ((binding << 24) | (field(layer) << 16) | (field(y) << 8) | field(x)) & 0xffff_ffff
}
