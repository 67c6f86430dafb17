//! Forward type classification of SSA values.
//!
//! Every value is seeded from its element type tag, then from the opcodes
//! that define and read it. Type-agnostic opcodes (`mov`, `phi`, `vec`, the
//! data operands of `bcsel`) join their operands and destinations into one
//! class until nothing changes. A value found in both sets is ambiguous.
use bit_set::BitSet;
use cadenza_ir::{inst::TyClass, Function, InstId, Value, ValueId};
use cranelift_entity::EntityRef;
use smallvec::SmallVec;

/// A dense set of values keyed by their entity index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValueSet(BitSet);

impl ValueSet {
    /// Returns `true` if `value` was not in the set yet.
    pub fn insert(&mut self, value: ValueId) -> bool {
        self.0.insert(value.index())
    }

    pub fn contains(&self, value: ValueId) -> bool {
        self.0.contains(value.index())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.0.iter().map(ValueId::new)
    }
}

#[derive(Debug, Default, Clone)]
pub struct TypeClasses {
    pub float: ValueSet,
    pub int: ValueSet,
}

impl TypeClasses {
    /// Returns `true` if `value` is known to be float and nothing else.
    pub fn is_float(&self, value: ValueId) -> bool {
        self.float.contains(value) && !self.int.contains(value)
    }

    pub fn is_int(&self, value: ValueId) -> bool {
        self.int.contains(value) && !self.float.contains(value)
    }

    pub fn is_ambiguous(&self, value: ValueId) -> bool {
        self.float.contains(value) && self.int.contains(value)
    }

    fn seed(&mut self, value: ValueId, class: TyClass) {
        match class {
            TyClass::Float => {
                self.float.insert(value);
            }
            TyClass::Int => {
                self.int.insert(value);
            }
            TyClass::Any | TyClass::Bool | TyClass::Generic => {}
        }
    }
}

/// Classifies every value of `func`. Read only.
pub fn gather_types(func: &Function) -> TypeClasses {
    let mut classes = TypeClasses::default();

    for (value, data) in func.dfg.values() {
        if let Value::Inst { inst, .. } = data {
            if !func.layout.is_inst_inserted(*inst) {
                continue;
            }
        }
        let ty = data.ty();
        if ty.is_float() {
            classes.float.insert(value);
        } else if ty.is_integral() && !ty.is_bool() {
            classes.int.insert(value);
        }
    }

    let mut groups = Vec::new();
    for block in func.layout.iter_block() {
        for inst in func.layout.iter_inst(block) {
            if let Some(group) = seed_inst(func, inst, &mut classes) {
                groups.push(group);
            }
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for group in &groups {
            let any_float = group.float || group.members.iter().any(|&v| classes.float.contains(v));
            let any_int = group.int || group.members.iter().any(|&v| classes.int.contains(v));
            for &value in &group.members {
                if any_float {
                    changed |= classes.float.insert(value);
                }
                if any_int {
                    changed |= classes.int.insert(value);
                }
            }
        }
    }

    classes
}

/// Values joined into one class by a type-agnostic instruction.
///
/// Immediates keep their own tag since one constant may feed several
/// classes; they only contribute to the group.
struct Group {
    members: SmallVec<[ValueId; 4]>,
    float: bool,
    int: bool,
}

/// Seeds the classes implied by the opcode of `inst`, and returns the group
/// it forms if the opcode is type-agnostic.
fn seed_inst(func: &Function, inst: InstId, classes: &mut TypeClasses) -> Option<Group> {
    let data = func.dfg.inst(inst);
    let desc = data.desc();
    let dests = func.dfg.inst_results(inst);
    let data_srcs = &data.srcs[(desc.data_start as usize).min(data.srcs.len())..];

    for &dest in dests {
        classes.seed(dest, desc.output);
    }
    for src in data_srcs {
        if !is_immediate(func, src.value) {
            classes.seed(src.value, desc.input);
        }
    }

    if desc.input != TyClass::Generic {
        return None;
    }

    let mut group = Group {
        members: dests.iter().copied().collect(),
        float: false,
        int: false,
    };
    for src in data_srcs {
        if is_immediate(func, src.value) {
            group.float |= classes.float.contains(src.value);
            group.int |= classes.int.contains(src.value);
        } else {
            group.members.push(src.value);
        }
    }
    Some(group)
}

fn is_immediate(func: &Function, value: ValueId) -> bool {
    func.dfg.value_imm(value).is_some()
}
