use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::{
    metadata::{FuncMetadata, Metadata},
    DataFlowGraph, Layout, Type, ValueId, VarData, VarId,
};

pub struct Function {
    pub name: String,
    pub arg_values: SmallVec<[ValueId; 8]>,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
    /// Resource variables declared for this function.
    pub vars: PrimaryMap<VarId, VarData>,
    metadata: FuncMetadata,
}

impl Function {
    pub fn new(name: &str, args: &[Type]) -> Self {
        let mut dfg = DataFlowGraph::new();
        let arg_values = args
            .iter()
            .enumerate()
            .map(|(idx, &ty)| dfg.make_arg_value(ty, idx))
            .collect();

        Self {
            name: name.to_string(),
            arg_values,
            dfg,
            layout: Layout::default(),
            vars: PrimaryMap::default(),
            metadata: FuncMetadata::default(),
        }
    }

    pub fn declare_var(&mut self, var: VarData) -> VarId {
        self.vars.push(var)
    }

    /// Returns the cached analyses. Only kinds reported valid may be read.
    pub fn metadata(&self) -> &FuncMetadata {
        &self.metadata
    }

    /// Recomputes every stale kind in `kinds` and returns the cache.
    pub fn require(&mut self, kinds: Metadata) -> &FuncMetadata {
        let mut metadata = std::mem::take(&mut self.metadata);
        metadata.require(self, kinds);
        self.metadata = metadata;
        &self.metadata
    }

    /// Marks `kinds` stale.
    pub fn invalidate(&mut self, kinds: Metadata) {
        self.metadata.invalidate(kinds);
    }

    /// Marks every kind outside `preserved` stale.
    pub fn preserve_only(&mut self, preserved: Metadata) {
        self.metadata.invalidate(Metadata::all() - preserved);
    }
}
