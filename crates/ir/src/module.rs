use cranelift_entity::{entity_impl, PrimaryMap};
use rayon::prelude::*;

use crate::Function;

/// A whole-kernel compilation unit.
#[derive(Default)]
pub struct Module {
    pub funcs: PrimaryMap<FuncRef, Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_func(&mut self, func: Function) -> FuncRef {
        self.funcs.push(func)
    }

    pub fn iter_functions(&self) -> impl Iterator<Item = FuncRef> {
        self.funcs.keys()
    }

    /// Runs `f` on every function in parallel. Each call has exclusive access
    /// to its function.
    pub fn par_for_each<F>(&mut self, f: F)
    where
        F: Fn(FuncRef, &mut Function) + Sync + Send,
    {
        let funcs: Vec<_> = self.funcs.iter_mut().collect();
        funcs
            .into_par_iter()
            .for_each(|(func_ref, func)| f(func_ref, func));
    }

    /// Runs `f` on every function in parallel and returns `true` if any call
    /// did.
    pub fn par_any<F>(&mut self, f: F) -> bool
    where
        F: Fn(FuncRef, &mut Function) -> bool + Sync + Send,
    {
        let funcs: Vec<_> = self.funcs.iter_mut().collect();
        funcs
            .into_par_iter()
            .map(|(func_ref, func)| f(func_ref, func))
            .reduce(|| false, |a, b| a || b)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef, "func");
