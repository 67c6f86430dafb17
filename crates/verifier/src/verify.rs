use std::collections::BTreeSet;

use cadenza_ir::{
    metadata::Metadata, BlockId, ControlFlowGraph, DomTree, Function, InstId, Module, Value,
    ValueId,
};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    diagnostic::{Diagnostic, DiagnosticCode, Location},
    report::VerificationReport,
    VerifierConfig,
};

/// Verifies every function of `module` in parallel. Diagnostics are ordered
/// by function.
pub fn verify_module(module: &Module, cfg: &VerifierConfig) -> VerificationReport {
    let funcs: Vec<&Function> = module.funcs.values().collect();
    let func_reports: Vec<VerificationReport> = funcs
        .into_par_iter()
        .map(|func| verify_function(func, cfg))
        .collect();

    let mut report = VerificationReport::default();
    for func_report in func_reports {
        report.extend_with_limit(func_report.diagnostics, cfg.max_diagnostics);
    }
    report
}

pub fn verify_function(func: &Function, cfg: &VerifierConfig) -> VerificationReport {
    let _span = tracing::debug_span!("verify", func = %func.name, level = ?cfg.level).entered();
    let mut verifier = FuncVerifier::new(func, cfg);
    verifier.run();
    tracing::debug!(diagnostics = verifier.report.diagnostics.len());
    verifier.report
}

pub fn verify_module_or_panic(module: &Module, cfg: &VerifierConfig) {
    let report = verify_module(module, cfg);
    if report.has_errors() {
        eprintln!("CADENZA_IR_VERIFY_FAILURE: module");
        eprintln!("{report}");
        panic!("CADENZA_IR_VERIFY_FAILURE");
    }
}

pub fn verify_function_or_panic(func: &Function, cfg: &VerifierConfig) {
    let report = verify_function(func, cfg);
    if report.has_errors() {
        eprintln!("CADENZA_IR_VERIFY_FAILURE: function %{}", func.name);
        eprintln!("{report}");
        panic!("CADENZA_IR_VERIFY_FAILURE");
    }
}

struct FuncVerifier<'a> {
    func: &'a Function,
    cfg: &'a VerifierConfig,
    report: VerificationReport,

    block_order: Vec<BlockId>,
    inst_to_block: FxHashMap<InstId, BlockId>,
    inst_index_in_block: FxHashMap<InstId, usize>,

    graph: ControlFlowGraph,
    domtree: DomTree,
}

impl<'a> FuncVerifier<'a> {
    fn new(func: &'a Function, cfg: &'a VerifierConfig) -> Self {
        let mut graph = ControlFlowGraph::new();
        graph.compute(func);
        let mut domtree = DomTree::new();
        domtree.compute(&graph);

        Self {
            func,
            cfg,
            report: VerificationReport::default(),
            block_order: Vec::new(),
            inst_to_block: FxHashMap::default(),
            inst_index_in_block: FxHashMap::default(),
            graph,
            domtree,
        }
    }

    fn run(&mut self) {
        if self.func.layout.entry_block().is_none() {
            self.emit(Diagnostic::error(
                DiagnosticCode::MissingEntryBlock,
                "function has no entry block",
                Location::Function,
            ));
            return;
        }

        self.scan_layout();
        self.check_block_rules();

        if self.cfg.should_check_arity() {
            self.check_inst_shapes();
        }
        if self.cfg.should_check_phis() {
            self.check_phi_rules();
        }
        if self.cfg.should_check_dominance() {
            self.check_dominance_rules();
        }
        if self.cfg.should_check_users() {
            self.check_users();
            self.check_result_map();
        }
        if self.cfg.should_check_metadata() {
            self.check_metadata();
        }
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.with_function(self.func.name.as_str());
        self.report.push(diagnostic, self.cfg.max_diagnostics);
    }

    fn scan_layout(&mut self) {
        for block in self.func.layout.iter_block() {
            self.block_order.push(block);
            for (index, inst) in self.func.layout.iter_inst(block).enumerate() {
                self.inst_to_block.insert(inst, block);
                self.inst_index_in_block.insert(inst, index);
            }
        }
    }

    fn insts_of(&self, block: BlockId) -> Vec<InstId> {
        self.func.layout.iter_inst(block).collect()
    }

    fn inst_location(&self, inst: InstId) -> Location {
        Location::Inst {
            block: self.inst_to_block.get(&inst).copied(),
            inst,
        }
    }

    fn check_block_rules(&mut self) {
        let func = self.func;
        for block in self.block_order.clone() {
            let insts = self.insts_of(block);
            let Some((&last, body)) = insts.split_last() else {
                self.emit(Diagnostic::error(
                    DiagnosticCode::EmptyBlock,
                    "block has no instructions",
                    Location::Block(block),
                ));
                continue;
            };

            for &inst in body {
                if func.dfg.inst(inst).is_terminator() {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::TerminatorNotLast,
                        "terminator appears before end of block",
                        self.inst_location(inst),
                    ));
                }
            }

            let last_data = func.dfg.inst(last);
            if !last_data.is_terminator() {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::MissingTerminator,
                        "block does not end with a terminator",
                        Location::Block(block),
                    )
                    .with_note(format!("last instruction is `{}` ({last})", last_data.opcode)),
                );
                continue;
            }

            for &dest in last_data.branch_dests() {
                if !func.layout.is_block_inserted(dest) {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::BranchToNonInsertedBlock,
                            "branch targets a block outside the layout",
                            self.inst_location(last),
                        )
                        .with_note(format!("target {dest} is detached")),
                    );
                }
            }

            if !self.cfg.allow_unreachable_blocks && !self.domtree.is_reachable(block) {
                self.emit(Diagnostic::error(
                    DiagnosticCode::UnreachableBlock,
                    "block is unreachable from function entry",
                    Location::Block(block),
                ));
            }
        }
    }

    fn check_inst_shapes(&mut self) {
        let func = self.func;
        for block in self.block_order.clone() {
            for inst in self.insts_of(block) {
                let data = func.dfg.inst(inst);
                let desc = data.desc();

                if !desc.arity.accepts(data.srcs.len()) {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::ArityMismatch,
                            "source count does not satisfy the opcode arity",
                            self.inst_location(inst),
                        )
                        .with_note(format!(
                            "`{}` takes {}{} sources, found {}",
                            desc.name,
                            if desc.arity.is_variable() { "at least " } else { "" },
                            desc.arity.min(),
                            data.srcs.len()
                        )),
                    );
                }

                if data.is_phi() && data.blocks.len() != data.srcs.len() {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::ArityMismatch,
                            "phi has a different number of values and incoming blocks",
                            self.inst_location(inst),
                        )
                        .with_note(format!(
                            "{} values, {} blocks",
                            data.srcs.len(),
                            data.blocks.len()
                        )),
                    );
                }

                let num_results = func.dfg.inst_results(inst).len();
                if num_results != desc.num_dests as usize {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::ResultCountMismatch,
                            "result count does not match the opcode",
                            self.inst_location(inst),
                        )
                        .with_note(format!(
                            "`{}` defines {}, found {num_results}",
                            desc.name, desc.num_dests
                        )),
                    );
                }
            }
        }
    }

    fn check_phi_rules(&mut self) {
        let func = self.func;
        let entry = func.layout.entry_block();

        for block in self.block_order.clone() {
            let preds: FxHashSet<BlockId> = self.graph.preds_of(block).copied().collect();
            let mut seen_non_phi = false;

            for inst in self.insts_of(block) {
                let data = func.dfg.inst(inst);
                if !data.is_phi() {
                    seen_non_phi = true;
                    continue;
                }

                if seen_non_phi {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::PhiNotAtBlockTop,
                        "phi must appear at the beginning of the block",
                        self.inst_location(inst),
                    ));
                }
                if entry == Some(block) {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::PhiInEntryBlock,
                        "entry block must not contain phis",
                        self.inst_location(inst),
                    ));
                }

                let result_ty = self
                    .func
                    .dfg
                    .inst_result(inst)
                    .map(|result| func.dfg.value_ty(result));
                let mut seen_incomings = FxHashSet::default();
                let incoming: Vec<_> = data.phi_incoming().collect();

                for (src, pred) in incoming {
                    if !preds.contains(&pred) {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::PhiHasNonPredIncoming,
                                "phi incoming block is not a CFG predecessor",
                                self.inst_location(inst),
                            )
                            .with_note(format!("incoming from {pred}")),
                        );
                    }

                    if !seen_incomings.insert(pred) {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::PhiDuplicateIncomingBlock,
                                "phi names the same incoming block twice",
                                self.inst_location(inst),
                            )
                            .with_note(format!("duplicate predecessor {pred}")),
                        );
                    }

                    let arg_ty = func.dfg.value_ty(src.value);
                    if let Some(res_ty) = result_ty.filter(|&res_ty| res_ty != arg_ty) {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::PhiIncomingTypeMismatch,
                                "phi incoming value type differs from phi result type",
                                self.inst_location(inst),
                            )
                            .with_note(format!("expected {res_ty}, found {arg_ty}")),
                        );
                    }
                }

                if seen_incomings.len() != preds.len() {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::PhiArgCountMismatchPreds,
                            "phi incoming blocks do not match the predecessor set",
                            self.inst_location(inst),
                        )
                        .with_note(format!(
                            "expected {} predecessor(s), found {} incoming block(s)",
                            preds.len(),
                            seen_incomings.len()
                        )),
                    );
                }
            }
        }
    }

    /// Returns the block defining `value`, or `None` for parameters and
    /// immediates. Reports values whose defining instruction left the layout.
    fn def_block(&mut self, value: ValueId, user: InstId) -> Option<(InstId, BlockId)> {
        let func = self.func;
        let def = func.dfg.value_inst(value)?;
        match self.inst_to_block.get(&def) {
            Some(&block) => Some((def, block)),
            None => {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::UseOfDetachedValue,
                        "source is defined by an instruction outside the layout",
                        self.inst_location(user),
                    )
                    .with_note(format!("{value} is defined by detached {def}")),
                );
                None
            }
        }
    }

    fn check_dominance_rules(&mut self) {
        let func = self.func;
        for block in self.block_order.clone() {
            let reachable = self.domtree.is_reachable(block);

            for inst in self.insts_of(block) {
                let data = func.dfg.inst(inst);

                if data.is_phi() {
                    let incoming: Vec<_> = data.phi_incoming().collect();
                    for (src, pred) in incoming {
                        let Some((_, def_block)) = self.def_block(src.value, inst) else {
                            continue;
                        };
                        if !self.domtree.is_reachable(pred) {
                            continue;
                        }
                        if !self.domtree.dominates(def_block, pred) {
                            self.emit(
                                Diagnostic::error(
                                    DiagnosticCode::PhiIncomingNotAvailableOnEdge,
                                    "phi incoming definition is not available on its edge",
                                    self.inst_location(inst),
                                )
                                .with_note(format!(
                                    "{} defined in {def_block}, incoming from {pred}",
                                    src.value
                                )),
                            );
                        }
                    }
                    continue;
                }

                let use_index = self.inst_index_in_block[&inst];
                let values: Vec<ValueId> = data.srcs.iter().map(|src| src.value).collect();
                for value in values {
                    let Some((def, def_block)) = self.def_block(value, inst) else {
                        continue;
                    };

                    if def_block == block {
                        let def_index = self.inst_index_in_block[&def];
                        if def_index >= use_index {
                            self.emit(
                                Diagnostic::error(
                                    DiagnosticCode::UseBeforeDefInBlock,
                                    "instruction uses a value before its definition",
                                    self.inst_location(inst),
                                )
                                .with_note(format!(
                                    "{def} appears at index {def_index}, use at {use_index}"
                                )),
                            );
                        }
                        continue;
                    }

                    if reachable && !self.domtree.dominates(def_block, block) {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::DefDoesNotDominateUse,
                                "value definition does not dominate its use",
                                self.inst_location(inst),
                            )
                            .with_note(format!(
                                "{value} defined in {def_block}, used in {block}"
                            )),
                        );
                    }
                }
            }
        }
    }

    /// The use list of every value must be exactly the set of laid out
    /// instructions reading it.
    fn check_users(&mut self) {
        let func = self.func;
        let mut expected: FxHashMap<ValueId, BTreeSet<InstId>> = FxHashMap::default();
        for (&inst, _) in &self.inst_to_block {
            for src in &func.dfg.inst(inst).srcs {
                expected.entry(src.value).or_default().insert(inst);
            }
        }

        let empty = BTreeSet::new();
        for (value, _) in func.dfg.values() {
            let actual: BTreeSet<InstId> = func.dfg.users(value).copied().collect();
            let expected = expected.get(&value).unwrap_or(&empty);
            if &actual == expected {
                continue;
            }

            let missing: Vec<String> = expected.difference(&actual).map(|i| i.to_string()).collect();
            let extra: Vec<String> = actual.difference(expected).map(|i| i.to_string()).collect();
            self.emit(
                Diagnostic::error(
                    DiagnosticCode::UsersSetMismatch,
                    "use list differs from the instructions reading the value",
                    Location::Value(value),
                )
                .with_note(format!(
                    "missing [{}], extra [{}]",
                    missing.join(", "),
                    extra.join(", ")
                )),
            );
        }
    }

    fn check_result_map(&mut self) {
        let func = self.func;
        for (value, data) in func.dfg.values() {
            let Value::Inst { inst, slot, .. } = *data else {
                continue;
            };
            if !self.inst_to_block.contains_key(&inst) {
                continue;
            }
            if func.dfg.inst_results(inst).get(slot as usize) != Some(&value) {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::InstResultMapBroken,
                        "value does not sit in the result slot it claims",
                        Location::Value(value),
                    )
                    .with_note(format!("claims slot {slot} of {inst}")),
                );
            }
        }

        let insts: Vec<InstId> = self.inst_to_block.keys().copied().collect();
        for inst in insts {
            for (slot, &result) in func.dfg.inst_results(inst).iter().enumerate() {
                let matches = matches!(
                    *func.dfg.value(result),
                    Value::Inst { inst: def, slot: def_slot, .. }
                        if def == inst && def_slot as usize == slot
                );
                if !matches {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::InstResultMapBroken,
                            "result value is not defined by this instruction",
                            self.inst_location(inst),
                        )
                        .with_note(format!("slot {slot} holds {result}")),
                    );
                }
            }
        }
    }

    /// Analyses the function reports as valid must equal a fresh computation.
    fn check_metadata(&mut self) {
        let func = self.func;
        let metadata = func.metadata();

        if metadata.is_valid(Metadata::BLOCK_INDEX) {
            let stale = self
                .block_order
                .iter()
                .enumerate()
                .find(|&(index, &block)| metadata.block_index(block) as usize != index);
            if let Some((index, &block)) = stale {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::StaleMetadata,
                        "cached block index is valid but out of date",
                        Location::Block(block),
                    )
                    .with_note(format!(
                        "cached {}, actual {index}",
                        metadata.block_index(block)
                    )),
                );
            }
        }

        if metadata.is_valid(Metadata::DOMINANCE) {
            if metadata.cfg() != &self.graph {
                self.emit(Diagnostic::error(
                    DiagnosticCode::StaleMetadata,
                    "cached control flow graph is valid but out of date",
                    Location::Function,
                ));
            } else if metadata.domtree() != &self.domtree {
                self.emit(Diagnostic::error(
                    DiagnosticCode::StaleMetadata,
                    "cached dominator tree is valid but out of date",
                    Location::Function,
                ));
            }
        }
    }
}
