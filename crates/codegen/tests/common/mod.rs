use cadenza_interpreter::{Env, EvalValue, Event, Machine, Memory};
use cadenza_ir::{builder::test_util::dump_func, Function};
use cadenza_verifier::{verify_function, VerificationLevel, VerifierConfig};

pub fn assert_verified(func: &Function) {
    let cfg = VerifierConfig::for_level(VerificationLevel::Full);
    let report = verify_function(func, &cfg);
    assert!(report.is_ok(), "{report}\n{}", dump_func(func));
}

/// Runs `func` on a copy of `memory` and returns what it returned along with
/// the memory events it produced.
pub fn execute(
    func: &Function,
    env: Env,
    memory: &Memory,
    args: &[EvalValue],
) -> (Vec<EvalValue>, Vec<Event>) {
    let mut machine = Machine::new(func, env).with_memory(memory.clone());
    let returned = machine.run(args);
    (returned, machine.events().to_vec())
}
