#![no_main]

use econ_kernel::condition::eval_condition;
use econ_kernel::state::GlobalState;
use libfuzzer_sys::fuzz_target;

// The trigger condition language is a hand-written lexer and
// recursive-descent parser over untrusted scenario text; it must reject
// malformed input as an evaluation-time false rather than panicking.
fuzz_target!(|data: &[u8]| {
    if let Ok(expr) = std::str::from_utf8(data) {
        let state = GlobalState::new();
        let _ = eval_condition(&state, expr);
    }
});
