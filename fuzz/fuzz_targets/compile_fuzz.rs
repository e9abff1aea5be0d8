//! Compile fuzz target: feed arbitrary programs to a fresh compiler with a memory IO space
//! open. Compiling must not panic; errors and exceptions are fine.
//! Build with: cargo fuzz run compile_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let Ok(mut pk) = binscope::Compiler::new(Some(binscope::TermIf::capture().0)) else {
        return;
    };
    if pk.open("*fuzz*", binscope::IosFlags::empty(), true).is_err() {
        return;
    }
    let _ = pk.compile_buffer(s);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run compile_fuzz");
}
