#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must produce an error or a dump, never a panic
    if let Ok(archive) = abcxform::Archive::from_bytes("fuzz", data.to_vec()) {
        let _ = abcxform::dump_to_string(&archive, abcxform::DumpConfig::new());
    }
});
