//! Fuzz target: dotted-path parameter store
//!
//! Drives arbitrary `set` / `get` sequences against the factory parameter
//! tree and verifies:
//! - No panics for any path text
//! - A successful `set` is immediately readable at the same path
//! - The typed settings view still loads afterwards
//!
//! cargo fuzz run fuzz_config_paths

#![no_main]

use brewctl::app::ports::ConfigPort;
use brewctl::config::{ParameterStore, Settings};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut store = ParameterStore::defaults();

    // Each record: 1 byte op, 1 byte length, `length` bytes of path.
    let mut rest = data;
    while let [op, len, tail @ ..] = rest {
        let n = usize::from(*len).min(tail.len());
        let (path_bytes, next) = tail.split_at(n);
        rest = next;
        let path = String::from_utf8_lossy(path_bytes);

        match op % 3 {
            0 => {
                let value = i32::from(*len) - 128;
                if store.set(&path, value).is_ok() {
                    assert_eq!(store.get::<i32>(&path), Ok(value));
                }
            }
            1 => {
                let _ = store.get::<f32>(&path);
            }
            _ => {
                let _ = store.get::<bool>(&path);
            }
        }
    }

    let _ = Settings::load(&store);
});
