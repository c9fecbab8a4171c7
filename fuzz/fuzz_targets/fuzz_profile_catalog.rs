//! Fuzz target: brew profile catalog parser
//!
//! Feeds arbitrary bytes to `ProfileCatalog::from_json` and verifies:
//! - No panics under arbitrary input
//! - A parsed catalog never exceeds `MAX_PROFILES` profiles
//! - No profile keeps more than `MAX_PHASES` phases
//!
//! cargo fuzz run fuzz_profile_catalog

#![no_main]

use brewctl::profiles::{MAX_PHASES, MAX_PROFILES, ProfileCatalog};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(catalog) = ProfileCatalog::from_json(text) else {
        return;
    };

    assert!(!catalog.is_empty());
    assert!(catalog.len() <= MAX_PROFILES);
    for (i, profile) in catalog.iter().enumerate() {
        assert!(profile.phases.len() <= MAX_PHASES);
        assert!(catalog.get(i).is_some());
        if let Some(found) = catalog.find(profile.shortname.as_str()) {
            assert!(found <= i, "find returns the first match");
        }
    }
});
