#![no_main]

use libfuzzer_sys::fuzz_target;
use weft_di::config::{ENV_FAIL_ON_DUPLICATES, ENV_MAX_RESOLUTION_DEPTH, ENV_OVERRIDE_POLICY, ENV_TESTING};
use weft_di::{AssemblerConfig, OverridePolicy};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut values = text.split('\n');
    let policy = values.next().map(str::to_string);
    let testing = values.next().map(str::to_string);
    let depth = values.next().map(str::to_string);
    let duplicates = values.next().map(str::to_string);

    let result = AssemblerConfig::from_lookup(|name| match name {
        ENV_OVERRIDE_POLICY => policy.clone(),
        ENV_TESTING => testing.clone(),
        ENV_MAX_RESOLUTION_DEPTH => depth.clone(),
        ENV_FAIL_ON_DUPLICATES => duplicates.clone(),
        _ => None,
    });

    if let Ok(config) = result {
        assert!(config.max_resolution_depth > 0);
        let policy: OverridePolicy = config.override_policy.as_str().parse().unwrap();
        assert_eq!(policy, config.override_policy);
    }
});
