#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::loadbalancer::registry::{parse_instances, VipRegistry};

// The instances grammar accepts operator input: parsing must never panic,
// every accepted instance must be usable, and errors must not abort the
// rest of the entry list.
fuzz_target!(|data: &[u8]| {
    let Ok(spec) = std::str::from_utf8(data) else {
        return;
    };
    let (instances, _errors) = parse_instances(spec);

    for instance in &instances {
        assert!(!instance.backends().is_empty());
        // The cursor must cycle without panicking.
        let first = instance.next_backend();
        assert!(instance.backends().contains(&first));
    }

    let registry = VipRegistry::new(instances);
    for instance in registry.iter() {
        assert!(registry.contains(instance.vip));
    }
});
