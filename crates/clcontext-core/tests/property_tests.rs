use std::sync::Arc;

use clcontext_core::{
    ContextManager, ContextProperty, DeviceType, DriverProfile, PlatformId, SimulatedRuntime,
};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Step {
    Retain,
    Release,
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(prop_oneof![Just(Step::Retain), Just(Step::Release)], 0..40)
}

fn arb_profile() -> impl Strategy<Value = DriverProfile> {
    prop_oneof![
        Just(DriverProfile::conformant()),
        Just(DriverProfile::apple_2014()),
        Just(DriverProfile::amd_app_1642()),
    ]
}

proptest! {
    /// Any interleaving of retains and releases that never releases the
    /// creating handle leaves the count at one once extras are returned.
    #[test]
    fn balanced_sequences_return_to_one(steps in arb_steps()) {
        let runtime = Arc::new(SimulatedRuntime::new(DriverProfile::conformant()));
        let manager = ContextManager::new(runtime.clone());
        let ctx = manager.create_context_from_type(None, DeviceType::ALL, None).unwrap();
        let mut extras = Vec::new();

        for step in steps {
            match step {
                Step::Retain => extras.push(manager.retain_context(&ctx).unwrap()),
                Step::Release => {
                    if let Some(extra) = extras.pop() {
                        manager.release_context(extra).unwrap();
                    }
                }
            }
            prop_assert_eq!(ctx.reference_count().unwrap() as usize, 1 + extras.len());
        }

        for extra in extras.drain(..) {
            manager.release_context(extra).unwrap();
        }
        prop_assert_eq!(ctx.reference_count().unwrap(), 1);
        manager.release_context(ctx).unwrap();
        prop_assert_eq!(runtime.live_contexts(), 0);
    }

    /// The property list is echoed back unchanged.
    #[test]
    fn properties_echo(
        sync in proptest::option::of(any::<bool>()),
        with_platform in any::<bool>(),
    ) {
        let runtime = Arc::new(SimulatedRuntime::new(DriverProfile::conformant()));
        let manager = ContextManager::new(runtime);
        let platform: PlatformId = manager.platforms().unwrap()[0];

        let mut supplied = Vec::new();
        if with_platform {
            supplied.push(ContextProperty::Platform(platform));
        }
        if let Some(sync) = sync {
            supplied.push(ContextProperty::InteropUserSync(sync));
        }

        let ctx = manager.create_context_from_type(Some(&supplied), DeviceType::ALL, None).unwrap();
        prop_assert_eq!(ctx.properties().unwrap(), supplied);
    }

    /// Masks carrying unknown bits are rejected by every driver profile.
    #[test]
    fn unknown_mask_bits_never_create(profile in arb_profile(), bits in 0x20u64..0xFFFF_FFFE) {
        let runtime = Arc::new(SimulatedRuntime::new(profile));
        let manager = ContextManager::new(runtime);
        let mask = DeviceType::from_bits_retain(bits);
        let result = manager.create_context_from_type(None, mask, None);
        prop_assert!(result.is_err());
    }
}
