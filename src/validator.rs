//! Transformer balancing rule
//!
//! Every edit of a configuration goes through [`validate_edit`]:
//! - counts are clamped at zero
//! - counts above [`MAX_DEVICE_COUNT`] are rejected, which keeps the battery
//!   minimum representable as a transformer count
//! - a battery edit always resets transformers to `floor(batteries / 2)`
//! - a transformer edit below that minimum is rejected outright
//!
//! Note that a battery edit discards any manual transformer surplus the user
//! had set. That collapse is kept as-is; see DESIGN.md.

use tracing::debug;

use crate::constants::validation::MAX_DEVICE_COUNT;
use crate::types::{Configuration, DeviceType};

/// How the caller expressed the new count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// Replace the count outright
    Set(i64),
    /// Add a signed delta to the current count
    Adjust(i64),
}

/// Result of running an edit through the balancing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Accepted(Configuration),
    /// Transformer count below the minimum; configuration must stay untouched
    Rejected { proposed: u32, required: u64 },
    /// Count (or the minimum it implies) does not fit; configuration must stay untouched
    OutOfRange { proposed: i64, max: u32 },
}

impl Validation {
    /// The configuration to keep: the edited one, or `current` on rejection
    pub fn resolve(self, current: &Configuration) -> Configuration {
        match self {
            Validation::Accepted(config) => config,
            Validation::Rejected { .. } | Validation::OutOfRange { .. } => *current,
        }
    }
}

/// Apply `edit` to `device` and enforce the transformer minimum
pub fn validate_edit(current: &Configuration, device: DeviceType, edit: Edit) -> Validation {
    let requested = match edit {
        Edit::Set(value) => value,
        Edit::Adjust(delta) => i64::from(current.get(device)).saturating_add(delta),
    };
    let Some(proposed) = clamp_count(requested) else {
        debug!(proposed = requested, max = MAX_DEVICE_COUNT, "Rejected count above maximum");
        return Validation::OutOfRange {
            proposed: requested,
            max: MAX_DEVICE_COUNT,
        };
    };

    let mut next = *current;
    next.set(device, proposed);
    let required = next.required_transformers();

    if device == DeviceType::Transformer {
        if u64::from(proposed) < required {
            debug!(proposed, required, "Rejected transformer count below minimum");
            return Validation::Rejected { proposed, required };
        }
        return Validation::Accepted(next);
    }

    // Only reachable from configurations that bypassed validation, e.g. loaded ones
    let Ok(transformers) = u32::try_from(required) else {
        debug!(required, "Rejected battery edit whose minimum does not fit");
        return Validation::OutOfRange {
            proposed: requested,
            max: MAX_DEVICE_COUNT,
        };
    };
    next.transformer = transformers;
    Validation::Accepted(next)
}

/// Convenience wrapper returning the configuration to store
pub fn apply_edit(current: &Configuration, device: DeviceType, edit: Edit) -> Configuration {
    validate_edit(current, device, edit).resolve(current)
}

/// Negative counts clamp to zero; None above the maximum
fn clamp_count(value: i64) -> Option<u32> {
    u32::try_from(value.max(0))
        .ok()
        .filter(|count| *count <= MAX_DEVICE_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(xl: u32, mp2: u32, mp: u32, pp: u32, tr: u32) -> Configuration {
        Configuration {
            megapack_xl: xl,
            megapack_2: mp2,
            megapack: mp,
            power_pack: pp,
            transformer: tr,
        }
    }

    #[test]
    fn test_battery_edit_sets_minimum_transformers() {
        let next = apply_edit(&Configuration::default(), DeviceType::Megapack, Edit::Set(5));
        assert_eq!(next.megapack, 5);
        assert_eq!(next.transformer, 2);
    }

    #[test]
    fn test_battery_edit_collapses_manual_surplus() {
        // User raised transformers to 6 earlier; any battery edit resets to the minimum
        let current = config(0, 0, 4, 0, 6);
        let next = apply_edit(&current, DeviceType::PowerPack, Edit::Adjust(1));
        assert_eq!(next.power_pack, 1);
        assert_eq!(next.transformer, 2);
    }

    #[test]
    fn test_transformer_above_minimum_accepted() {
        let current = config(0, 0, 4, 0, 2);
        let next = apply_edit(&current, DeviceType::Transformer, Edit::Adjust(3));
        assert_eq!(next.transformer, 5);
        assert_eq!(next.megapack, 4);
    }

    #[test]
    fn test_transformer_below_minimum_rejected() {
        let current = config(1, 1, 2, 0, 2);
        let result = validate_edit(&current, DeviceType::Transformer, Edit::Set(1));
        assert_eq!(result, Validation::Rejected { proposed: 1, required: 2 });
        assert_eq!(result.resolve(&current), current);
    }

    #[test]
    fn test_transformer_equal_to_minimum_accepted() {
        let current = config(0, 0, 4, 0, 5);
        let next = apply_edit(&current, DeviceType::Transformer, Edit::Set(2));
        assert_eq!(next.transformer, 2);
    }

    #[test]
    fn test_negative_values_clamp_to_zero() {
        let current = config(0, 3, 0, 0, 1);
        let next = apply_edit(&current, DeviceType::Megapack2, Edit::Adjust(-100));
        assert_eq!(next.megapack_2, 0);
        assert_eq!(next.transformer, 0);

        let next = apply_edit(&current, DeviceType::Megapack2, Edit::Set(i64::MIN));
        assert_eq!(next.megapack_2, 0);
    }

    #[test]
    fn test_transformer_negative_delta_clamps_then_validates() {
        // No batteries: minimum is zero, so a huge negative delta lands on zero
        let current = config(0, 0, 0, 0, 3);
        let next = apply_edit(&current, DeviceType::Transformer, Edit::Adjust(-50));
        assert_eq!(next.transformer, 0);
    }

    #[test]
    fn test_odd_battery_total_floors() {
        let next = apply_edit(&Configuration::default(), DeviceType::MegapackXL, Edit::Set(3));
        assert_eq!(next.transformer, 1);
    }

    #[test]
    fn test_oversized_battery_counts_rejected() {
        let current = config(0, 0, 4, 0, 2);
        for device in DeviceType::ALL.into_iter().filter(|d| d.is_battery()) {
            let result = validate_edit(&current, device, Edit::Set(i64::MAX));
            assert_eq!(result, Validation::OutOfRange { proposed: i64::MAX, max: MAX_DEVICE_COUNT });
            assert_eq!(result.resolve(&current), current);
        }

        let over = i64::from(MAX_DEVICE_COUNT) + 1;
        let result = validate_edit(&current, DeviceType::Transformer, Edit::Set(over));
        assert!(matches!(result, Validation::OutOfRange { .. }));
    }

    #[test]
    fn test_every_battery_at_maximum_stays_balanced() {
        let mut current = Configuration::default();
        for device in DeviceType::ALL.into_iter().filter(|d| d.is_battery()) {
            current = apply_edit(&current, device, Edit::Set(i64::from(MAX_DEVICE_COUNT)));
            assert_eq!(current.get(device), MAX_DEVICE_COUNT);
            assert_eq!(u64::from(current.transformer), current.battery_total() / 2);
        }
    }

    #[test]
    fn test_unrepresentable_minimum_rejects_battery_edit() {
        // Loaded configurations are not validated, so they can exceed the cap
        let current = config(u32::MAX, u32::MAX, u32::MAX, 0, u32::MAX);
        let result = validate_edit(&current, DeviceType::PowerPack, Edit::Set(1));
        assert!(matches!(result, Validation::OutOfRange { proposed: 1, .. }));
        assert_eq!(result.resolve(&current), current);
    }

    fn device() -> impl Strategy<Value = DeviceType> {
        prop::sample::select(DeviceType::ALL.to_vec())
    }

    fn any_config() -> impl Strategy<Value = Configuration> {
        let big = 0..=MAX_DEVICE_COUNT;
        prop_oneof![
            (0u32..500, 0u32..500, 0u32..500, 0u32..500, 0u32..1000)
                .prop_map(|(a, b, c, d, e)| config(a, b, c, d, e)),
            (big.clone(), big.clone(), big.clone(), big, any::<u32>())
                .prop_map(|(a, b, c, d, e)| config(a, b, c, d, e)),
        ]
    }

    fn any_edit() -> impl Strategy<Value = Edit> {
        let limit = i64::from(MAX_DEVICE_COUNT);
        prop_oneof![
            (-2000i64..2000).prop_map(Edit::Set),
            (-2000i64..2000).prop_map(Edit::Adjust),
            (limit - 10..=limit + 10).prop_map(Edit::Set),
            any::<i64>().prop_map(Edit::Adjust),
            Just(Edit::Adjust(i64::MIN)),
            Just(Edit::Adjust(i64::MAX)),
            Just(Edit::Set(i64::MAX)),
        ]
    }

    proptest! {
        #[test]
        fn test_battery_edit_always_balances(current in any_config(), edit in any_edit(), device in device()) {
            prop_assume!(device.is_battery());
            match validate_edit(&current, device, edit) {
                Validation::Accepted(next) => {
                    prop_assert_eq!(u64::from(next.transformer), next.battery_total() / 2);
                }
                other => {
                    prop_assert!(matches!(other, Validation::OutOfRange { .. }), "expected OutOfRange, got {:?}", other);
                    prop_assert_eq!(other.resolve(&current), current);
                }
            }
        }

        #[test]
        fn test_transformer_under_minimum_is_noop(current in any_config(), value in 0i64..1000) {
            let required = current.battery_total() / 2;
            prop_assume!((value as u64) < required);
            let next = apply_edit(&current, DeviceType::Transformer, Edit::Set(value));
            prop_assert_eq!(next, current);
        }

        #[test]
        fn test_transformer_never_below_minimum_after_edit(current in any_config(), edit in any_edit(), device in device()) {
            // Only starting points that already satisfy the floor
            prop_assume!(u64::from(current.transformer) >= current.required_transformers());
            let next = apply_edit(&current, device, edit);
            prop_assert!(u64::from(next.transformer) >= next.required_transformers());
        }

        #[test]
        fn test_edit_touches_only_target_and_transformer(current in any_config(), edit in any_edit(), device in device()) {
            let next = apply_edit(&current, device, edit);
            for other in DeviceType::ALL {
                if other != device && other != DeviceType::Transformer {
                    prop_assert_eq!(next.get(other), current.get(other));
                }
            }
        }
    }
}
