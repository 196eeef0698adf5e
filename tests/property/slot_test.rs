// tests/property/slot_test.rs

use proptest::prelude::*;
use spinel_client::core::cluster::slot::{NUM_SLOTS, get_slot};

proptest! {
    /// Every key maps inside the slot space.
    #[test]
    fn slot_is_always_in_range(key in proptest::collection::vec(any::<u8>(), 0..64)) {
        prop_assert!((get_slot(&key) as usize) < NUM_SLOTS);
    }

    /// Slot computation is deterministic.
    #[test]
    fn slot_is_deterministic(key in proptest::collection::vec(any::<u8>(), 0..64)) {
        prop_assert_eq!(get_slot(&key), get_slot(&key));
    }

    /// A hash tag pins the key to the tag content's slot, regardless of the
    /// surrounding text.
    #[test]
    fn hash_tag_pins_the_slot(
        tag in "[a-z0-9]{1,8}",
        prefix in "[a-z:]{0,6}",
        suffix in "[a-z:]{0,6}",
    ) {
        let wrapped = format!("{prefix}{{{tag}}}{suffix}");
        prop_assert_eq!(get_slot(wrapped.as_bytes()), get_slot(tag.as_bytes()));
    }

    /// Keys sharing a tag always share a slot.
    #[test]
    fn shared_tags_share_slots(
        tag in "[a-z0-9]{1,8}",
        a in "[a-z]{0,6}",
        b in "[a-z]{0,6}",
    ) {
        let first = format!("{{{tag}}}{a}");
        let second = format!("{{{tag}}}{b}");
        prop_assert_eq!(get_slot(first.as_bytes()), get_slot(second.as_bytes()));
    }
}
