use uuid::Uuid;

/// Generates fresh 128-bit identifiers with negligible collision probability.
///
/// A thin wrapper rather than calling `Uuid::new_v4()` directly at every call
/// site so the one place that needs a different generation strategy (e.g. a
/// deterministic one under test) only has to change here.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// The well-known key the root object is stored under: the all-zero UUID.
/// No FCB or data block is ever assigned this id by [`new_id`], since
/// `Uuid::new_v4` sets the version/variant bits and can never produce it.
pub const ROOT_OBJECT_KEY: Uuid = Uuid::nil();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_differ() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn root_object_key_is_nil() {
        assert!(ROOT_OBJECT_KEY.is_nil());
    }
}
