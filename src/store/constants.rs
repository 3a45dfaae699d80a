/// Identity field used when a store is not configured otherwise. Surrogate keys are only
/// generated for stores keyed on this field.
pub const DEFAULT_ID_PROPERTY: &str = "id";

pub(crate) const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;
