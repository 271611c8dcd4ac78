use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FxCacheError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        FxCacheError::capture("x")
            .to_string()
            .contains("capture error:")
    );
    assert!(
        FxCacheError::filter_execution("x")
            .to_string()
            .contains("filter execution error:")
    );
    assert!(
        FxCacheError::context_mismatch("x")
            .to_string()
            .contains("context mismatch:")
    );
    assert!(
        FxCacheError::offload("x")
            .to_string()
            .contains("offload error:")
    );
    assert!(
        FxCacheError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FxCacheError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
