/// Cached images and the region they cover.
pub mod region;
/// Two-slot snapshot / filtered-snapshot storage.
pub mod store;
